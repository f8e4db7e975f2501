use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Opaque entry identifier, unique for the lifetime of a timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let simple = self.0.simple().to_string();
        f.write_str(&simple[..8])
    }
}

/// Where an entry sits in its edit cycle.
///
/// `original` is the committed content captured when editing began, so
/// dirtiness is a plain comparison against the draft.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EntryState {
    #[default]
    Viewing,
    Editing {
        original: String,
        draft: String,
    },
    Saving {
        original: String,
        draft: String,
    },
}

impl EntryState {
    pub fn is_viewing(&self) -> bool {
        matches!(self, EntryState::Viewing)
    }

    pub fn is_editing(&self) -> bool {
        matches!(self, EntryState::Editing { .. })
    }

    pub fn is_saving(&self) -> bool {
        matches!(self, EntryState::Saving { .. })
    }

    pub fn draft(&self) -> Option<&str> {
        match self {
            EntryState::Viewing => None,
            EntryState::Editing { draft, .. } | EntryState::Saving { draft, .. } => Some(draft),
        }
    }

    pub fn is_dirty(&self) -> bool {
        match self {
            EntryState::Viewing => false,
            EntryState::Editing { original, draft } | EntryState::Saving { original, draft } => {
                original != draft
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(default)]
    pub highlighted: bool,
    #[serde(skip)]
    pub state: EntryState,
}

impl Entry {
    pub fn new(content: impl Into<String>) -> Self {
        Self::at(content, OffsetDateTime::now_utc())
    }

    pub fn at(content: impl Into<String>, timestamp: OffsetDateTime) -> Self {
        Self {
            id: EntryId::new(),
            content: content.into(),
            timestamp,
            highlighted: false,
            state: EntryState::Viewing,
        }
    }

    /// Text as it should appear on screen: the draft while an edit is open,
    /// the committed content otherwise.
    pub fn display_content(&self) -> &str {
        self.state.draft().unwrap_or(&self.content)
    }

    pub fn is_editable(&self) -> bool {
        !self.state.is_viewing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = Entry::new("one");
        let b = Entry::new("one");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn display_content_prefers_draft() {
        let mut entry = Entry::new("committed");
        assert_eq!(entry.display_content(), "committed");
        entry.state = EntryState::Editing {
            original: "committed".into(),
            draft: "draft".into(),
        };
        assert_eq!(entry.display_content(), "draft");
        assert!(entry.state.is_dirty());
        assert!(entry.is_editable());
    }
}

use bitflags::bitflags;

use crate::config::DisplayConfig;

bitflags! {
    /// Independent visibility toggles; they only affect rendering.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DisplayFlags: u8 {
        const TIMESTAMPS = 0b0001;
        const EDIT_CONTROLS = 0b0010;
        const HABITS = 0b0100;
        const TODOS = 0b1000;
    }
}

impl From<&DisplayConfig> for DisplayFlags {
    fn from(config: &DisplayConfig) -> Self {
        let mut flags = DisplayFlags::empty();
        flags.set(DisplayFlags::TIMESTAMPS, config.timestamps);
        flags.set(DisplayFlags::EDIT_CONTROLS, config.edit_controls);
        flags.set(DisplayFlags::HABITS, config.habits);
        flags.set(DisplayFlags::TODOS, config.todos);
        flags
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TitleState {
    #[default]
    Viewing,
    Editing {
        draft: String,
    },
    Saving {
        draft: String,
    },
}

/// Per-timeline chrome: the title with its own draft cycle plus display
/// toggles. Decoupled from entry edits.
#[derive(Debug, Clone)]
pub struct Shell {
    title: String,
    title_state: TitleState,
    flags: DisplayFlags,
}

impl Shell {
    pub fn new(title: impl Into<String>, flags: DisplayFlags) -> Self {
        Self {
            title: title.into(),
            title_state: TitleState::Viewing,
            flags,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn title_state(&self) -> &TitleState {
        &self.title_state
    }

    pub fn flags(&self) -> DisplayFlags {
        self.flags
    }

    pub fn shows(&self, flag: DisplayFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn toggle(&mut self, flag: DisplayFlags) -> bool {
        self.flags.toggle(flag);
        self.flags.contains(flag)
    }

    /// Opens the title for editing, seeding the draft from the current title.
    /// Returns false while a save is in flight.
    pub fn begin_title_edit(&mut self) -> bool {
        match self.title_state {
            TitleState::Viewing => {
                self.title_state = TitleState::Editing {
                    draft: self.title.clone(),
                };
                true
            }
            TitleState::Editing { .. } => true,
            TitleState::Saving { .. } => false,
        }
    }

    pub fn title_draft(&self) -> Option<&str> {
        match &self.title_state {
            TitleState::Viewing => None,
            TitleState::Editing { draft } | TitleState::Saving { draft } => Some(draft),
        }
    }

    pub fn change_title_draft(&mut self, value: impl Into<String>) -> bool {
        match &mut self.title_state {
            TitleState::Editing { draft } => {
                *draft = value.into();
                true
            }
            _ => false,
        }
    }

    /// Moves an edited title into the saving state and hands back the value to
    /// persist. Blank drafts stay in edit mode.
    pub fn commit_title(&mut self) -> Option<String> {
        let TitleState::Editing { draft } = &self.title_state else {
            return None;
        };
        let trimmed = draft.trim().to_string();
        if trimmed.is_empty() {
            return None;
        }
        self.title_state = TitleState::Saving {
            draft: trimmed.clone(),
        };
        Some(trimmed)
    }

    /// Applies the outcome of a title save. A failure returns to editing with
    /// the draft intact.
    pub fn complete_title(&mut self, saved: Option<String>) {
        let TitleState::Saving { draft } = std::mem::take(&mut self.title_state) else {
            return;
        };
        match saved {
            Some(title) => self.title = title,
            None => self.title_state = TitleState::Editing { draft },
        }
    }

    pub fn cancel_title_edit(&mut self) -> bool {
        if matches!(self.title_state, TitleState::Editing { .. }) {
            self.title_state = TitleState::Viewing;
            true
        } else {
            false
        }
    }
}

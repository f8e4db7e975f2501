use strum::Display;

use super::confirm::Prompt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum QuickKind {
    #[strum(serialize = "habit")]
    Habit,
    #[strum(serialize = "todo")]
    Todo,
}

impl QuickKind {
    /// Todos are used up when promoted; habits stay for next time.
    pub fn consumed_on_use(self) -> bool {
        matches!(self, QuickKind::Todo)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickItem {
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct QuickList {
    kind: QuickKind,
    items: Vec<QuickItem>,
}

impl QuickList {
    pub fn new<I, S>(kind: QuickKind, seed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = Self {
            kind,
            items: Vec::new(),
        };
        for text in seed {
            list.add(text);
        }
        list
    }

    pub fn kind(&self) -> QuickKind {
        self.kind
    }

    pub fn items(&self) -> &[QuickItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&QuickItem> {
        self.items.get(index)
    }

    pub fn add(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return false;
        }
        self.items.push(QuickItem {
            text: trimmed.to_string(),
        });
        true
    }

    pub fn add_via(&mut self, prompt: &mut dyn Prompt) -> bool {
        let message = format!("New {}:", self.kind);
        match prompt.prompt(&message) {
            Some(text) => self.add(text),
            None => false,
        }
    }

    pub fn remove(&mut self, index: usize) -> Option<QuickItem> {
        if index < self.items.len() {
            Some(self.items.remove(index))
        } else {
            None
        }
    }
}

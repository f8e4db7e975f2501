use super::confirm::{Confirm, ConfirmRequest};

const MAX_COMPOSE_CHARS: usize = 2000;

/// The per-timeline input line new entries are typed into.
///
/// Input is refused while a submission is in flight.
#[derive(Debug, Clone, Default)]
pub struct ComposeBox {
    buffer: String,
    submitting: bool,
}

impl ComposeBox {
    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.trim().is_empty()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn push_char(&mut self, ch: char) -> bool {
        if self.submitting || self.buffer.chars().count() >= MAX_COMPOSE_CHARS {
            return false;
        }
        self.buffer.push(ch);
        true
    }

    pub fn pop_char(&mut self) -> bool {
        if self.submitting {
            return false;
        }
        self.buffer.pop().is_some()
    }

    /// Swaps in a template body, asking first when it would overwrite text.
    pub fn insert_template(
        &mut self,
        name: &str,
        body: &str,
        confirm: &mut dyn Confirm,
    ) -> bool {
        if self.submitting {
            return false;
        }
        if !self.is_empty() {
            let request = ConfirmRequest::ReplaceCompose {
                template: name.to_string(),
            };
            if !confirm.confirm(&request) {
                return false;
            }
        }
        self.buffer = body.to_string();
        true
    }

    pub(crate) fn begin_submit(&mut self) {
        self.submitting = true;
    }

    pub(crate) fn finish_submit(&mut self, clear: bool) {
        self.submitting = false;
        if clear {
            self.buffer.clear();
        }
    }
}

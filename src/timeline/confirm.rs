/// Destructive or discarding actions that need a yes/no from the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmRequest {
    DeleteEntry { preview: String },
    DiscardDraft { preview: String },
    DiscardDrafts { count: usize },
    ReplaceCompose { template: String },
    RemoveTimeline { title: String },
}

impl ConfirmRequest {
    pub fn message(&self) -> String {
        match self {
            ConfirmRequest::DeleteEntry { preview } => format!("Delete entry \"{preview}\"?"),
            ConfirmRequest::DiscardDraft { preview } => {
                format!("Discard unsaved changes to \"{preview}\"?")
            }
            ConfirmRequest::DiscardDrafts { count } => {
                format!("Refresh and discard {count} unsaved draft(s)?")
            }
            ConfirmRequest::ReplaceCompose { template } => {
                format!("Replace the current draft with template \"{template}\"?")
            }
            ConfirmRequest::RemoveTimeline { title } => format!("Remove timeline \"{title}\"?"),
        }
    }
}

/// Blocking yes/no capability. Declining must leave state untouched.
pub trait Confirm {
    fn confirm(&mut self, request: &ConfirmRequest) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&ConfirmRequest) -> bool,
{
    fn confirm(&mut self, request: &ConfirmRequest) -> bool {
        self(request)
    }
}

/// Free-text capability; `None` means the user cancelled.
pub trait Prompt {
    fn prompt(&mut self, message: &str) -> Option<String>;
}

impl<F> Prompt for F
where
    F: FnMut(&str) -> Option<String>,
{
    fn prompt(&mut self, message: &str) -> Option<String> {
        self(message)
    }
}

/// A confirmation that was already collected elsewhere (e.g. an overlay).
#[derive(Debug, Clone, Copy)]
pub struct Answer(pub bool);

impl Confirm for Answer {
    fn confirm(&mut self, _request: &ConfirmRequest) -> bool {
        self.0
    }
}

pub(crate) fn preview(text: &str) -> String {
    const MAX_CHARS: usize = 40;
    let first_line = text.lines().next().unwrap_or("").trim();
    let mut snippet: String = first_line.chars().take(MAX_CHARS).collect();
    if first_line.chars().count() > MAX_CHARS || text.lines().nth(1).is_some() {
        snippet.push('…');
    }
    snippet
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_multiline_text() {
        assert_eq!(preview("first\nsecond"), "first…");
        assert_eq!(preview("short"), "short");
    }
}

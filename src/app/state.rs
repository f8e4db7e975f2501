use crate::store::EntryId;
use crate::timeline::{Confirm, ConfirmRequest, QuickKind, TimelineId};

/// Where typed characters go when no overlay is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    Compose,
    EditEntry(EntryId),
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptPurpose {
    Search,
    NewTimeline,
    QuickItem(QuickKind),
}

impl PromptPurpose {
    pub fn label(&self) -> String {
        match self {
            PromptPurpose::Search => "Search entries".to_string(),
            PromptPurpose::NewTimeline => "New timeline title".to_string(),
            PromptPurpose::QuickItem(kind) => format!("New {kind}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PromptOverlay {
    pub purpose: PromptPurpose,
    pub input: String,
}

/// The operation to replay once the user answers a confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingAction {
    DeleteEntry {
        timeline: TimelineId,
        entry: EntryId,
    },
    DiscardDraft {
        timeline: TimelineId,
        entry: EntryId,
    },
    InsertTemplate {
        timeline: TimelineId,
        template: usize,
    },
    Refresh {
        timeline: TimelineId,
    },
    RemoveTimeline {
        timeline: TimelineId,
    },
}

#[derive(Debug, Clone)]
pub struct ConfirmOverlay {
    pub request: ConfirmRequest,
    pub action: PendingAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerKind {
    Quick(QuickKind),
    Template,
}

#[derive(Debug, Clone)]
pub struct PickerOverlay {
    pub kind: PickerKind,
    pub selected: usize,
}

#[derive(Debug, Clone)]
pub enum OverlayState {
    Confirm(ConfirmOverlay),
    Prompt(PromptOverlay),
    Picker(PickerOverlay),
}

/// Declines every request but remembers it, so the event loop can put the
/// question on screen and replay the operation with the user's answer.
#[derive(Debug, Default)]
pub struct DeferredConfirm {
    asked: Option<ConfirmRequest>,
}

impl DeferredConfirm {
    pub fn take(&mut self) -> Option<ConfirmRequest> {
        self.asked.take()
    }
}

impl Confirm for DeferredConfirm {
    fn confirm(&mut self, request: &ConfirmRequest) -> bool {
        self.asked = Some(request.clone());
        false
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub focus: usize,
    pub mode: InputMode,
    pub status_message: Option<String>,
    pub overlay: Option<OverlayState>,
}

impl AppState {
    pub fn focused(&self, ids: &[TimelineId]) -> Option<TimelineId> {
        ids.get(self.focus).copied()
    }

    pub fn cycle_focus(&mut self, delta: isize, count: usize) {
        if count == 0 {
            self.focus = 0;
            return;
        }
        let next = (self.focus as isize + delta).rem_euclid(count as isize);
        self.focus = next as usize;
    }

    /// Keeps focus on a valid column after timelines come or go.
    pub fn clamp_focus(&mut self, count: usize) {
        self.focus = self.focus.min(count.saturating_sub(1));
    }

    pub fn is_normal(&self) -> bool {
        self.mode == InputMode::Normal
    }

    pub fn set_mode(&mut self, mode: InputMode) {
        self.mode = mode;
    }

    pub fn set_status_message<S: Into<String>>(&mut self, message: Option<S>) {
        self.status_message = message.map(Into::into);
    }

    pub fn clear_status_message(&mut self) {
        self.status_message = None;
    }

    pub fn overlay(&self) -> Option<&OverlayState> {
        self.overlay.as_ref()
    }

    pub fn close_overlay(&mut self) {
        self.overlay = None;
    }

    pub fn open_prompt(&mut self, purpose: PromptPurpose, input: impl Into<String>) {
        self.overlay = Some(OverlayState::Prompt(PromptOverlay {
            purpose,
            input: input.into(),
        }));
    }

    pub fn prompt_mut(&mut self) -> Option<&mut PromptOverlay> {
        match self.overlay.as_mut() {
            Some(OverlayState::Prompt(prompt)) => Some(prompt),
            _ => None,
        }
    }

    pub fn open_confirm(&mut self, request: ConfirmRequest, action: PendingAction) {
        self.overlay = Some(OverlayState::Confirm(ConfirmOverlay { request, action }));
    }

    pub fn open_picker(&mut self, kind: PickerKind) {
        self.overlay = Some(OverlayState::Picker(PickerOverlay { kind, selected: 0 }));
    }

    pub fn picker_move(&mut self, delta: isize, len: usize) {
        if let Some(OverlayState::Picker(picker)) = self.overlay.as_mut() {
            if len == 0 {
                picker.selected = 0;
                return;
            }
            let next = (picker.selected as isize + delta).clamp(0, len as isize - 1);
            picker.selected = next as usize;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn focus_wraps_both_ways() {
        let mut state = AppState::default();
        state.cycle_focus(-1, 3);
        assert_eq!(state.focus, 2);
        state.cycle_focus(1, 3);
        assert_eq!(state.focus, 0);
        state.cycle_focus(1, 0);
        assert_eq!(state.focus, 0);
    }

    #[test]
    fn focus_is_clamped_after_removal() {
        let mut state = AppState {
            focus: 4,
            ..AppState::default()
        };
        state.clamp_focus(2);
        assert_eq!(state.focus, 1);
        let ids = [TimelineId::new(1), TimelineId::new(2)];
        assert_eq!(state.focused(&ids), Some(TimelineId::new(2)));
    }

    #[test]
    fn deferred_confirm_records_and_declines() {
        let mut deferred = DeferredConfirm::default();
        let request = ConfirmRequest::RemoveTimeline {
            title: "Work".into(),
        };
        assert!(!deferred.confirm(&request));
        assert_eq!(deferred.take(), Some(request));
        assert_eq!(deferred.take(), None);
    }

    #[test]
    fn picker_selection_stays_in_range() {
        let mut state = AppState::default();
        state.open_picker(PickerKind::Template);
        state.picker_move(5, 3);
        state.picker_move(1, 3);
        let Some(OverlayState::Picker(picker)) = state.overlay() else {
            panic!("picker not open");
        };
        assert_eq!(picker.selected, 2);
        state.picker_move(-10, 3);
        let Some(OverlayState::Picker(picker)) = state.overlay() else {
            panic!("picker not open");
        };
        assert_eq!(picker.selected, 0);
    }
}

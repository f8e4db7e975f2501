use thiserror::Error;
use time::OffsetDateTime;

use super::confirm::{self, Confirm, ConfirmRequest};
use super::{AnchorMode, QuickKind, StoreRequest, Timeline, TimelineId, TimelineState};
use crate::store::{Entry, EntryId, EntryState, StoreError};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("no entry {0} in this timeline")]
    UnknownEntry(EntryId),
    #[error("no timeline {0}")]
    UnknownTimeline(TimelineId),
    #[error("entry {0} is not being edited")]
    NotEditing(EntryId),
    #[error("entry {0} is still saving")]
    Busy(EntryId),
    #[error("a submission is already in flight")]
    ComposeBusy,
    #[error("clear the search filter first")]
    FilterActive,
    #[error("still searching for \"{0}\"")]
    SearchPending(String),
    #[error("timeline is busy ({0})")]
    NotIdle(TimelineState),
    #[error("no {kind} at position {index}")]
    MissingQuickItem { kind: QuickKind, index: usize },
}

/// Entry lifecycle: append, edit, save, cancel, delete, highlight, promote.
///
/// Every operation acts on the live sequence. While a search filter is shown
/// they are refused, so the live and filtered views never need to be kept in
/// step.
impl Timeline {
    /// Validates and hands back a create request; blank content is dropped.
    /// The compose box is locked until [`Timeline::complete_append`].
    pub fn append(&mut self, content: &str) -> Result<Option<StoreRequest>, LifecycleError> {
        self.ensure_unfiltered()?;
        if self.compose.is_submitting() {
            return Err(LifecycleError::ComposeBusy);
        }
        let content = content.trim();
        if content.is_empty() {
            return Ok(None);
        }
        self.compose.begin_submit();
        Ok(Some(StoreRequest::CreateEntry {
            content: content.to_string(),
        }))
    }

    pub fn submit_compose(&mut self) -> Result<Option<StoreRequest>, LifecycleError> {
        let content = self.compose.text().to_string();
        self.append(&content)
    }

    pub fn complete_append(&mut self, result: Result<Entry, StoreError>) -> Result<(), StoreError> {
        match result {
            Ok(entry) => {
                tracing::info!(timeline = %self.id, entry = %entry.id, "entry appended");
                self.compose.finish_submit(true);
                self.selected = Some(entry.id);
                self.live.push(entry);
                self.anchor.request(AnchorMode::SnapToBottom);
                self.reconcile();
                Ok(())
            }
            Err(err) => {
                self.compose.finish_submit(false);
                Err(err)
            }
        }
    }

    pub fn compose_push(&mut self, ch: char) -> bool {
        self.compose.push_char(ch)
    }

    pub fn compose_pop(&mut self) -> bool {
        self.compose.pop_char()
    }

    pub fn insert_template(
        &mut self,
        name: &str,
        body: &str,
        confirm: &mut dyn Confirm,
    ) -> Result<bool, LifecycleError> {
        self.ensure_unfiltered()?;
        Ok(self.compose.insert_template(name, body, confirm))
    }

    /// Opens an entry for editing without moving the viewport.
    pub fn begin_edit(&mut self, id: EntryId) -> Result<(), LifecycleError> {
        self.ensure_unfiltered()?;
        self.ensure_not_refreshing()?;
        let entry = self.entry_mut(id)?;
        match entry.state {
            EntryState::Viewing => {
                entry.state = EntryState::Editing {
                    original: entry.content.clone(),
                    draft: entry.content.clone(),
                };
            }
            EntryState::Editing { .. } => return Ok(()),
            EntryState::Saving { .. } => return Err(LifecycleError::Busy(id)),
        }
        self.selected = Some(id);
        self.anchor.request(AnchorMode::Hold);
        self.reconcile();
        Ok(())
    }

    /// Replaces the draft of an entry under edit. Committed content and
    /// timestamp are untouched until a save lands.
    pub fn change_draft(&mut self, id: EntryId, content: impl Into<String>) -> Result<(), LifecycleError> {
        self.ensure_unfiltered()?;
        self.ensure_not_refreshing()?;
        let entry = self.entry_mut(id)?;
        match &mut entry.state {
            EntryState::Editing { draft, .. } => *draft = content.into(),
            EntryState::Saving { .. } => return Err(LifecycleError::Busy(id)),
            EntryState::Viewing => return Err(LifecycleError::NotEditing(id)),
        }
        self.anchor.request(AnchorMode::Hold);
        self.reconcile();
        Ok(())
    }

    /// Moves the entry into saving and hands back the draft to persist.
    pub fn save_edit(&mut self, id: EntryId) -> Result<StoreRequest, LifecycleError> {
        self.ensure_unfiltered()?;
        self.ensure_not_refreshing()?;
        let entry = self.entry_mut(id)?;
        let (original, draft) = match std::mem::take(&mut entry.state) {
            EntryState::Editing { original, draft } => (original, draft),
            other @ EntryState::Saving { .. } => {
                entry.state = other;
                return Err(LifecycleError::Busy(id));
            }
            EntryState::Viewing => return Err(LifecycleError::NotEditing(id)),
        };
        entry.state = EntryState::Saving {
            original,
            draft: draft.clone(),
        };
        Ok(StoreRequest::SaveEntry {
            entry: id,
            content: draft,
        })
    }

    /// Commits or rolls back a save. Success refreshes the timestamp; failure
    /// returns the entry to editing with the draft intact.
    pub fn complete_save(
        &mut self,
        id: EntryId,
        result: Result<OffsetDateTime, StoreError>,
    ) -> Result<(), StoreError> {
        let timeline = self.id;
        let Some(entry) = self.live.iter_mut().find(|entry| entry.id == id) else {
            tracing::debug!(timeline = %timeline, entry = %id, "save landed for a vanished entry");
            return Ok(());
        };
        if !entry.state.is_saving() {
            tracing::debug!(timeline = %timeline, entry = %id, "save landed for an entry not saving");
            return Ok(());
        }
        let EntryState::Saving { original, draft } = std::mem::take(&mut entry.state) else {
            return Ok(());
        };
        match result {
            Ok(timestamp) => {
                entry.content = draft;
                entry.timestamp = timestamp;
                tracing::info!(timeline = %timeline, entry = %id, "entry saved");
            }
            Err(err) => {
                entry.state = EntryState::Editing { original, draft };
                return Err(err);
            }
        }
        self.anchor.request(AnchorMode::Hold);
        self.reconcile();
        Ok(())
    }

    /// Leaves edit mode. A dirty draft needs confirmation; declining keeps the
    /// entry in edit mode. Returns whether the edit was closed.
    pub fn cancel_edit(&mut self, id: EntryId, confirm: &mut dyn Confirm) -> Result<bool, LifecycleError> {
        self.ensure_unfiltered()?;
        let entry = self.entry_mut(id)?;
        match &entry.state {
            EntryState::Viewing => return Err(LifecycleError::NotEditing(id)),
            EntryState::Saving { .. } => return Err(LifecycleError::Busy(id)),
            EntryState::Editing { draft, .. } => {
                if entry.state.is_dirty() {
                    let request = ConfirmRequest::DiscardDraft {
                        preview: confirm::preview(draft),
                    };
                    if !confirm.confirm(&request) {
                        return Ok(false);
                    }
                }
            }
        }
        entry.state = EntryState::Viewing;
        self.anchor.request(AnchorMode::Hold);
        self.reconcile();
        Ok(true)
    }

    /// Removes an entry after confirmation. Returns whether it was removed.
    pub fn delete_entry(&mut self, id: EntryId, confirm: &mut dyn Confirm) -> Result<bool, LifecycleError> {
        self.ensure_unfiltered()?;
        let index = self.index_of(id)?;
        let entry = &self.live[index];
        if entry.state.is_saving() {
            return Err(LifecycleError::Busy(id));
        }
        let request = ConfirmRequest::DeleteEntry {
            preview: confirm::preview(&entry.content),
        };
        if !confirm.confirm(&request) {
            return Ok(false);
        }
        self.live.remove(index);
        tracing::info!(timeline = %self.id, entry = %id, "entry deleted");
        if self.selected == Some(id) {
            let neighbour = index.min(self.live.len().saturating_sub(1));
            self.selected = self.live.get(neighbour).map(|entry| entry.id);
        }
        self.anchor.request(AnchorMode::Hold);
        self.reconcile();
        Ok(true)
    }

    pub fn toggle_highlight(&mut self, id: EntryId) -> Result<bool, LifecycleError> {
        self.ensure_unfiltered()?;
        let entry = self.entry_mut(id)?;
        entry.highlighted = !entry.highlighted;
        let highlighted = entry.highlighted;
        self.anchor.request(AnchorMode::Hold);
        self.reconcile();
        Ok(highlighted)
    }

    /// Appends a habit or todo as a new entry straight away. Todos are
    /// removed from their list; habits stay.
    pub fn promote_quick_item(&mut self, kind: QuickKind, index: usize) -> Result<EntryId, LifecycleError> {
        self.ensure_unfiltered()?;
        let list = self.quick_mut(kind);
        let text = list
            .get(index)
            .map(|item| item.text.clone())
            .ok_or(LifecycleError::MissingQuickItem { kind, index })?;
        if kind.consumed_on_use() {
            list.remove(index);
        }
        let entry = Entry::new(text);
        let id = entry.id;
        tracing::info!(timeline = %self.id, entry = %id, %kind, "quick item promoted");
        self.live.push(entry);
        self.selected = Some(id);
        self.anchor.request(AnchorMode::SnapToBottom);
        self.reconcile();
        Ok(id)
    }

    pub(super) fn ensure_unfiltered(&self) -> Result<(), LifecycleError> {
        if self.view.is_active() {
            Err(LifecycleError::FilterActive)
        } else {
            Ok(())
        }
    }

    /// The live sequence is about to be replaced, so edits would be lost.
    fn ensure_not_refreshing(&self) -> Result<(), LifecycleError> {
        if self.state == TimelineState::Refreshing {
            Err(LifecycleError::NotIdle(self.state))
        } else {
            Ok(())
        }
    }

    fn index_of(&self, id: EntryId) -> Result<usize, LifecycleError> {
        self.live
            .iter()
            .position(|entry| entry.id == id)
            .ok_or(LifecycleError::UnknownEntry(id))
    }

    fn entry_mut(&mut self, id: EntryId) -> Result<&mut Entry, LifecycleError> {
        self.live
            .iter_mut()
            .find(|entry| entry.id == id)
            .ok_or(LifecycleError::UnknownEntry(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Operation;
    use crate::timeline::{Answer, TimelineOptions};
    use assert_matches::assert_matches;

    fn timeline(contents: &[&str]) -> Timeline {
        let options = TimelineOptions {
            habits: vec!["Read book".into()],
            todos: vec!["Water plants".into(), "Call bank".into()],
            ..TimelineOptions::default()
        };
        let entries = contents.iter().map(|text| Entry::new(*text)).collect();
        let mut timeline = Timeline::new(TimelineId::new(7), "Test", &options).with_entries(entries);
        timeline.set_viewport(30, 6);
        timeline
    }

    fn failure(operation: Operation) -> StoreError {
        StoreError::Unavailable { operation }
    }

    #[test]
    fn append_adds_entry_at_end_and_snaps() -> anyhow::Result<()> {
        let mut tl = timeline(&["one", "two", "three", "four"]);
        tl.scroll(-3);
        assert!(!tl.anchor().at_bottom());
        let request = tl.append("  five  ")?;
        assert_matches!(&request, Some(StoreRequest::CreateEntry { content }) if content == "five");
        assert!(tl.compose().is_submitting());

        tl.complete_append(Ok(Entry::new("five")))?;
        assert_eq!(tl.live().len(), 5);
        let last = tl.live().last().expect("last entry");
        assert_eq!(last.content, "five");
        assert!(tl.live()[..4].iter().all(|entry| entry.id != last.id));
        assert!(tl.anchor().at_bottom());
        assert!(!tl.compose().is_submitting());
        Ok(())
    }

    #[test]
    fn blank_append_is_a_no_op() -> anyhow::Result<()> {
        let mut tl = timeline(&["one"]);
        assert!(tl.append("   \n\t")?.is_none());
        assert!(!tl.compose().is_submitting());
        assert_eq!(tl.live().len(), 1);
        Ok(())
    }

    #[test]
    fn second_append_waits_for_first() -> anyhow::Result<()> {
        let mut tl = timeline(&[]);
        tl.append("a")?;
        assert_matches!(tl.append("b"), Err(LifecycleError::ComposeBusy));
        Ok(())
    }

    #[test]
    fn failed_append_keeps_compose_text() -> anyhow::Result<()> {
        let mut tl = timeline(&["one"]);
        for ch in "draft".chars() {
            tl.compose_push(ch);
        }
        tl.submit_compose()?;
        assert!(tl.complete_append(Err(failure(Operation::CreateEntry))).is_err());
        assert_eq!(tl.compose().text(), "draft");
        assert_eq!(tl.live().len(), 1);
        assert!(tl.compose_push('!'));
        Ok(())
    }

    #[test]
    fn edit_does_not_move_viewport() -> anyhow::Result<()> {
        let mut tl = timeline(&["one", "two", "three", "four"]);
        tl.scroll(-2);
        let offset = tl.anchor().offset();
        let id = tl.live()[1].id;
        tl.begin_edit(id)?;
        assert_eq!(tl.anchor().offset(), offset);
        assert!(tl.entry(id).map(Entry::is_editable).unwrap_or(false));
        Ok(())
    }

    #[test]
    fn save_commits_draft_and_refreshes_timestamp() -> anyhow::Result<()> {
        let mut tl = timeline(&["one"]);
        let id = tl.live()[0].id;
        let old_timestamp = tl.live()[0].timestamp;
        tl.begin_edit(id)?;
        tl.change_draft(id, "one, revised")?;
        assert_eq!(tl.live()[0].content, "one");
        let request = tl.save_edit(id)?;
        assert_matches!(request, StoreRequest::SaveEntry { content, .. } if content == "one, revised");
        assert_matches!(tl.delete_entry(id, &mut Answer(true)), Err(LifecycleError::Busy(_)));

        let saved_at = old_timestamp + time::Duration::seconds(5);
        tl.complete_save(id, Ok(saved_at))?;
        let entry = &tl.live()[0];
        assert_eq!(entry.content, "one, revised");
        assert_eq!(entry.timestamp, saved_at);
        assert!(entry.state.is_viewing());
        Ok(())
    }

    #[test]
    fn failed_save_returns_to_editing_without_partial_write() -> anyhow::Result<()> {
        let mut tl = timeline(&["one"]);
        let id = tl.live()[0].id;
        tl.begin_edit(id)?;
        tl.change_draft(id, "changed")?;
        tl.save_edit(id)?;
        assert!(tl.complete_save(id, Err(failure(Operation::SaveEntry))).is_err());
        let entry = &tl.live()[0];
        assert_eq!(entry.content, "one");
        assert_matches!(&entry.state, EntryState::Editing { draft, .. } if draft == "changed");
        Ok(())
    }

    #[test]
    fn cancelling_dirty_edit_requires_confirmation() -> anyhow::Result<()> {
        let mut tl = timeline(&["original"]);
        let id = tl.live()[0].id;
        tl.begin_edit(id)?;
        tl.change_draft(id, "scribbles")?;

        let mut asked = Vec::new();
        let closed = tl.cancel_edit(id, &mut |request: &ConfirmRequest| {
            asked.push(request.clone());
            false
        })?;
        assert!(!closed);
        assert_eq!(asked.len(), 1);
        assert_matches!(&asked[0], ConfirmRequest::DiscardDraft { .. });
        let entry = tl.entry(id).expect("entry");
        assert_eq!(entry.content, "original");
        assert!(entry.state.is_editing());

        assert!(tl.cancel_edit(id, &mut Answer(true))?);
        let entry = tl.entry(id).expect("entry");
        assert_eq!(entry.content, "original");
        assert!(!entry.is_editable());
        Ok(())
    }

    #[test]
    fn cancelling_clean_edit_skips_confirmation() -> anyhow::Result<()> {
        let mut tl = timeline(&["original"]);
        let id = tl.live()[0].id;
        tl.begin_edit(id)?;
        let closed = tl.cancel_edit(id, &mut |_: &ConfirmRequest| -> bool {
            panic!("should not ask")
        })?;
        assert!(closed);
        Ok(())
    }

    #[test]
    fn declined_delete_leaves_entry_in_place() -> anyhow::Result<()> {
        let mut tl = timeline(&["a", "b", "c"]);
        let id = tl.live()[1].id;
        assert!(!tl.delete_entry(id, &mut Answer(false))?);
        assert_eq!(tl.live().len(), 3);
        assert_eq!(tl.live()[1].id, id);

        assert!(tl.delete_entry(id, &mut Answer(true))?);
        assert_eq!(tl.live().len(), 2);
        assert!(tl.entry(id).is_none());
        Ok(())
    }

    #[test]
    fn edits_wait_for_a_refresh_to_land() -> anyhow::Result<()> {
        let mut tl = timeline(&["a", "b"]);
        let id = tl.live()[0].id;
        tl.refresh(&mut Answer(true))?;
        assert_matches!(
            tl.begin_edit(id),
            Err(LifecycleError::NotIdle(TimelineState::Refreshing))
        );
        assert!(tl.entry(id).map(|entry| entry.state.is_viewing()).unwrap_or(false));
        Ok(())
    }

    #[test]
    fn highlight_toggles() -> anyhow::Result<()> {
        let mut tl = timeline(&["a"]);
        let id = tl.live()[0].id;
        assert!(tl.toggle_highlight(id)?);
        assert!(!tl.toggle_highlight(id)?);
        Ok(())
    }

    #[test]
    fn promoting_todo_consumes_it_habit_does_not() -> anyhow::Result<()> {
        let mut tl = timeline(&["a"]);
        tl.promote_quick_item(QuickKind::Todo, 0)?;
        assert_eq!(tl.live().last().map(|e| e.content.as_str()), Some("Water plants"));
        assert_eq!(tl.quick(QuickKind::Todo).len(), 1);
        assert_eq!(tl.quick(QuickKind::Todo).items()[0].text, "Call bank");

        tl.promote_quick_item(QuickKind::Habit, 0)?;
        assert_eq!(tl.live().last().map(|e| e.content.as_str()), Some("Read book"));
        assert_eq!(tl.quick(QuickKind::Habit).len(), 1);
        assert_eq!(tl.live().len(), 3);
        assert!(tl.anchor().at_bottom());

        assert_matches!(
            tl.promote_quick_item(QuickKind::Todo, 5),
            Err(LifecycleError::MissingQuickItem { index: 5, .. })
        );
        Ok(())
    }

    #[test]
    fn mutations_are_refused_while_filtered() {
        let mut tl = timeline(&["Read book", "Exercise"]);
        let id = tl.live()[0].id;
        tl.search_now("read");
        assert_matches!(tl.append("new"), Err(LifecycleError::FilterActive));
        assert_matches!(tl.begin_edit(id), Err(LifecycleError::FilterActive));
        assert_matches!(tl.toggle_highlight(id), Err(LifecycleError::FilterActive));
        assert_matches!(
            tl.promote_quick_item(QuickKind::Habit, 0),
            Err(LifecycleError::FilterActive)
        );
        assert_eq!(tl.live().len(), 2);
    }

    #[test]
    fn append_landing_under_filter_is_not_visible() -> anyhow::Result<()> {
        let mut tl = timeline(&["Read book", "Exercise", "Read more", "Walk"]);
        tl.append("Late entry")?;
        tl.search_now("read");
        let offset = tl.anchor().offset();
        tl.complete_append(Ok(Entry::new("Late entry")))?;
        assert_eq!(tl.live().len(), 5);
        assert_eq!(tl.rendered().len(), 2);
        assert_eq!(tl.anchor().offset(), offset);
        Ok(())
    }
}

use std::fmt;

use strum::Display;
use time::OffsetDateTime;

use crate::config::AppConfig;
use crate::search::{SearchStart, SearchView, ViewChange};
use crate::store::{Entry, EntryId, StoreError};

pub mod anchor;
pub mod compose;
pub mod confirm;
pub mod layout;
mod lifecycle;
pub mod quick;
pub mod shell;

pub use anchor::{AnchorMode, ScrollAnchor};
pub use compose::ComposeBox;
pub use confirm::{Answer, Confirm, ConfirmRequest, Prompt};
pub use lifecycle::LifecycleError;
pub use quick::{QuickItem, QuickKind, QuickList};
pub use shell::{DisplayFlags, Shell, TitleState};

const DEFAULT_WIDTH: usize = 40;
const DEFAULT_HEIGHT: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimelineId(u64);

impl TimelineId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for TimelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TimelineState {
    Idle,
    LoadingInitial,
    LoadingOlder,
    Refreshing,
}

/// A call a timeline wants made against the entry store. The journal runs it
/// and feeds the outcome back through the matching `complete_*` method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreRequest {
    LoadInitial,
    LoadOlder { before: Option<OffsetDateTime> },
    CreateEntry { content: String },
    SaveEntry { entry: EntryId, content: String },
    SaveTitle { title: String },
    Search { term: String },
}

#[derive(Debug, Clone)]
pub struct TimelineOptions {
    pub flags: DisplayFlags,
    pub habits: Vec<String>,
    pub todos: Vec<String>,
}

impl Default for TimelineOptions {
    fn default() -> Self {
        Self {
            flags: DisplayFlags::TIMESTAMPS | DisplayFlags::EDIT_CONTROLS,
            habits: Vec::new(),
            todos: Vec::new(),
        }
    }
}

impl From<&AppConfig> for TimelineOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            flags: DisplayFlags::from(&config.display),
            habits: config.habits.clone(),
            todos: config.todos.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Timeline {
    id: TimelineId,
    shell: Shell,
    live: Vec<Entry>,
    view: SearchView,
    anchor: ScrollAnchor,
    state: TimelineState,
    compose: ComposeBox,
    habits: QuickList,
    todos: QuickList,
    width: usize,
    selected: Option<EntryId>,
}

impl Timeline {
    pub fn new(id: TimelineId, title: impl Into<String>, options: &TimelineOptions) -> Self {
        let mut anchor = ScrollAnchor::default();
        anchor.resize(DEFAULT_HEIGHT, 0);
        Self {
            id,
            shell: Shell::new(title, options.flags),
            live: Vec::new(),
            view: SearchView::default(),
            anchor,
            state: TimelineState::Idle,
            compose: ComposeBox::default(),
            habits: QuickList::new(QuickKind::Habit, options.habits.iter().cloned()),
            todos: QuickList::new(QuickKind::Todo, options.todos.iter().cloned()),
            width: DEFAULT_WIDTH,
            selected: None,
        }
    }

    /// A timeline whose first page is still on its way.
    pub fn loading(id: TimelineId, title: impl Into<String>, options: &TimelineOptions) -> Self {
        let mut timeline = Self::new(id, title, options);
        timeline.state = TimelineState::LoadingInitial;
        timeline
    }

    pub fn with_entries(mut self, entries: Vec<Entry>) -> Self {
        self.live = entries;
        self.anchor.request(AnchorMode::SnapToBottom);
        self.reconcile();
        self
    }

    pub fn id(&self) -> TimelineId {
        self.id
    }

    pub fn title(&self) -> &str {
        self.shell.title()
    }

    pub fn shell(&self) -> &Shell {
        &self.shell
    }

    pub fn state(&self) -> TimelineState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state != TimelineState::Idle
    }

    /// The authoritative entry sequence, oldest first.
    pub fn live(&self) -> &[Entry] {
        &self.live
    }

    /// What the viewport shows: search results while a filter is active,
    /// the live sequence otherwise.
    pub fn rendered(&self) -> &[Entry] {
        self.view.rendered(&self.live)
    }

    pub fn entry(&self, id: EntryId) -> Option<&Entry> {
        self.live.iter().find(|entry| entry.id == id)
    }

    pub fn is_filtered(&self) -> bool {
        self.view.is_active()
    }

    pub fn search_term(&self) -> &str {
        self.view.term()
    }

    /// Whether a committed search is still waiting for its results.
    pub fn is_searching(&self) -> bool {
        self.view.is_pending()
    }

    pub fn anchor(&self) -> &ScrollAnchor {
        &self.anchor
    }

    pub fn compose(&self) -> &ComposeBox {
        &self.compose
    }

    pub fn quick(&self, kind: QuickKind) -> &QuickList {
        match kind {
            QuickKind::Habit => &self.habits,
            QuickKind::Todo => &self.todos,
        }
    }

    pub fn quick_mut(&mut self, kind: QuickKind) -> &mut QuickList {
        match kind {
            QuickKind::Habit => &mut self.habits,
            QuickKind::Todo => &mut self.todos,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Selected entry, defaulting to the newest rendered one.
    pub fn selected(&self) -> Option<EntryId> {
        let rendered = self.rendered();
        self.selected
            .filter(|id| rendered.iter().any(|entry| entry.id == *id))
            .or_else(|| rendered.last().map(|entry| entry.id))
    }

    pub fn content_extent(&self) -> usize {
        layout::content_extent(self.rendered(), self.width, self.shell.flags())
    }

    /// Tells the timeline how much room the renderer gives it.
    pub fn set_viewport(&mut self, width: usize, height: usize) {
        if width == self.width && height == self.anchor.viewport() {
            return;
        }
        self.width = width;
        let extent = self.content_extent();
        self.anchor.resize(height, extent);
    }

    pub fn set_auto_scroll(&mut self, enabled: bool) {
        self.anchor.set_auto_scroll(enabled);
        tracing::debug!(timeline = %self.id, enabled, "auto-scroll toggled");
    }

    pub fn toggle_display(&mut self, flag: DisplayFlags) -> bool {
        let shown = self.shell.toggle(flag);
        self.anchor.request(AnchorMode::Hold);
        self.reconcile();
        shown
    }

    pub fn begin_title_edit(&mut self) -> bool {
        self.shell.begin_title_edit()
    }

    pub fn change_title_draft(&mut self, value: impl Into<String>) -> bool {
        self.shell.change_title_draft(value)
    }

    pub fn cancel_title_edit(&mut self) -> bool {
        self.shell.cancel_title_edit()
    }

    pub fn commit_title(&mut self) -> Option<StoreRequest> {
        self.shell
            .commit_title()
            .map(|title| StoreRequest::SaveTitle { title })
    }

    pub fn complete_title(&mut self, result: Result<String, StoreError>) -> Result<(), StoreError> {
        match result {
            Ok(title) => {
                tracing::info!(timeline = %self.id, %title, "title saved");
                self.shell.complete_title(Some(title));
                Ok(())
            }
            Err(err) => {
                self.shell.complete_title(None);
                Err(err)
            }
        }
    }

    /// User scroll. Reaching the very top of the live sequence asks for an
    /// older page.
    pub fn scroll(&mut self, delta: isize) -> Option<StoreRequest> {
        self.anchor.scroll_by(delta);
        if delta < 0 && self.anchor.at_top() {
            return self.request_older();
        }
        None
    }

    /// Moves the selection through the rendered entries, keeping it visible.
    /// Moving past the first entry scrolls to the top, which may trigger an
    /// older-page load.
    pub fn move_selection(&mut self, delta: isize) -> Option<StoreRequest> {
        let rendered = self.rendered();
        if rendered.is_empty() {
            return None;
        }
        let current = self
            .selected()
            .and_then(|id| rendered.iter().position(|entry| entry.id == id))
            .unwrap_or(rendered.len() - 1);
        let target = current as isize + delta;
        if target < 0 {
            let offset = self.anchor.offset() as isize;
            return self.scroll(-offset.max(1));
        }
        let target = (target as usize).min(rendered.len() - 1);
        let id = rendered[target].id;
        self.selected = Some(id);
        self.reveal(id);
        None
    }

    fn reveal(&mut self, id: EntryId) {
        let rendered = self.view.rendered(&self.live);
        let Some(index) = rendered.iter().position(|entry| entry.id == id) else {
            return;
        };
        let flags = self.shell.flags();
        let top = layout::entry_top(rendered, index, self.width, flags);
        let height = layout::entry_height(&rendered[index], self.width, flags);
        self.anchor.reveal(top, height);
    }

    /// Issues an older-page load if nothing else is loading and the live
    /// sequence is on screen.
    pub fn request_older(&mut self) -> Option<StoreRequest> {
        if self.state != TimelineState::Idle || self.view.is_active() {
            return None;
        }
        self.state = TimelineState::LoadingOlder;
        let before = self.live.first().map(|entry| entry.timestamp);
        tracing::debug!(timeline = %self.id, "requesting older page");
        Some(StoreRequest::LoadOlder { before })
    }

    /// Reloads the first page, replacing the live sequence when it lands.
    ///
    /// Refused while any entry is saving. Unsaved drafts are discarded only
    /// after confirmation; declining returns `Ok(None)` and changes nothing.
    pub fn refresh(&mut self, confirm: &mut dyn Confirm) -> Result<Option<StoreRequest>, LifecycleError> {
        self.ensure_unfiltered()?;
        if self.state != TimelineState::Idle {
            return Err(LifecycleError::NotIdle(self.state));
        }
        if let Some(saving) = self.live.iter().find(|entry| entry.state.is_saving()) {
            return Err(LifecycleError::Busy(saving.id));
        }
        let drafts = self
            .live
            .iter()
            .filter(|entry| entry.state.is_dirty())
            .count();
        if drafts > 0 && !confirm.confirm(&ConfirmRequest::DiscardDrafts { count: drafts }) {
            return Ok(None);
        }
        self.state = TimelineState::Refreshing;
        tracing::debug!(timeline = %self.id, drafts, "refreshing");
        Ok(Some(StoreRequest::LoadInitial))
    }

    /// Lands an initial or refreshed page, replacing the live sequence.
    pub fn complete_initial(
        &mut self,
        result: Result<Vec<Entry>, StoreError>,
    ) -> Result<(), StoreError> {
        if !matches!(
            self.state,
            TimelineState::LoadingInitial | TimelineState::Refreshing
        ) {
            tracing::debug!(timeline = %self.id, state = %self.state, "ignoring stale initial page");
            return Ok(());
        }
        self.state = TimelineState::Idle;
        let entries = result?;
        tracing::info!(timeline = %self.id, count = entries.len(), "initial page loaded");
        self.live = entries;
        self.selected = None;
        self.anchor.request(AnchorMode::SnapToBottom);
        self.reconcile();
        Ok(())
    }

    /// Splices an older page ahead of the earliest entry, keeping the
    /// viewport visually still.
    pub fn complete_older(&mut self, result: Result<Vec<Entry>, StoreError>) -> Result<(), StoreError> {
        if self.state != TimelineState::LoadingOlder {
            tracing::debug!(timeline = %self.id, state = %self.state, "ignoring stale older page");
            return Ok(());
        }
        self.state = TimelineState::Idle;
        let mut older = result?;
        tracing::info!(timeline = %self.id, count = older.len(), "older page loaded");
        older.append(&mut self.live);
        self.live = older;
        self.anchor.request(AnchorMode::PreserveOffset);
        self.reconcile();
        Ok(())
    }

    /// Commits a search term. A blank term clears the filter straight away;
    /// anything else is fetched and shown once [`Timeline::complete_search`]
    /// lands. Only one search may be outstanding.
    pub fn run_search(&mut self, term: &str) -> Result<Option<StoreRequest>, LifecycleError> {
        if let Some(pending) = self.view.pending_term() {
            return Err(LifecycleError::SearchPending(pending.to_string()));
        }
        match self.view.begin(term) {
            SearchStart::Fetch(term) => {
                tracing::debug!(timeline = %self.id, %term, "search committed");
                Ok(Some(StoreRequest::Search { term }))
            }
            SearchStart::Cleared(change) => {
                self.after_view_change(change);
                Ok(None)
            }
        }
    }

    /// Swaps in fetched results. A failure leaves the current view as it was.
    pub fn complete_search(
        &mut self,
        term: &str,
        result: Result<Vec<Entry>, StoreError>,
    ) -> Result<(), StoreError> {
        match result {
            Ok(results) => {
                let change = self.view.finish(term, results);
                self.after_view_change(change);
                Ok(())
            }
            // a search cleared meanwhile has nothing left to report
            Err(err) => {
                if self.view.abandon(term) {
                    Err(err)
                } else {
                    Ok(())
                }
            }
        }
    }

    pub fn clear_search(&mut self) -> bool {
        let change = self.view.clear();
        self.after_view_change(change)
    }

    fn after_view_change(&mut self, change: ViewChange) -> bool {
        if change == ViewChange::Unchanged {
            return false;
        }
        self.selected = None;
        let extent = self.content_extent();
        self.anchor.resnapshot(extent);
        true
    }

    /// Runs the anchor engine against the rendered extent. While a filter is
    /// shown, live mutations are invisible, so snap and preserve requests are
    /// downgraded to a hold that only re-measures; leaving the filter
    /// re-snapshots anyway.
    fn reconcile(&mut self) {
        if self.view.is_active() {
            self.anchor.request(AnchorMode::Hold);
        }
        let extent = self.content_extent();
        let mode = self.anchor.reconcile(extent);
        tracing::trace!(timeline = %self.id, %mode, extent, offset = self.anchor.offset(), "reconciled viewport");
    }
}

#[cfg(test)]
impl Timeline {
    /// Commits a search and lands its results at once.
    pub(crate) fn search_now(&mut self, term: &str) {
        if let Ok(Some(StoreRequest::Search { term })) = self.run_search(term) {
            let results = crate::store::search(&self.live, &term);
            let _ = self.complete_search(&term, Ok(results));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FailureConfig, LatencyConfig};
    use crate::store::EntryStore;
    use assert_matches::assert_matches;

    fn store() -> EntryStore {
        EntryStore::new(&LatencyConfig::default(), &FailureConfig::default())
    }

    fn timeline_with(count: usize) -> (Timeline, EntryStore) {
        let mut store = store();
        let entries = store.load_initial(count).expect("initial page");
        let mut timeline =
            Timeline::new(TimelineId::new(1), "Timeline 1", &TimelineOptions::default())
                .with_entries(entries);
        timeline.set_viewport(40, 10);
        (timeline, store)
    }

    #[test]
    fn initial_page_lands_at_bottom() {
        let (timeline, _) = timeline_with(20);
        assert_eq!(timeline.live().len(), 20);
        assert!(timeline.anchor().at_bottom());
        assert!(timeline.anchor().offset() > 0);
    }

    #[test]
    fn older_page_preserves_visual_position() -> anyhow::Result<()> {
        let (mut timeline, mut store) = timeline_with(20);
        let request = timeline.scroll(-10_000);
        let before = timeline.anchor().offset();
        assert_eq!(before, 0);
        let extent_before = timeline.content_extent();
        let Some(StoreRequest::LoadOlder { before: earliest }) = request else {
            panic!("expected older load, got {request:?}");
        };
        assert_eq!(timeline.state(), TimelineState::LoadingOlder);

        let older = store.load_older(5, earliest)?;
        timeline.complete_older(Ok(older))?;

        assert_eq!(timeline.live().len(), 25);
        assert!(timeline
            .live()
            .windows(2)
            .all(|pair| pair[0].timestamp < pair[1].timestamp));
        let delta = timeline.content_extent() - extent_before;
        assert_eq!(timeline.anchor().offset(), before + delta);
        assert!(!timeline.anchor().at_bottom());
        Ok(())
    }

    #[test]
    fn older_load_is_not_reentrant() {
        let (mut timeline, _) = timeline_with(20);
        assert!(timeline.scroll(-10_000).is_some());
        assert!(timeline.scroll(-1).is_none());
        assert!(timeline.request_older().is_none());
        assert_matches!(
            timeline.refresh(&mut Answer(true)),
            Err(LifecycleError::NotIdle(TimelineState::LoadingOlder))
        );
    }

    #[test]
    fn failed_older_load_keeps_sequence_and_clears_loading() {
        let (mut timeline, _) = timeline_with(20);
        timeline.scroll(-10_000);
        let ids: Vec<_> = timeline.live().iter().map(|entry| entry.id).collect();
        let err = StoreError::Unavailable {
            operation: crate::store::Operation::LoadOlder,
        };
        assert!(timeline.complete_older(Err(err)).is_err());
        assert_eq!(timeline.state(), TimelineState::Idle);
        let after: Vec<_> = timeline.live().iter().map(|entry| entry.id).collect();
        assert_eq!(ids, after);
    }

    #[test]
    fn empty_search_term_reverts_to_live() {
        let (mut timeline, _) = timeline_with(20);
        timeline.search_now("exercise");
        assert!(timeline.is_filtered());
        assert!(timeline.rendered().len() < 20);
        assert_matches!(timeline.run_search(""), Ok(None));
        assert!(!timeline.is_filtered());
        assert_eq!(timeline.rendered().len(), 20);

        timeline.search_now("exercise");
        assert_matches!(timeline.run_search("  \t "), Ok(None));
        assert!(!timeline.is_filtered());
    }

    #[test]
    fn search_results_wait_for_the_store() -> anyhow::Result<()> {
        let (mut timeline, mut store) = timeline_with(20);
        let request = timeline.run_search("read")?;
        assert_eq!(request, Some(StoreRequest::Search { term: "read".into() }));
        assert!(timeline.is_searching());
        assert!(!timeline.is_filtered());
        assert_eq!(timeline.rendered().len(), 20);
        assert_matches!(timeline.run_search("walk"), Err(LifecycleError::SearchPending(term)) if term == "read");

        let found = store.search(timeline.live(), "read")?;
        timeline.complete_search("read", Ok(found))?;
        assert!(!timeline.is_searching());
        assert!(timeline.is_filtered());
        assert!(timeline.anchor().at_bottom());
        assert_eq!(timeline.anchor().extent(), timeline.content_extent());
        Ok(())
    }

    #[test]
    fn failed_search_keeps_current_view() -> anyhow::Result<()> {
        let (mut timeline, _) = timeline_with(20);
        timeline.search_now("read");
        let shown = timeline.rendered().len();
        timeline.run_search("exercise")?;
        let err = StoreError::Unavailable {
            operation: crate::store::Operation::Search,
        };
        assert!(timeline.complete_search("exercise", Err(err)).is_err());
        assert!(!timeline.is_searching());
        assert_eq!(timeline.search_term(), "read");
        assert_eq!(timeline.rendered().len(), shown);
        Ok(())
    }

    #[test]
    fn leaving_search_snaps_back_to_bottom() {
        let (mut timeline, _) = timeline_with(20);
        timeline.scroll(-5);
        timeline.search_now("read");
        assert!(timeline.anchor().at_bottom());
        timeline.scroll(-10_000);
        timeline.clear_search();
        assert!(timeline.anchor().at_bottom());
        assert_eq!(timeline.anchor().extent(), timeline.content_extent());
    }

    #[test]
    fn no_older_load_while_filtered() {
        let (mut timeline, _) = timeline_with(20);
        timeline.search_now("read");
        assert!(timeline.scroll(-10_000).is_none());
        assert_eq!(timeline.state(), TimelineState::Idle);
    }

    #[test]
    fn selection_walks_up_then_triggers_older_load() {
        let (mut timeline, _) = timeline_with(3);
        let last = timeline.selected();
        assert_eq!(last, timeline.live().last().map(|entry| entry.id));
        assert!(timeline.move_selection(-1).is_none());
        assert!(timeline.move_selection(-1).is_none());
        assert_eq!(timeline.selected(), Some(timeline.live()[0].id));
        assert_matches!(timeline.move_selection(-1), Some(StoreRequest::LoadOlder { .. }));
    }

    #[test]
    fn refresh_replaces_live_sequence() -> anyhow::Result<()> {
        let (mut timeline, mut store) = timeline_with(5);
        let request = timeline.refresh(&mut |_: &ConfirmRequest| -> bool {
            panic!("nothing to discard")
        })?;
        assert_eq!(request, Some(StoreRequest::LoadInitial));
        assert_eq!(timeline.state(), TimelineState::Refreshing);
        timeline.complete_initial(Ok(store.load_initial(8)?))?;
        assert_eq!(timeline.live().len(), 8);
        assert_eq!(timeline.state(), TimelineState::Idle);
        Ok(())
    }

    #[test]
    fn refresh_over_unsaved_draft_needs_confirmation() -> anyhow::Result<()> {
        let (mut timeline, mut store) = timeline_with(5);
        let id = timeline.live()[2].id;
        timeline.begin_edit(id)?;
        timeline.change_draft(id, "unsaved words")?;

        let mut asked = Vec::new();
        let request = timeline.refresh(&mut |request: &ConfirmRequest| {
            asked.push(request.clone());
            false
        })?;
        assert_eq!(request, None);
        assert_eq!(asked, vec![ConfirmRequest::DiscardDrafts { count: 1 }]);
        assert_eq!(timeline.state(), TimelineState::Idle);
        assert_eq!(
            timeline.entry(id).and_then(|entry| entry.state.draft()),
            Some("unsaved words")
        );

        assert_eq!(timeline.refresh(&mut Answer(true))?, Some(StoreRequest::LoadInitial));
        timeline.complete_initial(Ok(store.load_initial(5)?))?;
        assert!(timeline.entry(id).is_none());
        Ok(())
    }

    #[test]
    fn refresh_is_refused_while_an_entry_saves() -> anyhow::Result<()> {
        let (mut timeline, _) = timeline_with(5);
        let id = timeline.live()[4].id;
        timeline.begin_edit(id)?;
        timeline.change_draft(id, "in flight")?;
        timeline.save_edit(id)?;
        assert_matches!(timeline.refresh(&mut Answer(true)), Err(LifecycleError::Busy(busy)) if busy == id);
        assert_eq!(timeline.state(), TimelineState::Idle);
        assert!(timeline.entry(id).map(|entry| entry.state.is_saving()).unwrap_or(false));
        Ok(())
    }

    #[test]
    fn display_toggle_under_filter_remeasures() {
        let (mut timeline, _) = timeline_with(20);
        timeline.set_viewport(40, 4);
        timeline.search_now("entry");
        assert!(timeline.anchor().at_bottom());
        timeline.toggle_display(DisplayFlags::TIMESTAMPS);
        let extent = timeline.content_extent();
        assert_eq!(timeline.anchor().extent(), extent);
        assert!(timeline.anchor().offset() <= extent - 4);
        assert!(timeline.anchor().at_bottom());
    }

    #[test]
    fn timestamp_toggle_holds_offset_but_clamps() {
        let (mut timeline, _) = timeline_with(20);
        timeline.scroll(-4);
        let offset = timeline.anchor().offset();
        let extent = timeline.content_extent();
        assert!(!timeline.toggle_display(DisplayFlags::TIMESTAMPS));
        assert!(timeline.content_extent() < extent);
        assert!(timeline.anchor().offset() <= offset);
    }
}

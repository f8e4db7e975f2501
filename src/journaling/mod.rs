use std::time::Duration;

use indexmap::IndexMap;
use time::OffsetDateTime;

use crate::config::AppConfig;
use crate::store::{Entry, EntryId, EntryStore, Operation, StoreError};
use crate::timeline::{
    Confirm, ConfirmRequest, LifecycleError, StoreRequest, Timeline, TimelineId,
    TimelineOptions,
};

mod latency;

pub use latency::LatencyQueue;

#[derive(Debug, Clone)]
pub struct JournalOptions {
    pub initial_page: usize,
    pub older_page: usize,
    pub timeline: TimelineOptions,
}

impl From<&AppConfig> for JournalOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            initial_page: config.initial_page,
            older_page: config.older_page,
            timeline: TimelineOptions::from(config),
        }
    }
}

impl Default for JournalOptions {
    fn default() -> Self {
        Self {
            initial_page: 20,
            older_page: 5,
            timeline: TimelineOptions::default(),
        }
    }
}

/// What the event loop should know after time moved forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEvent {
    BootProgress {
        loaded: usize,
        total: usize,
    },
    Booted {
        timelines: usize,
    },
    Completed {
        timeline: TimelineId,
        operation: Operation,
    },
    Failed {
        timeline: TimelineId,
        error: StoreError,
    },
    /// A continuation arrived for a timeline that no longer exists.
    Dropped {
        timeline: TimelineId,
        operation: Operation,
    },
}

#[derive(Debug)]
enum Pending {
    Boot {
        timeline: TimelineId,
        result: Result<Vec<Entry>, StoreError>,
    },
    Initial {
        timeline: TimelineId,
        result: Result<Vec<Entry>, StoreError>,
    },
    Older {
        timeline: TimelineId,
        result: Result<Vec<Entry>, StoreError>,
    },
    Append {
        timeline: TimelineId,
        result: Result<Entry, StoreError>,
    },
    Save {
        timeline: TimelineId,
        entry: EntryId,
        result: Result<OffsetDateTime, StoreError>,
    },
    Title {
        timeline: TimelineId,
        result: Result<String, StoreError>,
    },
    Search {
        timeline: TimelineId,
        term: String,
        result: Result<Vec<Entry>, StoreError>,
    },
}

impl Pending {
    fn timeline(&self) -> TimelineId {
        match self {
            Pending::Boot { timeline, .. }
            | Pending::Initial { timeline, .. }
            | Pending::Older { timeline, .. }
            | Pending::Append { timeline, .. }
            | Pending::Save { timeline, .. }
            | Pending::Title { timeline, .. }
            | Pending::Search { timeline, .. } => *timeline,
        }
    }

    fn operation(&self) -> Operation {
        match self {
            Pending::Boot { .. } | Pending::Initial { .. } => Operation::LoadInitial,
            Pending::Older { .. } => Operation::LoadOlder,
            Pending::Append { .. } => Operation::CreateEntry,
            Pending::Save { .. } => Operation::SaveEntry,
            Pending::Title { .. } => Operation::SaveTitle,
            Pending::Search { .. } => Operation::Search,
        }
    }
}

#[derive(Debug)]
struct BootProgress {
    total: usize,
    loaded: Vec<Timeline>,
}

/// Owns every mounted timeline, the simulated entry store, and the queue of
/// in-flight store calls.
///
/// Work is single-threaded and cooperative: an operation either updates state
/// immediately or parks its outcome in the latency queue, and
/// [`Journal::poll`] applies whatever has come due. Timeline ids are never
/// reused, so outcomes for a removed timeline are recognised and dropped.
#[derive(Debug)]
pub struct Journal {
    options: JournalOptions,
    store: EntryStore,
    queue: LatencyQueue<Pending>,
    timelines: IndexMap<TimelineId, Timeline>,
    boot: Option<BootProgress>,
    next_id: u64,
}

impl Journal {
    pub fn new(options: JournalOptions, store: EntryStore) -> Self {
        Self {
            options,
            store,
            queue: LatencyQueue::default(),
            timelines: IndexMap::new(),
            boot: None,
            next_id: 1,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let store = EntryStore::new(&config.latency, &config.failures);
        Self::new(JournalOptions::from(config), store)
    }

    pub fn store_mut(&mut self) -> &mut EntryStore {
        &mut self.store
    }

    pub fn pending_calls(&self) -> usize {
        self.queue.len()
    }

    pub fn next_due_in(&self) -> Option<Duration> {
        self.queue.next_due_in()
    }

    pub fn is_booting(&self) -> bool {
        self.boot.is_some()
    }

    /// `(loaded, total)` while booting.
    pub fn boot_progress(&self) -> Option<(usize, usize)> {
        self.boot
            .as_ref()
            .map(|boot| (boot.loaded.len(), boot.total))
    }

    pub fn timelines(&self) -> impl Iterator<Item = &Timeline> {
        self.timelines.values()
    }

    pub fn timeline_ids(&self) -> Vec<TimelineId> {
        self.timelines.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.timelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timelines.is_empty()
    }

    pub fn timeline(&self, id: TimelineId) -> Option<&Timeline> {
        self.timelines.get(&id)
    }

    pub fn timeline_mut(&mut self, id: TimelineId) -> Result<&mut Timeline, LifecycleError> {
        self.timelines
            .get_mut(&id)
            .ok_or(LifecycleError::UnknownTimeline(id))
    }

    /// Fetches `count` timelines one after another; they are mounted together
    /// once the last one arrives.
    pub fn boot(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        tracing::info!(count, "booting timelines");
        self.boot = Some(BootProgress {
            total: count,
            loaded: Vec::with_capacity(count),
        });
        self.schedule_boot_load();
    }

    /// Mounts a new, empty timeline and starts loading its first page.
    pub fn add_timeline(&mut self, title: impl Into<String>) -> TimelineId {
        let id = self.allocate_id();
        let timeline = Timeline::loading(id, title, &self.options.timeline);
        tracing::info!(timeline = %id, title = timeline.title(), "timeline added");
        self.timelines.insert(id, timeline);
        self.dispatch(id, StoreRequest::LoadInitial);
        id
    }

    /// Unmounts a timeline after confirmation. Anything still in flight for
    /// it is discarded when it lands.
    pub fn remove_timeline(
        &mut self,
        id: TimelineId,
        confirm: &mut dyn Confirm,
    ) -> Result<bool, LifecycleError> {
        let title = self.timeline_mut(id)?.title().to_string();
        if !confirm.confirm(&ConfirmRequest::RemoveTimeline { title }) {
            return Ok(false);
        }
        self.timelines.shift_remove(&id);
        tracing::info!(timeline = %id, "timeline removed");
        Ok(true)
    }

    pub fn append(&mut self, id: TimelineId, content: &str) -> Result<bool, LifecycleError> {
        let request = self.timeline_mut(id)?.append(content)?;
        Ok(self.dispatch_opt(id, request))
    }

    pub fn submit_compose(&mut self, id: TimelineId) -> Result<bool, LifecycleError> {
        let request = self.timeline_mut(id)?.submit_compose()?;
        Ok(self.dispatch_opt(id, request))
    }

    pub fn save_edit(&mut self, id: TimelineId, entry: EntryId) -> Result<(), LifecycleError> {
        let request = self.timeline_mut(id)?.save_edit(entry)?;
        self.dispatch(id, request);
        Ok(())
    }

    /// Reloads a timeline's first page. Returns whether a load was issued;
    /// it is not when the user declines to discard unsaved drafts.
    pub fn refresh(
        &mut self,
        id: TimelineId,
        confirm: &mut dyn Confirm,
    ) -> Result<bool, LifecycleError> {
        let request = self.timeline_mut(id)?.refresh(confirm)?;
        Ok(self.dispatch_opt(id, request))
    }

    /// Commits a search term. Returns whether a search call was issued; a
    /// blank term just clears the filter.
    pub fn run_search(&mut self, id: TimelineId, term: &str) -> Result<bool, LifecycleError> {
        let request = self.timeline_mut(id)?.run_search(term)?;
        Ok(self.dispatch_opt(id, request))
    }

    pub fn commit_title(&mut self, id: TimelineId) -> Result<bool, LifecycleError> {
        let request = self.timeline_mut(id)?.commit_title();
        Ok(self.dispatch_opt(id, request))
    }

    /// Scrolls a timeline; landing on the top may start an older-page load.
    pub fn scroll(&mut self, id: TimelineId, delta: isize) -> Result<bool, LifecycleError> {
        let request = self.timeline_mut(id)?.scroll(delta);
        Ok(self.dispatch_opt(id, request))
    }

    pub fn move_selection(&mut self, id: TimelineId, delta: isize) -> Result<bool, LifecycleError> {
        let request = self.timeline_mut(id)?.move_selection(delta);
        Ok(self.dispatch_opt(id, request))
    }

    /// Advances simulated time and applies every continuation that came due.
    pub fn poll(&mut self, elapsed: Duration) -> Vec<JournalEvent> {
        let due = self.queue.advance(elapsed);
        let mut events = Vec::with_capacity(due.len());
        for pending in due {
            self.apply(pending, &mut events);
        }
        events
    }

    fn apply(&mut self, pending: Pending, events: &mut Vec<JournalEvent>) {
        let timeline_id = pending.timeline();
        let operation = pending.operation();

        if let Pending::Boot { timeline, result } = pending {
            self.finish_boot_load(timeline, result, events);
            return;
        }

        let Some(timeline) = self.timelines.get_mut(&timeline_id) else {
            tracing::debug!(timeline = %timeline_id, %operation, "dropping result for removed timeline");
            events.push(JournalEvent::Dropped {
                timeline: timeline_id,
                operation,
            });
            return;
        };

        let outcome = match pending {
            Pending::Initial { result, .. } => timeline.complete_initial(result),
            Pending::Older { result, .. } => timeline.complete_older(result),
            Pending::Append { result, .. } => timeline.complete_append(result),
            Pending::Save { entry, result, .. } => timeline.complete_save(entry, result),
            Pending::Title { result, .. } => timeline.complete_title(result),
            Pending::Search { term, result, .. } => timeline.complete_search(&term, result),
            Pending::Boot { .. } => Ok(()),
        };

        match outcome {
            Ok(()) => events.push(JournalEvent::Completed {
                timeline: timeline_id,
                operation,
            }),
            Err(error) => {
                tracing::warn!(timeline = %timeline_id, %error, "store call failed");
                events.push(JournalEvent::Failed {
                    timeline: timeline_id,
                    error,
                });
            }
        }
    }

    fn finish_boot_load(
        &mut self,
        id: TimelineId,
        result: Result<Vec<Entry>, StoreError>,
        events: &mut Vec<JournalEvent>,
    ) {
        let Some(boot) = self.boot.as_mut() else {
            return;
        };
        let title = format!("Timeline {}", boot.loaded.len() + 1);
        let timeline = Timeline::new(id, title, &self.options.timeline);
        let timeline = match result {
            Ok(entries) => timeline.with_entries(entries),
            Err(error) => {
                tracing::warn!(timeline = %id, %error, "initial load failed during boot");
                events.push(JournalEvent::Failed {
                    timeline: id,
                    error,
                });
                timeline
            }
        };
        boot.loaded.push(timeline);
        let (loaded, total) = (boot.loaded.len(), boot.total);
        events.push(JournalEvent::BootProgress { loaded, total });

        if loaded < total {
            self.schedule_boot_load();
            return;
        }
        if let Some(boot) = self.boot.take() {
            for timeline in boot.loaded {
                self.timelines.insert(timeline.id(), timeline);
            }
        }
        tracing::info!(timelines = total, "boot complete");
        events.push(JournalEvent::Booted { timelines: total });
    }

    fn schedule_boot_load(&mut self) {
        let id = self.allocate_id();
        let result = self.store.load_initial(self.options.initial_page);
        self.queue
            .schedule(self.store.load_latency(), Pending::Boot { timeline: id, result });
    }

    fn dispatch_opt(&mut self, id: TimelineId, request: Option<StoreRequest>) -> bool {
        match request {
            Some(request) => {
                self.dispatch(id, request);
                true
            }
            None => false,
        }
    }

    /// Makes the store call now and parks its outcome behind the simulated
    /// latency for that kind of call.
    fn dispatch(&mut self, timeline: TimelineId, request: StoreRequest) {
        tracing::debug!(timeline = %timeline, ?request, "dispatching store call");
        let (delay, pending) = match request {
            StoreRequest::LoadInitial => (
                self.store.load_latency(),
                Pending::Initial {
                    timeline,
                    result: self.store.load_initial(self.options.initial_page),
                },
            ),
            StoreRequest::LoadOlder { before } => (
                self.store.load_latency(),
                Pending::Older {
                    timeline,
                    result: self.store.load_older(self.options.older_page, before),
                },
            ),
            StoreRequest::CreateEntry { content } => (
                self.store.write_latency(),
                Pending::Append {
                    timeline,
                    result: self.store.create_entry(&content),
                },
            ),
            StoreRequest::SaveEntry { entry, content } => (
                self.store.write_latency(),
                Pending::Save {
                    timeline,
                    entry,
                    result: self.store.save_entry(entry, &content),
                },
            ),
            StoreRequest::SaveTitle { title } => (
                self.store.write_latency(),
                Pending::Title {
                    timeline,
                    result: self.store.save_title(&title),
                },
            ),
            StoreRequest::Search { term } => {
                let live = self
                    .timelines
                    .get(&timeline)
                    .map(Timeline::live)
                    .unwrap_or_default();
                let result = self.store.search(live, &term);
                (
                    self.store.load_latency(),
                    Pending::Search {
                        timeline,
                        term,
                        result,
                    },
                )
            }
        };
        self.queue.schedule(delay, pending);
    }

    fn allocate_id(&mut self) -> TimelineId {
        let id = TimelineId::new(self.next_id);
        self.next_id += 1;
        id
    }
}

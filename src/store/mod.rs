use std::time::Duration;

use strum::{AsRefStr, Display};
use thiserror::Error;
use time::OffsetDateTime;

use crate::config::{FailureConfig, LatencyConfig};
use crate::highlight::build_term_regex;

mod entry;

pub use entry::{Entry, EntryId, EntryState};

const ENTRIES_PER_DAY: usize = 3;
const HOURS_BETWEEN_ENTRIES: i64 = 3;

const PHRASES: &[&str] = &[
    "Read book",
    "Exercise",
    "Wrote morning pages",
    "Walked outside",
    "Planned the week",
    "Called family",
    "Cooked dinner",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Operation {
    LoadInitial,
    LoadOlder,
    CreateEntry,
    SaveEntry,
    SaveTitle,
    Search,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("entry store unavailable during {operation}")]
    Unavailable { operation: Operation },
}

/// In-memory stand-in for a remote entry store.
///
/// Every call resolves immediately with its outcome; the caller is expected
/// to hold the outcome back for [`EntryStore::load_latency`] or
/// [`EntryStore::write_latency`] before applying it.
#[derive(Debug)]
pub struct EntryStore {
    load_latency: Duration,
    write_latency: Duration,
    fail_every: u32,
    calls: u64,
    fail_next: bool,
    older_serial: u64,
}

impl EntryStore {
    pub fn new(latency: &LatencyConfig, failures: &FailureConfig) -> Self {
        Self {
            load_latency: latency.load_duration(),
            write_latency: latency.write_duration(),
            fail_every: failures.every_nth,
            calls: 0,
            fail_next: false,
            older_serial: 0,
        }
    }

    pub fn load_latency(&self) -> Duration {
        self.load_latency
    }

    pub fn write_latency(&self) -> Duration {
        self.write_latency
    }

    /// Forces the next call, whatever it is, to fail.
    pub fn fail_next(&mut self) {
        self.fail_next = true;
    }

    /// Returns `count` entries, oldest first, grouped three to a day with the
    /// newest group landing on today.
    pub fn load_initial(&mut self, count: usize) -> Result<Vec<Entry>, StoreError> {
        self.check(Operation::LoadInitial)?;
        let now = OffsetDateTime::now_utc();
        let days = count.div_ceil(ENTRIES_PER_DAY);
        let entries = (0..count)
            .map(|idx| {
                let days_back = (days - 1 - idx / ENTRIES_PER_DAY) as i64;
                let slot = (idx % ENTRIES_PER_DAY) as i64;
                let hours_back = (ENTRIES_PER_DAY as i64 - 1 - slot) * HOURS_BETWEEN_ENTRIES;
                let timestamp =
                    now - time::Duration::days(days_back) - time::Duration::hours(hours_back);
                Entry::at(
                    format!("Entry {}: {}", idx + 1, PHRASES[idx % PHRASES.len()]),
                    timestamp,
                )
            })
            .collect();
        tracing::debug!(count, "generated initial page");
        Ok(entries)
    }

    /// Returns `count` entries strictly older than `before` (or now), oldest
    /// first, ready to be spliced ahead of the current earliest entry.
    pub fn load_older(
        &mut self,
        count: usize,
        before: Option<OffsetDateTime>,
    ) -> Result<Vec<Entry>, StoreError> {
        self.check(Operation::LoadOlder)?;
        let anchor = before.unwrap_or_else(OffsetDateTime::now_utc);
        let mut entries = Vec::with_capacity(count);
        for idx in 0..count {
            self.older_serial += 1;
            let days_back = 1 + (idx / ENTRIES_PER_DAY) as i64;
            let hours_back = (idx % ENTRIES_PER_DAY) as i64 * HOURS_BETWEEN_ENTRIES;
            let timestamp =
                anchor - time::Duration::days(days_back) - time::Duration::hours(hours_back);
            let phrase = PHRASES[self.older_serial as usize % PHRASES.len()];
            entries.push(Entry::at(
                format!("Older entry {}: {}", self.older_serial, phrase),
                timestamp,
            ));
        }
        entries.reverse();
        tracing::debug!(count, "generated older page");
        Ok(entries)
    }

    pub fn create_entry(&mut self, content: &str) -> Result<Entry, StoreError> {
        self.check(Operation::CreateEntry)?;
        Ok(Entry::new(content))
    }

    /// Accepts new content for an entry and returns the refreshed timestamp.
    pub fn save_entry(&mut self, id: EntryId, content: &str) -> Result<OffsetDateTime, StoreError> {
        self.check(Operation::SaveEntry)?;
        tracing::debug!(entry = %id, bytes = content.len(), "accepted entry save");
        Ok(OffsetDateTime::now_utc())
    }

    pub fn save_title(&mut self, title: &str) -> Result<String, StoreError> {
        self.check(Operation::SaveTitle)?;
        Ok(title.to_string())
    }

    /// Filters `entries` the way a remote search endpoint would, subject to
    /// the same failure injection as every other call.
    pub fn search(&mut self, entries: &[Entry], term: &str) -> Result<Vec<Entry>, StoreError> {
        self.check(Operation::Search)?;
        let matches = search(entries, term);
        tracing::debug!(term, matches = matches.len(), "searched entries");
        Ok(matches)
    }

    fn check(&mut self, operation: Operation) -> Result<(), StoreError> {
        self.calls += 1;
        let scheduled_failure =
            self.fail_every != 0 && self.calls % u64::from(self.fail_every) == 0;
        if std::mem::take(&mut self.fail_next) || scheduled_failure {
            tracing::debug!(%operation, call = self.calls, "injecting store failure");
            return Err(StoreError::Unavailable { operation });
        }
        Ok(())
    }
}

/// Case-insensitive substring filter over entry content, preserving order.
///
/// An empty term matches everything; callers that treat an empty term as
/// "no filter" must check for it themselves.
pub fn search(entries: &[Entry], term: &str) -> Vec<Entry> {
    let Some(matcher) = build_term_regex(term) else {
        return entries.to_vec();
    };
    entries
        .iter()
        .filter(|entry| matcher.is_match(&entry.content))
        .cloned()
        .collect()
}

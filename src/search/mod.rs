use crate::store::Entry;

/// Chooses which dataset a timeline renders: the live sequence, or a search
/// result set shadowing it.
///
/// Results are a snapshot taken when the search was committed. An empty result
/// set still counts as an active filter and renders as "no entries". While a
/// fetch is outstanding the previous view stays on screen.
#[derive(Debug, Clone, Default)]
pub struct SearchView {
    term: String,
    results: Option<Vec<Entry>>,
    pending: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewChange {
    /// The rendered dataset was swapped (filter applied, replaced or removed).
    Switched,
    /// Nothing visible changed.
    Unchanged,
}

/// What committing a term asks of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchStart {
    /// Results for this (trimmed) term must be fetched.
    Fetch(String),
    /// The term was blank, so the filter was dropped on the spot.
    Cleared(ViewChange),
}

impl SearchView {
    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn is_active(&self) -> bool {
        self.results.is_some()
    }

    pub fn results(&self) -> Option<&[Entry]> {
        self.results.as_deref()
    }

    pub fn pending_term(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Commits a term. Blank (or whitespace-only) terms clear the filter.
    pub fn begin(&mut self, term: &str) -> SearchStart {
        let term = term.trim();
        if term.is_empty() {
            return SearchStart::Cleared(self.clear());
        }
        self.pending = Some(term.to_string());
        SearchStart::Fetch(term.to_string())
    }

    /// Lands results for the pending term. Results for a term that is no
    /// longer pending (cleared or replaced meanwhile) are ignored.
    pub fn finish(&mut self, term: &str, results: Vec<Entry>) -> ViewChange {
        if self.pending.as_deref() != Some(term) {
            tracing::debug!(term, "ignoring stale search results");
            return ViewChange::Unchanged;
        }
        self.pending = None;
        tracing::debug!(term, matches = results.len(), "search results landed");
        self.term = term.to_string();
        self.results = Some(results);
        ViewChange::Switched
    }

    /// Forgets a failed fetch. The current view is left as it was.
    pub fn abandon(&mut self, term: &str) -> bool {
        if self.pending.as_deref() == Some(term) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) -> ViewChange {
        self.term.clear();
        self.pending = None;
        if self.results.take().is_some() {
            ViewChange::Switched
        } else {
            ViewChange::Unchanged
        }
    }

    pub fn rendered<'a>(&'a self, live: &'a [Entry]) -> &'a [Entry] {
        self.results.as_deref().unwrap_or(live)
    }
}

//! Shadow state: the guard's local cache of quote attributes.
//!
//! Events carry partial attributes, so entries are merged field by field and
//! never replaced wholesale. Only a full resync swaps the whole set.

use std::collections::BTreeMap;

use crate::domain::models::{Quote, QuoteId, QuotePatch};

/// Outcome of applying a change to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Entry did not exist and was created from defaults plus the patch
    Created,
    /// Entry existed and at least one field changed
    Changed,
    /// Entry existed and the patch was already reflected
    Unchanged,
    /// Entry was removed
    Removed,
    /// Delete for an entry that was never observed
    Absent,
}

impl MergeOutcome {
    /// True for outcomes that modified the store.
    pub fn changed_state(self) -> bool {
        matches!(self, Self::Created | Self::Changed | Self::Removed)
    }
}

/// Per-guard cache of the last known attributes of each quote.
///
/// Iteration order is by quote id, which keeps snapshots stable across
/// identical histories.
#[derive(Debug, Clone, Default)]
pub struct ShadowStateStore {
    entries: BTreeMap<QuoteId, Quote>,
}

impl ShadowStateStore {
    /// Create a new instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from a full quote set.
    pub fn from_quotes(quotes: impl IntoIterator<Item = Quote>) -> Self {
        let mut store = Self::new();
        store.replace_all(quotes);
        store
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if the quote has an entry.
    pub fn contains(&self, id: &QuoteId) -> bool {
        self.entries.contains_key(id)
    }

    /// Entry for a quote.
    pub fn get(&self, id: &QuoteId) -> Option<&Quote> {
        self.entries.get(id)
    }

    /// Merge a partial update, creating the entry from defaults if absent.
    pub fn merge(&mut self, id: &QuoteId, patch: &QuotePatch) -> MergeOutcome {
        match self.entries.get_mut(id) {
            Some(existing) => {
                let before = existing.clone();
                existing.apply(patch);
                if *existing == before {
                    MergeOutcome::Unchanged
                } else {
                    MergeOutcome::Changed
                }
            }
            None => {
                let mut quote = Quote::with_defaults(id.clone());
                quote.apply(patch);
                self.entries.insert(id.clone(), quote);
                MergeOutcome::Created
            }
        }
    }

    /// Drop an entry.
    pub fn remove(&mut self, id: &QuoteId) -> MergeOutcome {
        if self.entries.remove(id).is_some() {
            MergeOutcome::Removed
        } else {
            MergeOutcome::Absent
        }
    }

    /// Swap in a fresh authoritative quote set. Entries missing from it are
    /// dropped.
    pub fn replace_all(&mut self, quotes: impl IntoIterator<Item = Quote>) {
        self.entries = quotes.into_iter().map(|q| (q.id.clone(), q)).collect();
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Current full quote list, ordered by id.
    pub fn snapshot(&self) -> Vec<Quote> {
        self.entries.values().cloned().collect()
    }
}

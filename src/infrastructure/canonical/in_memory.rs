//! In-process canonical state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::models::{EngagementId, QuoteDto, RouteStateDto};
use crate::domain::ports::{CanonicalStateError, CanonicalStateService};

/// Canonical state held in process memory.
///
/// Backs the `replay` command and tests. Engagements that were never seeded
/// answer `NotFound`.
#[derive(Default)]
pub struct InMemoryCanonicalState {
    engagements: RwLock<HashMap<EngagementId, RouteStateDto>>,
    unavailable: AtomicBool,
    fetches: AtomicU64,
}

impl InMemoryCanonicalState {
    /// Create a new instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the quote set of an engagement, keeping any precomputed route.
    pub fn set_quotes(&self, engagement_id: &EngagementId, quotes: Vec<QuoteDto>) {
        if let Ok(mut engagements) = self.engagements.write() {
            engagements.entry(engagement_id.clone()).or_default().quotes = quotes;
        }
    }

    /// Insert or replace one quote.
    pub fn upsert_quote(&self, engagement_id: &EngagementId, quote: QuoteDto) {
        if let Ok(mut engagements) = self.engagements.write() {
            let state = engagements.entry(engagement_id.clone()).or_default();
            match state.quotes.iter_mut().find(|q| q.id == quote.id) {
                Some(existing) => *existing = quote,
                None => state.quotes.push(quote),
            }
        }
    }

    /// Drop one quote, if present.
    pub fn remove_quote(&self, engagement_id: &EngagementId, quote_id: &str) {
        if let Ok(mut engagements) = self.engagements.write() {
            if let Some(state) = engagements.get_mut(engagement_id) {
                state.quotes.retain(|q| q.id != quote_id);
            }
        }
    }

    /// Set or clear the route the service reports as decided.
    pub fn set_precomputed_route(&self, engagement_id: &EngagementId, route: Option<String>) {
        if let Ok(mut engagements) = self.engagements.write() {
            engagements
                .entry(engagement_id.clone())
                .or_default()
                .precomputed_route = route;
        }
    }

    /// Simulate an outage; fetches fail with a transient error while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of fetches served or refused so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CanonicalStateService for InMemoryCanonicalState {
    async fn fetch_route_state(
        &self,
        engagement_id: &EngagementId,
    ) -> Result<RouteStateDto, CanonicalStateError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CanonicalStateError::Unavailable(
                "in-memory canonical state offline".to_string(),
            ));
        }

        let engagements = self
            .engagements
            .read()
            .map_err(|e| CanonicalStateError::Unavailable(e.to_string()))?;
        engagements
            .get(engagement_id)
            .cloned()
            .ok_or_else(|| CanonicalStateError::NotFound(engagement_id.clone()))
    }
}

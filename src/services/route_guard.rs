//! Route guard: decides whether the displayed route is still the right one.
//!
//! This is the synchronous core. It owns the shadow state for one
//! (engagement, observer) pair, the "redirecting" one-shot gate and the
//! render gate. Serialization of calls is the job of
//! [`crate::services::guard_actor`]; nothing here is shared.
//!
//! Lifecycle:
//!
//! ```text
//! Uninitialized --initialize(match)--> Ready --event(mismatch)--> Redirecting
//!       |                                ^                            |
//!       +--initialize(mismatch)--> Redirecting --initialize(new route)+
//! ```
//!
//! While `Redirecting`, events and resyncs are dropped rather than queued:
//! once the replacement lands, a fresh `initialize` runs for the new route.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::errors::MalformedEvent;
use crate::domain::models::{
    Baseline, EngagementId, ObserverId, Quote, QuoteChange, QuoteEvent, QuoteEventDto, QuoteId,
    QuotePatch, Route, RouteTarget,
};
use crate::domain::ports::{CanonicalStateError, NavigationSink};
use crate::services::route_table::RouteTable;
use crate::services::shadow_state::{MergeOutcome, ShadowStateStore};
use crate::services::stage_resolver;

/// Lifecycle phase of a guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardPhase {
    /// No route has been validated yet; render the placeholder
    Uninitialized,
    /// The displayed route is valid; stage content may render
    Ready,
    /// A route replacement has been issued and not yet observed
    Redirecting,
    /// Unmounted; nothing further is processed
    TornDown,
}

impl GuardPhase {
    /// Borrow as a string slice.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Ready => "ready",
            Self::Redirecting => "redirecting",
            Self::TornDown => "torn_down",
        }
    }
}

impl std::fmt::Display for GuardPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a guard operation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Displayed route is correct
    Matched,
    /// A route replacement was issued
    Navigated(Route),
    /// State did not change, so nothing was re-evaluated
    Unchanged,
    /// Applied to shadow state, but no route has been validated yet
    Deferred,
    /// Dropped: a navigation is in flight or the guard is torn down
    Ignored,
    /// Event could not be applied; a full resync is needed
    ResyncRequired(MalformedEvent),
}

impl GuardOutcome {
    /// The route navigated to, if any.
    pub fn navigated(&self) -> Option<&Route> {
        match self {
            Self::Navigated(route) => Some(route),
            _ => None,
        }
    }
}

/// Observable state of a guard, published after every operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardStatus {
    /// Engagement id
    pub engagement_id: EngagementId,
    /// Observer id
    pub observer_id: ObserverId,
    /// Lifecycle phase
    pub phase: GuardPhase,
    /// Render gate consumed by the presentation layer
    pub ready_to_render: bool,
    /// Route the client is displaying
    pub current_route: Option<Route>,
    /// Route the guard last decided on
    pub target_route: Option<Route>,
    /// Target computed client-side, if the last decision was computed here
    pub last_target: Option<RouteTarget>,
    /// Entries in shadow state
    pub quotes_tracked: usize,
    /// Route replacements issued
    pub navigations: u64,
    /// Events and resyncs applied
    pub events_applied: u64,
    /// Full resyncs applied
    pub resyncs: u64,
    /// Time of the last change
    pub updated_at: DateTime<Utc>,
}

/// Route guard for one (engagement, observer) pair.
pub struct RouteGuard {
    engagement_id: EngagementId,
    observer_id: ObserverId,
    routes: RouteTable,
    navigator: Arc<dyn NavigationSink>,
    shadow: ShadowStateStore,
    phase: GuardPhase,
    current_route: Option<Route>,
    target_route: Option<Route>,
    last_target: Option<RouteTarget>,
    navigations: u64,
    events_applied: u64,
    resyncs: u64,
    updated_at: DateTime<Utc>,
}

impl RouteGuard {
    /// Uninitialized guard with empty shadow state.
    pub fn new(
        engagement_id: EngagementId,
        observer_id: ObserverId,
        routes: RouteTable,
        navigator: Arc<dyn NavigationSink>,
    ) -> Self {
        Self {
            engagement_id,
            observer_id,
            routes,
            navigator,
            shadow: ShadowStateStore::new(),
            phase: GuardPhase::Uninitialized,
            current_route: None,
            target_route: None,
            last_target: None,
            navigations: 0,
            events_applied: 0,
            resyncs: 0,
            updated_at: Utc::now(),
        }
    }

    /// Engagement this belongs to.
    pub fn engagement_id(&self) -> &EngagementId {
        &self.engagement_id
    }

    /// Observer this belongs to.
    pub fn observer_id(&self) -> ObserverId {
        self.observer_id
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> GuardPhase {
        self.phase
    }

    /// Render gate: true only while `Ready`.
    pub fn ready_to_render(&self) -> bool {
        self.phase == GuardPhase::Ready
    }

    /// Current shadow state, ordered by quote id.
    pub fn snapshot(&self) -> Vec<Quote> {
        self.shadow.snapshot()
    }

    /// Snapshot of observable state.
    pub fn status(&self) -> GuardStatus {
        GuardStatus {
            engagement_id: self.engagement_id.clone(),
            observer_id: self.observer_id,
            phase: self.phase,
            ready_to_render: self.ready_to_render(),
            current_route: self.current_route.clone(),
            target_route: self.target_route.clone(),
            last_target: self.last_target.clone(),
            quotes_tracked: self.shadow.len(),
            navigations: self.navigations,
            events_applied: self.events_applied,
            resyncs: self.resyncs,
            updated_at: self.updated_at,
        }
    }

    /// Validate the displayed route before first paint.
    ///
    /// A server-precomputed route is compared as-is and never recomputed. A
    /// failed baseline fetch fails open to the pending route. Any previous
    /// `Redirecting` phase is cleared: this is the fresh run on the new route.
    pub fn initialize(
        &mut self,
        baseline: Result<Baseline, CanonicalStateError>,
        current_route: Route,
    ) -> GuardOutcome {
        if self.phase == GuardPhase::TornDown {
            return GuardOutcome::Ignored;
        }

        self.current_route = Some(current_route.clone());
        self.phase = GuardPhase::Uninitialized;

        let target = match baseline {
            Ok(baseline) => {
                self.shadow.replace_all(baseline.quotes);
                match baseline.precomputed_route {
                    Some(route) => {
                        debug!(
                            engagement_id = %self.engagement_id,
                            route = %route,
                            "using precomputed route"
                        );
                        self.last_target = None;
                        route
                    }
                    None => self.compute_target(),
                }
            }
            Err(err) => {
                warn!(
                    engagement_id = %self.engagement_id,
                    observer_id = %self.observer_id,
                    error = %err,
                    "baseline fetch failed, falling back to pending route"
                );
                self.last_target = None;
                self.routes.fallback_route(&self.engagement_id)
            }
        };

        self.settle(target)
    }

    /// Merge a partial quote update and re-evaluate the route.
    ///
    /// Creates the entry from defaults when the quote has not been seen.
    pub fn on_quote_event(&mut self, quote_id: &QuoteId, patch: &QuotePatch) -> GuardOutcome {
        if let Some(outcome) = self.gate() {
            return outcome;
        }
        let merged = self.shadow.merge(quote_id, patch);
        self.after_merge(merged)
    }

    /// Apply a validated bridge event.
    pub fn apply_event(&mut self, event: QuoteEvent) -> GuardOutcome {
        if let Some(outcome) = self.gate() {
            return outcome;
        }

        let merged = match event.change {
            QuoteChange::Insert(patch) => self.shadow.merge(&event.quote_id, &patch),
            QuoteChange::Update(patch) => {
                if !self.shadow.contains(&event.quote_id) {
                    return self.malformed(MalformedEvent::UnknownQuote(event.quote_id));
                }
                self.shadow.merge(&event.quote_id, &patch)
            }
            QuoteChange::Delete => self.shadow.remove(&event.quote_id),
        };
        self.after_merge(merged)
    }

    /// Normalize and apply a raw bridge event.
    pub fn ingest(&mut self, dto: QuoteEventDto) -> GuardOutcome {
        if let Some(outcome) = self.gate() {
            return outcome;
        }
        match QuoteEvent::try_from(dto) {
            Ok(event) => self.apply_event(event),
            Err(err) => self.malformed(err),
        }
    }

    /// Replace shadow state with a freshly fetched full quote set and
    /// re-evaluate, with the same gating as an event.
    pub fn apply_resync(&mut self, baseline: Baseline) -> GuardOutcome {
        if let Some(outcome) = self.gate() {
            return outcome;
        }

        self.resyncs += 1;
        let before = self.shadow.snapshot();
        self.shadow.replace_all(baseline.quotes);
        let merged = if before == self.shadow.snapshot() {
            MergeOutcome::Unchanged
        } else {
            MergeOutcome::Changed
        };

        // An unchanged set keeps the last decision, including a precomputed one.
        self.after_merge(merged)
    }

    /// Stop processing. A navigation already issued is left to complete.
    pub fn teardown(&mut self) {
        if self.phase != GuardPhase::TornDown {
            info!(
                engagement_id = %self.engagement_id,
                observer_id = %self.observer_id,
                navigations = self.navigations,
                "route guard torn down"
            );
        }
        self.phase = GuardPhase::TornDown;
        self.shadow.clear();
        self.touch();
    }

    fn gate(&self) -> Option<GuardOutcome> {
        match self.phase {
            GuardPhase::Redirecting => {
                debug!(
                    engagement_id = %self.engagement_id,
                    "navigation in flight, dropping update"
                );
                Some(GuardOutcome::Ignored)
            }
            GuardPhase::TornDown => Some(GuardOutcome::Ignored),
            GuardPhase::Uninitialized | GuardPhase::Ready => None,
        }
    }

    fn malformed(&mut self, err: MalformedEvent) -> GuardOutcome {
        warn!(
            engagement_id = %self.engagement_id,
            observer_id = %self.observer_id,
            error = %err,
            "malformed event, resync required"
        );
        GuardOutcome::ResyncRequired(err)
    }

    fn after_merge(&mut self, merged: MergeOutcome) -> GuardOutcome {
        self.events_applied += 1;
        self.touch();

        if self.phase == GuardPhase::Uninitialized {
            return GuardOutcome::Deferred;
        }
        if !merged.changed_state() {
            return GuardOutcome::Unchanged;
        }

        let target = self.compute_target();
        self.settle(target)
    }

    fn compute_target(&mut self) -> Route {
        let target = stage_resolver::resolve_target(&self.shadow.snapshot());
        let route = self.routes.route_for(&self.engagement_id, &target);
        self.last_target = Some(target);
        route
    }

    /// Compare a target route with the displayed one and navigate on mismatch.
    fn settle(&mut self, target: Route) -> GuardOutcome {
        self.target_route = Some(target.clone());
        self.touch();

        if self.current_route.as_ref() == Some(&target) {
            self.phase = GuardPhase::Ready;
            return GuardOutcome::Matched;
        }

        if self.phase == GuardPhase::Redirecting {
            return GuardOutcome::Ignored;
        }

        self.phase = GuardPhase::Redirecting;
        self.navigations += 1;
        info!(
            engagement_id = %self.engagement_id,
            observer_id = %self.observer_id,
            from = ?self.current_route.as_ref().map(Route::as_str),
            to = %target,
            target = ?self.last_target,
            "replacing route"
        );
        self.navigator.replace_route(&target);
        GuardOutcome::Navigated(target)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{CanonicalStatus, Stage};
    use crate::infrastructure::navigation::RecordingNavigator;

    fn guard() -> (RouteGuard, Arc<RecordingNavigator>) {
        let navigator = Arc::new(RecordingNavigator::new());
        let guard = RouteGuard::new(
            EngagementId::new("e1"),
            ObserverId::new(),
            RouteTable::default(),
            navigator.clone(),
        );
        (guard, navigator)
    }

    fn route(stage: &str) -> Route {
        Route::new(format!("/engagements/e1/{stage}"))
    }

    #[test]
    fn test_initialize_match_is_ready() {
        let (mut guard, nav) = guard();
        let baseline = Baseline::from_quotes(vec![Quote::new("a", CanonicalStatus::Pending)]);

        let outcome = guard.initialize(Ok(baseline), route("offerings"));

        assert_eq!(outcome, GuardOutcome::Matched);
        assert!(guard.ready_to_render());
        assert!(nav.routes().is_empty());
        assert_eq!(
            guard.status().last_target,
            Some(RouteTarget::stage(Stage::Pending))
        );
    }

    #[test]
    fn test_initialize_mismatch_redirects_and_blocks_render() {
        let (mut guard, nav) = guard();
        let baseline = Baseline::from_quotes(vec![Quote::new("a", CanonicalStatus::Closing)]);

        let outcome = guard.initialize(Ok(baseline), route("offerings"));

        assert_eq!(outcome, GuardOutcome::Navigated(route("closing")));
        assert_eq!(guard.phase(), GuardPhase::Redirecting);
        assert!(!guard.ready_to_render());
        assert_eq!(nav.routes(), vec![route("closing")]);
    }

    #[test]
    fn test_precomputed_route_is_trusted() {
        let (mut guard, nav) = guard();
        // Client-side this would resolve to closing; the server says otherwise.
        let baseline = Baseline::from_quotes(vec![Quote::new("a", CanonicalStatus::Closing)])
            .with_precomputed_route("/engagements/e1/negotiation/");

        let outcome = guard.initialize(Ok(baseline), route("negotiation"));

        assert_eq!(outcome, GuardOutcome::Matched);
        assert!(nav.routes().is_empty());
        assert!(guard.status().last_target.is_none());
    }

    #[test]
    fn test_baseline_failure_fails_open_to_pending() {
        let (mut guard, nav) = guard();

        let outcome = guard.initialize(
            Err(CanonicalStateError::Timeout),
            route("offerings"),
        );
        assert_eq!(outcome, GuardOutcome::Matched);
        assert!(guard.ready_to_render());

        let (mut other, other_nav) = self::guard();
        let outcome = other.initialize(Err(CanonicalStateError::Timeout), route("closing"));
        assert_eq!(outcome, GuardOutcome::Navigated(route("offerings")));
        assert!(nav.routes().is_empty());
        assert_eq!(other_nav.routes(), vec![route("offerings")]);
    }

    #[test]
    fn test_second_mismatch_while_redirecting_is_dropped() {
        let (mut guard, nav) = guard();
        guard.initialize(Ok(Baseline::default()), route("offerings"));

        let first = guard.on_quote_event(
            &QuoteId::new("a"),
            &QuotePatch::new().status(CanonicalStatus::Negotiating),
        );
        let second = guard.on_quote_event(
            &QuoteId::new("b"),
            &QuotePatch::new().status(CanonicalStatus::Closing),
        );

        assert_eq!(first, GuardOutcome::Navigated(route("negotiation")));
        assert_eq!(second, GuardOutcome::Ignored);
        assert_eq!(nav.routes().len(), 1);
        assert_eq!(guard.status().navigations, 1);
    }

    #[test]
    fn test_duplicate_event_does_not_reevaluate() {
        let (mut guard, nav) = guard();
        guard.initialize(
            Ok(Baseline::from_quotes(vec![Quote::new("a", CanonicalStatus::Negotiating)])),
            route("negotiation"),
        );

        let patch = QuotePatch::new().status(CanonicalStatus::Negotiating);
        assert_eq!(
            guard.on_quote_event(&QuoteId::new("a"), &patch),
            GuardOutcome::Unchanged
        );
        assert_eq!(
            guard.on_quote_event(&QuoteId::new("a"), &patch),
            GuardOutcome::Unchanged
        );
        assert!(nav.routes().is_empty());
        assert!(guard.ready_to_render());
    }

    #[test]
    fn test_no_redirect_loop_after_reinitialize() {
        let (mut guard, nav) = guard();
        let quotes = vec![Quote::new("a", CanonicalStatus::Closing)];

        let first = guard.initialize(Ok(Baseline::from_quotes(quotes.clone())), route("offerings"));
        let landed = first.navigated().cloned().unwrap();

        let second = guard.initialize(Ok(Baseline::from_quotes(quotes)), landed);

        assert_eq!(second, GuardOutcome::Matched);
        assert_eq!(nav.routes().len(), 1);
        assert!(guard.ready_to_render());
    }

    #[test]
    fn test_update_for_unknown_quote_requires_resync() {
        let (mut guard, nav) = guard();
        guard.initialize(Ok(Baseline::default()), route("offerings"));

        let outcome = guard.apply_event(QuoteEvent::update(
            "ghost",
            QuotePatch::new().status(CanonicalStatus::Closing),
        ));

        assert_eq!(
            outcome,
            GuardOutcome::ResyncRequired(MalformedEvent::UnknownQuote(QuoteId::new("ghost")))
        );
        assert!(nav.routes().is_empty());
        assert!(guard.snapshot().is_empty());
    }

    #[test]
    fn test_duplicate_delete_is_harmless() {
        let (mut guard, nav) = guard();
        guard.initialize(
            Ok(Baseline::from_quotes(vec![
                Quote::new("a", CanonicalStatus::Pending),
                Quote::new("b", CanonicalStatus::Pending),
            ])),
            route("offerings"),
        );

        assert_eq!(guard.apply_event(QuoteEvent::delete("b")), GuardOutcome::Matched);
        assert_eq!(guard.apply_event(QuoteEvent::delete("b")), GuardOutcome::Unchanged);
        assert!(nav.routes().is_empty());
    }

    #[test]
    fn test_events_before_initialize_are_deferred() {
        let (mut guard, nav) = guard();

        let outcome = guard.on_quote_event(
            &QuoteId::new("a"),
            &QuotePatch::new().status(CanonicalStatus::Closing),
        );

        assert_eq!(outcome, GuardOutcome::Deferred);
        assert!(nav.routes().is_empty());
        assert!(!guard.ready_to_render());
        assert_eq!(guard.snapshot().len(), 1);
    }

    #[test]
    fn test_resync_corrects_stale_route() {
        let (mut guard, nav) = guard();
        guard.initialize(Ok(Baseline::default()), route("offerings"));

        let outcome = guard.apply_resync(Baseline::from_quotes(vec![
            Quote::new("a", CanonicalStatus::Approved).linked_to("p9"),
        ]));

        assert_eq!(outcome, GuardOutcome::Navigated(Route::new("/projects/p9")));
        assert_eq!(nav.routes(), vec![Route::new("/projects/p9")]);
        assert_eq!(guard.status().resyncs, 1);
    }

    #[test]
    fn test_resync_keeps_precomputed_decision_until_quotes_change() {
        let (mut guard, nav) = guard();
        // Client-side these quotes resolve to closing; the server says offerings.
        let quotes = vec![Quote::new("a", CanonicalStatus::Closing)];
        let baseline = || {
            Baseline::from_quotes(quotes.clone()).with_precomputed_route(route("offerings"))
        };

        for _ in 0..3 {
            assert_eq!(
                guard.initialize(Ok(baseline()), route("offerings")),
                GuardOutcome::Matched
            );
            assert_eq!(
                guard.apply_resync(Baseline::from_quotes(quotes.clone())),
                GuardOutcome::Unchanged
            );
        }

        assert!(nav.routes().is_empty());
        assert!(guard.ready_to_render());
        assert_eq!(guard.status().resyncs, 3);

        let moved = guard.apply_resync(Baseline::from_quotes(vec![
            Quote::new("a", CanonicalStatus::Negotiating),
        ]));
        assert_eq!(moved, GuardOutcome::Navigated(route("negotiation")));
        assert_eq!(nav.routes().len(), 1);
    }

    #[test]
    fn test_teardown_ignores_everything() {
        let (mut guard, nav) = guard();
        guard.initialize(Ok(Baseline::default()), route("offerings"));
        guard.teardown();

        let patch = QuotePatch::new().status(CanonicalStatus::Closing);
        assert_eq!(
            guard.on_quote_event(&QuoteId::new("a"), &patch),
            GuardOutcome::Ignored
        );
        assert_eq!(
            guard.initialize(Ok(Baseline::default()), route("closing")),
            GuardOutcome::Ignored
        );
        assert_eq!(guard.phase(), GuardPhase::TornDown);
        assert!(nav.routes().is_empty());
    }
}

//! Property tests for stage resolution.

use proptest::prelude::*;
use stagegate::domain::models::{Baseline, CanonicalStatus, Quote, QuoteDto, RouteStateDto, Stage};
use stagegate::services::stage_resolver::{resolve, resolve_target};

fn status() -> impl Strategy<Value = CanonicalStatus> {
    prop_oneof![
        Just(CanonicalStatus::Pending),
        Just(CanonicalStatus::Negotiating),
        Just(CanonicalStatus::Closing),
        Just(CanonicalStatus::Approved),
    ]
}

prop_compose! {
    fn quote()(
        id in "[a-f]{1,3}",
        status in status(),
        selected in any::<bool>(),
        visible in any::<bool>(),
        linked in proptest::option::weighted(0.1, "[x-z][0-9]"),
    ) -> Quote {
        let mut quote = Quote::new(id.as_str(), status).selected(selected).visible(visible);
        quote.linked_resource_id = linked;
        quote
    }
}

fn to_dto(quote: &Quote, legacy_alias: bool) -> QuoteDto {
    let mut dto = QuoteDto::from(quote);
    if legacy_alias && quote.status == CanonicalStatus::Closing {
        dto.status = "closing_legacy".to_string();
    }
    dto
}

proptest! {
    /// Property: resolving the same quote set twice gives the same stage
    #[test]
    fn prop_resolve_is_deterministic(quotes in prop::collection::vec(quote(), 0..12)) {
        prop_assert_eq!(resolve(&quotes), resolve(&quotes));
        prop_assert_eq!(resolve_target(&quotes), resolve_target(&quotes));
    }

    /// Property: input order never matters
    #[test]
    fn prop_resolve_is_order_independent(quotes in prop::collection::vec(quote(), 0..12)) {
        let mut reversed = quotes.clone();
        reversed.reverse();
        prop_assert_eq!(resolve(&quotes), resolve(&reversed));
        prop_assert_eq!(resolve_target(&quotes), resolve_target(&reversed));
    }

    /// Property: quotes hidden from the counterpart have no effect
    #[test]
    fn prop_invisible_quotes_are_inert(
        visible in prop::collection::vec(quote(), 0..8),
        hidden in prop::collection::vec(quote(), 0..8),
    ) {
        let hidden: Vec<Quote> = hidden.into_iter().map(|q| q.visible(false)).collect();
        let mut combined = visible.clone();
        combined.extend(hidden.iter().cloned());

        prop_assert_eq!(resolve(&visible), resolve(&combined));
        prop_assert_eq!(resolve_target(&visible), resolve_target(&combined));
        prop_assert_eq!(resolve(&hidden), Stage::Pending);
    }

    /// Property: the legacy closing alias is indistinguishable from closing
    #[test]
    fn prop_legacy_alias_is_equivalent(quotes in prop::collection::vec(quote(), 0..12)) {
        let canonical = Baseline::from(RouteStateDto {
            quotes: quotes.iter().map(|q| to_dto(q, false)).collect(),
            precomputed_route: None,
        });
        let aliased = Baseline::from(RouteStateDto {
            quotes: quotes.iter().map(|q| to_dto(q, true)).collect(),
            precomputed_route: None,
        });

        prop_assert_eq!(resolve(&canonical.quotes), resolve(&aliased.quotes));
        prop_assert_eq!(canonical.quotes, aliased.quotes);
    }

    /// Property: an unselected negotiating quote always wins
    #[test]
    fn prop_open_negotiation_has_priority(
        quotes in prop::collection::vec(quote(), 0..8),
    ) {
        let mut with_negotiation = quotes;
        with_negotiation.push(Quote::new("zz", CanonicalStatus::Negotiating));
        prop_assert_eq!(resolve(&with_negotiation), Stage::Negotiating);
    }

    /// Property: a visible linked quote always takes the client out of the workflow
    #[test]
    fn prop_visible_link_means_exit(quotes in prop::collection::vec(quote(), 0..12)) {
        let linked = quotes
            .iter()
            .any(|q| q.visible_to_counterpart && q.linked_resource_id.is_some());
        prop_assert_eq!(resolve_target(&quotes).is_exit(), linked);
    }
}

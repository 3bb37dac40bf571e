//! Stage resolution.
//!
//! Pure, deterministic and total: any quote set, including an empty one,
//! maps to exactly one [`Stage`]. Quotes not yet published to the
//! counterpart never participate.
//!
//! Priority, first match wins:
//!
//! 1. `Negotiating` - a quote in `negotiating` that the counterpart has not
//!    selected. Selection is the tie-break signal: a picked quote is no longer
//!    in negotiation even if its status has not caught up.
//! 2. `Closing` - any quote in `closing`.
//! 3. `PostApproval` - any quote in `approved`.
//! 4. `Pending` - everything else.

use crate::domain::models::{CanonicalStatus, Quote, RouteTarget, Stage};

/// Resolve the stage for a quote snapshot.
pub fn resolve<'a, I>(quotes: I) -> Stage
where
    I: IntoIterator<Item = &'a Quote>,
{
    let mut closing = false;
    let mut approved = false;

    for quote in quotes.into_iter().filter(|q| q.visible_to_counterpart) {
        match quote.status {
            CanonicalStatus::Negotiating if !quote.selected_by_counterpart => {
                return Stage::Negotiating;
            }
            CanonicalStatus::Closing => closing = true,
            CanonicalStatus::Approved => approved = true,
            CanonicalStatus::Negotiating | CanonicalStatus::Pending => {}
        }
    }

    if closing {
        Stage::Closing
    } else if approved {
        Stage::PostApproval
    } else {
        Stage::Pending
    }
}

/// Resource the engagement has exited to, if any.
///
/// A visible quote carrying a `linked_resource_id` means the engagement has
/// left the negotiation workflow. Approved quotes win over unapproved ones,
/// then the lowest quote id, so the answer does not depend on input order.
pub fn exit_resource<'a, I>(quotes: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a Quote>,
{
    quotes
        .into_iter()
        .filter(|q| q.visible_to_counterpart)
        .filter_map(|q| q.linked_resource_id.as_deref().map(|r| (q, r)))
        .min_by(|(a, _), (b, _)| {
            let a_rank = u8::from(a.status != CanonicalStatus::Approved);
            let b_rank = u8::from(b.status != CanonicalStatus::Approved);
            a_rank.cmp(&b_rank).then_with(|| a.id.cmp(&b.id))
        })
        .map(|(_, resource)| resource)
}

/// Full routing decision: the exit short-circuit first, then the resolver.
pub fn resolve_target(quotes: &[Quote]) -> RouteTarget {
    match exit_resource(quotes) {
        Some(resource_id) => RouteTarget::Exit {
            resource_id: resource_id.to_string(),
        },
        None => RouteTarget::stage(resolve(quotes)),
    }
}

//! Domain errors for the stage engine.
//!
//! None of these ever reach the end user. The worst visible outcome of any
//! of them is a short placeholder before the route converges.

use thiserror::Error;

use super::models::{QuoteId, UnknownStatus};
use super::ports::errors::CanonicalStateError;

/// A bridge event that cannot be applied to shadow state as-is.
///
/// Recovered by a full resync instead of failing the subscription.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedEvent {
    /// No quote id, or a blank one
    #[error("Event is missing a quote id")]
    MissingQuoteId,

    /// Raw status did not normalize
    #[error("Event for quote {quote_id} carries {source}")]
    UnknownStatus {
        /// Quote the event was for
        quote_id: QuoteId,
        /// The rejected raw value
        #[source]
        source: UnknownStatus,
    },

    /// Update for a quote the guard has never seen
    #[error("Update references unknown quote {0}")]
    UnknownQuote(QuoteId),
}

/// Errors returned by route guard operations.
#[derive(Debug, Error)]
pub enum GuardError {
    /// Actor has stopped; the handle is dead
    #[error("Route guard has been torn down")]
    Stopped,

    /// Canonical fetch failed during a resync
    #[error("Canonical state fetch failed: {0}")]
    Fetch(#[from] CanonicalStateError),
}

/// Result of a guard operation.
pub type GuardResult<T> = Result<T, GuardError>;

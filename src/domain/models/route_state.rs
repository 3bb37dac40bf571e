//! Wire shapes exchanged with the canonical state service and the event
//! bridge, plus their validated domain counterparts.
//!
//! Raw statuses are normalized here and nowhere else.

use serde::{Deserialize, Deserializer, Serialize};

use super::quote::{CanonicalStatus, Quote, QuoteId, QuotePatch};
use super::stage::Route;
use crate::domain::errors::MalformedEvent;

/// One quote as returned by `GET /engagement/{id}/route-state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteDto {
    /// Quote id
    pub id: String,
    /// Raw, not yet normalized
    pub status: String,
    /// Selected by counterpart
    #[serde(default)]
    pub selected_by_counterpart: bool,
    /// Defaults to true when absent
    #[serde(default = "default_visible")]
    pub visible_to_counterpart: bool,
    /// Linked resource id
    #[serde(default)]
    pub linked_resource_id: Option<String>,
}

const fn default_visible() -> bool {
    true
}

impl From<&Quote> for QuoteDto {
    fn from(quote: &Quote) -> Self {
        Self {
            id: quote.id.as_str().to_string(),
            status: quote.status.as_str().to_string(),
            selected_by_counterpart: quote.selected_by_counterpart,
            visible_to_counterpart: quote.visible_to_counterpart,
            linked_resource_id: quote.linked_resource_id.clone(),
        }
    }
}

/// Response body of the canonical route-state endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteStateDto {
    /// Every quote of the engagement
    #[serde(default)]
    pub quotes: Vec<QuoteDto>,
    /// Route the server already decided on, if any
    #[serde(default)]
    pub precomputed_route: Option<String>,
}

/// Normalized baseline for a guard: the full quote set and, optionally, the
/// route the server already decided on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Baseline {
    /// Normalized quotes; unknown statuses already dropped
    pub quotes: Vec<Quote>,
    /// Precomputed route
    pub precomputed_route: Option<Route>,
}

impl Baseline {
    /// Baseline without a precomputed route.
    pub fn from_quotes(quotes: Vec<Quote>) -> Self {
        Self {
            quotes,
            precomputed_route: None,
        }
    }

    /// Attach a route already decided by the server.
    pub fn with_precomputed_route(mut self, route: impl Into<Route>) -> Self {
        self.precomputed_route = Some(route.into());
        self
    }
}

impl From<RouteStateDto> for Baseline {
    fn from(dto: RouteStateDto) -> Self {
        let quotes = dto
            .quotes
            .into_iter()
            .filter_map(|q| match CanonicalStatus::normalize(&q.status) {
                Ok(status) => Some(Quote {
                    id: QuoteId(q.id),
                    status,
                    selected_by_counterpart: q.selected_by_counterpart,
                    visible_to_counterpart: q.visible_to_counterpart,
                    linked_resource_id: q.linked_resource_id,
                }),
                Err(err) => {
                    tracing::warn!(quote_id = %q.id, error = %err, "skipping quote with unknown status");
                    None
                }
            })
            .collect();

        Self {
            quotes,
            precomputed_route: dto
                .precomputed_route
                .filter(|r| !r.trim().is_empty())
                .map(Route::new),
        }
    }
}

/// Kind of change carried by a bridge event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// New quote
    Insert,
    /// Partial change to a quote
    Update,
    /// Quote removed
    Delete,
}

/// Partial quote attributes as they appear on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteAttributesDto {
    /// Raw status, normalized on ingestion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Selected by counterpart
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_by_counterpart: Option<bool>,
    /// Visible to counterpart
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_to_counterpart: Option<bool>,
    /// Absent keeps the cached value; explicit `null` clears it.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub linked_resource_id: Option<Option<String>>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Change notification as delivered by the event bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteEventDto {
    /// Missing ids are malformed
    #[serde(default)]
    pub quote_id: Option<String>,
    /// Change type
    pub change_type: ChangeType,
    /// Ignored for deletes
    #[serde(default)]
    pub attributes: QuoteAttributesDto,
}

/// Validated change to a single quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuoteChange {
    /// Quote first observed; fields default
    Insert(QuotePatch),
    /// Change to a quote already in shadow state
    Update(QuotePatch),
    /// Delete
    Delete,
}

/// Validated bridge event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteEvent {
    /// Quote the change applies to
    pub quote_id: QuoteId,
    /// Normalized change
    pub change: QuoteChange,
}

impl QuoteEvent {
    /// Insert event.
    pub fn insert(quote_id: impl Into<QuoteId>, patch: QuotePatch) -> Self {
        Self {
            quote_id: quote_id.into(),
            change: QuoteChange::Insert(patch),
        }
    }

    /// Update event.
    pub fn update(quote_id: impl Into<QuoteId>, patch: QuotePatch) -> Self {
        Self {
            quote_id: quote_id.into(),
            change: QuoteChange::Update(patch),
        }
    }

    /// Delete event.
    pub fn delete(quote_id: impl Into<QuoteId>) -> Self {
        Self {
            quote_id: quote_id.into(),
            change: QuoteChange::Delete,
        }
    }
}

impl TryFrom<QuoteAttributesDto> for QuotePatch {
    type Error = crate::domain::models::quote::UnknownStatus;

    fn try_from(dto: QuoteAttributesDto) -> Result<Self, Self::Error> {
        let status = dto
            .status
            .as_deref()
            .map(CanonicalStatus::normalize)
            .transpose()?;

        Ok(Self {
            status,
            selected_by_counterpart: dto.selected_by_counterpart,
            visible_to_counterpart: dto.visible_to_counterpart,
            linked_resource_id: dto.linked_resource_id,
        })
    }
}

impl TryFrom<QuoteEventDto> for QuoteEvent {
    type Error = MalformedEvent;

    fn try_from(dto: QuoteEventDto) -> Result<Self, Self::Error> {
        let quote_id = match dto.quote_id {
            Some(id) if !id.trim().is_empty() => QuoteId(id),
            _ => return Err(MalformedEvent::MissingQuoteId),
        };

        let change = match dto.change_type {
            ChangeType::Delete => QuoteChange::Delete,
            kind => {
                let patch = QuotePatch::try_from(dto.attributes).map_err(|source| {
                    MalformedEvent::UnknownStatus {
                        quote_id: quote_id.clone(),
                        source,
                    }
                })?;
                if kind == ChangeType::Insert {
                    QuoteChange::Insert(patch)
                } else {
                    QuoteChange::Update(patch)
                }
            }
        };

        Ok(Self { quote_id, change })
    }
}

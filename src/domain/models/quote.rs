//! Quote domain model.
//!
//! A quote is one priced proposal inside an engagement. The stage engine only
//! ever sees the projection of a quote that matters for routing: its
//! normalized status, whether the counterpart picked it, whether it has been
//! published, and whether a downstream resource was created from it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Stable identifier of a quote, as issued by the canonical service.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuoteId(pub String);

impl QuoteId {
    /// Create a new instance.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QuoteId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Raw status value that could not be mapped onto [`CanonicalStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown quote status: {0:?}")]
pub struct UnknownStatus(pub String);

/// Closed set of quote statuses the resolver reasons about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalStatus {
    /// Not yet in play
    #[default]
    Pending,
    /// Open for back-and-forth
    Negotiating,
    /// Picked and being finalized
    Closing,
    /// Accepted by the counterpart
    Approved,
}

impl CanonicalStatus {
    /// Deprecated stored value that must be read as `closing`.
    pub const LEGACY_CLOSING_ALIAS: &'static str = "closing_legacy";

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Negotiating => "negotiating",
            Self::Closing => "closing",
            Self::Approved => "approved",
        }
    }

    /// Map a raw server status onto the canonical enum.
    ///
    /// Applied at every ingestion boundary (baseline load and each event),
    /// unconditionally. The legacy `closing_legacy` alias becomes `Closing`;
    /// every other known value passes through.
    pub fn normalize(raw: &str) -> Result<Self, UnknownStatus> {
        match raw.trim().to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "negotiating" => Ok(Self::Negotiating),
            "closing" | Self::LEGACY_CLOSING_ALIAS => Ok(Self::Closing),
            "approved" => Ok(Self::Approved),
            _ => Err(UnknownStatus(raw.to_string())),
        }
    }
}

impl FromStr for CanonicalStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::normalize(s)
    }
}

impl fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routing-relevant projection of a quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Id
    pub id: QuoteId,
    /// Normalized status
    pub status: CanonicalStatus,
    /// Counterpart explicitly picked this quote
    #[serde(default)]
    pub selected_by_counterpart: bool,
    /// Published to the counterpart
    #[serde(default = "default_visible")]
    pub visible_to_counterpart: bool,
    /// Downstream resource created from this quote
    #[serde(default)]
    pub linked_resource_id: Option<String>,
}

const fn default_visible() -> bool {
    true
}

impl Quote {
    /// A published, unselected quote with no downstream resource.
    pub fn new(id: impl Into<QuoteId>, status: CanonicalStatus) -> Self {
        Self {
            id: id.into(),
            status,
            selected_by_counterpart: false,
            visible_to_counterpart: true,
            linked_resource_id: None,
        }
    }

    /// Defaults used when a quote is first observed through a partial event.
    pub fn with_defaults(id: QuoteId) -> Self {
        Self::new(id, CanonicalStatus::default())
    }

    /// Set whether the counterpart selected the quote.
    pub fn selected(mut self, selected: bool) -> Self {
        self.selected_by_counterpart = selected;
        self
    }

    /// Set whether the quote is published.
    pub fn visible(mut self, visible: bool) -> Self {
        self.visible_to_counterpart = visible;
        self
    }

    /// Link a downstream resource.
    pub fn linked_to(mut self, resource_id: impl Into<String>) -> Self {
        self.linked_resource_id = Some(resource_id.into());
        self
    }

    /// Apply a partial update. Fields the patch leaves unset are untouched.
    pub fn apply(&mut self, patch: &QuotePatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(selected) = patch.selected_by_counterpart {
            self.selected_by_counterpart = selected;
        }
        if let Some(visible) = patch.visible_to_counterpart {
            self.visible_to_counterpart = visible;
        }
        if let Some(ref linked) = patch.linked_resource_id {
            self.linked_resource_id.clone_from(linked);
        }
    }
}

/// Partial set of quote attributes carried by a change event.
///
/// `linked_resource_id` is doubly optional: `None` leaves the cached value
/// alone, `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuotePatch {
    /// New status, already normalized
    pub status: Option<CanonicalStatus>,
    /// Selected by counterpart
    pub selected_by_counterpart: Option<bool>,
    /// Visible to counterpart
    pub visible_to_counterpart: Option<bool>,
    /// `Some(None)` clears the link
    pub linked_resource_id: Option<Option<String>>,
}

impl QuotePatch {
    /// Empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the status.
    pub fn status(mut self, status: CanonicalStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Set whether the counterpart selected the quote.
    pub fn selected(mut self, selected: bool) -> Self {
        self.selected_by_counterpart = Some(selected);
        self
    }

    /// Set whether the quote is published.
    pub fn visible(mut self, visible: bool) -> Self {
        self.visible_to_counterpart = Some(visible);
        self
    }

    /// Link a downstream resource.
    pub fn linked_to(mut self, resource_id: impl Into<String>) -> Self {
        self.linked_resource_id = Some(Some(resource_id.into()));
        self
    }

    /// Clear the linked resource.
    pub fn unlinked(mut self) -> Self {
        self.linked_resource_id = Some(None);
        self
    }

    /// True if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.selected_by_counterpart.is_none()
            && self.visible_to_counterpart.is_none()
            && self.linked_resource_id.is_none()
    }
}

//! Boundary to the external collaborator that navigates the source and extracts raw item data.

#[cfg(feature = "http-source")]
pub mod http;
pub mod models;
#[cfg(test)]
pub mod scripted;

use std::time::Duration;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::state::item::TrackedItemId;

pub use self::models::{Breadcrumb, ExtractionScope, RawExtraction, RawStatics};

/// Result alias for collaborator calls.
pub type FetchResult<T> = Result<T, FetchError>;

/// Failures surfaced by the collaborator or by the orchestrator around it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The call did not complete within its hard timeout.
    #[error("fetch of `{item_id}` timed out after {after:?}")]
    Timeout {
        /// Item being fetched.
        item_id: TrackedItemId,
        /// Timeout that elapsed.
        after: Duration,
    },
    /// Fields were absent or malformed, or the collaborator reported an extraction error.
    #[error("extraction failed for `{item_id}`: {reason}")]
    ExtractionFailure {
        /// Item being fetched.
        item_id: TrackedItemId,
        /// Human-readable cause.
        reason: String,
    },
    /// The collaborator itself cannot be reached.
    #[error("item source unavailable: {0}")]
    Unavailable(String),
}

impl FetchError {
    /// Convenience constructor for [`FetchError::ExtractionFailure`].
    pub fn extraction(item_id: &TrackedItemId, reason: impl Into<String>) -> Self {
        Self::ExtractionFailure {
            item_id: item_id.clone(),
            reason: reason.into(),
        }
    }
}

/// One extraction call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    /// Item to extract.
    pub item_id: TrackedItemId,
    /// Whether static attributes are needed.
    pub scope: ExtractionScope,
    /// How long the collaborator may wait for the page to become ready before extracting
    /// whatever is present.
    pub readiness_timeout: Duration,
}

/// External collaborator producing raw extracted text for one item.
pub trait ItemSource: Send + Sync {
    /// Extract the fields requested by `request`. Best effort: missing fields come back empty.
    fn extract(&self, request: ExtractionRequest) -> BoxFuture<'static, FetchResult<RawExtraction>>;

    /// Cheap liveness probe used by the source supervisor.
    fn health_check(&self) -> BoxFuture<'static, FetchResult<()>>;
}

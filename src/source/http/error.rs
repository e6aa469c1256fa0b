//! Error types for the HTTP extraction client.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

use crate::{source::FetchError, state::item::TrackedItemId};

/// Convenient result alias returning [`HttpSourceError`] failures.
pub type HttpSourceResult<T> = Result<T, HttpSourceError>;

/// Failures that can occur while talking to the extraction sidecar.
#[derive(Debug, Error)]
pub enum HttpSourceError {
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build extraction client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// The request could not be sent or timed out in transit.
    #[error("failed to send extraction request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// The sidecar answered with an unexpected status code.
    #[error("unexpected extraction response status {status} for `{path}`")]
    RequestStatus { path: String, status: StatusCode },
    /// The response body was not a valid extraction payload.
    #[error("failed to decode extraction response for `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
}

impl HttpSourceError {
    /// Map onto the collaborator-level taxonomy for `item_id`'s fetch; `after` is the client
    /// timeout reported when the request timed out.
    pub fn into_fetch_error(self, item_id: &TrackedItemId, after: Duration) -> FetchError {
        match self {
            HttpSourceError::RequestSend { ref source, .. } if source.is_timeout() => {
                FetchError::Timeout {
                    item_id: item_id.clone(),
                    after,
                }
            }
            HttpSourceError::ClientBuilder { .. } | HttpSourceError::RequestSend { .. } => {
                FetchError::Unavailable(self.to_string())
            }
            HttpSourceError::RequestStatus { .. } | HttpSourceError::DecodeResponse { .. } => {
                FetchError::extraction(item_id, self.to_string())
            }
        }
    }
}

impl From<HttpSourceError> for FetchError {
    fn from(err: HttpSourceError) -> Self {
        FetchError::Unavailable(err.to_string())
    }
}

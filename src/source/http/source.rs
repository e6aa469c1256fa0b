use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};

use crate::source::{
    ExtractionRequest, FetchError, FetchResult, ItemSource, RawExtraction,
};

use super::{
    config::HttpSourceConfig,
    error::{HttpSourceError, HttpSourceResult},
};

/// [`ItemSource`] that delegates navigation and extraction to a sidecar over HTTP.
///
/// The sidecar exposes `GET /extract/{key}?scope=&ready_timeout_ms=` returning a
/// [`RawExtraction`] body, and `GET /health` answering `200` once its browser is ready.
#[derive(Clone)]
pub struct HttpItemSource {
    client: Client,
    base_url: Arc<str>,
    request_timeout: Duration,
}

impl HttpItemSource {
    /// Build the HTTP client for `config`.
    pub fn new(config: HttpSourceConfig) -> HttpSourceResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|source| HttpSourceError::ClientBuilder { source })?;

        Ok(Self {
            client,
            base_url: Arc::<str>::from(config.base_url.trim_end_matches('/')),
            request_timeout: config.request_timeout,
        })
    }

    async fn fetch_extraction(&self, request: &ExtractionRequest) -> HttpSourceResult<RawExtraction> {
        let path = format!("extract/{}", request.item_id.source_key());
        let url = format!("{}/{}", self.base_url, path);
        let ready_timeout_ms = request.readiness_timeout.as_millis().to_string();

        let response = self
            .client
            .get(url)
            .query(&[
                ("scope", request.scope.as_str()),
                ("ready_timeout_ms", ready_timeout_ms.as_str()),
            ])
            .send()
            .await
            .map_err(|source| HttpSourceError::RequestSend {
                path: path.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(HttpSourceError::RequestStatus {
                path,
                status: response.status(),
            });
        }

        response
            .json::<RawExtraction>()
            .await
            .map_err(|source| HttpSourceError::DecodeResponse { path, source })
    }

    async fn probe(&self) -> HttpSourceResult<()> {
        let path = "health".to_string();
        let url = format!("{}/{}", self.base_url, path);
        let response =
            self.client
                .get(url)
                .send()
                .await
                .map_err(|source| HttpSourceError::RequestSend {
                    path: path.clone(),
                    source,
                })?;

        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
            status => Err(HttpSourceError::RequestStatus { path, status }),
        }
    }
}

impl ItemSource for HttpItemSource {
    fn extract(&self, request: ExtractionRequest) -> BoxFuture<'static, FetchResult<RawExtraction>> {
        let source = self.clone();
        Box::pin(async move {
            source
                .fetch_extraction(&request)
                .await
                .map_err(|err| err.into_fetch_error(&request.item_id, source.request_timeout))
        })
    }

    fn health_check(&self) -> BoxFuture<'static, FetchResult<()>> {
        let source = self.clone();
        Box::pin(async move { source.probe().await.map_err(FetchError::from) })
    }
}

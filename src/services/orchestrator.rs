//! One fetch pass over the tracked set: cache-aware extraction, bounded retries and
//! per-item isolation.

use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use indexmap::IndexMap;
use tokio::{sync::Semaphore, time::timeout};
use tracing::{debug, warn};

use crate::{
    config::AppConfig,
    services::{
        extraction,
        retry::{RetryOutcome, RetryPolicy, retry_until},
    },
    source::{ExtractionRequest, ExtractionScope, FetchError, FetchResult, ItemSource, RawExtraction},
    state::{
        cache::StaticFieldCache,
        clock::Clock,
        diff::reconcile,
        item::{ItemState, RawSnapshot, TrackedItemId, VolatileFields},
        item_store::ItemStore,
    },
};

/// Per-item outcome of a cycle.
pub type CycleResults = IndexMap<TrackedItemId, Result<ItemState, FetchError>>;

/// Timeouts, retry schedule and limits used by [`FetchOrchestrator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Simultaneous extractions allowed.
    pub concurrency: usize,
    /// Hard timeout for a full extraction.
    pub full_timeout: Duration,
    /// Hard timeout for one volatile attempt.
    pub volatile_timeout: Duration,
    /// Readiness wait forwarded to the collaborator.
    pub readiness_timeout: Duration,
    /// Volatile retry schedule.
    pub retry: RetryPolicy,
    /// Alert window length.
    pub alert_window: Duration,
    /// Base for relative competition links.
    pub source_origin: String,
}

impl From<&AppConfig> for OrchestratorSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            concurrency: config.fetch_concurrency.max(1),
            full_timeout: config.full_fetch_timeout,
            volatile_timeout: config.volatile_fetch_timeout,
            readiness_timeout: config.readiness_timeout,
            retry: config.volatile_retry(),
            alert_window: config.alert_window,
            source_origin: config.source_origin.clone(),
        }
    }
}

/// Drives extraction for every tracked item and merges results into the item store.
pub struct FetchOrchestrator {
    source: Arc<dyn ItemSource>,
    cache: Arc<StaticFieldCache>,
    items: Arc<ItemStore>,
    clock: Arc<dyn Clock>,
    settings: OrchestratorSettings,
    permits: Semaphore,
}

impl FetchOrchestrator {
    /// Bind the orchestrator to its collaborators.
    pub fn new(
        source: Arc<dyn ItemSource>,
        cache: Arc<StaticFieldCache>,
        items: Arc<ItemStore>,
        clock: Arc<dyn Clock>,
        settings: OrchestratorSettings,
    ) -> Self {
        let permits = Semaphore::new(settings.concurrency.max(1));
        Self {
            source,
            cache,
            items,
            clock,
            settings,
            permits,
        }
    }

    /// Settings in effect.
    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Refresh every id in `tracked`, in parallel up to the concurrency limit.
    ///
    /// A failing item keeps its previous state in the store and reports the error in the
    /// result map; other items are unaffected. An empty input never touches the source.
    pub async fn run_cycle(&self, tracked: &[TrackedItemId]) -> CycleResults {
        if tracked.is_empty() {
            return CycleResults::new();
        }

        let fetches = tracked.iter().map(|item_id| async move {
            let result = self.refresh_item(item_id).await;
            (item_id.clone(), result)
        });

        join_all(fetches).await.into_iter().collect()
    }

    /// Fetch one item and merge it with its previous state.
    pub async fn refresh_item(&self, item_id: &TrackedItemId) -> Result<ItemState, FetchError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| FetchError::Unavailable("fetch permits closed".into()))?;

        let snapshot = match self.cache.get(item_id, self.clock.now()) {
            Some(static_fields) => {
                let volatile = self.fetch_volatile(item_id, self.settings.retry).await?;
                RawSnapshot {
                    item_id: item_id.clone(),
                    static_fields,
                    volatile,
                }
            }
            None => self.fetch_full(item_id).await?,
        };

        let previous = self.items.get(item_id).await;
        let state = reconcile(
            previous.as_ref(),
            snapshot,
            self.clock.now(),
            self.settings.alert_window,
        );
        self.items.upsert(state.clone()).await;
        Ok(state)
    }

    /// Cache miss path: static and volatile fields in one extraction, then populate the cache.
    async fn fetch_full(&self, item_id: &TrackedItemId) -> FetchResult<RawSnapshot> {
        let raw = self
            .extract(item_id, ExtractionScope::Full, self.settings.full_timeout)
            .await?;
        let static_fields = extraction::static_fields(&raw, &self.settings.source_origin)
            .ok_or_else(|| FetchError::extraction(item_id, "full extraction returned no static fields"))?;
        self.cache
            .put(item_id.clone(), static_fields.clone(), self.clock.now());

        let volatile = if extraction::has_valid_scores(&raw) {
            extraction::volatile_fields(&raw)
        } else {
            // The full extraction consumed the first attempt.
            let remaining = self.settings.retry.max_attempts.saturating_sub(1);
            if remaining == 0 {
                extraction::volatile_fields(&raw)
            } else {
                self.fetch_volatile(item_id, self.settings.retry.with_attempts(remaining))
                    .await
                    .unwrap_or_else(|err| {
                        debug!(item_id = %item_id, error = %err, "volatile retries failed after full extraction");
                        extraction::volatile_fields(&raw)
                    })
            }
        };

        Ok(RawSnapshot {
            item_id: item_id.clone(),
            static_fields,
            volatile,
        })
    }

    /// Cache hit path: volatile-only extraction with bounded retry on invalid scores.
    async fn fetch_volatile(
        &self,
        item_id: &TrackedItemId,
        policy: RetryPolicy,
    ) -> FetchResult<VolatileFields> {
        let outcome = retry_until(
            policy,
            |_attempt| {
                self.extract(
                    item_id,
                    ExtractionScope::VolatileOnly,
                    self.settings.volatile_timeout,
                )
            },
            extraction::has_valid_scores,
        )
        .await;

        match outcome {
            RetryOutcome::Accepted { value, .. } => Ok(extraction::volatile_fields(&value)),
            RetryOutcome::Rejected { value, attempts } => {
                warn!(item_id = %item_id, attempts, "no attempt produced valid scores; using placeholders");
                Ok(extraction::volatile_fields(&value))
            }
            RetryOutcome::Failed { error, .. } => Err(error),
        }
    }

    async fn extract(
        &self,
        item_id: &TrackedItemId,
        scope: ExtractionScope,
        limit: Duration,
    ) -> FetchResult<RawExtraction> {
        let request = ExtractionRequest {
            item_id: item_id.clone(),
            scope,
            readiness_timeout: self.settings.readiness_timeout,
        };

        match timeout(limit, self.source.extract(request)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                item_id: item_id.clone(),
                after: limit,
            }),
        }
    }
}

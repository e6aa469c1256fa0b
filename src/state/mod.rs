//! Shared application state: registry, caches, item states, connected clients and
//! request/response outboxes.

pub mod cache;
pub mod clock;
pub mod cycle_gate;
pub mod diff;
pub mod item;
pub mod item_store;
pub mod registry;
mod sse;

use std::{collections::VecDeque, sync::Arc, time::SystemTime};

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    services::orchestrator::FetchOrchestrator,
    source::ItemSource,
    state::{
        cache::StaticFieldCache,
        clock::Clock,
        cycle_gate::CycleGate,
        item::TrackedItemId,
        item_store::ItemStore,
        registry::{ClientKey, TrackedRegistry},
    },
};

pub use self::sse::SseHub;

pub type SharedState = Arc<AppState>;

/// Capacity of the display SSE broadcast channel.
const SSE_CAPACITY: usize = 16;

#[derive(Clone)]
/// Handle used to push messages to a connected sync client.
pub struct ClientConnection {
    /// Per-connection identifier.
    pub id: Uuid,
    /// Stable contribution key; several connections may share it.
    pub key: ClientKey,
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Removal notices waiting for one request/response client.
#[derive(Debug, Clone)]
pub struct PollOutbox {
    /// Ids the client still has to drop, oldest first.
    pub pending: VecDeque<TrackedItemId>,
    /// Time of the client's latest poll.
    pub last_seen: SystemTime,
}

impl PollOutbox {
    /// Empty outbox for a client seen at `now`.
    pub fn new(now: SystemTime) -> Self {
        Self {
            pending: VecDeque::new(),
            last_seen: now,
        }
    }
}

/// Service object owning every piece of shared sync state.
///
/// Constructed once in `main` (or per test) and handed to routes and background tasks as
/// [`SharedState`].
pub struct AppState {
    config: Arc<AppConfig>,
    clock: Arc<dyn Clock>,
    source: Arc<dyn ItemSource>,
    registry: TrackedRegistry,
    cache: Arc<StaticFieldCache>,
    items: Arc<ItemStore>,
    orchestrator: FetchOrchestrator,
    clients: DashMap<Uuid, ClientConnection>,
    poll_outboxes: DashMap<ClientKey, PollOutbox>,
    sse: SseHub,
    cycle_gate: CycleGate,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The service starts out healthy; the source supervisor flips it to degraded when probes
    /// fail.
    pub fn new(config: AppConfig, source: Arc<dyn ItemSource>, clock: Arc<dyn Clock>) -> SharedState {
        let config = Arc::new(config);
        let cache = Arc::new(StaticFieldCache::new(config.cache_ttl));
        let items = Arc::new(ItemStore::new());
        let orchestrator = FetchOrchestrator::new(
            source.clone(),
            cache.clone(),
            items.clone(),
            clock.clone(),
            (&*config).into(),
        );
        let (degraded_tx, _rx) = watch::channel(false);

        Arc::new(Self {
            registry: TrackedRegistry::new(config.removal_policy, config.tombstone_ttl),
            config,
            clock,
            source,
            cache,
            items,
            orchestrator,
            clients: DashMap::new(),
            poll_outboxes: DashMap::new(),
            sse: SseHub::new(SSE_CAPACITY),
            cycle_gate: CycleGate::new(),
            degraded: degraded_tx,
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    /// Time source for every expiry decision.
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Collaborator producing raw item data.
    pub fn source(&self) -> &Arc<dyn ItemSource> {
        &self.source
    }

    /// Effective tracked set and per-client contributions.
    pub fn registry(&self) -> &TrackedRegistry {
        &self.registry
    }

    /// Static-field cache.
    pub fn cache(&self) -> &StaticFieldCache {
        &self.cache
    }

    /// Authoritative item states.
    pub fn items(&self) -> &ItemStore {
        &self.items
    }

    /// Fetch orchestrator bound to this state's cache, store and source.
    pub fn orchestrator(&self) -> &FetchOrchestrator {
        &self.orchestrator
    }

    /// Registry of open push connections keyed by connection id.
    pub fn clients(&self) -> &DashMap<Uuid, ClientConnection> {
        &self.clients
    }

    /// Removal notices waiting for request/response clients.
    pub fn poll_outboxes(&self) -> &DashMap<ClientKey, PollOutbox> {
        &self.poll_outboxes
    }

    /// Broadcast hub used for the display SSE stream.
    pub fn sse(&self) -> &SseHub {
        &self.sse
    }

    /// Single-cycle guard and trigger.
    pub fn cycle_gate(&self) -> &CycleGate {
        &self.cycle_gate
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update the degraded flag, returning whether it changed.
    pub fn update_degraded(&self, value: bool) -> bool {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        })
    }
}

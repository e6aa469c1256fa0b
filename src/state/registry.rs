//! Set of item ids currently requested by any client.

use std::{
    collections::HashMap,
    fmt,
    time::{Duration, SystemTime},
};

use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::state::item::TrackedItemId;

/// Default time a removed id stays blocked from resurrection by stale `sync` messages.
pub const DEFAULT_TOMBSTONE_TTL: Duration = Duration::from_secs(10 * 60);

/// Stable identity of a client contribution (survives reconnects when the client reuses it).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientKey(String);

impl ClientKey {
    /// Wrap a raw client key.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow the raw key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// How an explicit removal affects the other clients tracking the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    /// Any explicit removal evicts the id for everyone.
    #[default]
    Global,
    /// A removal only withdraws the caller's interest; the id is evicted once nobody wants it.
    PerClient,
}

/// Outcome of [`TrackedRegistry::remove`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    /// The id left the effective set and must be dropped from fetching and caches.
    pub evicted: bool,
    /// Other clients that had declared the id before the removal.
    pub affected: Vec<ClientKey>,
}

/// Outcome of [`TrackedRegistry::sync`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Ids that entered the effective set.
    pub added: Vec<TrackedItemId>,
    /// Ids that left the effective set because no client declares them anymore.
    pub evicted: Vec<TrackedItemId>,
    /// Declared ids refused because they were explicitly removed recently.
    pub rejected: Vec<TrackedItemId>,
}

impl SyncOutcome {
    /// Whether the effective set changed.
    pub fn changed(&self) -> bool {
        !self.added.is_empty() || !self.evicted.is_empty()
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    wanted: IndexMap<TrackedItemId, IndexSet<ClientKey>>,
    tombstones: HashMap<TrackedItemId, SystemTime>,
}

impl RegistryInner {
    fn is_tombstoned(&self, item_id: &TrackedItemId, now: SystemTime) -> bool {
        self.tombstones
            .get(item_id)
            .is_some_and(|expires| now < *expires)
    }
}

/// Thread-safe registry; the effective set is the union of every client's declared ids.
#[derive(Debug)]
pub struct TrackedRegistry {
    policy: RemovalPolicy,
    tombstone_ttl: Duration,
    inner: RwLock<RegistryInner>,
}

impl TrackedRegistry {
    /// Create an empty registry.
    pub fn new(policy: RemovalPolicy, tombstone_ttl: Duration) -> Self {
        Self {
            policy,
            tombstone_ttl,
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    /// Active removal policy.
    pub fn policy(&self) -> RemovalPolicy {
        self.policy
    }

    /// Declare interest in `item_id`. Returns `true` when the id newly entered the effective set.
    ///
    /// An explicit add overrides a pending tombstone.
    pub async fn add(&self, client: &ClientKey, item_id: &TrackedItemId) -> bool {
        let mut inner = self.inner.write().await;
        inner.tombstones.remove(item_id);
        let entry = inner.wanted.entry(item_id.clone()).or_default();
        let newly_tracked = entry.is_empty();
        entry.insert(client.clone());
        newly_tracked
    }

    /// Replace the full contribution of `client` with `ids`.
    ///
    /// Ids removed recently by someone else are refused so a reconnecting client with a stale
    /// local copy cannot resurrect them.
    pub async fn sync(
        &self,
        client: &ClientKey,
        ids: &[TrackedItemId],
        now: SystemTime,
    ) -> SyncOutcome {
        let mut inner = self.inner.write().await;
        let mut outcome = SyncOutcome::default();

        let mut declared = IndexSet::with_capacity(ids.len());
        for id in ids {
            if inner.is_tombstoned(id, now) {
                if !outcome.rejected.contains(id) {
                    outcome.rejected.push(id.clone());
                }
            } else {
                declared.insert(id.clone());
            }
        }

        inner.wanted.retain(|id, clients| {
            if declared.contains(id) {
                return true;
            }
            clients.shift_remove(client);
            if clients.is_empty() {
                outcome.evicted.push(id.clone());
                false
            } else {
                true
            }
        });

        for id in declared {
            let entry = inner.wanted.entry(id.clone()).or_default();
            if entry.is_empty() {
                outcome.added.push(id);
            }
            entry.insert(client.clone());
        }

        outcome
    }

    /// Explicit removal requested by `client`, applied according to the registry policy.
    pub async fn remove(
        &self,
        client: &ClientKey,
        item_id: &TrackedItemId,
        now: SystemTime,
    ) -> Removal {
        let mut inner = self.inner.write().await;
        let Some(clients) = inner.wanted.get_mut(item_id) else {
            return Removal {
                evicted: false,
                affected: Vec::new(),
            };
        };

        let affected = clients.iter().filter(|c| *c != client).cloned().collect();
        let evicted = match self.policy {
            RemovalPolicy::Global => true,
            RemovalPolicy::PerClient => {
                clients.shift_remove(client);
                clients.is_empty()
            }
        };

        if evicted {
            inner.wanted.shift_remove(item_id);
            inner
                .tombstones
                .insert(item_id.clone(), now + self.tombstone_ttl);
        }

        Removal { evicted, affected }
    }

    /// Drop every contribution of `client` without tombstoning anything.
    ///
    /// Returns the ids that left the effective set because nobody else declares them.
    pub async fn withdraw(&self, client: &ClientKey) -> Vec<TrackedItemId> {
        let mut inner = self.inner.write().await;
        let mut evicted = Vec::new();
        inner.wanted.retain(|id, clients| {
            clients.shift_remove(client);
            if clients.is_empty() {
                evicted.push(id.clone());
                false
            } else {
                true
            }
        });
        evicted
    }

    /// Consistent copy of the effective set in first-declared order.
    pub async fn snapshot(&self) -> Vec<TrackedItemId> {
        self.inner.read().await.wanted.keys().cloned().collect()
    }

    /// Whether `item_id` is currently tracked.
    pub async fn contains(&self, item_id: &TrackedItemId) -> bool {
        self.inner.read().await.wanted.contains_key(item_id)
    }

    /// Number of tracked ids.
    pub async fn len(&self) -> usize {
        self.inner.read().await.wanted.len()
    }

    /// Whether nothing is tracked.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.wanted.is_empty()
    }

    /// Whether `item_id` was explicitly removed and is still blocked.
    pub async fn is_tombstoned(&self, item_id: &TrackedItemId, now: SystemTime) -> bool {
        self.inner.read().await.is_tombstoned(item_id, now)
    }

    /// Forget tombstones whose retention elapsed.
    pub async fn sweep_tombstones(&self, now: SystemTime) -> usize {
        let mut inner = self.inner.write().await;
        let before = inner.tombstones.len();
        inner.tombstones.retain(|_, expires| now < *expires);
        before - inner.tombstones.len()
    }

    /// Clients that currently declare `item_id`.
    pub async fn wanted_by(&self, item_id: &TrackedItemId) -> Vec<ClientKey> {
        self.inner
            .read()
            .await
            .wanted
            .get(item_id)
            .map(|clients| clients.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn ids(raw: &[&str]) -> Vec<TrackedItemId> {
        raw.iter().map(|id| TrackedItemId::from(*id)).collect()
    }

    fn global() -> TrackedRegistry {
        TrackedRegistry::new(RemovalPolicy::Global, DEFAULT_TOMBSTONE_TTL)
    }

    #[tokio::test]
    async fn add_is_idempotent() {
        let registry = global();
        let client = ClientKey::from("a");

        assert!(registry.add(&client, &"x".into()).await);
        let once = registry.snapshot().await;
        assert!(!registry.add(&client, &"x".into()).await);

        assert_eq!(registry.snapshot().await, once);
        assert_eq!(registry.wanted_by(&"x".into()).await, vec![client]);
    }

    #[tokio::test]
    async fn effective_set_is_union_of_contributions() {
        let registry = global();
        let a = ClientKey::from("a");
        let b = ClientKey::from("b");

        let first = registry.sync(&a, &ids(&["x", "y"]), at(0)).await;
        assert_eq!(first.added, ids(&["x", "y"]));
        let second = registry.sync(&b, &ids(&["x", "z"]), at(0)).await;
        assert_eq!(second.added, ids(&["z"]));
        assert_eq!(registry.snapshot().await, ids(&["x", "y", "z"]));

        // a withdraws y and x; x survives through b.
        let third = registry.sync(&a, &[], at(1)).await;
        assert_eq!(third.evicted, ids(&["y"]));
        assert_eq!(registry.snapshot().await, ids(&["x", "z"]));
    }

    #[tokio::test]
    async fn global_removal_evicts_for_everyone() {
        let registry = global();
        let a = ClientKey::from("a");
        let b = ClientKey::from("b");
        registry.sync(&a, &ids(&["x", "y"]), at(0)).await;
        registry.sync(&b, &ids(&["x"]), at(0)).await;

        let removal = registry.remove(&a, &"x".into(), at(1)).await;
        assert!(removal.evicted);
        assert_eq!(removal.affected, vec![b.clone()]);
        assert_eq!(registry.snapshot().await, ids(&["y"]));
    }

    #[tokio::test]
    async fn per_client_removal_waits_for_last_interest() {
        let registry = TrackedRegistry::new(RemovalPolicy::PerClient, DEFAULT_TOMBSTONE_TTL);
        let a = ClientKey::from("a");
        let b = ClientKey::from("b");
        registry.sync(&a, &ids(&["x"]), at(0)).await;
        registry.sync(&b, &ids(&["x"]), at(0)).await;

        assert!(!registry.remove(&a, &"x".into(), at(1)).await.evicted);
        assert!(registry.contains(&"x".into()).await);
        assert!(registry.remove(&b, &"x".into(), at(2)).await.evicted);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn stale_sync_cannot_resurrect_removed_id() {
        let registry = global();
        let a = ClientKey::from("a");
        registry.sync(&a, &ids(&["x", "y"]), at(0)).await;
        registry.remove(&a, &"x".into(), at(1)).await;

        let outcome = registry
            .sync(&ClientKey::from("b"), &ids(&["x", "y"]), at(2))
            .await;
        assert_eq!(outcome.rejected, ids(&["x"]));
        assert!(!registry.contains(&"x".into()).await);

        // Explicit add wins over the tombstone.
        assert!(registry.add(&a, &"x".into()).await);
        assert!(!registry.is_tombstoned(&"x".into(), at(3)).await);
    }

    #[tokio::test]
    async fn tombstones_expire() {
        let registry = TrackedRegistry::new(RemovalPolicy::Global, Duration::from_secs(5));
        let a = ClientKey::from("a");
        registry.add(&a, &"x".into()).await;
        registry.remove(&a, &"x".into(), at(10)).await;

        assert!(registry.is_tombstoned(&"x".into(), at(14)).await);
        assert_eq!(registry.sweep_tombstones(at(15)).await, 1);
        assert!(!registry.is_tombstoned(&"x".into(), at(15)).await);
    }

    #[tokio::test]
    async fn withdraw_keeps_ids_others_want() {
        let registry = global();
        let a = ClientKey::from("a");
        let b = ClientKey::from("b");
        registry.sync(&a, &ids(&["x", "y"]), at(0)).await;
        registry.sync(&b, &ids(&["y"]), at(0)).await;

        assert_eq!(registry.withdraw(&a).await, ids(&["x"]));
        assert_eq!(registry.snapshot().await, ids(&["y"]));
        assert_eq!(registry.wanted_by(&"y".into()).await, vec![b]);
        assert!(!registry.is_tombstoned(&"x".into(), at(1)).await);
        assert!(registry.withdraw(&a).await.is_empty());
    }

    #[tokio::test]
    async fn removing_unknown_id_is_a_no_op() {
        let registry = global();
        let removal = registry.remove(&"a".into(), &"ghost".into(), at(0)).await;
        assert!(!removal.evicted);
        assert!(!registry.is_tombstoned(&"ghost".into(), at(0)).await);
    }
}

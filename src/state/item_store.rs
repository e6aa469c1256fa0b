//! Authoritative per-item states, kept in tracked order.

use std::collections::HashSet;

use indexmap::IndexMap;
use tokio::sync::RwLock;

use crate::state::item::{ItemState, TrackedItemId};

/// Latest [`ItemState`] per tracked item. Readers always receive copies.
#[derive(Debug, Default)]
pub struct ItemStore {
    items: RwLock<IndexMap<TrackedItemId, ItemState>>,
}

impl ItemStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the state for `item_id`.
    pub async fn get(&self, item_id: &TrackedItemId) -> Option<ItemState> {
        self.items.read().await.get(item_id).cloned()
    }

    /// Insert or replace the state of one item.
    pub async fn upsert(&self, state: ItemState) {
        let mut items = self.items.write().await;
        items.insert(state.item_id.clone(), state);
    }

    /// Drop the state of a removed item.
    pub async fn remove(&self, item_id: &TrackedItemId) -> Option<ItemState> {
        self.items.write().await.shift_remove(item_id)
    }

    /// Keep only the items still present in `tracked`, returning the dropped ids.
    pub async fn retain_tracked(&self, tracked: &[TrackedItemId]) -> Vec<TrackedItemId> {
        let keep: HashSet<&TrackedItemId> = tracked.iter().collect();
        let mut dropped = Vec::new();
        self.items.write().await.retain(|id, _| {
            let kept = keep.contains(id);
            if !kept {
                dropped.push(id.clone());
            }
            kept
        });
        dropped
    }

    /// Consistent copy of every state, in insertion order.
    pub async fn snapshot(&self) -> Vec<ItemState> {
        self.items.read().await.values().cloned().collect()
    }

    /// Number of items with a state.
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    /// Whether no item has produced a state yet.
    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

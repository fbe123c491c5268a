use std::collections::HashMap;

use tokio::sync::RwLock;

/// Concurrency-safe map from connection id to a stored value.
///
/// Carries no presence semantics of its own. Constructed explicitly and
/// owned by whoever needs it (in practice a single
/// [`PresenceTracker`](super::PresenceTracker)).
pub struct PresenceStore<V> {
    entries: RwLock<HashMap<String, V>>,
}

impl<V: Clone> PresenceStore<V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Insert `value` under `id`, returning any value it replaced.
    pub async fn add(&self, id: String, value: V) -> Option<V> {
        self.entries.write().await.insert(id, value)
    }

    /// Remove and return the value stored under `id`.
    pub async fn remove(&self, id: &str) -> Option<V> {
        self.entries.write().await.remove(id)
    }

    pub async fn try_get(&self, id: &str) -> Option<V> {
        self.entries.read().await.get(id).cloned()
    }

    /// Snapshot of every stored value, in no particular order.
    pub async fn get_all(&self) -> Vec<V> {
        self.entries.read().await.values().cloned().collect()
    }
}

impl<V: Clone> Default for PresenceStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_get_remove() {
        let store = PresenceStore::new();
        assert!(store.add("c1".into(), 10).await.is_none());
        assert_eq!(store.try_get("c1").await, Some(10));

        assert_eq!(store.add("c1".into(), 11).await, Some(10));
        assert_eq!(store.get_all().await, vec![11]);

        assert_eq!(store.remove("c1").await, Some(11));
        assert!(store.remove("c1").await.is_none());
        assert!(store.get_all().await.is_empty());
    }
}

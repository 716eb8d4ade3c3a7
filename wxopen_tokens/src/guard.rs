use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::store::CacheKey;

/// Per-key single-flight guards
///
/// Callers holding the guard for a key are the only ones refreshing the
/// credential under that key within this process. Other callers wait, then
/// find the refreshed credential in the cache.
///
/// Entries that nobody holds or awaits are dropped on the next acquisition,
/// so the map stays bounded by the number of keys in flight.
#[derive(Debug, Default)]
pub(crate) struct RefreshGuards {
    guards: Mutex<HashMap<CacheKey, Arc<AsyncMutex<()>>>>,
}

impl RefreshGuards {
    pub(crate) async fn acquire(&self, key: &CacheKey) -> OwnedMutexGuard<()> {
        let guard = {
            let mut guards = self.guards.lock();
            guards.retain(|_, g| Arc::strong_count(g) > 1);
            guards
                .entry(key.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        guard.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.guards.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::AppId;

    use super::*;

    #[tokio::test]
    async fn same_key_is_serialized() {
        let guards = Arc::new(RefreshGuards::default());
        let key = CacheKey::component_token(&AppId::from_static("wx_abc"));

        let held = guards.acquire(&key).await;
        let contender = {
            let guards = guards.clone();
            let key = key.clone();
            tokio::spawn(async move {
                let _g = guards.acquire(&key).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(held);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn released_keys_are_forgotten() {
        let guards = RefreshGuards::default();
        let a = CacheKey::component_token(&AppId::from_static("wx_a"));
        let b = CacheKey::component_token(&AppId::from_static("wx_b"));

        drop(guards.acquire(&a).await);
        let held = guards.acquire(&b).await;
        assert_eq!(guards.len(), 1);

        let again = guards.acquire(&a).await;
        assert_eq!(guards.len(), 2);

        drop(held);
        drop(again);
        drop(guards.acquire(&a).await);
        assert_eq!(guards.len(), 1);
    }

    #[tokio::test]
    async fn different_keys_do_not_contend() {
        let guards = RefreshGuards::default();
        let a = CacheKey::component_token(&AppId::from_static("wx_a"));
        let b = CacheKey::component_token(&AppId::from_static("wx_b"));

        let _held = guards.acquire(&a).await;
        let acquired = tokio::time::timeout(Duration::from_millis(100), guards.acquire(&b)).await;
        assert!(acquired.is_ok());
    }
}

use std::{fmt::Debug, hash::Hash, sync::Arc};

use dashmap::DashMap;
use futures_util::lock::Mutex;

/// A process-memory key-value store where every mutation of a key is
/// serialized by a lock dedicated to that key.
///
/// Reads return clones, so a caller can take a consistent snapshot and then
/// do slow work (network requests) without blocking writers. Nothing survives
/// a restart.
pub struct LockedStore<K, V>
where
    K: Clone + Send + Sync + 'static + Eq + Hash,
    V: Clone + Send + Sync + 'static,
{
    locks: DashMap<K, Arc<Mutex<()>>>,
    cache: DashMap<K, V>,
}

impl<K, V> Debug for LockedStore<K, V>
where
    K: Clone + Send + Sync + 'static + Eq + Hash,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockedStore")
            .field("cache", &self.cache.len())
            .finish()
    }
}

impl<K, V> Default for LockedStore<K, V>
where
    K: Clone + Send + Sync + 'static + Eq + Hash,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> LockedStore<K, V>
where
    K: Clone + Send + Sync + 'static + Eq + Hash,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
            cache: DashMap::new(),
        }
    }

    fn lock_for(&self, key: &K) -> Arc<Mutex<()>> {
        // Clone the Arc out so the map shard isn't held across an await
        Arc::clone(
            &self
                .locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.cache.get(key).map(|value| value.clone())
    }

    /// Edits the value of the key (or `default` if it has none yet) and saves
    /// it, but only if the edit function returns `Ok`. Nothing is created for a
    /// missing key on error.
    pub async fn try_edit<R, E>(
        &self,
        key: K,
        edit: impl FnOnce(&mut V) -> Result<R, E>,
        default: V,
    ) -> Result<R, E> {
        let lock = self.lock_for(&key);
        let guard = lock.lock().await;
        let mut value = self.get(&key).unwrap_or(default);
        let r = edit(&mut value)?;
        self.cache.insert(key, value);
        drop(guard);
        Ok(r)
    }

    /// Runs `read` on the current value while holding the key's lock, so no
    /// edit of the key can land until it returns.
    pub async fn read_locked<R>(&self, key: &K, read: impl FnOnce(Option<&V>) -> R) -> R {
        let lock = self.lock_for(key);
        let guard = lock.lock().await;
        let value = self.get(key);
        let r = read(value.as_ref());
        drop(guard);
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::join_all;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn edits_to_one_key_are_serialized() {
        let store = Arc::new(LockedStore::<i64, Vec<usize>>::new());
        join_all((0..100).map(|i| {
            let store = Arc::clone(&store);
            async move {
                store
                    .try_edit::<_, ()>(
                        1,
                        |list| {
                            list.push(i);
                            Ok(())
                        },
                        Vec::new(),
                    )
                    .await
                    .unwrap();
            }
        }))
        .await;
        assert_eq!(store.get(&1).map(|list| list.len()), Some(100));
    }

    #[tokio::test]
    async fn failed_try_edit_keeps_previous_value() {
        let store = LockedStore::<i64, u32>::new();
        store
            .try_edit::<_, ()>(
                1,
                |v| {
                    *v = 5;
                    Ok(())
                },
                0,
            )
            .await
            .unwrap();
        let result: Result<(), &str> = store
            .try_edit(
                1,
                |v| {
                    *v = 10;
                    Err("rejected")
                },
                0,
            )
            .await;
        assert_eq!(result, Err("rejected"));
        assert_eq!(store.get(&1), Some(5));

        let result: Result<(), &str> = store.try_edit(2, |_| Err("rejected"), 0).await;
        assert!(result.is_err());
        assert_eq!(store.get(&2), None);
    }

    #[tokio::test]
    async fn read_locked_sees_missing_and_present_values() {
        let store = LockedStore::<i64, u32>::new();
        assert_eq!(store.read_locked(&1, |v| v.copied()).await, None);
        store
            .try_edit::<_, ()>(
                1,
                |v| {
                    *v = 3;
                    Ok(())
                },
                0,
            )
            .await
            .unwrap();
        assert_eq!(store.read_locked(&1, |v| v.map(|v| v * 2)).await, Some(6));
    }

    #[tokio::test]
    async fn read_locked_waits_for_running_edit() {
        let store = Arc::new(LockedStore::<i64, u32>::new());
        let lock = store.lock_for(&1);
        let guard = lock.lock().await;
        let reader = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.read_locked(&1, |v| v.copied()).await })
        };
        tokio::task::yield_now().await;
        store.cache.insert(1, 9);
        drop(guard);
        assert_eq!(reader.await.unwrap(), Some(9));
    }
}

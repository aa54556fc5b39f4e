//! Lazily materialized, shared instances keyed by id.
//!
//! Materialization is single-winner per key: concurrent `get_or_init` calls
//! for the same key share one `OnceCell`, so exactly one loader runs and every
//! caller receives the same `Arc`. Skill managers cache runtimes and loaded
//! models here; the tenant registry caches sessions. Mutations are serialized
//! per key through [`RuntimeCache::lock_handle`].

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use chatskill_types::error::SkillError;
use dashmap::DashMap;
use tokio::sync::{Mutex, OnceCell};

pub struct RuntimeCache<K, R> {
    runtimes: DashMap<K, Arc<OnceCell<Arc<R>>>>,
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K: Eq + Hash + Clone, R> Default for RuntimeCache<K, R> {
    fn default() -> Self {
        Self {
            runtimes: DashMap::new(),
            locks: DashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone, R> RuntimeCache<K, R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached instance for `id`, or run `init` to build it.
    ///
    /// A failed `init` leaves no entry behind, so the next call retries.
    pub async fn get_or_init<F, Fut>(&self, id: &K, init: F) -> Result<Arc<R>, SkillError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<R, SkillError>>,
    {
        // Clone the cell out so no map guard is held across the await.
        let cell = Arc::clone(self.runtimes.entry(id.clone()).or_default().value());

        let result = cell
            .get_or_try_init(move || async move { init().await.map(Arc::new) })
            .await
            .cloned();

        if result.is_err() {
            self.runtimes
                .remove_if(id, |_, current| Arc::ptr_eq(current, &cell) && current.get().is_none());
        }
        result
    }

    /// The runtime for `id` if it has been materialized.
    pub fn get(&self, id: &K) -> Option<Arc<R>> {
        self.runtimes
            .get(id)
            .and_then(|cell| cell.value().get().cloned())
    }

    /// Drop the cached runtime and lock for `id`. In-flight holders keep
    /// their `Arc` until they finish.
    pub fn evict(&self, id: &K) -> Option<Arc<R>> {
        self.locks.remove(id);
        self.runtimes
            .remove(id)
            .and_then(|(_, cell)| cell.get().cloned())
    }

    /// Every materialized runtime.
    pub fn materialized(&self) -> Vec<Arc<R>> {
        self.runtimes
            .iter()
            .filter_map(|entry| entry.value().get().cloned())
            .collect()
    }

    pub fn clear(&self) {
        self.runtimes.clear();
        self.locks.clear();
    }

    /// The mutation lock for `id`, shared by the runtime and by deletion.
    pub fn lock_handle(&self, id: &K) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(id.clone()).or_default().value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use chatskill_types::skill::SkillId;

    #[tokio::test]
    async fn test_concurrent_init_runs_loader_once() {
        let cache: Arc<RuntimeCache<SkillId, String>> = Arc::new(RuntimeCache::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let id = SkillId::new();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_init(&id, || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok("runtime".to_string())
                    })
                    .await
                    .unwrap()
            }));
        }

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
    }

    #[tokio::test]
    async fn test_failed_init_leaves_no_entry() {
        let cache: RuntimeCache<SkillId, String> = RuntimeCache::new();
        let id = SkillId::new();

        let err = cache
            .get_or_init(&id, || async { Err(SkillError::NotFound("skill".into())) })
            .await;
        assert!(matches!(err, Err(SkillError::NotFound(_))));
        assert!(cache.get(&id).is_none());

        let ok = cache
            .get_or_init(&id, || async { Ok("second try".to_string()) })
            .await
            .unwrap();
        assert_eq!(ok.as_str(), "second try");
    }

    #[tokio::test]
    async fn test_evict_keeps_outstanding_arcs_alive() {
        let cache: RuntimeCache<SkillId, String> = RuntimeCache::new();
        let id = SkillId::new();
        let held = cache
            .get_or_init(&id, || async { Ok("held".to_string()) })
            .await
            .unwrap();

        let evicted = cache.evict(&id).unwrap();
        assert!(Arc::ptr_eq(&held, &evicted));
        assert!(cache.get(&id).is_none());
        assert_eq!(held.as_str(), "held");
    }

    #[tokio::test]
    async fn test_lock_handle_is_shared_per_id() {
        let cache: RuntimeCache<SkillId, String> = RuntimeCache::new();
        let id = SkillId::new();
        let a = cache.lock_handle(&id);
        let b = cache.lock_handle(&id);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &cache.lock_handle(&SkillId::new())));
    }
}

//! Thread-safe lazy model registry.
//!
//! One cache exists per model kind. Lookups that hit take a shared read
//! lock, so steady-state inference never serializes on the registry; misses
//! upgrade to the exclusive lock, re-check for a concurrent insert, and only
//! then run the loader. A failed load leaves the cache untouched. Entries
//! are never evicted or reloaded.

use crate::core::errors::{VisionError, VisionResult};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Read-through cache from logical model name to a loaded engine.
#[derive(Debug)]
pub struct ModelCache<T> {
    entries: RwLock<HashMap<String, Arc<T>>>,
}

impl<T> Default for ModelCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ModelCache<T> {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the cached entry for `name`, loading it exactly once on miss.
    ///
    /// Concurrent callers racing on the same cold entry serialize on the
    /// write lock; whichever arrives first runs `load`, the rest observe the
    /// inserted value on their re-check.
    pub fn get_or_load(
        &self,
        name: &str,
        load: impl FnOnce() -> VisionResult<T>,
    ) -> VisionResult<Arc<T>> {
        {
            let entries = self
                .entries
                .read()
                .map_err(|_| VisionError::runtime("model cache lock poisoned"))?;
            if let Some(model) = entries.get(name) {
                return Ok(model.clone());
            }
        }

        let mut entries = self
            .entries
            .write()
            .map_err(|_| VisionError::runtime("model cache lock poisoned"))?;
        if let Some(model) = entries.get(name) {
            return Ok(model.clone());
        }

        let model = Arc::new(load()?);
        entries.insert(name.to_string(), model.clone());
        debug!("cached model {name}");
        Ok(model)
    }

    /// Number of loaded entries.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn loads_once_and_reuses() {
        let cache: ModelCache<String> = ModelCache::new();
        let loads = AtomicUsize::new(0);

        let first = cache
            .get_or_load("m", || {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok("loaded".to_string())
            })
            .unwrap();
        let second = cache
            .get_or_load("m", || {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok("reloaded".to_string())
            })
            .unwrap();

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn failed_load_is_not_cached() {
        let cache: ModelCache<String> = ModelCache::new();
        let result = cache.get_or_load("m", || {
            Err(VisionError::model("unable to find model: m"))
        });
        assert!(result.is_err());
        assert!(cache.is_empty());

        // A later attempt runs the loader again.
        let value = cache
            .get_or_load("m", || Ok("second try".to_string()))
            .unwrap();
        assert_eq!(*value, "second try");
    }

    #[test]
    fn concurrent_cold_lookups_load_exactly_once() {
        let cache: Arc<ModelCache<u64>> = Arc::new(ModelCache::new());
        let loads = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                let loads = loads.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    cache
                        .get_or_load("shared", || {
                            loads.fetch_add(1, Ordering::SeqCst);
                            // Widen the race window while the loader runs.
                            std::thread::sleep(std::time::Duration::from_millis(10));
                            Ok(42u64)
                        })
                        .unwrap()
                })
            })
            .collect();

        let values: Vec<Arc<u64>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        for value in &values {
            assert!(Arc::ptr_eq(value, &values[0]));
        }
    }
}

//! Process-local idempotency cache.
//!
//! Maps `(operation, key)` to the serialized response of the first
//! successful call. Entries live as long as the process; a retry after a
//! restart is applied again.

use std::sync::{Arc, Mutex, MutexGuard};

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

/// One key's response, locked for as long as a call under that key runs.
type Slot = Arc<Mutex<Option<Value>>>;

/// Responses of successful keyed calls.
///
/// Backed by `DashMap` so the service can take `&self` everywhere. Calls
/// under the same key run one at a time; distinct keys do not wait on each
/// other.
#[derive(Debug, Default)]
pub struct IdempotencyCache {
    slots: DashMap<String, Slot>,
}

fn cache_key(op: &str, key: &str) -> String {
    format!("{op}:{key}")
}

fn lock(slot: &Slot) -> MutexGuard<'_, Option<Value>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl IdempotencyCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, op: &str, key: &str) -> Slot {
        Arc::clone(self.slots.entry(cache_key(op, key)).or_default().value())
    }

    /// Runs `run` unless a call under `(op, key)` already succeeded, in which
    /// case its response is replayed. Concurrent calls with the same key wait
    /// for the one in flight and replay its response. Failures are not
    /// recorded, so a failed call may be retried under the same key.
    pub fn once<T, E, F>(&self, op: &str, key: &str, run: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<serde_json::Error>,
        F: FnOnce() -> Result<T, E>,
    {
        let slot = self.slot(op, key);
        let mut recorded = lock(&slot);
        if let Some(response) = recorded.as_ref() {
            info!(op, key, "replaying idempotent response");
            return Ok(serde_json::from_value(response.clone())?);
        }
        let response = run()?;
        *recorded = Some(serde_json::to_value(&response)?);
        Ok(response)
    }

    /// Number of keys with a recorded response.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|entry| lock(entry.value()).is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    fn ok(value: u32) -> Result<u32, serde_json::Error> {
        Ok(value)
    }

    #[test]
    fn keys_are_scoped_per_operation() {
        let cache = IdempotencyCache::new();
        assert_eq!(cache.once("add_node", "k1", || ok(1)).unwrap(), 1);
        assert_eq!(cache.once("add_node", "k1", || ok(2)).unwrap(), 1);
        assert_eq!(cache.once("add_edge", "k1", || ok(3)).unwrap(), 3);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn failures_leave_the_key_open() {
        let cache = IdempotencyCache::new();
        let failed: Result<u32, serde_json::Error> = cache.once("add_node", "k", || {
            Err(serde_json::from_str::<u32>("not json").unwrap_err())
        });
        assert!(failed.is_err());
        assert!(cache.is_empty());
        assert_eq!(cache.once("add_node", "k", || ok(7)).unwrap(), 7);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn concurrent_calls_with_one_key_run_once() {
        let cache = IdempotencyCache::new();
        let runs = AtomicUsize::new(0);
        let start = Barrier::new(8);
        let responses: Vec<u32> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let (cache, runs, start) = (&cache, &runs, &start);
                    scope.spawn(move || {
                        start.wait();
                        cache
                            .once("add_node", "k", || {
                                runs.fetch_add(1, Ordering::SeqCst);
                                thread::sleep(std::time::Duration::from_millis(5));
                                ok(i)
                            })
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(responses.windows(2).all(|w| w[0] == w[1]));
    }
}

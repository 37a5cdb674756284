//! Per-key single-flight coalescing.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use riskdesk_core::{EngineError, EngineResult};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Coalesces concurrent requests for the same key into one upstream
/// call.
///
/// The first requester becomes the leader and runs the fetch; everyone
/// else subscribes to the leader's result. A waiter that exceeds the
/// bounded wait returns a timeout error without cancelling the shared
/// fetch — the remaining waiters may still need it.
pub struct SingleFlight<T: Clone> {
    inflight: Mutex<HashMap<String, broadcast::Sender<EngineResult<T>>>>,
    wait: Duration,
}

/// Removes the in-flight entry even if the leader's future is dropped
/// mid-fetch, so later requests start a fresh fetch instead of waiting
/// on a sender that will never fire.
struct FlightGuard<'a, T: Clone> {
    flight: &'a SingleFlight<T>,
    key: String,
}

impl<T: Clone> Drop for FlightGuard<'_, T> {
    fn drop(&mut self) {
        self.flight.lock().remove(&self.key);
    }
}

impl<T: Clone> SingleFlight<T> {
    pub fn new(wait: Duration) -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
            wait,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, broadcast::Sender<EngineResult<T>>>> {
        self.inflight.lock().unwrap_or_else(|poisoned| {
            warn!("single-flight mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Run `fetch` for the key, or await the in-flight run for it.
    ///
    /// The in-flight map lock is held only to join or register — never
    /// across the fetch itself.
    pub async fn run<F, Fut>(&self, key: &str, fetch: F) -> EngineResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = EngineResult<T>>,
    {
        let waiter = {
            let mut map = self.lock();
            match map.get(key) {
                Some(tx) => Some(tx.subscribe()),
                None => {
                    let (tx, _) = broadcast::channel(1);
                    map.insert(key.to_string(), tx);
                    None
                }
            }
        };

        if let Some(mut rx) = waiter {
            debug!(key, "joining in-flight fetch");
            return match tokio::time::timeout(self.wait, rx.recv()).await {
                Ok(Ok(result)) => result,
                // Leader dropped without a result, or we waited too long.
                Ok(Err(_)) | Err(_) => Err(EngineError::FetchWait {
                    key: key.to_string(),
                }),
            };
        }

        let guard = FlightGuard {
            flight: self,
            key: key.to_string(),
        };
        let result = fetch().await;
        let tx = self.lock().get(&guard.key).cloned();
        drop(guard);
        if let Some(tx) = tx {
            // No waiters is fine; send only errors when all receivers are gone.
            let _ = tx.send(result.clone());
        }
        result
    }
}

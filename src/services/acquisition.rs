use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::task::JoinError;

type InFlight<K, T, E> = Arc<Mutex<HashMap<K, Shared<BoxFuture<'static, Result<T, E>>>>>>;

/// Keyed single-flight map.
///
/// The first caller for a key spawns the work; every caller that arrives while
/// it is running attaches to the same outcome. The registration is dropped as
/// soon as the work settles, so a failure is handed to the waiters that were
/// attached and then forgotten.
pub struct AcquisitionCoordinator<K, T, E> {
    in_flight: InFlight<K, T, E>,
}

impl<K, T, E> Default for AcquisitionCoordinator<K, T, E> {
    fn default() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K, T, E> AcquisitionCoordinator<K, T, E>
where
    K: Eq + Hash + Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<JoinError> + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire<F, Fut>(&self, key: K, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let outcome = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match in_flight.get(&key) {
                Some(outcome) => {
                    tracing::debug!("Attaching to in-flight acquisition");
                    outcome.clone()
                }
                None => {
                    let outcome = self.start(key.clone(), work());
                    in_flight.insert(key, outcome.clone());
                    outcome
                }
            }
        };

        outcome.await
    }

    /// Spawns `work` so it runs to completion even when every waiter goes away.
    fn start<Fut>(&self, key: K, work: Fut) -> Shared<BoxFuture<'static, Result<T, E>>>
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let settle = Settle {
            in_flight: Arc::clone(&self.in_flight),
            key,
        };
        let handle = tokio::spawn(async move {
            // Dropped when the work returns or unwinds, before the outcome is
            // visible to any waiter.
            let _settle = settle;
            work.await
        });

        async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!("Acquisition task failed: {}", e);
                    Err(E::from(e))
                }
            }
        }
        .boxed()
        .shared()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

struct Settle<K: Eq + Hash, T, E> {
    in_flight: InFlight<K, T, E>,
    key: K,
}

impl<K: Eq + Hash, T, E> Drop for Settle<K, T, E> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

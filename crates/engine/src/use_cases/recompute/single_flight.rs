//! Per-key coalescing of concurrent computations.

use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};

type SharedResult<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

struct InFlight<T, E> {
    ticket: u64,
    future: SharedResult<T, E>,
}

/// At most one computation per key runs at a time. Callers arriving while
/// one is running attach to it and receive a clone of its result.
///
/// Each computation runs on its own task, so it finishes (and its side
/// effects land) even if every caller stops waiting.
pub struct SingleFlight<K, T, E> {
    in_flight: Arc<DashMap<K, InFlight<T, E>>>,
    next_ticket: AtomicU64,
}

impl<K, T, E> Default for SingleFlight<K, T, E>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            in_flight: Arc::new(DashMap::new()),
            next_ticket: AtomicU64::new(0),
        }
    }
}

impl<K, T, E> SingleFlight<K, T, E>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the computation running for `key`, or start one with `start`.
    ///
    /// `on_abort` builds the error returned when the task panics or is
    /// cancelled by the runtime.
    pub async fn run<F, Fut>(&self, key: K, start: F, on_abort: fn(String) -> E) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let future = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => {
                tracing::debug!(ticket = entry.get().ticket, "Joining in-flight computation");
                entry.get().future.clone()
            }
            Entry::Vacant(entry) => {
                let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
                let guard = Deregister {
                    registry: Arc::clone(&self.in_flight),
                    key,
                    ticket,
                };
                let work = start();
                let handle = tokio::spawn(async move {
                    let _guard = guard;
                    work.await
                });
                let future = async move {
                    match handle.await {
                        Ok(result) => result,
                        Err(e) => Err(on_abort(e.to_string())),
                    }
                }
                .boxed()
                .shared();
                entry.insert(InFlight {
                    ticket,
                    future: future.clone(),
                });
                future
            }
        };
        future.await
    }

    /// Wait for the computation running for `key`, if any. Its outcome is
    /// ignored.
    pub async fn wait(&self, key: &K) {
        let future = self.in_flight.get(key).map(|entry| entry.future.clone());
        if let Some(future) = future {
            let _ = future.await;
        }
    }

    pub fn is_running(&self, key: &K) -> bool {
        self.in_flight.contains_key(key)
    }
}

/// Removes the registry entry when the computation task ends, unless a
/// newer computation has replaced it.
struct Deregister<K: Eq + Hash, T, E> {
    registry: Arc<DashMap<K, InFlight<T, E>>>,
    key: K,
    ticket: u64,
}

impl<K: Eq + Hash, T, E> Drop for Deregister<K, T, E> {
    fn drop(&mut self) {
        self.registry
            .remove_if(&self.key, |_, entry| entry.ticket == self.ticket);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Notify;

    type Flight = SingleFlight<u32, Arc<String>, String>;

    #[tokio::test]
    async fn concurrent_callers_share_one_run() {
        let flight = Arc::new(Flight::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());

        let mut handles = Vec::new();
        for _ in 0..5 {
            let flight = Arc::clone(&flight);
            let runs = Arc::clone(&runs);
            let release = Arc::clone(&release);
            handles.push(tokio::spawn(async move {
                flight
                    .run(
                        7,
                        move || async move {
                            runs.fetch_add(1, Ordering::SeqCst);
                            release.notified().await;
                            Ok(Arc::new("done".to_string()))
                        },
                        |e| e,
                    )
                    .await
            }));
        }

        while !flight.is_running(&7) {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        release.notify_one();

        let results: Vec<Arc<String>> = futures_util::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
        assert!(!flight.is_running(&7));
    }

    #[tokio::test]
    async fn finished_run_is_not_reused() {
        let flight = Flight::new();
        let runs = Arc::new(AtomicUsize::new(0));
        for expected in 1..=2 {
            let counter = Arc::clone(&runs);
            let result = flight
                .run(
                    1,
                    move || async move {
                        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                        Ok(Arc::new(n.to_string()))
                    },
                    |e| e,
                )
                .await
                .unwrap();
            assert_eq!(*result, expected.to_string());
        }
    }

    #[tokio::test]
    async fn errors_are_shared_and_entry_is_cleared() {
        let flight = Flight::new();
        let err = flight
            .run(3, || async { Err("boom".to_string()) }, |e| e)
            .await
            .unwrap_err();
        assert_eq!(err, "boom");
        assert!(!flight.is_running(&3));
    }

    #[tokio::test]
    async fn panicking_task_maps_to_abort_error() {
        let flight = Flight::new();
        let err = flight
            .run(
                4,
                || async {
                    if true {
                        panic!("task died");
                    }
                    Ok(Arc::new(String::new()))
                },
                |e| format!("aborted: {e}"),
            )
            .await
            .unwrap_err();
        assert!(err.starts_with("aborted:"));
        assert!(!flight.is_running(&4));
    }

    #[tokio::test]
    async fn abandoned_caller_does_not_cancel_the_run() {
        let flight = Arc::new(Flight::new());
        let finished = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());

        let caller = {
            let flight = Arc::clone(&flight);
            let finished = Arc::clone(&finished);
            let release = Arc::clone(&release);
            tokio::spawn(async move {
                flight
                    .run(
                        9,
                        move || async move {
                            release.notified().await;
                            finished.fetch_add(1, Ordering::SeqCst);
                            Ok(Arc::new("late".to_string()))
                        },
                        |e| e,
                    )
                    .await
            })
        };
        while !flight.is_running(&9) {
            tokio::task::yield_now().await;
        }
        caller.abort();
        let _ = caller.await;

        release.notify_one();
        flight.wait(&9).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }
}

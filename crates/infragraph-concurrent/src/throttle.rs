use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, trace};

use infragraph_core::{InfraGraphError, Result, ThrottleConfig};

/// Gate bounding in-flight calls and calls started per interval.
///
/// Rate slots are not refilled gradually: the ticker restores the whole
/// budget at once every `interval`, so calls arrive in bursts of at most
/// `rate`.
#[derive(Debug)]
pub struct Throttle {
    concurrency: Arc<Semaphore>,
    rate: Arc<Semaphore>,
    rate_limit: usize,
    interval: Duration,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl Throttle {
    /// Must be called from within a tokio runtime; the reset ticker is spawned here.
    pub fn new(concurrency: usize, rate: usize, rate_interval: Duration) -> Arc<Self> {
        let concurrency = concurrency.max(1);
        let rate_limit = rate.max(1);
        let rate = Arc::new(Semaphore::new(rate_limit));

        let ticker = tokio::spawn(reset_rate_slots(rate.clone(), rate_limit, rate_interval));

        Arc::new(Self {
            concurrency: Arc::new(Semaphore::new(concurrency)),
            rate,
            rate_limit,
            interval: rate_interval,
            ticker: Mutex::new(Some(ticker)),
        })
    }

    pub fn from_config(config: &ThrottleConfig) -> Arc<Self> {
        Self::new(config.concurrency, config.rate, config.rate_interval())
    }

    /// Runs `task` once a concurrency slot and a rate slot are both held.
    ///
    /// The returned submission resolves to the task's output, or to its
    /// error wrapped with `label`.
    pub fn submit<T, F>(&self, label: impl Into<String>, task: F) -> Submission<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let label = label.into();
        let concurrency = self.concurrency.clone();
        let rate = self.rate.clone();

        let handle = tokio::spawn(async move {
            let _slot = concurrency
                .acquire_owned()
                .await
                .map_err(|e| InfraGraphError::Join(e.to_string()))?;
            rate.acquire()
                .await
                .map_err(|e| InfraGraphError::Join(e.to_string()))?
                .forget();

            trace!(%label, "throttled task started");
            task.await
                .map_err(|source| InfraGraphError::labeled(label, source))
        });

        Submission { handle }
    }

    /// Stops the reset ticker. Calls already holding slots are unaffected.
    pub fn stop(&self) {
        if let Some(ticker) = self.ticker.lock().take() {
            ticker.abort();
            debug!("throttle reset ticker stopped");
        }
    }

    pub fn available_concurrency(&self) -> usize {
        self.concurrency.available_permits()
    }

    pub fn available_rate(&self) -> usize {
        self.rate.available_permits()
    }

    pub fn rate_limit(&self) -> usize {
        self.rate_limit
    }

    pub fn rate_interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for Throttle {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn reset_rate_slots(rate: Arc<Semaphore>, rate_limit: usize, every: Duration) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let used = rate_limit.saturating_sub(rate.available_permits());
        if used > 0 {
            rate.add_permits(used);
        }
    }
}

/// Pending result of a throttled task.
#[derive(Debug)]
pub struct Submission<T> {
    handle: JoinHandle<Result<T>>,
}

impl<T> Submission<T> {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl<T> Future for Submission<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx).map(|joined| match joined {
            Ok(result) => result,
            Err(e) => Err(InfraGraphError::Join(e.to_string())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infragraph_core::ResourceKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn never_exceeds_concurrency_limit() {
        let throttle = Throttle::new(3, 1000, Duration::from_millis(100));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let submissions: Vec<_> = (0..20)
            .map(|i| {
                let running = running.clone();
                let peak = peak.clone();
                throttle.submit(format!("task-{i}"), async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(i)
                })
            })
            .collect();

        let mut finished = 0;
        for submission in submissions {
            submission.await.unwrap();
            finished += 1;
        }

        assert_eq!(finished, 20);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(throttle.available_concurrency(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn rate_slots_are_released_in_batches() {
        let throttle = Throttle::new(30, 5, Duration::from_millis(100));
        let started = Arc::new(Mutex::new(Vec::new()));

        let submissions: Vec<_> = (0..30)
            .map(|i| {
                let started = started.clone();
                throttle.submit(format!("task-{i}"), async move {
                    started.lock().push(Instant::now());
                    Ok(())
                })
            })
            .collect();
        for submission in submissions {
            submission.await.unwrap();
        }

        let mut times = started.lock().clone();
        times.sort();
        let mut batches: Vec<Vec<Instant>> = vec![vec![times[0]]];
        for pair in times.windows(2) {
            if pair[1].duration_since(pair[0]) > Duration::from_millis(50) {
                batches.push(Vec::new());
            }
            if let Some(batch) = batches.last_mut() {
                batch.push(pair[1]);
            }
        }

        assert!(batches.len() >= 6, "got {} batches", batches.len());
        assert!(batches.iter().all(|b| b.len() <= 5));
        for pair in batches.windows(2) {
            assert!(pair[1][0].duration_since(pair[0][0]) >= Duration::from_millis(80));
        }
    }

    #[tokio::test]
    async fn errors_carry_the_label() {
        let throttle = Throttle::new(2, 10, Duration::from_millis(100));

        let ok = throttle.submit("Vpc", async { Ok(7) }).await.unwrap();
        assert_eq!(ok, 7);

        let err = throttle
            .submit("DatabaseInstance", async {
                Err::<(), _>(InfraGraphError::discovery(
                    ResourceKind::DatabaseInstance,
                    "network unreachable",
                ))
            })
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("DatabaseInstance error: "));
        assert!(matches!(err.root(), InfraGraphError::Discovery { .. }));
    }

    #[tokio::test]
    async fn stop_halts_rate_resets_only() {
        let throttle = Throttle::new(4, 1, Duration::from_millis(20));
        throttle.stop();

        throttle.submit("first", async { Ok(()) }).await.unwrap();
        let second = throttle.submit("second", async { Ok(()) });
        let waited = tokio::time::timeout(Duration::from_millis(150), second).await;
        assert!(waited.is_err());
        assert_eq!(throttle.available_concurrency(), 3);
    }
}

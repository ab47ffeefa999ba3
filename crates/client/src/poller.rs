//! Cancellable queue subscription.
//!
//! The pharmacist queue refreshes on a fixed interval. Each poll awaits the
//! previous fetch and missed ticks are skipped, so there is never more than
//! one request in flight however slow the backend is. The subscription owns
//! its task: cancelling or dropping it stops polling.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mediplus_core::QueueEntry;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::api::ApiError;

/// Shortest interval a subscription will poll at.
pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Something that can produce the current queue.
pub trait QueueSource: Send + Sync + 'static {
    fn fetch(&self) -> impl Future<Output = Result<Vec<QueueEntry>, ApiError>> + Send;
}

/// The latest poll result.
#[derive(Debug, Clone, Default)]
pub struct QueueSnapshot {
    /// Entries from the last successful fetch.
    pub entries: Vec<QueueEntry>,
    /// When `entries` was fetched; `None` until the first success.
    pub fetched_at: Option<DateTime<Utc>>,
    /// Error from the most recent poll, cleared on the next success.
    pub error: Option<String>,
    /// Number of completed polls.
    pub polls: u64,
}

/// A running queue subscription.
#[derive(Debug)]
pub struct QueueSubscription {
    rx: watch::Receiver<QueueSnapshot>,
    task: JoinHandle<()>,
}

impl QueueSubscription {
    /// Start polling `source` every `interval`, raised to [`MIN_INTERVAL`]
    /// if shorter. The first poll is immediate.
    ///
    /// Must be called within a Tokio runtime.
    #[must_use]
    pub fn spawn<S: QueueSource>(source: S, interval: Duration) -> Self {
        let (tx, rx) = watch::channel(QueueSnapshot::default());

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(MIN_INTERVAL));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let result = source.fetch().await;

                tx.send_modify(|snapshot| {
                    snapshot.polls += 1;
                    match result {
                        Ok(entries) => {
                            debug!(count = entries.len(), "queue refreshed");
                            snapshot.entries = entries;
                            snapshot.fetched_at = Some(Utc::now());
                            snapshot.error = None;
                        }
                        Err(e) => {
                            warn!(error = %e, "queue refresh failed");
                            snapshot.error = Some(e.to_string());
                        }
                    }
                });

                if tx.is_closed() {
                    debug!("queue subscription has no receivers");
                    break;
                }
            }
        });

        Self { rx, task }
    }

    /// The most recent snapshot.
    #[must_use]
    pub fn latest(&self) -> QueueSnapshot {
        self.rx.borrow().clone()
    }

    /// Wait for the next poll to complete and return its snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the polling task has stopped.
    pub async fn changed(&mut self) -> Result<QueueSnapshot, watch::error::RecvError> {
        self.rx.changed().await?;
        Ok(self.rx.borrow_and_update().clone())
    }

    /// A receiver for callers that want to watch from elsewhere.
    #[must_use]
    pub fn receiver(&self) -> watch::Receiver<QueueSnapshot> {
        self.rx.clone()
    }

    /// Stop polling. An in-flight fetch is abandoned.
    pub fn cancel(self) {
        self.task.abort();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for QueueSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use mediplus_core::{FulfillmentStatus, PrescriptionId, QueueId};

    use super::*;

    #[derive(Clone, Default)]
    struct SlowSource {
        delay: Duration,
        calls: Arc<AtomicUsize>,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
        fail_first: bool,
    }

    impl QueueSource for SlowSource {
        async fn fetch(&self) -> Result<Vec<QueueEntry>, ApiError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(self.delay).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if self.fail_first && call == 0 {
                return Err(ApiError::Parse("boom".to_string()));
            }
            Ok(vec![QueueEntry {
                queue_id: QueueId::new(format!("q-{call}")),
                prescription_id: PrescriptionId::new("rx-1"),
                patient_user_id: None,
                medicines: Vec::new(),
                est_time: 60,
                status: FulfillmentStatus::Pending,
                created_at: None,
            }])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetches_never_overlap() {
        let source = SlowSource {
            delay: Duration::from_secs(12),
            ..SlowSource::default()
        };
        let sub = QueueSubscription::spawn(source.clone(), Duration::from_secs(5));

        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
        assert!(source.calls.load(Ordering::SeqCst) >= 3);
        drop(sub);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_on_interval() {
        let source = SlowSource::default();
        let mut sub = QueueSubscription::spawn(source.clone(), Duration::from_secs(5));

        let first = sub.changed().await.unwrap_or_default();
        assert_eq!(first.polls, 1);
        assert_eq!(first.entries.len(), 1);
        assert!(first.fetched_at.is_some());

        tokio::time::sleep(Duration::from_secs(21)).await;
        // Immediate poll plus one every 5s.
        assert_eq!(source.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_raised_to_minimum() {
        let source = SlowSource::default();
        let mut sub = QueueSubscription::spawn(source.clone(), Duration::ZERO);

        let first = sub.changed().await.unwrap_or_default();
        assert_eq!(first.polls, 1);

        tokio::time::sleep(MIN_INTERVAL * 3).await;
        assert!(!sub.is_finished());
        assert!(source.calls.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_polling() {
        let source = SlowSource::default();
        let sub = QueueSubscription::spawn(source.clone(), Duration::from_secs(5));
        tokio::time::sleep(Duration::from_secs(11)).await;

        sub.cancel();
        let calls = source.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_are_recorded_and_polling_continues() {
        let source = SlowSource {
            fail_first: true,
            ..SlowSource::default()
        };
        let mut sub = QueueSubscription::spawn(source, Duration::from_secs(5));

        let first = sub.changed().await.unwrap_or_default();
        assert!(first.error.is_some());
        assert!(first.entries.is_empty());

        let second = sub.changed().await.unwrap_or_default();
        assert!(second.error.is_none());
        assert_eq!(second.entries.len(), 1);
    }
}

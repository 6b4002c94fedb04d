//! In-process change notifications.
//!
//! The store publishes one [`ChangeEvent`] per write. Subscribers register a
//! predicate and receive a bare signal (no diff) for each matching event.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

/// Buffered events per subscriber before it is considered lagged.
pub const CHANGE_FEED_CAPACITY: usize = 256;

/// Callback invoked for every matching change signal.
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Proposal,
    Vote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOp {
    Created,
    Deleted,
}

/// A single record change. `parent_id` is the record's foreign key: the topic
/// for proposals, the proposal for votes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: RecordKind,
    pub op: ChangeOp,
    pub id: String,
    pub parent_id: String,
}

/// Broadcast hub for record changes.
#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish a change. Having no subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        tracing::debug!(?event, "publishing change");
        let _ = self.tx.send(event);
    }

    /// Number of live subscriptions holding a receiver.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Deliver a signal to `on_change` for every event matching `predicate`.
    ///
    /// The receiver is registered before this returns, so no event published
    /// afterwards is missed. A lagged receiver may have skipped matching
    /// events and therefore emits one signal for the whole gap.
    pub fn subscribe<P>(&self, predicate: P, on_change: ChangeCallback) -> Subscription
    where
        P: Fn(&ChangeEvent) -> bool + Send + 'static,
    {
        let mut rx = self.tx.subscribe();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();

        let task = tokio::spawn(async move {
            loop {
                let signal = match rx.recv().await {
                    Ok(event) => predicate(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "change feed subscriber lagged");
                        true
                    }
                    Err(RecvError::Closed) => break,
                };
                if flag.load(Ordering::Acquire) {
                    break;
                }
                if signal {
                    on_change();
                }
            }
        });

        Subscription::with_task(cancelled, task)
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(CHANGE_FEED_CAPACITY)
    }
}

/// Cancellation handle for a change subscription.
///
/// `cancel` is idempotent and also runs on drop, so a subscription can never
/// outlive its owner.
pub struct Subscription {
    cancelled: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Subscription backed by a delivery task that is aborted on cancel.
    pub fn with_task(cancelled: Arc<AtomicBool>, task: JoinHandle<()>) -> Self {
        Self {
            cancelled,
            task: Some(task),
        }
    }

    /// Subscription whose producer polls the shared flag itself.
    pub fn from_flag(cancelled: Arc<AtomicBool>) -> Self {
        Self {
            cancelled,
            task: None,
        }
    }

    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(task) = &self.task {
            task.abort();
        }
        tracing::debug!("change subscription cancelled");
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

//! Live topic-view sessions.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{ProposalAggregator, RefreshTarget, UpdateCallback};
use crate::db::{ChangeCallback, ProposalFilter, Subscription};
use crate::errors::AppError;
use crate::models::AnnotatedProposal;

/// One active view of a topic: owns the current ranked list, the proposal
/// change subscription and the liveness flag.
///
/// Every completed refresh overwrites the list, whatever order refreshes
/// were started in, and the observer sees lists in the same order they were
/// stored. Once cancelled, results of refreshes still in flight are dropped
/// and the observer is not called again. Dropping the session cancels it.
///
/// The observer runs under the session's delivery lock, so it must return
/// quickly and must not cancel or drop the session it observes.
pub struct TopicSession {
    aggregator: Arc<ProposalAggregator>,
    shared: Arc<SessionShared>,
    subscription: Subscription,
}

struct SessionShared {
    topic_id: String,
    state: Mutex<SessionState>,
    // Held across storing a list and handing it to `on_update`.
    delivery: Mutex<()>,
    on_update: UpdateCallback,
}

struct SessionState {
    live: bool,
    proposals: Vec<AnnotatedProposal>,
}

impl SessionShared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_live(&self) -> bool {
        self.lock().live
    }

    /// Replace the list and notify the observer as one step. Returns false,
    /// leaving the list untouched, when the session is no longer live.
    fn publish(&self, proposals: Vec<AnnotatedProposal>) -> bool {
        let _delivery = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);
        let published = {
            let mut state = self.lock();
            if !state.live {
                return false;
            }
            state.proposals = proposals;
            state.proposals.clone()
        };
        (self.on_update)(&published);
        true
    }

    /// Mark the session closed once no delivery is in progress. Returns false
    /// if it was already closed.
    fn close(&self) -> bool {
        let _delivery = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);
        let mut state = self.lock();
        std::mem::replace(&mut state.live, false)
    }
}

impl TopicSession {
    pub(super) async fn open(
        aggregator: Arc<ProposalAggregator>,
        topic_id: String,
        on_update: UpdateCallback,
    ) -> Result<Self, AppError> {
        let shared = Arc::new(SessionShared {
            topic_id: topic_id.clone(),
            state: Mutex::new(SessionState {
                live: true,
                proposals: Vec::new(),
            }),
            delivery: Mutex::new(()),
            on_update,
        });

        let on_change: ChangeCallback = {
            let aggregator = aggregator.clone();
            let shared = shared.clone();
            Arc::new(move || {
                if !shared.is_live() {
                    return;
                }
                let aggregator = aggregator.clone();
                let shared = shared.clone();
                tokio::spawn(async move {
                    match aggregator.refresh(&shared.topic_id).await {
                        Ok(proposals) => {
                            if !shared.publish(proposals) {
                                tracing::debug!(topic_id = %shared.topic_id, "discarded refresh for closed session");
                            }
                        }
                        Err(err) => tracing::warn!(
                            topic_id = %shared.topic_id,
                            error = %err,
                            "refresh after change notification failed, keeping previous list"
                        ),
                    }
                });
            })
        };

        // Subscribe first so changes landing during the initial refresh still
        // trigger a follow-up refresh.
        let subscription = aggregator
            .proposals
            .subscribe(ProposalFilter::Topic(topic_id.clone()), on_change)
            .await?;

        let session = Self {
            aggregator,
            shared,
            subscription,
        };

        let initial = session.aggregator.refresh(&topic_id).await?;
        session.shared.publish(initial);
        tracing::info!(topic_id = %topic_id, "topic session opened");

        Ok(session)
    }

    pub fn topic_id(&self) -> &str {
        &self.shared.topic_id
    }

    /// The most recently published list.
    pub fn proposals(&self) -> Vec<AnnotatedProposal> {
        self.shared.lock().proposals.clone()
    }

    pub fn is_live(&self) -> bool {
        self.shared.is_live()
    }

    /// Recompute now instead of waiting for a change notification.
    ///
    /// The computed list is returned even when the session has been
    /// cancelled in the meantime, but it is only published while live. On
    /// error the previous list stays in place.
    pub async fn force_refresh(&self) -> Result<Vec<AnnotatedProposal>, AppError> {
        let proposals = self.aggregator.refresh(self.topic_id()).await?;
        if !self.shared.publish(proposals.clone()) {
            tracing::debug!(topic_id = %self.topic_id(), "forced refresh on closed session not published");
        }
        Ok(proposals)
    }

    /// End the session. Safe to call any number of times. Waits for a
    /// delivery already in progress, so the observer is never called after
    /// this returns.
    pub fn cancel(&self) {
        if !self.shared.close() {
            return;
        }
        self.subscription.cancel();
        tracing::info!(topic_id = %self.topic_id(), "topic session closed");
    }
}

impl Drop for TopicSession {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[async_trait]
impl RefreshTarget for TopicSession {
    fn topic_id(&self) -> &str {
        TopicSession::topic_id(self)
    }

    async fn force_refresh(&self) -> Result<Vec<AnnotatedProposal>, AppError> {
        TopicSession::force_refresh(self).await
    }
}

//! Ranked, vote-annotated proposal lists.
//!
//! [`ProposalAggregator::refresh`] computes the list for a topic from one
//! proposal snapshot; [`ProposalAggregator::subscribe`] opens a
//! [`TopicSession`] that keeps it current.

mod session;

pub use session::*;

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::{stream, StreamExt, TryStreamExt};

use crate::config::DEFAULT_VOTE_FETCH_CONCURRENCY;
use crate::db::{ProposalFilter, ProposalRepository, VoteFilter, VoteRepository};
use crate::errors::AppError;
use crate::models::AnnotatedProposal;

/// Receives every list a live session publishes.
pub type UpdateCallback = Arc<dyn Fn(&[AnnotatedProposal]) + Send + Sync>;

/// Computes ranked proposal lists from the two repositories.
pub struct ProposalAggregator {
    proposals: Arc<dyn ProposalRepository>,
    votes: Arc<dyn VoteRepository>,
    vote_fetch_concurrency: usize,
}

impl ProposalAggregator {
    pub fn new(proposals: Arc<dyn ProposalRepository>, votes: Arc<dyn VoteRepository>) -> Self {
        Self {
            proposals,
            votes,
            vote_fetch_concurrency: DEFAULT_VOTE_FETCH_CONCURRENCY,
        }
    }

    pub fn with_vote_fetch_concurrency(mut self, limit: usize) -> Self {
        self.vote_fetch_concurrency = limit.max(1);
        self
    }

    /// Build the ranked list for `topic_id`.
    ///
    /// Vote queries fan out from a single proposal snapshot, at most
    /// `vote_fetch_concurrency` at a time. Any failed query fails the whole
    /// refresh; there are no partial results.
    pub async fn refresh(&self, topic_id: &str) -> Result<Vec<AnnotatedProposal>, AppError> {
        let snapshot = self
            .proposals
            .query(&ProposalFilter::Topic(topic_id.to_string()))
            .await?;

        let votes = &self.votes;
        let mut annotated: Vec<AnnotatedProposal> = stream::iter(snapshot)
            .map(|proposal| async move {
                let filter = VoteFilter::Proposal(proposal.id.clone());
                let votes = votes.query(&filter).await?;
                Ok::<_, AppError>(AnnotatedProposal::new(proposal, votes))
            })
            .buffered(self.vote_fetch_concurrency)
            .try_collect()
            .await?;

        rank(&mut annotated);
        tracing::debug!(topic_id, proposals = annotated.len(), "refreshed proposal ranking");
        Ok(annotated)
    }

    /// Open a live session for `topic_id`; see [`TopicSession`].
    pub async fn subscribe(
        self: &Arc<Self>,
        topic_id: &str,
        on_update: UpdateCallback,
    ) -> Result<TopicSession, AppError> {
        TopicSession::open(self.clone(), topic_id.to_string(), on_update).await
    }
}

/// Sort by descending vote count. The sort is stable, so proposals with equal
/// counts stay in creation order.
pub fn rank(proposals: &mut [AnnotatedProposal]) {
    proposals.sort_by(|a, b| b.vote_count.cmp(&a.vote_count));
}

/// Something a workflow can force to recompute right after a local write.
#[async_trait]
pub trait RefreshTarget: Send + Sync {
    fn topic_id(&self) -> &str;

    async fn force_refresh(&self) -> Result<Vec<AnnotatedProposal>, AppError>;
}

/// One-shot target that remembers the list computed by the forced refresh.
pub struct RankedSnapshot {
    aggregator: Arc<ProposalAggregator>,
    topic_id: String,
    latest: Mutex<Option<Vec<AnnotatedProposal>>>,
}

impl RankedSnapshot {
    pub fn new(aggregator: Arc<ProposalAggregator>, topic_id: impl Into<String>) -> Self {
        Self {
            aggregator,
            topic_id: topic_id.into(),
            latest: Mutex::new(None),
        }
    }

    /// The list from the last forced refresh, if one ran and succeeded.
    pub fn into_latest(self) -> Option<Vec<AnnotatedProposal>> {
        self.latest
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RefreshTarget for RankedSnapshot {
    fn topic_id(&self) -> &str {
        &self.topic_id
    }

    async fn force_refresh(&self) -> Result<Vec<AnnotatedProposal>, AppError> {
        let proposals = self.aggregator.refresh(&self.topic_id).await?;
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(proposals.clone());
        Ok(proposals)
    }
}

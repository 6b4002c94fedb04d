//! Vote casting.

use std::sync::Arc;

use crate::aggregator::RefreshTarget;
use crate::db::{ProposalRepository, VoteFilter, VoteRepository};
use crate::errors::AppError;
use crate::identity::IdentityResolver;
use crate::models::{NewVote, Vote};

/// Records at most one vote per user and proposal.
pub struct VoteCasting {
    identity: Arc<IdentityResolver>,
    proposals: Arc<dyn ProposalRepository>,
    votes: Arc<dyn VoteRepository>,
}

impl VoteCasting {
    pub fn new(
        identity: Arc<IdentityResolver>,
        proposals: Arc<dyn ProposalRepository>,
        votes: Arc<dyn VoteRepository>,
    ) -> Self {
        Self {
            identity,
            proposals,
            votes,
        }
    }

    /// Vote for `proposal_id` as the current user, then force `view` to
    /// refresh if it shows the proposal's topic.
    ///
    /// A repeat vote fails with [`AppError::DuplicateVote`], whether the
    /// pre-check catches it or the store's uniqueness constraint does.
    pub async fn cast_vote(
        &self,
        proposal_id: &str,
        view: &dyn RefreshTarget,
    ) -> Result<Vote, AppError> {
        let user_id = self.identity.current_user_id().await?;

        if proposal_id.trim().is_empty() {
            return Err(AppError::missing_fields(&["proposalID"]));
        }

        let proposal = self
            .proposals
            .get(proposal_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Proposal {} not found", proposal_id)))?;

        let existing = self
            .votes
            .query(&VoteFilter::Proposal(proposal.id.clone()))
            .await?;
        if existing.iter().any(|vote| vote.user_id == user_id) {
            tracing::info!(proposal_id = %proposal.id, user_id = %user_id, "duplicate vote rejected");
            return Err(AppError::DuplicateVote {
                proposal_id: proposal.id,
                user_id,
            });
        }

        let vote = self
            .votes
            .save(NewVote {
                proposal_id: proposal.id.clone(),
                user_id,
            })
            .await?;

        if view.topic_id() == proposal.topic_id {
            if let Err(err) = view.force_refresh().await {
                tracing::warn!(topic_id = %proposal.topic_id, error = %err, "forced refresh after vote failed");
            }
        } else {
            tracing::debug!(
                topic_id = %proposal.topic_id,
                view_topic_id = %view.topic_id(),
                "vote cast outside the viewed topic"
            );
        }

        Ok(vote)
    }
}

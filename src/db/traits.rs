//! Typed repository seams over the persistence collaborator.
//!
//! The aggregator and the workflows only see these traits; [`Repository`]
//! implements them on SQLite.
//!
//! [`Repository`]: super::Repository

use async_trait::async_trait;

use super::{ChangeCallback, ChangeEvent, RecordKind, Subscription};
use crate::errors::AppError;
use crate::models::{NewProposal, NewVote, Proposal, Vote};

/// Foreign-key predicate for proposal queries and subscriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposalFilter {
    All,
    Topic(String),
}

impl ProposalFilter {
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.kind != RecordKind::Proposal {
            return false;
        }
        match self {
            ProposalFilter::All => true,
            ProposalFilter::Topic(topic_id) => event.parent_id == *topic_id,
        }
    }
}

/// Foreign-key predicate for vote queries and subscriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteFilter {
    All,
    Proposal(String),
}

impl VoteFilter {
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.kind != RecordKind::Vote {
            return false;
        }
        match self {
            VoteFilter::All => true,
            VoteFilter::Proposal(proposal_id) => event.parent_id == *proposal_id,
        }
    }
}

#[async_trait]
pub trait ProposalRepository: Send + Sync {
    /// Proposals matching `filter` in creation order. No match is an empty vec.
    async fn query(&self, filter: &ProposalFilter) -> Result<Vec<Proposal>, AppError>;

    async fn get(&self, id: &str) -> Result<Option<Proposal>, AppError>;

    /// Persist a proposal. Callers validate required fields first.
    async fn save(&self, proposal: NewProposal) -> Result<Proposal, AppError>;

    async fn subscribe(
        &self,
        filter: ProposalFilter,
        on_change: ChangeCallback,
    ) -> Result<Subscription, AppError>;
}

#[async_trait]
pub trait VoteRepository: Send + Sync {
    /// Votes matching `filter` in creation order. No match is an empty vec.
    async fn query(&self, filter: &VoteFilter) -> Result<Vec<Vote>, AppError>;

    /// Persist a vote. A second vote for the same (proposal, user) pair fails
    /// with [`AppError::DuplicateVote`].
    async fn save(&self, vote: NewVote) -> Result<Vote, AppError>;

    async fn subscribe(
        &self,
        filter: VoteFilter,
        on_change: ChangeCallback,
    ) -> Result<Subscription, AppError>;
}

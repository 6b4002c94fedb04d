//! Proposal model and its vote-annotated projection.

use serde::{Deserialize, Serialize};

use super::Vote;

/// A user-submitted option for a topic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub id: String,
    #[serde(rename = "topicID")]
    pub topic_id: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "userID")]
    pub user_id: String,
    pub created_at: String,
}

/// A proposal before the store has assigned its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProposal {
    pub topic_id: String,
    pub title: String,
    pub description: String,
    pub user_id: String,
}

/// Proposal plus the votes it received. Derived on every refresh, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedProposal {
    #[serde(flatten)]
    pub proposal: Proposal,
    pub votes: Vec<Vote>,
    pub vote_count: usize,
}

impl AnnotatedProposal {
    pub fn new(proposal: Proposal, votes: Vec<Vote>) -> Self {
        let vote_count = votes.len();
        Self {
            proposal,
            votes,
            vote_count,
        }
    }

    pub fn id(&self) -> &str {
        &self.proposal.id
    }
}

/// Request body for submitting a proposal.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitProposalRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

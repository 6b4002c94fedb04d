//! Vote model.

use serde::{Deserialize, Serialize};

/// A single user's endorsement of one proposal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub id: String,
    #[serde(rename = "proposalID")]
    pub proposal_id: String,
    #[serde(rename = "userID")]
    pub user_id: String,
    pub created_at: String,
}

/// A vote before the store has assigned its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVote {
    pub proposal_id: String,
    pub user_id: String,
}

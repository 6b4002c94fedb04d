//! Topic model. Topics are owned by the administrative surface; the proposal
//! pipeline only reads them.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a topic.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TopicStatus {
    Draft,
    #[default]
    Open,
    Closed,
}

impl TopicStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicStatus::Draft => "draft",
            TopicStatus::Open => "open",
            TopicStatus::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(TopicStatus::Draft),
            "open" => Some(TopicStatus::Open),
            "closed" => Some(TopicStatus::Closed),
            _ => None,
        }
    }
}

/// The subject under discussion that proposals belong to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: TopicStatus,
}

/// Request body for creating a new topic.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTopicRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TopicStatus,
}

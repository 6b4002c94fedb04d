//! Database repository for CRUD operations.
//!
//! Uses prepared statements; every successful write publishes a change event.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use sqlx::{Row, SqlitePool};

use super::{
    ChangeCallback, ChangeEvent, ChangeFeed, ChangeOp, ProposalFilter, ProposalRepository,
    RecordKind, Subscription, VoteFilter, VoteRepository,
};
use crate::errors::AppError;
use crate::models::{
    CreateTopicRequest, NewProposal, NewVote, Proposal, Topic, TopicStatus, Vote,
};

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            feed: ChangeFeed::default(),
        }
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    // ==================== TOPIC OPERATIONS ====================

    /// List all topics.
    pub async fn list_topics(&self) -> Result<Vec<Topic>, AppError> {
        let rows =
            sqlx::query("SELECT id, title, description, status FROM topics ORDER BY rowid")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|row| topic_from_row(&row)).collect())
    }

    /// Get a topic by ID.
    pub async fn get_topic(&self, id: &str) -> Result<Option<Topic>, AppError> {
        let row = sqlx::query("SELECT id, title, description, status FROM topics WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(topic_from_row))
    }

    /// Create a new topic.
    pub async fn create_topic(&self, request: &CreateTopicRequest) -> Result<Topic, AppError> {
        let id = uuid::Uuid::new_v4().to_string();

        sqlx::query("INSERT INTO topics (id, title, description, status) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(&request.title)
            .bind(&request.description)
            .bind(request.status.as_str())
            .execute(&self.pool)
            .await?;

        tracing::info!(topic_id = %id, "topic created");

        Ok(Topic {
            id,
            title: request.title.clone(),
            description: request.description.clone(),
            status: request.status,
        })
    }

    // ==================== PROPOSAL OPERATIONS ====================

    /// Delete a proposal and, by cascade, its votes.
    ///
    /// Publishes one deletion per cascaded vote before the proposal's own.
    pub async fn delete_proposal(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let topic_id: String = sqlx::query("SELECT topic_id FROM proposals WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .map(|row| row.get("topic_id"))
            .ok_or_else(|| AppError::NotFound(format!("Proposal {} not found", id)))?;

        let vote_ids: Vec<String> = sqlx::query("SELECT id FROM votes WHERE proposal_id = ?")
            .bind(id)
            .fetch_all(&mut *tx)
            .await?
            .iter()
            .map(|row| row.get("id"))
            .collect();

        let result = sqlx::query("DELETE FROM proposals WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Proposal {} not found", id)));
        }

        tx.commit().await?;

        tracing::info!(proposal_id = %id, votes = vote_ids.len(), "proposal deleted");
        for vote_id in vote_ids {
            self.feed.publish(ChangeEvent {
                kind: RecordKind::Vote,
                op: ChangeOp::Deleted,
                id: vote_id,
                parent_id: id.to_string(),
            });
        }
        self.feed.publish(ChangeEvent {
            kind: RecordKind::Proposal,
            op: ChangeOp::Deleted,
            id: id.to_string(),
            parent_id: topic_id,
        });
        Ok(())
    }
}

#[async_trait]
impl ProposalRepository for Repository {
    async fn query(&self, filter: &ProposalFilter) -> Result<Vec<Proposal>, AppError> {
        let rows = match filter {
            ProposalFilter::All => {
                sqlx::query(
                    "SELECT id, topic_id, title, description, user_id, created_at FROM proposals ORDER BY created_at, rowid",
                )
                .fetch_all(&self.pool)
                .await?
            }
            ProposalFilter::Topic(topic_id) => {
                sqlx::query(
                    "SELECT id, topic_id, title, description, user_id, created_at FROM proposals WHERE topic_id = ? ORDER BY created_at, rowid",
                )
                .bind(topic_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.into_iter().map(|row| proposal_from_row(&row)).collect())
    }

    async fn get(&self, id: &str) -> Result<Option<Proposal>, AppError> {
        let row = sqlx::query(
            "SELECT id, topic_id, title, description, user_id, created_at FROM proposals WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(proposal_from_row))
    }

    async fn save(&self, proposal: NewProposal) -> Result<Proposal, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = timestamp();

        sqlx::query(
            "INSERT INTO proposals (id, topic_id, title, description, user_id, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&proposal.topic_id)
        .bind(&proposal.title)
        .bind(&proposal.description)
        .bind(&proposal.user_id)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|err| {
            rejected_write(err, || {
                AppError::Validation(format!("topic {} does not exist", proposal.topic_id))
            })
        })?;

        tracing::info!(proposal_id = %id, topic_id = %proposal.topic_id, "proposal saved");
        self.feed.publish(ChangeEvent {
            kind: RecordKind::Proposal,
            op: ChangeOp::Created,
            id: id.clone(),
            parent_id: proposal.topic_id.clone(),
        });

        Ok(Proposal {
            id,
            topic_id: proposal.topic_id,
            title: proposal.title,
            description: proposal.description,
            user_id: proposal.user_id,
            created_at: now,
        })
    }

    async fn subscribe(
        &self,
        filter: ProposalFilter,
        on_change: ChangeCallback,
    ) -> Result<Subscription, AppError> {
        tracing::debug!(?filter, "subscribing to proposal changes");
        Ok(self
            .feed
            .subscribe(move |event| filter.matches(event), on_change))
    }
}

#[async_trait]
impl VoteRepository for Repository {
    async fn query(&self, filter: &VoteFilter) -> Result<Vec<Vote>, AppError> {
        let rows = match filter {
            VoteFilter::All => {
                sqlx::query(
                    "SELECT id, proposal_id, user_id, created_at FROM votes ORDER BY created_at, rowid",
                )
                .fetch_all(&self.pool)
                .await?
            }
            VoteFilter::Proposal(proposal_id) => {
                sqlx::query(
                    "SELECT id, proposal_id, user_id, created_at FROM votes WHERE proposal_id = ? ORDER BY created_at, rowid",
                )
                .bind(proposal_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.into_iter().map(|row| vote_from_row(&row)).collect())
    }

    async fn save(&self, vote: NewVote) -> Result<Vote, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = timestamp();

        sqlx::query("INSERT INTO votes (id, proposal_id, user_id, created_at) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(&vote.proposal_id)
            .bind(&vote.user_id)
            .bind(&now)
            .execute(&self.pool)
            .await
            .map_err(|err| {
                if matches!(&err, sqlx::Error::Database(db) if db.is_unique_violation()) {
                    return AppError::DuplicateVote {
                        proposal_id: vote.proposal_id.clone(),
                        user_id: vote.user_id.clone(),
                    };
                }
                rejected_write(err, || {
                    AppError::Validation(format!("proposal {} does not exist", vote.proposal_id))
                })
            })?;

        tracing::info!(vote_id = %id, proposal_id = %vote.proposal_id, "vote saved");
        self.feed.publish(ChangeEvent {
            kind: RecordKind::Vote,
            op: ChangeOp::Created,
            id: id.clone(),
            parent_id: vote.proposal_id.clone(),
        });

        Ok(Vote {
            id,
            proposal_id: vote.proposal_id,
            user_id: vote.user_id,
            created_at: now,
        })
    }

    async fn subscribe(
        &self,
        filter: VoteFilter,
        on_change: ChangeCallback,
    ) -> Result<Subscription, AppError> {
        tracing::debug!(?filter, "subscribing to vote changes");
        Ok(self
            .feed
            .subscribe(move |event| filter.matches(event), on_change))
    }
}

/// Map a referential-integrity rejection to a validation error; anything else
/// is a repository failure.
fn rejected_write(err: sqlx::Error, on_missing_parent: impl FnOnce() -> AppError) -> AppError {
    if matches!(&err, sqlx::Error::Database(db) if db.is_foreign_key_violation()) {
        return on_missing_parent();
    }
    AppError::from(err)
}

/// Fixed-width RFC 3339 so timestamps sort lexically.
fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

// Helper functions for row conversion

fn topic_from_row(row: &sqlx::sqlite::SqliteRow) -> Topic {
    let status: String = row.get("status");
    Topic {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        status: TopicStatus::parse(&status).unwrap_or_default(),
    }
}

fn proposal_from_row(row: &sqlx::sqlite::SqliteRow) -> Proposal {
    Proposal {
        id: row.get("id"),
        topic_id: row.get("topic_id"),
        title: row.get("title"),
        description: row.get("description"),
        user_id: row.get("user_id"),
        created_at: row.get("created_at"),
    }
}

fn vote_from_row(row: &sqlx::sqlite::SqliteRow) -> Vote {
    Vote {
        id: row.get("id"),
        proposal_id: row.get("proposal_id"),
        user_id: row.get("user_id"),
        created_at: row.get("created_at"),
    }
}

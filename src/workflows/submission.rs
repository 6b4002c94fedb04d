//! Proposal submission.

use std::sync::Arc;

use serde::Serialize;

use crate::aggregator::RefreshTarget;
use crate::db::ProposalRepository;
use crate::errors::AppError;
use crate::identity::IdentityResolver;
use crate::models::{NewProposal, Proposal};

/// Input state of the "propose an option" form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalForm {
    pub title: String,
    pub description: String,
    #[serde(rename = "topicID")]
    pub topic_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Title,
    Description,
}

impl ProposalForm {
    pub fn for_topic(topic_id: impl Into<String>) -> Self {
        Self {
            topic_id: topic_id.into(),
            ..Self::default()
        }
    }

    /// Names of required fields that are empty or whitespace.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("title", &self.title),
            ("description", &self.description),
            ("topicID", &self.topic_id),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

/// Validates and persists proposals typed into a [`ProposalForm`].
pub struct ProposalSubmission {
    identity: Arc<IdentityResolver>,
    proposals: Arc<dyn ProposalRepository>,
    form: ProposalForm,
}

impl ProposalSubmission {
    pub fn new(
        identity: Arc<IdentityResolver>,
        proposals: Arc<dyn ProposalRepository>,
        topic_id: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            proposals,
            form: ProposalForm::for_topic(topic_id),
        }
    }

    pub fn form(&self) -> &ProposalForm {
        &self.form
    }

    pub fn set_input(&mut self, field: FormField, value: impl Into<String>) {
        match field {
            FormField::Title => self.form.title = value.into(),
            FormField::Description => self.form.description = value.into(),
        }
    }

    /// Save the form as a new proposal and force `view` to refresh.
    ///
    /// Nothing is written when the form is incomplete. On success only the
    /// title and description are cleared; the topic stays selected.
    pub async fn submit(&mut self, view: &dyn RefreshTarget) -> Result<Proposal, AppError> {
        let user_id = self.identity.current_user_id().await?;

        let missing = self.form.missing_fields();
        if !missing.is_empty() {
            tracing::warn!(?missing, topic_id = %self.form.topic_id, "incomplete proposal form");
            return Err(AppError::missing_fields(&missing));
        }

        let proposal = self
            .proposals
            .save(NewProposal {
                topic_id: self.form.topic_id.trim().to_string(),
                title: self.form.title.trim().to_string(),
                description: self.form.description.trim().to_string(),
                user_id,
            })
            .await?;

        if view.topic_id() == proposal.topic_id {
            if let Err(err) = view.force_refresh().await {
                tracing::warn!(topic_id = %proposal.topic_id, error = %err, "forced refresh after submit failed");
            }
        }

        self.form.title.clear();
        self.form.description.clear();
        Ok(proposal)
    }
}

//! Proposal and vote API endpoints.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Extension, Json,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::{wrappers::UnboundedReceiverStream, Stream, StreamExt};

use super::{success, ApiResult};
use crate::aggregator::RankedSnapshot;
use crate::auth::{CurrentUser, RequestIdentity};
use crate::db::ProposalRepository;
use crate::errors::AppError;
use crate::identity::IdentityResolver;
use crate::models::{AnnotatedProposal, Proposal, SubmitProposalRequest, Vote};
use crate::workflows::{FormField, ProposalSubmission, VoteCasting};
use crate::AppState;

/// Result of a submission: the new proposal and the ranking right after it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedProposal {
    pub proposal: Proposal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposals: Option<Vec<AnnotatedProposal>>,
}

/// Result of a vote: the new vote and the ranking right after it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CastVote {
    pub vote: Vote,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposals: Option<Vec<AnnotatedProposal>>,
}

fn identity_for(user: CurrentUser) -> Arc<IdentityResolver> {
    Arc::new(IdentityResolver::new(Arc::new(RequestIdentity::new(user))))
}

async fn require_topic(state: &AppState, topic_id: &str) -> Result<(), AppError> {
    match state.repo.get_topic(topic_id).await? {
        Some(_) => Ok(()),
        None => Err(AppError::NotFound(format!("Topic {} not found", topic_id))),
    }
}

/// GET /api/topics/:id/proposals - Ranked proposals of a topic.
pub async fn list_proposals(
    State(state): State<AppState>,
    Path(topic_id): Path<String>,
) -> ApiResult<Vec<AnnotatedProposal>> {
    require_topic(&state, &topic_id).await?;
    success(state.aggregator.refresh(&topic_id).await?)
}

/// GET /api/topics/:id/proposals/stream - Live ranking as server-sent events.
///
/// Each connection owns one topic session; it ends when the client goes away.
pub async fn stream_proposals(
    State(state): State<AppState>,
    Path(topic_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    require_topic(&state, &topic_id).await?;

    let (tx, rx) = mpsc::unbounded_channel::<Vec<AnnotatedProposal>>();
    let session = state
        .aggregator
        .subscribe(
            &topic_id,
            Arc::new(move |proposals: &[AnnotatedProposal]| {
                let _ = tx.send(proposals.to_vec());
            }),
        )
        .await?;

    let stream = UnboundedReceiverStream::new(rx).map(move |proposals| {
        let _live = &session;
        let event = Event::default().event("proposals");
        Ok(match event.json_data(&proposals) {
            Ok(event) => event,
            Err(err) => {
                tracing::error!(error = %err, "failed to encode proposals event");
                Event::default().event("error").data("encoding failed")
            }
        })
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// POST /api/topics/:id/proposals - Submit a proposal.
pub async fn submit_proposal(
    State(state): State<AppState>,
    Path(topic_id): Path<String>,
    Extension(user): Extension<CurrentUser>,
    payload: Result<Json<SubmitProposalRequest>, JsonRejection>,
) -> ApiResult<SubmittedProposal> {
    let Json(request) = payload?;
    let mut submission = ProposalSubmission::new(identity_for(user), state.repo.clone(), &topic_id);
    submission.set_input(FormField::Title, request.title);
    submission.set_input(FormField::Description, request.description);

    let view = RankedSnapshot::new(state.aggregator.clone(), &topic_id);
    let proposal = submission.submit(&view).await?;

    success(SubmittedProposal {
        proposal,
        proposals: view.into_latest(),
    })
}

/// POST /api/topics/:id/proposals/:proposal_id/votes - Vote for a proposal.
pub async fn cast_vote(
    State(state): State<AppState>,
    Path((topic_id, proposal_id)): Path<(String, String)>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<CastVote> {
    let in_topic = ProposalRepository::get(state.repo.as_ref(), &proposal_id)
        .await?
        .is_some_and(|proposal| proposal.topic_id == topic_id);
    if !in_topic {
        return Err(AppError::NotFound(format!(
            "Proposal {} not found in topic {}",
            proposal_id, topic_id
        )));
    }

    let casting = VoteCasting::new(identity_for(user), state.repo.clone(), state.repo.clone());

    let view = RankedSnapshot::new(state.aggregator.clone(), &topic_id);
    let vote = casting.cast_vote(&proposal_id, &view).await?;

    success(CastVote {
        vote,
        proposals: view.into_latest(),
    })
}

/// DELETE /api/proposals/:id - Remove a proposal and its votes.
pub async fn delete_proposal(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.repo.delete_proposal(&id).await?;
    success(())
}

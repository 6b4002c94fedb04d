//! Proposal board
//!
//! Topics collect proposals, users vote on them, and every open view keeps a
//! live ranking of proposals by vote count. SQLite is the source of truth.
//!
//! The ranking pipeline ([`aggregator`], [`workflows`], [`identity`]) is
//! usable on its own; [`create_router`] wraps it in a JSON/SSE API.

pub mod aggregator;
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod identity;
pub mod models;
pub mod workflows;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use aggregator::ProposalAggregator;
use config::Config;
use db::Repository;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub aggregator: Arc<ProposalAggregator>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, config: Config) -> Self {
        let aggregator = ProposalAggregator::new(repo.clone(), repo.clone())
            .with_vote_fetch_concurrency(config.vote_fetch_concurrency);
        Self {
            repo,
            aggregator: Arc::new(aggregator),
            config: Arc::new(config),
        }
    }
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let psk = state.config.api_psk.clone();

    let api_routes = Router::new()
        // Topics
        .route("/topics", get(api::list_topics))
        .route("/topics", post(api::create_topic))
        .route("/topics/{id}", get(api::get_topic))
        // Proposals
        .route("/topics/{id}/proposals", get(api::list_proposals))
        .route("/topics/{id}/proposals", post(api::submit_proposal))
        .route(
            "/topics/{id}/proposals/stream",
            get(api::stream_proposals),
        )
        .route("/proposals/{id}", delete(api::delete_proposal))
        // Votes
        .route(
            "/topics/{id}/proposals/{proposal_id}/votes",
            post(api::cast_vote),
        )
        .layer(middleware::from_fn(move |req, next| {
            auth::authenticate(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod testing;

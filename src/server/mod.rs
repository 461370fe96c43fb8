//! The chat-completions HTTP surface (§4.6, §6): an `axum` router exposing
//! `POST /v1/chat/completions`, assembled the way the teacher's `main.rs`
//! builds and serves routes — a router, shared state, CORS/trace layers.

pub mod handler;
pub mod wire;

use crate::config::Config;
use crate::scheduler::dispatch::Collaborators;
use axum::routing::post;
use axum::Router;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared, cheaply-cloneable state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub collaborators: Collaborators,
    pub step_sleep: Duration,
}

impl AppState {
    pub fn new(config: Config, collaborators: Collaborators) -> Self {
        let step_sleep = Duration::from_millis(config.step_sleep_ms);
        Self {
            config,
            collaborators,
            step_sleep,
        }
    }
}

/// Build the router. Split out from `main` so integration tests can mount
/// it against an `axum::Router` test client without binding a socket.
pub fn router(state: AppState) -> Router {
    let cors = if state.config.server.cors_allow_any {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/v1/chat/completions", post(handler::chat_completions))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

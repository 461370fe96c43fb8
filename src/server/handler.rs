//! `POST /v1/chat/completions` handler (§4.6): builds a `SchedulerState`
//! from the wire request, runs the scheduler, and renders either an SSE
//! stream or a single buffered JSON response.

use super::wire::{
    self, buffered_error_response, buffered_response, ChatCompletionsChunk, ChatCompletionsRequest,
};
use super::AppState;
use crate::config::BudgetProfile;
use crate::error::{SchedulerError, ServerError};
use crate::scheduler::state::SchedulerState;
use crate::scheduler::Scheduler;
use crate::stream::{StreamChannel, StreamChunk};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use futures::stream::{self, Stream};
use std::collections::HashSet;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{error, info};

pub async fn chat_completions(
    State(state): State<AppState>,
    Json(request): Json<ChatCompletionsRequest>,
) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let model = request.model.clone();

    let original_question = match last_user_turn(&request) {
        Some(question) => question,
        None => {
            return bad_request(&request_id, &model, request.stream, "no user turn found in conversation");
        }
    };

    let budget = resolve_budget(&state, &request);
    let scheduler_state = SchedulerState::new(
        original_question,
        budget,
        state.config.hosts.clone(),
        to_hostset(request.boost_hostnames.clone()),
        to_hostset(request.bad_hostnames.clone()),
        to_hostset(request.only_hostnames.clone()),
        request.max_returned_urls.unwrap_or(100),
        request.no_direct_answer,
    );
    let conversation = wire::ingest_messages(request.messages);
    let scheduler = Scheduler::new(state.collaborators.clone(), state.step_sleep);

    if request.stream {
        stream_response(request_id, model, scheduler, scheduler_state, conversation).await
    } else {
        buffered(request_id, model, scheduler, scheduler_state, conversation).await
    }
}

fn last_user_turn(request: &ChatCompletionsRequest) -> Option<String> {
    request
        .messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| match &m.content {
            super::wire::WireContent::Text(text) => text.clone(),
            super::wire::WireContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    super::wire::WireContentPart::Text { text } => Some(text.clone()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        })
}

fn to_hostset(hosts: Vec<String>) -> HashSet<String> {
    hosts.into_iter().collect()
}

fn resolve_budget(state: &AppState, request: &ChatCompletionsRequest) -> BudgetProfile {
    let mut budget = state.config.budget_for_effort(request.reasoning_effort);
    if let Some(tokens) = request.budget_tokens.or(request.max_completion_tokens) {
        budget.token_budget = tokens;
    }
    if let Some(attempts) = request.max_attempts {
        budget.max_bad_attempts = attempts;
    }
    budget
}

async fn buffered(
    request_id: String,
    model: String,
    scheduler: Scheduler,
    scheduler_state: SchedulerState,
    conversation: Vec<crate::llm::ChatMessage>,
) -> Response {
    let (sink, _rx) = StreamChannel::new();
    match scheduler.run(scheduler_state, conversation, &sink).await {
        Ok(outcome) => {
            let usage = outcome.usage;
            Json(buffered_response(&request_id, &model, usage, outcome)).into_response()
        }
        Err(error) => fatal_error_response(&request_id, &model, false, error),
    }
}

async fn stream_response(
    request_id: String,
    model: String,
    scheduler: Scheduler,
    scheduler_state: SchedulerState,
    conversation: Vec<crate::llm::ChatMessage>,
) -> Response {
    let (channel, mut rx) = StreamChannel::new();

    tokio::spawn(async move {
        if let Err(error) = scheduler.run(scheduler_state, conversation, &channel).await {
            error!(%error, "scheduler run failed mid-stream");
            channel.error(error.to_string());
        }
    });

    let event_stream = stream::poll_fn(move |cx| rx.poll_recv(cx)).map(move |chunk: StreamChunk| {
        let wire_chunk: ChatCompletionsChunk = wire::chunk_for(&request_id, &model, chunk);
        Ok::<Event, Infallible>(Event::default().json_data(wire_chunk).unwrap_or_default())
    });

    Sse::new(event_stream)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
        .into_response()
}

fn fatal_error_response(request_id: &str, model: &str, streaming: bool, error: SchedulerError) -> Response {
    error!(%error, "scheduler run failed");
    let server_error = ServerError::from(error);
    if streaming {
        // Streaming callers observe the fatal error through the channel's
        // own `error()` path (see `stream_response`); this branch only
        // covers the buffered surface.
    }
    let body = buffered_error_response(request_id, model, &server_error.to_string());
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

fn bad_request(request_id: &str, model: &str, _streaming: bool, message: &str) -> Response {
    info!(message, "rejecting malformed chat-completions request");
    let body = buffered_error_response(request_id, model, message);
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

use futures::StreamExt;

//! Error taxonomy for the deep-research core, split by subsystem the way
//! a production kodegen crate keeps `UtilsError`/`AgentError` separate.

use thiserror::Error;

/// Failures from an external collaborator (LLM, search, fetch, rerank, sandbox).
///
/// These are almost always *recoverable* from the scheduler's point of view:
/// the caller logs, appends a diary narrative, and continues.
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("LLM returned a response that did not conform to the requested schema: {0}")]
    SchemaViolation(String),

    #[error("search provider error: {0}")]
    Search(String),

    #[error("fetch error for {url}: {source}")]
    Fetch { url: String, source: String },

    #[error("rerank error: {0}")]
    Rerank(String),

    #[error("code sandbox error: {0}")]
    Sandbox(String),

    #[error("collaborator call timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Failures from the scheduler loop itself.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("no user turn found in conversation")]
    EmptyConversation,

    #[error("token budget exhausted before any answer could be produced")]
    BudgetExhaustedWithoutAnswer,

    #[error("forced-answer terminal failed: {0}")]
    ForcedAnswerFailed(String),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Failures at the HTTP boundary.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("malformed request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("failed to write to response stream: {0}")]
    StreamWrite(String),
}

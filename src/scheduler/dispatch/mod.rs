//! One module per action the scheduler can dispatch (§4.1.1–§4.1.6).

pub mod answer;
pub mod beast_mode;
pub mod coding;
pub mod reflect;
pub mod search;
pub mod visit;

use crate::collaborators::{CodeSandbox, FetchClient, Reranker, SearchProvider};
use crate::llm::LlmClient;
use std::sync::Arc;

/// Every external collaborator the dispatch handlers may call, bundled so
/// call sites take one reference instead of five.
#[derive(Clone)]
pub struct Collaborators {
    pub llm: Arc<dyn LlmClient>,
    pub search: Arc<dyn SearchProvider>,
    pub fetch: Arc<dyn FetchClient>,
    pub rerank: Arc<dyn Reranker>,
    pub sandbox: Arc<dyn CodeSandbox>,
}

pub const MAX_QUERIES_PER_STEP: usize = 5;
pub const MAX_URLS_PER_STEP: usize = 5;
pub const MAX_REFLECT_PER_STEP: usize = 3;

//! External-world collaborators (§4.5): search, fetch, rerank and code
//! sandbox, each a small trait with an HTTP-backed default implementation
//! and, where the spec allows it, a no-op fallback so the scheduler works
//! with nothing configured beyond an LLM endpoint.

pub mod fetch;
pub mod rerank;
pub mod sandbox;
pub mod search;

pub use fetch::{FetchClient, FetchedPage, HttpFetchClient};
pub use rerank::{HttpReranker, NullReranker, Reranker};
pub use sandbox::{CodeSandbox, SandboxSolution, UnavailableSandbox};
pub use search::{HttpSearchProvider, SearchHit, SearchProvider};

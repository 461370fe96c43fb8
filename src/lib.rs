//! `deepresearch_core`: the agent control loop behind a deep-research chat
//! assistant — a bounded, budget-aware step scheduler (search / visit /
//! reflect / answer / coding), a deduplicating URL store, a multi-criterion
//! answer evaluator, and the naturalistic streaming channel that narrates
//! the loop to a chat-completions client.
//!
//! See `SPEC_FULL.md` for the full specification and `DESIGN.md` for the
//! grounding of each module against its source material.

pub mod collaborators;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod knowledge;
pub mod llm;
pub mod scheduler;
pub mod server;
pub mod stream;
pub mod trackers;
pub mod types;
pub mod url_store;

pub use config::{load_yaml_config, Config};
pub use error::{CollaboratorError, SchedulerError, ServerError};
pub use scheduler::{RunOutcome, Scheduler};
pub use server::{router, AppState};

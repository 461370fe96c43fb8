//! Leaf components: token accounting and the step-event source that feeds
//! the streaming channel. Both are cheaply `Clone` (`Arc`-backed) the way
//! the teacher's `ResearchSession` shares state with its background task.

mod action_tracker;
mod token_tracker;

pub use action_tracker::{ActionEvent, ActionTracker};
pub use token_tracker::TokenTracker;

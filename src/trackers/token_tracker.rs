use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Accumulates per-tool token usage for one request and answers "over
/// budget?" against a fixed `token_budget`.
///
/// `Clone` is cheap (shares the same counters) so it can be handed to every
/// collaborator call site without threading a `&mut` through the scheduler.
#[derive(Clone)]
pub struct TokenTracker {
    total: Arc<AtomicU64>,
    prompt: Arc<AtomicU64>,
    completion: Arc<AtomicU64>,
}

impl TokenTracker {
    pub fn new() -> Self {
        Self {
            total: Arc::new(AtomicU64::new(0)),
            prompt: Arc::new(AtomicU64::new(0)),
            completion: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Record usage from one LLM call.
    pub fn record(&self, prompt_tokens: u64, completion_tokens: u64) {
        self.prompt.fetch_add(prompt_tokens, Ordering::Relaxed);
        self.completion
            .fetch_add(completion_tokens, Ordering::Relaxed);
        self.total
            .fetch_add(prompt_tokens + completion_tokens, Ordering::Relaxed);
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn prompt_tokens(&self) -> u64 {
        self.prompt.load(Ordering::Relaxed)
    }

    pub fn completion_tokens(&self) -> u64 {
        self.completion.load(Ordering::Relaxed)
    }

    /// `true` once usage reaches `fraction` of `token_budget`. The main loop
    /// calls this with `fraction = 0.85` to decide when to stop iterating
    /// and enter the forced-answer terminal (§4.1).
    pub fn over_fraction(&self, token_budget: u64, fraction: f64) -> bool {
        self.total() as f64 >= token_budget as f64 * fraction
    }

    pub fn over_budget(&self, token_budget: u64) -> bool {
        self.total() >= token_budget
    }
}

impl Default for TokenTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_accumulate_across_calls() {
        let tracker = TokenTracker::new();
        tracker.record(100, 50);
        tracker.record(200, 25);
        assert_eq!(tracker.total(), 375);
        assert_eq!(tracker.prompt_tokens(), 300);
        assert_eq!(tracker.completion_tokens(), 75);
    }

    #[test]
    fn over_fraction_reflects_the_0_85_reserve() {
        let tracker = TokenTracker::new();
        tracker.record(840, 0);
        assert!(!tracker.over_fraction(1000, 0.85));
        tracker.record(20, 0);
        assert!(tracker.over_fraction(1000, 0.85));
    }

    #[test]
    fn clone_shares_the_same_counters() {
        let tracker = TokenTracker::new();
        let clone = tracker.clone();
        clone.record(10, 10);
        assert_eq!(tracker.total(), 20);
    }
}

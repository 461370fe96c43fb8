//! Reflect dispatch (§4.1.4): turn proposed sub-questions into new gaps.

use super::MAX_REFLECT_PER_STEP;
use crate::error::SchedulerResult;
use crate::scheduler::state::SchedulerState;
use crate::stream::StreamChannel;

pub fn dispatch(state: &mut SchedulerState, stream: &StreamChannel, sub_questions: Vec<String>) -> SchedulerResult<()> {
    let mut survivors = Vec::new();
    for question in sub_questions {
        if state.all_questions.insert(question.clone()) {
            survivors.push(question);
        }
        if survivors.len() >= MAX_REFLECT_PER_STEP {
            break;
        }
    }

    if survivors.is_empty() {
        let narrative = "No new sub-questions surfaced; need to think differently.";
        state.diary.push(narrative.to_string());
        stream.push_think(narrative);
    } else {
        for question in &survivors {
            state.gaps.push(question.clone());
        }
        let narrative = format!("Identified {} new sub-question(s) to pursue.", survivors.len());
        state.diary.push(narrative.clone());
        stream.push_think(narrative);
    }

    state.allowed.reflect = false;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BudgetProfile, HostListsConfig};
    use std::collections::HashSet;

    fn new_state() -> SchedulerState {
        SchedulerState::new(
            "original".into(),
            BudgetProfile { token_budget: 100_000, max_bad_attempts: 1 },
            HostListsConfig::default(),
            HashSet::new(),
            HashSet::new(),
            HashSet::new(),
            100,
            false,
        )
    }

    #[tokio::test]
    async fn survivors_are_pushed_onto_gaps_and_all_questions() {
        let mut state = new_state();
        let (stream, _rx) = StreamChannel::new();
        dispatch(&mut state, &stream, vec!["sub a".into(), "sub b".into()]).unwrap();
        assert_eq!(state.gaps.len(), 3);
        assert!(state.all_questions.contains("sub a"));
        assert!(!state.allowed.reflect);
    }

    #[tokio::test]
    async fn duplicate_sub_questions_are_dropped() {
        let mut state = new_state();
        state.all_questions.insert("sub a".to_string());
        let (stream, _rx) = StreamChannel::new();
        dispatch(&mut state, &stream, vec!["sub a".into()]).unwrap();
        assert_eq!(state.gaps.len(), 1);
    }
}

//! Forced-answer terminal (§4.1.6, "beast mode"): exactly one LLM call with
//! every action but `answer` disabled, the accumulated improvement notes
//! fed in as binding reviewer feedback, and its output accepted unconditionally.

use super::Collaborators;
use crate::error::{SchedulerError, SchedulerResult};
use crate::llm::ChatMessage;
use crate::scheduler::prompt;
use crate::scheduler::state::SchedulerState;
use crate::types::AllowedActions;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct ForcedAnswer {
    text: String,
}

pub async fn run(state: &SchedulerState, collaborators: &Collaborators) -> SchedulerResult<String> {
    let answer_only = AllowedActions {
        answer: true,
        search: false,
        visit: false,
        reflect: false,
        coding: false,
    };

    let boost_hostnames = state.merged_boost_hostnames();
    let bad_hostnames = state.merged_bad_hostnames();
    let candidates = state
        .url_store
        .candidate_urls(&bad_hostnames, &state.only_hostnames);
    let rerank_scores = collaborators
        .rerank
        .rerank(state.original_question(), &candidates)
        .await
        .unwrap_or_default();
    let ranked = state.url_store.ranked(
        &boost_hostnames,
        &bad_hostnames,
        &state.only_hostnames,
        &rerank_scores,
        20,
    );
    let system = format!(
        "{}\n\nThis is your final attempt: you must produce the best possible answer now, \
         using only what you already know. Binding reviewer feedback from prior attempts:\n{}",
        prompt::system_prompt(state, &answer_only, &ranked),
        state.final_answer_improvements.join("\n")
    );

    let schema = json!({
        "type": "object",
        "properties": {
            "text": { "type": "string" },
        },
        "required": ["text"],
    });

    let messages = prompt::user_messages(state, &[], state.original_question());

    let generated = collaborators
        .llm
        .generate_object(&schema, &system, &messages)
        .await
        .map_err(|e| SchedulerError::ForcedAnswerFailed(e.to_string()))?;

    let forced: ForcedAnswer = serde_json::from_value(generated.value)
        .map_err(|e| SchedulerError::ForcedAnswerFailed(e.to_string()))?;

    Ok(forced.text)
}

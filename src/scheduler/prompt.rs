//! Prompt composition (§4.1 step 5) and the JSON Schema for the next-step
//! decision (§4.1 step 6): the union of currently-allowed action shapes.

use crate::llm::ChatMessage;
use crate::scheduler::state::SchedulerState;
use crate::types::{AllowedActions, BoostedUrl, KnowledgeType};
use serde_json::{json, Value};

/// Build the system prompt: allowed actions, top-20 ranked URLs (1-based),
/// the diary, the open question list, and previously failed keywords.
/// `allowed` is taken explicitly (rather than read off `state`) so the
/// forced-answer terminal can compose a prompt with every action but
/// `answer` disabled without first mutating the request's real state.
pub fn system_prompt(state: &SchedulerState, allowed: &AllowedActions, ranked_urls: &[BoostedUrl]) -> String {
    let mut sections = Vec::new();

    sections.push(
        "You are a deep-research agent. At every step you choose exactly one action \
         and explain your reasoning in `think` before acting."
            .to_string(),
    );

    sections.push(format!(
        "Allowed actions this step: {}",
        allowed_action_names(allowed).join(", ")
    ));

    if !ranked_urls.is_empty() {
        let listing: Vec<String> = ranked_urls
            .iter()
            .take(20)
            .enumerate()
            .map(|(i, boosted)| format!("{}. {} — {}", i + 1, boosted.record.url, boosted.record.title))
            .collect();
        sections.push(format!("Known URLs:\n{}", listing.join("\n")));
    }

    if !state.diary.is_empty() {
        sections.push(format!("Diary of prior steps:\n{}", state.diary.join("\n")));
    }

    if state.gaps.len() > 1 {
        sections.push(format!("Open questions: {}", state.gaps.join("; ")));
    }

    if !state.all_keywords.is_empty() {
        sections.push(format!(
            "Previously tried search queries (avoid repeating): {}",
            state.all_keywords.iter().cloned().collect::<Vec<_>>().join(", ")
        ));
    }

    sections.join("\n\n")
}

/// User turn: knowledge as Q/A pairs, the original conversation, then the
/// question currently being worked.
pub fn user_messages(
    state: &SchedulerState,
    conversation: &[ChatMessage],
    current_question: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::new();

    for item in state.knowledge.items() {
        let label = match item.kind {
            KnowledgeType::Qa => "Q/A",
            KnowledgeType::SideInfo => "side-info",
            KnowledgeType::Url => "page",
            KnowledgeType::Coding => "code",
            KnowledgeType::ChatHistory => "history",
        };
        messages.push(ChatMessage::user(format!(
            "[{label}] Q: {}\nA: {}",
            item.question, item.answer
        )));
    }

    messages.extend(conversation.iter().cloned());
    messages.push(ChatMessage::user(format!(
        "Current question to work on: {current_question}"
    )));

    messages
}

fn allowed_action_names(allowed: &AllowedActions) -> Vec<&'static str> {
    let mut names = Vec::new();
    if allowed.search {
        names.push("search");
    }
    if allowed.visit {
        names.push("visit");
    }
    if allowed.reflect {
        names.push("reflect");
    }
    if allowed.answer {
        names.push("answer");
    }
    if allowed.coding {
        names.push("coding");
    }
    names
}

fn think_schema() -> Value {
    json!({ "type": "string" })
}

/// Union JSON Schema of the currently-allowed action shapes, tagged by
/// `action` (matching `StepAction`'s serde representation).
pub fn action_schema(allowed: &AllowedActions) -> Value {
    let mut variants = Vec::new();

    if allowed.search {
        variants.push(json!({
            "type": "object",
            "properties": {
                "action": { "const": "search" },
                "queries": { "type": "array", "items": { "type": "string" } },
                "think": think_schema(),
            },
            "required": ["action", "queries", "think"],
        }));
    }
    if allowed.visit {
        variants.push(json!({
            "type": "object",
            "properties": {
                "action": { "const": "visit" },
                "url_indices": { "type": "array", "items": { "type": "integer" } },
                "think": think_schema(),
            },
            "required": ["action", "url_indices", "think"],
        }));
    }
    if allowed.reflect {
        variants.push(json!({
            "type": "object",
            "properties": {
                "action": { "const": "reflect" },
                "sub_questions": { "type": "array", "items": { "type": "string" } },
                "think": think_schema(),
            },
            "required": ["action", "sub_questions", "think"],
        }));
    }
    if allowed.answer {
        variants.push(json!({
            "type": "object",
            "properties": {
                "action": { "const": "answer" },
                "text": { "type": "string" },
                "references": { "type": "array", "items": { "type": "object" } },
                "is_final": { "type": "boolean" },
                "md_answer": { "type": ["string", "null"] },
                "think": think_schema(),
            },
            "required": ["action", "text", "is_final", "think"],
        }));
    }
    if allowed.coding {
        variants.push(json!({
            "type": "object",
            "properties": {
                "action": { "const": "coding" },
                "issue": { "type": "string" },
                "think": think_schema(),
            },
            "required": ["action", "issue", "think"],
        }));
    }

    json!({ "oneOf": variants })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_action_names_respects_the_flags() {
        let allowed = AllowedActions {
            answer: false,
            search: true,
            visit: false,
            reflect: true,
            coding: false,
        };
        assert_eq!(allowed_action_names(&allowed), vec!["search", "reflect"]);
    }

    #[test]
    fn action_schema_has_one_variant_per_allowed_action() {
        let allowed = AllowedActions::default();
        let schema = action_schema(&allowed);
        assert_eq!(schema["oneOf"].as_array().unwrap().len(), 5);
    }
}

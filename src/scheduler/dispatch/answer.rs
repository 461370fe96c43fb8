//! Answer dispatch (§4.1.1): reference enrichment, the trivial-answer fast
//! path, read-before-cite for unseen URLs, and the evaluator's three
//! outcomes (accept / reject-and-repair / accept-sub-question).

use super::Collaborators;
use crate::error::SchedulerResult;
use crate::evaluator::{self, EvaluationOutcome};
use crate::llm::ChatMessage;
use crate::scheduler::state::SchedulerState;
use crate::stream::StreamChannel;
use crate::types::{CriterionType, KnowledgeItem, Reference};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

/// What the main loop should do after `dispatch` returns.
pub enum Outcome {
    /// A trivial first-step answer, or an evaluator-accepted answer on the
    /// original question: the loop is done.
    Final(String, Vec<Reference>),
    /// A sub-question's answer was accepted; the loop continues.
    Continue,
    /// The triggered criterion had no attempts left: fall through to the
    /// forced-answer terminal.
    ExhaustedCriteria,
}

#[derive(Debug, Deserialize)]
struct ErrorAnalysis {
    recap: String,
    blame: String,
    improvement: String,
}

pub async fn dispatch(
    state: &mut SchedulerState,
    collaborators: &Collaborators,
    stream: &StreamChannel,
    text: String,
    mut references: Vec<Reference>,
    current_question: String,
) -> SchedulerResult<Outcome> {
    enrich_references(state, collaborators, &mut references).await;

    if state.total_step == 1 && references.is_empty() && !state.no_direct_answer {
        info!("accepting trivial first-step answer");
        return Ok(Outcome::Final(text, references));
    }

    fetch_unseen_references(state, collaborators, &references).await;

    let is_original = state.is_original_question(&current_question);
    let criteria = state
        .evaluation_criteria
        .get(&current_question)
        .cloned()
        .unwrap_or_default();

    let knowledge_context: String = state
        .knowledge
        .items()
        .iter()
        .map(|item| format!("{}: {}", item.question, item.answer))
        .collect::<Vec<_>>()
        .join("\n");

    let outcome = evaluator::evaluate(
        collaborators.llm.as_ref(),
        &current_question,
        &text,
        &criteria,
        &knowledge_context,
    )
    .await?;

    match outcome {
        EvaluationOutcome::Pass => {
            if is_original {
                let narrative = "Answer accepted for the original question.";
                state.diary.push(narrative.to_string());
                stream.push_think(narrative);
                Ok(Outcome::Final(text, references))
            } else {
                state.knowledge.push(KnowledgeItem {
                    references: references.clone(),
                    ..KnowledgeItem::qa(current_question.clone(), text)
                });
                state.gaps.retain(|q| q != &current_question);
                Ok(Outcome::Continue)
            }
        }
        EvaluationOutcome::Fail(verdict) if is_original => {
            handle_rejection(state, collaborators, stream, &current_question, verdict).await
        }
        EvaluationOutcome::Fail(verdict) => {
            let narrative = format!(
                "Sub-question answer rejected on {:?}: {}",
                verdict.criterion, verdict.think
            );
            state.diary.push(narrative.clone());
            stream.push_think(narrative);
            Ok(Outcome::Continue)
        }
    }
}

async fn handle_rejection(
    state: &mut SchedulerState,
    collaborators: &Collaborators,
    stream: &StreamChannel,
    current_question: &str,
    verdict: evaluator::EvaluationVerdict,
) -> SchedulerResult<Outcome> {
    let criteria = state.evaluation_criteria.entry(current_question.to_string()).or_default();
    let mut dropped = false;
    for criterion in criteria.iter_mut() {
        if criterion.kind == verdict.criterion && criterion.consume_attempt() {
            dropped = true;
        }
    }
    criteria.retain(|c| c.remaining_attempts > 0);

    if verdict.criterion == CriterionType::Strict {
        if let Some(plan) = &verdict.detail.improvement_plan {
            state.final_answer_improvements.push(plan.clone());
        }
    }

    if criteria.is_empty() {
        let _ = dropped;
        return Ok(Outcome::ExhaustedCriteria);
    }

    let narrative = format!("Answer rejected on {:?}: {}", verdict.criterion, verdict.think);
    state.diary.push(narrative.clone());
    stream.push_think(narrative);

    let analysis = run_error_analyzer(state, collaborators, &verdict.think).await;
    state.knowledge.push(KnowledgeItem::qa(
        "why is this answer bad?",
        format!("{}\n{}\n{}", analysis.recap, analysis.blame, analysis.improvement),
    ));

    state.diary.clear();
    state.step = 0;
    state.allowed.answer = false;

    Ok(Outcome::Continue)
}

async fn run_error_analyzer(
    state: &SchedulerState,
    collaborators: &Collaborators,
    critique: &str,
) -> ErrorAnalysis {
    let schema = json!({
        "type": "object",
        "properties": {
            "recap": { "type": "string" },
            "blame": { "type": "string" },
            "improvement": { "type": "string" },
        },
        "required": ["recap", "blame", "improvement"],
    });

    let prompt = format!(
        "The answer to \"{}\" was rejected with this critique: {critique}. Produce a recap of \
         what was attempted, where the blame lies, and a concrete improvement for the next try.",
        state.current_question()
    );

    let result = collaborators
        .llm
        .generate_object(&schema, "Analyze the failed answer attempt.", &[ChatMessage::user(prompt)])
        .await;

    match result {
        Ok(generated) => serde_json::from_value(generated.value).unwrap_or(ErrorAnalysis {
            recap: "unavailable".into(),
            blame: "unavailable".into(),
            improvement: critique.to_string(),
        }),
        Err(error) => {
            warn!(%error, "error analyzer call failed");
            ErrorAnalysis {
                recap: "unavailable".into(),
                blame: "unavailable".into(),
                improvement: critique.to_string(),
            }
        }
    }
}

/// Drop null/empty URLs, strip non-alphanumeric noise from quotes, merge
/// with URLStore metadata, and asynchronously fill `date_time`.
async fn enrich_references(
    state: &mut SchedulerState,
    collaborators: &Collaborators,
    references: &mut Vec<Reference>,
) {
    references.retain(|r| !r.url.trim().is_empty());
    for reference in references.iter_mut() {
        reference.exact_quote = reference
            .exact_quote
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace() || ".,;:!?'\"-".contains(*c))
            .collect();

        if let Some(record) = state.url_store.get(&reference.url) {
            if reference.title.is_empty() {
                reference.title = record.title.clone();
            }
        }
    }

    let probes = references.iter().map(|r| {
        let fetch = collaborators.fetch.clone();
        let url = r.url.clone();
        async move { (url, fetch.probe_last_modified(&url).await) }
    });
    let probed: Vec<(String, Option<chrono::DateTime<chrono::Utc>>)> =
        futures::future::join_all(probes).await;

    for reference in references.iter_mut() {
        if let Some((_, Some(date))) = probed.iter().find(|(url, _)| url == &reference.url) {
            reference.date_time = Some(*date);
            state.url_store.set_date(&reference.url, *date);
        }
    }
}

async fn fetch_unseen_references(
    state: &mut SchedulerState,
    collaborators: &Collaborators,
    references: &[Reference],
) {
    let unseen: Vec<Reference> = references
        .iter()
        .filter(|r| !state.visited_urls.contains(&r.url))
        .cloned()
        .collect();

    let fetches = unseen.iter().map(|r| {
        let fetch = collaborators.fetch.clone();
        let url = r.url.clone();
        async move { (url.clone(), fetch.fetch(&url).await) }
    });
    let results: Vec<_> = futures::future::join_all(fetches).await;

    for (url, result) in results {
        state.visited_urls.insert(url.clone());
        state.url_store.mark_visited(&url);
        match result {
            Ok(page) => {
                state.knowledge.push(KnowledgeItem::url(
                    format!("What is in {url}?"),
                    page.content,
                    Reference {
                        exact_quote: String::new(),
                        url: url.clone(),
                        title: page.title,
                        date_time: None,
                    },
                ));
            }
            Err(error) => {
                warn!(url, %error, "failed to fetch cited reference");
                state.bad_urls.insert(url);
            }
        }
    }
}

//! Step/action scheduler (§4.1): the bounded, budget-aware control loop.
//! Composes prompts, asks the LLM to pick one action, dispatches it, and
//! repeats until an answer is accepted or the budget forces a terminal call.

pub mod dispatch;
pub mod prompt;
pub mod state;

use crate::error::{SchedulerError, SchedulerResult};
use crate::llm::ChatMessage;
use crate::stream::{AnswerChunk, StreamChannel};
use crate::types::{CriteriaByQuestion, CriterionType, EvaluationCriterion, StepAction};
use dispatch::Collaborators;
use serde::Deserialize;
use serde_json::json;
use state::SchedulerState;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fraction of `token_budget` the main loop may spend before it must stop
/// and hand off to the forced-answer terminal (§4.1, §6).
const BUDGET_RESERVE_FRACTION: f64 = 0.85;
/// URL candidate pool size above which `search` is disabled for the step.
const SEARCH_DISABLE_THRESHOLD: usize = 200;
const PROMPT_URL_LIMIT: usize = 20;
/// Internal ranking pool size for the per-step `allow_visit`/`allow_search`
/// checks (§4.1 step 4) — distinct from `max_returned_urls`, which only
/// bounds the response body's URL lists (§4.2, §6).
const CANDIDATE_POOL_LIMIT: usize = 500;
/// Hard cap on `max_returned_urls` regardless of what the request asked for
/// (§4.2: "up to max_returned_urls (default 100, hard cap 300)").
const RESPONSE_URL_HARD_CAP: usize = 300;

pub struct Scheduler {
    collaborators: Collaborators,
    step_sleep: Duration,
    /// Publishes every dispatched step (§2 `ActionTracker`). The
    /// `StreamChannel` gets its user-visible narration straight from the
    /// dispatch handlers it's already threaded through; this is the
    /// secondary, debug-oriented feed §9 calls out as a benefit of using a
    /// broadcast channel over a bespoke single-consumer one.
    action_tracker: crate::trackers::ActionTracker,
}

#[derive(Debug, Deserialize)]
struct CriterionSelection {
    #[serde(default)]
    criteria: Vec<CriterionType>,
}

pub struct RunOutcome {
    pub answer: String,
    pub visited_urls: Vec<String>,
    pub read_urls: Vec<String>,
    pub num_urls: usize,
    pub references: Vec<crate::types::Reference>,
    pub usage: crate::llm::Usage,
}

impl Scheduler {
    pub fn new(collaborators: Collaborators, step_sleep: Duration) -> Self {
        Self {
            collaborators,
            step_sleep,
            action_tracker: crate::trackers::ActionTracker::new(),
        }
    }

    /// Subscribe to the raw per-step event feed (§2 `ActionTracker`),
    /// independent of the user-visible `StreamChannel` narration.
    pub fn subscribe_actions(&self) -> tokio::sync::broadcast::Receiver<crate::trackers::ActionEvent> {
        self.action_tracker.subscribe()
    }

    /// Run the full loop for one request. `stream` may be a no-op sink for
    /// non-streaming requests — dispatch handlers push to it unconditionally.
    pub async fn run(
        &self,
        mut state: SchedulerState,
        conversation: Vec<ChatMessage>,
        stream: &StreamChannel,
    ) -> SchedulerResult<RunOutcome> {
        loop {
            if state
                .token_tracker
                .over_fraction(state.budget.token_budget, BUDGET_RESERVE_FRACTION)
            {
                info!("token budget reserve reached, entering forced-answer terminal");
                break;
            }

            match self.step(&mut state, &conversation, stream).await? {
                StepResult::Continue => continue,
                StepResult::Done(answer, references) => {
                    return Ok(self.finish(&state, answer, references, stream).await);
                }
                StepResult::ExhaustedCriteria => break,
            }
        }

        let forced = dispatch::beast_mode::run(&state, &self.collaborators)
            .await
            .map_err(|_| SchedulerError::BudgetExhaustedWithoutAnswer)?;

        Ok(self.finish(&state, forced, Vec::new(), stream).await)
    }

    async fn finish(
        &self,
        state: &SchedulerState,
        answer: String,
        references: Vec<crate::types::Reference>,
        stream: &StreamChannel,
    ) -> RunOutcome {
        let cap = state.max_returned_urls.min(RESPONSE_URL_HARD_CAP);
        let visited_urls: Vec<String> = state.visited_urls.iter().take(cap).cloned().collect();
        let read_urls = visited_urls.clone();
        let num_urls = state.url_store.len().min(cap);
        let usage = crate::llm::Usage {
            prompt_tokens: state.token_tracker.prompt_tokens(),
            completion_tokens: state.token_tracker.completion_tokens(),
        };

        stream
            .finalize(AnswerChunk {
                text: answer.clone(),
                usage,
                visited_urls: visited_urls.clone(),
                read_urls: read_urls.clone(),
                num_urls,
                references: references.clone(),
            })
            .await;

        RunOutcome {
            answer,
            visited_urls,
            read_urls,
            num_urls,
            usage,
            references,
        }
    }

    async fn step(
        &self,
        state: &mut SchedulerState,
        conversation: &[ChatMessage],
        stream: &StreamChannel,
    ) -> SchedulerResult<StepResult> {
        let current_question = state.current_question();
        let is_first_iteration_for_original =
            state.is_original_question(&current_question) && !state.evaluation_criteria.contains_key(&current_question);

        if is_first_iteration_for_original {
            self.seed_criteria(state, &current_question).await;
        } else if !state.evaluation_criteria.contains_key(&current_question) {
            state
                .evaluation_criteria
                .insert(current_question.clone(), Vec::new());
        }

        if state.total_step == 0 && has_freshness_criterion(&state.evaluation_criteria, &current_question) {
            state.allowed.answer = false;
            state.allowed.reflect = false;
        }

        let merged_boost = state.merged_boost_hostnames();
        let merged_bad = state.merged_bad_hostnames();
        let candidates = state.url_store.candidate_urls(&merged_bad, &state.only_hostnames);
        let rerank_scores = match self.collaborators.rerank.rerank(&current_question, &candidates).await {
            Ok(scores) => scores,
            Err(error) => {
                warn!(%error, "reranker call failed, falling back to zero rerank_boost");
                Default::default()
            }
        };

        let ranked = state.url_store.ranked(
            &merged_boost,
            &merged_bad,
            &state.only_hostnames,
            &rerank_scores,
            CANDIDATE_POOL_LIMIT,
        );
        if ranked.is_empty() {
            state.allowed.visit = false;
        }
        if ranked.len() > SEARCH_DISABLE_THRESHOLD {
            state.allowed.search = false;
        }
        let per_step_urls: Vec<String> = ranked.iter().take(PROMPT_URL_LIMIT).map(|b| b.record.url.clone()).collect();

        let system = prompt::system_prompt(state, &state.allowed, &ranked);
        let messages = prompt::user_messages(state, conversation, &current_question);
        let schema = prompt::action_schema(&state.allowed);

        let generated = self
            .collaborators
            .llm
            .generate_object(&schema, &system, &messages)
            .await?;
        state
            .token_tracker
            .record(generated.usage.prompt_tokens, generated.usage.completion_tokens);

        let action: StepAction = serde_json::from_value(generated.value)
            .map_err(|e| SchedulerError::Collaborator(crate::error::CollaboratorError::SchemaViolation(e.to_string())))?;

        debug!(action = action.name(), step = state.total_step, "dispatching step");
        state.diary.push(format!("[{}] {}", action.name(), action.think()));
        self.action_tracker.publish(crate::trackers::ActionEvent {
            total_step: state.total_step,
            question: current_question.clone(),
            action: action.clone(),
        });

        let result = self
            .dispatch(state, stream, action, &current_question, &per_step_urls)
            .await?;

        state.allowed = Default::default();
        state.step += 1;
        state.total_step += 1;

        if !self.step_sleep.is_zero() {
            tokio::time::sleep(self.step_sleep).await;
        }

        Ok(result)
    }

    async fn dispatch(
        &self,
        state: &mut SchedulerState,
        stream: &StreamChannel,
        action: StepAction,
        current_question: &str,
        per_step_urls: &[String],
    ) -> SchedulerResult<StepResult> {
        match action {
            StepAction::Search { queries, .. } => {
                dispatch::search::dispatch(state, &self.collaborators, stream, queries).await?;
                Ok(StepResult::Continue)
            }
            StepAction::Visit { url_indices, .. } => {
                dispatch::visit::dispatch(state, &self.collaborators, stream, url_indices, per_step_urls).await?;
                Ok(StepResult::Continue)
            }
            StepAction::Reflect { sub_questions, .. } => {
                dispatch::reflect::dispatch(state, stream, sub_questions)?;
                Ok(StepResult::Continue)
            }
            StepAction::Coding { issue, .. } => {
                dispatch::coding::dispatch(state, &self.collaborators, stream, issue).await?;
                Ok(StepResult::Continue)
            }
            StepAction::Answer {
                text,
                references,
                ..
            } => {
                let outcome = dispatch::answer::dispatch(
                    state,
                    &self.collaborators,
                    stream,
                    text,
                    references,
                    current_question.to_string(),
                )
                .await?;
                Ok(match outcome {
                    dispatch::answer::Outcome::Final(answer, references) => {
                        StepResult::Done(answer, references)
                    }
                    dispatch::answer::Outcome::Continue => StepResult::Continue,
                    dispatch::answer::Outcome::ExhaustedCriteria => StepResult::ExhaustedCriteria,
                })
            }
        }
    }

    async fn seed_criteria(&self, state: &mut SchedulerState, question: &str) {
        let schema = json!({
            "type": "object",
            "properties": {
                "criteria": {
                    "type": "array",
                    "items": {
                        "type": "string",
                        "enum": ["definitive", "freshness", "plurality", "attribution", "completeness"]
                    }
                }
            },
            "required": ["criteria"],
        });

        let prompt_text = format!(
            "Which evaluation criteria apply to the question \"{question}\"? Choose from \
             definitive, freshness, plurality, attribution, completeness."
        );

        let selection = self
            .collaborators
            .llm
            .generate_object(&schema, "Select applicable evaluation criteria.", &[ChatMessage::user(prompt_text)])
            .await;

        let mut kinds: Vec<CriterionType> = match selection {
            Ok(generated) => serde_json::from_value::<CriterionSelection>(generated.value)
                .map(|s| s.criteria)
                .unwrap_or_default(),
            Err(error) => {
                warn!(%error, "criterion-selection call failed, defaulting to no optional criteria");
                Vec::new()
            }
        };
        if !kinds.contains(&CriterionType::Strict) {
            kinds.push(CriterionType::Strict);
        }

        let criteria = kinds
            .into_iter()
            .map(|kind| EvaluationCriterion::new(kind, state.budget.max_bad_attempts))
            .collect();
        state.evaluation_criteria.insert(question.to_string(), criteria);
    }
}

enum StepResult {
    Continue,
    Done(String, Vec<crate::types::Reference>),
    ExhaustedCriteria,
}

fn has_freshness_criterion(criteria: &CriteriaByQuestion, question: &str) -> bool {
    criteria
        .get(question)
        .map(|list| list.iter().any(|c| c.kind == CriterionType::Freshness))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_freshness_criterion_detects_presence() {
        let mut criteria = CriteriaByQuestion::new();
        criteria.insert(
            "q".to_string(),
            vec![EvaluationCriterion::new(CriterionType::Freshness, 1)],
        );
        assert!(has_freshness_criterion(&criteria, "q"));
        assert!(!has_freshness_criterion(&criteria, "other"));
    }
}

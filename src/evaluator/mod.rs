//! Answer evaluator / repair sub-loop (§4.3): a short-circuited sequence of
//! independent LLM calls, one per criterion, each constrained to its own
//! JSON Schema. The first failing criterion in `CRITERION_ORDER` decides
//! the outcome — later criteria are never consulted.

use crate::error::CollaboratorError;
use crate::llm::{ChatMessage, LlmClient};
use crate::types::{CriterionType, EvaluationCriterion, CRITERION_ORDER};
use serde::Deserialize;
use serde_json::{json, Value};

/// Extra structured detail a criterion may report alongside pass/fail,
/// used by the scheduler's diary narrative and by `strict`'s improvement plan.
#[derive(Debug, Clone, Default)]
pub struct CriterionDetail {
    pub days_ago: Option<u32>,
    pub max_age_days: Option<u32>,
    pub required: Option<u32>,
    pub provided: Option<u32>,
    pub improvement_plan: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EvaluationVerdict {
    pub criterion: CriterionType,
    pub pass: bool,
    pub think: String,
    pub detail: CriterionDetail,
}

#[derive(Debug, Clone)]
pub enum EvaluationOutcome {
    Pass,
    Fail(EvaluationVerdict),
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    pass: bool,
    think: String,
    #[serde(default)]
    days_ago: Option<u32>,
    #[serde(default)]
    max_age_days: Option<u32>,
    #[serde(default)]
    required: Option<u32>,
    #[serde(default)]
    provided: Option<u32>,
    #[serde(default)]
    improvement_plan: Option<String>,
}

fn schema_for(criterion: CriterionType) -> Value {
    let mut properties = json!({
        "pass": { "type": "boolean" },
        "think": { "type": "string" },
    });
    let mut required = vec!["pass", "think"];

    match criterion {
        CriterionType::Freshness => {
            properties["days_ago"] = json!({ "type": "integer" });
            properties["max_age_days"] = json!({ "type": "integer" });
            required.extend(["days_ago", "max_age_days"]);
        }
        CriterionType::Plurality => {
            properties["required"] = json!({ "type": "integer" });
            properties["provided"] = json!({ "type": "integer" });
            required.extend(["required", "provided"]);
        }
        CriterionType::Completeness => {
            properties["expected"] = json!({ "type": "array", "items": { "type": "string" } });
            properties["provided_aspects"] =
                json!({ "type": "array", "items": { "type": "string" } });
        }
        CriterionType::Strict => {
            properties["improvement_plan"] = json!({ "type": "string" });
        }
        CriterionType::Definitive | CriterionType::Attribution => {}
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn system_prompt_for(criterion: CriterionType) -> &'static str {
    match criterion {
        CriterionType::Definitive => {
            "Judge whether the candidate answer is a real, definitive answer rather than an \
             \"I don't know\"/refusal-shaped non-answer. Respond with the requested JSON object."
        }
        CriterionType::Freshness => {
            "Judge whether the question implies a need for recent information, and if so whether \
             every load-bearing claim in the candidate answer is backed by a source no older than \
             the implied recency window. Report days_ago (age of the oldest load-bearing source) \
             and max_age_days (the implied window). Respond with the requested JSON object."
        }
        CriterionType::Plurality => {
            "Judge whether the question asks for a specific number of items and whether the \
             candidate answer supplies at least that many. Report required and provided counts. \
             Respond with the requested JSON object."
        }
        CriterionType::Attribution => {
            "Judge whether every factual claim in the candidate answer is backed by a reference \
             whose exact_quote actually appears in the fetched page text supplied as knowledge. \
             Respond with the requested JSON object."
        }
        CriterionType::Completeness => {
            "Judge whether every aspect the question asks about is addressed by the candidate \
             answer. Respond with the requested JSON object."
        }
        CriterionType::Strict => {
            "Perform a catch-all quality review of the candidate answer: correctness, clarity, \
             completeness of reasoning. If it fails, provide a concrete improvement_plan. Respond \
             with the requested JSON object."
        }
    }
}

/// Evaluate one criterion in isolation.
async fn check_criterion(
    llm: &dyn LlmClient,
    criterion: CriterionType,
    question: &str,
    candidate_answer: &str,
    knowledge_context: &str,
) -> Result<EvaluationVerdict, CollaboratorError> {
    let schema = schema_for(criterion);
    let system = system_prompt_for(criterion);
    let messages = [ChatMessage::user(format!(
        "Question: {question}\n\nCandidate answer: {candidate_answer}\n\nKnowledge:\n{knowledge_context}"
    ))];

    let generated = llm.generate_object(&schema, system, &messages).await?;
    let raw: RawVerdict = serde_json::from_value(generated.value).map_err(|e| {
        CollaboratorError::SchemaViolation(format!("evaluator response did not match shape: {e}"))
    })?;

    Ok(EvaluationVerdict {
        criterion,
        pass: raw.pass,
        think: raw.think,
        detail: CriterionDetail {
            days_ago: raw.days_ago,
            max_age_days: raw.max_age_days,
            required: raw.required,
            provided: raw.provided,
            improvement_plan: raw.improvement_plan,
        },
    })
}

/// Run the short-circuited evaluation: only the criteria present in
/// `criteria` are checked, in `CRITERION_ORDER`, stopping at the first
/// failure.
pub async fn evaluate(
    llm: &dyn LlmClient,
    question: &str,
    candidate_answer: &str,
    criteria: &[EvaluationCriterion],
    knowledge_context: &str,
) -> Result<EvaluationOutcome, CollaboratorError> {
    let active: Vec<CriterionType> = criteria.iter().map(|c| c.kind).collect();

    for &kind in CRITERION_ORDER.iter() {
        if !active.contains(&kind) {
            continue;
        }
        let verdict = check_criterion(llm, kind, question, candidate_answer, knowledge_context).await?;
        if !verdict.pass {
            return Ok(EvaluationOutcome::Fail(verdict));
        }
    }

    Ok(EvaluationOutcome::Pass)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::llm::GeneratedObject;
    use crate::llm::Usage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ScriptedLlm {
        calls: Arc<AtomicUsize>,
        responses: Vec<Value>,
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn generate_object(
            &self,
            _schema: &Value,
            _system: &str,
            _messages: &[ChatMessage],
        ) -> Result<GeneratedObject, CollaboratorError> {
            let index = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(GeneratedObject {
                value: self.responses[index].clone(),
                usage: Usage::default(),
            })
        }
    }

    #[tokio::test]
    async fn short_circuits_on_first_failing_criterion() {
        let calls = Arc::new(AtomicUsize::new(0));
        let llm = ScriptedLlm {
            calls: calls.clone(),
            responses: vec![
                json!({ "pass": true, "think": "fine" }),
                json!({ "pass": false, "think": "too old", "days_ago": 30, "max_age_days": 7 }),
            ],
        };

        let criteria = vec![
            EvaluationCriterion::new(CriterionType::Definitive, 1),
            EvaluationCriterion::new(CriterionType::Freshness, 1),
            EvaluationCriterion::new(CriterionType::Strict, 1),
        ];

        let outcome = evaluate(&llm, "q", "a", &criteria, "").await.unwrap();
        match outcome {
            EvaluationOutcome::Fail(verdict) => {
                assert_eq!(verdict.criterion, CriterionType::Freshness);
                assert_eq!(verdict.detail.days_ago, Some(30));
            }
            EvaluationOutcome::Pass => panic!("expected a failure"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn all_criteria_passing_yields_pass() {
        let calls = Arc::new(AtomicUsize::new(0));
        let llm = ScriptedLlm {
            calls: calls.clone(),
            responses: vec![
                json!({ "pass": true, "think": "fine" }),
                json!({ "pass": true, "think": "fine" }),
            ],
        };
        let criteria = vec![
            EvaluationCriterion::new(CriterionType::Definitive, 1),
            EvaluationCriterion::new(CriterionType::Strict, 1),
        ];
        let outcome = evaluate(&llm, "q", "a", &criteria, "").await.unwrap();
        assert!(matches!(outcome, EvaluationOutcome::Pass));
    }
}

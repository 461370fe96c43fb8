//! Core data model: §3 of the spec. Transport-agnostic — the HTTP wire
//! shapes in `server::wire` are mapped to/from these at the boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An open question the scheduler still owes an answer to. May be the
/// original user question or a reflection-generated sub-question.
pub type Question = String;

/// A single cited source backing part of an answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reference {
    pub exact_quote: String,
    /// Always stored in canonical form — see `url_store::normalize`.
    pub url: String,
    pub title: String,
    pub date_time: Option<DateTime<Utc>>,
}

/// The kind of a `KnowledgeItem`, used by prompt composition to group and
/// label knowledge for the LLM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KnowledgeType {
    Qa,
    SideInfo,
    Url,
    Coding,
    ChatHistory,
}

/// One derived fact in the append-only knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub question: String,
    pub answer: String,
    #[serde(rename = "type")]
    pub kind: KnowledgeType,
    #[serde(default)]
    pub references: Vec<Reference>,
    pub updated: Option<DateTime<Utc>>,
    pub source_code: Option<String>,
}

impl KnowledgeItem {
    pub fn qa(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            kind: KnowledgeType::Qa,
            references: Vec::new(),
            updated: None,
            source_code: None,
        }
    }

    pub fn side_info(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            kind: KnowledgeType::SideInfo,
            ..Self::qa(question, answer)
        }
    }

    pub fn url(question: impl Into<String>, answer: impl Into<String>, reference: Reference) -> Self {
        Self {
            kind: KnowledgeType::Url,
            references: vec![reference],
            ..Self::qa(question, answer)
        }
    }

    pub fn coding(question: impl Into<String>, answer: impl Into<String>, source_code: String) -> Self {
        Self {
            kind: KnowledgeType::Coding,
            source_code: Some(source_code),
            ..Self::qa(question, answer)
        }
    }
}

/// A discovered URL and the raw signals used to rank it. Keyed by its
/// normalized form in `URLStore`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlRecord {
    pub url: String,
    pub title: String,
    pub description: String,
    pub date: Option<DateTime<Utc>>,
    pub weight: f64,
    pub occurrences: u32,
}

impl UrlRecord {
    pub fn new(url: String) -> Self {
        Self {
            url,
            title: String::new(),
            description: String::new(),
            date: None,
            weight: 1.0,
            occurrences: 1,
        }
    }
}

/// A `UrlRecord` plus its computed ranking components, produced by
/// `url_store::rank`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostedUrl {
    pub record: UrlRecord,
    pub freq_boost: f64,
    pub hostname_boost: f64,
    pub path_boost: f64,
    pub rerank_boost: f64,
    pub final_score: f64,
}

/// One of the six evaluation criteria, each a short-circuited LLM check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CriterionType {
    Definitive,
    Freshness,
    Plurality,
    Attribution,
    Completeness,
    Strict,
}

/// All six, in the fixed short-circuit evaluation order (§4.3).
pub const CRITERION_ORDER: [CriterionType; 6] = [
    CriterionType::Definitive,
    CriterionType::Freshness,
    CriterionType::Plurality,
    CriterionType::Attribution,
    CriterionType::Completeness,
    CriterionType::Strict,
];

/// A criterion attached to a question, with attempts remaining before it
/// is dropped from consideration.
#[derive(Debug, Clone)]
pub struct EvaluationCriterion {
    pub kind: CriterionType,
    pub remaining_attempts: u32,
}

impl EvaluationCriterion {
    pub fn new(kind: CriterionType, remaining_attempts: u32) -> Self {
        Self {
            kind,
            remaining_attempts,
        }
    }

    /// Decrement attempts; returns `true` if the criterion should be dropped.
    pub fn consume_attempt(&mut self) -> bool {
        self.remaining_attempts = self.remaining_attempts.saturating_sub(1);
        self.remaining_attempts == 0
    }
}

/// Per-question evaluation criteria, keyed by question text.
pub type CriteriaByQuestion = HashMap<Question, Vec<EvaluationCriterion>>;

/// Which actions the scheduler may pick at the next step. §9: "a small
/// record passed through the loop rather than mutable globals."
#[derive(Debug, Clone, Copy)]
pub struct AllowedActions {
    pub answer: bool,
    pub search: bool,
    pub visit: bool,
    pub reflect: bool,
    pub coding: bool,
}

impl Default for AllowedActions {
    fn default() -> Self {
        Self {
            answer: true,
            search: true,
            visit: true,
            reflect: true,
            coding: true,
        }
    }
}

/// The closed sum type the LLM picks one variant of on every step (§3, §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum StepAction {
    Search {
        queries: Vec<String>,
        think: String,
    },
    Visit {
        /// 1-based indices into the per-step URL list shown in the prompt.
        url_indices: Vec<u32>,
        think: String,
    },
    Reflect {
        sub_questions: Vec<String>,
        think: String,
    },
    Answer {
        text: String,
        #[serde(default)]
        references: Vec<Reference>,
        is_final: bool,
        md_answer: Option<String>,
        think: String,
    },
    Coding {
        issue: String,
        think: String,
    },
}

impl StepAction {
    pub fn think(&self) -> &str {
        match self {
            StepAction::Search { think, .. }
            | StepAction::Visit { think, .. }
            | StepAction::Reflect { think, .. }
            | StepAction::Answer { think, .. }
            | StepAction::Coding { think, .. } => think,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StepAction::Search { .. } => "search",
            StepAction::Visit { .. } => "visit",
            StepAction::Reflect { .. } => "reflect",
            StepAction::Answer { .. } => "answer",
            StepAction::Coding { .. } => "coding",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn criterion_drops_at_zero_attempts() {
        let mut c = EvaluationCriterion::new(CriterionType::Strict, 1);
        assert!(c.consume_attempt());
        assert_eq!(c.remaining_attempts, 0);
    }

    #[test]
    fn criterion_survives_multiple_attempts() {
        let mut c = EvaluationCriterion::new(CriterionType::Strict, 2);
        assert!(!c.consume_attempt());
        assert!(c.consume_attempt());
    }

    #[test]
    fn step_action_tags_round_trip() {
        let action = StepAction::Search {
            queries: vec!["rust async".into()],
            think: "let's search".into(),
        };
        let json = serde_json::to_string(&action).unwrap();
        assert!(json.contains("\"action\":\"search\""));
        let back: StepAction = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name(), "search");
    }
}

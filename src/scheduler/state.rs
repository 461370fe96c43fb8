//! Per-request scheduler state (§3 `SchedulerState`). Created fresh for
//! every incoming request and dropped once the response is fully written —
//! nothing here outlives a single HTTP call.

use crate::config::{BudgetProfile, HostListsConfig};
use crate::knowledge::KnowledgeBase;
use crate::trackers::TokenTracker;
use crate::types::{AllowedActions, CriteriaByQuestion, Question};
use crate::url_store::UrlStore;
use std::collections::HashSet;

pub struct SchedulerState {
    pub gaps: Vec<Question>,
    pub all_questions: HashSet<Question>,
    pub all_keywords: HashSet<String>,
    pub knowledge: KnowledgeBase,
    pub url_store: UrlStore,
    pub visited_urls: HashSet<String>,
    pub bad_urls: HashSet<String>,
    pub diary: Vec<String>,
    pub evaluation_criteria: CriteriaByQuestion,
    pub final_answer_improvements: Vec<String>,
    pub allowed: AllowedActions,
    pub step: u32,
    pub total_step: u32,
    pub token_tracker: TokenTracker,
    pub budget: BudgetProfile,
    pub hosts: HostListsConfig,
    pub boost_hostnames: HashSet<String>,
    pub bad_hostnames: HashSet<String>,
    pub only_hostnames: HashSet<String>,
    pub max_returned_urls: usize,
    pub no_direct_answer: bool,
}

impl SchedulerState {
    pub fn new(
        original_question: Question,
        budget: BudgetProfile,
        hosts: HostListsConfig,
        boost_hostnames: HashSet<String>,
        bad_hostnames: HashSet<String>,
        only_hostnames: HashSet<String>,
        max_returned_urls: usize,
        no_direct_answer: bool,
    ) -> Self {
        let mut all_questions = HashSet::new();
        all_questions.insert(original_question.clone());

        Self {
            gaps: vec![original_question],
            all_questions,
            all_keywords: HashSet::new(),
            knowledge: KnowledgeBase::new(),
            url_store: UrlStore::new(),
            visited_urls: HashSet::new(),
            bad_urls: HashSet::new(),
            diary: Vec::new(),
            evaluation_criteria: CriteriaByQuestion::new(),
            final_answer_improvements: Vec::new(),
            allowed: AllowedActions::default(),
            step: 0,
            total_step: 0,
            token_tracker: TokenTracker::new(),
            budget,
            hosts,
            boost_hostnames,
            bad_hostnames,
            only_hostnames,
            max_returned_urls,
            no_direct_answer,
        }
    }

    /// Round-robin question selection (§4.1 step 1).
    pub fn current_question(&self) -> Question {
        let index = (self.total_step as usize) % self.gaps.len().max(1);
        self.gaps
            .get(index)
            .cloned()
            .unwrap_or_else(|| self.gaps[0].clone())
    }

    pub fn original_question(&self) -> &Question {
        &self.gaps[0]
    }

    pub fn is_original_question(&self, question: &str) -> bool {
        self.gaps.first().map(|q| q == question).unwrap_or(false)
    }

    /// Config-level default boost hosts plus this request's own
    /// `boost_hostnames` (§4.1 step 4: "apply boost-listed hosts").
    pub fn merged_boost_hostnames(&self) -> HashSet<String> {
        self.hosts
            .default_boost
            .iter()
            .cloned()
            .chain(self.boost_hostnames.iter().cloned())
            .collect()
    }

    /// Config-level default bad hosts plus this request's own
    /// `bad_hostnames` (§4.1 step 4: "filter out... deny-listed hosts").
    pub fn merged_bad_hostnames(&self) -> HashSet<String> {
        self.hosts
            .default_bad
            .iter()
            .cloned()
            .chain(self.bad_hostnames.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HostListsConfig;

    fn budget() -> BudgetProfile {
        BudgetProfile {
            token_budget: 100_000,
            max_bad_attempts: 1,
        }
    }

    #[test]
    fn current_question_round_robins_over_gaps() {
        let mut state = SchedulerState::new(
            "original".into(),
            budget(),
            HostListsConfig::default(),
            HashSet::new(),
            HashSet::new(),
            HashSet::new(),
            100,
            false,
        );
        state.gaps.push("sub".into());

        state.total_step = 0;
        assert_eq!(state.current_question(), "original");
        state.total_step = 1;
        assert_eq!(state.current_question(), "sub");
        state.total_step = 2;
        assert_eq!(state.current_question(), "original");
    }

    #[test]
    fn merged_hostnames_combine_config_defaults_and_request_lists() {
        let mut boost = HashSet::new();
        boost.insert("example.com".to_string());
        let mut bad = HashSet::new();
        bad.insert("spam.com".to_string());

        let state = SchedulerState::new(
            "original".into(),
            budget(),
            HostListsConfig {
                default_boost: vec!["trusted.com".to_string()],
                default_bad: vec!["blocked.com".to_string()],
            },
            boost,
            bad,
            HashSet::new(),
            100,
            false,
        );

        let merged_boost = state.merged_boost_hostnames();
        assert!(merged_boost.contains("trusted.com"));
        assert!(merged_boost.contains("example.com"));

        let merged_bad = state.merged_bad_hostnames();
        assert!(merged_bad.contains("blocked.com"));
        assert!(merged_bad.contains("spam.com"));
    }

    #[test]
    fn original_question_is_always_gaps_index_zero() {
        let state = SchedulerState::new(
            "original".into(),
            budget(),
            HostListsConfig::default(),
            HashSet::new(),
            HashSet::new(),
            HashSet::new(),
            100,
            false,
        );
        assert!(state.is_original_question("original"));
        assert!(!state.is_original_question("other"));
    }
}

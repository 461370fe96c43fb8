//! Search dispatch (§4.1.2): two search passes — a direct pass over the
//! LLM's queries, then a query-rewriter pass over refined queries — with
//! results merged into the URL store and summarized into knowledge.

use super::{Collaborators, MAX_QUERIES_PER_STEP};
use crate::error::SchedulerResult;
use crate::llm::ChatMessage;
use crate::scheduler::state::SchedulerState;
use crate::stream::StreamChannel;
use crate::types::KnowledgeItem;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct RewrittenQueries {
    queries: Vec<String>,
}

pub async fn dispatch(
    state: &mut SchedulerState,
    collaborators: &Collaborators,
    stream: &StreamChannel,
    queries: Vec<String>,
) -> SchedulerResult<()> {
    let first_pass = dedupe_and_cap(&state.all_keywords, queries);
    let mut total_hits = 0usize;

    for query in &first_pass {
        total_hits += run_one_query(state, collaborators, query).await;
    }

    let rewritten = rewrite_queries(state, collaborators, &first_pass).await;
    let second_pass = dedupe_and_cap(&state.all_keywords, rewritten);

    for query in &second_pass {
        total_hits += run_one_query(state, collaborators, query).await;
    }

    if total_hits == 0 {
        let narrative = "Search produced no new results; need to think harder about query phrasing.";
        state.diary.push(narrative.to_string());
        stream.push_think(narrative);
    }

    state.allowed.search = false;
    Ok(())
}

fn dedupe_and_cap(history: &std::collections::HashSet<String>, queries: Vec<String>) -> Vec<String> {
    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();
    queries
        .into_iter()
        .filter(|q| !history.contains(q) && seen.insert(q.clone()))
        .take(MAX_QUERIES_PER_STEP)
        .collect()
}

async fn run_one_query(
    state: &mut SchedulerState,
    collaborators: &Collaborators,
    query: &str,
) -> usize {
    state.all_keywords.insert(query.to_string());

    let query_with_site_filter = if state.only_hostnames.is_empty() {
        query.to_string()
    } else {
        let sites: Vec<String> = state
            .only_hostnames
            .iter()
            .map(|host| format!("site:{host}"))
            .collect();
        format!("{query} {}", sites.join(" OR "))
    };

    match collaborators.search.search(&query_with_site_filter).await {
        Ok(hits) => {
            debug!(query, hits = hits.len(), "search returned results");
            let mut snippets = Vec::new();
            for hit in &hits {
                state.url_store.add(&hit.url, &hit.title, &hit.description);
                snippets.push(format!("{} — {}", hit.title, hit.description));
            }
            if !hits.is_empty() {
                state.knowledge.push(KnowledgeItem::side_info(
                    format!("What do sources say about {query}?"),
                    snippets.join("\n"),
                ));
            }
            hits.len()
        }
        Err(error) => {
            warn!(query, %error, "search provider failed");
            0
        }
    }
}

async fn rewrite_queries(
    state: &SchedulerState,
    collaborators: &Collaborators,
    first_pass_results: &[String],
) -> Vec<String> {
    if first_pass_results.is_empty() {
        return Vec::new();
    }

    let schema = json!({
        "type": "object",
        "properties": {
            "queries": { "type": "array", "items": { "type": "string" } }
        },
        "required": ["queries"],
    });

    let prompt = format!(
        "Given these already-tried search queries for the question \"{}\", propose refined \
         queries that would surface different, higher-quality sources: {}",
        state.current_question(),
        first_pass_results.join(", ")
    );

    let result = collaborators
        .llm
        .generate_object(&schema, "Propose refined search queries.", &[ChatMessage::user(prompt)])
        .await;

    match result {
        Ok(generated) => serde_json::from_value::<RewrittenQueries>(generated.value)
            .map(|r| r.queries)
            .unwrap_or_default(),
        Err(error) => {
            warn!(%error, "query rewriter failed");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedupe_and_cap_drops_history_and_duplicates() {
        let mut history = std::collections::HashSet::new();
        history.insert("old".to_string());
        let queries = vec!["old".into(), "new".into(), "new".into()];
        let result = dedupe_and_cap(&history, queries);
        assert_eq!(result, vec!["new".to_string()]);
    }

    #[test]
    fn dedupe_and_cap_respects_max_queries_per_step() {
        let history = std::collections::HashSet::new();
        let queries: Vec<String> = (0..10).map(|i| format!("q{i}")).collect();
        let result = dedupe_and_cap(&history, queries);
        assert_eq!(result.len(), MAX_QUERIES_PER_STEP);
    }
}

//! URL knowledge store (§4.2): dedup by normalized URL, frequency-weighted
//! merge, host-policy filtering, and ranked retrieval with a diversity cap.

pub mod normalize;
pub mod rank;

use crate::types::{BoostedUrl, UrlRecord};
use normalize::normalize_url;
use rank::RankContext;
use std::collections::{HashMap, HashSet};

/// Every URL the agent has discovered, keyed by normalized form. Visited
/// URLs stay in the map (so re-discovery doesn't re-queue them) but are
/// tracked separately so ranking can exclude them.
#[derive(Debug, Default)]
pub struct UrlStore {
    records: HashMap<String, UrlRecord>,
    visited: HashSet<String>,
}

impl UrlStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest a discovered URL with optional title/description/date. Unparseable
    /// URLs are silently dropped (§4.2). Re-ingesting an existing URL bumps its
    /// `occurrences` and keeps whichever title/description is longer (§4.2 merge
    /// policy), rather than overwriting a richer earlier sighting with a terser one.
    pub fn add(&mut self, raw_url: &str, title: &str, description: &str) {
        let Some(normalized) = normalize_url(raw_url) else {
            return;
        };

        self.records
            .entry(normalized.clone())
            .and_modify(|record| {
                record.occurrences += 1;
                if title.len() > record.title.len() {
                    record.title = title.to_string();
                }
                if description.len() > record.description.len() {
                    record.description = description.to_string();
                }
            })
            .or_insert_with(|| {
                let mut record = UrlRecord::new(normalized);
                record.title = title.to_string();
                record.description = description.to_string();
                record
            });
    }

    /// Ingest many URLs at once (a search result page, a page's outlinks).
    pub fn merge<'a>(&mut self, urls: impl IntoIterator<Item = (&'a str, &'a str, &'a str)>) {
        for (url, title, description) in urls {
            self.add(url, title, description);
        }
    }

    pub fn mark_visited(&mut self, raw_url: &str) {
        if let Some(normalized) = normalize_url(raw_url) {
            self.visited.insert(normalized);
        }
    }

    pub fn is_visited(&self, raw_url: &str) -> bool {
        normalize_url(raw_url)
            .map(|normalized| self.visited.contains(&normalized))
            .unwrap_or(false)
    }

    pub fn get(&self, raw_url: &str) -> Option<&UrlRecord> {
        let normalized = normalize_url(raw_url)?;
        self.records.get(&normalized)
    }

    pub fn set_date(&mut self, raw_url: &str, date: chrono::DateTime<chrono::Utc>) {
        if let Some(normalized) = normalize_url(raw_url) {
            if let Some(record) = self.records.get_mut(&normalized) {
                record.date = Some(date);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// URLs that survive the §4.2 filter pipeline (visited, bad-listed,
    /// only-list), in store order. Used to obtain the candidate set a
    /// `Reranker` call scores *before* `ranked` applies those scores, since
    /// reranking needs the URL list up front rather than after scoring.
    pub fn candidate_urls(
        &self,
        bad_hostnames: &HashSet<String>,
        only_hostnames: &HashSet<String>,
    ) -> Vec<String> {
        let ctx = RankContext {
            boost_hostnames: &HashSet::new(),
            bad_hostnames,
            only_hostnames,
            rerank_scores: &HashMap::new(),
        };
        rank::filter(self.records.values(), &self.visited, &ctx)
            .into_iter()
            .map(|record| record.url.clone())
            .collect()
    }

    /// Filter, rank and diversity-cap the store, returning the top `limit`
    /// candidates. `boost_hostnames`/`bad_hostnames` are the caller's
    /// already-merged config-default-plus-request-level host lists (§4.1
    /// step 4). `rerank_scores` is empty when no `Reranker` is configured
    /// (§4.5 `NullReranker`) or none was fetched, in which case
    /// `rerank_boost` contributes zero.
    pub fn ranked(
        &self,
        boost_hostnames: &HashSet<String>,
        bad_hostnames: &HashSet<String>,
        only_hostnames: &HashSet<String>,
        rerank_scores: &HashMap<String, f64>,
        limit: usize,
    ) -> Vec<BoostedUrl> {
        let ctx = RankContext {
            boost_hostnames,
            bad_hostnames,
            only_hostnames,
            rerank_scores,
        };
        let filtered = rank::filter(self.records.values(), &self.visited, &ctx);
        let ranked = rank::rank(&filtered, &ctx);
        let capped = rank::diversity_cap(ranked);
        capped.into_iter().take(limit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_dedupes_by_normalized_url_and_bumps_occurrences() {
        let mut store = UrlStore::new();
        store.add("https://Example.com/a/", "Title", "Desc");
        store.add("https://example.com/a", "A much longer title", "Other desc");

        assert_eq!(store.len(), 1);
        let record = store.get("https://example.com/a").unwrap();
        assert_eq!(record.occurrences, 2);
        assert_eq!(record.title, "A much longer title");
    }

    #[test]
    fn invalid_urls_are_not_stored() {
        let mut store = UrlStore::new();
        store.add("not a url", "t", "d");
        assert!(store.is_empty());
    }

    #[test]
    fn visited_urls_are_excluded_from_ranked_results() {
        let mut store = UrlStore::new();
        store.add("https://example.com/a", "t", "d");
        store.add("https://example.com/b", "t", "d");
        store.mark_visited("https://example.com/a");

        let ranked = store.ranked(&HashSet::new(), &HashSet::new(), &HashSet::new(), &HashMap::new(), 20);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].record.url, "https://example.com/b");
    }

    #[test]
    fn ranked_limit_is_respected() {
        let mut store = UrlStore::new();
        for i in 0..5 {
            store.add(&format!("https://example{i}.com/a"), "t", "d");
        }
        let ranked = store.ranked(&HashSet::new(), &HashSet::new(), &HashSet::new(), &HashMap::new(), 3);
        assert_eq!(ranked.len(), 3);
    }

    #[test]
    fn request_level_boost_hostname_outranks_equal_frequency() {
        let mut store = UrlStore::new();
        store.add("https://example.com/a", "t", "d");
        store.add("https://other.com/a", "t", "d");

        let mut boost = HashSet::new();
        boost.insert("example.com".to_string());
        let ranked = store.ranked(&boost, &HashSet::new(), &HashSet::new(), &HashMap::new(), 20);
        assert_eq!(ranked[0].record.url, "https://example.com/a");
    }

    #[test]
    fn candidate_urls_excludes_visited_and_bad_hosts() {
        let mut store = UrlStore::new();
        store.add("https://example.com/a", "t", "d");
        store.add("https://example.com/b", "t", "d");
        store.add("https://bad.com/a", "t", "d");
        store.mark_visited("https://example.com/a");

        let mut bad = HashSet::new();
        bad.insert("bad.com".to_string());
        let candidates = store.candidate_urls(&bad, &HashSet::new());
        assert_eq!(candidates, vec!["https://example.com/b".to_string()]);
    }
}

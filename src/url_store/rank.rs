//! Ranking and diversity-cap (§4.2). Kept as pure functions over
//! `UrlRecord`s so the reranker's async call can happen once, upstream,
//! and the scores threaded in here — the ranking math itself never awaits.

use crate::types::{BoostedUrl, UrlRecord};
use crate::url_store::normalize::hostname_of;
use std::collections::{HashMap, HashSet};

const HOSTNAME_BOOST_ALPHA: f64 = 1.0;
const HOSTNAME_BAD_BETA: f64 = 5.0;
const PATH_BOOST_PER_SEGMENT: f64 = 0.1;
const PATH_BOOST_MAX: f64 = 0.3;
const MAX_PER_HOSTNAME: usize = 2;

/// Inputs that vary per ranking call: the active host policy and any
/// rerank scores the caller already fetched (keyed by normalized URL).
pub struct RankContext<'a> {
    pub boost_hostnames: &'a HashSet<String>,
    pub bad_hostnames: &'a HashSet<String>,
    pub only_hostnames: &'a HashSet<String>,
    pub rerank_scores: &'a HashMap<String, f64>,
}

/// §4.2 filter pipeline: exclude visited, exclude bad-listed hosts,
/// restrict to only-listed hosts when that list is non-empty.
pub fn filter<'a>(
    records: impl IntoIterator<Item = &'a UrlRecord>,
    visited: &HashSet<String>,
    ctx: &RankContext,
) -> Vec<&'a UrlRecord> {
    records
        .into_iter()
        .filter(|r| !visited.contains(&r.url))
        .filter(|r| {
            let host = hostname_of(&r.url).unwrap_or_default();
            if ctx.bad_hostnames.contains(&host) {
                return false;
            }
            if !ctx.only_hostnames.is_empty() && !ctx.only_hostnames.contains(&host) {
                return false;
            }
            true
        })
        .collect()
}

fn path_boost(url: &str) -> f64 {
    let path = url::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_default();
    let segments = path.split('/').filter(|s| !s.is_empty()).count();
    (PATH_BOOST_MAX - segments as f64 * PATH_BOOST_PER_SEGMENT).max(0.0)
}

/// Score every record and sort descending by `final_score`.
pub fn rank(records: &[&UrlRecord], ctx: &RankContext) -> Vec<BoostedUrl> {
    let mut boosted: Vec<BoostedUrl> = records
        .iter()
        .map(|record| {
            let host = hostname_of(&record.url).unwrap_or_default();
            let freq_boost = (1.0 + record.occurrences as f64).ln();
            let hostname_boost = if ctx.boost_hostnames.contains(&host) {
                HOSTNAME_BOOST_ALPHA
            } else if ctx.bad_hostnames.contains(&host) {
                -HOSTNAME_BAD_BETA
            } else {
                0.0
            };
            let path_boost = path_boost(&record.url);
            let rerank_boost = ctx.rerank_scores.get(&record.url).copied().unwrap_or(0.0);

            BoostedUrl {
                record: (*record).clone(),
                freq_boost,
                hostname_boost,
                path_boost,
                rerank_boost,
                final_score: freq_boost + hostname_boost + path_boost + rerank_boost,
            }
        })
        .collect();

    boosted.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    boosted
}

/// Keep at most `MAX_PER_HOSTNAME` URLs per hostname, preserving the
/// incoming (already score-sorted) order.
pub fn diversity_cap(ranked: Vec<BoostedUrl>) -> Vec<BoostedUrl> {
    let mut per_host: HashMap<String, usize> = HashMap::new();
    ranked
        .into_iter()
        .filter(|boosted| {
            let host = hostname_of(&boosted.record.url).unwrap_or_default();
            let count = per_host.entry(host).or_insert(0);
            *count += 1;
            *count <= MAX_PER_HOSTNAME
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: &str, occurrences: u32) -> UrlRecord {
        UrlRecord {
            url: url.to_string(),
            title: String::new(),
            description: String::new(),
            date: None,
            weight: 1.0,
            occurrences,
        }
    }

    #[test]
    fn boost_hostname_outranks_equal_frequency() {
        let a = record("https://example.com/a", 1);
        let b = record("https://other.com/a", 1);
        let mut boost = HashSet::new();
        boost.insert("example.com".to_string());
        let ctx = RankContext {
            boost_hostnames: &boost,
            bad_hostnames: &HashSet::new(),
            only_hostnames: &HashSet::new(),
            rerank_scores: &HashMap::new(),
        };
        let ranked = rank(&[&a, &b], &ctx);
        assert_eq!(ranked[0].record.url, "https://example.com/a");
    }

    #[test]
    fn bad_hostname_never_increases_ranked_set_after_filter() {
        let a = record("https://good.com/a", 1);
        let b = record("https://bad.com/a", 1);
        let visited = HashSet::new();

        let without_bad = {
            let ctx = RankContext {
                boost_hostnames: &HashSet::new(),
                bad_hostnames: &HashSet::new(),
                only_hostnames: &HashSet::new(),
                rerank_scores: &HashMap::new(),
            };
            filter([&a, &b], &visited, &ctx).len()
        };

        let mut bad = HashSet::new();
        bad.insert("bad.com".to_string());
        let with_bad = {
            let ctx = RankContext {
                boost_hostnames: &HashSet::new(),
                bad_hostnames: &bad,
                only_hostnames: &HashSet::new(),
                rerank_scores: &HashMap::new(),
            };
            filter([&a, &b], &visited, &ctx).len()
        };

        assert!(with_bad <= without_bad);
    }

    #[test]
    fn diversity_cap_keeps_at_most_two_per_hostname() {
        let records = vec![
            record("https://example.com/a", 1),
            record("https://example.com/b", 1),
            record("https://example.com/c", 1),
            record("https://other.com/a", 1),
        ];
        let refs: Vec<&UrlRecord> = records.iter().collect();
        let ctx = RankContext {
            boost_hostnames: &HashSet::new(),
            bad_hostnames: &HashSet::new(),
            only_hostnames: &HashSet::new(),
            rerank_scores: &HashMap::new(),
        };
        let ranked = rank(&refs, &ctx);
        let capped = diversity_cap(ranked);
        let example_count = capped
            .iter()
            .filter(|b| b.record.url.contains("example.com"))
            .count();
        assert_eq!(example_count, 2);
    }

    #[test]
    fn only_hostnames_restricts_to_allow_list() {
        let a = record("https://example.com/a", 1);
        let b = record("https://other.com/a", 1);
        let mut only = HashSet::new();
        only.insert("example.com".to_string());
        let ctx = RankContext {
            boost_hostnames: &HashSet::new(),
            bad_hostnames: &HashSet::new(),
            only_hostnames: &only,
            rerank_scores: &HashMap::new(),
        };
        let filtered = filter([&a, &b], &HashSet::new(), &ctx);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].url, "https://example.com/a");
    }
}

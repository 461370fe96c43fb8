//! Visit dispatch (§4.1.3): resolve 1-based indices against the per-step
//! URL listing, fetch each target concurrently, and record what was read.

use super::{Collaborators, MAX_URLS_PER_STEP};
use crate::error::SchedulerResult;
use crate::scheduler::state::SchedulerState;
use crate::stream::StreamChannel;
use crate::types::{KnowledgeItem, Reference};
use tracing::warn;

pub async fn dispatch(
    state: &mut SchedulerState,
    collaborators: &Collaborators,
    stream: &StreamChannel,
    url_indices: Vec<u32>,
    per_step_urls: &[String],
) -> SchedulerResult<()> {
    let mut targets: Vec<String> = url_indices
        .into_iter()
        .filter_map(|index| per_step_urls.get(index.saturating_sub(1) as usize).cloned())
        .filter(|url| !state.visited_urls.contains(url))
        .collect();
    targets.dedup();
    targets.truncate(MAX_URLS_PER_STEP);

    for url in &targets {
        stream.push_url(url.clone());
    }

    let fetches = targets.into_iter().map(|url| {
        let fetch = collaborators.fetch.clone();
        async move {
            let result = fetch.fetch(&url).await;
            (url, result)
        }
    });

    let results: Vec<_> = futures::future::join_all(fetches).await;

    let mut read_count = 0usize;
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
                read_count += 1;
            }
            Err(error) => {
                warn!(url, %error, "failed to fetch visited URL");
                state.bad_urls.insert(url);
            }
        }
    }

    let narrative = format!("Visited and read {read_count} page(s).");
    state.diary.push(narrative.clone());
    stream.push_think(narrative);

    state.allowed.visit = false;
    Ok(())
}

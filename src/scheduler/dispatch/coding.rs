//! Coding dispatch (§4.1.5): hand the issue to the code-sandbox collaborator.

use super::Collaborators;
use crate::error::SchedulerResult;
use crate::scheduler::state::SchedulerState;
use crate::stream::StreamChannel;
use crate::types::KnowledgeItem;
use tracing::warn;

pub async fn dispatch(
    state: &mut SchedulerState,
    collaborators: &Collaborators,
    stream: &StreamChannel,
    issue: String,
) -> SchedulerResult<()> {
    let boost_hostnames = state.merged_boost_hostnames();
    let bad_hostnames = state.merged_bad_hostnames();
    let candidates = state
        .url_store
        .candidate_urls(&bad_hostnames, &state.only_hostnames);
    let rerank_scores = collaborators
        .rerank
        .rerank(&issue, &candidates)
        .await
        .unwrap_or_default();
    let context: String = state
        .url_store
        .ranked(&boost_hostnames, &bad_hostnames, &state.only_hostnames, &rerank_scores, 20)
        .into_iter()
        .map(|boosted| format!("{}: {}", boosted.record.url, boosted.record.description))
        .collect::<Vec<_>>()
        .join("\n");

    match collaborators.sandbox.solve(&issue, &context).await {
        Ok(solution) => {
            state.knowledge.push(KnowledgeItem::coding(
                format!("solution to {issue}?"),
                solution.output,
                solution.source_code,
            ));
            let narrative = format!("Ran code to address: {issue}");
            state.diary.push(narrative.clone());
            stream.push_think(narrative);
        }
        Err(error) => {
            warn!(issue, %error, "code sandbox failed");
            let narrative = format!("Code sandbox unavailable for: {issue}");
            state.diary.push(narrative.clone());
            stream.push_think(narrative);
        }
    }

    state.allowed.coding = false;
    Ok(())
}

use crate::config::ProviderEndpoint;
use crate::error::CollaboratorError;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

/// Produces a `rerank_boost` per URL for `url_store::rank` (§4.2). The
/// default is `NullReranker`, which contributes nothing — ranking then
/// falls back entirely to frequency/hostname/path boosts.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(
        &self,
        question: &str,
        urls: &[String],
    ) -> Result<HashMap<String, f64>, CollaboratorError>;
}

pub struct NullReranker;

#[async_trait]
impl Reranker for NullReranker {
    async fn rerank(
        &self,
        _question: &str,
        _urls: &[String],
    ) -> Result<HashMap<String, f64>, CollaboratorError> {
        Ok(HashMap::new())
    }
}

/// A Cohere-shaped rerank endpoint: POST `{query, documents}`, receive back
/// `results[]` of `{index, relevance_score}`.
pub struct HttpReranker {
    http: reqwest::Client,
    endpoint: ProviderEndpoint,
    api_key: Option<String>,
}

impl HttpReranker {
    pub fn new(endpoint: ProviderEndpoint, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            api_key,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    #[serde(default)]
    results: Vec<RerankResult>,
}

#[derive(Debug, Deserialize)]
struct RerankResult {
    index: usize,
    relevance_score: f64,
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn rerank(
        &self,
        question: &str,
        urls: &[String],
    ) -> Result<HashMap<String, f64>, CollaboratorError> {
        if urls.is_empty() {
            return Ok(HashMap::new());
        }

        let mut request = self
            .http
            .post(&self.endpoint.base_url)
            .timeout(std::time::Duration::from_secs(self.endpoint.timeout_secs))
            .json(&serde_json::json!({
                "model": self.endpoint.model,
                "query": question,
                "documents": urls,
            }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CollaboratorError::Rerank(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CollaboratorError::Rerank(format!(
                "rerank endpoint returned {}",
                response.status()
            )));
        }

        let parsed: RerankResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::Rerank(e.to_string()))?;

        Ok(parsed
            .results
            .into_iter()
            .filter_map(|r| urls.get(r.index).map(|url| (url.clone(), r.relevance_score)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_reranker_returns_empty_map() {
        let reranker = NullReranker;
        let scores = reranker
            .rerank("q", &["https://a.com".to_string()])
            .await
            .unwrap();
        assert!(scores.is_empty());
    }
}

use crate::config::ProviderEndpoint;
use crate::error::CollaboratorError;
use async_trait::async_trait;
use serde::Deserialize;

/// One organic result from a `SearchProvider::search` call.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub description: String,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, CollaboratorError>;
}

/// Brave-Search-shaped default. The wire shape is narrow enough (`web.results[]`
/// with `url`/`title`/`description`) to cover most search APIs behind the same
/// provider config; a different backend only needs a different `ProviderEndpoint`.
pub struct HttpSearchProvider {
    http: reqwest::Client,
    endpoint: ProviderEndpoint,
    api_key: Option<String>,
}

impl HttpSearchProvider {
    pub fn new(endpoint: ProviderEndpoint, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            api_key,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BraveSearchResponse {
    web: Option<BraveWebResults>,
}

#[derive(Debug, Deserialize)]
struct BraveWebResults {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    url: String,
    title: String,
    #[serde(default)]
    description: String,
}

#[async_trait]
impl SearchProvider for HttpSearchProvider {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, CollaboratorError> {
        let mut request = self
            .http
            .get(&self.endpoint.base_url)
            .query(&[("q", query)])
            .timeout(std::time::Duration::from_secs(self.endpoint.timeout_secs));
        if let Some(key) = &self.api_key {
            request = request.header("X-Subscription-Token", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CollaboratorError::Search(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CollaboratorError::Search(format!(
                "search endpoint returned {}",
                response.status()
            )));
        }

        let parsed: BraveSearchResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::Search(e.to_string()))?;

        Ok(parsed
            .web
            .map(|web| web.results)
            .unwrap_or_default()
            .into_iter()
            .map(|r| SearchHit {
                url: r.url,
                title: r.title,
                description: r.description,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brave_response_with_no_web_field_yields_no_hits() {
        let parsed: BraveSearchResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.web.is_none());
    }

    #[test]
    fn brave_response_deserializes_results() {
        let json = r#"{"web":{"results":[{"url":"https://a.com","title":"A","description":"d"}]}}"#;
        let parsed: BraveSearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.web.unwrap().results[0].url, "https://a.com");
    }
}

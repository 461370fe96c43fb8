use crate::error::CollaboratorError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A fetched page reduced to plain text, ready for knowledge extraction.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub final_url: String,
    pub title: String,
    pub content: String,
}

#[async_trait]
pub trait FetchClient: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, CollaboratorError>;

    /// Best-effort `Last-Modified`/`Date` probe used by the reference
    /// freshness check (§4.1.3) — a cheap `HEAD` that never blocks a visit
    /// on its result.
    async fn probe_last_modified(&self, url: &str) -> Option<DateTime<Utc>>;
}

/// Plain `reqwest` GET plus `html2md` text extraction — no JS execution,
/// matching the spec's "fetch a page's content" scope rather than a full
/// browser.
pub struct HttpFetchClient {
    http: reqwest::Client,
    timeout_secs: u64,
}

impl HttpFetchClient {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            http: reqwest::Client::new(),
            timeout_secs,
        }
    }

    fn extract_title(html: &str) -> String {
        let lower = html.to_ascii_lowercase();
        let start = lower.find("<title>").map(|i| i + "<title>".len());
        let end = lower.find("</title>");
        match (start, end) {
            (Some(s), Some(e)) if e > s => html[s..e].trim().to_string(),
            _ => String::new(),
        }
    }
}

#[async_trait]
impl FetchClient for HttpFetchClient {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, CollaboratorError> {
        let response = self
            .http
            .get(url)
            .timeout(std::time::Duration::from_secs(self.timeout_secs))
            .send()
            .await
            .map_err(|e| CollaboratorError::Fetch {
                url: url.to_string(),
                source: e.to_string(),
            })?;

        let final_url = response.url().to_string();
        let html = response.text().await.map_err(|e| CollaboratorError::Fetch {
            url: url.to_string(),
            source: e.to_string(),
        })?;

        let title = Self::extract_title(&html);
        let content = html2md::parse_html(&html);

        Ok(FetchedPage {
            final_url,
            title,
            content,
        })
    }

    async fn probe_last_modified(&self, url: &str) -> Option<DateTime<Utc>> {
        let response = self
            .http
            .head(url)
            .timeout(std::time::Duration::from_secs(self.timeout_secs))
            .send()
            .await
            .ok()?;

        let header = response
            .headers()
            .get(reqwest::header::LAST_MODIFIED)
            .or_else(|| response.headers().get(reqwest::header::DATE))?;
        let text = header.to_str().ok()?;
        DateTime::parse_from_rfc2822(text)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_title_finds_title_tag() {
        let html = "<html><head><title> Example Page </title></head><body></body></html>";
        assert_eq!(HttpFetchClient::extract_title(html), "Example Page");
    }

    #[test]
    fn extract_title_is_empty_without_a_title_tag() {
        let html = "<html><body>no title here</body></html>";
        assert_eq!(HttpFetchClient::extract_title(html), "");
    }
}

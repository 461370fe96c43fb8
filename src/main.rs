//! `deepresearch-server`: binds the `/v1/chat/completions` surface over
//! HTTP, wiring the default reqwest-backed collaborators behind the
//! `LlmClient`/`SearchProvider`/`FetchClient`/`Reranker`/`CodeSandbox`
//! traits the scheduler programs against (§4.5, §4.6).

use anyhow::{Context, Result};
use deepresearch_core::collaborators::{
    HttpFetchClient, HttpReranker, HttpSearchProvider, NullReranker, UnavailableSandbox,
};
use deepresearch_core::config::{self, Config};
use deepresearch_core::llm::openai_compatible::OpenAiCompatibleLlm;
use deepresearch_core::scheduler::dispatch::Collaborators;
use deepresearch_core::{router, AppState};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::load_yaml_config().context("loading config.yaml")?;
    let collaborators = build_collaborators(&config);
    let bind_addr = config.server.bind_addr.clone();

    let state = AppState::new(config, collaborators);
    let app = router(state);

    tracing::info!(%bind_addr, "deepresearch-server listening");
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    axum::serve(listener, app)
        .await
        .context("serving chat-completions HTTP surface")?;

    Ok(())
}

fn build_collaborators(config: &Config) -> Collaborators {
    let llm_key = Config::resolve_api_key(&config.providers.llm);
    let search_key = Config::resolve_api_key(&config.providers.search);

    let llm = Arc::new(OpenAiCompatibleLlm::new(
        config.providers.llm.base_url.clone(),
        llm_key,
        config.providers.llm.model.clone(),
        config.providers.llm.timeout_secs,
    ));

    let search = Arc::new(HttpSearchProvider::new(
        config.providers.search.clone(),
        search_key,
    ));

    let fetch = Arc::new(HttpFetchClient::new(config.providers.fetch_timeout_secs));

    let rerank: Arc<dyn deepresearch_core::collaborators::Reranker> = match &config.providers.rerank {
        Some(endpoint) => {
            let key = Config::resolve_api_key(endpoint);
            Arc::new(HttpReranker::new(endpoint.clone(), key))
        }
        None => Arc::new(NullReranker),
    };

    let sandbox = Arc::new(UnavailableSandbox);

    Collaborators {
        llm,
        search,
        fetch,
        rerank,
        sandbox,
    }
}

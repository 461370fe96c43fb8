//! Layered configuration: compiled-in defaults → `config.yaml` → environment
//! variables. Mirrors the teacher crate's `Config`/`load_yaml_config` pair,
//! extended with the provider/budget/host sections §4.7 calls for.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub budgets: Budgets,
    #[serde(default = "default_step_sleep_ms")]
    pub step_sleep_ms: u64,
    #[serde(default)]
    pub hosts: HostListsConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default)]
    pub cors_allow_any: bool,
}

/// The §6 reasoning-effort → budget mapping table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BudgetProfile {
    pub token_budget: u64,
    pub max_bad_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budgets {
    pub low: BudgetProfile,
    pub medium: BudgetProfile,
    pub high: BudgetProfile,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostListsConfig {
    #[serde(default)]
    pub default_boost: Vec<String>,
    #[serde(default)]
    pub default_bad: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEndpoint {
    pub base_url: String,
    /// Name of the environment variable holding the API key. The key itself
    /// is never read from YAML, only from the environment (§4.7).
    pub api_key_env: String,
    pub model: String,
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    pub llm: ProviderEndpoint,
    pub search: ProviderEndpoint,
    pub rerank: Option<ProviderEndpoint>,
    /// Page-fetch timeout (§5: "page fetch: configurable"). Not modeled as a
    /// full `ProviderEndpoint` since the fetch collaborator has no API key
    /// or model — just a plain HTTP GET.
    #[serde(default = "default_provider_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

fn default_step_sleep_ms() -> u64 {
    500
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_provider_timeout_secs() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            cors_allow_any: false,
        }
    }
}

impl Default for Budgets {
    fn default() -> Self {
        Self {
            low: BudgetProfile {
                token_budget: 100_000,
                max_bad_attempts: 1,
            },
            medium: BudgetProfile {
                token_budget: 500_000,
                max_bad_attempts: 1,
            },
            high: BudgetProfile {
                token_budget: 1_000_000,
                max_bad_attempts: 2,
            },
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            llm: ProviderEndpoint {
                base_url: "https://api.openai.com/v1".to_string(),
                api_key_env: "DEEPRESEARCH_LLM_API_KEY".to_string(),
                model: "gpt-4o-mini".to_string(),
                timeout_secs: default_provider_timeout_secs(),
            },
            search: ProviderEndpoint {
                base_url: "https://api.search.brave.com/res/v1/web/search".to_string(),
                api_key_env: "DEEPRESEARCH_SEARCH_API_KEY".to_string(),
                model: String::new(),
                timeout_secs: 30,
            },
            rerank: None,
            fetch_timeout_secs: default_provider_timeout_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            budgets: Budgets::default(),
            step_sleep_ms: default_step_sleep_ms(),
            hosts: HostListsConfig::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

impl Config {
    /// Resolve an API key for a configured provider endpoint from the
    /// environment. Never sourced from the YAML file (§4.7).
    pub fn resolve_api_key(endpoint: &ProviderEndpoint) -> Option<String> {
        std::env::var(&endpoint.api_key_env).ok()
    }

    pub fn budget_for_effort(&self, effort: ReasoningEffort) -> BudgetProfile {
        match effort {
            ReasoningEffort::Low => self.budgets.low,
            ReasoningEffort::Medium => self.budgets.medium,
            ReasoningEffort::High => self.budgets.high,
        }
    }
}

/// `reasoning_effort` from the chat-completions request (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

impl Default for ReasoningEffort {
    fn default() -> Self {
        ReasoningEffort::Medium
    }
}

/// Load config from `config.yaml` in the current working directory, falling
/// back to defaults if absent. Environment variables are layered on top by
/// individual subsystems at the point of use (provider keys, bind addr
/// override) rather than flattened here, so the precedence is explicit at
/// each call site.
pub fn load_yaml_config() -> anyhow::Result<Config> {
    let config_path = PathBuf::from("config.yaml");

    let mut config = if config_path.exists() {
        let contents = fs::read_to_string(&config_path)?;
        serde_yaml::from_str(&contents)?
    } else {
        debug!("no config.yaml found, using default configuration");
        Config::default()
    };

    if let Ok(bind_addr) = std::env::var("DEEPRESEARCH_BIND_ADDR") {
        config.server.bind_addr = bind_addr;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_budgets_match_spec_table() {
        let budgets = Budgets::default();
        assert_eq!(budgets.low.token_budget, 100_000);
        assert_eq!(budgets.medium.token_budget, 500_000);
        assert_eq!(budgets.high.token_budget, 1_000_000);
        assert_eq!(budgets.high.max_bad_attempts, 2);
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        // No config.yaml is expected to exist in the test working directory.
        let config = Config::default();
        assert_eq!(config.server.bind_addr, "0.0.0.0:8080");
    }
}

use crate::models::DEFAULT_MODEL_ID;
use crate::storage::{self, Store};
use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://dev-llm-proxy.nebulablock.com/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything the client needs, resolved once at startup and passed down.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model_id: String,
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            model_id: DEFAULT_MODEL_ID.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl Config {
    /// Environment (after `.env`), then nothing else.
    pub fn from_env() -> Result<Self> {
        load_dotenv();
        Self::resolve(|key| env::var(key).ok(), None)
    }

    /// Environment first, then values saved in `store`, then defaults.
    pub fn load(store: &Store) -> Result<Self> {
        load_dotenv();
        Self::resolve(|key| env::var(key).ok(), Some(store))
    }

    fn resolve(lookup: impl Fn(&str) -> Option<String>, store: Option<&Store>) -> Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let stored = |key: &str| {
            store
                .and_then(|s| s.get(key))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let timeout = match var("NEBULA_TIMEOUT_SECS") {
            Some(secs) => Duration::from_secs(
                secs.parse()
                    .with_context(|| format!("NEBULA_TIMEOUT_SECS is not a number: {secs}"))?,
            ),
            None => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            base_url: var("NEBULA_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: var("NEBULA_API_KEY").or_else(|| stored(storage::API_KEY)),
            model_id: var("NEBULA_MODEL")
                .or_else(|| stored(storage::SELECTED_MODEL))
                .unwrap_or_else(|| DEFAULT_MODEL_ID.to_string()),
            timeout,
        })
    }

    /// Persist the API key and model selection.
    pub fn save(&self, store: &Store) -> Result<()> {
        match &self.api_key {
            Some(key) => store.set(storage::API_KEY, key)?,
            None => store.delete(storage::API_KEY)?,
        }
        store.set(storage::SELECTED_MODEL, &self.model_id)?;
        tracing::debug!(model = %self.model_id, "saved configuration");
        Ok(())
    }
}

fn load_dotenv() {
    // A missing .env is normal outside development.
    if let Err(err) = dotenvy::dotenv()
        && !err.not_found()
    {
        tracing::warn!(error = %err, "failed to read .env");
    }
}

//! The send flow a front end drives: validation, transcript bookkeeping and
//! persistence around [`NebulaClient::chat`].

use crate::ai::{ChatError, ChatResult, NebulaClient, UserInput};
use crate::config::Config;
use crate::history::{ChatHistory, StoredMessage};
use crate::models::{self, ModelProfile};
use crate::storage::Store;
use anyhow::{Result, anyhow};
use std::path::{Path, PathBuf};

/// Assistant turn appended when a send fails.
pub const APOLOGY_REPLY: &str =
    "Sorry, an error occurred while processing your message. Please try again.";

pub fn fallback_note(images: usize) -> String {
    format!(
        "[Note: Due to request size limits, I analyzed the first image only. {images} images were provided.]"
    )
}

pub struct ChatSession {
    config: Config,
    store: Store,
    client: Option<NebulaClient>,
    history: ChatHistory,
}

impl ChatSession {
    /// Session over the HTTP client; without an API key sends fail with
    /// [`ChatError::MissingApiKey`] until one is set.
    pub fn open(config: Config, store: Store) -> Self {
        let client = match NebulaClient::from_config(&config) {
            Ok(client) => Some(client),
            Err(err) => {
                tracing::warn!(error = %err, "chat client not ready");
                None
            }
        };
        Self::with_client(config, store, client)
    }

    pub fn with_client(config: Config, store: Store, client: Option<NebulaClient>) -> Self {
        let history = ChatHistory::load(&store);
        Self {
            config,
            store,
            client,
            history,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    pub fn has_api_key(&self) -> bool {
        self.client.is_some()
    }

    pub fn current_model(&self) -> &'static ModelProfile {
        models::resolve(&self.config.model_id)
    }

    /// Send one user message and return the reply text shown to the user.
    ///
    /// On failure the transcript gets an apology turn and the typed error is
    /// returned for display.
    pub async fn send(&mut self, text: &str, images: Vec<String>) -> ChatResult<String> {
        if UserInput::new(text, &images).is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let Some(client) = self.client.clone() else {
            return Err(ChatError::MissingApiKey);
        };

        let turns = self.history.to_turns();
        let id = self.history.next_id();
        self.history.push(StoredMessage::user(id, text, images.clone()));

        let result = client
            .chat(&self.config.model_id, UserInput::new(text, &images), &turns)
            .await;

        let id = self.history.next_id();
        let result = match result {
            Ok(outcome) => {
                let mut reply = outcome.reply();
                if outcome.used_fallback {
                    reply = format!("{}\n\n{reply}", fallback_note(outcome.images_attached));
                }
                self.history.push(StoredMessage::assistant(id, &reply));
                Ok(reply)
            }
            Err(err) => {
                tracing::error!(error = %err, "error sending message");
                self.history.push(StoredMessage::assistant(id, APOLOGY_REPLY));
                Err(err)
            }
        };

        self.persist_history();
        result
    }

    pub fn set_model(&mut self, model_id: &str) -> Result<&'static ModelProfile> {
        let profile = models::find(model_id).ok_or_else(|| {
            let known: Vec<_> = models::MODELS.iter().map(|m| m.id).collect();
            anyhow!("Unknown model '{model_id}'. Available: {}", known.join(", "))
        })?;
        self.config.model_id = profile.id.to_string();
        self.config.save(&self.store)?;
        tracing::info!(model = profile.id, "switched model");
        Ok(profile)
    }

    pub fn set_api_key(&mut self, api_key: &str) -> Result<()> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(anyhow!("API key must not be empty"));
        }
        self.config.api_key = Some(api_key.to_string());
        self.client = Some(NebulaClient::from_config(&self.config)?);
        self.config.save(&self.store)
    }

    /// Forget the API key and the transcript that was tied to it.
    pub fn clear_api_key(&mut self) -> Result<()> {
        self.config.api_key = None;
        self.client = None;
        self.config.save(&self.store)?;
        self.clear_history()
    }

    pub fn clear_history(&mut self) -> Result<()> {
        self.history.clear();
        self.history.save(&self.store)?;
        tracing::info!("chat history cleared");
        Ok(())
    }

    pub fn export_history(&self, dir: &Path) -> Result<PathBuf> {
        self.history.export_to_dir(dir, &self.config.model_id)
    }

    fn persist_history(&self) {
        if let Err(err) = self.history.save(&self.store) {
            tracing::warn!(error = %err, "failed to save chat history");
        }
    }
}

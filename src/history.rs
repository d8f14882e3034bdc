//! Persisted chat transcript.

use crate::storage::{self, Store};
use crate::types::ConversationTurn;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

/// One transcript entry, as shown to the user. Unlike a
/// [`ConversationTurn`], it keeps every attached image.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub id: u64,
    pub content: String,
    #[serde(default)]
    pub images: Vec<String>,
    pub is_user: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl StoredMessage {
    pub fn user(id: u64, content: impl Into<String>, images: Vec<String>) -> Self {
        Self {
            id,
            content: content.into(),
            images,
            is_user: true,
            timestamp: now(),
        }
    }

    pub fn assistant(id: u64, content: impl Into<String>) -> Self {
        Self {
            id,
            content: content.into(),
            images: Vec::new(),
            is_user: false,
            timestamp: now(),
        }
    }

    /// Text-only turn; past images are not resent.
    pub fn to_turn(&self) -> ConversationTurn {
        if self.is_user {
            ConversationTurn::user(&self.content)
        } else {
            ConversationTurn::assistant(&self.content)
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatExport<'a> {
    messages: &'a [StoredMessage],
    export_date: String,
    model: &'a str,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChatHistory {
    messages: Vec<StoredMessage>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Saved transcript, or an empty one if nothing usable is stored.
    pub fn load(store: &Store) -> Self {
        let Some(raw) = store.get(storage::CHAT_HISTORY) else {
            return Self::new();
        };
        match serde_json::from_str::<Vec<StoredMessage>>(&raw) {
            Ok(messages) => {
                tracing::info!(count = messages.len(), "loaded chat history");
                Self { messages }
            }
            Err(err) => {
                tracing::warn!(error = %err, "stored chat history is corrupt, starting fresh");
                Self::new()
            }
        }
    }

    pub fn save(&self, store: &Store) -> Result<()> {
        if self.messages.is_empty() {
            return store.delete(storage::CHAT_HISTORY);
        }
        let raw = serde_json::to_string(&self.messages)?;
        store.set(storage::CHAT_HISTORY, &raw)?;
        tracing::debug!(count = self.messages.len(), "saved chat history");
        Ok(())
    }

    pub fn messages(&self) -> &[StoredMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Next id, strictly greater than any in the transcript.
    pub fn next_id(&self) -> u64 {
        let now_ms = u64::try_from(now().unix_timestamp_nanos() / 1_000_000).unwrap_or(0);
        let last = self.messages.iter().map(|m| m.id).max().unwrap_or(0);
        now_ms.max(last + 1)
    }

    pub fn push(&mut self, message: StoredMessage) {
        self.messages.push(message);
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn to_turns(&self) -> Vec<ConversationTurn> {
        self.messages.iter().map(StoredMessage::to_turn).collect()
    }

    pub fn export_json(&self, model_id: &str, at: OffsetDateTime) -> Result<String> {
        let export = ChatExport {
            messages: &self.messages,
            export_date: at.format(&Rfc3339)?,
            model: model_id,
        };
        Ok(serde_json::to_string_pretty(&export)?)
    }

    /// Write `chat-history-YYYY-MM-DD.json` into `dir`.
    pub fn export_to_dir(&self, dir: &Path, model_id: &str) -> Result<PathBuf> {
        let at = now();
        let path = dir.join(export_file_name(at)?);
        fs::write(&path, self.export_json(model_id, at)?)
            .with_context(|| format!("Failed to write export {}", path.display()))?;
        tracing::info!(path = %path.display(), "chat history exported");
        Ok(path)
    }
}

pub fn export_file_name(at: OffsetDateTime) -> Result<String> {
    let date = at.format(format_description!("[year]-[month]-[day]"))?;
    Ok(format!("chat-history-{date}.json"))
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

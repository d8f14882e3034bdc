//! Local key-value persistence.
//!
//! One file per key under the app's data directory. Holds the API key, the
//! selected model and the chat transcript between runs.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const API_KEY: &str = "nebula_api_key";
pub const SELECTED_MODEL: &str = "selected_model";
pub const CHAT_HISTORY: &str = "chat_history";

#[derive(Clone, Debug)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store under the platform data directory, or `./cache` when there is none.
    pub fn open_default() -> Self {
        if let Some(data_dir) = dirs::data_local_dir() {
            return Self::new(data_dir.join("nebula-chat"));
        }
        Self::new(PathBuf::from("cache"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", sanitize_key(key)))
    }

    pub fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path_for(key)).ok()
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.root).with_context(|| {
            format!("Failed to create storage directory {}", self.root.display())
        })?;
        let path = self.path_for(key);
        fs::write(&path, value)
            .with_context(|| format!("Failed to write to storage: {}", path.display()))
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to delete from storage: {}", path.display()))?;
        }
        Ok(())
    }

    pub fn keys(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Vec::new();
        };
        entries
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some("json") {
                    path.file_stem()
                        .and_then(|s| s.to_str())
                        .map(|s| s.to_string())
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn clear(&self) -> Result<()> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root)
                .with_context(|| format!("Failed to clear storage {}", self.root.display()))?;
        }
        Ok(())
    }
}

/// Sanitize storage key for filesystem use
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(64)
        .collect()
}

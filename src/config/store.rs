//! Flat JSON documents read and written wholesale
//!
//! Used for preferences and persisted mining totals. A missing or unreadable
//! file falls back to defaults; nothing is merged key by key.

use anyhow::Result;
use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// One JSON document on disk holding a `T`
#[derive(Debug, Clone)]
pub struct JsonStore<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document, defaults when missing or unreadable
    pub fn load(&self) -> T {
        match self.try_load() {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to load {:?}, using defaults: {}", self.path, e);
                T::default()
            }
        }
    }

    /// Load the document, defaults only when the file does not exist
    pub fn try_load(&self) -> Result<T> {
        if !self.path.exists() {
            return Ok(T::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Replace the document on disk
    pub fn save(&self, value: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(value)?;
        std::fs::write(&self.path, content)?;
        info!("Saved {:?}", self.path);
        Ok(())
    }
}

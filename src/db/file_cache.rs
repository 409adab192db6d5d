// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JSON file cache laid out as `<root>/<collection>/<name>.json`.

use crate::error::{AppError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// File-backed key/value cache.
#[derive(Debug, Clone)]
pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn path(&self, collection: &str, name: &str) -> PathBuf {
        self.root.join(collection).join(format!("{}.json", name))
    }

    pub async fn exists(&self, collection: &str, name: &str) -> bool {
        tokio::fs::try_exists(self.path(collection, name))
            .await
            .unwrap_or(false)
    }

    /// Read and deserialize an entry. Returns `NotFound` if it is absent.
    pub async fn read<T: DeserializeOwned>(&self, collection: &str, name: &str) -> Result<T> {
        let path = self.path(collection, name);
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::NotFound(format!(
                    "Cache entry {}/{}",
                    collection, name
                )));
            }
            Err(e) => {
                return Err(AppError::Cache(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        serde_json::from_str(&data)
            .map_err(|e| AppError::Cache(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Serialize and write an entry, creating the collection directory.
    pub async fn write<T: Serialize>(&self, collection: &str, name: &str, value: &T) -> Result<()> {
        let path = self.path(collection, name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Cache(format!("Failed to create {}: {}", parent.display(), e)))?;
        }

        let data = serde_json::to_string(value).map_err(|e| AppError::Cache(e.to_string()))?;
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| AppError::Cache(format!("Failed to write {}: {}", path.display(), e)))
    }
}

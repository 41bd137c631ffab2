//! services/api/src/adapters/storage.rs
//!
//! A local filesystem implementation of the `ObjectStorage` port. Files land
//! under a root directory and are served back by the API under the same path.

use async_trait::async_trait;
use bytes::Bytes;
use folktale_core::ports::{ObjectStorage, PortError, PortResult};
use std::path::{Component, Path, PathBuf};
use tracing::info;

/// Object storage backed by a directory on disk.
#[derive(Clone)]
pub struct LocalObjectStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStorage {
    /// Creates a new `LocalObjectStorage`.
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

/// Builds the object path for an uploaded cover: `covers/{millis}-{file name}`,
/// with anything but ascii alphanumerics, dots, dashes and underscores replaced.
pub fn cover_object_path(file_name: &str, unix_millis: i64) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let mut sanitized = String::with_capacity(base.len());
    for c in base.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
            sanitized.push(c);
        } else if !sanitized.ends_with('-') {
            sanitized.push('-');
        }
    }
    let sanitized = sanitized.trim_matches(|c| c == '-' || c == '.');
    let name = if sanitized.is_empty() { "cover" } else { sanitized };
    format!("covers/{}-{}", unix_millis, name)
}

fn relative_path(path: &str) -> PortResult<PathBuf> {
    let candidate = Path::new(path);
    let is_plain = candidate
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if path.is_empty() || !is_plain {
        return Err(PortError::Invalid(format!("invalid object path '{}'", path)));
    }
    Ok(candidate.to_path_buf())
}

//=========================================================================================
// `ObjectStorage` Trait Implementation
//=========================================================================================

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn upload(&self, path: &str, bytes: Bytes) -> PortResult<String> {
        let target = self.root.join(relative_path(path)?);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PortError::Unavailable(e.to_string()))?;
        }
        tokio::fs::write(&target, &bytes)
            .await
            .map_err(|e| PortError::Unavailable(e.to_string()))?;

        info!("Stored {} bytes at {}", bytes.len(), target.display());
        Ok(format!("{}/{}", self.public_base_url, path))
    }
}

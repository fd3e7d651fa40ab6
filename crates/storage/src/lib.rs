use std::{
    collections::HashMap,
    io,
    path::PathBuf,
    sync::Arc,
};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use hm_relay_core::{AccessToken, Platform};

/// Per-platform bearer token storage.
///
/// Implementations hold at most one token per [`Platform`]; `set` replaces
/// whatever was stored before.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Returns the most recently stored token, or `None` when nothing is stored.
    async fn get(&self, platform: Platform) -> Result<Option<AccessToken>, TokenStoreError>;

    /// Stores `token`, overwriting any previous value.
    async fn set(&self, platform: Platform, token: &AccessToken) -> Result<(), TokenStoreError>;

    /// Removes the stored token. Clearing an empty slot is not an error.
    async fn clear(&self, platform: Platform) -> Result<(), TokenStoreError>;
}

/// Errors produced by token store backends.
#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("failed to read token file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write token file {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to remove token file {path}: {source}")]
    Remove { path: PathBuf, source: io::Error },
    #[error("refusing to store an empty token")]
    EmptyToken,
}

/// Stores each platform's token as a single-line text file in `dir`.
///
/// Files are named after [`Platform::token_file_name`]. Writes go to a
/// uniquely named temporary file that is renamed over the target, so a
/// reader never observes a partially written token.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Full path of the token file for `platform`.
    pub fn path_for(&self, platform: Platform) -> PathBuf {
        self.dir.join(platform.token_file_name())
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn get(&self, platform: Platform) -> Result<Option<AccessToken>, TokenStoreError> {
        let path = self.path_for(platform);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                let token = contents.trim();
                if token.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(AccessToken::new(token)))
                }
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(TokenStoreError::Read { path, source }),
        }
    }

    async fn set(&self, platform: Platform, token: &AccessToken) -> Result<(), TokenStoreError> {
        if token.as_str().trim().is_empty() {
            return Err(TokenStoreError::EmptyToken);
        }

        let path = self.path_for(platform);
        let staging = self.dir.join(format!(
            ".{}.{}.tmp",
            platform.token_file_name(),
            Uuid::new_v4().simple()
        ));

        if let Err(source) = tokio::fs::write(&staging, token.as_str()).await {
            return Err(TokenStoreError::Write {
                path: staging,
                source,
            });
        }
        if let Err(source) = tokio::fs::rename(&staging, &path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(TokenStoreError::Write { path, source });
        }

        debug!(stage = "token_store", platform = %platform, path = %path.display(), "token file written");
        Ok(())
    }

    async fn clear(&self, platform: Platform) -> Result<(), TokenStoreError> {
        let path = self.path_for(platform);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(TokenStoreError::Remove { path, source }),
        }
    }
}

/// In-process token store, used by tests and ephemeral deployments.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    tokens: Arc<RwLock<HashMap<Platform, AccessToken>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self, platform: Platform) -> Result<Option<AccessToken>, TokenStoreError> {
        Ok(self.tokens.read().await.get(&platform).cloned())
    }

    async fn set(&self, platform: Platform, token: &AccessToken) -> Result<(), TokenStoreError> {
        if token.as_str().trim().is_empty() {
            return Err(TokenStoreError::EmptyToken);
        }
        self.tokens.write().await.insert(platform, token.clone());
        Ok(())
    }

    async fn clear(&self, platform: Platform) -> Result<(), TokenStoreError> {
        self.tokens.write().await.remove(&platform);
        Ok(())
    }
}

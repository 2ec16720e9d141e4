use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::config::ClientConfig;

/// Local mirror of the bearer token, written after a successful session check
/// and removed on logout. Disabled unless `cache_token` is set.
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: Option<PathBuf>,
}

impl TokenCache {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            path: config.cache_token.then(|| config.token_cache_path.clone()),
        }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    pub async fn store(&self, token: &str) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, token)
            .await
            .with_context(|| format!("failed to cache token at '{}'", path.display()))
    }

    pub async fn load(&self) -> Option<String> {
        let path = self.path.as_ref()?;
        tokio::fs::read_to_string(path)
            .await
            .ok()
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    }

    /// Removing a cache that was never written is not an error.
    pub async fn clear(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err)
                .with_context(|| format!("failed to clear cached token '{}'", path.display())),
        }
    }
}

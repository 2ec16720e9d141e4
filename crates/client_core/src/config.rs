use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use shared::protocol::ANALYZE_PATH;
use tracing::{info, warn};
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "uploader.toml";
pub const PLACEHOLDER_USER_POOL_ID: &str = "REPLACE_WITH_USER_POOL_ID";
pub const PLACEHOLDER_CLIENT_ID: &str = "REPLACE_WITH_CLIENT_ID";
pub const PLACEHOLDER_API_URL: &str = "REPLACE_WITH_API_URL";

/// Deployment-time settings handed to the session guard and upload workflow.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub user_pool_id: String,
    pub identity_client_id: String,
    pub api_base_url: String,
    pub session_path: PathBuf,
    pub token_cache_path: PathBuf,
    pub cache_token: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let state_dir = dirs::config_dir()
            .map(|dir| dir.join("uploader"))
            .unwrap_or_else(|| PathBuf::from(".uploader"));
        Self {
            user_pool_id: PLACEHOLDER_USER_POOL_ID.into(),
            identity_client_id: PLACEHOLDER_CLIENT_ID.into(),
            api_base_url: PLACEHOLDER_API_URL.into(),
            session_path: state_dir.join("session.json"),
            token_cache_path: state_dir.join("id_token"),
            cache_token: false,
        }
    }
}

impl ClientConfig {
    /// Full URL of the analyze endpoint. Fails when the base URL is still the
    /// placeholder or does not parse.
    pub fn analyze_url(&self) -> Result<Url> {
        let base = self.api_base_url.trim();
        if base.is_empty() || base.contains(PLACEHOLDER_API_URL) {
            return Err(anyhow!("analyze endpoint base url is not configured"));
        }
        let base = format!("{}/", base.trim_end_matches('/'));
        let base = Url::parse(&base)
            .with_context(|| format!("invalid analyze endpoint base url '{base}'"))?;
        base.join(ANALYZE_PATH)
            .with_context(|| format!("failed to build analyze url from '{base}'"))
    }

    pub fn identity_is_placeholder(&self) -> bool {
        self.user_pool_id == PLACEHOLDER_USER_POOL_ID
            || self.identity_client_id == PLACEHOLDER_CLIENT_ID
    }
}

/// Defaults, then `uploader.toml` from the working directory, then the
/// process environment.
pub fn load_config() -> ClientConfig {
    load_config_from(Path::new(DEFAULT_CONFIG_FILE))
}

pub fn load_config_from(path: &Path) -> ClientConfig {
    let mut config = ClientConfig::default();

    match fs::read_to_string(path) {
        Ok(raw) => apply_file_overrides(&mut config, &raw),
        Err(_) => info!(path = %path.display(), "no config file found; using defaults"),
    }

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config
}

pub(crate) fn apply_file_overrides(config: &mut ClientConfig, raw: &str) {
    let file_cfg = match toml::from_str::<HashMap<String, toml::Value>>(raw) {
        Ok(file_cfg) => file_cfg,
        Err(err) => {
            warn!("ignoring malformed config file: {err}");
            return;
        }
    };

    let text = |key: &str| {
        file_cfg
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };

    if let Some(v) = text("user_pool_id") {
        config.user_pool_id = v;
    }
    if let Some(v) = text("client_id") {
        config.identity_client_id = v;
    }
    if let Some(v) = text("api_url") {
        config.api_base_url = v;
    }
    if let Some(v) = text("session_path") {
        config.session_path = PathBuf::from(v);
    }
    if let Some(v) = text("token_cache_path") {
        config.token_cache_path = PathBuf::from(v);
    }
    if let Some(v) = file_cfg.get("cache_token").and_then(|v| v.as_bool()) {
        config.cache_token = v;
    }
}

pub(crate) fn apply_env_overrides(
    config: &mut ClientConfig,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if let Some(v) = lookup("USER_POOL_ID") {
        config.user_pool_id = v;
    }
    if let Some(v) = lookup("APP__USER_POOL_ID") {
        config.user_pool_id = v;
    }

    if let Some(v) = lookup("IDENTITY_CLIENT_ID") {
        config.identity_client_id = v;
    }
    if let Some(v) = lookup("APP__IDENTITY_CLIENT_ID") {
        config.identity_client_id = v;
    }

    if let Some(v) = lookup("ANALYZE_API_URL") {
        config.api_base_url = v;
    }
    if let Some(v) = lookup("APP__ANALYZE_API_URL") {
        config.api_base_url = v;
    }

    if let Some(v) = lookup("APP__SESSION_PATH") {
        config.session_path = PathBuf::from(v);
    }
    if let Some(v) = lookup("APP__TOKEN_CACHE_PATH") {
        config.token_cache_path = PathBuf::from(v);
    }

    if let Some(v) = lookup("APP__CACHE_TOKEN") {
        match v.parse::<bool>() {
            Ok(parsed) => config.cache_token = parsed,
            Err(_) => warn!(value = %v, "APP__CACHE_TOKEN is not a boolean; ignoring"),
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::domain::{UserAttribute, UserHandle};
use tracing::{debug, warn};

pub const EMAIL_ATTRIBUTE: &str = "email";

/// Hosted identity service as seen by the client: a source of the current
/// user and that user's session tokens.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_user(&self) -> Option<UserHandle>;
    async fn get_session(&self, user: &UserHandle) -> Result<Session>;
    async fn sign_out(&self, user: &UserHandle) -> Result<()>;
    async fn user_attributes(&self, user: &UserHandle) -> Result<Vec<UserAttribute>>;
}

pub struct MissingIdentityProvider;

#[async_trait]
impl IdentityProvider for MissingIdentityProvider {
    async fn current_user(&self) -> Option<UserHandle> {
        None
    }

    async fn get_session(&self, user: &UserHandle) -> Result<Session> {
        Err(anyhow!("identity provider unavailable for user {user}"))
    }

    async fn sign_out(&self, _user: &UserHandle) -> Result<()> {
        Ok(())
    }

    async fn user_attributes(&self, user: &UserHandle) -> Result<Vec<UserAttribute>> {
        Err(anyhow!("identity provider unavailable for user {user}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl Session {
    pub fn new(id_token: impl Into<String>) -> Self {
        Self {
            id_token: id_token.into(),
            access_token: None,
        }
    }

    /// A session is valid while every token it carries is a JWT whose `exp`
    /// lies after `now`.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        let id_ok = token_expiry(&self.id_token).is_some_and(|exp| exp > now);
        let access_ok = self
            .access_token
            .as_deref()
            .map_or(true, |token| token_expiry(token).is_some_and(|exp| exp > now));
        id_ok && access_ok
    }

    pub fn is_valid_now(&self) -> bool {
        self.is_valid(Utc::now())
    }

    pub fn id_token(&self) -> &str {
        &self.id_token
    }
}

#[derive(Debug, Deserialize)]
struct ExpiryClaim {
    exp: i64,
}

/// Reads the `exp` claim of a JWT without verifying its signature; the
/// analyze endpoint does the verification.
pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut segments = token.split('.');
    let (_header, payload, _signature) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() {
        return None;
    }
    let decoded = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claim: ExpiryClaim = serde_json::from_slice(&decoded).ok()?;
    DateTime::from_timestamp(claim.exp, 0)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredUser {
    id_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ClientSessions {
    #[serde(default)]
    last_auth_user: Option<String>,
    #[serde(default)]
    users: BTreeMap<String, StoredUser>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default)]
    clients: BTreeMap<String, ClientSessions>,
}

/// Identity provider backed by a JSON file holding the tokens issued by the
/// hosted pool, keyed by app client id like the browser SDK's storage.
pub struct FileIdentityProvider {
    path: PathBuf,
    client_id: String,
}

impl FileIdentityProvider {
    pub fn new(path: impl Into<PathBuf>, client_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            client_id: client_id.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records a signed-in user and makes them the current user.
    pub async fn store_session(
        &self,
        user: &UserHandle,
        session: &Session,
        email: Option<String>,
    ) -> Result<()> {
        let mut file = self.read().await?;
        let client = file.clients.entry(self.client_id.clone()).or_default();
        client.users.insert(
            user.0.clone(),
            StoredUser {
                id_token: session.id_token.clone(),
                access_token: session.access_token.clone(),
                email,
            },
        );
        client.last_auth_user = Some(user.0.clone());
        self.write(&file).await
    }

    async fn read(&self) -> Result<SessionFile> {
        match tokio::fs::read(&self.path).await {
            Ok(raw) => serde_json::from_slice(&raw)
                .with_context(|| format!("corrupt session file '{}'", self.path.display())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(SessionFile::default()),
            Err(err) => Err(err)
                .with_context(|| format!("failed to read session file '{}'", self.path.display())),
        }
    }

    async fn write(&self, file: &SessionFile) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("failed to create session directory '{}'", parent.display())
            })?;
        }
        let raw = serde_json::to_vec_pretty(file)?;
        tokio::fs::write(&self.path, raw)
            .await
            .with_context(|| format!("failed to write session file '{}'", self.path.display()))
    }

    async fn stored_user(&self, user: &UserHandle) -> Result<StoredUser> {
        let file = self.read().await?;
        file.clients
            .get(&self.client_id)
            .and_then(|client| client.users.get(&user.0))
            .cloned()
            .ok_or_else(|| anyhow!("no stored session for user {user}"))
    }
}

#[async_trait]
impl IdentityProvider for FileIdentityProvider {
    async fn current_user(&self) -> Option<UserHandle> {
        let file = match self.read().await {
            Ok(file) => file,
            Err(err) => {
                warn!("treating unreadable session file as signed out: {err:#}");
                return None;
            }
        };
        file.clients
            .get(&self.client_id)
            .and_then(|client| client.last_auth_user.clone())
            .map(UserHandle)
    }

    async fn get_session(&self, user: &UserHandle) -> Result<Session> {
        let stored = self.stored_user(user).await?;
        Ok(Session {
            id_token: stored.id_token,
            access_token: stored.access_token,
        })
    }

    async fn sign_out(&self, user: &UserHandle) -> Result<()> {
        let mut file = self.read().await?;
        let Some(client) = file.clients.get_mut(&self.client_id) else {
            return Ok(());
        };
        client.users.remove(&user.0);
        if client.last_auth_user.as_deref() == Some(user.as_str()) {
            client.last_auth_user = None;
        }
        debug!(user = %user, "removed stored session");
        self.write(&file).await
    }

    async fn user_attributes(&self, user: &UserHandle) -> Result<Vec<UserAttribute>> {
        let stored = self.stored_user(user).await?;
        Ok(stored
            .email
            .into_iter()
            .map(|value| UserAttribute {
                name: EMAIL_ATTRIBUTE.to_string(),
                value,
            })
            .collect())
    }
}

#[cfg(test)]
#[path = "tests/identity_tests.rs"]
mod tests;

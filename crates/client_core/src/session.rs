use chrono::{DateTime, Utc};
use shared::domain::UserHandle;
use tracing::{info, warn};

use crate::identity::{IdentityProvider, EMAIL_ATTRIBUTE};

/// Why the guard sent the user back to sign in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginReason {
    NoCurrentUser,
    SessionLookupFailed,
    InvalidSession,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user: UserHandle,
    pub id_token: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    Authenticated(AuthContext),
    RedirectToLogin(LoginReason),
}

impl GuardOutcome {
    pub fn auth(&self) -> Option<&AuthContext> {
        match self {
            Self::Authenticated(auth) => Some(auth),
            Self::RedirectToLogin(_) => None,
        }
    }
}

pub struct SessionGuard;

impl SessionGuard {
    /// Resolves the current user's bearer token. Any failure is terminal for
    /// this run: the caller must send the user to the login view.
    pub async fn check(identity: &dyn IdentityProvider, now: DateTime<Utc>) -> GuardOutcome {
        let Some(user) = identity.current_user().await else {
            info!("no signed-in user; redirecting to login");
            return GuardOutcome::RedirectToLogin(LoginReason::NoCurrentUser);
        };

        let session = match identity.get_session(&user).await {
            Ok(session) => session,
            Err(err) => {
                warn!(user = %user, "session lookup failed: {err:#}");
                return GuardOutcome::RedirectToLogin(LoginReason::SessionLookupFailed);
            }
        };

        if !session.is_valid(now) {
            info!(user = %user, "session expired or invalid; redirecting to login");
            return GuardOutcome::RedirectToLogin(LoginReason::InvalidSession);
        }

        let email = match identity.user_attributes(&user).await {
            Ok(attributes) => attributes
                .into_iter()
                .find(|attr| attr.name == EMAIL_ATTRIBUTE)
                .map(|attr| attr.value),
            Err(err) => {
                warn!(user = %user, "could not load user attributes: {err:#}");
                None
            }
        };

        info!(user = %user, "session verified");
        GuardOutcome::Authenticated(AuthContext {
            user,
            id_token: session.id_token,
            email,
        })
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;

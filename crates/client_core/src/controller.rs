//! Session-guarded entry point tying the guard, workflow and logout together.

use std::sync::Arc;

use chrono::Utc;
use shared::error::ValidationError;
use tracing::warn;

use crate::{
    analyze::AnalyzeApi,
    cache::TokenCache,
    config::ClientConfig,
    identity::IdentityProvider,
    render::ResultRenderer,
    session::{AuthContext, GuardOutcome, LoginReason, SessionGuard},
    workflow::{
        logout, Navigation, SelectedFile, SubmissionSummary, UploadWorkflow, WorkflowInitializer,
    },
};

pub enum StartOutcome {
    Ready(Box<UploadController>),
    RedirectToLogin(LoginReason),
    /// Signed in, but the deployment is missing what the workflow needs.
    NotInitialized,
}

pub struct UploadController {
    identity: Arc<dyn IdentityProvider>,
    cache: TokenCache,
    auth: AuthContext,
    workflow: UploadWorkflow,
}

impl UploadController {
    pub async fn start(config: &ClientConfig, identity: Arc<dyn IdentityProvider>) -> StartOutcome {
        Self::start_inner(config, identity, |token| {
            WorkflowInitializer::initialize(config, token)
        })
        .await
    }

    pub async fn start_with_api(
        config: &ClientConfig,
        identity: Arc<dyn IdentityProvider>,
        api: Arc<dyn AnalyzeApi>,
    ) -> StartOutcome {
        Self::start_inner(config, identity, |token| {
            WorkflowInitializer::initialize_with_api(config, token, api)
        })
        .await
    }

    async fn start_inner(
        config: &ClientConfig,
        identity: Arc<dyn IdentityProvider>,
        init: impl FnOnce(&str) -> Option<UploadWorkflow>,
    ) -> StartOutcome {
        let auth = match SessionGuard::check(identity.as_ref(), Utc::now()).await {
            GuardOutcome::Authenticated(auth) => auth,
            GuardOutcome::RedirectToLogin(reason) => return StartOutcome::RedirectToLogin(reason),
        };

        let cache = TokenCache::from_config(config);
        if let Err(err) = cache.store(&auth.id_token).await {
            warn!("failed to cache bearer token: {err:#}");
        }

        let Some(workflow) = init(&auth.id_token) else {
            return StartOutcome::NotInitialized;
        };

        StartOutcome::Ready(Box::new(Self {
            identity,
            cache,
            auth,
            workflow,
        }))
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    pub async fn submit<F: Into<SelectedFile>>(
        &self,
        client_id: &str,
        files: Vec<F>,
        renderer: &mut dyn ResultRenderer,
    ) -> Result<SubmissionSummary, ValidationError> {
        self.workflow.submit(client_id, files, renderer).await
    }

    pub async fn logout(self) -> Navigation {
        logout(self.identity.as_ref(), &self.cache).await
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;

use std::sync::Arc;

use shared::{
    domain::{AnalysisResult, ClientId, ImageUpload},
    error::{UploadError, ValidationError},
};
use tracing::{error, info, warn};
use url::Url;

use crate::{
    analyze::{AnalyzeApi, HttpAnalyzeClient},
    cache::TokenCache,
    config::ClientConfig,
    identity::IdentityProvider,
    render::ResultRenderer,
};

/// Where the front end should go next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Login,
}

/// One entry of the user's selection: either loaded into memory or a file
/// that could not be read, which is reported in place without a request.
#[derive(Debug, Clone)]
pub enum SelectedFile {
    Loaded(ImageUpload),
    Unreadable { file_name: String, reason: String },
}

impl SelectedFile {
    pub fn file_name(&self) -> &str {
        match self {
            Self::Loaded(upload) => &upload.file_name,
            Self::Unreadable { file_name, .. } => file_name,
        }
    }
}

impl From<ImageUpload> for SelectedFile {
    fn from(upload: ImageUpload) -> Self {
        Self::Loaded(upload)
    }
}

#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub file_name: String,
    pub result: Result<AnalysisResult, UploadError>,
}

#[derive(Debug, Clone, Default)]
pub struct SubmissionSummary {
    pub outcomes: Vec<FileOutcome>,
}

impl SubmissionSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

pub struct WorkflowInitializer;

impl WorkflowInitializer {
    /// Builds the upload workflow against the configured analyze endpoint.
    /// A missing endpoint or token is a deployment defect: it is logged and
    /// no workflow is produced.
    pub fn initialize(config: &ClientConfig, id_token: &str) -> Option<UploadWorkflow> {
        let analyze_url = Self::integration_check(config, id_token)?;
        info!(endpoint = %analyze_url, "upload workflow ready");
        Some(UploadWorkflow::new(
            id_token,
            Arc::new(HttpAnalyzeClient::new(analyze_url)),
        ))
    }

    pub fn initialize_with_api(
        config: &ClientConfig,
        id_token: &str,
        api: Arc<dyn AnalyzeApi>,
    ) -> Option<UploadWorkflow> {
        Self::integration_check(config, id_token)?;
        Some(UploadWorkflow::new(id_token, api))
    }

    fn integration_check(config: &ClientConfig, id_token: &str) -> Option<Url> {
        if id_token.trim().is_empty() {
            error!("upload workflow not initialized: empty bearer token");
            return None;
        }
        match config.analyze_url() {
            Ok(url) => Some(url),
            Err(err) => {
                error!("upload workflow not initialized: {err:#}");
                None
            }
        }
    }
}

pub struct UploadWorkflow {
    id_token: String,
    api: Arc<dyn AnalyzeApi>,
}

impl UploadWorkflow {
    pub fn new(id_token: impl Into<String>, api: Arc<dyn AnalyzeApi>) -> Self {
        Self {
            id_token: id_token.into(),
            api,
        }
    }

    /// Checks the two submit preconditions without touching the network.
    pub fn validate(client_id: &str, file_count: usize) -> Result<ClientId, ValidationError> {
        let client_id = ClientId::parse(client_id)?;
        if file_count == 0 {
            return Err(ValidationError::NoFiles);
        }
        Ok(client_id)
    }

    /// Validates the form input, then analyzes the files one at a time in the
    /// given order. Each file shows as pending before its request is sent and
    /// settles to success or error before the next request starts. Per-file
    /// failures, including files that could not be read, are rendered and
    /// never abort the remaining files.
    pub async fn submit<F: Into<SelectedFile>>(
        &self,
        client_id: &str,
        files: Vec<F>,
        renderer: &mut dyn ResultRenderer,
    ) -> Result<SubmissionSummary, ValidationError> {
        let client_id = Self::validate(client_id, files.len())?;

        renderer.reset();
        let mut summary = SubmissionSummary::default();
        for file in files {
            let file = file.into();
            let file_name = file.file_name().to_string();
            renderer.show_pending(&file_name);

            let result = match file {
                SelectedFile::Loaded(upload) => {
                    self.api.analyze(&self.id_token, &client_id, &upload).await
                }
                SelectedFile::Unreadable { reason, .. } => Err(UploadError::Unreadable(reason)),
            };
            match &result {
                Ok(analysis) => {
                    info!(
                        file = %file_name,
                        labels = analysis.labels.len(),
                        "analysis complete"
                    );
                    renderer.show_success(&file_name, analysis);
                }
                Err(err) => {
                    warn!(file = %file_name, "analysis failed: {err}");
                    renderer.show_error(&file_name, &err.user_message());
                }
            }

            summary.outcomes.push(FileOutcome { file_name, result });
        }

        info!(
            client_id = %client_id,
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            "submission finished"
        );
        Ok(summary)
    }
}

/// Signs out whoever is signed in, drops the cached token and sends the user
/// to the login view. Safe to call with nobody signed in.
pub async fn logout(identity: &dyn IdentityProvider, cache: &TokenCache) -> Navigation {
    match identity.current_user().await {
        Some(user) => {
            if let Err(err) = identity.sign_out(&user).await {
                warn!(user = %user, "sign-out failed: {err:#}");
            } else {
                info!(user = %user, "signed out");
            }
        }
        None => info!("logout requested with no signed-in user"),
    }

    if let Err(err) = cache.clear().await {
        warn!("failed to clear cached token: {err:#}");
    }
    Navigation::Login
}

#[cfg(test)]
#[path = "tests/workflow_tests.rs"]
mod tests;

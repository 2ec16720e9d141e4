use async_trait::async_trait;
use reqwest::{
    header::AUTHORIZATION,
    multipart::{Form, Part},
    Client,
};
use shared::{
    domain::{AnalysisResult, ClientId, ImageUpload},
    error::UploadError,
    protocol::{AnalyzeResponse, CLIENT_ID_FIELD, IMAGE_FIELD},
};
use tracing::{debug, warn};
use url::Url;

/// Remote image analysis service.
#[async_trait]
pub trait AnalyzeApi: Send + Sync {
    async fn analyze(
        &self,
        id_token: &str,
        client_id: &ClientId,
        upload: &ImageUpload,
    ) -> Result<AnalysisResult, UploadError>;
}

pub struct HttpAnalyzeClient {
    http: Client,
    analyze_url: Url,
}

impl HttpAnalyzeClient {
    pub fn new(analyze_url: Url) -> Self {
        Self::with_client(Client::new(), analyze_url)
    }

    pub fn with_client(http: Client, analyze_url: Url) -> Self {
        Self { http, analyze_url }
    }

    pub fn analyze_url(&self) -> &Url {
        &self.analyze_url
    }

    fn build_form(client_id: &ClientId, upload: &ImageUpload) -> Form {
        Form::new()
            .text(CLIENT_ID_FIELD, client_id.0.clone())
            .part(IMAGE_FIELD, image_part(upload))
    }
}

fn image_part(upload: &ImageUpload) -> Part {
    let part = || Part::bytes(upload.bytes.clone()).file_name(upload.file_name.clone());
    match upload.mime_type.as_deref() {
        Some(mime) => part().mime_str(mime).unwrap_or_else(|err| {
            warn!(file = %upload.file_name, mime, "ignoring unusable mime type: {err}");
            part()
        }),
        None => part(),
    }
}

#[async_trait]
impl AnalyzeApi for HttpAnalyzeClient {
    async fn analyze(
        &self,
        id_token: &str,
        client_id: &ClientId,
        upload: &ImageUpload,
    ) -> Result<AnalysisResult, UploadError> {
        debug!(file = %upload.file_name, bytes = upload.bytes.len(), "posting image for analysis");
        let response = self
            .http
            .post(self.analyze_url.clone())
            .header(AUTHORIZATION, id_token)
            .multipart(Self::build_form(client_id, upload))
            .send()
            .await
            .map_err(|e| UploadError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Http {
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| UploadError::Network(e.to_string()))?;
        AnalyzeResponse::parse(&body)
    }
}

#[cfg(test)]
#[path = "tests/analyze_tests.rs"]
mod tests;

use serde_json::Value;

use crate::{
    domain::{AnalysisResult, Label},
    error::UploadError,
};

pub const ANALYZE_PATH: &str = "analyze";
pub const CLIENT_ID_FIELD: &str = "clientId";
pub const IMAGE_FIELD: &str = "image";

/// Decoder for the success body of `POST /analyze`:
/// `{ "labels": [ { "name": string, "confidence": number }, ... ] }`.
pub struct AnalyzeResponse;

impl AnalyzeResponse {
    /// Parses the raw response text. Anything that is not JSON is an
    /// `InvalidResponseFormat`; a body whose `labels` is absent or empty-ish
    /// (`null`, `false`, `0`, `""`) is `MissingLabels`. An empty array is a
    /// valid result with no labels.
    pub fn parse(body: &str) -> Result<AnalysisResult, UploadError> {
        let value: Value =
            serde_json::from_str(body).map_err(|_| UploadError::InvalidResponseFormat)?;

        let labels = match value.get("labels") {
            Some(labels) if !is_falsy(labels) => labels.clone(),
            _ => return Err(UploadError::MissingLabels),
        };

        let labels: Vec<Label> = serde_json::from_value(labels)
            .map_err(|e| UploadError::MalformedLabels(e.to_string()))?;
        Ok(AnalysisResult { labels })
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n == 0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

//! Fixtures shared by the unit test modules.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;
use shared::{
    domain::{AnalysisResult, ClientId, ImageUpload, Label},
    error::UploadError,
};
use tokio::sync::Mutex;

use crate::analyze::{AnalyzeApi, HttpAnalyzeClient};

#[derive(Serialize)]
struct Claims<'a> {
    sub: &'a str,
    email: &'a str,
    exp: i64,
}

/// HS256 token for `sub` expiring `ttl` from now; negative ttl yields an
/// already expired token.
pub fn id_token(sub: &str, ttl: Duration) -> String {
    let claims = Claims {
        sub,
        email: "user@example.com",
        exp: (Utc::now() + ttl).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"test-signing-secret"),
    )
    .expect("encode test token")
}

pub fn fresh_token(sub: &str) -> String {
    id_token(sub, Duration::hours(1))
}

pub fn expired_token(sub: &str) -> String {
    id_token(sub, Duration::hours(-1))
}

/// HTTP client that ignores proxy settings from the environment, for talking
/// to the in-process mock server.
pub fn local_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("build http client")
}

pub fn local_analyze_client(base_url: &str) -> HttpAnalyzeClient {
    let url = url::Url::parse(base_url)
        .and_then(|base| base.join("analyze"))
        .expect("analyze url");
    HttpAnalyzeClient::with_client(local_http_client(), url)
}

/// Analyze backend that answers from memory and records each call as
/// `(token, client id, file name)`.
#[derive(Default)]
pub struct RecordingApi {
    pub failures: HashMap<String, UploadError>,
    pub calls: Mutex<Vec<(String, String, String)>>,
}

impl RecordingApi {
    pub fn failing(file_name: &str, err: UploadError) -> Self {
        let mut api = Self::default();
        api.failures.insert(file_name.to_string(), err);
        api
    }

    pub async fn calls(&self) -> Vec<(String, String, String)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl AnalyzeApi for RecordingApi {
    async fn analyze(
        &self,
        id_token: &str,
        client_id: &ClientId,
        upload: &ImageUpload,
    ) -> Result<AnalysisResult, UploadError> {
        self.calls.lock().await.push((
            id_token.to_string(),
            client_id.0.clone(),
            upload.file_name.clone(),
        ));
        if let Some(err) = self.failures.get(&upload.file_name) {
            return Err(err.clone());
        }
        Ok(AnalysisResult {
            labels: vec![Label::new(format!("label-for-{}", upload.file_name), 50.0)],
        })
    }
}

pub mod mock_server {
    use std::{
        collections::HashMap,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    use axum::{
        extract::{Multipart, State},
        http::{header::AUTHORIZATION, HeaderMap, StatusCode},
        routing::post,
        Router,
    };
    use tokio::{net::TcpListener, sync::Mutex};

    #[derive(Debug, Clone)]
    pub struct MockReply {
        pub status: u16,
        pub body: String,
    }

    impl MockReply {
        pub fn ok(body: impl Into<String>) -> Self {
            Self {
                status: 200,
                body: body.into(),
            }
        }

        pub fn status(status: u16) -> Self {
            Self {
                status,
                body: "upstream failure".into(),
            }
        }
    }

    #[derive(Debug, Clone, Default)]
    pub struct RecordedRequest {
        pub authorization: Option<String>,
        pub client_id: Option<String>,
        pub image_name: Option<String>,
        pub image_type: Option<String>,
        pub image_bytes: Vec<u8>,
    }

    #[derive(Clone)]
    struct MockState {
        replies: Arc<HashMap<String, MockReply>>,
        fallback: MockReply,
        requests: Arc<Mutex<Vec<RecordedRequest>>>,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
    }

    pub struct MockAnalyzeServer {
        pub base_url: String,
        requests: Arc<Mutex<Vec<RecordedRequest>>>,
        max_in_flight: Arc<AtomicUsize>,
    }

    impl MockAnalyzeServer {
        pub async fn requests(&self) -> Vec<RecordedRequest> {
            self.requests.lock().await.clone()
        }

        pub fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }
    }

    async fn handle_analyze(
        State(state): State<MockState>,
        headers: HeaderMap,
        mut multipart: Multipart,
    ) -> (StatusCode, String) {
        let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let mut recorded = RecordedRequest {
            authorization: headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            ..RecordedRequest::default()
        };
        while let Ok(Some(field)) = multipart.next_field().await {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("clientId") => recorded.client_id = field.text().await.ok(),
                Some("image") => {
                    recorded.image_name = field.file_name().map(str::to_string);
                    recorded.image_type = field.content_type().map(str::to_string);
                    recorded.image_bytes = field
                        .bytes()
                        .await
                        .map(|b| b.to_vec())
                        .unwrap_or_default();
                }
                _ => {}
            }
        }

        tokio::time::sleep(Duration::from_millis(15)).await;

        let reply = recorded
            .image_name
            .as_ref()
            .and_then(|name| state.replies.get(name))
            .cloned()
            .unwrap_or_else(|| state.fallback.clone());
        state.requests.lock().await.push(recorded);
        state.in_flight.fetch_sub(1, Ordering::SeqCst);

        let status =
            StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, reply.body)
    }

    /// Serves `POST /analyze`, answering per uploaded file name and falling
    /// back to a single `Cat` label.
    pub async fn spawn(replies: Vec<(&str, MockReply)>) -> MockAnalyzeServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let state = MockState {
            replies: Arc::new(
                replies
                    .into_iter()
                    .map(|(name, reply)| (name.to_string(), reply))
                    .collect(),
            ),
            fallback: MockReply::ok(r#"{"labels":[{"name":"Cat","confidence":97.345}]}"#),
            requests: Arc::clone(&requests),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::clone(&max_in_flight),
        };
        let app = Router::new()
            .route("/analyze", post(handle_analyze))
            .with_state(state);
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        MockAnalyzeServer {
            base_url: format!("http://{addr}"),
            requests,
            max_in_flight,
        }
    }
}

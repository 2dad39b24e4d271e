use crate::engine::{decode_response, server_error_message, ClassificationService};
use crate::error::SubmitError;
use crate::model::{ClassificationResult, SubmissionRequest, SubmitConfig};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::{debug, info};

/// Content type attached to the dataset part; the service reads it as CSV.
const DATASET_MIME: &str = "text/csv";

pub struct HttpClassifier {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpClassifier {
    pub fn new(cfg: &SubmitConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(cfg.timeout)
            .build()
            .context("build HTTP client")?;
        Ok(Self {
            http,
            endpoint: cfg.endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_form(&self, request: &SubmissionRequest) -> Result<Form, SubmitError> {
        let content = request.file.content.clone();
        let len = content.len() as u64;
        let part = Part::stream_with_length(content, len)
            .file_name(request.file.name.clone())
            .mime_str(DATASET_MIME)
            .map_err(|e| SubmitError::transport(&self.endpoint, &e))?;
        Ok(Form::new()
            .part("file", part)
            .text("target_column", request.target_column.clone()))
    }
}

#[async_trait]
impl ClassificationService for HttpClassifier {
    async fn classify(
        &self,
        request: &SubmissionRequest,
    ) -> Result<ClassificationResult, SubmitError> {
        let form = self.build_form(request)?;
        info!(
            submission = %request.id,
            endpoint = %self.endpoint,
            file = %request.file.name,
            bytes = request.file.content.len(),
            "uploading dataset"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| SubmitError::transport(&self.endpoint, &e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| SubmitError::transport(&self.endpoint, &e))?;
        debug!(submission = %request.id, %status, body_len = body.len(), "response received");

        if !status.is_success() {
            return Err(SubmitError::Status {
                status,
                message: server_error_message(&body),
            });
        }
        decode_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DatasetFile, SubmissionId};
    use axum::{
        extract::{Multipart, State},
        http::StatusCode,
        response::IntoResponse,
        routing::post,
        Json, Router,
    };
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::sync::{oneshot, Mutex};

    /// Multipart fields observed by the fake service.
    #[derive(Debug, Default)]
    struct Captured {
        file_name: Option<String>,
        content_type: Option<String>,
        file: Vec<u8>,
        target_column: Option<String>,
    }

    #[derive(Clone)]
    struct ServerState {
        tx: Arc<Mutex<Option<oneshot::Sender<Captured>>>>,
        status: StatusCode,
        body: Value,
    }

    async fn handle_upload(
        State(state): State<ServerState>,
        mut multipart: Multipart,
    ) -> impl IntoResponse {
        let mut captured = Captured::default();
        while let Ok(Some(field)) = multipart.next_field().await {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("file") => {
                    captured.file_name = field.file_name().map(str::to_string);
                    captured.content_type = field.content_type().map(str::to_string);
                    captured.file = field.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
                }
                Some("target_column") => {
                    captured.target_column = field.text().await.ok();
                }
                _ => {}
            }
        }
        if let Some(tx) = state.tx.lock().await.take() {
            let _ = tx.send(captured);
        }
        (state.status, Json(state.body))
    }

    async fn spawn_service(
        status: StatusCode,
        body: Value,
    ) -> anyhow::Result<(String, oneshot::Receiver<Captured>)> {
        std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (tx, rx) = oneshot::channel();
        let state = ServerState {
            tx: Arc::new(Mutex::new(Some(tx))),
            status,
            body,
        };
        let app = Router::new()
            .route("/upload", post(handle_upload))
            .with_state(state);
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok((format!("http://{addr}/upload"), rx))
    }

    fn classifier(endpoint: String) -> HttpClassifier {
        HttpClassifier::new(&SubmitConfig {
            endpoint,
            timeout: Duration::from_secs(5),
            ..SubmitConfig::default()
        })
        .expect("client")
    }

    fn sales_request() -> SubmissionRequest {
        SubmissionRequest {
            id: SubmissionId(1),
            file: DatasetFile::new("sales.csv", "idade,renda,comprou\n31,4200,1\n"),
            target_column: "comprou".into(),
        }
    }

    #[tokio::test]
    async fn uploads_file_and_target_column() {
        let png = STANDARD.encode(crate::images::png_fixture(6, 3));
        let body = json!({
            "job_id": "c0ffee",
            "result": {
                "best_model": "RandomForest",
                "accuracy": 0.923,
                "confusion_matrix_image": png,
                "feature_importance_image": png
            }
        });
        let (endpoint, captured_rx) = spawn_service(StatusCode::OK, body).await.expect("server");

        let result = classifier(endpoint)
            .classify(&sales_request())
            .await
            .expect("classify");

        let captured = captured_rx.await.expect("captured");
        assert_eq!(captured.file_name.as_deref(), Some("sales.csv"));
        assert_eq!(captured.content_type.as_deref(), Some("text/csv"));
        assert_eq!(captured.file, b"idade,renda,comprou\n31,4200,1\n");
        assert_eq!(captured.target_column.as_deref(), Some("comprou"));

        assert_eq!(result.best_model, "RandomForest");
        assert_eq!(result.accuracy, 0.923);
        assert_eq!(result.job_id.as_deref(), Some("c0ffee"));
        assert!(result.shap_summary_image.is_none());
    }

    #[tokio::test]
    async fn server_error_maps_to_status_error() {
        let body = json!({"error": "Target column not found in dataset."});
        let (endpoint, _rx) = spawn_service(StatusCode::BAD_REQUEST, body)
            .await
            .expect("server");

        let err = classifier(endpoint)
            .classify(&sales_request())
            .await
            .expect_err("must fail");
        match err {
            SubmitError::Status { status, message } => {
                assert_eq!(status, reqwest::StatusCode::BAD_REQUEST);
                assert_eq!(message.as_deref(), Some("Target column not found in dataset."));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_result_is_malformed() {
        let (endpoint, _rx) = spawn_service(StatusCode::OK, json!({"job_id": "x"}))
            .await
            .expect("server");

        let err = classifier(endpoint)
            .classify(&sales_request())
            .await
            .expect_err("must fail");
        assert!(matches!(err, SubmitError::MalformedResponse(_)), "{err:?}");
    }

    #[tokio::test]
    async fn unreachable_service_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let err = classifier(format!("http://{addr}/upload"))
            .classify(&sales_request())
            .await
            .expect_err("must fail");
        match err {
            SubmitError::Transport { endpoint, .. } => {
                assert!(endpoint.ends_with("/upload"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

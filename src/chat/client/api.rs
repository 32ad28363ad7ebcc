//! HTTP adapters for the remote knowledge service.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::chat::core::config::ChatConfig;
use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::encoding::EncodedFile;

/// Boxed future type for client operations.
pub type ClientFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Query endpoint, relative to the API base.
const QUERY_PATH: &str = "/api/query";
/// Ingestion endpoint, relative to the API base.
const INGEST_PATH: &str = "/ingest/webhook";
/// Liveness endpoint, relative to the API base.
const HELLO_PATH: &str = "/hello";

/// Free-text question answering.
pub trait QueryClient: Send + Sync {
    /// Submit a trimmed, non-empty question and return the answer.
    ///
    /// # Errors
    /// Returns [`ChatError::Query`] on any transport or remote failure.
    fn submit_query(&self, text: &str) -> ClientFuture<'_, ChatResult<String>>;
}

/// Document registration into the remote index.
pub trait IngestClient: Send + Sync {
    /// Send an encoded file. No retry, no partial success.
    ///
    /// # Errors
    /// Returns [`ChatError::Ingest`] on any transport or remote failure.
    fn submit_file<'a>(&'a self, file: &'a EncodedFile) -> ClientFuture<'a, ChatResult<()>>;
}

/// Backend liveness probe.
pub trait ProbeClient: Send + Sync {
    /// Fetch the greeting message from the backend.
    ///
    /// # Errors
    /// Returns [`ChatError::Probe`] if the backend is unreachable.
    fn hello(&self) -> ClientFuture<'_, ChatResult<String>>;
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    answer: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IngestRequest<'a> {
    file_name: &'a str,
    content_type: &'a str,
    data: &'a str,
}

#[derive(Deserialize)]
struct HelloResponse {
    #[serde(default)]
    message: String,
}

/// `reqwest`-backed client implementing all three endpoint traits.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: reqwest::Client,
    query_url: Url,
    ingest_url: Url,
    hello_url: Url,
}

impl ApiClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built.
    pub fn new(config: &ChatConfig) -> ChatResult<Self> {
        let base = config.api_base.trim_end_matches('/');
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ChatError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            query_url: Url::parse(&format!("{base}{QUERY_PATH}"))?,
            ingest_url: Url::parse(&format!("{base}{INGEST_PATH}"))?,
            hello_url: Url::parse(&format!("{base}{HELLO_PATH}"))?,
        })
    }

    async fn query(&self, text: String) -> ChatResult<String> {
        let response = self
            .client
            .post(self.query_url.clone())
            .json(&QueryRequest { query: &text })
            .send()
            .await
            .map_err(|e| ChatError::Query(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ChatError::Query(format!(
                "query endpoint returned status: {}",
                response.status()
            )));
        }

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Query(e.to_string()))?;
        Ok(body.answer.unwrap_or_default())
    }

    async fn ingest(&self, file: &EncodedFile) -> ChatResult<()> {
        let request = IngestRequest {
            file_name: &file.name,
            content_type: &file.media_type,
            data: &file.data,
        };
        let response = self
            .client
            .post(self.ingest_url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| ChatError::Ingest(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ChatError::Ingest(format!(
                "ingest endpoint returned status: {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn probe(&self) -> ChatResult<String> {
        let response = self
            .client
            .get(self.hello_url.clone())
            .send()
            .await
            .map_err(|e| ChatError::Probe(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ChatError::Probe(format!(
                "hello endpoint returned status: {}",
                response.status()
            )));
        }

        let body: HelloResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Probe(e.to_string()))?;
        Ok(body.message)
    }
}

impl QueryClient for ApiClient {
    fn submit_query(&self, text: &str) -> ClientFuture<'_, ChatResult<String>> {
        Box::pin(self.query(text.to_string()))
    }
}

impl IngestClient for ApiClient {
    fn submit_file<'a>(&'a self, file: &'a EncodedFile) -> ClientFuture<'a, ChatResult<()>> {
        Box::pin(self.ingest(file))
    }
}

impl ProbeClient for ApiClient {
    fn hello(&self) -> ClientFuture<'_, ChatResult<String>> {
        Box::pin(self.probe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type Seen = Arc<Mutex<Vec<Value>>>;

    async fn spawn_server(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client_for(base: &str) -> ApiClient {
        let config = ChatConfig::new()
            .with_api_base(base)
            .with_timeout(Duration::from_secs(5));
        ApiClient::new(&config).unwrap()
    }

    async fn record(State(seen): State<Seen>, Json(body): Json<Value>) -> Json<Value> {
        let question = body["query"].as_str().unwrap_or_default().to_string();
        seen.lock().unwrap().push(body);
        Json(json!({ "answer": format!("echo: {question}") }))
    }

    async fn record_ingest(State(seen): State<Seen>, Json(body): Json<Value>) -> StatusCode {
        seen.lock().unwrap().push(body);
        StatusCode::OK
    }

    #[tokio::test]
    async fn test_query_posts_json_and_reads_answer() {
        let seen = Seen::default();
        let app = Router::new()
            .route("/api/query", post(record))
            .with_state(seen.clone());
        let client = client_for(&spawn_server(app).await);

        let answer = client.submit_query("What is X?").await.unwrap();
        assert_eq!(answer, "echo: What is X?");
        assert_eq!(seen.lock().unwrap()[0], json!({ "query": "What is X?" }));
    }

    #[tokio::test]
    async fn test_missing_answer_is_empty_success() {
        let app = Router::new().route("/api/query", post(|| async { Json(json!({})) }));
        let client = client_for(&spawn_server(app).await);

        assert_eq!(client.submit_query("anything").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_query_server_error_is_query_error() {
        let app = Router::new().route(
            "/api/query",
            post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let client = client_for(&spawn_server(app).await);

        let err = client.submit_query("boom").await.unwrap_err();
        assert!(matches!(err, ChatError::Query(_)));
    }

    #[tokio::test]
    async fn test_slow_backend_times_out_as_query_error() {
        let app = Router::new().route(
            "/api/query",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Json(json!({ "answer": "late" }))
            }),
        );
        let config = ChatConfig::new()
            .with_api_base(spawn_server(app).await)
            .with_timeout(Duration::from_secs(1));
        let client = ApiClient::new(&config).unwrap();

        let err = client.submit_query("slow").await.unwrap_err();
        assert!(matches!(err, ChatError::Query(_)));
    }

    #[tokio::test]
    async fn test_ingest_sends_camel_case_body() {
        let seen = Seen::default();
        let app = Router::new()
            .route("/ingest/webhook", post(record_ingest))
            .with_state(seen.clone());
        let client = client_for(&spawn_server(app).await);

        let file = EncodedFile::from_bytes("report.pdf", "application/pdf", b"%PDF");
        client.submit_file(&file).await.unwrap();

        assert_eq!(
            seen.lock().unwrap()[0],
            json!({
                "fileName": "report.pdf",
                "contentType": "application/pdf",
                "data": "JVBERg==",
            })
        );
    }

    #[tokio::test]
    async fn test_ingest_rejection_is_ingest_error() {
        let app = Router::new().route(
            "/ingest/webhook",
            post(|| async { StatusCode::UNPROCESSABLE_ENTITY }),
        );
        let client = client_for(&spawn_server(app).await);

        let file = EncodedFile::from_bytes("bad.bin", "application/octet-stream", b"\0");
        let err = client.submit_file(&file).await.unwrap_err();
        assert!(matches!(err, ChatError::Ingest(_)));
    }

    #[tokio::test]
    async fn test_hello_and_unreachable_backend() {
        let app = Router::new().route(
            "/hello",
            get(|| async { Json(json!({ "message": "Hello from backend" })) }),
        );
        let client = client_for(&spawn_server(app).await);
        assert_eq!(client.hello().await.unwrap(), "Hello from backend");

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let offline = client_for(&format!("http://{addr}"));
        assert!(matches!(offline.hello().await, Err(ChatError::Probe(_))));
        assert!(matches!(
            offline.submit_query("hi").await,
            Err(ChatError::Query(_))
        ));
    }

    #[test]
    fn test_base_path_prefix_is_kept() {
        let client = client_for("http://localhost:8000/kb/");
        assert_eq!(client.query_url.as_str(), "http://localhost:8000/kb/api/query");
        assert_eq!(client.ingest_url.path(), "/kb/ingest/webhook");
    }
}

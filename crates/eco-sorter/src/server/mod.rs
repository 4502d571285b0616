//! HTTP server for the sorting assistant

pub mod routes;
pub mod state;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::EcoConfig;
use crate::error::{Error, Result};
use state::AppState;

/// Eco-Sorter HTTP server
pub struct EcoSorterServer {
    config: EcoConfig,
    state: AppState,
}

impl EcoSorterServer {
    /// Create a new server, building every component from `config`
    pub async fn new(config: EcoConfig) -> Result<Self> {
        let state = AppState::new(config.clone()).await?;
        Ok(Self { config, state })
    }

    /// Create from an existing state
    pub fn with_state(state: AppState) -> Self {
        Self {
            config: state.config().clone(),
            state,
        }
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let router = Router::new()
            // Health check
            .route("/health", get(health_check))
            .route("/ready", get(readiness))
            // API routes with body limit for multipart uploads
            .nest("/api", routes::api_routes(self.config.server.max_upload_size))
            .with_state(self.state.clone())
            // Middleware layers (order matters - applied bottom to top)
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new());

        if self.config.server.enable_cors {
            router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
        } else {
            router
        }
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        let router = self.build_router();

        tracing::info!("Starting Eco-Sorter server on http://{}", addr);
        tracing::info!("API documentation: http://{}/api/info", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal(self.state.clone()))
            .await
            .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Resolves on Ctrl-C, after marking the server not ready
async fn shutdown_signal(state: AppState) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    state.set_ready(false);
    tracing::info!("Shutdown signal received, draining connections");
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Readiness check endpoint
async fn readiness(state: axum::extract::State<AppState>) -> axum::http::StatusCode {
    if state.is_ready() {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::DocumentRegistry;
    use crate::providers::{EmbeddingProvider, Generation, LlmProvider, SqliteVectorStore};
    use crate::retrieval::VectorStore;
    use crate::types::LlmUsage;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct UnitEmbedder;

    #[async_trait]
    impl EmbeddingProvider for UnitEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        fn dimensions(&self) -> usize {
            2
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "unit"
        }
    }

    struct DownLlm;

    #[async_trait]
    impl LlmProvider for DownLlm {
        async fn generate(&self, _prompt: &str) -> Result<Generation> {
            Err(Error::llm("connection refused"))
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(false)
        }

        fn name(&self) -> &str {
            "down"
        }

        fn model(&self) -> &str {
            "none"
        }
    }

    struct EchoLlm;

    #[async_trait]
    impl LlmProvider for EchoLlm {
        async fn generate(&self, prompt: &str) -> Result<Generation> {
            Ok(Generation {
                text: prompt.to_string(),
                usage: LlmUsage::new(10, 5),
            })
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "echo"
        }

        fn model(&self) -> &str {
            "echo"
        }
    }

    fn state(llm: Arc<dyn LlmProvider>) -> AppState {
        let store = Arc::new(VectorStore::in_memory().unwrap());
        AppState::with_components(
            EcoConfig::default(),
            Arc::new(UnitEmbedder),
            Arc::new(SqliteVectorStore::new(store)),
            llm,
            Arc::new(DocumentRegistry::in_memory()),
            None,
        )
    }

    fn router(llm: Arc<dyn LlmProvider>) -> Router {
        EcoSorterServer::with_state(state(llm)).build_router()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Multipart upload with an optional `region` field and text files
    fn ingest_request(region: Option<&str>, files: &[(&str, &str)]) -> Request<Body> {
        let mut body = String::new();
        if let Some(region) = region {
            body.push_str("--X\r\nContent-Disposition: form-data; name=\"region\"\r\n\r\n");
            body.push_str(region);
            body.push_str("\r\n");
        }
        for (filename, content) in files {
            body.push_str(&format!(
                "--X\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{}\"\r\n\
                 Content-Type: text/plain\r\n\r\n{}\r\n",
                filename, content
            ));
        }
        body.push_str("--X--\r\n");

        Request::builder()
            .method("POST")
            .uri("/api/ingest")
            .header("content-type", "multipart/form-data; boundary=X")
            .body(Body::from(body))
            .unwrap()
    }

    fn ask_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/ask")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_and_ready() {
        let app = router(Arc::new(EchoLlm));
        let response = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_not_ready_during_shutdown() {
        let state = state(Arc::new(EchoLlm));
        let app = EcoSorterServer::with_state(state.clone()).build_router();
        state.set_ready(false);

        let response = app
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_ingest_tags_region_and_skips_reupload() {
        let app = router(Arc::new(EchoLlm));
        let files = [("guide_namur.txt", "Verre : bulles à verre.")];

        let response = app
            .clone()
            .oneshot(ingest_request(Some("namur"), &files))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["total_chunks_created"], 1);
        assert_eq!(body["documents"][0]["region"], "namur");
        assert_eq!(body["documents"][0]["skipped"], false);

        let response = app
            .clone()
            .oneshot(ingest_request(Some("namur"), &files))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["total_chunks_created"], 0);
        assert_eq!(body["documents"][0]["skipped"], true);

        let response = app
            .oneshot(Request::get("/api/regions").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        let namur = body
            .as_array()
            .unwrap()
            .iter()
            .find(|r| r["tag"] == "namur")
            .unwrap();
        assert_eq!(namur["chunk_count"], 1);
    }

    #[tokio::test]
    async fn test_ingest_defaults_to_bruxelles() {
        let app = router(Arc::new(EchoLlm));
        let response = app
            .oneshot(ingest_request(None, &[("guide.txt", "Sac bleu : PMC.")]))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["documents"][0]["region"], "bruxelles");
    }

    #[tokio::test]
    async fn test_ingest_rejects_unknown_region() {
        let app = router(Arc::new(EchoLlm));
        let response = app
            .oneshot(ingest_request(Some("paris"), &[("guide.txt", "Verre.")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ingest_without_files() {
        let app = router(Arc::new(EchoLlm));
        let response = app.oneshot(ingest_request(Some("liege"), &[])).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_and_delete_documents() {
        let app = router(Arc::new(EchoLlm));
        app.clone()
            .oneshot(ingest_request(Some("mons"), &[("guide.txt", "Carton : sac jaune.")]))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(Request::get("/api/documents").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["total_count"], 1);
        let id = body["documents"][0]["id"].as_str().unwrap().to_string();

        let delete = |id: &str| {
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/documents/{}", id))
                .body(Body::empty())
                .unwrap()
        };

        let response = app.clone().oneshot(delete(&id)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["deleted"], true);
        assert_eq!(body["chunks_deleted"], 1);

        let response = app.clone().oneshot(delete(&id)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app.oneshot(delete("not-a-uuid")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_confirm_asks_category_question() {
        let app = router(Arc::new(EchoLlm));
        let confirm = |body: &str| {
            Request::builder()
                .method("POST")
                .uri("/api/classify/confirm")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap()
        };

        let response = app
            .clone()
            .oneshot(confirm(r#"{"category": "garbage", "region": "liege"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["region"], "liege");
        let answer = body["answer"].as_str().unwrap();
        assert!(answer.contains("Où jeter un déchet qui ressemble à une ordure ménagère ?"));

        let response = app
            .oneshot(confirm(r#"{"category": null}"#))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["region"], "bruxelles");
        assert!(body["answer"].as_str().unwrap().contains("Où jeter ce déchet ?"));
    }

    #[tokio::test]
    async fn test_ask_returns_answer_and_metrics() {
        let app = router(Arc::new(EchoLlm));
        let response = app
            .oneshot(ask_request(r#"{"question": "Où va le verre ?", "region": "namur"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["region"], "namur");
        assert_eq!(body["metrics"]["total_tokens"], 15);
        assert!(body["sources"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ask_failure_is_apology() {
        let app = router(Arc::new(DownLlm));
        let response = app
            .oneshot(ask_request(r#"{"question": "Où va le verre ?"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["answer"], crate::agent::APOLOGY);
        assert_eq!(body["metrics"]["total_tokens"], 0);
    }

    #[tokio::test]
    async fn test_unknown_region_is_rejected() {
        let app = router(Arc::new(EchoLlm));
        let response = app
            .oneshot(ask_request(r#"{"question": "Verre ?", "region": "paris"}"#))
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_regions_listing() {
        let app = router(Arc::new(EchoLlm));
        let response = app
            .oneshot(Request::get("/api/regions").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let regions = body.as_array().unwrap();
        assert_eq!(regions.len(), 9);
        assert_eq!(regions[2]["tag"], "antwerp");
        assert_eq!(regions[2]["chunk_count"], 0);
    }

    #[tokio::test]
    async fn test_classify_without_model() {
        let app = router(Arc::new(EchoLlm));
        let request = Request::builder()
            .method("POST")
            .uri("/api/classify")
            .header("content-type", "multipart/form-data; boundary=X")
            .body(Body::from("--X--\r\n"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}

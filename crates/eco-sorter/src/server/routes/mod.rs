//! API routes for the sorting assistant

pub mod ask;
pub mod classify;
pub mod documents;
pub mod ingest;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{delete, get, post},
    Json, Router,
};

use crate::error::Result;
use crate::region::RegionInfo;
use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Document management
        .route("/documents", get(documents::list_documents))
        .route("/documents/:id", delete(documents::delete_document))
        // Ingestion - with larger body limit for file uploads
        .route(
            "/ingest",
            post(ingest::ingest_files).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        // Questions
        .route("/ask", post(ask::ask))
        // Photo classification
        .route(
            "/classify",
            post(classify::classify_image).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/classify/confirm", post(classify::confirm))
        // Info
        .route("/regions", get(regions))
        .route("/info", get(info))
}

/// GET /api/regions - Supported regions with indexed chunk counts
async fn regions(State(state): State<AppState>) -> Result<Json<Vec<RegionInfo>>> {
    Ok(Json(state.region_infos().await?))
}

/// API info endpoint
async fn info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "eco-sorter",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Region-aware waste-sorting assistant grounded in official sorting guides",
        "endpoints": {
            "POST /api/ask": "Ask a sorting question for a region",
            "POST /api/ingest": "Upload sorting guides for a region (multipart, field `region`)",
            "GET /api/documents": "List ingested guides",
            "DELETE /api/documents/:id": "Delete a guide and its chunks",
            "POST /api/classify": "Classify a photo of a waste item",
            "POST /api/classify/confirm": "Ask the follow-up question for a confirmed category",
            "GET /api/regions": "List supported regions"
        }
    }))
}

//! Document management endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{DocumentListResponse, DocumentSummary};

/// GET /api/documents - List ingested guides
pub async fn list_documents(State(state): State<AppState>) -> Json<DocumentListResponse> {
    let documents: Vec<DocumentSummary> = state
        .registry()
        .list()
        .iter()
        .map(DocumentSummary::from)
        .collect();

    Json(DocumentListResponse {
        total_count: documents.len(),
        documents,
    })
}

/// DELETE /api/documents/:id - Remove a guide and its chunks
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let id = Uuid::parse_str(&id)
        .map_err(|_| Error::InvalidRequest(format!("Invalid document id: {}", id)))?;

    let chunks_deleted = state.indexer().delete(&id).await?;

    Ok(Json(serde_json::json!({
        "deleted": true,
        "id": id,
        "chunks_deleted": chunks_deleted,
    })))
}

//! Guide ingestion endpoint

use axum::{
    extract::{Multipart, State},
    Json,
};
use std::time::Instant;

use crate::error::{Error, Result};
use crate::region::Region;
use crate::server::state::AppState;
use crate::types::{DocumentSummary, IngestError, IngestResponse};

/// POST /api/ingest - Upload guides for one region
///
/// Multipart form: a `region` text field (tag or label, default Bruxelles)
/// and one or more file fields.
pub async fn ingest_files(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IngestResponse>> {
    let start = Instant::now();
    let mut region = Region::default();
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidRequest(format!("Failed to read multipart field: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        if name == "region" {
            let value = field
                .text()
                .await
                .map_err(|e| Error::InvalidRequest(format!("Failed to read region: {}", e)))?;
            region = value.parse()?;
            continue;
        }

        let Some(filename) = field.file_name().map(|s| s.to_string()) else {
            tracing::debug!("Ignoring multipart field without filename: {}", name);
            continue;
        };

        let data = field
            .bytes()
            .await
            .map_err(|e| Error::InvalidRequest(format!("Failed to read {}: {}", filename, e)))?;
        files.push((filename, data));
    }

    if files.is_empty() {
        return Err(Error::InvalidRequest("No files uploaded".to_string()));
    }

    let mut documents = Vec::new();
    let mut errors = Vec::new();
    let mut total_chunks = 0u32;

    for (filename, data) in files {
        tracing::info!("Processing file: {} ({} bytes) for {}", filename, data.len(), region);

        match state.indexer().ingest(&filename, &data, region).await {
            Ok(outcome) => {
                total_chunks += outcome.chunks_created();
                let mut summary = DocumentSummary::from(outcome.document());
                summary.skipped = outcome.is_skipped();
                documents.push(summary);
            }
            Err(e) => {
                tracing::warn!("Failed to ingest {}: {}", filename, e);
                errors.push(IngestError {
                    filename,
                    error: e.to_string(),
                });
            }
        }
    }

    let processing_time_ms = start.elapsed().as_millis() as u64;
    tracing::info!(
        "Ingestion completed in {}ms: {} documents, {} chunks, {} errors",
        processing_time_ms,
        documents.len(),
        total_chunks,
        errors.len()
    );

    Ok(Json(IngestResponse {
        success: errors.is_empty(),
        documents,
        total_chunks_created: total_chunks,
        processing_time_ms,
        errors,
    }))
}

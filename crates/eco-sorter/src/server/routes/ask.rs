//! Question endpoint

use axum::{extract::State, Json};

use crate::server::state::AppState;
use crate::types::{AskRequest, AskResponse};

/// POST /api/ask - Answer a sorting question for one region
///
/// Failures are answered with the apology message rather than an HTTP error.
pub async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Json<AskResponse> {
    Json(
        state
            .assistant()
            .ask_or_apologize(&request.question, request.region)
            .await,
    )
}

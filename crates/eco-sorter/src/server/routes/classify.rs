//! Photo classification endpoints

use axum::{
    extract::{Multipart, State},
    Json,
};

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{AskResponse, ClassifyResponse, ConfirmRequest};
use crate::vision::{Prediction, GENERIC_QUESTION};

/// POST /api/classify - Classify the first image in a multipart upload
pub async fn classify_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ClassifyResponse>> {
    let classifier = state
        .classifier()
        .ok_or_else(|| {
            Error::ModelNotFound(state.config().vision.model_path.display().to_string())
        })?
        .clone();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidRequest(format!("Failed to read multipart field: {}", e)))?
    {
        if field.file_name().is_none() {
            continue;
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| Error::InvalidRequest(format!("Failed to read image: {}", e)))?;

        let prediction: Prediction = classifier.classify(&data).await?;
        return Ok(Json(ClassifyResponse::from(prediction)));
    }

    Err(Error::InvalidRequest("No image uploaded".to_string()))
}

/// POST /api/classify/confirm - Ask the canned question for a confirmed category
pub async fn confirm(
    State(state): State<AppState>,
    Json(request): Json<ConfirmRequest>,
) -> Json<AskResponse> {
    let question = request
        .category
        .map(|c| c.follow_up_question())
        .unwrap_or(GENERIC_QUESTION);

    Json(
        state
            .assistant()
            .ask_or_apologize(question, request.region)
            .await,
    )
}

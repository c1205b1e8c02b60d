use crate::dtos::{GenerateRequest, ImageListResponse, ImageResponse};
use crate::startup::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

pub async fn create_generation(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    tracing::info!(model = %request.model, "Generation request received");

    let record = state
        .orchestrator
        .generate(&request.prompt, &request.model)
        .await?;

    Ok((StatusCode::CREATED, Json(ImageResponse::from(record))))
}

pub async fn list_generations(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let records = state
        .metadata
        .list()
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e.to_string())))?;

    let total = records.len();
    let images: Vec<ImageResponse> = records.into_iter().map(ImageResponse::from).collect();

    Ok(Json(ImageListResponse { images, total }))
}

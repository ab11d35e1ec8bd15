use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, State, multipart::MultipartRejection},
    response::Html,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::ClassifyError;
use crate::postprocess::{Prediction, PredictionResult};

use super::error::Result;
use super::state::AppState;

const UPLOAD_FIELD: &str = "file";
const UPLOAD_PAGE: &str = include_str!("../../templates/upload.html");

#[derive(Debug, Serialize)]
pub struct PredictionBody {
    pub class_id: String,
    pub name: String,
    /// Percentage in `[0, 100]`.
    pub confidence: f32,
}

impl From<Prediction> for PredictionBody {
    fn from(p: Prediction) -> Self {
        Self {
            class_id: p.class_id,
            name: p.name,
            confidence: p.confidence * 100.0,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub success: bool,
    pub predictions: Vec<PredictionBody>,
}

impl From<PredictionResult> for PredictResponse {
    fn from(result: PredictionResult) -> Self {
        Self {
            success: true,
            predictions: result.predictions.into_iter().map(PredictionBody::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model: String,
    pub cors_enabled: bool,
    pub allowed_origins: Vec<String>,
    pub version: &'static str,
    pub started_at: DateTime<Utc>,
}

pub async fn serve_index() -> Html<&'static str> {
    Html(UPLOAD_PAGE)
}

pub async fn predict(
    State(state): State<Arc<AppState>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictResponse>> {
    let mut multipart = multipart.map_err(|e| ClassifyError::Input(e.body_text()))?;
    let (file_name, data) = read_upload(&mut multipart).await?;
    info!(file_name = %file_name, bytes = data.len(), "Received image");

    let classifier = Arc::clone(&state.classifier);
    let top_k = state.config.top_k;
    let t = Instant::now();
    let result = tokio::task::spawn_blocking(move || classifier.classify(&data, top_k))
        .await
        .map_err(|e| ClassifyError::Inference(e.to_string()))??;
    info!(
        file_name = %file_name,
        top = result.top().map(|p| p.name.as_str()).unwrap_or_default(),
        elapsed = ?t.elapsed(),
        "Prediction complete"
    );

    Ok(Json(PredictResponse::from(result)))
}

/// Returns the name and contents of the `file` field.
async fn read_upload(multipart: &mut Multipart) -> std::result::Result<(String, Bytes), ClassifyError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ClassifyError::Input(e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ClassifyError::Input(e.body_text()))?;
        return Ok((file_name, data));
    }
    Err(ClassifyError::Input(format!(
        "no file uploaded; expected a multipart field named \"{}\"",
        UPLOAD_FIELD
    )))
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        model: state.classifier.model_name().to_string(),
        cors_enabled: true,
        allowed_origins: state.config.allowed_origins.clone(),
        version: env!("CARGO_PKG_VERSION"),
        started_at: state.started_at,
    })
}

use std::{path::Path, sync::Arc};

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::{
    category::Instruction,
    error::AppError,
    labels::LabelSet,
    model::{Classifier, ModelError, Prediction},
    preprocess::{encode_jpeg, preprocess},
};

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Read-only state shared by every request.
pub struct AppState {
    pub classifier: Arc<dyn Classifier>,
    pub labels: LabelSet,
    pub jpeg_quality: u8,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct PredictionResponse {
    pub class_name: String,
    pub confidence_score: f32,
    pub class_text: String,
    /// Base64 JPEG of the cropped model input.
    pub image: String,
}

pub fn router(state: Arc<AppState>, body_limit_bytes: usize, static_dir: &Path) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/upload", post(upload_handler))
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .with_state(state)
        .route("/health", get(health_check))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "OK" }))
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::TooLarge
    } else {
        AppError::Multipart(err.to_string())
    }
}

async fn upload_handler(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictionResponse>, AppError> {
    // Not a multipart body at all means there is no file either
    let mut multipart = multipart.map_err(|_| AppError::MissingUpload)?;
    let mut image_data = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(multipart_error)?
    {
        // Plain form values are not files, same as a missing upload
        if field.name() == Some("image") && field.file_name().is_some() {
            image_data = field
                .bytes()
                .await
                .map_err(multipart_error)?
                .to_vec();
            break;
        }
    }

    if image_data.is_empty() {
        return Err(AppError::MissingUpload);
    }

    let response = tokio::task::spawn_blocking(move || classify(&state, &image_data)).await??;
    Ok(Json(response))
}

fn classify(state: &AppState, image_data: &[u8]) -> Result<PredictionResponse, AppError> {
    let prepared = preprocess(image_data)?;

    let probabilities = state.classifier.predict(&prepared.tensor)?;
    let mismatch = ModelError::OutputMismatch {
        expected: state.labels.len(),
        actual: probabilities.len(),
    };
    if probabilities.len() != state.labels.len() {
        return Err(mismatch.into());
    }

    let prediction = Prediction::from_probabilities(&probabilities)?;
    let label = state.labels.get(prediction.index).ok_or(mismatch)?;
    let instruction = Instruction::lookup(&label.name);
    let known = instruction != Instruction::Unknown;

    tracing::info!(
        label = %label.line,
        confidence = prediction.confidence,
        known,
        "prediction"
    );

    let jpeg = encode_jpeg(&prepared.rgb, state.jpeg_quality)?;

    Ok(PredictionResponse {
        class_name: label.line.clone(),
        confidence_score: prediction.confidence,
        class_text: instruction.text().to_string(),
        image: STANDARD.encode(jpeg),
    })
}

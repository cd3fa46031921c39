//! Session routes: frame analysis, reset, pattern analysis

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use classifier::DisplayColor;
use ensemble::{detect_and_fuse, EnsembleError, Prediction};
use event_sync::EmotionEvent;
use face_frame::{BoundingBox, FaceImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use wellbeing::{Insight, LabelShare};

use crate::{ApiError, SharedState};

/// Agreement above this is reported as "High"
const HIGH_AGREEMENT: f32 = 0.7;

#[derive(Debug, Deserialize)]
pub struct FrameQuery {
    /// Overrides the server's smoothing default
    pub smoothing: Option<bool>,
}

/// Top label of one member
#[derive(Debug, Serialize)]
pub struct ModelVote {
    pub model: String,
    pub label: String,
    pub confidence: f32,
}

#[derive(Debug, Serialize)]
pub struct FaceResult {
    pub bbox: BoundingBox,
    pub label: String,
    pub confidence: f32,
    pub smoothed: bool,
    pub agreement: &'static str,
    pub agreement_score: f32,
    pub models: Vec<ModelVote>,
    pub color: DisplayColor,
    pub suggestion: &'static str,
}

#[derive(Debug, Serialize)]
pub struct FrameResponse {
    pub session: String,
    pub faces: Vec<FaceResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub latency_ms: u64,
}

/// Decode an uploaded image, detect faces, fuse and smooth each one
pub async fn post_frame(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
    Query(params): Query<FrameQuery>,
    body: Bytes,
) -> Result<Json<FrameResponse>, ApiError> {
    let start = Instant::now();
    let use_smoothing = params.smoothing.unwrap_or(state.smoothing_default);
    metrics::counter!("fer_frames_total").increment(1);

    if body.is_empty() {
        return Err(ApiError::BadRequest("request body must contain an image".to_string()));
    }

    let engine = Arc::clone(&state.engine);
    let detector = Arc::clone(&state.detector);
    let task = tokio::task::spawn_blocking(move || -> Result<_, ApiError> {
        let frame = FaceImage::decode(&body)?;
        Ok(detect_and_fuse(detector.as_ref(), &engine, &frame)?)
    });

    // History is only touched once fusion has finished in time
    let fused = match tokio::time::timeout(state.timeout, task).await {
        Err(_) => {
            metrics::counter!("fer_timeouts_total").increment(1);
            return Err(EnsembleError::Timeout(state.timeout.as_millis() as u64).into());
        }
        Ok(Err(e)) => return Err(ApiError::Internal(format!("frame worker failed: {}", e))),
        Ok(Ok(result)) => result?,
    };

    if fused.is_empty() {
        metrics::counter!("fer_no_face_total").increment(1);
        return Ok(Json(FrameResponse {
            session: session_id,
            faces: Vec::new(),
            message: Some("No face detected".to_string()),
            latency_ms: start.elapsed().as_millis() as u64,
        }));
    }

    let session = state.sessions.get_or_create(&session_id).await;
    let predictions: Vec<(BoundingBox, Prediction)> = {
        let mut ensemble = session.lock().await;
        fused
            .into_iter()
            .map(|(bbox, fused)| (bbox, ensemble.smooth(fused, use_smoothing)))
            .collect()
    };

    let faces: Vec<FaceResult> = predictions
        .iter()
        .map(|(bbox, prediction)| face_result(&state, *bbox, prediction))
        .collect();

    if let (Some(publisher), Some(first)) = (state.publisher.as_ref(), faces.first()) {
        if publisher.is_connected() {
            let event = EmotionEvent::now(
                &session_id,
                &first.label,
                first.confidence,
                first.agreement_score,
                first.bbox,
            );
            if let Err(e) = publisher.publish(&event).await {
                warn!("Failed to publish event for '{}': {}", session_id, e);
            }
        }
    }

    let latency_ms = start.elapsed().as_millis() as u64;
    metrics::histogram!("fer_inference_latency_ms").record(latency_ms as f64);
    for face in &faces {
        metrics::counter!("fer_predictions_total", "label" => face.label.clone()).increment(1);
    }
    debug!("Session '{}': {} face(s) in {}ms", session_id, faces.len(), latency_ms);

    Ok(Json(FrameResponse {
        session: session_id,
        faces,
        message: None,
        latency_ms,
    }))
}

fn face_result(state: &SharedState, bbox: BoundingBox, prediction: &Prediction) -> FaceResult {
    let labels = state.engine.labels();
    let models = prediction
        .fused
        .individual
        .iter()
        .map(|score| {
            let top = score.probabilities.argmax();
            ModelVote {
                model: score.model.clone(),
                label: top.and_then(|i| labels.name(i)).unwrap_or_default().to_string(),
                confidence: top.and_then(|i| score.probabilities.get(i)).unwrap_or(0.0),
            }
        })
        .collect();

    let agreement = prediction.agreement();
    FaceResult {
        bbox,
        label: prediction.label.clone(),
        confidence: prediction.confidence,
        smoothed: prediction.smoothed,
        agreement: if agreement > HIGH_AGREEMENT { "High" } else { "Moderate" },
        agreement_score: agreement,
        models,
        color: state.engine.color_for(&prediction.label),
        suggestion: state.advisor.suggestion(&prediction.label),
    }
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub session: String,
    pub reset: bool,
}

/// Clear a session's smoothing history
pub async fn post_reset(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Result<Json<ResetResponse>, ApiError> {
    let session = state
        .sessions
        .get(&session_id)
        .await
        .ok_or_else(|| ApiError::SessionNotFound(session_id.clone()))?;
    session.lock().await.reset();

    Ok(Json(ResetResponse {
        session: session_id,
        reset: true,
    }))
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub session: String,
    pub history_len: usize,
    pub dominant: Option<String>,
    pub distribution: Vec<LabelShare>,
    pub insight: Option<Insight>,
    pub report: String,
    pub daily_tip: &'static str,
}

/// Emotional pattern analysis over the session's recent history
pub async fn get_analysis(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let session = state
        .sessions
        .get(&session_id)
        .await
        .ok_or_else(|| ApiError::SessionNotFound(session_id.clone()))?;
    let history = session.lock().await.history_labels();

    let analysis = state.advisor.analyze(&history);
    Ok(Json(AnalysisResponse {
        session: session_id,
        history_len: history.len(),
        report: analysis.render(),
        dominant: analysis.dominant,
        distribution: analysis.distribution,
        insight: analysis.insight,
        daily_tip: state.advisor.daily_tip(),
    }))
}

/// Drop a session and its history
pub async fn delete_session(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !state.sessions.remove(&session_id).await {
        return Err(ApiError::SessionNotFound(session_id));
    }
    if let Some(publisher) = &state.publisher {
        publisher.forget(&session_id);
    }
    Ok(StatusCode::NO_CONTENT)
}

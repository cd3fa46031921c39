use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use api::{create_router, AppState, RateLimitConfig, SessionLimits};
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode},
    Router,
};
use classifier::{Classifier, ClassifierError, LabelSet, MockClassifier, ProbabilityVector};
use ensemble::{EnsembleMember, FusionEngine};
use face_frame::{BoundingBox, FaceDetector, FaceImage, FrameError, WholeFrameDetector};
use ndarray::Array4;
use preprocess::{GrayscalePreprocessor, RgbPreprocessor};
use serde_json::Value;
use tower::ServiceExt;

const MAX_BODY: usize = 1024 * 1024;

struct NoFaces;

impl FaceDetector for NoFaces {
    fn detect(&self, _frame: &FaceImage) -> Result<Vec<BoundingBox>, FrameError> {
        Ok(Vec::new())
    }
}

struct SlowClassifier {
    labels: LabelSet,
}

impl Classifier for SlowClassifier {
    fn name(&self) -> &str {
        "slow"
    }

    fn labels(&self) -> &LabelSet {
        &self.labels
    }

    fn score(&self, _input: &Array4<f32>) -> Result<ProbabilityVector, ClassifierError> {
        std::thread::sleep(Duration::from_millis(300));
        Ok(ProbabilityVector::new(vec![1.0, 0.0]))
    }
}

fn ab() -> LabelSet {
    LabelSet::new(["Happy", "Sad"]).unwrap()
}

/// fer says Happy, transfer says Sad; fused 0.4*0.9+0.6*0.2 = 0.48 vs 0.52
fn engine() -> Arc<FusionEngine> {
    let engine = FusionEngine::builder(ab())
        .member(EnsembleMember::new(
            "fer",
            "FER2013",
            0.4,
            Box::new(GrayscalePreprocessor::new(8)),
            Box::new(MockClassifier::fixed("fer", ab(), vec![0.9, 0.1])),
        ))
        .member(EnsembleMember::new(
            "transfer",
            "ImageNet+FER2013",
            0.6,
            Box::new(RgbPreprocessor::new(8)),
            Box::new(MockClassifier::fixed("transfer", ab(), vec![0.2, 0.8])),
        ))
        .build()
        .unwrap();
    Arc::new(engine)
}

fn app_with(state: AppState) -> Router {
    create_router(Arc::new(state), &RateLimitConfig::disabled(), MAX_BODY)
}

fn app() -> Router {
    app_with(AppState::new(engine(), Arc::new(WholeFrameDetector)))
}

fn png() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(24, 24, image::Rgb([120, 90, 60]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn frame_request(session: &str, query: &str, body: Vec<u8>) -> Request<Body> {
    let mut req = Request::builder()
        .method("POST")
        .uri(format!("/api/v1/sessions/{}/frame{}", session, query))
        .header("content-type", "image/png")
        .body(Body::from(body))
        .unwrap();
    req.extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))));
    req
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_health_and_ensemble_info() {
    let app = app();

    let (status, body) = send(&app, get("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["models"], 2);

    let (status, body) = send(&app, get("/api/v1/ensemble")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["models"][0], "fer");
    assert_eq!(body["datasets"][1], "ImageNet+FER2013");
}

#[tokio::test]
async fn test_frame_returns_fused_face() {
    let app = app();
    let (status, body) = send(&app, frame_request("alice", "?smoothing=false", png())).await;

    assert_eq!(status, StatusCode::OK);
    let face = &body["faces"][0];
    assert_eq!(face["label"], "Sad");
    assert!((face["confidence"].as_f64().unwrap() - 0.52).abs() < 1e-5);
    assert_eq!(face["agreement"], "Moderate");
    assert_eq!(face["models"][0]["label"], "Happy");
    assert_eq!(face["models"][1]["label"], "Sad");
    assert_eq!(face["bbox"]["x2"], 24);
    assert!(face["suggestion"].as_str().is_some_and(|s| !s.is_empty()));
}

#[tokio::test]
async fn test_no_face_response() {
    let app = app_with(AppState::new(engine(), Arc::new(NoFaces)));
    let (status, body) = send(&app, frame_request("alice", "", png())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["faces"].as_array().map(Vec::len), Some(0));
    assert_eq!(body["message"], "No face detected");

    // nothing was observed, so no session exists
    let (status, _) = send(&app, get("/api/v1/sessions/alice/analysis")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bad_payloads_rejected() {
    let app = app();

    let (status, _) = send(&app, frame_request("alice", "", Vec::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, frame_request("alice", "", b"not an image".to_vec())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let app = app();

    for _ in 0..6 {
        let (status, _) = send(&app, frame_request("alice", "", png())).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (_, body) = send(&app, frame_request("bob", "", png())).await;
    assert_eq!(body["faces"][0]["smoothed"], false);

    let (_, alice) = send(&app, get("/api/v1/sessions/alice/analysis")).await;
    let (_, bob) = send(&app, get("/api/v1/sessions/bob/analysis")).await;
    assert_eq!(alice["history_len"], 6);
    assert_eq!(bob["history_len"], 1);
    assert_eq!(alice["dominant"], "Sad");
    assert_eq!(alice["insight"]["kind"], "persistent");
}

#[tokio::test]
async fn test_reset_and_delete() {
    let app = app();
    for _ in 0..5 {
        send(&app, frame_request("alice", "", png())).await;
    }

    let reset = Request::builder()
        .method("POST")
        .uri("/api/v1/sessions/alice/reset")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, reset).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, get("/api/v1/sessions/alice/analysis")).await;
    assert_eq!(body["history_len"], 0);
    assert_eq!(body["report"], "Insufficient data for analysis.");

    let delete = || {
        Request::builder()
            .method("DELETE")
            .uri("/api/v1/sessions/alice")
            .body(Body::empty())
            .unwrap()
    };
    let (status, _) = send(&app, delete()).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, delete()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_session_reset_is_404() {
    let reset = Request::builder()
        .method("POST")
        .uri("/api/v1/sessions/ghost/reset")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app(), reset).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("ghost"));
}

#[tokio::test]
async fn test_timeout_leaves_no_history() {
    let engine = FusionEngine::builder(ab())
        .member(EnsembleMember::new(
            "fast",
            "d",
            0.5,
            Box::new(GrayscalePreprocessor::new(8)),
            Box::new(MockClassifier::fixed("fast", ab(), vec![0.9, 0.1])),
        ))
        .member(EnsembleMember::new(
            "slow",
            "d",
            0.5,
            Box::new(GrayscalePreprocessor::new(8)),
            Box::new(SlowClassifier { labels: ab() }),
        ))
        .build()
        .unwrap();
    let state = AppState::new(Arc::new(engine), Arc::new(WholeFrameDetector))
        .with_timeout(Duration::from_millis(20));
    let app = app_with(state);

    let (status, _) = send(&app, frame_request("alice", "", png())).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);

    let (status, _) = send(&app, get("/api/v1/sessions/alice/analysis")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_frame_route_is_rate_limited() {
    let limit = RateLimitConfig {
        enabled: true,
        per_second: 60,
        burst_size: 2,
    };
    let app = create_router(
        Arc::new(AppState::new(engine(), Arc::new(WholeFrameDetector))),
        &limit,
        MAX_BODY,
    );

    for _ in 0..2 {
        let (status, _) = send(&app, frame_request("alice", "", png())).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _) = send(&app, frame_request("alice", "", png())).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    // other routes are not limited
    let (status, _) = send(&app, get("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_metrics_disabled_without_recorder() {
    let response = app().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_session_count_is_capped() {
    let limits = SessionLimits {
        max_sessions: 2,
        idle_timeout: Duration::from_secs(3600),
    };
    let state = AppState::new(engine(), Arc::new(WholeFrameDetector)).with_session_limits(limits);
    let app = app_with(state);

    for id in ["s1", "s2", "s3", "s4", "s5"] {
        let (status, _) = send(&app, frame_request(id, "", png())).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, health) = send(&app, get("/api/v1/health")).await;
    assert_eq!(health["sessions"], 2);

    let (status, _) = send(&app, get("/api/v1/sessions/s1/analysis")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = send(&app, get("/api/v1/sessions/s5/analysis")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["history_len"], 1);
}

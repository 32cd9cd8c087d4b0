//! Integration tests for the prediction server endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use indexmap::IndexMap;
use ndarray::{Array2, ArrayView2};
use precept_lib::{
    health::{components, HealthRegistry, MAX_CONSECUTIVE_FAILURES},
    observability::PreceptMetrics,
    transform::{ColumnStats, NormalizationStats, ScaleRange},
    ColumnSpec, ModelMetadata, ModelRuntime, PreceptError, Predictor, ServingFacade,
};
use precept_server::api::{create_router, AppState};
use std::sync::Arc;
use tower::ServiceExt;

/// Emits the middle of the scaled range for every output
struct Halves;

impl ModelRuntime for Halves {
    fn infer(&self, batch: ArrayView2<'_, f64>) -> precept_lib::Result<Array2<f64>> {
        Ok(Array2::from_elem((batch.nrows(), 3), 0.5))
    }

    fn kind(&self) -> &'static str {
        "halves"
    }
}

struct Broken;

impl ModelRuntime for Broken {
    fn infer(&self, _batch: ArrayView2<'_, f64>) -> precept_lib::Result<Array2<f64>> {
        Err(PreceptError::Inference("graph execution failed".to_string()))
    }

    fn kind(&self) -> &'static str {
        "broken"
    }
}

fn metadata() -> ModelMetadata {
    let col = |name: &str| ColumnStats {
        name: name.into(),
        min: 0.0,
        max: 2.0,
        lambda: None,
    };
    let spec = ColumnSpec::new(&["W", "L", "Vgs"], &["vdsat", "id", "gm"], &[], &[]).unwrap();
    let stats = NormalizationStats::from_parts(
        vec![col("W"), col("L"), col("Vgs")],
        vec![col("vdsat"), col("id"), col("gm")],
        ScaleRange::default(),
    )
    .unwrap();
    ModelMetadata::new(Arc::new(spec), Arc::new(stats)).unwrap()
}

async fn setup_test_app(runtime: Arc<dyn ModelRuntime>) -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::MODEL).await;

    let facade = Arc::new(ServingFacade::new(Arc::new(Predictor::new(
        runtime,
        metadata(),
    ))));
    let state = Arc::new(AppState::new(
        facade,
        health_registry,
        PreceptMetrics::new(),
    ));
    let router = create_router(state.clone());

    (router, state)
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

#[tokio::test]
async fn test_predict_returns_outputs_in_declared_order() {
    let (app, _state) = setup_test_app(Arc::new(Halves)).await;

    let response = app
        .oneshot(post_json(
            "/predict",
            r#"{"Vgs": [0.6, 0.9], "L": [1e-6, 1e-6], "W": [1e-6, 2e-6]}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_bytes(response).await;
    let out: IndexMap<String, Vec<f64>> = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        out.keys().collect::<Vec<_>>(),
        vec!["vdsat", "id", "gm"]
    );
    assert_eq!(out["id"], vec![1.0, 1.0]);
}

#[tokio::test]
async fn test_predict_missing_column_is_bad_request() {
    let (app, _state) = setup_test_app(Arc::new(Halves)).await;

    let response = app
        .oneshot(post_json("/predict", r#"{"W": [1e-6], "L": [1e-6]}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["error"], "client");
    assert!(body["message"].as_str().unwrap().contains("Vgs"));
}

#[tokio::test]
async fn test_predict_malformed_json_is_bad_request() {
    let (app, _state) = setup_test_app(Arc::new(Halves)).await;

    let response = app
        .oneshot(post_json("/predict", r#"{"W": [1e-6"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["error"], "client");
}

#[tokio::test]
async fn test_predict_model_failure_is_server_error() {
    let (app, _state) = setup_test_app(Arc::new(Broken)).await;

    let response = app
        .oneshot(post_json(
            "/predict",
            r#"{"W": [1e-6], "L": [1e-6], "Vgs": [0.6]}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["error"], "server");
}

#[tokio::test]
async fn test_columns_lists_inputs_and_outputs() {
    let (app, _state) = setup_test_app(Arc::new(Halves)).await;

    let response = app.oneshot(get("/columns")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["inputs"], serde_json::json!(["W", "L", "Vgs"]));
    assert_eq!(body["outputs"], serde_json::json!(["vdsat", "id", "gm"]));
}

const VALID_ROW: &str = r#"{"W": [1e-6], "L": [1e-6], "Vgs": [0.6]}"#;

async fn health_json(app: &Router) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(get("/healthz")).await.unwrap();
    let status = response.status();
    let body = serde_json::from_slice(&body_bytes(response).await).unwrap();
    (status, body)
}

#[tokio::test]
async fn test_healthz_returns_ok_when_degraded() {
    let (app, _state) = setup_test_app(Arc::new(Broken)).await;

    let response = app
        .clone()
        .oneshot(post_json("/predict", VALID_ROW))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let (status, health) = health_json(&app).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "degraded");
    assert!(health["components"]["model"]["message"]
        .as_str()
        .unwrap()
        .contains("graph execution failed"));
}

#[tokio::test]
async fn test_repeated_model_failures_make_server_unhealthy() {
    let (app, state) = setup_test_app(Arc::new(Broken)).await;
    state.health_registry.set_ready(true).await;

    for _ in 0..MAX_CONSECUTIVE_FAILURES {
        let response = app
            .clone()
            .oneshot(post_json("/predict", VALID_ROW))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    let (status, health) = health_json(&app).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["status"], "unhealthy");

    let response = app.oneshot(get("/readyz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_bad_requests_leave_model_healthy() {
    let (app, _state) = setup_test_app(Arc::new(Halves)).await;

    for _ in 0..MAX_CONSECUTIVE_FAILURES + 1 {
        let response = app
            .clone()
            .oneshot(post_json("/predict", r#"{"W": [1e-6]}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let (status, health) = health_json(&app).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
async fn test_readyz_follows_model_load() {
    let (app, state) = setup_test_app(Arc::new(Halves)).await;

    let response = app.clone().oneshot(get("/readyz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    state.health_registry.set_ready(true).await;

    let response = app.oneshot(get("/readyz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let readiness: serde_json::Value =
        serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_metrics_returns_prometheus_format() {
    let (app, _state) = setup_test_app(Arc::new(Halves)).await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/predict",
            r#"{"W": [1e-6], "L": [1e-6], "Vgs": [0.6]}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let text = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(text.contains("precept_predictions_total"));
}

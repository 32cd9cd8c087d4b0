//! HTTP API for predictions, health checks and Prometheus metrics

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use precept_lib::{
    health::{ComponentStatus, HealthRegistry, PredictionOutcome},
    observability::PreceptMetrics,
    serving::{FailureClass, ServeError},
    ServingFacade,
};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub facade: Arc<ServingFacade>,
    pub health_registry: HealthRegistry,
    pub metrics: PreceptMetrics,
}

impl AppState {
    pub fn new(
        facade: Arc<ServingFacade>,
        health_registry: HealthRegistry,
        metrics: PreceptMetrics,
    ) -> Self {
        Self {
            facade,
            health_registry,
            metrics,
        }
    }
}

fn error_response(err: ServeError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(err.body())).into_response()
}

/// Predict outputs for a JSON object of input columns
async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            let err = ServeError::BadRequest(rejection.body_text());
            state.metrics.inc_request_failure(err.class().as_str());
            return error_response(err);
        }
    };

    let facade = state.facade.clone();
    let start = Instant::now();
    let result = match tokio::task::spawn_blocking(move || facade.handle(&payload)).await {
        Ok(result) => result,
        Err(join_error) => {
            error!(error = %join_error, "Prediction task failed");
            Err(ServeError::Internal("prediction task failed".to_string()))
        }
    };

    match result {
        Ok(frame) => {
            let outcome = PredictionOutcome::Served {
                elapsed: start.elapsed(),
            };
            state.health_registry.record_prediction(outcome).await;
            (StatusCode::OK, Json(frame)).into_response()
        }
        Err(err) => {
            if err.class() == FailureClass::Server {
                let outcome = PredictionOutcome::Failed {
                    message: err.message().to_string(),
                };
                state.health_registry.record_prediction(outcome).await;
            }
            error_response(err)
        }
    }
}

/// Input and output column names of the served model
async fn columns(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.facade.describe())
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/columns", get(columns))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server and run until `shutdown` resolves
pub async fn serve<F>(addr: &str, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

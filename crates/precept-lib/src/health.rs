//! Health of the served model for the liveness and readiness endpoints
//!
//! The model component is registered healthy once loading succeeds. After
//! that, every prediction that reaches the model reports back through
//! [`HealthRegistry::record_prediction`]: slow answers degrade the model,
//! a run of consecutive server-side failures marks it unhealthy, and the
//! next fast success restores it. Requests rejected for bad input say
//! nothing about the model and are not recorded.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Request latency above which the model is reported degraded
pub const SLOW_PREDICTION: Duration = Duration::from_millis(500);

/// Consecutive server-side failures before the model is reported unhealthy
pub const MAX_CONSECUTIVE_FAILURES: u32 = 5;

/// Component names for health tracking
pub mod components {
    pub const MODEL: &str = "model";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Still serving, but something needs attention
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    pub fn is_operational(&self) -> bool {
        !matches!(self, ComponentStatus::Unhealthy)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn new(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// What one prediction that reached the model did
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionOutcome {
    Served { elapsed: Duration },
    Failed { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status among the components, healthy when there are none
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|c| c.status)
            .max_by_key(|status| match status {
                ComponentStatus::Healthy => 0,
                ComponentStatus::Degraded => 1,
                ComponentStatus::Unhealthy => 2,
            })
            .unwrap_or(ComponentStatus::Healthy)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Shared registry of component health
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<AtomicBool>,
    failure_streak: Arc<AtomicU32>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component as healthy
    pub async fn register(&self, name: &str) {
        self.set(name, ComponentStatus::Healthy, None).await;
    }

    async fn set(&self, name: &str, status: ComponentStatus, message: Option<String>) {
        self.components
            .write()
            .await
            .insert(name.to_string(), ComponentHealth::new(status, message));
    }

    /// Fold one prediction into the model component's health
    pub async fn record_prediction(&self, outcome: PredictionOutcome) {
        match outcome {
            PredictionOutcome::Served { elapsed } => {
                self.failure_streak.store(0, Ordering::Relaxed);
                let (status, message) = if elapsed > SLOW_PREDICTION {
                    let message = format!(
                        "prediction took {}ms, target {}ms",
                        elapsed.as_millis(),
                        SLOW_PREDICTION.as_millis()
                    );
                    (ComponentStatus::Degraded, Some(message))
                } else {
                    (ComponentStatus::Healthy, None)
                };
                self.set(components::MODEL, status, message).await;
            }
            PredictionOutcome::Failed { message } => {
                let streak = self.failure_streak.fetch_add(1, Ordering::Relaxed) + 1;
                let (status, message) = if streak >= MAX_CONSECUTIVE_FAILURES {
                    let message =
                        format!("{} consecutive prediction failures, last: {}", streak, message);
                    (ComponentStatus::Unhealthy, message)
                } else {
                    (ComponentStatus::Degraded, format!("prediction failed: {}", message))
                };
                self.set(components::MODEL, status, Some(message)).await;
            }
        }
    }

    pub async fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let reason = if !self.ready.load(Ordering::Acquire) {
            Some("Model not loaded yet")
        } else if !self.health().await.status.is_operational() {
            Some("Model unhealthy")
        } else {
            None
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason: reason.map(String::from),
        }
    }
}

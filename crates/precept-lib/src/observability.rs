//! Observability infrastructure for training and serving
//!
//! Provides:
//! - Prometheus metrics (prediction latency, rows predicted, failures by class, epoch losses)
//! - Structured event logging with tracing

use prometheus::{
    register_gauge, register_gauge_vec, register_histogram, register_int_counter,
    register_int_counter_vec, Encoder, Gauge, GaugeVec, Histogram, IntCounter, IntCounterVec,
    TextEncoder,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
];

/// Global metrics instance, `None` if registration failed
static GLOBAL_METRICS: OnceLock<Option<MetricsInner>> = OnceLock::new();

struct MetricsInner {
    prediction_latency_seconds: Histogram,
    predictions: IntCounter,
    rows_predicted: IntCounter,
    request_failures: IntCounterVec,
    epoch_train_loss: Gauge,
    epoch_test_loss: Gauge,
    epochs_completed: IntCounter,
    model_info: GaugeVec,
}

impl MetricsInner {
    fn register() -> prometheus::Result<Self> {
        Ok(Self {
            prediction_latency_seconds: register_histogram!(
                "precept_prediction_latency_seconds",
                "Time spent transforming, inferring and inverse transforming one batch",
                LATENCY_BUCKETS.to_vec()
            )?,
            predictions: register_int_counter!(
                "precept_predictions_total",
                "Total number of prediction calls"
            )?,
            rows_predicted: register_int_counter!(
                "precept_rows_predicted_total",
                "Total number of operating points predicted"
            )?,
            request_failures: register_int_counter_vec!(
                "precept_request_failures_total",
                "Failed prediction requests by failure class",
                &["class"]
            )?,
            epoch_train_loss: register_gauge!(
                "precept_epoch_train_loss",
                "Mean training loss of the last completed epoch"
            )?,
            epoch_test_loss: register_gauge!(
                "precept_epoch_test_loss",
                "Test loss after the last completed epoch"
            )?,
            epochs_completed: register_int_counter!(
                "precept_epochs_completed_total",
                "Total number of training epochs completed"
            )?,
            model_info: register_gauge_vec!(
                "precept_model_info",
                "Information about the currently loaded model",
                &["name", "kind"]
            )?,
        })
    }
}

/// Handle to the process-wide Prometheus metrics.
///
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct PreceptMetrics {
    _private: (),
}

impl Default for PreceptMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PreceptMetrics {
    /// Create a new metrics handle (registers global metrics on first call)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(|| match MetricsInner::register() {
            Ok(inner) => Some(inner),
            Err(e) => {
                warn!(error = %e, "Metrics registration failed, metrics disabled");
                None
            }
        });
        Self { _private: () }
    }

    fn inner(&self) -> Option<&MetricsInner> {
        GLOBAL_METRICS.get().and_then(Option::as_ref)
    }

    /// Record one prediction call over `rows` rows
    pub fn observe_prediction(&self, duration_secs: f64, rows: usize) {
        if let Some(m) = self.inner() {
            m.prediction_latency_seconds.observe(duration_secs);
            m.predictions.inc();
            m.rows_predicted.inc_by(rows as u64);
        }
    }

    /// Count a failed request under its failure class
    pub fn inc_request_failure(&self, class: &str) {
        if let Some(m) = self.inner() {
            m.request_failures.with_label_values(&[class]).inc();
        }
    }

    pub fn set_epoch_loss(&self, train_loss: f64, test_loss: Option<f64>) {
        if let Some(m) = self.inner() {
            m.epochs_completed.inc();
            m.epoch_train_loss.set(train_loss);
            if let Some(test_loss) = test_loss {
                m.epoch_test_loss.set(test_loss);
            }
        }
    }

    /// Update loaded model info
    pub fn set_model(&self, name: &str, kind: &str) {
        if let Some(m) = self.inner() {
            m.model_info.reset();
            m.model_info.with_label_values(&[name, kind]).set(1.0);
        }
    }

    /// Render every registered metric in the Prometheus text format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&prometheus::gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Structured logger for pipeline events
#[derive(Clone)]
pub struct EventLogger {
    component: String,
}

impl EventLogger {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }

    pub fn training_started(&self, train_rows: usize, test_rows: usize, epochs: usize) {
        info!(
            event = "training_started",
            component = %self.component,
            train_rows,
            test_rows,
            epochs,
            "Training started"
        );
    }

    pub fn epoch_completed(&self, epoch: usize, train_loss: f64, test_loss: Option<f64>) {
        info!(
            event = "epoch_completed",
            component = %self.component,
            epoch,
            train_loss,
            test_loss = ?test_loss,
            "Epoch completed"
        );
    }

    pub fn model_exported(&self, model_path: &str, sidecar_path: &str, sha256: &str) {
        info!(
            event = "model_exported",
            component = %self.component,
            model_path = %model_path,
            sidecar_path = %sidecar_path,
            sha256 = %sha256,
            "Model and metadata written"
        );
    }

    pub fn model_loaded(&self, model_path: &str, kind: &str, num_x: usize, num_y: usize) {
        info!(
            event = "model_loaded",
            component = %self.component,
            model_path = %model_path,
            kind = %kind,
            num_x,
            num_y,
            "Model loaded"
        );
    }

    pub fn prediction_served(&self, rows: usize, elapsed_ms: u128) {
        info!(
            event = "prediction_served",
            component = %self.component,
            rows,
            elapsed_ms,
            "Prediction served"
        );
    }

    pub fn request_rejected(&self, class: &str, message: &str) {
        warn!(
            event = "request_rejected",
            component = %self.component,
            class = %class,
            message = %message,
            "Prediction request rejected"
        );
    }

    pub fn server_shutdown(&self, reason: &str) {
        info!(
            event = "server_shutdown",
            component = %self.component,
            reason = %reason,
            "Prediction server shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_handles_share_registry() {
        let a = PreceptMetrics::new();
        let b = a.clone();
        a.observe_prediction(0.002, 10);
        b.inc_request_failure("client");
        a.set_epoch_loss(0.1, Some(0.2));
        a.set_model("ptmn90", "mlp");

        let text = PreceptMetrics::new().render().unwrap();
        assert!(text.contains("precept_rows_predicted_total"));
        assert!(text.contains("precept_request_failures_total"));
    }

    #[test]
    fn test_event_logger_creation() {
        let logger = EventLogger::new("trainer");
        assert_eq!(logger.component, "trainer");
        logger.epoch_completed(1, 0.5, None);
    }
}

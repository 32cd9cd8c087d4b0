//! Serving facade
//!
//! Validates untyped JSON payloads into frames, runs the predictor and
//! classifies failures so transports can map them without parsing messages.

use crate::error::PreceptError;
use crate::models::Frame;
use crate::observability::{EventLogger, PreceptMetrics};
use crate::predictor::Predictor;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Who caused a failed request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureClass {
    Client,
    Server,
}

impl FailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::Client => "client",
            FailureClass::Server => "server",
        }
    }
}

#[derive(Debug, Error)]
pub enum ServeError {
    /// Payload is malformed or does not match the model's columns
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Prediction failed for reasons outside the caller's control
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServeError {
    pub fn class(&self) -> FailureClass {
        match self {
            ServeError::BadRequest(_) => FailureClass::Client,
            ServeError::Internal(_) => FailureClass::Server,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self.class() {
            FailureClass::Client => 400,
            FailureClass::Server => 500,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ServeError::BadRequest(msg) | ServeError::Internal(msg) => msg,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.class(),
            message: self.message().to_string(),
        }
    }
}

impl From<PreceptError> for ServeError {
    fn from(e: PreceptError) -> Self {
        if e.is_data_error() {
            ServeError::BadRequest(e.to_string())
        } else {
            ServeError::Internal(e.to_string())
        }
    }
}

/// Serialized error response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: FailureClass,
    pub message: String,
}

/// Column names a client must send and will receive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnsResponse {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

pub struct ServingFacade {
    predictor: Arc<Predictor>,
    logger: EventLogger,
    metrics: PreceptMetrics,
}

impl ServingFacade {
    pub fn new(predictor: Arc<Predictor>) -> Self {
        Self {
            predictor,
            logger: EventLogger::new("serving"),
            metrics: PreceptMetrics::new(),
        }
    }

    pub fn predictor(&self) -> &Arc<Predictor> {
        &self.predictor
    }

    pub fn describe(&self) -> ColumnsResponse {
        let spec = self.predictor.metadata().spec();
        ColumnsResponse {
            inputs: spec.inputs().to_vec(),
            outputs: spec.outputs().to_vec(),
        }
    }

    /// Predict from a `{"column": [numbers...], ...}` payload
    pub fn handle(&self, payload: &Value) -> Result<Frame, ServeError> {
        let start = Instant::now();
        let result = self
            .parse(payload)
            .and_then(|frame| self.predictor.predict(&frame).map_err(ServeError::from));

        match &result {
            Ok(frame) => self
                .logger
                .prediction_served(frame.num_rows(), start.elapsed().as_millis()),
            Err(e) => {
                self.metrics.inc_request_failure(e.class().as_str());
                self.logger.request_rejected(e.class().as_str(), e.message());
            }
        }
        result
    }

    fn parse(&self, payload: &Value) -> Result<Frame, ServeError> {
        let object = payload.as_object().ok_or_else(|| {
            ServeError::BadRequest("payload must be a JSON object of columns".to_string())
        })?;
        let inputs = self.predictor.metadata().spec().inputs();

        if let Some(unknown) = object.keys().find(|k| !inputs.contains(k)) {
            return Err(ServeError::BadRequest(format!(
                "unknown input column '{}'",
                unknown
            )));
        }

        let mut columns = Vec::with_capacity(inputs.len());
        for name in inputs {
            let values = object
                .get(name)
                .ok_or_else(|| ServeError::BadRequest(format!("missing input column '{}'", name)))?
                .as_array()
                .ok_or_else(|| {
                    ServeError::BadRequest(format!("column '{}' must be an array", name))
                })?;
            let numbers = values
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    v.as_f64().ok_or_else(|| {
                        ServeError::BadRequest(format!(
                            "column '{}' entry {} is not a number",
                            name, i
                        ))
                    })
                })
                .collect::<Result<Vec<f64>, ServeError>>()?;
            columns.push((name.clone(), numbers));
        }

        Frame::from_columns(columns).map_err(ServeError::from)
    }
}

//! Neural-network surrogates for primitive device operating points
//!
//! This crate provides the core functionality for:
//! - Normalization of operating-point tables (power transform + min-max scaling)
//! - Seeded dataset splitting and parallel batch loading
//! - Training and exporting feed-forward surrogate models
//! - Metadata sidecars that freeze the normalization at training time
//! - Batched prediction and a JSON serving facade
//! - Health checks and observability

pub mod columns;
pub mod config;
pub mod data;
pub mod error;
pub mod health;
pub mod metadata;
pub mod model;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod serving;
pub mod training;
pub mod transform;

pub use columns::ColumnSpec;
pub use config::TrainConfig;
pub use data::{DataConfig, DataSource, OperatingPointData};
pub use error::{PreceptError, Result};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, PredictionOutcome,
    ReadinessResponse,
};
pub use metadata::ModelMetadata;
pub use model::{ModelRuntime, Mlp};
pub use models::Frame;
pub use observability::{EventLogger, PreceptMetrics};
pub use predictor::Predictor;
pub use serving::{FailureClass, ServeError, ServingFacade};
pub use training::{Trainer, TrainingConfig};
pub use transform::{NormalizationStats, ScaleRange, Transformer};

//! Model runtimes
//!
//! The predictor and trainer only see [`ModelRuntime`]. Artifacts are
//! chosen by file extension: `.mlp` for networks trained by this crate,
//! `.onnx` for externally compiled networks run through tract.

mod mlp;
mod onnx;

pub use mlp::{Activation, Adam, Dense, Gradients, Mlp};
pub use onnx::OnnxRuntime;

use crate::error::{PreceptError, Result};
use ndarray::{Array2, ArrayView2};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Extension of natively trained model artifacts
pub const NATIVE_EXTENSION: &str = "mlp";

/// Extension of compiled ONNX model artifacts
pub const ONNX_EXTENSION: &str = "onnx";

/// Batched inference over normalized rows
pub trait ModelRuntime: Send + Sync {
    /// Map a `rows x num_x` matrix to a `rows x num_y` matrix
    fn infer(&self, batch: ArrayView2<'_, f64>) -> Result<Array2<f64>>;

    /// Short name of the backend, for logs and metrics
    fn kind(&self) -> &'static str;
}

/// Artifact formats understood by [`load`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    Native,
    Onnx,
}

impl ModelFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(NATIVE_EXTENSION) => Ok(ModelFormat::Native),
            Some(ONNX_EXTENSION) => Ok(ModelFormat::Onnx),
            other => Err(PreceptError::ModelLoad(format!(
                "unsupported model extension {:?} for {}",
                other,
                path.display()
            ))),
        }
    }
}

/// Load a model artifact and check it maps `num_x` columns to `num_y`
pub fn load(path: &Path, num_x: usize, num_y: usize) -> Result<Arc<dyn ModelRuntime>> {
    if !path.exists() {
        return Err(PreceptError::ModelLoad(format!(
            "model artifact {} does not exist",
            path.display()
        )));
    }

    let runtime: Arc<dyn ModelRuntime> = match ModelFormat::from_path(path)? {
        ModelFormat::Native => Arc::new(Mlp::load(path)?),
        ModelFormat::Onnx => Arc::new(OnnxRuntime::load(path, num_x)?),
    };
    verify_arity(runtime.as_ref(), num_x, num_y)?;

    debug!(path = %path.display(), kind = runtime.kind(), "Model artifact loaded");
    Ok(runtime)
}

/// Probe the runtime with a single zero row
pub fn verify_arity(runtime: &dyn ModelRuntime, num_x: usize, num_y: usize) -> Result<()> {
    let probe = Array2::zeros((1, num_x));
    let out = runtime.infer(probe.view()).map_err(|e| {
        PreceptError::ModelLoad(format!(
            "model does not accept {} input columns: {}",
            num_x, e
        ))
    })?;
    if out.dim() != (1, num_y) {
        return Err(PreceptError::ModelLoad(format!(
            "model produces {:?} for one row, metadata declares {} outputs",
            out.dim(),
            num_y
        )));
    }
    Ok(())
}

/// Hex SHA-256 digest of an artifact on disk
pub fn file_digest(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| PreceptError::io(path, e))?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

//! ONNX inference using tract
//!
//! The parsed graph is kept undecided on batch size. A runnable plan is
//! optimized per distinct batch size on first use and kept in a small
//! least-recently-used cache, so serving many batch sizes stays bounded.

use super::ModelRuntime;
use crate::error::{PreceptError, Result};
use lru::LruCache;
use ndarray::{Array2, ArrayView2};
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tract_onnx::prelude::*;
use tracing::{debug, warn};

/// Batch latency above which a warning is logged
const MAX_INFERENCE_MS: u128 = 50;

/// Optimized plans kept alive at once
const MAX_CACHED_PLANS: usize = 8;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

pub struct OnnxRuntime {
    graph: InferenceModel,
    num_x: usize,
    plans: Mutex<PlanCache<usize, TractModel>>,
}

impl OnnxRuntime {
    pub fn load(path: &Path, num_x: usize) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| PreceptError::io(path, e))?;
        Self::from_bytes(&bytes, num_x)
    }

    pub fn from_bytes(model_bytes: &[u8], num_x: usize) -> Result<Self> {
        let graph = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .map_err(|e| PreceptError::ModelLoad(format!("failed to parse ONNX model: {:#}", e)))?;

        let runtime = Self {
            graph,
            num_x,
            plans: Mutex::new(PlanCache::new(MAX_CACHED_PLANS)),
        };
        // Single-row plan doubles as the load-time check
        runtime.plan(1)?;
        Ok(runtime)
    }

    fn plan(&self, rows: usize) -> Result<Arc<TractModel>> {
        let mut plans = self
            .plans
            .lock()
            .map_err(|e| PreceptError::Inference(format!("Lock poisoned: {}", e)))?;

        plans.get_or_try_insert(rows, || {
            let plan = self
                .graph
                .clone()
                .with_input_fact(0, f32::fact([rows, self.num_x]).into())
                .and_then(|m| m.into_optimized())
                .and_then(|m| m.into_runnable())
                .map_err(|e| {
                    PreceptError::ModelLoad(format!(
                        "failed to prepare ONNX model for {} rows: {:#}",
                        rows, e
                    ))
                })?;
            debug!(rows, "ONNX plan optimized");
            Ok(plan)
        })
    }
}

impl ModelRuntime for OnnxRuntime {
    fn infer(&self, batch: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        let rows = batch.nrows();
        if batch.ncols() != self.num_x {
            return Err(PreceptError::Inference(format!(
                "model expects {} input columns, got {}",
                self.num_x,
                batch.ncols()
            )));
        }
        if rows == 0 {
            return Err(PreceptError::Inference("empty batch".to_string()));
        }

        let start = Instant::now();
        let plan = self.plan(rows)?;

        let data: Vec<f32> = batch.iter().map(|&v| v as f32).collect();
        let input: Tensor = tract_ndarray::Array2::from_shape_vec((rows, self.num_x), data)
            .map_err(|e| PreceptError::Inference(e.to_string()))?
            .into();

        let result = plan
            .run(tvec!(input.into()))
            .map_err(|e| PreceptError::Inference(format!("{:#}", e)))?;
        let output = result
            .first()
            .ok_or_else(|| PreceptError::Inference("No output from model".to_string()))?;

        let view = output
            .to_array_view::<f32>()
            .map_err(|e| PreceptError::Inference(format!("{:#}", e)))?;
        let shape = view.shape().to_vec();
        if shape.len() != 2 || shape[0] != rows {
            return Err(PreceptError::Inference(format!(
                "model output has shape {:?} for {} rows",
                shape, rows
            )));
        }
        let values: Vec<f64> = view.iter().map(|&v| v as f64).collect();
        let out = Array2::from_shape_vec((rows, shape[1]), values)
            .map_err(|e| PreceptError::Inference(e.to_string()))?;

        let elapsed = start.elapsed();
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            warn!(
                elapsed_ms = elapsed.as_millis(),
                rows,
                "Inference exceeded {}ms target",
                MAX_INFERENCE_MS
            );
        } else {
            debug!(elapsed_us = elapsed.as_micros(), rows, "Inference completed");
        }

        Ok(out)
    }

    fn kind(&self) -> &'static str {
        "onnx"
    }
}

/// Bounded map from batch size to a shared plan, evicting the least recently used
struct PlanCache<K: Hash + Eq, V> {
    entries: LruCache<K, Arc<V>>,
}

impl<K: Hash + Eq, V> PlanCache<K, V> {
    fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    fn get_or_try_insert<F>(&mut self, key: K, build: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Result<V>,
    {
        if let Some(value) = self.entries.get(&key) {
            return Ok(Arc::clone(value));
        }
        let value = Arc::new(build()?);
        self.entries.put(key, Arc::clone(&value));
        Ok(value)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

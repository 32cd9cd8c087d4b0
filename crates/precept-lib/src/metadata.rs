//! Model metadata sidecar
//!
//! Everything needed to rebuild the normalization pipeline at inference:
//! the column spec, per-column bounds and lambdas, the scaling range and an
//! optional digest of the model artifact. Stored as YAML next to the model.

use crate::columns::ColumnSpec;
use crate::error::{PreceptError, Result};
use crate::transform::{ColumnStats, NormalizationStats, ScaleRange};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Extension of metadata sidecars
pub const SIDECAR_EXTENSION: &str = "yml";

/// On-disk layout. Every list follows column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SidecarDocument {
    num_x: usize,
    num_y: usize,
    params_x: Vec<String>,
    params_y: Vec<String>,
    mask_x: Vec<String>,
    mask_y: Vec<String>,
    min_x: Vec<f64>,
    max_x: Vec<f64>,
    min_y: Vec<f64>,
    max_y: Vec<f64>,
    lambdas_x: Vec<f64>,
    lambdas_y: Vec<f64>,
    #[serde(default = "default_range")]
    range: [f64; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model_sha256: Option<String>,
}

fn default_range() -> [f64; 2] {
    ScaleRange::default().as_array()
}

/// Column spec and frozen statistics of one trained model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelMetadata {
    spec: Arc<ColumnSpec>,
    stats: Arc<NormalizationStats>,
    model_sha256: Option<String>,
}

impl ModelMetadata {
    /// Pair a spec with statistics fitted for it
    pub fn new(spec: Arc<ColumnSpec>, stats: Arc<NormalizationStats>) -> Result<Self> {
        check_side(spec.inputs(), spec.mask_x(), stats.inputs(), "input")?;
        check_side(spec.outputs(), spec.mask_y(), stats.outputs(), "output")?;
        Ok(Self {
            spec,
            stats,
            model_sha256: None,
        })
    }

    /// Attach the hex SHA-256 digest of the model artifact
    pub fn with_model_sha256(mut self, digest: impl Into<String>) -> Self {
        self.model_sha256 = Some(digest.into());
        self
    }

    pub fn spec(&self) -> &Arc<ColumnSpec> {
        &self.spec
    }

    pub fn stats(&self) -> &Arc<NormalizationStats> {
        &self.stats
    }

    pub fn model_sha256(&self) -> Option<&str> {
        self.model_sha256.as_deref()
    }

    /// Sidecar location for a model artifact: same base name, `.yml`
    pub fn sidecar_path(model_path: &Path) -> PathBuf {
        model_path.with_extension(SIDECAR_EXTENSION)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = encode(self)?;
        std::fs::write(path, text).map_err(|e| PreceptError::io(path, e))?;
        debug!(path = %path.display(), "Metadata sidecar written");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| PreceptError::io(path, e))?;
        decode(&text).map_err(|e| match e {
            PreceptError::MetadataCodec(msg) => {
                PreceptError::MetadataCodec(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    fn to_document(&self) -> SidecarDocument {
        let stats = &self.stats;
        SidecarDocument {
            num_x: self.spec.num_x(),
            num_y: self.spec.num_y(),
            params_x: self.spec.inputs().to_vec(),
            params_y: self.spec.outputs().to_vec(),
            mask_x: self.spec.mask_x().to_vec(),
            mask_y: self.spec.mask_y().to_vec(),
            min_x: stats.inputs().iter().map(|c| c.min).collect(),
            max_x: stats.inputs().iter().map(|c| c.max).collect(),
            min_y: stats.outputs().iter().map(|c| c.min).collect(),
            max_y: stats.outputs().iter().map(|c| c.max).collect(),
            lambdas_x: stats.lambdas_x(),
            lambdas_y: stats.lambdas_y(),
            range: stats.range().as_array(),
            model_sha256: self.model_sha256.clone(),
        }
    }

    fn from_document(doc: &SidecarDocument) -> Result<Self> {
        let codec = |e: PreceptError| match e {
            PreceptError::Configuration(msg) => PreceptError::MetadataCodec(msg),
            other => other,
        };

        expect_len("params_x", doc.params_x.len(), doc.num_x)?;
        expect_len("params_y", doc.params_y.len(), doc.num_y)?;
        for (key, list, n) in [
            ("min_x", &doc.min_x, doc.num_x),
            ("max_x", &doc.max_x, doc.num_x),
            ("min_y", &doc.min_y, doc.num_y),
            ("max_y", &doc.max_y, doc.num_y),
        ] {
            expect_len(key, list.len(), n)?;
        }
        expect_len("lambdas_x", doc.lambdas_x.len(), doc.mask_x.len())?;
        expect_len("lambdas_y", doc.lambdas_y.len(), doc.mask_y.len())?;

        let spec = ColumnSpec::new(
            doc.params_x.as_slice(),
            doc.params_y.as_slice(),
            doc.mask_x.as_slice(),
            doc.mask_y.as_slice(),
        )
        .map_err(codec)?;
        if spec.mask_x() != doc.mask_x.as_slice() || spec.mask_y() != doc.mask_y.as_slice() {
            return Err(PreceptError::MetadataCodec(
                "transform masks must list columns in declared order".to_string(),
            ));
        }

        if let Some(digest) = &doc.model_sha256 {
            let valid = digest.len() == 64 && hex::decode(digest).is_ok();
            if !valid {
                return Err(PreceptError::MetadataCodec(format!(
                    "model_sha256 '{}' is not a hex SHA-256 digest",
                    digest
                )));
            }
        }

        let inputs = side_stats(
            &doc.params_x,
            &spec.input_flags(),
            &doc.min_x,
            &doc.max_x,
            &doc.lambdas_x,
        );
        let outputs = side_stats(
            &doc.params_y,
            &spec.output_flags(),
            &doc.min_y,
            &doc.max_y,
            &doc.lambdas_y,
        );
        let range = ScaleRange::new(doc.range[0], doc.range[1]);
        let stats = NormalizationStats::from_parts(inputs, outputs, range)?;

        Ok(Self {
            spec: Arc::new(spec),
            stats: Arc::new(stats),
            model_sha256: doc.model_sha256.clone(),
        })
    }
}

/// Serialize metadata as a YAML sidecar document
pub fn encode(metadata: &ModelMetadata) -> Result<String> {
    serde_yaml::to_string(&metadata.to_document())
        .map_err(|e| PreceptError::MetadataCodec(format!("failed to encode sidecar: {}", e)))
}

/// Parse and validate a YAML sidecar document
pub fn decode(text: &str) -> Result<ModelMetadata> {
    let doc: SidecarDocument = serde_yaml::from_str(text)
        .map_err(|e| PreceptError::MetadataCodec(e.to_string()))?;
    let metadata = ModelMetadata::from_document(&doc)?;

    // The decoded value must encode back to the same document
    let again: SidecarDocument = serde_yaml::from_str(&encode(&metadata)?)
        .map_err(|e| PreceptError::MetadataCodec(format!("re-encoded sidecar unreadable: {}", e)))?;
    if again != doc {
        return Err(PreceptError::MetadataCodec(
            "sidecar does not survive a round trip".to_string(),
        ));
    }
    Ok(metadata)
}

fn expect_len(key: &str, actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(PreceptError::MetadataCodec(format!(
            "'{}' has {} entries, expected {}",
            key, actual, expected
        )));
    }
    Ok(())
}

fn side_stats(
    names: &[String],
    flags: &[bool],
    min: &[f64],
    max: &[f64],
    lambdas: &[f64],
) -> Vec<ColumnStats> {
    let mut lambdas = lambdas.iter().copied();
    names
        .iter()
        .zip(flags)
        .zip(min.iter().zip(max))
        .map(|((name, &masked), (&min, &max))| ColumnStats {
            name: name.clone(),
            min,
            max,
            lambda: if masked { lambdas.next() } else { None },
        })
        .collect()
}

fn check_side(
    names: &[String],
    mask: &[String],
    stats: &[ColumnStats],
    side: &str,
) -> Result<()> {
    let stat_names: Vec<&str> = stats.iter().map(|c| c.name.as_str()).collect();
    let spec_names: Vec<&str> = names.iter().map(String::as_str).collect();
    if stat_names != spec_names {
        return Err(PreceptError::Configuration(format!(
            "{} statistics cover {:?}, spec declares {:?}",
            side, stat_names, spec_names
        )));
    }
    for col in stats {
        let masked = mask.contains(&col.name);
        if masked != col.lambda.is_some() {
            return Err(PreceptError::Configuration(format!(
                "{} column '{}' lambda does not match its transform mask",
                side, col.name
            )));
        }
    }
    Ok(())
}

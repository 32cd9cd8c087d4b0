//! Feed-forward regression network
//!
//! Dense layers with a shared hidden activation and a linear output layer,
//! trained with mean squared error and Adam. Persisted as JSON.

use super::ModelRuntime;
use crate::error::{PreceptError, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Hidden-layer nonlinearity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Relu,
    Tanh,
}

impl Activation {
    fn apply(self, z: f64) -> f64 {
        match self {
            Activation::Relu => z.max(0.0),
            Activation::Tanh => z.tanh(),
        }
    }

    fn derivative(self, z: f64) -> f64 {
        match self {
            Activation::Relu => {
                if z > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::Tanh => 1.0 - z.tanh().powi(2),
        }
    }
}

/// Fully connected layer: `x . weights + bias`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dense {
    pub weights: Array2<f64>,
    pub bias: Array1<f64>,
}

/// Per-layer weight and bias gradients
pub type Gradients = Vec<(Array2<f64>, Array1<f64>)>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mlp {
    layers: Vec<Dense>,
    activation: Activation,
}

impl Mlp {
    /// Xavier-uniform initialized network with zero biases
    pub fn new(
        num_x: usize,
        hidden: &[usize],
        num_y: usize,
        activation: Activation,
        seed: u64,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let widths: Vec<usize> = std::iter::once(num_x)
            .chain(hidden.iter().copied())
            .chain(std::iter::once(num_y))
            .collect();

        let layers = widths
            .windows(2)
            .map(|w| {
                let (fan_in, fan_out) = (w[0], w[1]);
                let limit = (6.0 / (fan_in + fan_out).max(1) as f64).sqrt();
                let dist = Uniform::new_inclusive(-limit, limit);
                Dense {
                    weights: Array2::from_shape_fn((fan_in, fan_out), |_| dist.sample(&mut rng)),
                    bias: Array1::zeros(fan_out),
                }
            })
            .collect();

        Self { layers, activation }
    }

    pub fn num_inputs(&self) -> usize {
        self.layers.first().map_or(0, |l| l.weights.nrows())
    }

    pub fn num_outputs(&self) -> usize {
        self.layers.last().map_or(0, |l| l.weights.ncols())
    }

    pub fn layers(&self) -> &[Dense] {
        &self.layers
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    fn check_width(&self, x: &ArrayView2<'_, f64>) -> Result<()> {
        if x.ncols() != self.num_inputs() {
            return Err(PreceptError::Inference(format!(
                "network expects {} input columns, got {}",
                self.num_inputs(),
                x.ncols()
            )));
        }
        Ok(())
    }

    /// Forward pass
    pub fn forward(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        self.check_width(&x)?;
        let last = self.layers.len() - 1;
        let mut a = x.to_owned();
        for (i, layer) in self.layers.iter().enumerate() {
            let mut z = a.dot(&layer.weights) + &layer.bias;
            if i < last {
                let act = self.activation;
                z.mapv_inplace(|v| act.apply(v));
            }
            a = z;
        }
        Ok(a)
    }

    /// Mean squared error and its gradients for one batch
    pub fn gradients(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView2<'_, f64>,
    ) -> Result<(f64, Gradients)> {
        self.check_width(&x)?;
        if y.dim() != (x.nrows(), self.num_outputs()) {
            return Err(PreceptError::DataShape(format!(
                "target batch has shape {:?}, expected ({}, {})",
                y.dim(),
                x.nrows(),
                self.num_outputs()
            )));
        }
        if x.nrows() == 0 {
            return Err(PreceptError::DataShape("empty batch".to_string()));
        }

        // Keep pre-activations and activations of every layer
        let last = self.layers.len() - 1;
        let mut activations = vec![x.to_owned()];
        let mut pre = Vec::with_capacity(self.layers.len());
        for (i, layer) in self.layers.iter().enumerate() {
            let z = activations[i].dot(&layer.weights) + &layer.bias;
            let a = if i < last {
                let act = self.activation;
                z.mapv(|v| act.apply(v))
            } else {
                z.clone()
            };
            pre.push(z);
            activations.push(a);
        }

        let prediction = &activations[last + 1];
        let diff = prediction - &y;
        let count = diff.len() as f64;
        let loss = diff.mapv(|d| d * d).sum() / count;

        let mut delta = diff * (2.0 / count);
        let mut grads: Gradients = Vec::with_capacity(self.layers.len());
        for i in (0..self.layers.len()).rev() {
            let gw = activations[i].t().dot(&delta);
            let gb = delta.sum_axis(Axis(0));
            if i > 0 {
                let act = self.activation;
                let back = delta.dot(&self.layers[i].weights.t());
                delta = back * &pre[i - 1].mapv(|z| act.derivative(z));
            }
            grads.push((gw, gb));
        }
        grads.reverse();

        Ok((loss, grads))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec(self).map_err(|e| {
            PreceptError::ModelLoad(format!("failed to serialize network: {}", e))
        })?;
        std::fs::write(path, json).map_err(|e| PreceptError::io(path, e))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| PreceptError::io(path, e))?;
        let mlp: Mlp = serde_json::from_slice(&bytes).map_err(|e| {
            PreceptError::ModelLoad(format!("{} is not a valid network: {}", path.display(), e))
        })?;
        mlp.validate()?;
        Ok(mlp)
    }

    fn validate(&self) -> Result<()> {
        if self.layers.is_empty() {
            return Err(PreceptError::ModelLoad("network has no layers".to_string()));
        }
        for (i, pair) in self.layers.windows(2).enumerate() {
            if pair[0].weights.ncols() != pair[1].weights.nrows() {
                return Err(PreceptError::ModelLoad(format!(
                    "layer {} emits {} values but layer {} takes {}",
                    i,
                    pair[0].weights.ncols(),
                    i + 1,
                    pair[1].weights.nrows()
                )));
            }
        }
        if self.layers.iter().any(|l| l.bias.len() != l.weights.ncols()) {
            return Err(PreceptError::ModelLoad(
                "bias length does not match layer width".to_string(),
            ));
        }
        Ok(())
    }
}

impl ModelRuntime for Mlp {
    fn infer(&self, batch: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        self.forward(batch)
    }

    fn kind(&self) -> &'static str {
        "mlp"
    }
}

/// Adam optimizer state for one network
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    t: i32,
    m: Gradients,
    v: Gradients,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            t: 0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn set_learning_rate(&mut self, learning_rate: f64) {
        self.learning_rate = learning_rate;
    }

    /// Apply one update to `model` using `grads` from [`Mlp::gradients`]
    pub fn step(&mut self, model: &mut Mlp, grads: &Gradients) {
        if self.m.len() != grads.len() {
            let zeros: Gradients = grads
                .iter()
                .map(|(w, b)| (Array2::zeros(w.raw_dim()), Array1::zeros(b.len())))
                .collect();
            self.m = zeros.clone();
            self.v = zeros;
            self.t = 0;
        }

        self.t += 1;
        let (b1, b2) = (self.beta1, self.beta2);
        let correction1 = 1.0 - b1.powi(self.t);
        let correction2 = 1.0 - b2.powi(self.t);
        let step = self.learning_rate;
        let eps = self.epsilon;

        for (((layer, (gw, gb)), (mw, mb)), (vw, vb)) in model
            .layers
            .iter_mut()
            .zip(grads)
            .zip(self.m.iter_mut())
            .zip(self.v.iter_mut())
        {
            update(&mut layer.weights, gw, mw, vw, b1, b2, correction1, correction2, step, eps);
            update(&mut layer.bias, gb, mb, vb, b1, b2, correction1, correction2, step, eps);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn update<D: ndarray::Dimension>(
    param: &mut ndarray::Array<f64, D>,
    grad: &ndarray::Array<f64, D>,
    m: &mut ndarray::Array<f64, D>,
    v: &mut ndarray::Array<f64, D>,
    b1: f64,
    b2: f64,
    correction1: f64,
    correction2: f64,
    step: f64,
    eps: f64,
) {
    ndarray::Zip::from(param)
        .and(grad)
        .and(m)
        .and(v)
        .for_each(|p, &g, m, v| {
            *m = b1 * *m + (1.0 - b1) * g;
            *v = b2 * *v + (1.0 - b2) * g * g;
            let m_hat = *m / correction1;
            let v_hat = *v / correction2;
            *p -= step * m_hat / (v_hat.sqrt() + eps);
        });
}

//! Yeo-Johnson power transform
//!
//! A monotone, lambda-indexed transform in the Box-Cox family that is
//! defined on the whole real line, so zero and negative currents can be
//! transformed and values outside the training range still map somewhere.

/// Search interval for the maximum-likelihood lambda
pub const LAMBDA_SEARCH_BOUNDS: (f64, f64) = (-5.0, 5.0);

const LAMBDA_TOLERANCE: f64 = 1e-8;

/// Lambdas closer than this to a branch singularity use the log form.
///
/// Away from it the `ln_1p`/`exp_m1` forms keep full precision as lambda
/// approaches the singularity.
const LAMBDA_EPSILON: f64 = 1e-12;

/// Apply the transform to a single value
pub fn yeo_johnson(x: f64, lambda: f64) -> f64 {
    if x >= 0.0 {
        if lambda.abs() < LAMBDA_EPSILON {
            x.ln_1p()
        } else {
            (lambda * x.ln_1p()).exp_m1() / lambda
        }
    } else if (lambda - 2.0).abs() < LAMBDA_EPSILON {
        -(-x).ln_1p()
    } else {
        let p = 2.0 - lambda;
        -(p * (-x).ln_1p()).exp_m1() / p
    }
}

/// Invert [`yeo_johnson`] for the same lambda
pub fn inv_yeo_johnson(y: f64, lambda: f64) -> f64 {
    if y >= 0.0 {
        if lambda.abs() < LAMBDA_EPSILON {
            y.exp_m1()
        } else {
            ((lambda * y).ln_1p() / lambda).exp_m1()
        }
    } else if (lambda - 2.0).abs() < LAMBDA_EPSILON {
        -(-y).exp_m1()
    } else {
        let p = 2.0 - lambda;
        -((-p * y).ln_1p() / p).exp_m1()
    }
}

/// Profile log-likelihood of `lambda` under a normality assumption
pub fn log_likelihood(values: &[f64], lambda: f64) -> f64 {
    let n = values.len() as f64;
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }

    let transformed: Vec<f64> = values.iter().map(|&x| yeo_johnson(x, lambda)).collect();
    let mean = transformed.iter().sum::<f64>() / n;
    let variance = transformed.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / n;
    if variance <= 0.0 || !variance.is_finite() {
        return f64::NEG_INFINITY;
    }

    let jacobian: f64 = values.iter().map(|&x| x.signum() * x.abs().ln_1p()).sum();
    -0.5 * n * variance.ln() + (lambda - 1.0) * jacobian
}

/// Find the lambda that makes `values` look most normal.
///
/// Golden-section search over [`LAMBDA_SEARCH_BOUNDS`]. Constant or
/// near-constant data has a flat likelihood and yields lambda 1 (identity).
pub fn fit_lambda(values: &[f64]) -> f64 {
    let first = match values.first() {
        Some(v) => *v,
        None => return 1.0,
    };
    if values.iter().all(|&v| v == first) {
        return 1.0;
    }

    let inv_phi = (5.0_f64.sqrt() - 1.0) / 2.0;
    let (mut a, mut b) = LAMBDA_SEARCH_BOUNDS;
    let mut c = b - inv_phi * (b - a);
    let mut d = a + inv_phi * (b - a);
    let mut fc = log_likelihood(values, c);
    let mut fd = log_likelihood(values, d);

    while (b - a).abs() > LAMBDA_TOLERANCE {
        if fc > fd {
            b = d;
            d = c;
            fd = fc;
            c = b - inv_phi * (b - a);
            fc = log_likelihood(values, c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + inv_phi * (b - a);
            fd = log_likelihood(values, d);
        }
    }

    let lambda = (a + b) / 2.0;
    if lambda.is_finite() {
        lambda
    } else {
        1.0
    }
}

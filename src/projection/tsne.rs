//! Exact t-SNE.
//!
//! Gradient-based stochastic neighbor embedding to 2 dimensions: per-point
//! Gaussian bandwidths calibrated to the configured perplexity by binary
//! search, symmetrized joint probabilities, Student-t low-dimensional
//! affinities, early exaggeration, and momentum with per-parameter gains.
//! The O(n²) exact formulation is deliberate — inputs here are batches of
//! comments, not millions of rows.

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::cancel::CancelFlag;
use crate::error::PipelineError;

const EARLY_EXAGGERATION: f32 = 12.0;
const EXAGGERATION_ITERS: usize = 250;
const INITIAL_MOMENTUM: f32 = 0.5;
const FINAL_MOMENTUM: f32 = 0.8;
const MIN_GAIN: f32 = 0.01;
const P_FLOOR: f32 = 1e-12;
const BETA_SEARCH_STEPS: usize = 50;
const ENTROPY_TOL: f32 = 1e-5;

#[derive(Debug, Clone)]
pub struct TsneParams {
    /// Effective neighborhood size. Must scale with row count; there is no
    /// universal default.
    pub perplexity: f32,
    pub iterations: usize,
    /// `None` auto-tunes to `max(n / 48, 50)`.
    pub learning_rate: Option<f32>,
    /// Seed for the randomized init. Unseeded runs are not reproducible.
    pub seed: Option<u64>,
}

/// Smallest usable row count for a given perplexity: the bandwidth search
/// needs roughly `3 · perplexity` effective neighbors per point.
pub fn min_rows(perplexity: f32) -> usize {
    (((3.0 * perplexity).ceil() as usize) + 1).max(4)
}

/// Project `data` (n × d) down to n × 2.
pub fn run(
    data: ArrayView2<'_, f32>,
    params: &TsneParams,
    cancel: &CancelFlag,
) -> Result<Array2<f32>, PipelineError> {
    if !params.perplexity.is_finite() || params.perplexity <= 0.0 {
        return Err(PipelineError::InvalidConfig(format!(
            "perplexity must be a positive number, got {}",
            params.perplexity
        )));
    }
    if params.iterations == 0 {
        return Err(PipelineError::InvalidConfig(
            "projection.iterations must be at least 1".into(),
        ));
    }

    let n = data.nrows();
    let needed = min_rows(params.perplexity);
    if n < needed {
        return Err(PipelineError::InsufficientDataForProjection {
            rows: n,
            perplexity: params.perplexity,
            min_rows: needed,
        });
    }

    let learning_rate = params
        .learning_rate
        .unwrap_or_else(|| (n as f32 / (EARLY_EXAGGERATION * 4.0)).max(50.0));

    let mut p = joint_probabilities(data, params.perplexity) * EARLY_EXAGGERATION;

    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let init = Normal::new(0.0f32, 1e-4).expect("valid std dev");
    let mut y = Array2::from_shape_fn((n, 2), |_| init.sample(&mut rng));

    let mut velocity = Array2::<f32>::zeros((n, 2));
    let mut gains = Array2::<f32>::ones((n, 2));

    for iter in 0..params.iterations {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let grad = gradient(&p, &y);
        let momentum = if iter < EXAGGERATION_ITERS {
            INITIAL_MOMENTUM
        } else {
            FINAL_MOMENTUM
        };

        for i in 0..n {
            for d in 0..2 {
                let g = grad[[i, d]];
                let v = velocity[[i, d]];
                // Gains grow when the gradient keeps pointing against the
                // current velocity and shrink when it agrees.
                gains[[i, d]] = if (g > 0.0) == (v > 0.0) {
                    (gains[[i, d]] * 0.8).max(MIN_GAIN)
                } else {
                    gains[[i, d]] + 0.2
                };
                velocity[[i, d]] = momentum * v - learning_rate * gains[[i, d]] * g;
                y[[i, d]] += velocity[[i, d]];
            }
        }

        if let Some(mean) = y.mean_axis(Axis(0)) {
            for i in 0..n {
                y[[i, 0]] -= mean[0];
                y[[i, 1]] -= mean[1];
            }
        }

        if iter + 1 == EXAGGERATION_ITERS {
            p /= EARLY_EXAGGERATION;
        }

        if (iter + 1) % 100 == 0 {
            tracing::debug!(iter = iter + 1, kl = kl_divergence(&p, &y), "t-SNE progress");
        }
    }

    Ok(y)
}

/// Symmetrized joint probabilities from pairwise input distances.
fn joint_probabilities(data: ArrayView2<'_, f32>, perplexity: f32) -> Array2<f32> {
    let n = data.nrows();
    let distances = pairwise_sq_distances(data);
    let target_entropy = perplexity.ln();

    let mut conditional = Array2::<f32>::zeros((n, n));
    for i in 0..n {
        let row = conditional_row(distances.row(i), i, target_entropy);
        for (j, value) in row.into_iter().enumerate() {
            conditional[[i, j]] = value;
        }
    }

    let mut joint = Array2::<f32>::zeros((n, n));
    for i in 0..n {
        for j in 0..n {
            let value = (conditional[[i, j]] + conditional[[j, i]]) / (2.0 * n as f32);
            joint[[i, j]] = value.max(P_FLOOR);
        }
    }
    joint
}

/// Calibrate one point's Gaussian bandwidth so the conditional distribution
/// over its neighbors hits the target entropy (log perplexity), then return
/// the normalized distribution.
fn conditional_row(distances: ArrayView1<'_, f32>, i: usize, target_entropy: f32) -> Vec<f32> {
    let n = distances.len();
    let mut beta = 1.0f32;
    let mut beta_min = f32::NEG_INFINITY;
    let mut beta_max = f32::INFINITY;
    let mut probs = vec![0.0f32; n];

    for _ in 0..BETA_SEARCH_STEPS {
        let mut sum = 0.0f32;
        let mut weighted = 0.0f32;
        for j in 0..n {
            if j == i {
                probs[j] = 0.0;
                continue;
            }
            let w = (-distances[j] * beta).exp();
            probs[j] = w;
            sum += w;
            weighted += distances[j] * w;
        }

        let entropy = if sum > 0.0 {
            sum.ln() + beta * weighted / sum
        } else {
            0.0
        };

        let diff = entropy - target_entropy;
        if diff.abs() < ENTROPY_TOL {
            break;
        }
        if diff > 0.0 {
            // Too flat: tighten the kernel.
            beta_min = beta;
            beta = if beta_max.is_finite() {
                (beta + beta_max) / 2.0
            } else {
                beta * 2.0
            };
        } else {
            beta_max = beta;
            beta = if beta_min.is_finite() {
                (beta + beta_min) / 2.0
            } else {
                beta / 2.0
            };
        }
    }

    let sum: f32 = probs.iter().sum();
    if sum > 0.0 {
        for p in &mut probs {
            *p /= sum;
        }
    }
    probs
}

fn pairwise_sq_distances(data: ArrayView2<'_, f32>) -> Array2<f32> {
    let n = data.nrows();
    let dims = data.ncols();
    let mut out = Array2::<f32>::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let mut sum = 0.0f32;
            for k in 0..dims {
                let diff = data[[i, k]] - data[[j, k]];
                sum += diff * diff;
            }
            out[[i, j]] = sum;
            out[[j, i]] = sum;
        }
    }
    out
}

/// KL gradient: `4 Σ_j (p_ij − q_ij) · w_ij · (y_i − y_j)` with Student-t
/// weights `w_ij = 1 / (1 + ‖y_i − y_j‖²)`.
fn gradient(p: &Array2<f32>, y: &Array2<f32>) -> Array2<f32> {
    let n = y.nrows();
    let (weights, weight_sum) = student_t_weights(y);

    let mut grad = Array2::<f32>::zeros((n, 2));
    for i in 0..n {
        let mut gx = 0.0f32;
        let mut gy = 0.0f32;
        for j in 0..n {
            if i == j {
                continue;
            }
            let w = weights[[i, j]];
            let q = (w / weight_sum).max(P_FLOOR);
            let mult = (p[[i, j]] - q) * w;
            gx += (y[[i, 0]] - y[[j, 0]]) * mult;
            gy += (y[[i, 1]] - y[[j, 1]]) * mult;
        }
        grad[[i, 0]] = 4.0 * gx;
        grad[[i, 1]] = 4.0 * gy;
    }
    grad
}

fn student_t_weights(y: &Array2<f32>) -> (Array2<f32>, f32) {
    let n = y.nrows();
    let mut weights = Array2::<f32>::zeros((n, n));
    let mut sum = 0.0f32;
    for i in 0..n {
        for j in (i + 1)..n {
            let dx = y[[i, 0]] - y[[j, 0]];
            let dy = y[[i, 1]] - y[[j, 1]];
            let w = 1.0 / (1.0 + dx * dx + dy * dy);
            weights[[i, j]] = w;
            weights[[j, i]] = w;
            sum += 2.0 * w;
        }
    }
    (weights, sum.max(f32::MIN_POSITIVE))
}

fn kl_divergence(p: &Array2<f32>, y: &Array2<f32>) -> f32 {
    let n = y.nrows();
    let (weights, weight_sum) = student_t_weights(y);
    let mut kl = 0.0f32;
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let q = (weights[[i, j]] / weight_sum).max(P_FLOOR);
            let pij = p[[i, j]];
            if pij > P_FLOOR {
                kl += pij * (pij / q).ln();
            }
        }
    }
    kl
}

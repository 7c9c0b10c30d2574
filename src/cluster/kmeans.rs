//! k-means over 2-D projected points.
//!
//! k-means++ initialization followed by Lloyd iterations until centroid
//! movement drops below the configured tolerance. An empty cluster is
//! reseeded from the point currently farthest from its assigned centroid.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::ClusteringConfig;
use crate::error::PipelineError;

/// Partition `points` (n × 2) into `config.clusters` groups. Returns one
/// cluster ordinal per row, in row order.
pub fn cluster(points: &Array2<f32>, config: &ClusteringConfig) -> Result<Vec<usize>, PipelineError> {
    let n = points.nrows();
    let k = config.clusters;

    if k == 0 {
        return Err(PipelineError::InvalidConfig(
            "clustering.clusters must be at least 1".into(),
        ));
    }
    if k > n {
        return Err(PipelineError::InvalidConfig(format!(
            "clustering.clusters = {k} exceeds the {n} available points"
        )));
    }
    if config.max_iterations == 0 {
        return Err(PipelineError::InvalidConfig(
            "clustering.max_iterations must be at least 1".into(),
        ));
    }
    if !(config.tolerance > 0.0) {
        return Err(PipelineError::InvalidConfig(
            "clustering.tolerance must be positive".into(),
        ));
    }

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut centroids = plus_plus_init(points, k, &mut rng);
    let mut labels = vec![0usize; n];

    for _ in 0..config.max_iterations {
        for (i, label) in labels.iter_mut().enumerate() {
            *label = nearest(points, i, &centroids).0;
        }

        let mut sums = vec![[0.0f64; 2]; k];
        let mut counts = vec![0usize; k];
        for (i, &label) in labels.iter().enumerate() {
            sums[label][0] += points[[i, 0]] as f64;
            sums[label][1] += points[[i, 1]] as f64;
            counts[label] += 1;
        }

        let mut next = centroids.clone();
        for c in 0..k {
            if counts[c] == 0 {
                next[c] = farthest_point(points, &labels, &centroids);
            } else {
                next[c] = [
                    (sums[c][0] / counts[c] as f64) as f32,
                    (sums[c][1] / counts[c] as f64) as f32,
                ];
            }
        }

        let moved = centroids
            .iter()
            .zip(&next)
            .map(|(a, b)| sq_dist(*a, *b).sqrt())
            .fold(0.0f32, f32::max);
        centroids = next;

        if moved < config.tolerance {
            break;
        }
    }

    // Final assignment against the converged centroids.
    for (i, label) in labels.iter_mut().enumerate() {
        *label = nearest(points, i, &centroids).0;
    }
    Ok(labels)
}

/// k-means++: first centroid uniform, each subsequent one drawn with
/// probability proportional to squared distance from the nearest chosen.
fn plus_plus_init(points: &Array2<f32>, k: usize, rng: &mut StdRng) -> Vec<[f32; 2]> {
    let n = points.nrows();
    let mut centroids: Vec<[f32; 2]> = Vec::with_capacity(k);
    centroids.push(point_at(points, rng.gen_range(0..n)));

    let mut best_sq = vec![f32::INFINITY; n];
    while centroids.len() < k {
        let last = centroids[centroids.len() - 1];
        for (i, d) in best_sq.iter_mut().enumerate() {
            *d = d.min(sq_dist(point_at(points, i), last));
        }

        let total: f32 = best_sq.iter().sum();
        if total <= 0.0 {
            // Every point coincides with a centroid already.
            centroids.push(point_at(points, rng.gen_range(0..n)));
            continue;
        }

        let mut target = rng.gen::<f32>() * total;
        let mut chosen = n - 1;
        for (i, &d) in best_sq.iter().enumerate() {
            target -= d;
            if target <= 0.0 {
                chosen = i;
                break;
            }
        }
        centroids.push(point_at(points, chosen));
    }
    centroids
}

fn nearest(points: &Array2<f32>, i: usize, centroids: &[[f32; 2]]) -> (usize, f32) {
    let p = point_at(points, i);
    let mut best = (0usize, f32::INFINITY);
    for (c, &centroid) in centroids.iter().enumerate() {
        let d = sq_dist(p, centroid);
        if d < best.1 {
            best = (c, d);
        }
    }
    best
}

fn farthest_point(points: &Array2<f32>, labels: &[usize], centroids: &[[f32; 2]]) -> [f32; 2] {
    let mut best = (0usize, f32::NEG_INFINITY);
    for (i, &label) in labels.iter().enumerate() {
        let d = sq_dist(point_at(points, i), centroids[label]);
        if d > best.1 {
            best = (i, d);
        }
    }
    point_at(points, best.0)
}

fn point_at(points: &Array2<f32>, i: usize) -> [f32; 2] {
    [points[[i, 0]], points[[i, 1]]]
}

fn sq_dist(a: [f32; 2], b: [f32; 2]) -> f32 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn three_blobs() -> Array2<f32> {
        let mut rows: Vec<[f32; 2]> = Vec::new();
        for i in 0..8 {
            let jitter = (i as f32) * 0.01;
            rows.push([0.0 + jitter, 0.0 - jitter]);
            rows.push([10.0 + jitter, 10.0 - jitter]);
            rows.push([-10.0 - jitter, 10.0 + jitter]);
        }
        Array2::from_shape_fn((rows.len(), 2), |(i, j)| rows[i][j])
    }

    fn config(k: usize) -> ClusteringConfig {
        ClusteringConfig {
            clusters: k,
            max_iterations: 100,
            tolerance: 1e-4,
            seed: Some(42),
        }
    }

    #[test]
    fn separates_well_separated_blobs() {
        let points = three_blobs();
        let labels = cluster(&points, &config(3)).unwrap();
        assert_eq!(labels.len(), points.nrows());

        // Points from the same blob share a label, different blobs differ.
        // Blob membership cycles through rows i % 3.
        for i in (0..labels.len()).step_by(3) {
            assert_eq!(labels[i], labels[0]);
            assert_eq!(labels[i + 1], labels[1]);
            assert_eq!(labels[i + 2], labels[2]);
        }
        assert_ne!(labels[0], labels[1]);
        assert_ne!(labels[1], labels[2]);
        assert_ne!(labels[0], labels[2]);
    }

    #[test]
    fn k_larger_than_points_is_rejected() {
        let points = Array2::<f32>::zeros((3, 2));
        let err = cluster(&points, &config(4)).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)), "{err}");
    }

    #[test]
    fn single_cluster_labels_everything_zero() {
        let points = three_blobs();
        let labels = cluster(&points, &config(1)).unwrap();
        assert!(labels.iter().all(|&l| l == 0));
    }

    #[test]
    fn seeded_clustering_is_reproducible() {
        let points = three_blobs();
        let a = cluster(&points, &config(3)).unwrap();
        let b = cluster(&points, &config(3)).unwrap();
        assert_eq!(a, b);
    }
}

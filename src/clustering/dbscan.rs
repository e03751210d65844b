//! Density-based clustering (DBSCAN) over small dense feature matrices.
//!
//! Neighbourhoods are found by brute force for multi-dimensional features
//! and by a sorted sweep for one-dimensional ones. Both run on the rayon pool;
//! cluster expansion itself is sequential so labels never depend on
//! scheduling.
//!
//! Expansion visits seed points in input order. A border point reachable from
//! several clusters keeps the label of the first cluster that reaches it, and
//! border points never expand a cluster further.

use ndarray::ArrayView2;
use rayon::prelude::*;

/// Cluster labels for every input row; `None` marks noise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clustering {
    pub labels: Vec<Option<usize>>,
    pub n_clusters: usize,
}

impl Clustering {
    pub fn noise_count(&self) -> usize {
        self.labels.iter().filter(|label| label.is_none()).count()
    }

    /// Row indices per cluster label, each list in input order.
    pub fn members(&self) -> Vec<Vec<usize>> {
        let mut members = vec![Vec::new(); self.n_clusters];
        for (row, label) in self.labels.iter().enumerate() {
            if let Some(label) = label {
                members[*label].push(row);
            }
        }
        members
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Dbscan {
    eps: f64,
    min_samples: usize,
}

impl Dbscan {
    /// `min_samples` counts the point itself.
    pub fn new(eps: f64, min_samples: usize) -> Self {
        Self { eps, min_samples }
    }

    pub fn fit(&self, features: ArrayView2<'_, f64>) -> Clustering {
        let n = features.nrows();
        let neighborhoods = neighborhoods(features, self.eps);
        let core: Vec<bool> = neighborhoods
            .iter()
            .map(|neighbors| neighbors.len() >= self.min_samples)
            .collect();

        let mut labels: Vec<Option<usize>> = vec![None; n];
        let mut n_clusters = 0;
        let mut stack = Vec::new();

        for seed in 0..n {
            if labels[seed].is_some() || !core[seed] {
                continue;
            }

            stack.push(seed);
            while let Some(point) = stack.pop() {
                if labels[point].is_some() {
                    continue;
                }
                labels[point] = Some(n_clusters);

                if core[point] {
                    stack.extend(
                        neighborhoods[point]
                            .iter()
                            .copied()
                            .filter(|&neighbor| labels[neighbor].is_none()),
                    );
                }
            }

            n_clusters += 1;
        }

        Clustering { labels, n_clusters }
    }
}

/// Indices within `eps` (Euclidean, inclusive) of each row, self included,
/// in ascending order.
fn neighborhoods(features: ArrayView2<'_, f64>, eps: f64) -> Vec<Vec<usize>> {
    if features.ncols() == 1 {
        sweep_neighborhoods(features, eps)
    } else {
        brute_force_neighborhoods(features, eps)
    }
}

fn brute_force_neighborhoods(features: ArrayView2<'_, f64>, eps: f64) -> Vec<Vec<usize>> {
    let n = features.nrows();

    (0..n)
        .into_par_iter()
        .map(|i| {
            let row = features.row(i);
            (0..n)
                .filter(|&j| {
                    let squared: f64 = row
                        .iter()
                        .zip(features.row(j).iter())
                        .map(|(a, b)| (a - b) * (a - b))
                        .sum();
                    squared.sqrt() <= eps
                })
                .collect()
        })
        .collect()
}

fn sweep_neighborhoods(features: ArrayView2<'_, f64>, eps: f64) -> Vec<Vec<usize>> {
    let values: Vec<f64> = features.column(0).to_vec();
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut position = vec![0; values.len()];
    for (pos, &row) in order.iter().enumerate() {
        position[row] = pos;
    }

    (0..values.len())
        .into_par_iter()
        .map(|row| {
            let value = values[row];
            let mut neighbors = vec![row];

            let mut pos = position[row];
            while pos > 0 && (value - values[order[pos - 1]]).abs() <= eps {
                pos -= 1;
                neighbors.push(order[pos]);
            }

            let mut pos = position[row] + 1;
            while pos < order.len() && (values[order[pos]] - value).abs() <= eps {
                neighbors.push(order[pos]);
                pos += 1;
            }

            neighbors.sort_unstable();
            neighbors
        })
        .collect()
}

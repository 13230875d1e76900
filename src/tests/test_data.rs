//! Fixtures shared by the unit tests.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::core::{FeatureSpace, SimilarityMatrix};
use crate::graph::Graph;
use crate::tests::{id, ids};

/// Two directed 10-cliques (0..10 and 10..20) with unit weights, bridged by a
/// single weak edge `0 -> 10`.
pub fn two_cliques(bridge: Option<f64>) -> Graph {
    let mut edges = Vec::new();
    for block in [0u64, 10] {
        for i in block..block + 10 {
            for j in block..block + 10 {
                if i != j {
                    edges.push((id(i), id(j), 1.0));
                }
            }
        }
    }
    if let Some(w) = bridge {
        edges.push((id(0), id(10), w));
    }
    Graph::from_edges(ids(20), &edges).unwrap()
}

/// 6 items on a line: `S[i][j] = 1 / (1 + |i - j|)`.
pub fn six_item_matrix() -> SimilarityMatrix {
    let rows: Vec<Vec<f64>> = (0..6)
        .map(|i: i32| (0..6).map(|j: i32| 1.0 / (1.0 + (i - j).abs() as f64)).collect())
        .collect();
    SimilarityMatrix::from_rows(ids(6), rows).unwrap()
}

/// `n` Gaussian vectors of dimension `dim`, reproducible from `seed`.
pub fn gaussian_space(n: u64, dim: usize, seed: u64) -> FeatureSpace {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let rows: Vec<Vec<f64>> = (0..n)
        .map(|_| (0..dim).map(|_| StandardNormal.sample(&mut rng)).collect())
        .collect();
    FeatureSpace::new(ids(n), rows).unwrap()
}

/// Two blobs of `per_blob` points around `(0, 0)` and `(10, 10)`; ids `0..per_blob`
/// belong to the first.
pub fn two_blobs(per_blob: u64, seed: u64) -> FeatureSpace {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let rows: Vec<Vec<f64>> = (0..2 * per_blob)
        .map(|i| {
            let centre = if i < per_blob { 0.0 } else { 10.0 };
            (0..2)
                .map(|_| {
                    let noise: f64 = StandardNormal.sample(&mut rng);
                    centre + 0.5 * noise
                })
                .collect()
        })
        .collect();
    FeatureSpace::new(ids(2 * per_blob), rows).unwrap()
}

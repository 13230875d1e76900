//! Spectral clustering of similarity graphs.
//!
//! This module provides:
//! - `SpectralClusterer::bipartition`: sign split of the Fiedler vector of
//!   `L = D - max(A, Aᵀ)` into sides `A` (negative component) and `B` (zero or
//!   positive component)
//! - `SpectralClusterer::cluster`: k-means with `c` centroids on the embedding
//!   given by eigenvectors `2..=c`
//! - Helper functions for k-means and the Calinski-Harabasz score
//!
//! **DETERMINISTIC**: k-means is seeded (default seed 128) and labels are
//! renumbered by first appearance in vertex order, so identical graphs always
//! produce identical assignments.
//!
//! Disconnected graphs (Fiedler value ≈ 0 with multiplicity > 1) are not handled
//! specially: the split follows whatever basis the eigen-solver returns for the
//! null space.

use std::collections::HashMap;
use std::fmt;

use log::{debug, info, trace};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smartcore::cluster::kmeans::{KMeans, KMeansParameters};
use smartcore::linalg::basic::arrays::Array2;
use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::core::ItemId;
use crate::eigenmaps::EigenMaps;
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::laplacian::build_laplacian;

/// Default k-means seed.
pub const CLUSTERING_SEED: u64 = 128;

/// Side of a two-way spectral split.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => write!(f, "A"),
            Side::B => write!(f, "B"),
        }
    }
}

/// Two-way split with the spectral data that produced it.
#[derive(Clone, Debug)]
pub struct Bipartition {
    pub sides: HashMap<ItemId, Side>,
    pub fiedler_value: f64,
    /// Fiedler component per vertex, in graph vertex order.
    pub fiedler_vector: Vec<(ItemId, f64)>,
}

impl Bipartition {
    pub fn side(&self, id: &ItemId) -> Option<Side> {
        self.sides.get(id).copied()
    }

    /// Ids on `side`, ascending.
    pub fn members(&self, side: Side) -> Vec<ItemId> {
        let mut ids: Vec<ItemId> = self
            .sides
            .iter()
            .filter(|(_, s)| **s == side)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}

/// k-way assignment: every vertex carries exactly one label in `0..n_clusters`.
#[derive(Clone, Debug)]
pub struct ClusterAssignment {
    pub labels: HashMap<ItemId, usize>,
    pub n_clusters: usize,
    /// Spectral coordinates k-means ran on, in graph vertex order.
    pub embedding: Vec<(ItemId, Vec<f64>)>,
}

impl ClusterAssignment {
    pub fn label(&self, id: &ItemId) -> Option<usize> {
        self.labels.get(id).copied()
    }

    /// Ids carrying `label`, ascending.
    pub fn members(&self, label: usize) -> Vec<ItemId> {
        let mut ids: Vec<ItemId> = self
            .labels
            .iter()
            .filter(|(_, l)| **l == label)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Number of vertices per label.
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters];
        for &l in self.labels.values() {
            sizes[l] += 1;
        }
        sizes
    }

    /// Calinski-Harabasz score of the assignment on its embedding.
    pub fn calinski_harabasz(&self) -> f64 {
        let rows: Vec<Vec<f64>> = self.embedding.iter().map(|(_, r)| r.clone()).collect();
        let assignments: Vec<usize> = self
            .embedding
            .iter()
            .map(|(id, _)| self.labels[id])
            .collect();
        calinski_harabasz_score(&rows, &assignments, self.n_clusters)
    }
}

/// Configuration of the k-means stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpectralParams {
    pub kmeans_max_iter: usize,
    pub seed: u64,
}

impl Default for SpectralParams {
    fn default() -> Self {
        Self { kmeans_max_iter: 100, seed: CLUSTERING_SEED }
    }
}

/// Laplacian eigenvector partitioning of a `Graph`.
#[derive(Clone, Debug, Default)]
pub struct SpectralClusterer {
    params: SpectralParams,
}

impl SpectralClusterer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.params.seed = seed;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.params.kmeans_max_iter = max_iter.max(1);
        self
    }

    pub fn params(&self) -> &SpectralParams {
        &self.params
    }

    /// Split `graph` by the sign of its Fiedler vector.
    ///
    /// Negative components go to `A`; zero and positive components go to `B`.
    pub fn bipartition(&self, graph: &Graph) -> Result<Bipartition> {
        if graph.is_empty() {
            return Err(Error::EmptyGraph);
        }
        info!("Spectral bipartition of {} vertices", graph.len());
        let laplacian = build_laplacian(graph)?;
        let (fiedler_value, fiedler) = laplacian.fiedler()?;

        let mut sides = HashMap::with_capacity(graph.len());
        let mut fiedler_vector = Vec::with_capacity(graph.len());
        for (id, &x) in graph.ids().iter().zip(fiedler.iter()) {
            let side = if x < 0.0 { Side::A } else { Side::B };
            trace!("{} -> {} ({:.6})", id, side, x);
            sides.insert(id.clone(), side);
            fiedler_vector.push((id.clone(), x));
        }

        let in_a = sides.values().filter(|s| **s == Side::A).count();
        debug!(
            "Bipartition: |A|={}, |B|={}, Fiedler value {:.6}",
            in_a,
            graph.len() - in_a,
            fiedler_value
        );
        Ok(Bipartition { sides, fiedler_value, fiedler_vector })
    }

    /// Partition `graph` into `c` clusters.
    ///
    /// Fails with `InvalidParameter` unless `2 <= c < |V|`.
    pub fn cluster(&self, graph: &Graph, c: usize) -> Result<ClusterAssignment> {
        if graph.is_empty() {
            return Err(Error::EmptyGraph);
        }
        let n = graph.len();
        if c < 2 || c >= n {
            return Err(Error::invalid(
                "c",
                format!("cluster count must satisfy 2 <= c < {}, got {}", n, c),
            ));
        }
        info!("Spectral clustering of {} vertices into {} clusters", n, c);

        let laplacian = build_laplacian(graph)?;
        let embedding = laplacian.spectral_embedding(c - 1)?;
        let raw = kmeans_lloyd(&embedding, c, self.params.kmeans_max_iter, self.params.seed)?;
        let assignments = relabel_by_first_appearance(&raw);

        let labels: HashMap<ItemId, usize> = graph
            .ids()
            .iter()
            .cloned()
            .zip(assignments.iter().copied())
            .collect();
        let assignment = ClusterAssignment {
            labels,
            n_clusters: c,
            embedding: graph.ids().iter().cloned().zip(embedding).collect(),
        };
        debug!("Cluster sizes: {:?}", assignment.sizes());
        Ok(assignment)
    }
}

/// Renumber labels `0..` in order of first appearance.
fn relabel_by_first_appearance(raw: &[usize]) -> Vec<usize> {
    let mut mapping: HashMap<usize, usize> = HashMap::new();
    raw.iter()
        .map(|l| {
            let next = mapping.len();
            *mapping.entry(*l).or_insert(next)
        })
        .collect()
}

/// Seeded k-means over `rows` (one sample per row); returns one label per row.
///
/// `k` is capped at the number of rows. Labels come straight from smartcore and
/// are not renumbered.
pub fn kmeans_lloyd(rows: &[Vec<f64>], k: usize, max_iter: usize, seed: u64) -> Result<Vec<usize>> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let (n, dims) = (rows.len(), first.len());
    let x: DenseMatrix<f64> =
        DenseMatrix::from_iterator(rows.iter().flat_map(|r| r.iter().copied()), n, dims, 0);

    let params = KMeansParameters { k: k.min(n), max_iter, seed: Some(seed) };
    let model: KMeans<f64, usize, DenseMatrix<f64>, Vec<usize>> = KMeans::fit(&x, params)?;
    let labels = model.predict(&x)?;
    trace!("k-means labelled {} samples", labels.len());
    Ok(labels)
}

/// Calinski-Harabasz index `(B / (k - 1)) / (W / (n - k))` of a labelling.
///
/// `B` and `W` are the between- and within-cluster sums of squares. Returns 0
/// when the index is undefined (`k < 2`, `k >= n`, or `W ≈ 0`).
pub fn calinski_harabasz_score(rows: &[Vec<f64>], assignments: &[usize], k: usize) -> f64 {
    let n = rows.len();
    if k < 2 || k >= n {
        return 0.0;
    }
    let dims = rows[0].len();

    let mut sums = vec![vec![0.0; dims]; k];
    let mut counts = vec![0usize; k];
    let mut mean = vec![0.0; dims];
    for (row, &label) in rows.iter().zip(assignments) {
        for (d, &x) in row.iter().enumerate() {
            mean[d] += x / n as f64;
            if label < k {
                sums[label][d] += x;
            }
        }
        if label < k {
            counts[label] += 1;
        }
    }
    let centroids: Vec<Vec<f64>> = sums
        .into_iter()
        .zip(&counts)
        .map(|(sum, &c)| sum.into_iter().map(|x| x / c.max(1) as f64).collect())
        .collect();

    let sq = |a: &[f64], b: &[f64]| -> f64 { a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum() };
    let between: f64 = centroids
        .iter()
        .zip(&counts)
        .map(|(c, &size)| size as f64 * sq(c, &mean))
        .sum();
    let within: f64 = rows
        .par_iter()
        .zip(assignments.par_iter())
        .filter(|(_, label)| **label < k)
        .map(|(row, label)| sq(row, &centroids[*label]))
        .sum();

    if within < 1e-10 {
        return 0.0;
    }
    (between / (k - 1) as f64) / (within / (n - k) as f64)
}

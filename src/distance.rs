//! Distance and similarity functions over feature vectors.
//!
//! Every metric is exposed both as a distance (lower = closer) and as a
//! similarity (higher = closer, non-negative) so the same vectors can feed the
//! graph builder, the LSH re-ranker and the exemplar classifier.
//!
//! - L_p metrics map distance to similarity with `1 / (1 + d)`, giving `(0, 1]`.
//! - `Cosine` uses rectified cosine similarity `max(0, cos)`, and distance
//!   `1 - max(0, cos)`, so negatively correlated items are simply unrelated.
//!
//! `similarity_matrix` fills the full item×item table in parallel (one rayon task
//! per row). `k_nearest` is the exact neighbour search: the candidate set is split
//! into partitions, each partition keeps its local k smallest, and partitions are
//! merged with an order-independent k-smallest reduction.

use std::cmp::Ordering;

use log::{debug, info, trace, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::arrays::Array2;
use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::core::{FeatureSpace, ItemId, SimilarityMatrix};
use crate::error::{Error, Result};

/// Closed set of supported metrics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum DistanceMetric {
    #[default]
    Euclidean,
    Manhattan,
    /// General L_p distance, `p >= 1`.
    Minkowski(f64),
    Cosine,
}

impl DistanceMetric {
    /// Reject parameters that do not define a metric.
    pub fn validate(&self) -> Result<()> {
        match self {
            DistanceMetric::Minkowski(p) if !(p.is_finite() && *p >= 1.0) => {
                Err(Error::invalid("p", format!("Minkowski order must be >= 1, got {}", p)))
            }
            _ => Ok(()),
        }
    }

    /// Distance between two vectors of equal length.
    pub fn distance(&self, a: &[f64], b: &[f64]) -> Result<f64> {
        if a.len() != b.len() {
            return Err(Error::DimensionMismatch { expected: a.len(), found: b.len() });
        }
        Ok(self.distance_unchecked(a, b))
    }

    /// Similarity in `[0, 1]` derived from the distance.
    pub fn similarity(&self, a: &[f64], b: &[f64]) -> Result<f64> {
        if a.len() != b.len() {
            return Err(Error::DimensionMismatch { expected: a.len(), found: b.len() });
        }
        Ok(self.similarity_unchecked(a, b))
    }

    #[inline]
    pub(crate) fn distance_unchecked(&self, a: &[f64], b: &[f64]) -> f64 {
        match *self {
            DistanceMetric::Euclidean => euclidean_dist(a, b),
            DistanceMetric::Manhattan => a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum(),
            DistanceMetric::Minkowski(p) => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y).abs().powf(p))
                .sum::<f64>()
                .powf(1.0 / p),
            DistanceMetric::Cosine => 1.0 - cosine_similarity(a, b).max(0.0),
        }
    }

    #[inline]
    pub(crate) fn similarity_unchecked(&self, a: &[f64], b: &[f64]) -> f64 {
        match *self {
            DistanceMetric::Cosine => cosine_similarity(a, b).max(0.0),
            _ => 1.0 / (1.0 + self.distance_unchecked(a, b)),
        }
    }
}

pub fn euclidean_dist(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Cosine similarity in `[-1, 1]`; 0.0 if either vector has zero norm.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let na = dot(a, a).sqrt();
    let nb = dot(b, b).sqrt();
    let denom = na * nb;
    if denom > 1e-15 {
        (dot(a, b) / denom).clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Reject vectors holding NaN or infinite components.
pub(crate) fn check_finite(name: &'static str, v: &[f64]) -> Result<()> {
    match v.iter().position(|x| !x.is_finite()) {
        Some(p) => Err(Error::invalid(name, format!("component {} is {}", p, v[p]))),
        None => Ok(()),
    }
}

/// Ascending distance, ties broken by ascending id.
pub(crate) fn cmp_distance_then_id(a: &(ItemId, f64), b: &(ItemId, f64)) -> Ordering {
    a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0))
}

/// Full item×item similarity matrix, indexed by the space's ids.
///
/// The diagonal holds each item's self-similarity; the graph builder ignores it.
pub fn similarity_matrix(space: &FeatureSpace, metric: DistanceMetric) -> Result<SimilarityMatrix> {
    metric.validate()?;
    let n = space.len();
    info!("Computing {}x{} similarity matrix with {:?}", n, n, metric);

    let rows: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|i| {
            let a = space.row(i);
            (0..n)
                .map(|j| metric.similarity_unchecked(a, space.row(j)))
                .collect()
        })
        .collect();

    let values = DenseMatrix::from_iterator(rows.into_iter().flatten(), n, n, 0);
    debug!("Similarity matrix ready: {} entries", n * n);
    Ok(SimilarityMatrix::from_dense(space.ids().to_vec(), values))
}

/// Exact k nearest items of `query`, ascending by distance (ties by id).
///
/// Items in `exclude` are never returned, which is how an item is kept out of its
/// own neighbour list. Fails with `InsufficientData` if fewer than `k` candidates
/// remain, and with `DimensionMismatch` if the query has the wrong length.
pub fn k_nearest(
    space: &FeatureSpace,
    query: &[f64],
    k: usize,
    metric: DistanceMetric,
    exclude: &[ItemId],
) -> Result<Vec<(ItemId, f64)>> {
    metric.validate()?;
    if k == 0 {
        return Err(Error::invalid("k", "must be at least 1"));
    }
    if query.len() != space.nfeatures() {
        return Err(Error::DimensionMismatch { expected: space.nfeatures(), found: query.len() });
    }
    check_finite("query", query)?;
    let candidates: Vec<usize> = (0..space.len())
        .filter(|&i| !exclude.contains(&space.ids()[i]))
        .collect();
    if k > candidates.len() {
        return Err(Error::InsufficientData { requested: k, available: candidates.len() });
    }

    let partitions = rayon::current_num_threads().max(1);
    let chunk = candidates.len().div_ceil(partitions).max(1);
    trace!(
        "k_nearest: k={}, {} candidates in partitions of {}",
        k,
        candidates.len(),
        chunk
    );

    let nearest = candidates
        .par_chunks(chunk)
        .map(|part| {
            let mut local: Vec<(ItemId, f64)> = part
                .iter()
                .map(|&i| (space.ids()[i].clone(), metric.distance_unchecked(query, space.row(i))))
                .collect();
            local.sort_by(cmp_distance_then_id);
            local.truncate(k);
            local
        })
        .reduce(Vec::new, |mut acc, part| {
            acc.extend(part);
            acc.sort_by(cmp_distance_then_id);
            acc.truncate(k);
            acc
        });

    if nearest.iter().any(|(_, d)| !d.is_finite()) {
        warn!("k_nearest: non-finite distances in result; check input vectors");
    }
    Ok(nearest)
}

//! # viewgraph
//!
//! Graph analytics and approximate retrieval over item feature vectors
//! (photos, users, points of interest).
//!
//! Pipeline:
//!
//! 1. `core::FeatureSpace` / `core::SimilarityMatrix` hold the vectors and
//!    pairwise similarities served by the feature store.
//! 2. `builder::SimilarityGraphBuilder` keeps the `k` most similar items per
//!    vertex and produces a `graph::Graph`.
//! 3. `ranking::RandomWalkRankingEngine` runs global or personalized PageRank on
//!    the graph; `clustering::SpectralClusterer` partitions it through the
//!    Laplacian eigenvectors (`laplacian`, `eigenmaps`).
//! 4. Independently of the graph, `lsh::LshIndex` narrows nearest-neighbour
//!    candidates and `classifier::ExemplarClassifier` labels items by k-NN vote.
//!
//! ```
//! use viewgraph::builder::SimilarityGraphBuilder;
//! use viewgraph::core::{FeatureSpace, ItemId};
//! use viewgraph::distance::DistanceMetric;
//! use viewgraph::ranking::{RandomWalkRankingEngine, RestartDistribution};
//!
//! let ids: Vec<ItemId> = (0..4u64).map(ItemId::from).collect();
//! let space = FeatureSpace::new(
//!     ids,
//!     vec![vec![0.0, 0.0], vec![0.1, 0.0], vec![1.0, 1.0], vec![1.1, 1.0]],
//! ).unwrap();
//!
//! let graph = SimilarityGraphBuilder::new()
//!     .with_k(2)
//!     .build_from_features(&space, DistanceMetric::Euclidean)
//!     .unwrap();
//! let ranks = RandomWalkRankingEngine::default()
//!     .rank(&graph, &RestartDistribution::Uniform)
//!     .unwrap();
//!
//! let total: f64 = ranks.scores().iter().sum();
//! assert!((total - 1.0).abs() < 1e-6);
//! ```

pub mod builder;
pub mod classifier;
pub mod clustering;
pub mod core;
pub mod distance;
pub mod eigenmaps;
pub mod error;
pub mod graph;
pub mod laplacian;
pub mod lsh;
pub mod ranking;

#[cfg(test)]
mod tests;

pub use crate::builder::{GraphParams, SimilarityGraphBuilder};
pub use crate::classifier::{ClassifierParams, ExemplarClassifier, ExemplarSet};
pub use crate::clustering::{Bipartition, ClusterAssignment, Side, SpectralClusterer};
pub use crate::core::{FeatureSpace, ItemId, LabelTable, SimilarityMatrix};
pub use crate::distance::DistanceMetric;
pub use crate::error::{Error, Result};
pub use crate::graph::{Graph, GraphStats};
pub use crate::lsh::{HashFamily, LshIndex, LshParams};
pub use crate::ranking::{RandomWalkRankingEngine, RankParams, RankVector, RestartDistribution};

/// Install an `env_logger` backend driven by `RUST_LOG`. Safe to call repeatedly.
pub fn init() {
    let _ = env_logger::builder().is_test(cfg!(test)).try_init();
}

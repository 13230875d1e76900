//! Random-walk ranking: global and personalized PageRank by power iteration.
//!
//! The walk runs on the row-stochastic matrix `M` obtained by dividing every
//! out-edge weight by its row sum. Each step
//!
//! ```text
//! r_new = d · Mᵀ r_old + (d · sink_mass + (1 - d)) · restart
//! ```
//!
//! where `sink_mass` is the rank currently held by vertices without outgoing
//! weight. Sinks therefore jump according to the restart distribution instead of
//! uniformly, and no rank mass is lost: every iterate is a probability vector.
//!
//! Iteration stops when the L1 change is `<= tolerance` or after `max_iter` steps;
//! hitting the cap is reported through `RankVector::converged`, not as an error.
//! Within one step the product `Mᵀ r` is split across the rayon pool by
//! destination vertex; steps themselves run strictly in order.

use std::collections::HashSet;
use std::sync::Arc;

use approx::relative_eq;
use log::{debug, info, trace, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sprs::{CsMat, TriMat};

use crate::core::ItemId;
use crate::error::{Error, Result};
use crate::graph::{Graph, VertexIndex};

/// Restart mass must sum to one within this tolerance.
const DISTRIBUTION_TOLERANCE: f64 = 1e-6;

/// Power-iteration parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankParams {
    pub damping: f64,
    /// L1 change between iterates at which the walk is considered converged.
    pub tolerance: f64,
    pub max_iter: usize,
}

impl Default for RankParams {
    fn default() -> Self {
        Self { damping: 0.85, tolerance: 1e-3, max_iter: 100 }
    }
}

impl PartialEq for RankParams {
    fn eq(&self, other: &Self) -> bool {
        self.max_iter == other.max_iter
            && relative_eq!(self.damping, other.damping)
            && relative_eq!(self.tolerance, other.tolerance)
    }
}

impl RankParams {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.damping) {
            return Err(Error::invalid(
                "damping",
                format!("must lie in [0, 1], got {}", self.damping),
            ));
        }
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(Error::invalid(
                "tolerance",
                format!("must be finite and non-negative, got {}", self.tolerance),
            ));
        }
        Ok(())
    }
}

/// Where the walk restarts (and where sinks send their mass).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RestartDistribution {
    /// `1/|V|` everywhere: global PageRank.
    Uniform,
    /// `1/|seeds|` on each seed: personalized PageRank.
    Seeds(Vec<ItemId>),
    /// Explicit probabilities; must be non-negative and sum to one.
    Weighted(Vec<(ItemId, f64)>),
}

impl RestartDistribution {
    /// Dense probability vector over `graph`'s vertices.
    pub fn resolve(&self, graph: &Graph) -> Result<Vec<f64>> {
        let n = graph.len();
        let lookup = |id: &ItemId| {
            graph.position(id).map_err(|_| {
                Error::invalid("restart_distribution", format!("{} is not a vertex of the graph", id))
            })
        };

        match self {
            RestartDistribution::Uniform => Ok(vec![1.0 / n as f64; n]),
            RestartDistribution::Seeds(seeds) => {
                let unique: HashSet<&ItemId> = seeds.iter().collect();
                if unique.is_empty() {
                    return Err(Error::invalid("restart_distribution", "seed set is empty"));
                }
                let share = 1.0 / unique.len() as f64;
                let mut restart = vec![0.0; n];
                for id in unique {
                    restart[lookup(id)?] = share;
                }
                Ok(restart)
            }
            RestartDistribution::Weighted(weights) => {
                let mut restart = vec![0.0; n];
                for (id, w) in weights {
                    if !(w.is_finite() && *w >= 0.0) {
                        return Err(Error::invalid(
                            "restart_distribution",
                            format!("probability of {} is {}", id, w),
                        ));
                    }
                    restart[lookup(id)?] += w;
                }
                let total: f64 = restart.iter().sum();
                if (total - 1.0).abs() > DISTRIBUTION_TOLERANCE {
                    return Err(Error::invalid(
                        "restart_distribution",
                        format!("probabilities sum to {}, expected 1", total),
                    ));
                }
                Ok(restart)
            }
        }
    }
}

/// Stationary distribution of the walk, one score per vertex.
#[derive(Debug, Clone)]
pub struct RankVector {
    vertices: Arc<VertexIndex>,
    scores: Vec<f64>,
    iterations: usize,
    residual: f64,
    converged: bool,
}

impl RankVector {
    /// Vertex ids, aligned with `scores`.
    pub fn ids(&self) -> &[ItemId] {
        self.vertices.ids()
    }

    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    pub fn score(&self, id: &ItemId) -> Option<f64> {
        self.vertices.get(id).map(|i| self.scores[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ItemId, f64)> {
        self.vertices.ids().iter().zip(self.scores.iter().copied())
    }

    /// The `n` highest-ranked vertices, descending; ties by ascending id.
    pub fn top(&self, n: usize) -> Vec<(ItemId, f64)> {
        let mut ranked: Vec<(ItemId, f64)> =
            self.iter().map(|(id, s)| (id.clone(), s)).collect();
        ranked.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked.truncate(n);
        ranked
    }

    /// Power-iteration steps performed.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// L1 change of the last step (0 when no step ran).
    pub fn residual(&self) -> f64 {
        self.residual
    }

    /// Whether the tolerance was met before the iteration cap.
    pub fn converged(&self) -> bool {
        self.converged
    }
}

/// Global and personalized PageRank over a `Graph`.
#[derive(Debug, Clone, Default)]
pub struct RandomWalkRankingEngine {
    params: RankParams,
}

impl RandomWalkRankingEngine {
    pub fn new(params: RankParams) -> Self {
        Self { params }
    }

    pub fn with_damping(mut self, damping: f64) -> Self {
        self.params.damping = damping;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.params.tolerance = tolerance;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.params.max_iter = max_iter;
        self
    }

    pub fn params(&self) -> &RankParams {
        &self.params
    }

    /// Rank with the engine's configured parameters.
    pub fn rank(&self, graph: &Graph, restart: &RestartDistribution) -> Result<RankVector> {
        rank(
            graph,
            self.params.damping,
            restart,
            self.params.max_iter,
            self.params.tolerance,
        )
    }

    /// Global PageRank (uniform restart).
    pub fn global(&self, graph: &Graph) -> Result<RankVector> {
        self.rank(graph, &RestartDistribution::Uniform)
    }

    /// Personalized PageRank restarting on `seeds`.
    pub fn personalized(&self, graph: &Graph, seeds: &[ItemId]) -> Result<RankVector> {
        self.rank(graph, &RestartDistribution::Seeds(seeds.to_vec()))
    }
}

/// `Mᵀ` with `M` the row-normalised adjacency, plus the sink mask.
fn transition_transpose(graph: &Graph) -> (CsMat<f64>, Vec<bool>) {
    let n = graph.len();
    let mut triplets = TriMat::new((n, n));
    let mut sinks = vec![false; n];
    for (i, sink) in sinks.iter_mut().enumerate() {
        let edges = graph.out_edges(i);
        let row_sum: f64 = edges.iter().map(|&(_, w)| w).sum();
        if row_sum <= 0.0 {
            *sink = true;
            continue;
        }
        for &(j, w) in edges {
            triplets.add_triplet(j, i, w / row_sum);
        }
    }
    (triplets.to_csr(), sinks)
}

/// Run power iteration on `graph`.
///
/// Fails with `EmptyGraph` on a graph without vertices and with
/// `InvalidParameter` for a damping outside `[0, 1]`, a negative tolerance, or a
/// restart distribution that does not sum to one or names unknown ids.
pub fn rank(
    graph: &Graph,
    damping: f64,
    restart: &RestartDistribution,
    max_iter: usize,
    tolerance: f64,
) -> Result<RankVector> {
    if graph.is_empty() {
        return Err(Error::EmptyGraph);
    }
    RankParams { damping, tolerance, max_iter }.validate()?;
    let restart = restart.resolve(graph)?;
    let n = graph.len();

    info!(
        "Ranking {} vertices: damping={}, tolerance={:.1e}, max_iter={}",
        n, damping, tolerance, max_iter
    );
    let (mt, sinks) = transition_transpose(graph);
    let n_sinks = sinks.iter().filter(|&&s| s).count();
    if n_sinks > 0 {
        warn!("{} sink vertices redistribute their rank via the restart distribution", n_sinks);
    }

    let mut ranks = restart.clone();
    let mut iterations = 0;
    let mut residual = 0.0;
    let mut converged = false;

    while iterations < max_iter {
        let sink_mass: f64 = ranks
            .iter()
            .zip(&sinks)
            .filter(|(_, &s)| s)
            .map(|(r, _)| r)
            .sum();
        let restart_scale = damping * sink_mass + (1.0 - damping);

        let next: Vec<f64> = (0..n)
            .into_par_iter()
            .map(|j| {
                let inflow: f64 = mt
                    .outer_view(j)
                    .map(|row| row.iter().map(|(i, &p)| p * ranks[i]).sum())
                    .unwrap_or(0.0);
                damping * inflow + restart_scale * restart[j]
            })
            .collect();

        residual = ranks.iter().zip(&next).map(|(a, b)| (a - b).abs()).sum();
        ranks = next;
        iterations += 1;
        trace!("Iteration {}: L1 change {:.3e}", iterations, residual);

        if residual <= tolerance {
            converged = true;
            break;
        }
    }

    // absorb floating drift so the output stays a distribution
    let total: f64 = ranks.iter().sum();
    if total > 0.0 {
        ranks.iter_mut().for_each(|r| *r = (*r / total).max(0.0));
    }

    if converged {
        debug!("Converged after {} iterations (L1 change {:.3e})", iterations, residual);
    } else if max_iter > 0 {
        warn!(
            "No convergence within {} iterations (L1 change {:.3e} > {:.1e})",
            max_iter, residual, tolerance
        );
    }

    Ok(RankVector {
        vertices: graph.vertex_index(),
        scores: ranks,
        iterations,
        residual,
        converged,
    })
}

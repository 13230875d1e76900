use std::sync::Arc;

use log::{debug, info, trace};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::{FeatureSpace, SimilarityMatrix};
use crate::distance::{similarity_matrix, DistanceMetric};
use crate::error::{Error, Result};
use crate::graph::{Graph, VertexIndex};

/// Parameters of the bounded-out-degree similarity graph.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphParams {
    /// Out-degree of every vertex.
    pub k: usize,
    /// Vertices per parallel work unit; `None` lets the builder split the rows
    /// evenly across the rayon pool.
    pub parallel_chunk: Option<usize>,
}

impl Default for GraphParams {
    fn default() -> Self {
        Self { k: 5, parallel_chunk: None }
    }
}

/// Builds a k-most-similar directed graph from a pairwise similarity matrix.
///
/// For each vertex the k highest-similarity counterparts (never itself) become its
/// out-edges with weight = similarity. Equal similarities are resolved by ascending
/// item id, so repeated builds over the same matrix produce identical graphs.
///
/// Rows are processed in independent partitions on the rayon pool; every partition
/// owns a disjoint set of source vertices and results are concatenated in vertex
/// order, so no locking is needed and the outcome does not depend on scheduling.
#[derive(Clone, Debug, Default)]
pub struct SimilarityGraphBuilder {
    params: GraphParams,
}

impl SimilarityGraphBuilder {
    pub fn new() -> Self {
        info!("Initializing new SimilarityGraphBuilder");
        Self::default()
    }

    pub fn from_params(params: GraphParams) -> Self {
        Self { params }
    }

    /// Out-degree of every vertex in the built graph.
    pub fn with_k(mut self, k: usize) -> Self {
        info!("Configuring similarity graph: k={}", k);
        self.params.k = k;
        self
    }

    /// Fix the number of vertices each parallel work unit handles.
    pub fn with_parallel_chunk(mut self, chunk: usize) -> Self {
        debug!("Parallel chunk size set to {}", chunk);
        self.params.parallel_chunk = Some(chunk.max(1));
        self
    }

    pub fn params(&self) -> &GraphParams {
        &self.params
    }

    /// Build a graph from `matrix`.
    ///
    /// Fails with `InconsistentIndex` if the matrix axes do not carry the same ids,
    /// and with `InvalidParameter` if `k == 0`, `k >= |V|`, or an off-diagonal
    /// similarity is not finite.
    pub fn build(&self, matrix: &SimilarityMatrix) -> Result<Graph> {
        matrix.check_square_index()?;
        let n = matrix.row_ids().len();
        let k = self.params.k;
        if k == 0 {
            return Err(Error::invalid("k", "must be at least 1"));
        }
        if k >= n {
            return Err(Error::invalid(
                "k",
                format!("must be smaller than the number of items ({}), got {}", n, k),
            ));
        }

        let non_finite = (0..n)
            .into_par_iter()
            .find_map_first(|i| (0..n).find(|&j| j != i && !matrix.get(i, j).is_finite()).map(|j| (i, j)));
        if let Some((i, j)) = non_finite {
            return Err(Error::invalid(
                "similarity",
                format!("{} -> {} is {}", matrix.row_ids()[i], matrix.row_ids()[j], matrix.get(i, j)),
            ));
        }

        info!("Building similarity graph for {} items with k={}", n, k);
        let vertices = Arc::new(VertexIndex::new(matrix.row_ids().to_vec())?);
        let ids = matrix.row_ids();

        let chunk = self
            .params
            .parallel_chunk
            .unwrap_or_else(|| n.div_ceil(rayon::current_num_threads().max(1)))
            .max(1);
        debug!("Selecting top-{} neighbours in partitions of {} rows", k, chunk);

        let rows: Vec<usize> = (0..n).collect();
        let adjacency: Vec<Vec<(usize, f64)>> = rows
            .par_chunks(chunk)
            .flat_map_iter(|part| {
                part.iter().map(|&i| {
                    let mut candidates: Vec<(usize, f64)> = (0..n)
                        .filter(|&j| j != i)
                        .map(|j| (j, matrix.get(i, j)))
                        .collect();
                    candidates.sort_by(|a, b| {
                        b.1.total_cmp(&a.1)
                            .then_with(|| ids[a.0].cmp(&ids[b.0]))
                    });
                    candidates.truncate(k);
                    if i % 500 == 0 {
                        trace!("Item {} keeps {} neighbours", ids[i], candidates.len());
                    }
                    candidates
                })
            })
            .collect();

        let graph = Graph::from_parts(vertices, adjacency)?;
        debug!("{}", graph.statistics());
        info!(
            "Similarity graph built: {} vertices, {} edges",
            graph.len(),
            graph.edge_count()
        );
        Ok(graph)
    }

    /// Compute the similarity matrix of `space` under `metric`, then build.
    pub fn build_from_features(
        &self,
        space: &FeatureSpace,
        metric: DistanceMetric,
    ) -> Result<Graph> {
        info!(
            "Building similarity graph from {} feature vectors ({} features)",
            space.len(),
            space.nfeatures()
        );
        let matrix = similarity_matrix(space, metric)?;
        self.build(&matrix)
    }
}

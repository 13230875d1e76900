//! Weighted directed similarity graph.
//!
//! `Graph` is a value type: vertex ids are interned once into a shared arena
//! (`Arc<VertexIndex>`) mapping each id to a dense index, and edges are stored
//! per source as `(dst_index, weight)` lists. Every transform (`trim`) returns a
//! new graph that shares the arena and owns fresh edge lists, so downstream
//! algorithms can hold sparser views without touching the original.
//!
//! Invariants held by every constructed graph:
//! - no self-loops, at most one edge per ordered pair;
//! - weights are finite and non-negative;
//! - each out-edge list is ordered by descending weight, ties by ascending id.
//!
//! The adjacency matrix (`adjacency_matrix`, `dense_adjacency`) is a disposable
//! projection recomputed from the edge lists on demand.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::arrays::Array2;
use smartcore::linalg::basic::matrix::DenseMatrix;
use sprs::{CsMat, TriMat};

use crate::core::{index_ids, ItemId};
use crate::error::{Error, Result};

const SNAPSHOT_VERSION: u32 = 1;

/// Interned vertex set shared between a graph and its trimmed derivatives.
#[derive(Debug, PartialEq)]
pub(crate) struct VertexIndex {
    ids: Vec<ItemId>,
    index: HashMap<ItemId, usize>,
}

impl VertexIndex {
    pub(crate) fn new(ids: Vec<ItemId>) -> Result<Self> {
        let index = index_ids(&ids)?;
        Ok(Self { ids, index })
    }

    pub(crate) fn ids(&self) -> &[ItemId] {
        &self.ids
    }

    pub(crate) fn get(&self, id: &ItemId) -> Option<usize> {
        self.index.get(id).copied()
    }
}

/// Directed weighted graph over a fixed vertex set.
#[derive(Clone, Debug, PartialEq)]
pub struct Graph {
    vertices: Arc<VertexIndex>,
    adjacency: Vec<Vec<(usize, f64)>>,
}

/// On-disk form written by `persist`.
#[derive(Serialize, Deserialize)]
struct GraphSnapshot {
    version: u32,
    ids: Vec<ItemId>,
    edges: Vec<(u32, u32, f64)>,
}

impl Graph {
    /// Assemble a graph from a vertex arena and per-source edge lists, checking
    /// the structural invariants and normalising edge order.
    pub(crate) fn from_parts(
        vertices: Arc<VertexIndex>,
        mut adjacency: Vec<Vec<(usize, f64)>>,
    ) -> Result<Self> {
        let n = vertices.ids.len();
        if adjacency.len() != n {
            return Err(Error::InconsistentIndex(format!(
                "{} edge lists for {} vertices",
                adjacency.len(),
                n
            )));
        }
        for (src, row) in adjacency.iter_mut().enumerate() {
            for &(dst, w) in row.iter() {
                if dst >= n {
                    return Err(Error::InconsistentIndex(format!(
                        "edge {} -> #{} points outside {} vertices",
                        vertices.ids[src], dst, n
                    )));
                }
                if dst == src {
                    return Err(Error::InconsistentIndex(format!(
                        "self-loop on {}",
                        vertices.ids[src]
                    )));
                }
                if !(w.is_finite() && w >= 0.0) {
                    return Err(Error::invalid(
                        "weight",
                        format!("edge {} -> {} has weight {}", vertices.ids[src], vertices.ids[dst], w),
                    ));
                }
            }
            row.sort_by(|a, b| {
                b.1.total_cmp(&a.1)
                    .then_with(|| vertices.ids[a.0].cmp(&vertices.ids[b.0]))
            });
            let mut seen: Vec<usize> = row.iter().map(|&(d, _)| d).collect();
            seen.sort_unstable();
            if seen.windows(2).any(|w| w[0] == w[1]) {
                return Err(Error::InconsistentIndex(format!(
                    "duplicate edge from {}",
                    vertices.ids[src]
                )));
            }
        }
        Ok(Self { vertices, adjacency })
    }

    /// Build from ids and `(src, dst, weight)` triples.
    pub fn from_edges(ids: Vec<ItemId>, edges: &[(ItemId, ItemId, f64)]) -> Result<Self> {
        let vertices = VertexIndex::new(ids)?;
        let mut adjacency = vec![Vec::new(); vertices.ids.len()];
        for (src, dst, w) in edges {
            let s = *vertices.index.get(src).ok_or_else(|| Error::UnknownItem(src.clone()))?;
            let d = *vertices.index.get(dst).ok_or_else(|| Error::UnknownItem(dst.clone()))?;
            adjacency[s].push((d, *w));
        }
        Self::from_parts(Arc::new(vertices), adjacency)
    }

    fn ensure_built(&self) -> Result<()> {
        if self.vertices.ids.is_empty() {
            Err(Error::EmptyGraph)
        } else {
            Ok(())
        }
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.vertices.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.ids.is_empty()
    }

    /// Number of directed edges.
    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(|r| r.len()).sum()
    }

    /// Shared handle on the vertex arena.
    pub(crate) fn vertex_index(&self) -> Arc<VertexIndex> {
        Arc::clone(&self.vertices)
    }

    /// Vertex ids in dense-index order.
    pub fn ids(&self) -> &[ItemId] {
        &self.vertices.ids
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.vertices.index.contains_key(id)
    }

    /// Dense index of a vertex.
    pub fn position(&self, id: &ItemId) -> Result<usize> {
        self.vertices
            .index
            .get(id)
            .copied()
            .ok_or_else(|| Error::UnknownItem(id.clone()))
    }

    /// Out-edges of the vertex at dense index `i`, by descending weight.
    #[inline]
    pub(crate) fn out_edges(&self, i: usize) -> &[(usize, f64)] {
        &self.adjacency[i]
    }

    /// Weight of the directed edge `src -> dst`.
    pub fn edge_weight(&self, src: &ItemId, dst: &ItemId) -> Result<f64> {
        self.ensure_built()?;
        let not_found = || Error::EdgeNotFound { src: src.clone(), dst: dst.clone() };
        let s = self.vertices.index.get(src).ok_or_else(not_found)?;
        let d = self.vertices.index.get(dst).ok_or_else(not_found)?;
        self.adjacency[*s]
            .iter()
            .find(|(j, _)| j == d)
            .map(|&(_, w)| w)
            .ok_or_else(not_found)
    }

    /// Outgoing `(neighbor, weight)` pairs of `id`.
    ///
    /// Returned by descending weight, but callers that need ranked order should
    /// not rely on it across versions and sort explicitly.
    pub fn neighbors(&self, id: &ItemId) -> Result<Vec<(ItemId, f64)>> {
        self.ensure_built()?;
        let i = self.position(id)?;
        Ok(self.adjacency[i]
            .iter()
            .map(|&(j, w)| (self.vertices.ids[j].clone(), w))
            .collect())
    }

    /// Out-degree of `id`.
    pub fn out_degree(&self, id: &ItemId) -> Result<usize> {
        self.ensure_built()?;
        Ok(self.adjacency[self.position(id)?].len())
    }

    /// All edges as `(src, dst, weight)`.
    pub fn edges(&self) -> impl Iterator<Item = (&ItemId, &ItemId, f64)> {
        self.adjacency.iter().enumerate().flat_map(move |(i, row)| {
            row.iter()
                .map(move |&(j, w)| (&self.vertices.ids[i], &self.vertices.ids[j], w))
        })
    }

    /// Vertices without outgoing edges.
    pub fn sinks(&self) -> Vec<&ItemId> {
        self.adjacency
            .iter()
            .enumerate()
            .filter(|(_, row)| row.is_empty())
            .map(|(i, _)| &self.vertices.ids[i])
            .collect()
    }

    /// New graph keeping only the `max_out_degree` heaviest out-edges per vertex.
    ///
    /// Ties are resolved by ascending neighbour id. The receiver is untouched and
    /// shares its vertex arena with the result.
    pub fn trim(&self, max_out_degree: usize) -> Result<Graph> {
        self.ensure_built()?;
        debug!(
            "Trimming graph of {} vertices to out-degree <= {}",
            self.len(),
            max_out_degree
        );
        let adjacency: Vec<Vec<(usize, f64)>> = self
            .adjacency
            .iter()
            .map(|row| row.iter().take(max_out_degree).copied().collect())
            .collect();
        let trimmed = Graph { vertices: Arc::clone(&self.vertices), adjacency };
        trace!(
            "Trim kept {} of {} edges",
            trimmed.edge_count(),
            self.edge_count()
        );
        Ok(trimmed)
    }

    /// Sparse `|V|×|V|` adjacency, `A[i][j]` = weight of `i -> j`.
    pub fn adjacency_matrix(&self) -> Result<CsMat<f64>> {
        self.ensure_built()?;
        let n = self.len();
        let mut triplets = TriMat::new((n, n));
        for (i, row) in self.adjacency.iter().enumerate() {
            for &(j, w) in row {
                triplets.add_triplet(i, j, w);
            }
        }
        let adjacency: CsMat<f64> = triplets.to_csr();
        trace!("Adjacency matrix {}x{} with {} non-zeros", n, n, adjacency.nnz());
        Ok(adjacency)
    }

    /// Dense form of `adjacency_matrix`.
    pub fn dense_adjacency(&self) -> Result<DenseMatrix<f64>> {
        self.ensure_built()?;
        let n = self.len();
        let mut data = vec![0.0; n * n];
        for (i, row) in self.adjacency.iter().enumerate() {
            for &(j, w) in row {
                data[i * n + j] = w;
            }
        }
        Ok(DenseMatrix::from_iterator(data.into_iter(), n, n, 0))
    }

    /// Summary statistics.
    pub fn statistics(&self) -> GraphStats {
        let degrees: Vec<usize> = self.adjacency.iter().map(|r| r.len()).collect();
        let nodes = self.len();
        let edges = self.edge_count();
        let (min_weight, max_weight) = self
            .adjacency
            .iter()
            .flatten()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, w)| {
                (lo.min(w), hi.max(w))
            });
        GraphStats {
            nodes,
            edges,
            sinks: degrees.iter().filter(|&&d| d == 0).count(),
            min_out_degree: degrees.iter().copied().min().unwrap_or(0),
            max_out_degree: degrees.iter().copied().max().unwrap_or(0),
            mean_out_degree: if nodes > 0 { edges as f64 / nodes as f64 } else { 0.0 },
            min_weight: if edges > 0 { min_weight } else { 0.0 },
            max_weight: if edges > 0 { max_weight } else { 0.0 },
        }
    }

    /// Write the full vertex and edge set to `path`.
    pub fn persist<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.ensure_built()?;
        let path = path.as_ref();
        let snapshot = GraphSnapshot {
            version: SNAPSHOT_VERSION,
            ids: self.vertices.ids.clone(),
            edges: self
                .adjacency
                .iter()
                .enumerate()
                .flat_map(|(i, row)| row.iter().map(move |&(j, w)| (i as u32, j as u32, w)))
                .collect(),
        };

        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, &snapshot)?;
        writer.flush()?;

        info!(
            "Persisted graph to {:?} ({} vertices, {} edges)",
            path,
            snapshot.ids.len(),
            snapshot.edges.len()
        );
        Ok(())
    }

    /// Read a graph written by `persist`.
    pub fn restore<P: AsRef<Path>>(path: P) -> Result<Graph> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let snapshot: GraphSnapshot = bincode::deserialize_from(reader)?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(Error::Serialization(format!(
                "graph snapshot version mismatch: expected {}, got {}",
                SNAPSHOT_VERSION, snapshot.version
            )));
        }

        let vertices = VertexIndex::new(snapshot.ids)?;
        let n = vertices.ids.len();
        let mut adjacency = vec![Vec::new(); n];
        for (src, dst, w) in snapshot.edges {
            let (s, d) = (src as usize, dst as usize);
            if s >= n {
                return Err(Error::Serialization(format!(
                    "edge source #{} outside {} vertices",
                    s, n
                )));
            }
            adjacency[s].push((d, w));
        }
        let graph = Self::from_parts(Arc::new(vertices), adjacency)?;
        if graph.is_empty() {
            warn!("Restored an empty graph from {:?}", path);
        }
        info!(
            "Restored graph from {:?} ({} vertices, {} edges)",
            path,
            graph.len(),
            graph.edge_count()
        );
        Ok(graph)
    }
}

/// Structure to hold graph statistics
#[derive(Debug, Clone, PartialEq)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub sinks: usize,
    pub min_out_degree: usize,
    pub max_out_degree: usize,
    pub mean_out_degree: f64,
    pub min_weight: f64,
    pub max_weight: f64,
}

impl fmt::Display for GraphStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Graph Statistics:")?;
        writeln!(f, "  Nodes: {}", self.nodes)?;
        writeln!(f, "  Edges: {}", self.edges)?;
        writeln!(f, "  Sinks: {}", self.sinks)?;
        writeln!(
            f,
            "  Out-degree range: [{}, {}], mean: {:.4}",
            self.min_out_degree, self.max_out_degree, self.mean_out_degree
        )?;
        writeln!(f, "  Weight range: [{:.4}, {:.4}]", self.min_weight, self.max_weight)?;
        Ok(())
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Graph ({} vertices, {} edges):", self.len(), self.edge_count())?;
        if self.len() <= 10 {
            for (i, row) in self.adjacency.iter().enumerate() {
                write!(f, "{} ->", self.vertices.ids[i])?;
                for &(j, w) in row {
                    write!(f, " {}:{:.4}", self.vertices.ids[j], w)?;
                }
                writeln!(f)?;
            }
        } else {
            write!(f, "{}", self.statistics())?;
        }
        Ok(())
    }
}

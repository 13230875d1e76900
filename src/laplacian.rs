//! # Combinatorial Laplacian of a similarity graph
//!
//! ## Algorithm Overview
//!
//! 1. **Symmetrization**: the directed k-most-similar graph is turned into an
//!    undirected one with `A_sym[i][j] = max(A[i][j], A[j][i])`, i.e. every arc
//!    gains its reverse edge and reciprocated arcs keep the larger weight
//! 2. **Degrees**: `D[i][i] = Σ_j A_sym[i][j]`
//! 3. **Laplacian**: `L = D - A_sym`, stored dense for the eigen-solver
//!
//! The result is symmetric positive semi-definite with zero row sums; the
//! multiplicity of eigenvalue 0 equals the number of connected components.
//!
//! ## Complexity
//! - Symmetrization: `O(|E| log k)` using ordered per-row maps
//! - Dense materialisation: `O(|V|²)` memory, which bounds the graph sizes the
//!   spectral stage is meant for

use std::collections::BTreeMap;
use std::fmt;

use log::{debug, info, trace, warn};
use smartcore::linalg::basic::arrays::{Array, Array2, MutArray};
use smartcore::linalg::basic::matrix::DenseMatrix;
use sprs::{CsMat, TriMat};

use crate::distance::dot;
use crate::error::{Error, Result};
use crate::graph::Graph;

/// Combinatorial Laplacian of a graph, dense.
#[derive(Debug, Clone)]
pub struct GraphLaplacian {
    /// `L = D - A_sym`
    pub matrix: DenseMatrix<f64>,
    pub nnodes: usize,
}

/// Symmetrized adjacency `max(A, Aᵀ)` of `graph` in CSR form.
pub fn symmetrized_adjacency(graph: &Graph) -> Result<CsMat<f64>> {
    let adjacency = graph.adjacency_matrix()?;
    let n = graph.len();
    trace!("Symmetrizing adjacency matrix");

    let mut sym = vec![BTreeMap::<usize, f64>::new(); n];
    for (i, row) in adjacency.outer_iterator().enumerate() {
        for (j, &w) in row.iter() {
            let forward = sym[i].entry(j).or_insert(0.0);
            *forward = forward.max(w);
            let back = sym[j].entry(i).or_insert(0.0);
            *back = back.max(w);
        }
    }

    let mut triplets = TriMat::new((n, n));
    for (i, row) in sym.iter().enumerate() {
        for (&j, &w) in row {
            if i != j && w > 1e-15 {
                triplets.add_triplet(i, j, w);
            }
        }
    }
    let sym: CsMat<f64> = triplets.to_csr();
    debug!("Symmetrized adjacency has {} non-zeros", sym.nnz());
    Ok(sym)
}

/// Build `L = D - max(A, Aᵀ)` for `graph`.
///
/// Fails with `EmptyGraph` on a graph without vertices.
pub fn build_laplacian(graph: &Graph) -> Result<GraphLaplacian> {
    let n = graph.len();
    info!("Building Laplacian matrix for {} vertices", n);
    let sym = symmetrized_adjacency(graph)?;

    let mut matrix = DenseMatrix::from_iterator(std::iter::repeat(0.0).take(n * n), n, n, 0);
    let mut isolated = 0;
    for (i, row) in sym.outer_iterator().enumerate() {
        let degree: f64 = row.iter().map(|(_, &w)| w).sum();
        if degree <= 1e-15 {
            isolated += 1;
        }
        matrix.set((i, i), degree);
        for (j, &w) in row.iter() {
            matrix.set((i, j), -w);
        }
    }
    if isolated > 0 {
        warn!("{} isolated vertices: Laplacian has extra zero eigenvalues", isolated);
    }

    Ok(GraphLaplacian { matrix, nnodes: n })
}

impl GraphLaplacian {
    /// `(|V|, |V|)`.
    pub fn shape(&self) -> (usize, usize) {
        self.matrix.shape()
    }

    /// Entry `L[i][j]`; panics outside the matrix.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        *self.matrix.get((i, j))
    }

    fn row(&self, i: usize) -> impl Iterator<Item = f64> + '_ {
        (0..self.nnodes).map(move |j| self.get(i, j))
    }

    /// Weighted degrees, i.e. the diagonal of `L`.
    pub fn degrees(&self) -> Vec<f64> {
        (0..self.nnodes).map(|i| self.get(i, i)).collect()
    }

    /// `L x`.
    pub fn multiply_vector(&self, x: &[f64]) -> Result<Vec<f64>> {
        if x.len() != self.nnodes {
            return Err(Error::DimensionMismatch { expected: self.nnodes, found: x.len() });
        }
        Ok((0..self.nnodes)
            .map(|i| self.row(i).zip(x).map(|(l, v)| l * v).sum())
            .collect())
    }

    /// `xᵀ L x / xᵀ x`, the cut cost of a vertex labelling; 0 for the zero vector.
    pub fn rayleigh_quotient(&self, x: &[f64]) -> Result<f64> {
        let lx = self.multiply_vector(x)?;
        let norm = dot(x, x);
        if norm <= f64::EPSILON {
            warn!("Rayleigh quotient of a zero vector");
            return Ok(0.0);
        }
        Ok(dot(x, &lx) / norm)
    }

    /// Largest `|L[i][j] - L[j][i]|`.
    pub fn max_asymmetry(&self) -> f64 {
        (0..self.nnodes)
            .flat_map(|i| ((i + 1)..self.nnodes).map(move |j| (i, j)))
            .map(|(i, j)| (self.get(i, j) - self.get(j, i)).abs())
            .fold(0.0, f64::max)
    }

    /// Check zero row sums, symmetry and a non-negative diagonal.
    pub fn verify_properties(&self, tolerance: f64) -> LaplacianCheck {
        let max_row_sum = (0..self.nnodes)
            .map(|i| self.row(i).sum::<f64>().abs())
            .fold(0.0, f64::max);
        let negative_diagonal: Vec<usize> =
            (0..self.nnodes).filter(|&i| self.get(i, i) < 0.0).collect();
        let check = LaplacianCheck {
            tolerance,
            max_row_sum,
            max_asymmetry: self.max_asymmetry(),
            negative_diagonal,
        };
        if check.is_valid() {
            trace!("Laplacian passes checks at tolerance {:.1e}", tolerance);
        } else {
            warn!("Laplacian check failed: {:?}", check);
        }
        check
    }

    /// Entries with magnitude above 1e-15.
    pub fn nnz(&self) -> usize {
        self.matrix.iterator(0).filter(|x| x.abs() > 1e-15).count()
    }

    pub fn statistics(&self) -> LaplacianStats {
        let degrees = self.degrees();
        let cells = (self.nnodes * self.nnodes).max(1);
        LaplacianStats {
            nnodes: self.nnodes,
            nnz: self.nnz(),
            density: self.nnz() as f64 / cells as f64,
            degree_min: degrees.iter().copied().fold(f64::INFINITY, f64::min),
            degree_max: degrees.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            degree_mean: degrees.iter().sum::<f64>() / self.nnodes.max(1) as f64,
        }
    }

    pub fn matrix(&self) -> &DenseMatrix<f64> {
        &self.matrix
    }
}

/// Outcome of `verify_properties`.
#[derive(Debug, Clone)]
pub struct LaplacianCheck {
    pub tolerance: f64,
    pub max_row_sum: f64,
    pub max_asymmetry: f64,
    pub negative_diagonal: Vec<usize>,
}

impl LaplacianCheck {
    pub fn is_valid(&self) -> bool {
        self.max_row_sum <= self.tolerance
            && self.max_asymmetry <= self.tolerance
            && self.negative_diagonal.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct LaplacianStats {
    pub nnodes: usize,
    pub nnz: usize,
    /// Fraction of non-zero cells.
    pub density: f64,
    pub degree_min: f64,
    pub degree_max: f64,
    pub degree_mean: f64,
}

impl fmt::Display for LaplacianStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Laplacian {}x{}: {} non-zeros ({:.2}%), degree min {:.4} / mean {:.4} / max {:.4}",
            self.nnodes,
            self.nnodes,
            self.nnz,
            self.density * 100.0,
            self.degree_min,
            self.degree_mean,
            self.degree_max
        )
    }
}

impl fmt::Display for GraphLaplacian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.statistics())?;
        if self.nnodes <= 10 {
            for i in 0..self.nnodes {
                let cells: Vec<String> = self.row(i).map(|x| format!("{:>8.4}", x)).collect();
                writeln!(f, "  [{}]", cells.join(" "))?;
            }
        }
        Ok(())
    }
}

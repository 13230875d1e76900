//! # Eigen maps of a graph Laplacian
//!
//! Exposes the spectral stages consumed by `clustering` as a trait on
//! `GraphLaplacian`:
//!
//! 1. **Eigenpairs**: full symmetric eigen-decomposition (smartcore EVD), sorted by
//!    ascending eigenvalue, each eigenvector sign-normalised so its largest-magnitude
//!    component is positive. The sign convention makes downstream sign partitions
//!    reproducible across runs.
//! 2. **Fiedler**: the second-smallest eigenpair.
//! 3. **Embedding**: eigenvectors `2..=dims+1` stacked per vertex, a `|V| × dims`
//!    coordinate table for k-means.
//!
//! A graph with several connected components has eigenvalue 0 with multiplicity > 1;
//! the Fiedler vector is then an arbitrary vector from that eigenspace. This is
//! logged but not corrected.

use log::{debug, info, trace, warn};
use smartcore::linalg::basic::arrays::Array;
use smartcore::linalg::traits::evd::EVDDecomposable;

use crate::error::{Error, Result};
use crate::laplacian::GraphLaplacian;

/// Eigenvalues below this are treated as zero when checking connectivity.
pub const ZERO_EIGENVALUE: f64 = 1e-9;

/// Eigenvalues in ascending order with their eigenvectors.
#[derive(Clone, Debug)]
pub struct Eigenpairs {
    pub values: Vec<f64>,
    /// `vectors[k]` is the eigenvector of `values[k]`, one entry per vertex.
    pub vectors: Vec<Vec<f64>>,
}

impl Eigenpairs {
    /// Number of eigenvalues numerically equal to zero.
    pub fn zero_multiplicity(&self) -> usize {
        self.values.iter().filter(|v| v.abs() < ZERO_EIGENVALUE).count()
    }
}

/// Spectral stages over a Laplacian.
pub trait EigenMaps {
    /// Stage 1: all eigenpairs, ascending.
    fn eigenpairs(&self) -> Result<Eigenpairs>;

    /// Stage 2: second-smallest eigenvalue and its eigenvector.
    fn fiedler(&self) -> Result<(f64, Vec<f64>)> {
        let mut pairs = self.eigenpairs()?;
        if pairs.values.len() < 2 {
            return Err(Error::invalid(
                "graph",
                "a Fiedler vector needs at least two vertices",
            ));
        }
        if pairs.zero_multiplicity() > 1 {
            warn!(
                "Laplacian has {} zero eigenvalues: graph is disconnected, Fiedler vector is not unique",
                pairs.zero_multiplicity()
            );
        }
        let value = pairs.values[1];
        let vector = pairs.vectors.swap_remove(1);
        debug!("Fiedler value {:.6}", value);
        Ok((value, vector))
    }

    /// Stage 3: per-vertex coordinates from eigenvectors `2..=dims+1`.
    fn spectral_embedding(&self, dims: usize) -> Result<Vec<Vec<f64>>> {
        let pairs = self.eigenpairs()?;
        let n = pairs.values.len();
        if dims == 0 || dims + 1 > n {
            return Err(Error::invalid(
                "dims",
                format!("embedding needs 1..={} dimensions, got {}", n.saturating_sub(1), dims),
            ));
        }
        if pairs.zero_multiplicity() > 1 {
            warn!(
                "Laplacian has {} zero eigenvalues: embedding mixes component indicators",
                pairs.zero_multiplicity()
            );
        }
        let embedding: Vec<Vec<f64>> = (0..n)
            .map(|v| (1..=dims).map(|k| pairs.vectors[k][v]).collect())
            .collect();
        trace!("Spectral embedding: {} vertices × {} dims", n, dims);
        Ok(embedding)
    }
}

impl EigenMaps for GraphLaplacian {
    fn eigenpairs(&self) -> Result<Eigenpairs> {
        let n = self.nnodes;
        if n == 0 {
            return Err(Error::EmptyGraph);
        }
        info!("Eigen-decomposing {}×{} Laplacian", n, n);
        let evd = self.matrix.evd(true)?;

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            evd.d[a].total_cmp(&evd.d[b]).then_with(|| a.cmp(&b))
        });

        let mut values = Vec::with_capacity(n);
        let mut vectors = Vec::with_capacity(n);
        for &col in &order {
            let mut v: Vec<f64> = (0..n).map(|row| *evd.V.get((row, col))).collect();
            let pivot = v
                .iter()
                .copied()
                .fold(0.0_f64, |best, x| if x.abs() > best.abs() + 1e-12 { x } else { best });
            if pivot < 0.0 {
                v.iter_mut().for_each(|x| *x = -*x);
            }
            // L is PSD; tiny negatives are round-off
            values.push(evd.d[col].max(0.0));
            vectors.push(v);
        }

        debug!(
            "Smallest eigenvalues: {:?}",
            values.iter().take(4).map(|v| format!("{:.6}", v)).collect::<Vec<_>>()
        );
        Ok(Eigenpairs { values, vectors })
    }
}

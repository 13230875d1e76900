//! Item identifiers and the inputs served by the upstream feature store.
//!
//! This module provides the value types every analysis in the crate
//! consumes:
//!
//! - `ItemId`: an opaque photo/user/point-of-interest identifier, either numeric
//!   or textual. Ordering is total (numeric ids sort numerically and before
//!   textual ids) and is the tie-break used everywhere determinism matters.
//! - `FeatureSpace`: a dense, row-major table of fixed-dimension vectors indexed
//!   by `ItemId`, with zero-copy `vector(id)` lookup.
//! - `SimilarityMatrix`: a pairwise similarity table whose row and column axes
//!   are both labelled by ids.
//! - `LabelTable`: `(id, label)` pairs used as classification exemplars.
//!
//! # Examples
//!
//! ```
//! use viewgraph::core::{FeatureSpace, ItemId};
//!
//! let space = FeatureSpace::new(
//!     vec![ItemId::from(10u64), ItemId::from("user_7")],
//!     vec![vec![1.0, 0.0], vec![0.0, 1.0]],
//! ).unwrap();
//!
//! assert_eq!(space.vector(&ItemId::from(10u64)).unwrap(), &[1.0, 0.0]);
//! ```

use std::collections::HashMap;
use std::fmt;

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::arrays::{Array, Array2};
use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::error::{Error, Result};

/// Opaque item identifier.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ItemId {
    Num(u64),
    Name(String),
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Num(n) => write!(f, "{}", n),
            ItemId::Name(s) => write!(f, "{}", s),
        }
    }
}

impl From<u64> for ItemId {
    fn from(n: u64) -> Self {
        ItemId::Num(n)
    }
}

impl From<usize> for ItemId {
    fn from(n: usize) -> Self {
        ItemId::Num(n as u64)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId::Name(s.to_string())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        ItemId::Name(s)
    }
}

/// Map ids to dense indices; the first occurrence of a repeated id wins.
fn first_positions(ids: &[ItemId]) -> HashMap<ItemId, usize> {
    let mut index = HashMap::with_capacity(ids.len());
    for (i, id) in ids.iter().enumerate() {
        index.entry(id.clone()).or_insert(i);
    }
    index
}

/// Map ids to dense indices, rejecting duplicates.
pub(crate) fn index_ids(ids: &[ItemId]) -> Result<HashMap<ItemId, usize>> {
    let mut index = HashMap::with_capacity(ids.len());
    for (i, id) in ids.iter().enumerate() {
        if index.insert(id.clone(), i).is_some() {
            return Err(Error::InconsistentIndex(format!("duplicate id {}", id)));
        }
    }
    Ok(index)
}

/// Fixed-dimension feature vectors served by id.
///
/// Rows are stored contiguously so `vector` hands out slices without copying.
#[derive(Clone, Debug)]
pub struct FeatureSpace {
    ids: Vec<ItemId>,
    index: HashMap<ItemId, usize>,
    data: Vec<f64>,
    nfeatures: usize,
}

impl FeatureSpace {
    /// Build a feature space from parallel id and row vectors.
    ///
    /// Fails with `InconsistentIndex` on duplicate ids or a length mismatch between
    /// `ids` and `rows`, and with `DimensionMismatch` on ragged rows.
    pub fn new(ids: Vec<ItemId>, rows: Vec<Vec<f64>>) -> Result<Self> {
        if ids.len() != rows.len() {
            return Err(Error::InconsistentIndex(format!(
                "{} ids for {} vectors",
                ids.len(),
                rows.len()
            )));
        }
        let nfeatures = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * nfeatures);
        for row in &rows {
            if row.len() != nfeatures {
                return Err(Error::DimensionMismatch { expected: nfeatures, found: row.len() });
            }
            data.extend_from_slice(row);
        }
        let index = index_ids(&ids)?;
        debug!("FeatureSpace: {} items x {} features", ids.len(), nfeatures);
        Ok(Self { ids, index, data, nfeatures })
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Dimensionality of every vector.
    pub fn nfeatures(&self) -> usize {
        self.nfeatures
    }

    /// Ids in insertion order.
    pub fn ids(&self) -> &[ItemId] {
        &self.ids
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.index.contains_key(id)
    }

    /// Dense position of `id`.
    pub fn position(&self, id: &ItemId) -> Result<usize> {
        self.index.get(id).copied().ok_or_else(|| Error::UnknownItem(id.clone()))
    }

    /// Feature vector of `id`.
    pub fn vector(&self, id: &ItemId) -> Result<&[f64]> {
        let i = self.position(id)?;
        Ok(self.row(i))
    }

    /// Feature vector at dense position `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= self.len()`.
    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.nfeatures..(i + 1) * self.nfeatures]
    }

    /// Iterate `(id, vector)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&ItemId, &[f64])> {
        self.ids.iter().enumerate().map(move |(i, id)| (id, self.row(i)))
    }

    /// Copy into a smartcore matrix (rows are items).
    pub fn to_dense(&self) -> DenseMatrix<f64> {
        trace!("Copying FeatureSpace into {}x{} DenseMatrix", self.len(), self.nfeatures);
        DenseMatrix::from_iterator(self.data.iter().copied(), self.len(), self.nfeatures, 0)
    }
}

/// Pairwise similarity values labelled by ids on both axes.
#[derive(Clone, Debug)]
pub struct SimilarityMatrix {
    row_ids: Vec<ItemId>,
    col_ids: Vec<ItemId>,
    row_index: HashMap<ItemId, usize>,
    col_index: HashMap<ItemId, usize>,
    values: DenseMatrix<f64>,
}

impl SimilarityMatrix {
    /// Square matrix whose rows and columns share `ids`.
    ///
    /// Fails with `InconsistentIndex` if `rows` is not `ids.len()` x `ids.len()`.
    pub fn from_rows(ids: Vec<ItemId>, rows: Vec<Vec<f64>>) -> Result<Self> {
        Self::with_axes(ids.clone(), ids, rows)
    }

    /// Matrix with independently labelled axes.
    ///
    /// The shape must agree with the axis lengths; whether both axes carry the
    /// same ids is checked by consumers that need a square index.
    pub fn with_axes(
        row_ids: Vec<ItemId>,
        col_ids: Vec<ItemId>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self> {
        if rows.len() != row_ids.len() {
            return Err(Error::InconsistentIndex(format!(
                "{} row ids for {} rows",
                row_ids.len(),
                rows.len()
            )));
        }
        if let Some(bad) = rows.iter().find(|r| r.len() != col_ids.len()) {
            return Err(Error::InconsistentIndex(format!(
                "{} column ids for a row of length {}",
                col_ids.len(),
                bad.len()
            )));
        }
        let (n, m) = (row_ids.len(), col_ids.len());
        let values = DenseMatrix::from_iterator(rows.into_iter().flatten(), n, m, 0);
        let row_index = first_positions(&row_ids);
        let col_index = first_positions(&col_ids);
        Ok(Self { row_ids, col_ids, row_index, col_index, values })
    }

    pub(crate) fn from_dense(ids: Vec<ItemId>, values: DenseMatrix<f64>) -> Self {
        let row_index = first_positions(&ids);
        Self {
            row_ids: ids.clone(),
            col_ids: ids,
            col_index: row_index.clone(),
            row_index,
            values,
        }
    }

    /// Ids of the row axis.
    pub fn row_ids(&self) -> &[ItemId] {
        &self.row_ids
    }

    /// Ids of the column axis.
    pub fn col_ids(&self) -> &[ItemId] {
        &self.col_ids
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        self.values.shape()
    }

    /// Value at dense position `(i, j)`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        *self.values.get((i, j))
    }

    /// Value between two ids.
    pub fn value(&self, row: &ItemId, col: &ItemId) -> Result<f64> {
        let i = *self.row_index.get(row).ok_or_else(|| Error::UnknownItem(row.clone()))?;
        let j = *self.col_index.get(col).ok_or_else(|| Error::UnknownItem(col.clone()))?;
        Ok(self.get(i, j))
    }

    /// Underlying smartcore matrix.
    pub fn matrix(&self) -> &DenseMatrix<f64> {
        &self.values
    }

    /// Ensure both axes carry exactly the same ids in the same order.
    pub fn check_square_index(&self) -> Result<()> {
        if self.row_ids != self.col_ids {
            let first_diff = self
                .row_ids
                .iter()
                .zip(self.col_ids.iter())
                .position(|(a, b)| a != b);
            return Err(Error::InconsistentIndex(match first_diff {
                Some(p) => format!(
                    "row id {} does not match column id {} at position {}",
                    self.row_ids[p], self.col_ids[p], p
                ),
                None => format!(
                    "{} row ids vs {} column ids",
                    self.row_ids.len(),
                    self.col_ids.len()
                ),
            }));
        }
        index_ids(&self.row_ids).map(|_| ())
    }
}

/// `(id, label)` pairs supplied by the label store.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LabelTable {
    entries: Vec<(ItemId, String)>,
}

impl LabelTable {
    pub fn new(entries: Vec<(ItemId, String)>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(ItemId, String)> {
        self.entries.iter()
    }

    /// Labels of the requested ids; ids without a label are left out.
    pub fn labels(&self, ids: &[ItemId]) -> HashMap<ItemId, String> {
        self.entries
            .iter()
            .filter(|(id, _)| ids.contains(id))
            .cloned()
            .collect()
    }
}

impl FromIterator<(ItemId, String)> for LabelTable {
    fn from_iter<T: IntoIterator<Item = (ItemId, String)>>(iter: T) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}

use thiserror::Error;

use crate::core::ItemId;

/// Errors returned by graph construction, ranking, clustering, indexing and
/// classification in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Out-of-range or otherwise unusable argument.
    #[error("invalid parameter {name}: {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Human-readable explanation.
        message: String,
    },

    /// Id sets disagree (matrix axes, graph vs. query, labels vs. features).
    #[error("inconsistent index: {0}")]
    InconsistentIndex(String),

    /// Vectors in one computation have different dimensionality.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected dimensionality.
        expected: usize,
        /// Found dimensionality.
        found: usize,
    },

    /// No directed edge between the two vertices.
    #[error("edge not found: {src} -> {dst}")]
    EdgeNotFound {
        /// Source vertex.
        src: ItemId,
        /// Destination vertex.
        dst: ItemId,
    },

    /// Structural query on a graph without vertices.
    #[error("graph is empty")]
    EmptyGraph,

    /// Id is not part of the graph, feature space or index.
    #[error("unknown item: {0}")]
    UnknownItem(ItemId),

    /// More neighbours/exemplars were requested than exist.
    #[error("insufficient data: requested {requested}, only {available} available")]
    InsufficientData {
        /// Requested count.
        requested: usize,
        /// Available count.
        available: usize,
    },

    /// Persistence I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot encoding/decoding failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Failure inside the numerical backend (eigen-decomposition, k-means).
    #[error("numerical backend failure: {0}")]
    Backend(String),
}

impl Error {
    pub(crate) fn invalid(name: &'static str, message: impl Into<String>) -> Self {
        Error::InvalidParameter { name, message: message.into() }
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        match *e {
            bincode::ErrorKind::Io(io) => Error::Io(io),
            other => Error::Serialization(other.to_string()),
        }
    }
}

impl From<smartcore::error::Failed> for Error {
    fn from(e: smartcore::error::Failed) -> Self {
        Error::Backend(e.to_string())
    }
}

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, Error>;

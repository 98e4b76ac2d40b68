//! Error taxonomy for loading, building and solving
//!
//! Every failure terminates the run; nothing here is retried.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the crate
pub type Result<T, E = RankError> = std::result::Result<T, E>;

/// Errors produced by the `PageRank` pipeline
#[derive(Debug, Error)]
pub enum RankError {
    /// Input path missing or unreadable
    #[error("cannot read graph file {}: {source}", path.display())]
    FileAccess {
        /// Path that failed to open
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Malformed integer stream or edge endpoint outside `[0, n)`
    #[error("malformed graph input at line {line}: {reason}")]
    GraphFormat {
        /// 1-based line of the offending token (0 when not tied to input text)
        line: usize,
        /// What was wrong
        reason: String,
    },

    /// Requested buffer does not fit the accelerator memory budget
    #[error("cannot allocate {requested} bytes for {what} (limit {limit} bytes)")]
    Allocation {
        /// Buffer being allocated
        what: &'static str,
        /// Requested size in bytes (`u64::MAX` when the size overflowed)
        requested: u64,
        /// Budget that was exceeded
        limit: u64,
    },

    /// A score entry became NaN or infinite
    #[error("score of node {node} became non-finite at iteration {iteration}")]
    NumericDivergence {
        /// First offending node
        node: usize,
        /// Iteration that produced it
        iteration: usize,
    },

    /// Query for a node id outside `[0, n)` on an already-built graph
    #[error("node {node} out of range for a graph with {num_nodes} nodes")]
    NodeOutOfRange {
        /// Requested id
        node: u32,
        /// Nodes in the graph
        num_nodes: usize,
    },

    /// Solver parameters out of range
    #[error("invalid solver configuration: {0}")]
    InvalidConfig(String),

    /// Device-level failure (adapter request, buffer mapping, ...)
    #[error(transparent)]
    Accelerator(#[from] anyhow::Error),
}

impl RankError {
    pub(crate) fn format(line: usize, reason: impl Into<String>) -> Self {
        Self::GraphFormat {
            line,
            reason: reason.into(),
        }
    }

    /// Allocation failure for `count` elements of `T`
    pub(crate) fn allocation<T>(what: &'static str, count: usize, limit: u64) -> Self {
        let requested = count
            .checked_mul(std::mem::size_of::<T>())
            .map_or(u64::MAX, |bytes| bytes as u64);
        Self::Allocation {
            what,
            requested,
            limit,
        }
    }
}

/// Largest host allocation `Vec` can represent
pub(crate) const HOST_ALLOC_LIMIT: u64 = isize::MAX as u64;

/// Allocate a zero-filled host buffer, reporting failure instead of aborting
pub(crate) fn try_zeroed<T: Clone + Default>(what: &'static str, len: usize) -> Result<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| RankError::allocation::<T>(what, len, HOST_ALLOC_LIMIT))?;
    buf.resize(len, T::default());
    Ok(buf)
}

//! Graph storage layer
//!
//! Loads the edge-list format into a [`Graph`] and turns it into one of the
//! two numeric representations consumed by the solver.

pub mod csr;
pub mod dense;
pub mod graph;
pub mod loader;
pub mod scores;

pub use csr::CompactAdjacency;
pub use dense::DenseTransitionMatrix;
pub use graph::{Graph, NodeId};
pub use loader::GraphLoader;

use crate::error::Result;
use std::fmt;
use tracing::debug;

/// Largest node count for which [`RepresentationPolicy::Auto`] picks the dense matrix
pub const DEFAULT_DENSE_MAX_NODES: usize = 256;

/// Minimum edge density (`e / n²`) for which `Auto` picks the dense matrix
pub const DEFAULT_DENSE_MIN_DENSITY: f64 = 0.25;

/// Which representation to build
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RepresentationPolicy {
    /// Dense for small, dense graphs; compact otherwise
    Auto {
        /// Node count ceiling for the dense matrix
        dense_max_nodes: usize,
        /// Edge density floor for the dense matrix
        dense_min_density: f64,
    },
    /// Always the dense transition matrix
    Dense,
    /// Always the compact in-adjacency
    Compact,
}

impl Default for RepresentationPolicy {
    fn default() -> Self {
        Self::Auto {
            dense_max_nodes: DEFAULT_DENSE_MAX_NODES,
            dense_min_density: DEFAULT_DENSE_MIN_DENSITY,
        }
    }
}

impl RepresentationPolicy {
    /// Resolve the policy for a concrete graph
    #[must_use]
    pub fn choose(&self, graph: &Graph) -> RepresentationKind {
        match *self {
            Self::Dense => RepresentationKind::Dense,
            Self::Compact => RepresentationKind::Compact,
            Self::Auto {
                dense_max_nodes,
                dense_min_density,
            } => {
                if graph.num_nodes() <= dense_max_nodes && graph.density() >= dense_min_density {
                    RepresentationKind::Dense
                } else {
                    RepresentationKind::Compact
                }
            }
        }
    }
}

/// Tag for the representation in use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepresentationKind {
    /// [`DenseTransitionMatrix`]
    Dense,
    /// [`CompactAdjacency`]
    Compact,
}

impl fmt::Display for RepresentationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dense => f.write_str("dense"),
            Self::Compact => f.write_str("compact"),
        }
    }
}

/// One built numeric representation of a graph
#[derive(Debug, Clone)]
pub enum Representation {
    /// Full column-stochastic matrix (dangling mass baked into the columns)
    Dense(DenseTransitionMatrix),
    /// In-adjacency CSR (dangling mass reduced explicitly each iteration)
    Compact(CompactAdjacency),
}

impl Representation {
    /// Build the representation selected by `policy`
    ///
    /// # Errors
    ///
    /// Returns `RankError::Allocation` if the representation does not fit in memory
    pub fn build(graph: Graph, policy: &RepresentationPolicy) -> Result<Self> {
        let kind = policy.choose(&graph);
        debug!(
            nodes = graph.num_nodes(),
            edges = graph.num_edges(),
            density = graph.density(),
            %kind,
            "building representation"
        );
        match kind {
            RepresentationKind::Dense => DenseTransitionMatrix::from_graph(graph).map(Self::Dense),
            RepresentationKind::Compact => CompactAdjacency::from_graph(graph).map(Self::Compact),
        }
    }

    /// Which variant this is
    #[must_use]
    pub const fn kind(&self) -> RepresentationKind {
        match self {
            Self::Dense(_) => RepresentationKind::Dense,
            Self::Compact(_) => RepresentationKind::Compact,
        }
    }

    /// Get number of nodes
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        match self {
            Self::Dense(m) => m.num_nodes(),
            Self::Compact(a) => a.num_nodes(),
        }
    }

    /// Get number of edges
    #[must_use]
    pub fn num_edges(&self) -> usize {
        match self {
            Self::Dense(m) => m.num_edges(),
            Self::Compact(a) => a.num_edges(),
        }
    }

    /// Uniform starting vector `1/n`
    #[must_use]
    pub fn initial_scores(&self) -> Vec<f64> {
        match self {
            Self::Dense(m) => m.initial_scores(),
            Self::Compact(a) => a.initial_scores(),
        }
    }
}

impl From<DenseTransitionMatrix> for Representation {
    fn from(matrix: DenseTransitionMatrix) -> Self {
        Self::Dense(matrix)
    }
}

impl From<CompactAdjacency> for Representation {
    fn from(adjacency: CompactAdjacency) -> Self {
        Self::Compact(adjacency)
    }
}

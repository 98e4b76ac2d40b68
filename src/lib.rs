//! trueno-pagerank: GPU-first `PageRank` power iteration
//!
//! # Overview
//!
//! trueno-pagerank loads a directed graph from a plain edge list, builds either
//! a dense column-stochastic matrix or a compact in-adjacency (reverse CSR)
//! representation, and iterates
//!
//! ```text
//! next[i] = (1 - α)/n + α · (Σ_{j→i} current[j]/out_degree(j) + dangling_mass/n)
//! ```
//!
//! on an accelerator until the L1 change drops below ε or the iteration cap
//! is hit. The score vector always sums to 1.
//!
//! # Quick Start
//!
//! ```
//! use trueno_pagerank::{pagerank, GraphLoader, SolverConfig, SolverStatus};
//!
//! // 1 → 0, 2 → 0, 3 → 0 (0 is dangling)
//! let graph = GraphLoader::parse_str("4\n1 0\n2 0\n3 0\n").unwrap();
//!
//! let result = pagerank(graph, &SolverConfig::default()).unwrap();
//! assert_eq!(result.status, SolverStatus::Converged);
//! assert!((result.sum() - 1.0).abs() < 1e-9);
//! assert_eq!(result.top_k(1)[0].0, 0); // hub ranks first
//! ```
//!
//! # Architecture
//!
//! - **Storage**: edge-list loader, dense matrix and compact CSR representations
//! - **Backend**: [`backend::Accelerator`] / [`backend::RankKernel`] boundary,
//!   with a rayon CPU implementation
//! - **GPU** (feature `gpu`): wgpu compute shaders behind the same boundary
//! - **Algorithms**: [`PowerIterationSolver`] state machine and [`RankSession`]

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod algorithms;
pub mod backend;
pub mod error;
pub mod storage;

// GPU acceleration (optional)
#[cfg(feature = "gpu")]
pub mod gpu;

// Re-export core types
pub use algorithms::{
    pagerank, PageRankResult, PowerIterationSolver, RankSession, SolverConfig, SolverState,
    SolverStatus,
};
pub use storage::{
    CompactAdjacency, DenseTransitionMatrix, Graph, GraphLoader, NodeId, Representation,
    RepresentationKind, RepresentationPolicy,
};

#[cfg(feature = "gpu")]
pub use gpu::{GpuAccelerator, GpuDevice, GpuKernel, GpuMemoryLimits};

// Error type
pub use error::{RankError, Result};

//! Graph algorithms
//!
//! Power-iteration `PageRank` over the dense and compact representations.

pub mod pagerank;

pub use pagerank::{
    pagerank, PageRankResult, PowerIterationSolver, RankSession, SolverConfig, SolverState,
    SolverStatus, DEFAULT_ALPHA, DEFAULT_EPSILON, DEFAULT_MAX_ITERATIONS,
};

//! Dense column-stochastic transition matrix
//!
//! # Layout
//!
//! Row-major `n × n`. Entry `i * n + j` is `M[i][j]`, the share of node `j`'s
//! rank that flows to node `i` in one step. Rows are destinations, columns
//! are sources.
//!
//! ```text
//! Edges: 0 → 1, 0 → 2, 1 → 2       (node 2 is dangling, n = 3)
//!
//!          j=0   j=1   j=2
//!   i=0 [ 0.0   0.0   1/3 ]
//!   i=1 [ 0.5   0.0   1/3 ]
//!   i=2 [ 0.5   1.0   1/3 ]
//!
//!   every column sums to 1
//! ```
//!
//! Dangling columns are filled with `1/n`, so the iteration never divides by
//! an out-degree. Memory is `O(n²)`: use only for small graphs.

use super::graph::Graph;
use crate::error::{RankError, Result, HOST_ALLOC_LIMIT};

/// Dense transition matrix plus the out-degrees it was built from
#[derive(Debug, Clone)]
pub struct DenseTransitionMatrix {
    /// Row-major `n * n` entries
    entries: Vec<f64>,
    out_degrees: Vec<u32>,
    num_edges: usize,
    num_nodes: usize,
}

impl DenseTransitionMatrix {
    /// Build the matrix from a graph
    ///
    /// Work: one pass per edge for contributions, one pass per dangling node
    /// for the uniform column fill.
    ///
    /// # Errors
    ///
    /// Returns `RankError::Allocation` if `n²` entries cannot be allocated
    ///
    /// # Example
    ///
    /// ```
    /// use trueno_pagerank::{DenseTransitionMatrix, Graph};
    ///
    /// let graph = Graph::from_edges(3, &[(0, 1), (0, 2), (1, 2)]).unwrap();
    /// let matrix = DenseTransitionMatrix::from_graph(graph).unwrap();
    ///
    /// assert_eq!(matrix.entry(1, 0), 0.5);
    /// assert!((matrix.column_sum(2) - 1.0).abs() < 1e-12);
    /// ```
    #[allow(clippy::cast_precision_loss)]
    pub fn from_graph(graph: Graph) -> Result<Self> {
        let (in_neighbors, out_degrees, num_edges) = graph.into_parts();
        let n = out_degrees.len();

        let len = n
            .checked_mul(n)
            .ok_or_else(|| {
                RankError::allocation::<f64>("dense transition matrix", usize::MAX, HOST_ALLOC_LIMIT)
            })?;
        let mut entries: Vec<f64> = crate::error::try_zeroed("dense transition matrix", len)?;

        // Contribution fill: row i gathers from its in-neighbors j
        for (i, sources) in in_neighbors.iter().enumerate() {
            let row = &mut entries[i * n..(i + 1) * n];
            for &j in sources {
                let j = j as usize;
                // j has an edge, so out_degrees[j] >= 1
                row[j] += 1.0 / f64::from(out_degrees[j]);
            }
        }

        // Dangling fill: column j uniform
        let uniform = 1.0 / n as f64;
        for (j, _) in out_degrees.iter().enumerate().filter(|(_, &d)| d == 0) {
            for i in 0..n {
                entries[i * n + j] = uniform;
            }
        }

        Ok(Self {
            entries,
            out_degrees,
            num_edges,
            num_nodes: n,
        })
    }

    /// Get number of nodes (matrix dimension)
    #[must_use]
    pub const fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Get number of edges of the source graph
    #[must_use]
    pub const fn num_edges(&self) -> usize {
        self.num_edges
    }

    /// `M[i][j]`: share of node `j`'s rank flowing to node `i`
    ///
    /// # Panics
    ///
    /// Panics if `i` or `j` is not below `num_nodes()`
    #[must_use]
    pub fn entry(&self, i: usize, j: usize) -> f64 {
        assert!(j < self.num_nodes, "column {j} out of bounds");
        self.entries[i * self.num_nodes + j]
    }

    /// Row `i`: contributions of every node to node `i`
    ///
    /// # Panics
    ///
    /// Panics if `i` is not below `num_nodes()`
    #[must_use]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.entries[i * self.num_nodes..(i + 1) * self.num_nodes]
    }

    /// Sum of column `j` (1 for a well-formed matrix)
    #[must_use]
    pub fn column_sum(&self, j: usize) -> f64 {
        (0..self.num_nodes).map(|i| self.entry(i, j)).sum()
    }

    /// Row-major entries, ready for upload
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.entries
    }

    /// Out-degree of every node
    #[must_use]
    pub fn out_degrees(&self) -> &[u32] {
        &self.out_degrees
    }

    /// Number of dangling columns
    #[must_use]
    pub fn dangling_count(&self) -> usize {
        self.out_degrees.iter().filter(|&&d| d == 0).count()
    }

    /// Uniform starting vector `1/n`
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn initial_scores(&self) -> Vec<f64> {
        vec![1.0 / self.num_nodes as f64; self.num_nodes]
    }
}

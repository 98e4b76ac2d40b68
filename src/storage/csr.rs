//! Compact in-adjacency (reverse CSR) representation
//!
//! Based on `GraphBLAST` (Yang et al., ACM `ToMS` 2022) for GPU-optimized sparse matrix operations.
//!
//! # Format
//!
//! ```text
//! Graph: 0 → 1, 0 → 2, 1 → 2       (node 2 is dangling)
//!
//! In-adjacency CSR:
//!   offsets:        [0, 0, 1, 3]  // Node 0: sources [0..0), Node 1: [0..1), Node 2: [1..3)
//!   in_neighbors:   [0, 0, 1]     // sources of the edges into 1, then into 2
//!   out_degrees:    [2, 1, 0]
//!   dangling_nodes: [2]
//! ```
//!
//! One work item per node reads its contiguous `[offsets[v], offsets[v+1])`
//! range, so no atomics are needed in the rank-contribution pass.

use super::graph::Graph;
use crate::error::{try_zeroed, RankError, Result, HOST_ALLOC_LIMIT};
use std::ops::Range;

/// Flattened in-neighbor lists with out-degrees and dangling accounting
///
/// # Example
///
/// ```
/// use trueno_pagerank::{CompactAdjacency, Graph};
///
/// let graph = Graph::from_edges(3, &[(0, 1), (0, 2), (1, 2)]).unwrap();
/// let adj = CompactAdjacency::from_graph(graph).unwrap();
///
/// assert_eq!(adj.in_neighbors(2), &[0, 1]);
/// assert_eq!(adj.dangling_nodes(), &[2]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactAdjacency {
    /// Node v's in-neighbors live at `in_neighbors[offsets[v]..offsets[v + 1]]`
    /// Length: `num_nodes` + 1
    offsets: Vec<u32>,

    /// Sources of every edge, grouped by destination
    /// Length: `num_edges`
    in_neighbors: Vec<u32>,

    /// Length: `num_nodes`
    out_degrees: Vec<u32>,

    /// Ascending ids of nodes with out-degree 0
    dangling_nodes: Vec<u32>,
}

impl CompactAdjacency {
    /// Flatten a graph into CSR form in `O(n + e)`
    ///
    /// # Errors
    ///
    /// Returns `RankError::Allocation` if the arrays cannot be allocated or the
    /// edge count exceeds the `u32` offset range
    pub fn from_graph(graph: Graph) -> Result<Self> {
        let (adj_list, out_degrees, num_edges) = graph.into_parts();
        let num_nodes = out_degrees.len();

        if u32::try_from(num_edges).is_err() {
            return Err(RankError::allocation::<u32>(
                "CSR in-neighbors",
                num_edges,
                u64::from(u32::MAX) * 4,
            ));
        }

        let mut offsets: Vec<u32> = try_zeroed("CSR offsets", num_nodes + 1)?;
        let mut in_neighbors: Vec<u32> = Vec::new();
        in_neighbors
            .try_reserve_exact(num_edges)
            .map_err(|_| {
                RankError::allocation::<u32>("CSR in-neighbors", num_edges, HOST_ALLOC_LIMIT)
            })?;

        let mut offset = 0_u32;
        for (node, sources) in adj_list.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)] // total checked above
            let len_u32 = sources.len() as u32;
            offset += len_u32;
            offsets[node + 1] = offset;
            in_neighbors.extend_from_slice(sources);
        }

        #[allow(clippy::cast_possible_truncation)] // node count fits u32 (Graph invariant)
        let dangling_nodes = out_degrees
            .iter()
            .enumerate()
            .filter(|(_, &d)| d == 0)
            .map(|(v, _)| v as u32)
            .collect();

        Ok(Self {
            offsets,
            in_neighbors,
            out_degrees,
            dangling_nodes,
        })
    }

    /// Get number of nodes
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.out_degrees.len()
    }

    /// Get number of edges
    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.in_neighbors.len()
    }

    /// `[start, end)` range of node `v` in the flattened in-neighbor array
    ///
    /// # Panics
    ///
    /// Panics if `v` is not below `num_nodes()`
    #[must_use]
    pub fn range(&self, v: usize) -> Range<usize> {
        self.offsets[v] as usize..self.offsets[v + 1] as usize
    }

    /// Sources of the edges ending at `v`
    ///
    /// # Panics
    ///
    /// Panics if `v` is not below `num_nodes()`
    #[must_use]
    pub fn in_neighbors(&self, v: usize) -> &[u32] {
        &self.in_neighbors[self.range(v)]
    }

    /// Out-degree of `v`
    #[must_use]
    pub fn out_degree(&self, v: usize) -> u32 {
        self.out_degrees[v]
    }

    /// Whether `v` has no outgoing edges
    #[must_use]
    pub fn is_dangling(&self, v: usize) -> bool {
        self.out_degrees[v] == 0
    }

    /// Ascending list of dangling node ids
    #[must_use]
    pub fn dangling_nodes(&self) -> &[u32] {
        &self.dangling_nodes
    }

    /// Number of dangling nodes
    #[must_use]
    pub fn dangling_count(&self) -> usize {
        self.dangling_nodes.len()
    }

    /// Uniform starting vector `1/n`
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn initial_scores(&self) -> Vec<f64> {
        let n = self.num_nodes();
        vec![1.0 / n as f64; n]
    }

    /// Raw `(offsets, in_neighbors, out_degrees, dangling_nodes)` for upload
    #[must_use]
    pub fn components(&self) -> (&[u32], &[u32], &[u32], &[u32]) {
        (
            &self.offsets,
            &self.in_neighbors,
            &self.out_degrees,
            &self.dangling_nodes,
        )
    }
}

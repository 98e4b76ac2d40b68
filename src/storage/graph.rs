//! Immutable directed graph as loaded from an edge stream
//!
//! Stores exactly what the `PageRank` representations need: the in-neighbor
//! list of every node and the out-degree of every node.
//!
//! ```text
//! Edges: 0 → 1, 0 → 2, 1 → 2       (node 2 is dangling)
//!
//!   in_neighbors: [[], [0], [0, 1]]
//!   out_degrees:  [2, 1, 0]
//! ```

use crate::error::{RankError, Result, HOST_ALLOC_LIMIT};

/// Node identifier (zero-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Directed graph with per-node in-neighbors and out-degrees
///
/// Built once per run (by the loader or [`Graph::from_edges`]) and moved into
/// one of the numeric representations afterwards.
///
/// # Example
///
/// ```
/// use trueno_pagerank::{Graph, NodeId};
///
/// let graph = Graph::from_edges(3, &[(0, 1), (0, 2), (1, 2)]).unwrap();
///
/// assert_eq!(graph.num_edges(), 3);
/// assert_eq!(graph.in_neighbors(NodeId(2)).unwrap(), &[0, 1]);
/// assert!(graph.is_dangling(NodeId(2)).unwrap());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graph {
    /// Sources of the edges ending at each node (multi-edges repeat)
    in_neighbors: Vec<Vec<u32>>,

    /// Number of edges leaving each node
    out_degrees: Vec<u32>,

    /// Total edge count
    num_edges: usize,
}

impl Graph {
    /// Build a graph with `num_nodes` nodes from `(source, destination)` pairs
    ///
    /// # Errors
    ///
    /// Returns `RankError::GraphFormat` if `num_nodes` is zero or an endpoint
    /// is outside `[0, num_nodes)`
    pub fn from_edges(num_nodes: usize, edges: &[(u32, u32)]) -> Result<Self> {
        let mut builder = GraphBuilder::new(num_nodes, 0)?;
        for &(src, dst) in edges {
            builder.add_edge(u64::from(src), u64::from(dst), 0)?;
        }
        Ok(builder.finish())
    }

    /// Get number of nodes
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.out_degrees.len()
    }

    /// Get number of edges
    #[must_use]
    pub const fn num_edges(&self) -> usize {
        self.num_edges
    }

    /// Get the sources of all edges ending at `node`
    ///
    /// # Errors
    ///
    /// Returns `RankError::NodeOutOfRange` if node ID is out of bounds
    pub fn in_neighbors(&self, node: NodeId) -> Result<&[u32]> {
        let idx = self.index(node)?;
        Ok(&self.in_neighbors[idx])
    }

    /// Get the out-degree of `node`
    ///
    /// # Errors
    ///
    /// Returns `RankError::NodeOutOfRange` if node ID is out of bounds
    pub fn out_degree(&self, node: NodeId) -> Result<u32> {
        let idx = self.index(node)?;
        Ok(self.out_degrees[idx])
    }

    /// Whether `node` has no outgoing edges
    ///
    /// # Errors
    ///
    /// Returns `RankError::NodeOutOfRange` if node ID is out of bounds
    pub fn is_dangling(&self, node: NodeId) -> Result<bool> {
        Ok(self.out_degree(node)? == 0)
    }

    /// Number of nodes with no outgoing edges
    #[must_use]
    pub fn dangling_count(&self) -> usize {
        self.out_degrees.iter().filter(|&&d| d == 0).count()
    }

    /// Out-degree of every node
    #[must_use]
    pub fn out_degrees(&self) -> &[u32] {
        &self.out_degrees
    }

    /// Fraction of the `n²` possible (source, destination) slots holding an edge
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn density(&self) -> f64 {
        let n = self.num_nodes() as f64;
        self.num_edges as f64 / (n * n)
    }

    /// Split into `(in_neighbors, out_degrees, num_edges)` for the builders
    pub(crate) fn into_parts(self) -> (Vec<Vec<u32>>, Vec<u32>, usize) {
        (self.in_neighbors, self.out_degrees, self.num_edges)
    }

    fn index(&self, node: NodeId) -> Result<usize> {
        let idx = node.0 as usize;
        if idx >= self.num_nodes() {
            return Err(RankError::NodeOutOfRange {
                node: node.0,
                num_nodes: self.num_nodes(),
            });
        }
        Ok(idx)
    }
}

/// Incremental, range-checked construction of a [`Graph`]
#[derive(Debug)]
pub(crate) struct GraphBuilder {
    in_neighbors: Vec<Vec<u32>>,
    out_degrees: Vec<u32>,
    num_edges: usize,
}

impl GraphBuilder {
    /// `line` is reported if `num_nodes` is rejected
    pub(crate) fn new(num_nodes: usize, line: usize) -> Result<Self> {
        if num_nodes == 0 {
            return Err(RankError::format(line, "node count must be positive"));
        }
        if u32::try_from(num_nodes).is_err() {
            return Err(RankError::format(
                line,
                format!("node count {num_nodes} exceeds the u32 id space"),
            ));
        }

        let mut in_neighbors = Vec::new();
        in_neighbors
            .try_reserve_exact(num_nodes)
            .map_err(|_| {
                RankError::allocation::<Vec<u32>>("in-neighbor lists", num_nodes, HOST_ALLOC_LIMIT)
            })?;
        in_neighbors.resize_with(num_nodes, Vec::new);

        Ok(Self {
            in_neighbors,
            out_degrees: crate::error::try_zeroed("out-degrees", num_nodes)?,
            num_edges: 0,
        })
    }

    /// Record `src → dst`; ids are taken wide so overflowing input is still
    /// reported as out of range rather than wrapped
    pub(crate) fn add_edge(&mut self, src: u64, dst: u64, line: usize) -> Result<()> {
        let n = self.out_degrees.len();
        let src = self.check(src, n, line)?;
        let dst = self.check(dst, n, line)?;

        #[allow(clippy::cast_possible_truncation)] // checked against n <= u32::MAX
        self.in_neighbors[dst].push(src as u32);
        self.out_degrees[src] += 1;
        self.num_edges += 1;
        Ok(())
    }

    pub(crate) fn finish(self) -> Graph {
        Graph {
            in_neighbors: self.in_neighbors,
            out_degrees: self.out_degrees,
            num_edges: self.num_edges,
        }
    }

    #[allow(clippy::unused_self)]
    fn check(&self, id: u64, n: usize, line: usize) -> Result<usize> {
        match usize::try_from(id) {
            Ok(idx) if idx < n => Ok(idx),
            _ => Err(RankError::format(
                line,
                format!("node id {id} out of range [0, {n})"),
            )),
        }
    }
}

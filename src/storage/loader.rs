//! Edge-list text loader
//!
//! # Format
//!
//! ```text
//! 4          <- node count n
//! 0 1        <- edge source → destination
//! 1 2
//! 2 0
//! 3 0
//! ```
//!
//! Tokens are whitespace separated; line breaks carry no meaning beyond error
//! reporting. Every id must lie in `[0, n)`.

use super::graph::{Graph, GraphBuilder};
use crate::error::{RankError, Result};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Path reported for read failures of [`GraphLoader::from_reader`]
pub const READER_PATH: &str = "<reader>";

const NOT_UTF8: &str = "input is not valid UTF-8";

/// Parses the edge-list format into a [`Graph`]
///
/// # Example
///
/// ```
/// use trueno_pagerank::GraphLoader;
///
/// let graph = GraphLoader::parse_str("3\n0 1\n1 2\n").unwrap();
/// assert_eq!(graph.num_nodes(), 3);
/// assert_eq!(graph.num_edges(), 2);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphLoader;

impl GraphLoader {
    /// Read and parse a graph file
    ///
    /// # Errors
    ///
    /// Returns `RankError::FileAccess` if the file cannot be read and
    /// `RankError::GraphFormat` if its contents are malformed (including bytes
    /// that are not UTF-8)
    pub async fn load(path: impl AsRef<Path>) -> Result<Graph> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| RankError::FileAccess {
                path: path.to_path_buf(),
                source,
            })?;

        debug!(path = %path.display(), bytes = bytes.len(), "read graph file");
        let text = std::str::from_utf8(&bytes).map_err(|e| {
            let line = bytes[..e.valid_up_to()].iter().filter(|&&b| b == b'\n').count() + 1;
            RankError::format(line, NOT_UTF8)
        })?;
        Self::parse_str(text)
    }

    /// Parse a graph from any buffered reader
    ///
    /// # Errors
    ///
    /// Returns `RankError::GraphFormat` on malformed input (including bytes
    /// that are not UTF-8); read failures are reported as
    /// `RankError::FileAccess` against [`READER_PATH`]
    pub fn from_reader(reader: impl BufRead) -> Result<Graph> {
        let mut parser = EdgeParser::default();
        for (idx, line) in reader.split(b'\n').enumerate() {
            let line = line.map_err(|source| RankError::FileAccess {
                path: PathBuf::from(READER_PATH),
                source,
            })?;
            let line =
                std::str::from_utf8(&line).map_err(|_| RankError::format(idx + 1, NOT_UTF8))?;
            parser.feed_line(idx + 1, line)?;
        }
        parser.finish()
    }

    /// Parse a graph held in memory
    ///
    /// # Errors
    ///
    /// Returns `RankError::GraphFormat` on malformed input
    pub fn parse_str(text: &str) -> Result<Graph> {
        let mut parser = EdgeParser::default();
        for (idx, line) in text.lines().enumerate() {
            parser.feed_line(idx + 1, line)?;
        }
        parser.finish()
    }
}

/// Token-level state machine shared by all entry points
#[derive(Debug, Default)]
struct EdgeParser {
    builder: Option<GraphBuilder>,
    /// Source id waiting for its destination, with the line it appeared on
    pending_source: Option<(u64, usize)>,
    last_line: usize,
}

impl EdgeParser {
    fn feed_line(&mut self, line_no: usize, line: &str) -> Result<()> {
        self.last_line = line_no;
        for token in line.split_whitespace() {
            let value: u64 = token.parse().map_err(|_| {
                RankError::format(line_no, format!("expected a non-negative integer, found {token:?}"))
            })?;

            let Some(builder) = self.builder.as_mut() else {
                let n = usize::try_from(value).map_err(|_| {
                    RankError::format(line_no, format!("node count {value} too large"))
                })?;
                self.builder = Some(GraphBuilder::new(n, line_no)?);
                continue;
            };

            match self.pending_source.take() {
                None => self.pending_source = Some((value, line_no)),
                Some((src, _)) => builder.add_edge(src, value, line_no)?,
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<Graph> {
        let builder = self.builder.ok_or_else(|| {
            RankError::format(self.last_line.max(1), "input ends before the node count")
        })?;

        if let Some((src, line)) = self.pending_source {
            return Err(RankError::format(
                line,
                format!("edge from {src} has no destination"),
            ));
        }

        let graph = builder.finish();
        info!(
            nodes = graph.num_nodes(),
            edges = graph.num_edges(),
            dangling = graph.dangling_count(),
            "graph loaded"
        );
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeId;
    use std::io::Cursor;

    fn format_line(err: &RankError) -> usize {
        match err {
            RankError::GraphFormat { line, .. } => *line,
            other => panic!("expected GraphFormat, got {other}"),
        }
    }

    #[test]
    fn test_parse_simple() {
        let graph = GraphLoader::parse_str("4\n0 1\n1 2\n2 0\n3 0\n").unwrap();

        assert_eq!(graph.num_nodes(), 4);
        assert_eq!(graph.num_edges(), 4);
        assert_eq!(graph.out_degrees(), &[1, 1, 1, 1]);
        assert_eq!(graph.in_neighbors(NodeId(0)).unwrap(), &[2, 3]);
    }

    #[test]
    fn test_parse_free_whitespace() {
        // Pairs may span lines and share lines; only token order matters
        let graph = GraphLoader::parse_str("3 0\n1 1\t2\n\n  2 0  ").unwrap();
        assert_eq!(graph.num_edges(), 3);
        assert_eq!(graph.in_neighbors(NodeId(0)).unwrap(), &[2]);
    }

    #[test]
    fn test_node_count_only() {
        let graph = GraphLoader::parse_str("5\n").unwrap();
        assert_eq!(graph.num_nodes(), 5);
        assert_eq!(graph.dangling_count(), 5);
    }

    #[test]
    fn test_empty_input_rejected() {
        let err = GraphLoader::parse_str("").unwrap_err();
        assert_eq!(format_line(&err), 1);
    }

    #[test]
    fn test_endpoint_equal_to_n_rejected() {
        let err = GraphLoader::parse_str("3\n0 1\n2 3\n").unwrap_err();
        assert_eq!(format_line(&err), 3);
    }

    #[test]
    fn test_negative_id_rejected() {
        let err = GraphLoader::parse_str("3\n0 -1\n").unwrap_err();
        assert_eq!(format_line(&err), 2);
    }

    #[test]
    fn test_garbage_token_rejected() {
        let err = GraphLoader::parse_str("3\n0 x\n").unwrap_err();
        assert!(err.to_string().contains("\"x\""), "{err}");
    }

    #[test]
    fn test_dangling_source_rejected() {
        let err = GraphLoader::parse_str("3\n0 1\n2\n").unwrap_err();
        assert_eq!(format_line(&err), 3);
    }

    #[test]
    fn test_zero_node_count_rejected() {
        let err = GraphLoader::parse_str("0\n").unwrap_err();
        assert_eq!(format_line(&err), 1);
    }

    #[test]
    fn test_from_reader_matches_parse_str() {
        let text = "3\n0 1\n0 2\n1 2\n";
        let a = GraphLoader::parse_str(text).unwrap();
        let b = GraphLoader::from_reader(Cursor::new(text)).unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.txt");
        std::fs::write(&path, "2\n0 1\n").unwrap();

        let graph = GraphLoader::load(&path).await.unwrap();
        assert_eq!(graph.num_edges(), 1);
    }

    #[test]
    fn test_non_utf8_reader_is_format_error() {
        let input: &[u8] = b"3\n0 1\n1 \xff\n";
        let err = GraphLoader::from_reader(Cursor::new(input)).unwrap_err();
        assert_eq!(format_line(&err), 3);
        assert!(err.to_string().contains("UTF-8"), "{err}");
    }

    #[tokio::test]
    async fn test_load_non_utf8_file_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("binary.txt");
        std::fs::write(&path, b"3\n0 1\n1 \xff\n").unwrap();

        // The file was readable, so this is not a FileAccess failure
        let err = GraphLoader::load(&path).await.unwrap_err();
        assert_eq!(format_line(&err), 3);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = GraphLoader::load(dir.path().join("missing.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, RankError::FileAccess { .. }), "{err}");
    }
}

//! Score file output
//!
//! One line per node, `<node_index> = <score>`, with 20 significant digits so
//! runs can be compared bit-for-bit.

use std::io::{BufWriter, Write};
use std::path::Path;

/// Default output file name, written to the working directory
pub const DEFAULT_OUTPUT_FILE: &str = "output.txt";

/// Write scores to `out`
///
/// # Errors
///
/// Returns any I/O error from the writer
pub fn write_scores_to(mut out: impl Write, scores: &[f64]) -> std::io::Result<()> {
    for (node, score) in scores.iter().enumerate() {
        writeln!(out, "{node} = {score:.19e}")?;
    }
    out.flush()
}

/// Write scores to `path`, replacing any existing file
///
/// # Errors
///
/// Returns any I/O error from creating or writing the file
pub fn write_scores(path: impl AsRef<Path>, scores: &[f64]) -> std::io::Result<()> {
    let file = std::fs::File::create(path)?;
    write_scores_to(BufWriter::new(file), scores)
}

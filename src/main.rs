//! `trueno-pagerank <graph-file>`
//!
//! Loads an edge list, ranks it and writes `output.txt` to the working
//! directory. Without an argument it does nothing.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, Level};
use trueno_pagerank::backend::{Accelerator, CpuAccelerator};
use trueno_pagerank::storage::scores::{write_scores, DEFAULT_OUTPUT_FILE};
use trueno_pagerank::{
    GraphLoader, PageRankResult, PowerIterationSolver, Representation, RepresentationPolicy,
    SolverConfig,
};

#[derive(Parser)]
#[command(name = "trueno-pagerank", version, about = "PageRank power iteration")]
struct Cli {
    /// Edge-list file: node count followed by `source destination` pairs
    input: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let cli = Cli::parse();
    let Some(input) = cli.input else {
        return;
    };

    if let Err(e) = run(input).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(input: PathBuf) -> Result<()> {
    let graph = GraphLoader::load(&input)
        .await
        .with_context(|| format!("load: {}", input.display()))?;

    let representation =
        Representation::build(graph, &RepresentationPolicy::default()).context("build")?;
    info!(
        nodes = representation.num_nodes(),
        edges = representation.num_edges(),
        representation = %representation.kind(),
        "graph ready"
    );

    let (result, elapsed) = rank(representation).await?;

    info!(
        status = %result.status,
        iterations = result.iterations,
        final_delta = result.final_delta,
        sum = result.sum(),
        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
        "PageRank finished"
    );
    for (node, score) in result.top_k(5) {
        info!(node, score, "top ranked");
    }

    write_scores(DEFAULT_OUTPUT_FILE, &result.scores)
        .with_context(|| format!("write: {DEFAULT_OUTPUT_FILE}"))?;
    info!(path = DEFAULT_OUTPUT_FILE, "scores written");
    Ok(())
}

#[cfg(feature = "gpu")]
async fn rank(representation: Representation) -> Result<(PageRankResult, Duration)> {
    match trueno_pagerank::GpuAccelerator::new().await {
        Ok(gpu) => iterate(&gpu, representation),
        Err(e) => {
            tracing::warn!(error = %e, "GPU unavailable, using CPU accelerator");
            iterate(&CpuAccelerator::new().context("solve")?, representation)
        }
    }
}

#[cfg(not(feature = "gpu"))]
async fn rank(representation: Representation) -> Result<(PageRankResult, Duration)> {
    iterate(&CpuAccelerator::new().context("solve")?, representation)
}

/// Upload, iterate (timed) and extract on `accelerator`
///
/// The convergence threshold follows the accelerator's precision.
fn iterate<A: Accelerator>(
    accelerator: &A,
    representation: Representation,
) -> Result<(PageRankResult, Duration)> {
    let config = SolverConfig::for_accelerator(accelerator);
    let solver = PowerIterationSolver::new(config).context("build")?;
    info!(
        backend = %accelerator.name(),
        epsilon = solver.config().epsilon,
        "uploading"
    );
    let mut session = solver
        .upload(accelerator, representation)
        .context("solve: upload")?;

    let start = Instant::now();
    session.run().context("solve")?;
    let elapsed = start.elapsed();

    let result = session.extract().context("extract")?;
    Ok((result, elapsed))
}

//! Integration tests for trueno-pagerank
//!
//! Tests the full pipeline: graph file → load → rank → output file

use std::path::Path;
use tempfile::tempdir;
use trueno_pagerank::backend::{CpuAccelerator, LaunchConfig, RankKernel};
use trueno_pagerank::storage::scores::write_scores;
use trueno_pagerank::{
    pagerank, GraphLoader, PowerIterationSolver, RankError, Representation, RepresentationKind,
    RepresentationPolicy, SolverConfig, SolverState, SolverStatus,
};

/// Parse `output.txt` back into `(node, score)` pairs
fn read_output(path: &Path) -> Vec<(usize, f64)> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| {
            let (node, score) = line.split_once(" = ").unwrap();
            (node.parse().unwrap(), score.parse().unwrap())
        })
        .collect()
}

#[tokio::test]
async fn test_file_to_output_pipeline() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("web.txt");
    let output = dir.path().join("output.txt");

    // Small web: 0 links everywhere, 4 is a dead end
    std::fs::write(&input, "5\n0 1\n0 2\n0 3\n1 2\n2 0\n3 4\n").unwrap();

    let graph = GraphLoader::load(&input).await.unwrap();
    assert_eq!(graph.num_nodes(), 5);
    assert_eq!(graph.dangling_count(), 1);

    let result = pagerank(graph, &SolverConfig::default()).unwrap();
    assert_eq!(result.status, SolverStatus::Converged);
    write_scores(&output, &result.scores).unwrap();

    let lines = read_output(&output);
    assert_eq!(lines.len(), 5);
    for (i, (node, score)) in lines.iter().enumerate() {
        assert_eq!(*node, i);
        // 20 significant digits survive the round trip exactly
        assert_eq!(*score, result.scores[i]);
    }
    let sum: f64 = lines.iter().map(|(_, s)| s).sum();
    assert!((sum - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_output_is_overwritten() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("output.txt");

    write_scores(&output, &[0.1, 0.2, 0.3, 0.4]).unwrap();
    write_scores(&output, &[0.5, 0.5]).unwrap();

    assert_eq!(read_output(&output).len(), 2);
}

#[tokio::test]
async fn test_missing_file() {
    let dir = tempdir().unwrap();
    let err = GraphLoader::load(dir.path().join("absent.txt"))
        .await
        .unwrap_err();

    match err {
        RankError::FileAccess { path, .. } => assert!(path.ends_with("absent.txt")),
        other => panic!("expected FileAccess, got {other}"),
    }
}

#[tokio::test]
async fn test_out_of_range_endpoint_in_file() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("bad.txt");
    std::fs::write(&input, "3\n0 1\n1 2\n2 3\n").unwrap();

    let err = GraphLoader::load(&input).await.unwrap_err();
    assert!(
        matches!(err, RankError::GraphFormat { line: 4, .. }),
        "unexpected error: {err}"
    );
}

#[test]
fn test_session_lifecycle_on_cpu() {
    let graph = GraphLoader::parse_str("4\n1 0\n2 0\n3 0\n").unwrap();
    let repr = Representation::build(graph, &RepresentationPolicy::Compact).unwrap();
    assert_eq!(repr.kind(), RepresentationKind::Compact);

    let solver = PowerIterationSolver::new(SolverConfig::default()).unwrap();
    let mut session = solver
        .upload(&CpuAccelerator::new().unwrap(), repr)
        .unwrap();
    assert_eq!(session.state(), SolverState::Uploaded);
    assert_eq!(session.last_delta(), None);
    assert_eq!(session.launch_config(), LaunchConfig::default());

    let mut previous = f64::INFINITY;
    while !session.state().is_terminal() {
        session.step().unwrap();
        let delta = session.last_delta().unwrap();
        // Star converges monotonically
        assert!(delta <= previous);
        previous = delta;
    }
    assert_eq!(session.state(), SolverState::Converged);

    let iterations = session.iteration();
    let result = session.extract().unwrap();
    assert_eq!(result.iterations, iterations);
    assert_eq!(result.top_k(1)[0].0, 0);
}

#[test]
fn test_session_carries_accelerator_geometry() {
    let graph = GraphLoader::parse_str("100\n0 1\n1 2\n2 0\n").unwrap();
    let repr = Representation::build(graph, &RepresentationPolicy::Compact).unwrap();
    let cpu = CpuAccelerator::new().unwrap().with_group_size(7).unwrap();

    let solver = PowerIterationSolver::new(SolverConfig::default()).unwrap();
    let session = solver.upload(&cpu, repr).unwrap();

    let launch = session.launch_config();
    assert_eq!(launch.group_size, 7);
    assert_eq!(launch.groups_for(100), 15);
}

#[test]
fn test_kernel_direct_use() {
    use trueno_pagerank::backend::Accelerator;

    let graph = GraphLoader::parse_str("3\n0 1\n1 2\n2 0\n").unwrap();
    let repr = Representation::build(graph, &RepresentationPolicy::Dense).unwrap();
    let initial = repr.initial_scores();

    let mut kernel = CpuAccelerator::new().unwrap().upload(repr, &initial).unwrap();
    assert_eq!(kernel.num_nodes(), 3);

    // Uniform vector is the fixed point of a cycle
    let delta = kernel.step(0.85).unwrap();
    assert!(delta < 1e-15);
    for s in kernel.download().unwrap() {
        assert!((s - 1.0 / 3.0).abs() < 1e-15);
    }
}

#[test]
fn test_large_sparse_graph_uses_compact() {
    // 2000-node ring with chords
    let mut text = String::from("2000\n");
    for i in 0..2000_u32 {
        text.push_str(&format!("{i} {}\n", (i + 1) % 2000));
        if i % 10 == 0 {
            text.push_str(&format!("{i} {}\n", (i * 13) % 2000));
        }
    }
    let graph = GraphLoader::parse_str(&text).unwrap();

    let result = pagerank(graph, &SolverConfig::default()).unwrap();
    assert_eq!(result.representation, RepresentationKind::Compact);
    assert!((result.sum() - 1.0).abs() < 1e-9);
    assert!(result.scores.iter().all(|s| s.is_finite() && *s > 0.0));
}

#[cfg(feature = "cli")]
mod cli {
    use super::read_output;
    use std::process::Command;
    use tempfile::tempdir;

    const BIN: &str = env!("CARGO_BIN_EXE_trueno-pagerank");

    #[test]
    fn test_no_argument_is_a_no_op() {
        let dir = tempdir().unwrap();
        let status = Command::new(BIN).current_dir(dir.path()).status().unwrap();

        assert!(status.success());
        assert!(!dir.path().join("output.txt").exists());
    }

    #[test]
    fn test_writes_output_file() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("cycle.txt");
        std::fs::write(&input, "3\n0 1\n1 2\n2 0\n").unwrap();

        let output = Command::new(BIN)
            .arg(&input)
            .current_dir(dir.path())
            .output()
            .unwrap();
        assert!(output.status.success());

        // Completion event carries the checksum of the scores
        let stdout = String::from_utf8_lossy(&output.stdout);
        let finished = stdout
            .lines()
            .find(|line| line.contains("PageRank finished"))
            .unwrap_or_else(|| panic!("stdout: {stdout}"));
        assert!(finished.contains("sum"), "{finished}");

        let lines = read_output(&dir.path().join("output.txt"));
        assert_eq!(lines.len(), 3);
        for (_, score) in lines {
            // f32 on the GPU path, f64 on the CPU path
            assert!((score - 1.0 / 3.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_bad_input_exits_with_failure() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("bad.txt");
        std::fs::write(&input, "2\n0 2\n").unwrap();

        let output = Command::new(BIN)
            .arg(&input)
            .current_dir(dir.path())
            .output()
            .unwrap();

        assert_eq!(output.status.code(), Some(1));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("load"), "stderr: {stderr}");
        assert!(!dir.path().join("output.txt").exists());
    }

    #[test]
    fn test_non_utf8_input_is_reported_as_malformed() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("binary.txt");
        std::fs::write(&input, b"3\n0 1\n1 \xff\n").unwrap();

        let output = Command::new(BIN)
            .arg(&input)
            .current_dir(dir.path())
            .output()
            .unwrap();

        assert_eq!(output.status.code(), Some(1));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("malformed graph input at line 3"), "stderr: {stderr}");
        assert!(!stderr.contains("cannot read"), "stderr: {stderr}");
    }

    #[test]
    fn test_missing_file_exits_with_failure() {
        let dir = tempdir().unwrap();
        let output = Command::new(BIN)
            .arg(dir.path().join("nope.txt"))
            .current_dir(dir.path())
            .output()
            .unwrap();

        assert_eq!(output.status.code(), Some(1));
    }
}

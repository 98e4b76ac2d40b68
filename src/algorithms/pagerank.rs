//! `PageRank` power-iteration solver
//!
//! Based on Page et al. (1999) "The `PageRank` Citation Ranking: Bringing Order to the Web"
//!
//! # Algorithm
//!
//! ```text
//! PR(u) = (1-d)/N + d * (Σ PR(v) / outdegree(v) + Σ PR(w) / N)
//! ```
//!
//! Where:
//! - d = damping factor (0.85)
//! - N = total number of nodes
//! - v = nodes with edges to u
//! - w = dangling nodes (out-degree 0), whose mass is spread uniformly
//!
//! # Lifecycle
//!
//! ```text
//! PowerIterationSolver::new ──upload──▶ RankSession ──step…──▶ Converged
//!       (Initialized)                    (Uploaded)     │       or MaxIterationsReached
//!                                                       ▼
//!                                                  extract ──▶ PageRankResult
//! ```
//!
//! `extract` consumes the session, so the device-resident buffers are freed
//! exactly once and cannot be observed after the result is taken.

use crate::backend::{Accelerator, CpuAccelerator, LaunchConfig, RankKernel};
use crate::error::{RankError, Result};
use crate::storage::{Graph, Representation, RepresentationKind, RepresentationPolicy};
use std::fmt;
use tracing::{debug, info, warn};

/// Damping factor for `PageRank` (Google standard)
pub const DEFAULT_ALPHA: f64 = 0.85;

/// Default L1 convergence threshold
pub const DEFAULT_EPSILON: f64 = 1e-8;

/// Default iteration cap
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Solver parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    /// Damping factor, in `(0, 1)`
    pub alpha: f64,
    /// Stop once the L1 change between iterations drops below this
    pub epsilon: f64,
    /// Hard cap on kernel launches (at least 1)
    pub max_iterations: usize,
    /// Representation selection for [`pagerank`]
    pub policy: RepresentationPolicy,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            epsilon: DEFAULT_EPSILON,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            policy: RepresentationPolicy::default(),
        }
    }
}

impl SolverConfig {
    /// Defaults with the convergence threshold `accelerator` can resolve
    #[must_use]
    pub fn for_accelerator<A: Accelerator>(accelerator: &A) -> Self {
        Self::default().with_epsilon(accelerator.default_epsilon())
    }

    /// Set the damping factor
    #[must_use]
    pub const fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set the convergence threshold
    #[must_use]
    pub const fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Set the iteration cap
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the representation policy
    #[must_use]
    pub const fn with_policy(mut self, policy: RepresentationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Check parameter ranges
    ///
    /// # Errors
    ///
    /// Returns `RankError::InvalidConfig` if `alpha ∉ (0, 1)`, `epsilon` is
    /// negative or not finite, or `max_iterations` is zero
    pub fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(RankError::InvalidConfig(format!(
                "alpha must lie in (0, 1), got {}",
                self.alpha
            )));
        }
        if !(self.epsilon.is_finite() && self.epsilon >= 0.0) {
            return Err(RankError::InvalidConfig(format!(
                "epsilon must be finite and non-negative, got {}",
                self.epsilon
            )));
        }
        if self.max_iterations == 0 {
            return Err(RankError::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Observable solver state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverState {
    /// Configuration validated, nothing on the device yet
    Initialized,
    /// Buffers uploaded, no iteration run
    Uploaded,
    /// At least one iteration run, not terminal
    Iterating,
    /// Last delta fell below epsilon
    Converged,
    /// Iteration cap hit without convergence
    MaxIterationsReached,
}

impl SolverState {
    /// Whether no further iterations will run
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Converged | Self::MaxIterationsReached)
    }
}

/// How the iteration ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    /// Trustworthy fixed point: delta < epsilon
    Converged,
    /// Truncated approximation: the cap was reached first
    MaxIterationsReached,
}

impl fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Converged => f.write_str("converged"),
            Self::MaxIterationsReached => f.write_str("max iterations reached"),
        }
    }
}

/// Power-iteration driver, polymorphic over representation and accelerator
///
/// # Example
///
/// ```
/// use trueno_pagerank::backend::CpuAccelerator;
/// use trueno_pagerank::{
///     Graph, PowerIterationSolver, Representation, RepresentationPolicy, SolverConfig,
///     SolverStatus,
/// };
///
/// let graph = Graph::from_edges(3, &[(0, 1), (1, 2), (2, 0)]).unwrap();
/// let repr = Representation::build(graph, &RepresentationPolicy::Compact).unwrap();
///
/// let solver = PowerIterationSolver::new(SolverConfig::default()).unwrap();
/// let mut session = solver.upload(&CpuAccelerator::new().unwrap(), repr).unwrap();
///
/// assert_eq!(session.run().unwrap(), SolverStatus::Converged);
/// let result = session.extract().unwrap();
/// assert!((result.sum() - 1.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone)]
pub struct PowerIterationSolver {
    config: SolverConfig,
}

impl PowerIterationSolver {
    /// Validate `config` and create a solver in the `Initialized` state
    ///
    /// # Errors
    ///
    /// Returns `RankError::InvalidConfig` if the parameters are out of range
    pub fn new(config: SolverConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Solver parameters
    #[must_use]
    pub const fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Always `Initialized`: uploading hands state over to a [`RankSession`]
    #[must_use]
    pub const fn state(&self) -> SolverState {
        SolverState::Initialized
    }

    /// Move `representation` onto `accelerator` with the uniform `1/n` start vector
    ///
    /// # Errors
    ///
    /// Returns `RankError::Allocation` if the device cannot hold the buffers
    pub fn upload<A: Accelerator>(
        &self,
        accelerator: &A,
        representation: Representation,
    ) -> Result<RankSession<A::Kernel>> {
        let kind = representation.kind();
        let initial = representation.initial_scores();
        let kernel = accelerator.upload(representation, &initial)?;
        let launch = accelerator.launch_config();

        debug!(
            backend = %accelerator.name(),
            %kind,
            nodes = kernel.num_nodes(),
            group_size = launch.group_size,
            groups = launch.groups_for(kernel.num_nodes()),
            "solver state uploaded"
        );

        Ok(RankSession {
            kernel,
            config: self.config.clone(),
            kind,
            launch,
            iteration: 0,
            last_delta: None,
            state: SolverState::Uploaded,
        })
    }

    /// Upload, iterate to a terminal state and extract in one call
    ///
    /// # Errors
    ///
    /// Propagates upload, iteration and extraction failures
    pub fn solve<A: Accelerator>(
        &self,
        accelerator: &A,
        representation: Representation,
    ) -> Result<PageRankResult> {
        let mut session = self.upload(accelerator, representation)?;
        session.run()?;
        session.extract()
    }
}

/// Device-resident solver state between upload and extraction
#[derive(Debug)]
pub struct RankSession<K: RankKernel> {
    kernel: K,
    config: SolverConfig,
    kind: RepresentationKind,
    launch: LaunchConfig,
    iteration: usize,
    last_delta: Option<f64>,
    state: SolverState,
}

impl<K: RankKernel> RankSession<K> {
    /// Current state
    #[must_use]
    pub const fn state(&self) -> SolverState {
        self.state
    }

    /// Launch geometry of the accelerator the session was uploaded to
    #[must_use]
    pub const fn launch_config(&self) -> LaunchConfig {
        self.launch
    }

    /// Completed iterations
    #[must_use]
    pub const fn iteration(&self) -> usize {
        self.iteration
    }

    /// L1 change produced by the most recent iteration
    #[must_use]
    pub const fn last_delta(&self) -> Option<f64> {
        self.last_delta
    }

    /// Run one iteration (no-op once terminal)
    ///
    /// # Errors
    ///
    /// Returns `RankError::NumericDivergence` if a score became non-finite,
    /// or any kernel launch/readback failure
    pub fn step(&mut self) -> Result<SolverState> {
        if self.state.is_terminal() {
            return Ok(self.state);
        }

        let delta = self.kernel.step(self.config.alpha)?;
        self.iteration += 1;
        self.last_delta = Some(delta);

        if !delta.is_finite() {
            let scores = self.kernel.download()?;
            let node = scores.iter().position(|s| !s.is_finite()).unwrap_or(0);
            return Err(RankError::NumericDivergence {
                node,
                iteration: self.iteration,
            });
        }

        self.state = if delta < self.config.epsilon {
            SolverState::Converged
        } else if self.iteration >= self.config.max_iterations {
            SolverState::MaxIterationsReached
        } else {
            SolverState::Iterating
        };

        debug!(iteration = self.iteration, delta, state = ?self.state, "iteration complete");
        Ok(self.state)
    }

    /// Iterate until `Converged` or `MaxIterationsReached`
    ///
    /// # Errors
    ///
    /// Propagates [`RankSession::step`] failures
    pub fn run(&mut self) -> Result<SolverStatus> {
        loop {
            match self.step()? {
                SolverState::Converged => return Ok(SolverStatus::Converged),
                SolverState::MaxIterationsReached => {
                    return Ok(SolverStatus::MaxIterationsReached)
                }
                _ => {}
            }
        }
    }

    /// Copy the scores into host memory and release the device state
    ///
    /// Runs to a terminal state first if needed.
    ///
    /// # Errors
    ///
    /// Returns `RankError::NumericDivergence` if any extracted score is not
    /// finite, or any readback failure
    pub fn extract(mut self) -> Result<PageRankResult> {
        let status = self.run()?;
        let scores = self.kernel.download()?;

        if let Some(node) = scores.iter().position(|s| !s.is_finite()) {
            return Err(RankError::NumericDivergence {
                node,
                iteration: self.iteration,
            });
        }

        let final_delta = self.last_delta.unwrap_or(f64::NAN);
        match status {
            SolverStatus::Converged => info!(
                iterations = self.iteration,
                delta = final_delta,
                "PageRank converged"
            ),
            SolverStatus::MaxIterationsReached => warn!(
                iterations = self.iteration,
                delta = final_delta,
                epsilon = self.config.epsilon,
                "PageRank stopped at the iteration cap without converging"
            ),
        }

        Ok(PageRankResult {
            scores,
            status,
            iterations: self.iteration,
            final_delta,
            representation: self.kind,
        })
    }
}

/// Extracted `PageRank` scores, owned by the caller
#[derive(Debug, Clone, PartialEq)]
pub struct PageRankResult {
    /// `PageRank` score for each node (sum ≈ 1)
    pub scores: Vec<f64>,

    /// Whether the fixed point was reached
    pub status: SolverStatus,

    /// Number of iterations performed
    pub iterations: usize,

    /// L1 change of the last iteration
    pub final_delta: f64,

    /// Representation the scores were computed with
    pub representation: RepresentationKind,
}

impl PageRankResult {
    /// Get `PageRank` score for a specific node
    #[must_use]
    pub fn score(&self, node_id: usize) -> Option<f64> {
        self.scores.get(node_id).copied()
    }

    /// Whether the result is a converged fixed point
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.status == SolverStatus::Converged
    }

    /// Sum of all scores
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.scores.iter().sum()
    }

    /// The `k` highest-ranked nodes, best first (ties by lower node id)
    #[must_use]
    pub fn top_k(&self, k: usize) -> Vec<(usize, f64)> {
        let mut ranked: Vec<(usize, f64)> = self.scores.iter().copied().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(k);
        ranked
    }

    /// Take ownership of the score vector
    #[must_use]
    pub fn into_scores(self) -> Vec<f64> {
        self.scores
    }
}

/// Compute `PageRank` scores on the CPU accelerator
///
/// Builds the representation chosen by `config.policy` and iterates until
/// convergence or `config.max_iterations`.
///
/// # Errors
///
/// Returns `RankError::InvalidConfig` for out-of-range parameters,
/// `RankError::Allocation` if the representation does not fit, or
/// `RankError::NumericDivergence` if the iteration produced non-finite scores
///
/// # Example
///
/// ```
/// use trueno_pagerank::{pagerank, Graph, SolverConfig};
///
/// // Cycle
/// let graph = Graph::from_edges(3, &[(0, 1), (1, 2), (2, 0)]).unwrap();
///
/// let result = pagerank(graph, &SolverConfig::default()).unwrap();
/// assert_eq!(result.scores.len(), 3);
/// assert!((result.sum() - 1.0).abs() < 1e-9); // Sum = 1.0
/// ```
pub fn pagerank(graph: Graph, config: &SolverConfig) -> Result<PageRankResult> {
    let solver = PowerIterationSolver::new(config.clone())?;
    let representation = Representation::build(graph, &config.policy)?;
    solver.solve(&CpuAccelerator::new()?, representation)
}

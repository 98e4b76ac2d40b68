//! CPU accelerator: data-parallel kernels on a rayon thread pool
//!
//! Each work group covers `group_size` consecutive nodes. Reductions produce
//! one partial per group, collected in group order and summed sequentially,
//! so results are bitwise reproducible for a fixed group size regardless of
//! thread scheduling.

use super::{Accelerator, LaunchConfig, RankKernel};
use crate::error::{try_zeroed, RankError, Result};
use crate::storage::Representation;
use anyhow::Context;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::debug;

/// Host-memory accelerator backed by a rayon thread pool
///
/// # Example
///
/// ```
/// use trueno_pagerank::backend::{Accelerator, CpuAccelerator, RankKernel};
/// use trueno_pagerank::{CompactAdjacency, Graph, Representation};
///
/// let graph = Graph::from_edges(2, &[(0, 1), (1, 0)]).unwrap();
/// let repr = Representation::from(CompactAdjacency::from_graph(graph).unwrap());
/// let initial = repr.initial_scores();
///
/// let cpu = CpuAccelerator::new().unwrap();
/// let mut kernel = cpu.upload(repr, &initial).unwrap();
/// let delta = kernel.step(0.85).unwrap();
/// assert!(delta < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct CpuAccelerator {
    pool: Arc<rayon::ThreadPool>,
    launch: LaunchConfig,
    memory_limit: Option<u64>,
}

impl CpuAccelerator {
    /// Thread pool with one thread per core and the default group size
    ///
    /// # Errors
    ///
    /// Returns `RankError::Accelerator` if the thread pool cannot be created
    pub fn new() -> Result<Self> {
        Self::with_threads(0)
    }

    /// Thread pool with `num_threads` threads (0 = one per core)
    ///
    /// # Errors
    ///
    /// Returns `RankError::Accelerator` if the thread pool cannot be created
    pub fn with_threads(num_threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("pagerank-cpu-{i}"))
            .build()
            .context("Failed to build CPU accelerator thread pool")?;

        Ok(Self {
            pool: Arc::new(pool),
            launch: LaunchConfig::default(),
            memory_limit: None,
        })
    }

    /// Override the number of nodes per work group
    ///
    /// # Errors
    ///
    /// Returns `RankError::InvalidConfig` if `group_size` is zero
    pub fn with_group_size(mut self, group_size: usize) -> Result<Self> {
        if group_size == 0 {
            return Err(RankError::InvalidConfig(
                "group size must be positive".to_string(),
            ));
        }
        self.launch.group_size = group_size;
        Ok(self)
    }

    /// Cap the bytes the kernel may hold (representation + score buffers)
    #[must_use]
    pub const fn with_memory_limit(mut self, bytes: u64) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    fn footprint(representation: &Representation) -> u64 {
        let n = representation.num_nodes() as u64;
        let scores = 2 * n * 8;
        let data = match representation {
            Representation::Dense(m) => m.as_slice().len() as u64 * 8 + n * 4,
            Representation::Compact(a) => {
                let (offsets, in_neighbors, out_degrees, dangling) = a.components();
                (offsets.len() + in_neighbors.len() + out_degrees.len() + dangling.len()) as u64
                    * 4
            }
        };
        scores + data
    }
}

impl Accelerator for CpuAccelerator {
    type Kernel = CpuKernel;

    fn name(&self) -> String {
        format!("cpu ({} threads)", self.pool.current_num_threads())
    }

    fn launch_config(&self) -> LaunchConfig {
        self.launch
    }

    fn upload(&self, representation: Representation, initial: &[f64]) -> Result<CpuKernel> {
        let n = representation.num_nodes();
        if initial.len() != n {
            return Err(RankError::InvalidConfig(format!(
                "initial vector has {} entries for {n} nodes",
                initial.len()
            )));
        }

        if let Some(limit) = self.memory_limit {
            let requested = Self::footprint(&representation);
            if requested > limit {
                return Err(RankError::Allocation {
                    what: "solver state",
                    requested,
                    limit,
                });
            }
        }

        let mut current: Vec<f64> = try_zeroed("current scores", n)?;
        current.copy_from_slice(initial);
        let next = try_zeroed("next scores", n)?;

        debug!(
            nodes = n,
            kind = %representation.kind(),
            group_size = self.launch.group_size,
            "uploaded to cpu accelerator"
        );

        Ok(CpuKernel {
            representation,
            current,
            next,
            pool: Arc::clone(&self.pool),
            launch: self.launch,
        })
    }
}

/// Solver state owned by the CPU accelerator
#[derive(Debug)]
pub struct CpuKernel {
    representation: Representation,
    current: Vec<f64>,
    next: Vec<f64>,
    pool: Arc<rayon::ThreadPool>,
    launch: LaunchConfig,
}

impl RankKernel for CpuKernel {
    fn num_nodes(&self) -> usize {
        self.current.len()
    }

    #[allow(clippy::cast_precision_loss)]
    fn step(&mut self, alpha: f64) -> Result<f64> {
        let Self {
            representation,
            current,
            next,
            pool,
            launch,
        } = self;

        let n = current.len();
        let inv_n = 1.0 / n as f64;
        let launch = *launch;
        let current_ref: &[f64] = current;

        let delta = pool.install(|| match &*representation {
            Representation::Dense(matrix) => {
                // Dangling mass already lives in the uniform columns
                let update = UpdatePass::new(alpha, inv_n, 0.0, launch);
                update.run(current_ref, next, |i| dot(matrix.row(i), current_ref))
            }
            Representation::Compact(adj) => {
                let dangling_mass =
                    grouped_sum(adj.dangling_nodes(), launch, |&v| current_ref[v as usize]);
                let update = UpdatePass::new(alpha, inv_n, dangling_mass, launch);
                update.run(current_ref, next, |i| {
                    adj.in_neighbors(i)
                        .iter()
                        .map(|&j| {
                            let degree = adj.out_degree(j as usize);
                            if degree == 0 {
                                0.0
                            } else {
                                current_ref[j as usize] / f64::from(degree)
                            }
                        })
                        .sum::<f64>()
                })
            }
        });

        std::mem::swap(current, next);
        Ok(delta)
    }

    fn download(&mut self) -> Result<Vec<f64>> {
        let mut out: Vec<f64> = try_zeroed("result scores", self.current.len())?;
        out.copy_from_slice(&self.current);
        Ok(out)
    }
}

/// Per-node update `next[i] = teleport + alpha * (contrib(i) + dangling/n)`
struct UpdatePass {
    alpha: f64,
    base: f64,
    launch: LaunchConfig,
}

impl UpdatePass {
    fn new(alpha: f64, inv_n: f64, dangling_mass: f64, launch: LaunchConfig) -> Self {
        let teleport = (1.0 - alpha) * inv_n;
        Self {
            alpha,
            base: teleport + alpha * dangling_mass * inv_n,
            launch,
        }
    }

    /// Returns the L1 distance between `current` and the new `next`
    fn run<F>(&self, current: &[f64], next: &mut [f64], contrib: F) -> f64
    where
        F: Fn(usize) -> f64 + Sync,
    {
        let group_size = self.launch.group_size;
        let mut partials = Vec::with_capacity(self.launch.groups_for(next.len()));
        next.par_chunks_mut(group_size)
            .enumerate()
            .map(|(group, chunk)| {
                let first = group * group_size;
                let mut diff = 0.0;
                for (offset, slot) in chunk.iter_mut().enumerate() {
                    let i = first + offset;
                    let value = self.base + self.alpha * contrib(i);
                    diff += (value - current[i]).abs();
                    *slot = value;
                }
                diff
            })
            .collect_into_vec(&mut partials);
        partials.iter().sum()
    }
}

/// Deterministic parallel sum: one partial per group, combined in order
fn grouped_sum<T, F>(items: &[T], launch: LaunchConfig, value: F) -> f64
where
    T: Sync,
    F: Fn(&T) -> f64 + Sync,
{
    let mut partials = Vec::with_capacity(launch.groups_for(items.len()));
    items
        .par_chunks(launch.group_size)
        .map(|chunk| chunk.iter().map(&value).sum::<f64>())
        .collect_into_vec(&mut partials);
    partials.iter().sum()
}

fn dot(row: &[f64], scores: &[f64]) -> f64 {
    row.iter().zip(scores).map(|(m, s)| m * s).sum()
}

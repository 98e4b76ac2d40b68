//! GPU `PageRank` kernels
//!
//! Sparse matrix-vector multiplication (`SpMV`) based `PageRank`.
//! Based on Page et al. (1999) and `GraphBLAST` (Yang et al., ACM `ToMS` 2022).
//!
//! One [`GpuKernel::step`] records into a single command buffer:
//! 1. gather the scores of dangling nodes and tree-reduce them to one sum
//!    (compact representation only)
//! 2. rank update, one invocation per node, writing `next[i]` and
//!    `|next[i] - current[i]|`
//! 3. tree-reduce the per-node differences to the L1 delta
//!
//! Only the 4-byte delta is read back per iteration. Score buffers swap roles
//! by selecting the other precomputed bind group, so nothing is copied.

use super::{GpuDevice, GpuGraphBuffers, GpuMemoryLimits, GpuRankBuffers};
use crate::backend::{Accelerator, LaunchConfig, RankKernel};
use crate::error::{RankError, Result};
use crate::storage::Representation;
use anyhow::Context;
use std::sync::Arc;
use tracing::debug;

/// Invocations per workgroup (matches `@workgroup_size` in the shaders)
pub const WORKGROUP_SIZE: u32 = 32;

/// Convergence threshold suited to `f32` scores
pub const GPU_EPSILON: f64 = 1e-6;

/// Launch geometry of every compute pass
pub const GPU_LAUNCH: LaunchConfig = LaunchConfig {
    group_size: WORKGROUP_SIZE as usize,
};

/// WebGPU guarantees at least this many workgroups per dispatch dimension
const MAX_WORKGROUPS_PER_DIM: u32 = 65_535;

const RANK_COMPACT_SHADER: &str = include_str!("shaders/rank_compact.wgsl");
const RANK_DENSE_SHADER: &str = include_str!("shaders/rank_dense.wgsl");
const GATHER_DANGLING_SHADER: &str = include_str!("shaders/gather_dangling.wgsl");
const REDUCE_SUM_SHADER: &str = include_str!("shaders/reduce_sum.wgsl");

/// Rank update parameters for GPU shader
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct RankParams {
    num_nodes: u32,
    alpha: f32,
    teleport: f32,
    inv_n: f32,
}

impl RankParams {
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn new(num_nodes: u32, alpha: f64) -> Self {
        let n = f64::from(num_nodes);
        Self {
            num_nodes,
            alpha: alpha as f32,
            teleport: ((1.0 - alpha) / n) as f32,
            inv_n: (1.0 / n) as f32,
        }
    }
}

/// Element count for gather and reduce passes
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct LengthParams {
    len: u32,
    _padding: [u32; 3],
}

impl LengthParams {
    const fn new(len: u32) -> Self {
        Self {
            len,
            _padding: [0; 3],
        }
    }
}

/// Workgroups needed for `items` invocations
fn workgroups(items: u32) -> u32 {
    // Never more groups than items, so the count fits back into u32
    u32::try_from(GPU_LAUNCH.groups_for(items as usize)).unwrap_or(u32::MAX)
}

/// Workgroup grid covering `items` invocations
///
/// Spills into the y dimension past `MAX_WORKGROUPS_PER_DIM`; shaders
/// linearize with `gid.x + gid.y * num_workgroups.x * 32`.
fn dispatch_size(items: u32) -> (u32, u32) {
    let groups = workgroups(items);
    let x = groups.min(MAX_WORKGROUPS_PER_DIM);
    (x, groups.div_ceil(x))
}

/// A compute pipeline with its bind group layout
#[derive(Debug)]
struct ComputeKernel {
    label: &'static str,
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
}

impl ComputeKernel {
    /// Compile `source` and lay out one buffer binding per entry of `bindings`
    fn new(
        device: &GpuDevice,
        label: &'static str,
        source: &str,
        entry_point: &str,
        bindings: &[wgpu::BufferBindingType],
    ) -> Self {
        let module = device
            .device()
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });

        let entries: Vec<wgpu::BindGroupLayoutEntry> = bindings
            .iter()
            .zip(0_u32..)
            .map(|(&ty, binding)| wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            })
            .collect();

        let layout = device
            .device()
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries: &entries,
            });

        let pipeline_layout = device
            .device()
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });

        let pipeline = device
            .device()
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });

        Self {
            label,
            pipeline,
            layout,
        }
    }

    /// Bind `buffers` to bindings `0..buffers.len()` in order
    fn bind(&self, device: &GpuDevice, buffers: &[&wgpu::Buffer]) -> wgpu::BindGroup {
        let entries: Vec<wgpu::BindGroupEntry<'_>> = buffers
            .iter()
            .zip(0_u32..)
            .map(|(buffer, binding)| wgpu::BindGroupEntry {
                binding,
                resource: buffer.as_entire_binding(),
            })
            .collect();

        device
            .device()
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(self.label),
                layout: &self.layout,
                entries: &entries,
            })
    }

    /// Record one dispatch covering `items` invocations
    fn record(&self, encoder: &mut wgpu::CommandEncoder, bind_group: &wgpu::BindGroup, items: u32) {
        let (x, y) = dispatch_size(items);
        let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(self.label),
            timestamp_writes: None,
        });
        compute_pass.set_pipeline(&self.pipeline);
        compute_pass.set_bind_group(0, bind_group, &[]);
        compute_pass.dispatch_workgroups(x, y, 1);
    }
}

const UNIFORM: wgpu::BufferBindingType = wgpu::BufferBindingType::Uniform;
const READ: wgpu::BufferBindingType = wgpu::BufferBindingType::Storage { read_only: true };
const READ_WRITE: wgpu::BufferBindingType = wgpu::BufferBindingType::Storage { read_only: false };

/// Shared reduction pipeline and the chain of partial-sum passes for one input
#[derive(Debug)]
struct Reduction {
    passes: Vec<(wgpu::BindGroup, u32)>,
    partials: Vec<wgpu::Buffer>,
    _lengths: Vec<wgpu::Buffer>,
}

impl Reduction {
    /// Plan passes reducing `len` floats of `input` down to one
    fn new(device: &GpuDevice, kernel: &ComputeKernel, input: &wgpu::Buffer, len: u32) -> Self {
        let mut passes = Vec::new();
        let mut partials: Vec<wgpu::Buffer> = Vec::new();
        let mut lengths = Vec::new();
        let mut len = len.max(1);

        loop {
            let groups = workgroups(len);
            let output = device.create_buffer(
                "Reduction Partials",
                u64::from(groups) * 4,
                wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            );
            let params = device.create_buffer_init(
                "Reduction Length",
                bytemuck::bytes_of(&LengthParams::new(len)),
                wgpu::BufferUsages::UNIFORM,
            );
            let source = partials.last().unwrap_or(input);
            let bind_group = kernel.bind(device, &[&params, source, &output]);

            passes.push((bind_group, len));
            partials.push(output);
            lengths.push(params);

            if groups == 1 {
                break;
            }
            len = groups;
        }

        Self {
            passes,
            partials,
            _lengths: lengths,
        }
    }

    fn record(&self, kernel: &ComputeKernel, encoder: &mut wgpu::CommandEncoder) {
        for (bind_group, len) in &self.passes {
            kernel.record(encoder, bind_group, *len);
        }
    }

    /// Single-element buffer holding the total after [`Self::record`]
    fn result(&self) -> &wgpu::Buffer {
        &self.partials[self.partials.len() - 1]
    }
}

/// Dangling-mass stage of the compact kernel
#[derive(Debug)]
struct DanglingStage {
    gather: ComputeKernel,
    bind_groups: [wgpu::BindGroup; 2],
    count: u32,
    sum: Reduction,
    _values: wgpu::Buffer,
    _length: wgpu::Buffer,
}

/// wgpu-backed accelerator
///
/// Scores are held as `f32` on the device; expect deltas to bottom out
/// around `1e-7`, so use a correspondingly looser epsilon
/// ([`GPU_EPSILON`], picked up by [`SolverConfig::for_accelerator`]).
///
/// # Example
///
/// ```ignore
/// # use trueno_pagerank::gpu::GpuAccelerator;
/// # use trueno_pagerank::{PowerIterationSolver, Representation, SolverConfig};
/// let gpu = GpuAccelerator::new().await?;
/// let solver = PowerIterationSolver::new(SolverConfig::for_accelerator(&gpu))?;
/// let result = solver.solve(&gpu, representation)?;
/// ```
#[derive(Debug, Clone)]
pub struct GpuAccelerator {
    device: Arc<GpuDevice>,
    limits: GpuMemoryLimits,
}

impl GpuAccelerator {
    /// Acquire the default adapter
    ///
    /// # Errors
    ///
    /// Returns `RankError::Accelerator` if no adapter or device is available
    pub async fn new() -> Result<Self> {
        let device = GpuDevice::new().await.map_err(anyhow::Error::from)?;
        Ok(Self::from_device(device))
    }

    /// Wrap an existing device
    #[must_use]
    pub fn from_device(device: GpuDevice) -> Self {
        let limits = GpuMemoryLimits::detect(&device);
        Self {
            device: Arc::new(device),
            limits,
        }
    }

    /// Underlying device
    #[must_use]
    pub fn device(&self) -> &GpuDevice {
        &self.device
    }

    /// Memory limits applied at upload
    #[must_use]
    pub const fn limits(&self) -> GpuMemoryLimits {
        self.limits
    }
}

impl Accelerator for GpuAccelerator {
    type Kernel = GpuKernel;

    fn name(&self) -> String {
        let info = self.device.info();
        format!("gpu ({}, {:?})", info.name, info.backend)
    }

    fn launch_config(&self) -> LaunchConfig {
        GPU_LAUNCH
    }

    fn default_epsilon(&self) -> f64 {
        GPU_EPSILON
    }

    fn upload(&self, representation: Representation, initial: &[f64]) -> Result<GpuKernel> {
        let n = representation.num_nodes();
        if initial.len() != n {
            return Err(RankError::InvalidConfig(format!(
                "initial vector has {} entries for {n} nodes",
                initial.len()
            )));
        }

        let footprint = GpuRankBuffers::footprint(&representation);
        self.limits.check(&footprint)?;

        let buffers = GpuRankBuffers::upload(&self.device, &representation, initial);
        let kernel = GpuKernel::new(Arc::clone(&self.device), buffers)?;

        debug!(
            nodes = n,
            kind = %representation.kind(),
            bytes = footprint.iter().map(|(_, b)| b).sum::<u64>(),
            "uploaded to gpu accelerator"
        );
        Ok(kernel)
    }
}

/// Solver state resident on the GPU
#[derive(Debug)]
pub struct GpuKernel {
    device: Arc<GpuDevice>,
    num_nodes: u32,
    params: wgpu::Buffer,
    update: ComputeKernel,
    update_groups: [wgpu::BindGroup; 2],
    dangling: Option<DanglingStage>,
    reduce: ComputeKernel,
    delta: Reduction,
    current: usize,
    buffers: GpuRankBuffers,
    _zero_mass: Option<wgpu::Buffer>,
}

impl GpuKernel {
    fn new(device: Arc<GpuDevice>, buffers: GpuRankBuffers) -> Result<Self> {
        let num_nodes = u32::try_from(buffers.num_nodes)
            .map_err(|_| RankError::InvalidConfig("node count exceeds u32".to_string()))?;

        let params = device.create_buffer_init(
            "PageRank Params",
            bytemuck::bytes_of(&RankParams::new(num_nodes, crate::algorithms::DEFAULT_ALPHA)),
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        );

        let reduce = ComputeKernel::new(
            &device,
            "Reduce Sum",
            REDUCE_SUM_SHADER,
            "reduce_sum",
            &[UNIFORM, READ, READ_WRITE],
        );
        let delta = Reduction::new(&device, &reduce, &buffers.diff, num_nodes);

        let [scores_a, scores_b] = &buffers.scores;
        let mut zero_mass = None;
        let mut dangling = None;

        let (update, update_groups) = match &buffers.graph {
            GpuGraphBuffers::Dense { transition } => {
                let update = ComputeKernel::new(
                    &device,
                    "Dense Rank Update",
                    RANK_DENSE_SHADER,
                    "rank_update",
                    &[UNIFORM, READ, READ, READ_WRITE, READ_WRITE],
                );
                let groups = [
                    update.bind(&device, &[&params, transition, scores_a, scores_b, &buffers.diff]),
                    update.bind(&device, &[&params, transition, scores_b, scores_a, &buffers.diff]),
                ];
                (update, groups)
            }
            GpuGraphBuffers::Compact {
                offsets,
                in_neighbors,
                out_degrees,
                dangling_nodes,
                dangling_count,
            } => {
                let stage = if *dangling_count > 0 {
                    Some(DanglingStage::new(
                        &device,
                        &reduce,
                        dangling_nodes,
                        *dangling_count,
                        [scores_a, scores_b],
                    )?)
                } else {
                    None
                };

                let mass: &wgpu::Buffer = match &stage {
                    Some(stage) => stage.sum.result(),
                    None => zero_mass.insert(device.create_buffer_init(
                        "Zero Dangling Mass",
                        bytemuck::bytes_of(&0.0_f32),
                        wgpu::BufferUsages::STORAGE,
                    )),
                };

                let update = ComputeKernel::new(
                    &device,
                    "Compact Rank Update",
                    RANK_COMPACT_SHADER,
                    "rank_update",
                    &[UNIFORM, READ, READ, READ, READ, READ, READ_WRITE, READ_WRITE],
                );
                let bind = |current: &wgpu::Buffer, next: &wgpu::Buffer| {
                    update.bind(
                        &device,
                        &[
                            &params,
                            offsets,
                            in_neighbors,
                            out_degrees,
                            current,
                            mass,
                            next,
                            &buffers.diff,
                        ],
                    )
                };
                let groups = [bind(scores_a, scores_b), bind(scores_b, scores_a)];
                dangling = stage;
                (update, groups)
            }
        };

        Ok(Self {
            device,
            num_nodes,
            params,
            update,
            update_groups,
            dangling,
            reduce,
            delta,
            current: 0,
            buffers,
            _zero_mass: zero_mass,
        })
    }
}

impl DanglingStage {
    fn new(
        device: &GpuDevice,
        reduce: &ComputeKernel,
        dangling_nodes: &wgpu::Buffer,
        dangling_count: usize,
        [scores_a, scores_b]: [&wgpu::Buffer; 2],
    ) -> Result<Self> {
        let count = u32::try_from(dangling_count)
            .map_err(|_| RankError::InvalidConfig("dangling count exceeds u32".to_string()))?;

        let gather = ComputeKernel::new(
            device,
            "Gather Dangling",
            GATHER_DANGLING_SHADER,
            "gather_dangling",
            &[UNIFORM, READ, READ, READ_WRITE],
        );
        let length = device.create_buffer_init(
            "Dangling Length",
            bytemuck::bytes_of(&LengthParams::new(count)),
            wgpu::BufferUsages::UNIFORM,
        );
        let values = device.create_buffer(
            "Dangling Scores",
            u64::from(count) * 4,
            wgpu::BufferUsages::STORAGE,
        );
        let bind_groups = [
            gather.bind(device, &[&length, dangling_nodes, scores_a, &values]),
            gather.bind(device, &[&length, dangling_nodes, scores_b, &values]),
        ];
        let sum = Reduction::new(device, reduce, &values, count);

        Ok(Self {
            gather,
            bind_groups,
            count,
            sum,
            _values: values,
            _length: length,
        })
    }
}

impl RankKernel for GpuKernel {
    fn num_nodes(&self) -> usize {
        self.buffers.num_nodes
    }

    fn step(&mut self, alpha: f64) -> Result<f64> {
        self.device.queue().write_buffer(
            &self.params,
            0,
            bytemuck::bytes_of(&RankParams::new(self.num_nodes, alpha)),
        );

        let mut encoder =
            self.device
                .device()
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("PageRank Iteration"),
                });

        if let Some(stage) = &self.dangling {
            stage
                .gather
                .record(&mut encoder, &stage.bind_groups[self.current], stage.count);
            stage.sum.record(&self.reduce, &mut encoder);
        }
        self.update
            .record(&mut encoder, &self.update_groups[self.current], self.num_nodes);
        self.delta.record(&self.reduce, &mut encoder);

        self.device.queue().submit(Some(encoder.finish()));

        let delta = self
            .device
            .read_f32(self.delta.result(), 1)?
            .first()
            .copied()
            .context("Delta readback returned no data")?;

        self.current ^= 1;
        Ok(f64::from(delta))
    }

    fn download(&mut self) -> Result<Vec<f64>> {
        let scores = self
            .device
            .read_f32(&self.buffers.scores[self.current], self.buffers.num_nodes)?;
        Ok(scores.into_iter().map(f64::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::{PowerIterationSolver, SolverConfig, SolverStatus};
    use crate::backend::CpuAccelerator;
    use crate::storage::{Graph, RepresentationPolicy};

    #[test]
    fn test_dispatch_size() {
        assert_eq!(dispatch_size(0), (1, 1));
        assert_eq!(dispatch_size(32), (1, 1));
        assert_eq!(dispatch_size(33), (2, 1));
        assert_eq!(dispatch_size(65_535 * 32), (65_535, 1));
        assert_eq!(dispatch_size(65_535 * 32 + 1), (65_535, 2));
    }

    #[test]
    fn test_workgroups_follow_launch_config() {
        assert_eq!(workgroups(1), 1);
        assert_eq!(workgroups(64), 2);
        assert_eq!(workgroups(65), 3);
        assert_eq!(GPU_LAUNCH.group_size, WORKGROUP_SIZE as usize);
    }

    #[test]
    fn test_rank_params() {
        let params = RankParams::new(4, 0.85);
        assert_eq!(params.num_nodes, 4);
        assert!((params.teleport - 0.0375).abs() < 1e-7);
        assert!((params.inv_n - 0.25).abs() < f32::EPSILON);
    }

    fn star() -> Graph {
        Graph::from_edges(4, &[(1, 0), (2, 0), (3, 0)]).unwrap()
    }

    async fn solve_on_gpu(graph: Graph, policy: RepresentationPolicy) -> Vec<f64> {
        let gpu = GpuAccelerator::new().await.unwrap();
        let config = SolverConfig::for_accelerator(&gpu).with_policy(policy);
        let solver = PowerIterationSolver::new(config.clone()).unwrap();
        let repr = Representation::build(graph, &config.policy).unwrap();
        let result = solver.solve(&gpu, repr).unwrap();
        assert_eq!(result.status, SolverStatus::Converged);
        result.scores
    }

    #[tokio::test]
    #[ignore = "Requires GPU hardware"]
    async fn test_gpu_matches_cpu_compact() {
        let gpu_scores = solve_on_gpu(star(), RepresentationPolicy::Compact).await;

        let cpu = CpuAccelerator::new().unwrap();
        let solver = PowerIterationSolver::new(SolverConfig::default()).unwrap();
        let repr = Representation::build(star(), &RepresentationPolicy::Compact).unwrap();
        let cpu_scores = solver.solve(&cpu, repr).unwrap().scores;

        for (g, c) in gpu_scores.iter().zip(&cpu_scores) {
            assert!((g - c).abs() < 1e-4, "gpu {g} vs cpu {c}");
        }
        assert!((gpu_scores.iter().sum::<f64>() - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    #[ignore = "Requires GPU hardware"]
    async fn test_gpu_dense_and_compact_agree() {
        let edges: Vec<(u32, u32)> = (0..40).map(|i| (i, (i * 7 + 3) % 40)).collect();
        let graph = Graph::from_edges(40, &edges).unwrap();

        let dense = solve_on_gpu(graph.clone(), RepresentationPolicy::Dense).await;
        let compact = solve_on_gpu(graph, RepresentationPolicy::Compact).await;

        for (d, c) in dense.iter().zip(&compact) {
            assert!((d - c).abs() < 1e-4);
        }
    }

    #[tokio::test]
    #[ignore = "Requires GPU hardware"]
    async fn test_gpu_large_reduction_chain() {
        // 5000 nodes: the delta reduction needs three passes. Every node has
        // in- and out-degree 2, so the uniform vector is already stationary.
        let edges: Vec<(u32, u32)> = (0..5000)
            .flat_map(|i| [(i, (i + 1) % 5000), (i, (i * 7 + 3) % 5000)])
            .collect();
        let graph = Graph::from_edges(5000, &edges).unwrap();
        let scores = solve_on_gpu(graph, RepresentationPolicy::Compact).await;

        assert_eq!(scores.len(), 5000);
        assert!((scores.iter().sum::<f64>() - 1.0).abs() < 1e-3);
        for s in scores {
            assert!((s - 1.0 / 5000.0).abs() < 1e-7);
        }
    }

    #[tokio::test]
    #[ignore = "Requires GPU hardware"]
    async fn test_gpu_default_epsilon_converges() {
        // Two out-links per node, no dangling nodes, well off the uniform vector
        let edges: Vec<(u32, u32)> = (0..3000_u32)
            .flat_map(|i| [(i, (i * 17 + 5) % 3000), (i, (i * i) % 3000)])
            .collect();
        let graph = Graph::from_edges(3000, &edges).unwrap();

        let gpu = GpuAccelerator::new().await.unwrap();
        assert!((gpu.default_epsilon() - GPU_EPSILON).abs() < f64::EPSILON);

        let solver = PowerIterationSolver::new(SolverConfig::for_accelerator(&gpu)).unwrap();
        let repr = Representation::build(graph, &RepresentationPolicy::Compact).unwrap();
        let result = solver.solve(&gpu, repr).unwrap();

        assert_eq!(result.status, SolverStatus::Converged);
    }

    #[tokio::test]
    #[ignore = "Requires GPU hardware"]
    async fn test_gpu_rejects_oversized_upload() {
        let gpu = GpuAccelerator::new().await.unwrap();
        let limits = gpu.limits();
        let cpu_side = Representation::build(star(), &RepresentationPolicy::Compact).unwrap();
        assert!(limits
            .check(&GpuRankBuffers::footprint(&cpu_side))
            .is_ok());

        let huge = [("dense matrix", limits.max_buffer_size + 1)];
        assert!(matches!(
            limits.check(&huge),
            Err(RankError::Allocation { .. })
        ));
    }
}

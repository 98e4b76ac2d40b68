//! GPU buffer management for `PageRank` state
//!
//! Uploads a [`Representation`] and the starting vector to device memory as
//! `f32`/`u32` storage buffers and allocates the two score buffers the
//! kernels ping-pong between.

use super::GpuDevice;
use crate::storage::Representation;

const F32_BYTES: u64 = std::mem::size_of::<f32>() as u64;
const U32_BYTES: u64 = std::mem::size_of::<u32>() as u64;

/// Graph data resident on the device
#[derive(Debug)]
pub enum GpuGraphBuffers {
    /// Row-major `n * n` transition matrix
    Dense {
        /// Matrix entries (`f32`)
        transition: wgpu::Buffer,
    },
    /// Reverse CSR plus the dangling list
    Compact {
        /// CSR offsets (`n + 1` entries)
        offsets: wgpu::Buffer,
        /// Flattened in-neighbor lists
        in_neighbors: wgpu::Buffer,
        /// Out-degree per node
        out_degrees: wgpu::Buffer,
        /// Indices of nodes with out-degree 0
        dangling_nodes: wgpu::Buffer,
        /// Number of dangling nodes
        dangling_count: usize,
    },
}

/// Device buffers for one solver run
///
/// Manages GPU-side storage of:
/// - The graph representation
/// - Two score vectors (current / next, swapped each iteration)
/// - Per-node absolute change, reduced to the iteration delta
#[derive(Debug)]
pub struct GpuRankBuffers {
    /// Number of nodes in the graph
    pub num_nodes: usize,

    /// Number of edges in the graph
    pub num_edges: usize,

    /// Representation data
    pub graph: GpuGraphBuffers,

    /// Ping-pong score vectors (size: `num_nodes`)
    pub scores: [wgpu::Buffer; 2],

    /// `|next[i] - current[i]|` written by the update kernel
    pub diff: wgpu::Buffer,
}

impl GpuRankBuffers {
    /// Named buffer sizes (bytes) the upload will allocate
    ///
    /// Feed this to `GpuMemoryLimits::check` before calling [`Self::upload`].
    #[must_use]
    pub fn footprint(representation: &Representation) -> Vec<(&'static str, u64)> {
        let n = representation.num_nodes() as u64;
        let mut sizes = vec![
            ("current scores", n * F32_BYTES),
            ("next scores", n * F32_BYTES),
            ("score differences", n * F32_BYTES),
        ];
        match representation {
            Representation::Dense(m) => {
                sizes.push(("dense matrix", m.as_slice().len() as u64 * F32_BYTES));
            }
            Representation::Compact(a) => {
                let (offsets, in_neighbors, out_degrees, dangling) = a.components();
                sizes.push(("csr offsets", offsets.len() as u64 * U32_BYTES));
                sizes.push(("csr in-neighbors", in_neighbors.len() as u64 * U32_BYTES));
                sizes.push(("out-degrees", out_degrees.len() as u64 * U32_BYTES));
                sizes.push(("dangling nodes", dangling.len() as u64 * U32_BYTES));
                sizes.push(("dangling scores", dangling.len() as u64 * F32_BYTES));
            }
        }
        sizes
    }

    /// Upload the representation and the starting vector
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn upload(device: &GpuDevice, representation: &Representation, initial: &[f64]) -> Self {
        let graph = match representation {
            Representation::Dense(m) => {
                let entries: Vec<f32> = m.as_slice().iter().map(|&p| p as f32).collect();
                GpuGraphBuffers::Dense {
                    transition: storage_f32(device, "Dense transition matrix", &entries),
                }
            }
            Representation::Compact(a) => {
                let (offsets, in_neighbors, out_degrees, dangling) = a.components();
                GpuGraphBuffers::Compact {
                    offsets: storage_u32(device, "CSR offsets", offsets),
                    in_neighbors: storage_u32(device, "CSR in_neighbors", in_neighbors),
                    out_degrees: storage_u32(device, "CSR out_degrees", out_degrees),
                    dangling_nodes: storage_u32(device, "Dangling nodes", dangling),
                    dangling_count: dangling.len(),
                }
            }
        };

        let initial: Vec<f32> = initial.iter().map(|&s| s as f32).collect();
        let score_usage = wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC;

        Self {
            num_nodes: representation.num_nodes(),
            num_edges: representation.num_edges(),
            graph,
            scores: [
                device.create_buffer_init(
                    "PageRank Scores A",
                    bytemuck::cast_slice(&padded(&initial)),
                    score_usage,
                ),
                device.create_buffer_init(
                    "PageRank Scores B",
                    bytemuck::cast_slice(&padded(&initial)),
                    score_usage,
                ),
            ],
            diff: device.create_buffer(
                "PageRank Differences",
                (initial.len().max(1) as u64) * F32_BYTES,
                wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            ),
        }
    }

    /// Get number of nodes
    #[must_use]
    pub const fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Get number of edges
    #[must_use]
    pub const fn num_edges(&self) -> usize {
        self.num_edges
    }
}

/// Storage bindings may not be empty; pad to a single zero element
fn padded<T: Copy + Default>(data: &[T]) -> Vec<T> {
    if data.is_empty() {
        vec![T::default()]
    } else {
        data.to_vec()
    }
}

fn storage_u32(device: &GpuDevice, label: &str, data: &[u32]) -> wgpu::Buffer {
    device.create_buffer_init(
        label,
        bytemuck::cast_slice(&padded(data)),
        wgpu::BufferUsages::STORAGE,
    )
}

fn storage_f32(device: &GpuDevice, label: &str, data: &[f32]) -> wgpu::Buffer {
    device.create_buffer_init(
        label,
        bytemuck::cast_slice(&padded(data)),
        wgpu::BufferUsages::STORAGE,
    )
}

//! GPU acceleration for `PageRank`
//!
//! Based on research from:
//! - **Gunrock** (Wang et al., ACM `ToPC` 2017) - GPU graph primitives
//! - **`GraphBLAST`** (Yang et al., 2022) - GPU linear algebra for graphs
//!
//! # Architecture
//!
//! - `device`: GPU device initialization and blocking readback
//! - `memory`: buffer budget checked before upload
//! - `buffer`: device-resident representation and score buffers
//! - `pagerank`: [`GpuAccelerator`] / [`GpuKernel`] and the WGSL kernels
//!
//! # Feature Flag
//!
//! This module is only available with the `gpu` feature flag:
//! ```bash
//! cargo build --features gpu
//! ```

mod buffer;
mod device;
mod memory;
mod pagerank;

pub use buffer::{GpuGraphBuffers, GpuRankBuffers};
pub use device::{GpuDevice, GpuDeviceError};
pub use memory::GpuMemoryLimits;
pub use pagerank::{GpuAccelerator, GpuKernel, GPU_EPSILON, GPU_LAUNCH, WORKGROUP_SIZE};

//! Accelerator boundary
//!
//! The solver never touches device memory directly. An [`Accelerator`] takes
//! ownership of a [`Representation`], allocates its device-resident state and
//! hands back a [`RankKernel`] that runs one synchronous iteration per call.
//! Dropping the kernel releases every device buffer.
//!
//! Backends:
//! - [`CpuAccelerator`]: rayon work groups over host memory (`f64`)
//! - `gpu::GpuAccelerator`: wgpu compute shaders (`f32`, feature `gpu`)

mod cpu;

pub use cpu::{CpuAccelerator, CpuKernel};

use crate::error::Result;
use crate::storage::Representation;

/// Default number of nodes handled by one work group
pub const DEFAULT_GROUP_SIZE: usize = 32;

/// Kernel launch geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchConfig {
    /// Nodes per work group (CPU chunk / GPU workgroup)
    pub group_size: usize,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            group_size: DEFAULT_GROUP_SIZE,
        }
    }
}

impl LaunchConfig {
    /// Number of groups needed to cover `num_items`
    #[must_use]
    pub fn groups_for(&self, num_items: usize) -> usize {
        num_items.div_ceil(self.group_size).max(1)
    }
}

/// Allocation, upload and kernel-launch facility
pub trait Accelerator {
    /// Device-resident solver state produced by [`Accelerator::upload`]
    type Kernel: RankKernel;

    /// Human-readable backend name (for logs)
    fn name(&self) -> String;

    /// Launch geometry used by this backend
    fn launch_config(&self) -> LaunchConfig;

    /// Smallest L1 delta this backend's arithmetic can resolve reliably
    ///
    /// Backends with `f32` scores override this with a looser threshold.
    fn default_epsilon(&self) -> f64 {
        crate::algorithms::DEFAULT_EPSILON
    }

    /// Allocate device buffers and copy the representation and initial scores
    ///
    /// # Errors
    ///
    /// Returns `RankError::Allocation` if the buffers exceed the device budget
    fn upload(&self, representation: Representation, initial: &[f64]) -> Result<Self::Kernel>;
}

/// One power-iteration kernel bound to device-resident buffers
pub trait RankKernel {
    /// Length of the score vector
    fn num_nodes(&self) -> usize;

    /// Run one iteration and swap the score buffers
    ///
    /// Computes `next[i] = (1 - alpha)/n + alpha * (contrib[i] + dangling/n)`
    /// and returns the L1 distance between the old and new vectors. Blocks
    /// until the device has finished and the distance is visible on the host.
    ///
    /// # Errors
    ///
    /// Returns an error if the launch or the readback fails
    fn step(&mut self, alpha: f64) -> Result<f64>;

    /// Copy the current score vector into host memory
    ///
    /// # Errors
    ///
    /// Returns an error if the readback fails
    fn download(&mut self) -> Result<Vec<f64>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groups_for() {
        let launch = LaunchConfig { group_size: 32 };
        assert_eq!(launch.groups_for(0), 1);
        assert_eq!(launch.groups_for(32), 1);
        assert_eq!(launch.groups_for(33), 2);
        assert_eq!(launch.groups_for(1000), 32);
    }
}

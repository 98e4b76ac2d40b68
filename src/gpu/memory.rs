//! GPU memory budget
//!
//! Checks the solver's buffers against the device limits before anything is
//! allocated, so an oversized graph fails with `RankError::Allocation`
//! instead of a device-lost error mid-run.

use super::GpuDevice;
use crate::error::{RankError, Result};

/// Fraction of the largest buffer size treated as usable for solver state
const USABLE_FRACTION: f64 = 0.7;

/// GPU memory limits relevant to the solver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuMemoryLimits {
    /// Largest single buffer the device allows (bytes)
    pub max_buffer_size: u64,

    /// Largest storage buffer a shader may bind (bytes)
    pub max_binding_size: u64,

    /// Total budget for all solver buffers (70% of `max_buffer_size`, leaving
    /// headroom for staging buffers and the driver)
    pub usable_vram: u64,
}

impl GpuMemoryLimits {
    /// Derive limits from the device
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn detect(device: &GpuDevice) -> Self {
        let limits = device.limits();
        let max_buffer_size = limits.max_buffer_size;
        Self {
            max_buffer_size,
            max_binding_size: u64::from(limits.max_storage_buffer_binding_size),
            usable_vram: (max_buffer_size as f64 * USABLE_FRACTION) as u64,
        }
    }

    /// Check a set of named buffer sizes against the limits
    ///
    /// # Errors
    ///
    /// Returns `RankError::Allocation` naming the first buffer that exceeds the
    /// binding limit, or the whole state if the total exceeds the budget
    pub fn check(&self, buffers: &[(&'static str, u64)]) -> Result<()> {
        let binding_limit = self.max_binding_size.min(self.max_buffer_size);
        for &(what, bytes) in buffers {
            if bytes > binding_limit {
                return Err(RankError::Allocation {
                    what,
                    requested: bytes,
                    limit: binding_limit,
                });
            }
        }

        let total = buffers
            .iter()
            .try_fold(0_u64, |acc, &(_, bytes)| acc.checked_add(bytes))
            .unwrap_or(u64::MAX);
        if total > self.usable_vram {
            return Err(RankError::Allocation {
                what: "GPU solver state",
                requested: total,
                limit: self.usable_vram,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMITS: GpuMemoryLimits = GpuMemoryLimits {
        max_buffer_size: 256 * 1024 * 1024,
        max_binding_size: 128 * 1024 * 1024,
        usable_vram: 179 * 1024 * 1024,
    };

    #[test]
    fn test_fits() {
        assert!(LIMITS
            .check(&[("scores", 1024), ("matrix", 64 * 1024 * 1024)])
            .is_ok());
    }

    #[test]
    fn test_single_buffer_over_binding_limit() {
        let err = LIMITS
            .check(&[("scores", 1024), ("matrix", 200 * 1024 * 1024)])
            .unwrap_err();
        match err {
            RankError::Allocation { what, limit, .. } => {
                assert_eq!(what, "matrix");
                assert_eq!(limit, 128 * 1024 * 1024);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_total_over_budget() {
        let err = LIMITS
            .check(&[("a", 100 * 1024 * 1024), ("b", 100 * 1024 * 1024)])
            .unwrap_err();
        assert!(matches!(
            err,
            RankError::Allocation {
                what: "GPU solver state",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_memory_limits_detection() {
        if !GpuDevice::is_gpu_available().await {
            eprintln!("⚠️  Skipping test_memory_limits_detection: GPU not available");
            return;
        }

        let device = GpuDevice::new().await.unwrap();
        let limits = GpuMemoryLimits::detect(&device);

        assert!(limits.max_buffer_size > 0);
        assert!(limits.usable_vram <= limits.max_buffer_size);
    }
}

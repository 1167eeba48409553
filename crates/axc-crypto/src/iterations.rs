//! Self-calibrating key-wrap iteration count
//!
//! Times one calibration wrap on first use and scales the iteration count so
//! a wrap costs about `target` on this machine, never dropping below the
//! configured floor.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use axc_core::config::KeyWrapConfig;
use axc_core::AxcResult;
use tracing::debug;

use crate::key::AesKey;
use crate::keywrap::{KeyWrap, KeyWrapMode, MAXIMUM_ITERATIONS, MINIMUM_ITERATIONS};

#[derive(Debug)]
pub struct KeyWrapIterationCalculator {
    target: Duration,
    minimum: u32,
    calibration: u32,
    measured: OnceLock<u32>,
}

impl KeyWrapIterationCalculator {
    pub fn new(target: Duration, minimum: u32, calibration: u32) -> Self {
        Self {
            target,
            minimum: minimum.clamp(MINIMUM_ITERATIONS, MAXIMUM_ITERATIONS),
            calibration: calibration.clamp(MINIMUM_ITERATIONS, MAXIMUM_ITERATIONS),
            measured: OnceLock::new(),
        }
    }

    pub fn from_config(config: &KeyWrapConfig) -> Self {
        Self::new(
            Duration::from_millis(config.target_millis),
            config.minimum_iterations,
            config.calibration_iterations,
        )
    }

    /// Iteration count for new key wraps. Calibrates on the first call only.
    pub fn iterations(&self) -> AxcResult<u32> {
        if let Some(iterations) = self.measured.get() {
            return Ok(*iterations);
        }
        let iterations = self.calibrate()?;
        Ok(*self.measured.get_or_init(|| iterations))
    }

    fn calibrate(&self) -> AxcResult<u32> {
        let kek = AesKey::from_bytes(&[0x5A; 16])?;
        let salt = [0xA5u8; 16];
        let payload = AesKey::from_bytes(&[0x3C; 16])?;
        let wrap = KeyWrap::with_salt(&kek, &salt, self.calibration, KeyWrapMode::AxCrypt)?;

        let start = Instant::now();
        wrap.wrap(&payload)?;
        let elapsed = start.elapsed();

        let iterations = scale_iterations(elapsed, self.calibration, self.target, self.minimum);
        debug!(
            calibration = self.calibration,
            elapsed_us = elapsed.as_micros() as u64,
            iterations,
            "calibrated key wrap iterations"
        );
        Ok(iterations)
    }
}

impl Default for KeyWrapIterationCalculator {
    fn default() -> Self {
        Self::from_config(&KeyWrapConfig::default())
    }
}

/// Iterations that would take `target` given that `calibration` iterations
/// took `elapsed`, clamped to `[minimum, MAXIMUM_ITERATIONS]`.
pub fn scale_iterations(elapsed: Duration, calibration: u32, target: Duration, minimum: u32) -> u32 {
    let elapsed_nanos = elapsed.as_nanos().max(1);
    let scaled = target.as_nanos() * calibration as u128 / elapsed_nanos;
    let scaled = u32::try_from(scaled).unwrap_or(u32::MAX);
    scaled.clamp(minimum.min(MAXIMUM_ITERATIONS), MAXIMUM_ITERATIONS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_proportional() {
        // 1000 iterations in 10ms → 10000 iterations in 100ms
        let n = scale_iterations(Duration::from_millis(10), 1000, Duration::from_millis(100), 6);
        assert_eq!(n, 10_000);
    }

    #[test]
    fn test_scale_clamps_to_floor() {
        // Slow hardware: 1000 iterations took a full second
        let n = scale_iterations(Duration::from_secs(1), 1000, Duration::from_millis(100), 20_000);
        assert_eq!(n, 20_000);
    }

    #[test]
    fn test_scale_saturates() {
        let n = scale_iterations(Duration::ZERO, u32::MAX, Duration::from_secs(3600), 6);
        assert_eq!(n, MAXIMUM_ITERATIONS);
        let n = scale_iterations(Duration::from_secs(1), 1000, Duration::from_millis(100), u32::MAX);
        assert_eq!(n, MAXIMUM_ITERATIONS);
    }

    #[test]
    fn test_iterations_respect_floor_and_are_cached() {
        let calculator = KeyWrapIterationCalculator::new(Duration::from_millis(1), 5_000, 100);
        let first = calculator.iterations().unwrap();
        let second = calculator.iterations().unwrap();
        assert!(first >= 5_000);
        assert_eq!(first, second, "calibration must run once");
    }

    #[test]
    fn test_floor_never_below_keywrap_minimum() {
        let calculator = KeyWrapIterationCalculator::new(Duration::ZERO, 0, 0);
        assert!(calculator.iterations().unwrap() >= MINIMUM_ITERATIONS);
    }
}

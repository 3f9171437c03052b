//! Adaptive per-file deadlines.

use sluice_config::TimeoutConfig;
use sluice_core::FileFormat;
use std::time::Duration;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Computes how long a file attempt may run.
#[derive(Debug, Clone, Default)]
pub struct TimeoutPolicy {
    config: TimeoutConfig,
}

impl TimeoutPolicy {
    pub fn new(config: TimeoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TimeoutConfig {
        &self.config
    }

    /// Deadline in seconds for `size_bytes` of `format` on retry `retry_attempt`.
    ///
    /// Monotonically non-decreasing in size and attempt, never above
    /// `max_timeout_secs`.
    pub fn calculate_timeout(&self, size_bytes: u64, format: Option<FileFormat>, retry_attempt: u32) -> f64 {
        let c = &self.config;
        let size_mb = size_bytes as f64 / BYTES_PER_MB;

        let mut timeout = c.base_timeout_secs + size_mb * c.seconds_per_mb;
        if format == Some(FileFormat::Pdf) {
            timeout *= c.pdf_multiplier;
            if size_mb >= c.complex_pdf_threshold_mb {
                timeout *= c.complex_pdf_multiplier;
            }
        }
        if retry_attempt > 0 {
            timeout *= c.retry_timeout_multiplier.powi(retry_attempt as i32);
        }

        timeout.min(c.max_timeout_secs)
    }

    /// Convert a deadline in seconds into a `Duration`.
    ///
    /// A negative, zero or NaN value falls back to `max_timeout_secs`, and to
    /// the default maximum if that is unusable too. The result is never
    /// unbounded.
    pub fn to_duration(&self, secs: f64) -> Duration {
        let usable = |s: f64| Duration::try_from_secs_f64(s).ok().filter(|d| !d.is_zero());
        usable(secs)
            .or_else(|| usable(self.config.max_timeout_secs))
            .unwrap_or_else(|| Duration::from_secs_f64(TimeoutConfig::default().max_timeout_secs))
    }

    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }
}

//! Runtime configuration
//!
//! Compile-time defaults with runtime environment overrides.
//!
//! # Configuration priority (highest wins)
//!
//! 1. Builder methods
//! 2. Environment variables
//! 3. Library defaults

use mnthread_core::env::env_get;
use mnthread_core::error::{SchedError, SchedResult};

/// Library defaults, overridable via environment and builder.
pub mod defaults {
    /// Kernel threads in the dispatch pool
    pub const KERNELS: usize = 4;
    /// Stack size per user thread
    pub const STACK_SIZE: usize = 256 * 1024;
    /// Consecutive poll failures tolerated before the I/O thread gives up
    pub const POLL_ERROR_LIMIT: u32 = 16;
}

/// Scheduler configuration with builder pattern.
///
/// Use `from_env()` to start from the defaults with any environment
/// overrides applied.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of kernel threads in the dispatch pool
    pub kernels: usize,
    /// Default stack size for user threads, in bytes
    pub stack_size: usize,
    /// Consecutive poll failures tolerated before the I/O thread gives up
    pub poll_error_limit: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl SchedulerConfig {
    /// Create config from defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `MNT_KERNELS` - Number of kernel threads
    /// - `MNT_STACK_SIZE` - Stack size per user thread, in bytes
    /// - `MNT_POLL_ERROR_LIMIT` - Poll failures before the I/O thread gives up
    pub fn from_env() -> Self {
        Self {
            kernels: env_get("MNT_KERNELS", defaults::KERNELS),
            stack_size: env_get("MNT_STACK_SIZE", defaults::STACK_SIZE),
            poll_error_limit: env_get("MNT_POLL_ERROR_LIMIT", defaults::POLL_ERROR_LIMIT),
        }
    }

    /// Create config with explicit defaults, ignoring the environment.
    pub fn new() -> Self {
        Self {
            kernels: defaults::KERNELS,
            stack_size: defaults::STACK_SIZE,
            poll_error_limit: defaults::POLL_ERROR_LIMIT,
        }
    }

    // Builder methods

    pub fn kernels(mut self, n: usize) -> Self {
        self.kernels = n;
        self
    }

    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = bytes;
        self
    }

    pub fn poll_error_limit(mut self, limit: u32) -> Self {
        self.poll_error_limit = limit;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> SchedResult<()> {
        if self.kernels == 0 {
            return Err(SchedError::InvalidConfig("kernels must be > 0"));
        }
        if self.kernels > 256 {
            return Err(SchedError::InvalidConfig("kernels must be <= 256"));
        }
        if self.stack_size < 16 * 1024 {
            return Err(SchedError::InvalidConfig("stack_size must be >= 16KB"));
        }
        if self.poll_error_limit == 0 {
            return Err(SchedError::InvalidConfig("poll_error_limit must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(SchedulerConfig::new().validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = SchedulerConfig::new().kernels(8).stack_size(128 * 1024);
        assert_eq!(config.kernels, 8);
        assert_eq!(config.stack_size, 128 * 1024);
    }

    #[test]
    fn test_validation_rejects_zero_kernels() {
        let config = SchedulerConfig::new().kernels(0);
        assert!(matches!(
            config.validate(),
            Err(SchedError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validation_rejects_tiny_stack() {
        let config = SchedulerConfig::new().stack_size(1024);
        assert!(config.validate().is_err());
    }
}

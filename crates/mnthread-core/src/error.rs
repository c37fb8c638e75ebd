//! Error types for the scheduler and I/O thread

use core::fmt;

/// Result type for scheduler operations
pub type SchedResult<T> = Result<T, SchedError>;

/// Errors that can occur in scheduler operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedError {
    /// Allocating a user thread's stack failed; carries the raw errno
    StackAlloc(i32),

    /// The readiness primitive failed repeatedly; carries the raw errno
    /// of the last failure
    Poll(i32),

    /// A scheduler was destroyed while user threads were still live.
    /// This is a fatal usage error; the process is aborted, so the variant
    /// only appears in diagnostics
    JoinableOnDrop,

    /// Configuration rejected by validation
    InvalidConfig(&'static str),
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedError::StackAlloc(errno) => {
                write!(f, "stack allocation failed (errno {})", errno)
            }
            SchedError::Poll(errno) => {
                write!(f, "readiness poll failed (errno {})", errno)
            }
            SchedError::JoinableOnDrop => {
                write!(f, "scheduler destroyed while user threads are live")
            }
            SchedError::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for SchedError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = SchedError::StackAlloc(12);
        assert_eq!(format!("{}", e), "stack allocation failed (errno 12)");

        let e = SchedError::InvalidConfig("kernels must be > 0");
        assert_eq!(format!("{}", e), "invalid config: kernels must be > 0");
    }

    #[test]
    fn test_error_is_std_error() {
        fn takes_error(_: &dyn std::error::Error) {}
        takes_error(&SchedError::Poll(4));
    }
}

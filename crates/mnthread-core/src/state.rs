//! Context lifecycle states

use core::fmt;

/// State of a user-thread context
///
/// The lifecycle is `Unstarted → Suspended → Running → ... → Finished`,
/// bouncing between `Suspended` and `Running` at every suspension point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ContextState {
    /// Created but not yet primed by `start()`
    Unstarted = 0,

    /// Parked at a suspension point, resumable
    Suspended = 1,

    /// Executing on some kernel thread
    Running = 2,

    /// Entry returned (or panicked); the context will never run again
    Finished = 3,
}

impl ContextState {
    /// Check if the context can be handed to `resume()`
    #[inline]
    pub const fn is_resumable(&self) -> bool {
        matches!(self, ContextState::Suspended)
    }

    /// Check if the context has terminated
    #[inline]
    pub const fn is_finished(&self) -> bool {
        matches!(self, ContextState::Finished)
    }
}

impl fmt::Display for ContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContextState::Unstarted => "unstarted",
            ContextState::Suspended => "suspended",
            ContextState::Running => "running",
            ContextState::Finished => "finished",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        assert!(ContextState::Suspended.is_resumable());
        assert!(!ContextState::Running.is_resumable());
        assert!(ContextState::Finished.is_finished());
        assert!(!ContextState::Unstarted.is_finished());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(format!("{}", ContextState::Running), "running");
    }
}

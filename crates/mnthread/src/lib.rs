//! # mnthread - M:N user-level threading
//!
//! Multiplexes many cooperative user threads, each with its own stack, over
//! a small fixed pool of kernel threads. A user thread that would block on a
//! file descriptor is parked on a dedicated I/O thread until the descriptor
//! is ready, without ever blocking a kernel thread.
//!
//! ## Quick start
//!
//! ```ignore
//! use mnthread::{Scheduler, io};
//!
//! let sched = Scheduler::new(4);
//!
//! sched.add_thread(|| {
//!     println!("hello from a user thread");
//! }).unwrap();
//!
//! // Blocking-style I/O that only suspends the user thread:
//! sched.add_thread(move || {
//!     let mut buf = [0u8; 512];
//!     let n = io::read(fd, &mut buf).unwrap();
//!     println!("got {} bytes", n);
//! }).unwrap();
//!
//! sched.join_all();
//! ```
//!
//! ## Architecture
//!
//! ```text
//!  add_thread ──▶ ready pool ──▶ kernel threads (dispatch loop)
//!                    ▲                   │ resume/suspend
//!                    │                   ▼
//!                    └──────── I/O thread (poll + wakeup pipe)
//! ```
//!
//! Scheduling is strictly cooperative: a user thread runs until it parks on
//! a descriptor, calls [`yield_now`], or finishes. Every scheduler must be
//! drained with [`Scheduler::join_all`] before it is dropped.

// Re-export core types
pub use mnthread_core::{ContextState, SchedError, SchedResult, UserThreadId};

// Re-export runtime types
pub use mnthread_runtime::io;
pub use mnthread_runtime::tls::is_user_thread;
pub use mnthread_runtime::{Fifo, Interest, Scheduler, SchedulerConfig, SpawnOptions, Strategy};

/// Yield the current user thread back to the ready pool.
///
/// The dispatcher requeues it behind whatever else is runnable. Called off a
/// user stack this degrades to yielding the OS thread.
#[inline]
pub fn yield_now() {
    if is_user_thread() {
        mnthread_runtime::context::suspend();
    } else {
        std::thread::yield_now();
    }
}

/// Id of the calling user thread, or `UserThreadId::NONE` when called off a
/// user stack.
#[inline]
pub fn current_id() -> UserThreadId {
    mnthread_runtime::tls::current_id()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_yield_now_off_user_stack_is_harmless() {
        yield_now();
        assert!(current_id().is_none());
    }

    #[test]
    fn test_facade_round_trip() {
        let sched =
            Scheduler::with_config(SchedulerConfig::new().kernels(2).stack_size(64 * 1024))
                .unwrap();
        let hits = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let hits = hits.clone();
            sched
                .add_thread(move || {
                    assert!(is_user_thread());
                    assert!(current_id().is_some());
                    yield_now();
                    hits.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }
        sched.join_all();
        assert_eq!(hits.load(Ordering::SeqCst), 10);
    }
}

//! # mnthread-runtime
//!
//! An M:N user-level threading runtime. Many cooperative user threads, each
//! with its own stack, are multiplexed over a small fixed pool of kernel
//! threads; a dedicated I/O thread parks user threads that would block on a
//! file descriptor and feeds them back to the scheduler when the descriptor
//! becomes ready.
//!
//! This crate provides:
//! - Context switching (architecture-specific assembly)
//! - mmap-backed stacks with guard pages
//! - The kernel-thread dispatcher and ready pool
//! - The poll-based asynchronous I/O thread
//! - Blocking-style fd wrappers for user-thread code

pub mod arch;
pub mod config;
pub mod context;
pub mod io;
pub mod pipe;
pub mod poll;
pub mod scheduler;
pub mod stack;
pub mod strategy;
pub mod tls;

mod io_thread;

// Re-exports
pub use config::SchedulerConfig;
pub use context::Context;
pub use poll::Interest;
pub use scheduler::{Scheduler, SpawnOptions};
pub use strategy::{Fifo, Strategy};

// Platform detection
cfg_if::cfg_if! {
    if #[cfg(unix)] {
        // poll(2), pipe(2) and mmap(2) are all we need.
    } else {
        compile_error!("mnthread only supports unix platforms");
    }
}

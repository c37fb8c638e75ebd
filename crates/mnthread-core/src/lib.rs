//! # mnthread-core
//!
//! Shared leaf types for the mnthread M:N threading runtime: user-thread
//! identifiers, context states, error types, and environment helpers.
//!
//! This crate has no platform dependencies; everything OS-specific lives in
//! `mnthread-runtime`.

pub mod env;
pub mod error;
pub mod id;
pub mod state;

pub use env::env_get;
pub use error::{SchedError, SchedResult};
pub use id::UserThreadId;
pub use state::ContextState;

//! Architecture-specific context switching
//!
//! Each architecture module provides a `SavedRegs` save area, `init_context`
//! to prepare a fresh context, and `switch` to move between two save areas.
//! Only the callee-saved set is captured; a switch costs a handful of moves
//! and an indirect jump.

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        pub mod x86_64;
        pub use x86_64::{init_context, switch, SavedRegs};
    } else if #[cfg(target_arch = "aarch64")] {
        pub mod aarch64;
        pub use aarch64::{init_context, switch, SavedRegs};
    } else {
        compile_error!("mnthread only supports x86_64 and aarch64");
    }
}

//! Per-kernel-thread pointer to the currently resumed user context
//!
//! Set for exactly the duration of `Context::resume` on the resuming kernel
//! thread; null everywhere else. User-thread code (the I/O wrappers, id
//! introspection) reaches its own context through this slot.

use crate::context::ContextInner;
use mnthread_core::id::UserThreadId;
use std::cell::Cell;
use std::ptr;

thread_local! {
    static CURRENT: Cell<*mut ContextInner> = const { Cell::new(ptr::null_mut()) };
}

/// Install `ptr` as the current context, returning the previous value.
#[inline]
pub(crate) fn replace_current(ptr: *mut ContextInner) -> *mut ContextInner {
    CURRENT.with(|c| c.replace(ptr))
}

/// The context currently resumed on this kernel thread, or null.
#[inline]
pub(crate) fn current() -> *mut ContextInner {
    CURRENT.with(|c| c.get())
}

/// Check whether the caller is running on a user-thread stack.
#[inline]
pub fn is_user_thread() -> bool {
    !current().is_null()
}

/// Id of the user thread currently resumed on this kernel thread, or
/// `UserThreadId::NONE` when called off a user stack.
#[inline]
pub fn current_id() -> UserThreadId {
    let p = current();
    if p.is_null() {
        UserThreadId::NONE
    } else {
        unsafe { (*p).id() }
    }
}

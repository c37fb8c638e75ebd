//! Stackful user-thread contexts
//!
//! A `Context` owns a stack and the saved register set of a suspended user
//! thread. `start` drives the entry wrapper to its built-in first suspension
//! (no user code runs), `resume` continues from the last suspension point,
//! and code running on the user stack hands control back with [`suspend`].
//!
//! Ownership is exclusive and movable: a context lives in the ready pool, on
//! the I/O thread's parked list, or on a kernel thread's stack, never in two
//! places at once. The register and stack state sit behind a `Box`, so the
//! handle can move freely while frames on the user stack keep pointing at
//! stable memory.

use crate::arch::{self, SavedRegs};
use crate::poll::Interest;
use crate::stack::Stack;
use crate::tls;
use mnthread_core::error::SchedResult;
use mnthread_core::id::UserThreadId;
use mnthread_core::state::ContextState;
use std::any::Any;
use std::cell::Cell;
use std::os::fd::RawFd;
use std::panic::{self, AssertUnwindSafe};

/// A pending fd wait recorded by an I/O wrapper just before it suspends.
///
/// The dispatcher consumes this after the switch completes and hands the
/// context to the I/O thread.
#[derive(Debug, Clone, Copy)]
pub struct WaitFd {
    pub fd: RawFd,
    pub interest: Interest,
}

pub(crate) struct ContextInner {
    /// Saved state of this context while it is suspended.
    regs: SavedRegs,
    /// Saved state of whoever resumed it, restored on suspend.
    link: SavedRegs,
    state: Cell<ContextState>,
    id: UserThreadId,
    entry: Option<Box<dyn FnOnce() + Send + 'static>>,
    /// Set by `io::wait_fd` just before suspending; taken by the dispatcher.
    wait: Cell<Option<WaitFd>>,
    /// Error delivered to a parked context when the I/O thread fails.
    io_error: Cell<Option<i32>>,
    stack: Stack,
}

impl ContextInner {
    #[inline]
    pub(crate) fn id(&self) -> UserThreadId {
        self.id
    }

    #[inline]
    pub(crate) fn set_wait(&self, wait: WaitFd) {
        self.wait.set(Some(wait));
    }

    #[inline]
    pub(crate) fn take_io_error(&self) -> Option<i32> {
        self.io_error.take()
    }
}

/// An owned user-thread context. Movable, not copyable.
pub struct Context {
    inner: Box<ContextInner>,
}

// A context is exclusively owned and executes on at most one kernel thread
// at a time; the raw register state never aliases across threads.
unsafe impl Send for Context {}

impl Context {
    /// Allocate a stack of `stack_size` bytes and wrap `f` as the entry.
    ///
    /// Fails with `StackAlloc` when the mapping is refused.
    pub fn new<F>(f: F, stack_size: usize) -> SchedResult<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let stack = Stack::new(stack_size)?;
        Ok(Self {
            inner: Box::new(ContextInner {
                regs: SavedRegs::default(),
                link: SavedRegs::default(),
                state: Cell::new(ContextState::Unstarted),
                id: UserThreadId::next(),
                entry: Some(Box::new(f)),
                wait: Cell::new(None),
                io_error: Cell::new(None),
                stack,
            }),
        })
    }

    #[inline]
    pub fn id(&self) -> UserThreadId {
        self.inner.id
    }

    #[inline]
    pub fn state(&self) -> ContextState {
        self.inner.state.get()
    }

    /// Post-resume query: true once the entry has returned (or panicked).
    #[inline]
    pub fn finished(&self) -> bool {
        self.inner.state.get() == ContextState::Finished
    }

    /// Pending fd wait recorded during the last resume, if any.
    #[inline]
    pub fn take_wait(&self) -> Option<WaitFd> {
        self.inner.wait.take()
    }

    /// Deliver an error result to a parked context; its pending `wait_fd`
    /// returns `Err` when resumed.
    #[inline]
    pub(crate) fn set_io_error(&self, errno: i32) {
        self.inner.io_error.set(Some(errno));
    }

    /// Run the entry wrapper up to its priming self-suspend.
    ///
    /// No user code executes; afterwards the context is suspended at the top
    /// of its entry, and the first `resume` runs the entry closure proper.
    pub fn start(&mut self) {
        debug_assert_eq!(self.state(), ContextState::Unstarted);
        let inner: *mut ContextInner = &mut *self.inner;
        unsafe {
            arch::init_context(
                &mut (*inner).regs,
                (*inner).stack.top(),
                context_entry as usize,
                inner as usize,
            );
            (*inner).state.set(ContextState::Running);
            arch::switch(&mut (*inner).link, &(*inner).regs);
        }
        debug_assert_eq!(self.state(), ContextState::Suspended);
    }

    /// Continue the context from its last suspension point.
    ///
    /// Installs the context in the kernel thread's current-context slot for
    /// the duration of the switch. Returns when the context suspends again
    /// or finishes; check [`Context::finished`] and [`Context::take_wait`]
    /// afterwards.
    pub fn resume(&mut self) {
        debug_assert!(self.state().is_resumable());
        let inner: *mut ContextInner = &mut *self.inner;
        let prev = tls::replace_current(inner);
        unsafe {
            (*inner).state.set(ContextState::Running);
            arch::switch(&mut (*inner).link, &(*inner).regs);
        }
        tls::replace_current(prev);
    }
}

/// Give control back to whoever resumed the current context.
///
/// Returns when the context is next resumed. Panics when called off a user
/// stack; the suspension points of this runtime are the priming suspend and
/// the I/O wrappers, both of which run on user stacks by construction.
pub fn suspend() {
    let inner = tls::current();
    assert!(
        !inner.is_null(),
        "suspend() called outside a user thread"
    );
    unsafe { suspend_inner(inner) };
}

/// # Safety
///
/// `inner` must be the context executing on the current kernel thread.
unsafe fn suspend_inner(inner: *mut ContextInner) {
    (*inner).state.set(ContextState::Suspended);
    arch::switch(&mut (*inner).regs, &(*inner).link);
    // Back from the next resume; the resumer already set state to Running.
}

/// Entry wrapper running on the context's own stack.
///
/// The first suspend hands control back to `start` before any user code
/// runs, so the enqueuer never executes user work on its own time.
extern "C" fn context_entry(inner: usize) {
    let inner = inner as *mut ContextInner;
    unsafe {
        suspend_inner(inner);

        let entry = (*inner)
            .entry
            .take()
            .expect("context entry invoked twice");
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(entry)) {
            // The failure stops at the context boundary; the stack is not
            // unwound past it and the payload is discarded.
            log::warn!(
                "user thread {} panicked: {}",
                (*inner).id,
                panic_message(payload.as_ref())
            );
        }

        (*inner).state.set(ContextState::Finished);
        // Switch out for good. A buggy resume of a finished context lands
        // back here and is bounced straight out again.
        loop {
            arch::switch(&mut (*inner).regs, &(*inner).link);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const STACK: usize = 64 * 1024;

    #[test]
    fn test_start_runs_no_user_code() {
        let ran = Arc::new(AtomicUsize::new(0));
        let flag = ran.clone();
        let mut ctx = Context::new(
            move || {
                flag.store(1, Ordering::SeqCst);
            },
            STACK,
        )
        .unwrap();

        ctx.start();
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(ctx.state(), ContextState::Suspended);
        assert!(!ctx.finished());

        ctx.resume();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert!(ctx.finished());
    }

    #[test]
    fn test_suspend_resume_ping_pong() {
        let step = Arc::new(AtomicUsize::new(0));
        let inner_step = step.clone();
        let mut ctx = Context::new(
            move || {
                inner_step.store(1, Ordering::SeqCst);
                suspend();
                inner_step.store(2, Ordering::SeqCst);
                suspend();
                inner_step.store(3, Ordering::SeqCst);
            },
            STACK,
        )
        .unwrap();

        ctx.start();
        assert_eq!(step.load(Ordering::SeqCst), 0);

        ctx.resume();
        assert_eq!(step.load(Ordering::SeqCst), 1);
        assert!(!ctx.finished());

        ctx.resume();
        assert_eq!(step.load(Ordering::SeqCst), 2);
        assert!(!ctx.finished());

        ctx.resume();
        assert_eq!(step.load(Ordering::SeqCst), 3);
        assert!(ctx.finished());
    }

    #[test]
    fn test_current_id_visible_inside_context() {
        let seen = Arc::new(AtomicUsize::new(0));
        let inner_seen = seen.clone();
        let mut ctx = Context::new(
            move || {
                inner_seen.store(crate::tls::current_id().as_u64() as usize, Ordering::SeqCst);
            },
            STACK,
        )
        .unwrap();
        let id = ctx.id();

        ctx.start();
        assert!(crate::tls::current_id().is_none());
        ctx.resume();
        assert_eq!(seen.load(Ordering::SeqCst), id.as_u64() as usize);
        assert!(crate::tls::current_id().is_none());
    }

    #[test]
    fn test_panicking_entry_is_contained() {
        let mut ctx = Context::new(
            || {
                panic!("boom");
            },
            STACK,
        )
        .unwrap();
        ctx.start();
        ctx.resume();
        assert!(ctx.finished());
    }

    #[test]
    fn test_nested_contexts() {
        // Priming a second context from inside a running one must leave the
        // outer context intact.
        let order = Arc::new(AtomicUsize::new(0));
        let outer_order = order.clone();
        let mut outer = Context::new(
            move || {
                let inner_order = outer_order.clone();
                let mut inner = Context::new(
                    move || {
                        inner_order.fetch_add(10, Ordering::SeqCst);
                    },
                    STACK,
                )
                .unwrap();
                inner.start();
                outer_order.fetch_add(1, Ordering::SeqCst);
                inner.resume();
                assert!(inner.finished());
            },
            STACK,
        )
        .unwrap();

        outer.start();
        outer.resume();
        assert!(outer.finished());
        assert_eq!(order.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn test_wait_request_round_trip() {
        let mut ctx = Context::new(
            || {
                let p = crate::tls::current();
                unsafe {
                    (*p).set_wait(WaitFd {
                        fd: 7,
                        interest: Interest::READ,
                    });
                }
                suspend();
            },
            STACK,
        )
        .unwrap();

        ctx.start();
        assert!(ctx.take_wait().is_none());
        ctx.resume();
        let wait = ctx.take_wait().expect("wait recorded");
        assert_eq!(wait.fd, 7);
        assert_eq!(wait.interest, Interest::READ);
        assert!(!ctx.finished());
        // Let it run to completion so the stack unwinds cleanly.
        ctx.resume();
        assert!(ctx.finished());
    }
}

//! The asynchronous I/O thread
//!
//! A dedicated OS thread owns every context parked on fd readiness. User
//! threads hand their context over through a lock-free inbox plus a
//! self-pipe write; the thread polls the aggregate descriptor set and feeds
//! ready contexts back to the scheduler pool under the scheduler's lock.
//!
//! Slot 0 of the descriptor set is permanently the wakeup pipe's read end;
//! it is never compacted out. The parked contexts live in a slab so their
//! handles stay stable while unrelated entries are removed.

use crate::context::Context;
use crate::pipe::WakePipe;
use crate::poll::{self, Interest};
use crate::scheduler::SchedShared;
use crate::strategy::Strategy;

use crossbeam_queue::SegQueue;
use slab::Slab;

use std::io;
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// A context in flight from a dispatcher to the I/O thread.
pub(crate) struct Registration {
    pub ctx: Context,
    pub fd: RawFd,
    pub interest: Interest,
}

/// State shared between the I/O thread and the dispatchers.
pub(crate) struct IoShared {
    /// MPSC inbox: dispatchers push, the I/O thread pops.
    inbox: SegQueue<Registration>,
    /// Self-pipe breaking the poller out of its wait.
    pipe: WakePipe,
    /// Set once by the owner; the thread exits on its next wakeup.
    shutdown: AtomicBool,
    /// errno of a fatal poll failure, 0 while healthy.
    failed: AtomicI32,
}

impl IoShared {
    /// Transfer `ctx` to the I/O thread, to be re-injected into the
    /// scheduler pool once `fd` satisfies `interest`.
    pub fn park(&self, ctx: Context, fd: RawFd, interest: Interest) {
        self.inbox.push(Registration { ctx, fd, interest });
        self.pipe.notify();
    }

    /// errno of a fatal poll failure, if the I/O thread has given up.
    pub fn failure(&self) -> Option<i32> {
        match self.failed.load(Ordering::Acquire) {
            0 => None,
            errno => Some(errno),
        }
    }
}

/// Handle to the I/O thread. Shuts the thread down and joins it on drop.
pub(crate) struct IoThread {
    shared: Arc<IoShared>,
    th: Option<thread::JoinHandle<()>>,
}

impl IoThread {
    /// Start the I/O thread against the given scheduler state.
    pub fn spawn<S: Strategy>(sched: Arc<SchedShared<S>>, poll_error_limit: u32) -> Self {
        let shared = Arc::new(IoShared {
            inbox: SegQueue::new(),
            pipe: WakePipe::new().expect("failed to create wakeup pipe"),
            shutdown: AtomicBool::new(false),
            failed: AtomicI32::new(0),
        });

        let loop_shared = shared.clone();
        let th = thread::Builder::new()
            .name("mnthread-io".into())
            .spawn(move || io_loop(loop_shared, sched, poll_error_limit))
            .expect("failed to spawn io thread");

        Self {
            shared,
            th: Some(th),
        }
    }

    pub fn shared(&self) -> Arc<IoShared> {
        self.shared.clone()
    }

    pub fn failure(&self) -> Option<i32> {
        self.shared.failure()
    }
}

impl Drop for IoThread {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.pipe.notify();
        if let Some(th) = self.th.take() {
            let _ = th.join();
        }
    }
}

/// The poll loop, on its own OS thread.
fn io_loop<S: Strategy>(io: Arc<IoShared>, sched: Arc<SchedShared<S>>, error_limit: u32) {
    let mut parked: Slab<Context> = Slab::new();
    // pfds and keys are index-aligned; entry 0 is pinned to the wakeup pipe
    // and keys[0] is a sentinel.
    let mut pfds: Vec<libc::pollfd> = vec![poll::pollfd(io.pipe.read_fd(), Interest::READ)];
    let mut keys: Vec<usize> = vec![usize::MAX];

    let mut errors: u32 = 0;

    loop {
        if io.shutdown.load(Ordering::Acquire) {
            break;
        }

        match poll::poll_fds(&mut pfds, None) {
            Ok(_) => errors = 0,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                errors += 1;
                log::warn!("poll failed ({} of {}): {}", errors, error_limit, e);
                if io.failure().is_some() {
                    // Already gave up; only the pipe is left. Back off so a
                    // persistent failure does not spin the thread.
                    thread::sleep(Duration::from_millis(10));
                } else if errors >= error_limit {
                    let errno = e.raw_os_error().unwrap_or(libc::EIO);
                    give_up(&io, &sched, errno, &mut parked, &mut pfds, &mut keys);
                }
                continue;
            }
        }

        // Wakeup pipe fired: new registrations, or shutdown (checked above
        // on the next pass).
        if pfds[0].revents != 0 {
            pfds[0].revents = 0;
            io.pipe.drain();
            while let Some(reg) = io.inbox.pop() {
                if let Some(errno) = io.failure() {
                    // The poller is dead; bounce the context straight back
                    // with an error result.
                    reg.ctx.set_io_error(errno);
                    sched.reinject(reg.ctx);
                    continue;
                }
                let key = parked.insert(reg.ctx);
                pfds.push(poll::pollfd(reg.fd, reg.interest));
                keys.push(key);
            }
        }

        // Ready descriptors go back to the scheduler. Walking from the tail
        // keeps swap_remove away from slot 0 and from unvisited entries.
        let mut i = pfds.len();
        while i > 1 {
            i -= 1;
            if pfds[i].revents == 0 {
                continue;
            }
            let ctx = parked.remove(keys[i]);
            pfds.swap_remove(i);
            keys.swap_remove(i);
            log::trace!("user thread {} ready", ctx.id());
            sched.reinject(ctx);
        }
    }

    if !parked.is_empty() {
        log::debug!("io thread exiting with {} parked contexts", parked.len());
    }
}

/// Escalate a persistent poll failure: record the errno, wake every parked
/// context with an error result, and keep watching only the pipe so
/// shutdown still works.
fn give_up<S: Strategy>(
    io: &IoShared,
    sched: &SchedShared<S>,
    errno: i32,
    parked: &mut Slab<Context>,
    pfds: &mut Vec<libc::pollfd>,
    keys: &mut Vec<usize>,
) {
    log::error!("io thread giving up after repeated poll failures (errno {errno})");
    io.failed.store(errno, Ordering::Release);

    for i in (1..pfds.len()).rev() {
        let ctx = parked.remove(keys[i]);
        ctx.set_io_error(errno);
        sched.reinject(ctx);
    }
    pfds.truncate(1);
    keys.truncate(1);
}

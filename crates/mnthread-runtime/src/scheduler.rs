//! The kernel-thread dispatcher
//!
//! A fixed pool of OS threads ("kernels") pulls runnable user contexts from
//! a shared pool, resumes them, and routes them onward when they suspend:
//! back to the pool, over to the I/O thread, or out of existence when they
//! finish.
//!
//! The shared mutex guards the pool and the `live`/`terminate`/`join`
//! flags; it is never held across a resume.

use crate::config::SchedulerConfig;
use crate::context::Context;
use crate::io_thread::{IoShared, IoThread};
use crate::strategy::{Fifo, Pool, Strategy};

use mnthread_core::error::{SchedError, SchedResult};
use mnthread_core::id::UserThreadId;

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

/// Mutable scheduler state, guarded by the shared mutex.
pub(crate) struct SchedState {
    /// Ready-to-run contexts.
    pub pool: Pool,
    /// Contexts spawned and not yet finished: queued, running, or parked.
    /// `joinable` and `join_all` drain on this, not on pool emptiness, so a
    /// thread parked on I/O still counts as outstanding work.
    pub live: usize,
    /// One-shot destruction signal for the dispatchers.
    pub terminate: bool,
    /// True while a `join_all` caller is draining.
    pub join: bool,
}

/// State shared by the dispatchers, the I/O thread, and the public handle.
pub(crate) struct SchedShared<S: Strategy> {
    pub mtx: Mutex<SchedState>,
    pub cond: Condvar,
    pub strategy: S,
}

impl<S: Strategy> SchedShared<S> {
    pub(crate) fn new(strategy: S) -> Self {
        Self {
            mtx: Mutex::new(SchedState {
                pool: Pool::new(),
                live: 0,
                terminate: false,
                join: false,
            }),
            cond: Condvar::new(),
            strategy,
        }
    }

    /// Put a context back into the pool and signal with the dispatcher's
    /// notify discipline: one waiter normally, everyone while joining.
    pub(crate) fn reinject(&self, ctx: Context) {
        let mut st = self.mtx.lock().unwrap();
        self.strategy.push(&mut st.pool, ctx);
        if st.join {
            self.cond.notify_all();
        } else {
            self.cond.notify_one();
        }
    }
}

/// Options for [`Scheduler::add_thread_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SpawnOptions {
    /// Stack size in bytes; `None` uses the configured default.
    pub stack_size: Option<usize>,
}

/// The M:N scheduler.
///
/// Owns the kernel-thread pool, the ready pool, and the I/O thread. All user
/// threads must be drained with [`Scheduler::join_all`] before the scheduler
/// is dropped; dropping a joinable scheduler aborts the process.
pub struct Scheduler<S: Strategy = Fifo> {
    kernels: HashMap<thread::ThreadId, thread::JoinHandle<()>>,
    shared: Arc<SchedShared<S>>,
    io: IoThread,
    config: SchedulerConfig,
}

impl Scheduler<Fifo> {
    /// Create a scheduler dispatching over `kernels` OS threads, with FIFO
    /// ordering and configuration from the environment.
    ///
    /// Panics when `kernels` is zero.
    pub fn new(kernels: usize) -> Self {
        Self::with_config(SchedulerConfig::from_env().kernels(kernels))
            .expect("invalid scheduler configuration")
    }

    /// Create a FIFO scheduler from an explicit configuration.
    pub fn with_config(config: SchedulerConfig) -> SchedResult<Self> {
        Self::with_config_and_strategy(config, Fifo)
    }
}

impl<S: Strategy> Scheduler<S> {
    /// Create a scheduler with an explicit queue discipline.
    pub fn with_config_and_strategy(config: SchedulerConfig, strategy: S) -> SchedResult<Self> {
        config.validate()?;

        let shared = Arc::new(SchedShared::new(strategy));
        let io = IoThread::spawn(shared.clone(), config.poll_error_limit);

        let mut kernels = HashMap::with_capacity(config.kernels);
        for i in 0..config.kernels {
            let shared = shared.clone();
            let io_shared = io.shared();
            let handle = thread::Builder::new()
                .name(format!("mnthread-kernel-{}", i))
                .spawn(move || dispatch_loop(shared, io_shared))
                .expect("failed to spawn kernel thread");
            kernels.insert(handle.thread().id(), handle);
        }

        Ok(Self {
            kernels,
            shared,
            io,
            config,
        })
    }

    /// Enqueue a user thread with the default stack size.
    pub fn add_thread<F>(&self, f: F) -> SchedResult<UserThreadId>
    where
        F: FnOnce() + Send + 'static,
    {
        self.add_thread_with(SpawnOptions::default(), f)
    }

    /// Enqueue a user thread with explicit options.
    ///
    /// The context is primed on the calling thread (its entry runs to the
    /// built-in first suspension, so no user code executes here), then
    /// pushed into the pool and one idle kernel is woken.
    pub fn add_thread_with<F>(&self, opts: SpawnOptions, f: F) -> SchedResult<UserThreadId>
    where
        F: FnOnce() + Send + 'static,
    {
        if let Some(errno) = self.io.failure() {
            return Err(SchedError::Poll(errno));
        }

        let stack_size = opts.stack_size.unwrap_or(self.config.stack_size);
        let mut ctx = Context::new(f, stack_size)?;
        let id = ctx.id();
        ctx.start();
        log::trace!("user thread {} primed", id);

        let mut st = self.shared.mtx.lock().unwrap();
        st.live += 1;
        self.shared.strategy.push(&mut st.pool, ctx);
        self.shared.cond.notify_one();
        Ok(id)
    }

    /// Block until every user thread has finished.
    ///
    /// The caller shares the condition variable with the dispatchers, so
    /// each wakeup passes the token on with a notify to keep them draining.
    pub fn join_all(&self) {
        let mut st = self.shared.mtx.lock().unwrap();
        st.join = true;
        while st.live != 0 {
            st = self.shared.cond.wait(st).unwrap();
            self.shared.cond.notify_one();
        }
        st.join = false;
    }

    /// True while any user thread is queued, running, or parked on I/O.
    pub fn joinable(&self) -> bool {
        self.shared.mtx.lock().unwrap().live != 0
    }
}

impl<S: Strategy> Drop for Scheduler<S> {
    fn drop(&mut self) {
        // Same contract as dropping a running std::thread scope: destroying
        // a scheduler with live user threads is a fatal usage error.
        if self.joinable() {
            log::error!("scheduler dropped while user threads are live; call join_all() first");
            std::process::abort();
        }

        {
            let mut st = self.shared.mtx.lock().unwrap();
            st.terminate = true;
            self.shared.cond.notify_all();
        }
        for (_, handle) in self.kernels.drain() {
            let _ = handle.join();
        }
        // IoThread::drop shuts the poller down after the kernels are gone.
    }
}

/// The dispatch loop, one per kernel thread.
fn dispatch_loop<S: Strategy>(shared: Arc<SchedShared<S>>, io: Arc<IoShared>) {
    loop {
        let mut st = shared.mtx.lock().unwrap();
        while !st.terminate && st.pool.is_empty() {
            st = shared.cond.wait(st).unwrap();
        }
        if st.terminate {
            return;
        }
        let Some(mut ctx) = shared.strategy.pop(&mut st.pool) else {
            continue;
        };
        // Resume outside the lock; other kernels keep dispatching.
        drop(st);

        ctx.resume();

        if ctx.finished() {
            log::trace!("user thread {} finished", ctx.id());
            let mut st = shared.mtx.lock().unwrap();
            st.live -= 1;
            if st.live == 0 || st.join {
                shared.cond.notify_all();
            }
            // ctx dropped here, off the lock path of future iterations.
        } else if let Some(wait) = ctx.take_wait() {
            // The context recorded an fd wait before suspending; complete
            // the transfer now that its switch is done. Registration lands
            // before the context can ever run again, and the level-triggered
            // poll means an already-ready descriptor is picked up on the
            // next poll round.
            log::trace!("user thread {} parked on fd {}", ctx.id(), wait.fd);
            io.park(ctx, wait.fd, wait.interest);
        } else {
            // Suspended without an fd wait: an explicit yield. Requeue.
            shared.reinject(ctx);
        }
    }
}

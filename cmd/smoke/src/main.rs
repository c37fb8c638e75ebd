//! End-to-end smoke test: CPU-bound bursts, pipe I/O, nested spawns.
//!
//! Run with `RUST_LOG=trace` to watch the dispatch and park/wake traffic.

use anyhow::{ensure, Context as _, Result};
use mnthread::{io, Scheduler};

use std::os::fd::RawFd;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn raw_pipe() -> Result<(RawFd, RawFd)> {
    let mut fds = [0i32; 2];
    let ret = unsafe { libc::pipe(fds.as_mut_ptr()) };
    ensure!(ret == 0, "pipe creation failed");
    Ok((fds[0], fds[1]))
}

fn main() -> Result<()> {
    env_logger::init();

    let sched = Arc::new(Scheduler::new(4));

    // 1) A burst of CPU-only user threads.
    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..500 {
        let counter = counter.clone();
        sched.add_thread(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            mnthread::yield_now();
            counter.fetch_add(1, Ordering::SeqCst);
        })?;
    }

    // 2) A reader/writer pair over a pipe; only the user threads block.
    let (r, w) = raw_pipe()?;
    io::set_nonblocking(r).context("set_nonblocking")?;

    let echoed = Arc::new(AtomicUsize::new(0));
    let echoed_clone = echoed.clone();
    sched.add_thread(move || {
        let mut buf = [0u8; 16];
        let n = io::read(r, &mut buf).expect("pipe read");
        log::info!("reader {} got {} bytes", mnthread::current_id(), n);
        echoed_clone.store(n, Ordering::SeqCst);
    })?;
    sched.add_thread(move || {
        io::write(w, b"ping").expect("pipe write");
    })?;

    // 3) A nested spawn from inside a running user thread.
    let nested = Arc::new(AtomicUsize::new(0));
    let nested_clone = nested.clone();
    let sched_clone = sched.clone();
    sched.add_thread(move || {
        let nested = nested_clone.clone();
        sched_clone
            .add_thread(move || {
                nested.fetch_add(1, Ordering::SeqCst);
            })
            .expect("nested add_thread");
    })?;

    sched.join_all();

    ensure!(counter.load(Ordering::SeqCst) == 1000, "counter mismatch");
    ensure!(echoed.load(Ordering::SeqCst) == 4, "pipe payload mismatch");
    ensure!(nested.load(Ordering::SeqCst) == 1, "nested thread did not run");

    unsafe {
        libc::close(r);
        libc::close(w);
    }

    println!("smoke: ok");
    Ok(())
}

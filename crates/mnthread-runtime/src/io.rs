//! Blocking-style fd operations for user threads
//!
//! Each call records the calling context's descriptor wait and suspends; the
//! dispatcher hands the context to the I/O thread, and the scheduler resumes
//! it once the descriptor is ready. Call sites read like ordinary blocking
//! I/O while only the user thread blocks, never the kernel thread.
//!
//! Off a user stack the same calls degrade to a plain blocking `poll` of the
//! single descriptor on the calling OS thread.

use crate::context::{self, WaitFd};
use crate::poll::{self, Interest};
use crate::tls;

use std::io;
use std::os::fd::RawFd;

/// Park the current user thread until `fd` satisfies `interest`.
///
/// Returns `Err` when the I/O thread has failed; the error carries the
/// poller's errno.
pub fn wait_fd(fd: RawFd, interest: Interest) -> io::Result<()> {
    let cur = tls::current();
    if cur.is_null() {
        // Not on a user stack: block this OS thread on the one descriptor.
        let mut fds = [poll::pollfd(fd, interest)];
        loop {
            match poll::poll_fds(&mut fds, None) {
                Ok(_) => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    unsafe {
        (*cur).set_wait(WaitFd { fd, interest });
    }
    context::suspend();

    // Resumed: either the descriptor fired or the I/O thread reported
    // failure. The context may now be on a different kernel thread.
    let cur = tls::current();
    debug_assert!(!cur.is_null());
    if let Some(errno) = unsafe { (*cur).take_io_error() } {
        return Err(io::Error::from_raw_os_error(errno));
    }
    Ok(())
}

/// Park until `fd` is readable.
#[inline]
pub fn wait_readable(fd: RawFd) -> io::Result<()> {
    wait_fd(fd, Interest::READ)
}

/// Park until `fd` is writable.
#[inline]
pub fn wait_writable(fd: RawFd) -> io::Result<()> {
    wait_fd(fd, Interest::WRITE)
}

/// Put `fd` into non-blocking mode.
///
/// The read/write wrappers below rely on `EAGAIN` to know when to park, so
/// descriptors handed to them should go through this first.
pub fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        if libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Read from `fd`, yielding to the scheduler instead of blocking.
pub fn read(fd: RawFd, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if n >= 0 {
            return Ok(n as usize);
        }
        let err = io::Error::last_os_error();
        match err.kind() {
            io::ErrorKind::WouldBlock => wait_readable(fd)?,
            io::ErrorKind::Interrupted => {}
            _ => return Err(err),
        }
    }
}

/// Write to `fd`, yielding to the scheduler instead of blocking.
pub fn write(fd: RawFd, buf: &[u8]) -> io::Result<usize> {
    loop {
        let n = unsafe { libc::write(fd, buf.as_ptr() as *const libc::c_void, buf.len()) };
        if n >= 0 {
            return Ok(n as usize);
        }
        let err = io::Error::last_os_error();
        match err.kind() {
            io::ErrorKind::WouldBlock => wait_writable(fd)?,
            io::ErrorKind::Interrupted => {}
            _ => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_pipe() -> (RawFd, RawFd) {
        let mut fds = [0i32; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        (fds[0], fds[1])
    }

    #[test]
    fn test_read_write_off_user_stack() {
        let (r, w) = raw_pipe();
        set_nonblocking(r).unwrap();

        assert_eq!(write(w, b"hello").unwrap(), 5);
        let mut buf = [0u8; 8];
        assert_eq!(read(r, &mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"hello");

        unsafe {
            libc::close(r);
            libc::close(w);
        }
    }

    #[test]
    fn test_wait_fd_off_user_stack_polls() {
        let (r, w) = raw_pipe();
        unsafe { libc::write(w, b"x".as_ptr() as *const libc::c_void, 1) };
        wait_fd(r, Interest::READ).unwrap();
        unsafe {
            libc::close(r);
            libc::close(w);
        }
    }

    #[test]
    fn test_set_nonblocking_rejects_bad_fd() {
        assert!(set_nonblocking(-1).is_err());
    }
}

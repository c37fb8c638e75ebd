//! Readiness primitive: a thin wrapper over `poll(2)`
//!
//! All unix targets we support have a native `poll`, so no selector
//! emulation is carried.

use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

bitflags::bitflags! {
    /// Readiness interests understood by the poller.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Interest: i16 {
        /// Descriptor readable
        const READ = libc::POLLIN;
        /// Descriptor writable
        const WRITE = libc::POLLOUT;
        /// Both directions
        const RW = libc::POLLIN | libc::POLLOUT;
    }
}

/// Build a `pollfd` entry for `fd` with the given interest.
#[inline]
pub fn pollfd(fd: RawFd, interest: Interest) -> libc::pollfd {
    libc::pollfd {
        fd,
        events: interest.bits(),
        revents: 0,
    }
}

/// Wait for readiness on `fds`.
///
/// `None` blocks indefinitely; `Some(d)` is truncated to the millisecond
/// resolution of `poll(2)`. Returns the number of entries with non-zero
/// `revents`; on failure `revents` is unspecified.
pub fn poll_fds(fds: &mut [libc::pollfd], timeout: Option<Duration>) -> io::Result<usize> {
    let to = match timeout {
        Some(d) => d.as_millis().min(i32::MAX as u128) as i32,
        None => -1,
    };
    let ret = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, to) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(ret as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipe() -> (RawFd, RawFd) {
        let mut fds = [0i32; 2];
        let ret = unsafe { libc::pipe(fds.as_mut_ptr()) };
        assert_eq!(ret, 0);
        (fds[0], fds[1])
    }

    fn close(fd: RawFd) {
        unsafe { libc::close(fd) };
    }

    #[test]
    fn test_empty_pipe_times_out() {
        let (r, w) = pipe();
        let mut fds = [pollfd(r, Interest::READ)];
        let n = poll_fds(&mut fds, Some(Duration::from_millis(0))).unwrap();
        assert_eq!(n, 0);
        assert_eq!(fds[0].revents, 0);
        close(r);
        close(w);
    }

    #[test]
    fn test_written_pipe_is_readable() {
        let (r, w) = pipe();
        unsafe { libc::write(w, b"x".as_ptr() as *const libc::c_void, 1) };
        let mut fds = [pollfd(r, Interest::READ)];
        let n = poll_fds(&mut fds, None).unwrap();
        assert_eq!(n, 1);
        assert_ne!(fds[0].revents & libc::POLLIN, 0);
        close(r);
        close(w);
    }

    #[test]
    fn test_rw_is_the_union() {
        assert_eq!(Interest::RW, Interest::READ | Interest::WRITE);
    }
}

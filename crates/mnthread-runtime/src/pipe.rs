//! Self-pipe used to break the poller out of its wait
//!
//! Writing any byte to the write end makes the read end poll readable; the
//! poll loop drains it and re-examines its watch set.

use std::io;
use std::os::fd::RawFd;

/// A non-blocking self-pipe.
pub struct WakePipe {
    read_fd: RawFd,
    write_fd: RawFd,
}

// Both descriptors are used concurrently from multiple threads; the
// underlying syscalls are atomic for single-byte transfers.
unsafe impl Send for WakePipe {}
unsafe impl Sync for WakePipe {}

impl WakePipe {
    pub fn new() -> io::Result<Self> {
        let mut fds = [0i32; 2];

        cfg_if::cfg_if! {
            if #[cfg(target_os = "linux")] {
                let ret = unsafe {
                    libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC | libc::O_NONBLOCK)
                };
                if ret != 0 {
                    return Err(io::Error::last_os_error());
                }
            } else {
                let ret = unsafe { libc::pipe(fds.as_mut_ptr()) };
                if ret != 0 {
                    return Err(io::Error::last_os_error());
                }
                for fd in fds {
                    unsafe {
                        libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC);
                        let flags = libc::fcntl(fd, libc::F_GETFL);
                        libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
                    }
                }
            }
        }

        Ok(Self {
            read_fd: fds[0],
            write_fd: fds[1],
        })
    }

    /// The end the poll loop watches.
    #[inline]
    pub fn read_fd(&self) -> RawFd {
        self.read_fd
    }

    /// Make the next (or current) poll wait return. A full pipe already
    /// guarantees a pending wakeup, so a short write is fine to ignore.
    pub fn notify(&self) {
        let byte = 0u8;
        unsafe {
            libc::write(self.write_fd, &byte as *const u8 as *const libc::c_void, 1);
        }
    }

    /// Read and discard everything currently buffered.
    pub fn drain(&self) {
        let mut buf = [0u8; 64];
        loop {
            let n = unsafe {
                libc::read(self.read_fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len())
            };
            if n <= 0 || (n as usize) < buf.len() {
                break;
            }
        }
    }
}

impl Drop for WakePipe {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.read_fd);
            libc::close(self.write_fd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::{self, Interest};
    use std::time::Duration;

    #[test]
    fn test_notify_makes_read_end_ready() {
        let pipe = WakePipe::new().unwrap();
        pipe.notify();
        let mut fds = [poll::pollfd(pipe.read_fd(), Interest::READ)];
        let n = poll::poll_fds(&mut fds, Some(Duration::from_millis(100))).unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn test_drain_clears_pending_bytes() {
        let pipe = WakePipe::new().unwrap();
        for _ in 0..100 {
            pipe.notify();
        }
        pipe.drain();
        let mut fds = [poll::pollfd(pipe.read_fd(), Interest::READ)];
        let n = poll::poll_fds(&mut fds, Some(Duration::from_millis(0))).unwrap();
        assert_eq!(n, 0);
    }
}

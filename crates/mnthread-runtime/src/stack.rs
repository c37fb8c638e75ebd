//! mmap-backed context stacks
//!
//! Each user thread gets a private anonymous mapping with a `PROT_NONE`
//! guard page at the low end, so overflow faults instead of corrupting a
//! neighbouring allocation.

use mnthread_core::error::{SchedError, SchedResult};
use std::ptr;
use std::sync::OnceLock;

/// System page size, queried once.
pub fn page_size() -> usize {
    static PAGE: OnceLock<usize> = OnceLock::new();
    *PAGE.get_or_init(|| unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize })
}

fn errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

/// An owned stack mapping. Unmapped on drop.
pub struct Stack {
    base: *mut u8,
    len: usize,
}

// The mapping is exclusively owned and carries no thread affinity.
unsafe impl Send for Stack {}

impl Stack {
    /// Map `size` usable bytes (rounded up to whole pages) plus one guard
    /// page below them.
    pub fn new(size: usize) -> SchedResult<Self> {
        let page = page_size();
        let usable = size.max(page).next_multiple_of(page);
        let len = usable + page;

        let base = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(SchedError::StackAlloc(errno()));
        }

        // Guard page at the low end; the stack grows down toward it.
        let ret = unsafe { libc::mprotect(base, page, libc::PROT_NONE) };
        if ret != 0 {
            let err = errno();
            unsafe { libc::munmap(base, len) };
            return Err(SchedError::StackAlloc(err));
        }

        Ok(Self {
            base: base as *mut u8,
            len,
        })
    }

    /// One past the highest usable byte; stacks grow down from here.
    #[inline]
    pub fn top(&self) -> *mut u8 {
        unsafe { self.base.add(self.len) }
    }

    /// Usable bytes, excluding the guard page.
    #[inline]
    pub fn usable(&self) -> usize {
        self.len - page_size()
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.base as *mut libc::c_void, self.len);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_rounds_up_to_pages() {
        let stack = Stack::new(1000).unwrap();
        assert_eq!(stack.usable(), page_size());
        assert_eq!(stack.usable() % page_size(), 0);
    }

    #[test]
    fn test_stack_top_is_above_base() {
        let stack = Stack::new(64 * 1024).unwrap();
        assert!(stack.top() as usize > stack.base as usize);
        assert!(stack.usable() >= 64 * 1024);
    }

    #[test]
    fn test_stack_is_writable() {
        let stack = Stack::new(16 * 1024).unwrap();
        unsafe {
            let p = stack.top().sub(8);
            p.write(0xAB);
            assert_eq!(p.read(), 0xAB);
        }
    }
}

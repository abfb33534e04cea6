//! mmap-backed stack blocks
//!
//! Each coroutine block is its own anonymous private mapping. Pages
//! come back zeroed from the kernel, which the allocation contract
//! relies on, and are page-aligned, which satisfies the 16-byte stack
//! alignment requirement.

use core::ptr::NonNull;

use coro_core::error::{CoroResult, MemoryError};
use coro_core::kwarn;
use coro_core::traits::StackMemory;

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        /// Stack provider using anonymous `mmap`/`munmap`.
        pub struct MmapMemory;

        impl StackMemory for MmapMemory {
            fn alloc(&self, size: usize) -> CoroResult<NonNull<u8>> {
                let ptr = unsafe {
                    libc::mmap(
                        core::ptr::null_mut(),
                        size,
                        libc::PROT_READ | libc::PROT_WRITE,
                        libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                        -1,
                        0,
                    )
                };
                if ptr == libc::MAP_FAILED {
                    return Err(MemoryError::AllocationFailed.into());
                }
                Ok(unsafe { NonNull::new_unchecked(ptr as *mut u8) })
            }

            unsafe fn release(&self, base: NonNull<u8>, size: usize) {
                let ret = libc::munmap(base.as_ptr() as *mut libc::c_void, size);
                if ret != 0 {
                    kwarn!("munmap({:p}, {}) failed: errno {}", base.as_ptr(), size, errno());
                }
            }
        }

        fn errno() -> i32 {
            std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
        }
    } else {
        compile_error!("Unsupported platform: only unix stack memory is implemented");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_zeroed_and_writable() {
        let size = 64 * 1024;
        let base = MmapMemory.alloc(size).unwrap();
        unsafe {
            let p = base.as_ptr();
            assert_eq!(p.read(), 0);
            assert_eq!(p.add(size - 1).read(), 0);
            p.write(0xA5);
            p.add(size - 1).write(0x5A);
            assert_eq!(p.read(), 0xA5);
            MmapMemory.release(base, size);
        }
    }

    #[test]
    fn test_alloc_alignment() {
        let base = MmapMemory.alloc(4096).unwrap();
        assert_eq!(base.as_ptr() as usize % 16, 0);
        unsafe { MmapMemory.release(base, 4096) };
    }
}

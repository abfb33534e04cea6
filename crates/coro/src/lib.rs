//! # coro
//!
//! Stackful coroutines scheduled explicitly and cooperatively: no
//! hidden runtime, no thread pool, no I/O integration. A `Group` owns
//! up to a fixed number of coroutines, each on its own stack block;
//! the caller decides when anything runs via `start` (one step into a
//! chosen coroutine) or `start_cycle` (round-robin until everything
//! yields back).
//!
//! ```no_run
//! let group = coro::group_init(4).unwrap();
//! group.create(coro::default_stack_size(), |c| {
//!     println!("hello from slot {}", c.index());
//!     c.yield_now();
//!     println!("slot {} again", c.index());
//! }).unwrap();
//! group.start_cycle();
//! ```
//!
//! This crate wires the portable state machine in `coro-core` to the
//! native context switch and mmap stack provider in `coro-runtime`.

use coro_core::env::env_get;
use coro_core::error::CoroResult;
use coro_runtime::{MmapMemory, NativeSwitch};

pub mod solo;

pub use coro_core::constants::{CONTROL_BLOCK_SIZE, DEFAULT_STACK_SIZE, GUARD_SIZE, STACK_ALIGN};
pub use coro_core::error::{CoroError, MemoryError};
pub use coro_core::group::{Coro, Group, OwnedGroup, UserdataMode};
pub use coro_core::state::{CoroState, RunMode};
pub use solo::Solo;

static SWITCH: NativeSwitch = NativeSwitch;
static MEMORY: MmapMemory = MmapMemory;

/// Per-coroutine stack size to use when the caller has no opinion:
/// `CORO_STACK_SIZE` when set, 64 KiB otherwise.
pub fn default_stack_size() -> usize {
    env_get("CORO_STACK_SIZE", DEFAULT_STACK_SIZE)
}

/// Bytes required to host a group of the given capacity, for callers
/// placing the group in their own storage via [`group_init_inplace`].
pub fn group_alloc_size(capacity: u32) -> usize {
    Group::alloc_size(capacity)
}

/// Initialize a group in caller-provided storage, wired to the native
/// context switch and mmap stacks.
///
/// # Safety
///
/// `buf` must point to at least [`group_alloc_size`] bytes, aligned
/// to 16, valid and unaliased for the life of the group.
pub unsafe fn group_init_inplace(buf: *mut u8, capacity: u32) -> CoroResult<*mut Group> {
    Group::init_inplace(buf, capacity, &SWITCH, &MEMORY)
}

/// Allocate and initialize a group of the given capacity on the heap.
pub fn group_init(capacity: u32) -> CoroResult<OwnedGroup> {
    OwnedGroup::new(capacity, &SWITCH, &MEMORY)
}

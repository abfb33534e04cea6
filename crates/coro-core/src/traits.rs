//! Platform and architecture seams
//!
//! The scheduler state machine in `group` is platform-independent;
//! everything that touches registers or page tables sits behind these
//! two traits and is implemented in `coro-runtime` (one context
//! switch per architecture/ABI). Tests inject mock implementations.

use core::ptr::NonNull;

use crate::control::ControlBlock;
use crate::error::CoroResult;

/// Architecture-specific context-switch primitive.
///
/// Implementations save the calling convention's callee-saved
/// registers plus the stack pointer into the current control block
/// and resume the target where it last suspended. The checked
/// contract around these raw operations (finished-target
/// short-circuit, guard verification, stack-pointer consistency)
/// lives in `group`, not here.
pub trait ContextSwitch: Sync {
    /// Deepest stack usage reachable between the first resume of a
    /// fresh coroutine and the first possible yield; part of the
    /// stack-size precondition checked at allocation.
    fn min_stack_depth(&self) -> usize;

    /// Write a coroutine's initial resume record so its first resume
    /// enters the architecture's entry trampoline, which calls
    /// `entry_fn(entry_arg)` and then the finish path.
    ///
    /// # Safety
    ///
    /// `cb` must be a valid control block and `stack_top` the address
    /// immediately below it, with enough working space beneath.
    unsafe fn init_context(
        &self,
        cb: *mut ControlBlock,
        stack_top: *mut u8,
        entry_fn: usize,
        entry_arg: usize,
    );

    /// Raw save-and-load switch. Persists the current context
    /// (including `saved_sp_offset`), loads the target's, and resumes
    /// it. Returns when something later resumes `current`.
    ///
    /// # Safety
    ///
    /// Both control blocks must be valid; `target` must hold a
    /// resumable context.
    unsafe fn switch(&self, current: *mut ControlBlock, target: *mut ControlBlock);

    /// Restore-only switch: load the target's context without saving
    /// the current one. Used by the finish transition, which must not
    /// leave a resumable record behind.
    ///
    /// # Safety
    ///
    /// `target` must hold a resumable context. Never returns.
    unsafe fn load(&self, target: *mut ControlBlock) -> !;
}

/// Provider of per-coroutine stack blocks.
pub trait StackMemory: Sync {
    /// Allocate one zeroed block of `size` bytes, aligned to at least
    /// the stack alignment (16 bytes).
    fn alloc(&self, size: usize) -> CoroResult<NonNull<u8>>;

    /// Release a block previously returned by [`StackMemory::alloc`]
    /// with the same `size`.
    ///
    /// # Safety
    ///
    /// `base` must come from `alloc(size)` on this provider and must
    /// not be used afterwards.
    unsafe fn release(&self, base: NonNull<u8>, size: usize);
}

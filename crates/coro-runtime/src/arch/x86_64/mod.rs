//! x86_64 context switching (System V AMD64)
//!
//! Saved register assignment within `SavedContext::regs`:
//!
//! ```text
//! regs[0] = rbx   (cb + 0x18)
//! regs[1] = rbp   (cb + 0x20)
//! regs[2] = r12   (cb + 0x28)  entry function on first resume
//! regs[3] = r13   (cb + 0x30)  entry argument on first resume
//! regs[4] = r14   (cb + 0x38)
//! regs[5] = r15   (cb + 0x40)
//! ```
//!
//! On every save the primitive stores the absolute stack pointer at
//! cb+0x08 and the distance cb-minus-sp at cb+0x00, keeping the
//! resumability sentinel and the consistency check in `coro-core`
//! honest without extra bookkeeping.

use std::arch::naked_asm;

use coro_core::control::ControlBlock;
use coro_core::traits::ContextSwitch;

/// Native context-switch primitive for this architecture.
pub struct NativeSwitch;

/// Worst-case stack bytes used between a fresh coroutine's first
/// resume and its first possible yield (trampoline + entry glue).
const MIN_STACK_DEPTH: usize = 512;

impl ContextSwitch for NativeSwitch {
    fn min_stack_depth(&self) -> usize {
        MIN_STACK_DEPTH
    }

    unsafe fn init_context(
        &self,
        cb: *mut ControlBlock,
        stack_top: *mut u8,
        entry_fn: usize,
        entry_arg: usize,
    ) {
        // The trampoline's own `call` provides the ABI's entry
        // alignment, so the initial stack pointer stays 16-aligned.
        let sp = (stack_top as usize) & !0xF;

        let cb = &mut *cb;
        cb.ctx.sp = sp as u64;
        cb.ctx.pc = entry_trampoline as usize as u64;
        cb.ctx.regs = [0; coro_core::control::SAVED_REG_SLOTS];
        cb.ctx.regs[2] = entry_fn as u64;
        cb.ctx.regs[3] = entry_arg as u64;
        cb.saved_sp_offset = (cb as *const ControlBlock as usize - sp) as u64;
    }

    unsafe fn switch(&self, current: *mut ControlBlock, target: *mut ControlBlock) {
        context_switch(current, target);
    }

    unsafe fn load(&self, target: *mut ControlBlock) -> ! {
        context_load(target)
    }
}

/// Trampoline entered on a coroutine's first resume: calls
/// `entry_fn(entry_arg)` from r12/r13, then enters the finish path.
#[unsafe(naked)]
unsafe extern "C" fn entry_trampoline() {
    naked_asm!(
        "mov rdi, r13",
        "call r12",
        "mov rdi, r13",
        "call {finish}",
        "ud2",
        finish = sym finish_shim,
    );
}

unsafe extern "C" fn finish_shim(cb: *mut ControlBlock) -> ! {
    coro_core::group::finish_current(cb)
}

/// Save the calling context into `current` and resume `target`.
/// Returns when something later resumes `current`.
#[unsafe(naked)]
unsafe extern "C" fn context_switch(_current: *mut ControlBlock, _target: *mut ControlBlock) {
    naked_asm!(
        // Save into current (RDI): resume point, sp, sp offset,
        // callee-saved registers.
        "lea rax, [rip + 1f]",
        "mov [rdi + 0x10], rax",
        "mov [rdi + 0x08], rsp",
        "mov rax, rdi",
        "sub rax, rsp",
        "mov [rdi + 0x00], rax",
        "mov [rdi + 0x18], rbx",
        "mov [rdi + 0x20], rbp",
        "mov [rdi + 0x28], r12",
        "mov [rdi + 0x30], r13",
        "mov [rdi + 0x38], r14",
        "mov [rdi + 0x40], r15",
        // Load target (RSI) and resume it.
        "mov rsp, [rsi + 0x08]",
        "mov rax, [rsi + 0x10]",
        "mov rbx, [rsi + 0x18]",
        "mov rbp, [rsi + 0x20]",
        "mov r12, [rsi + 0x28]",
        "mov r13, [rsi + 0x30]",
        "mov r14, [rsi + 0x38]",
        "mov r15, [rsi + 0x40]",
        "jmp rax",
        // Resume point for the saved context.
        "1:",
        "ret",
    );
}

/// Restore-only switch: load `target` without saving the calling
/// context. The finish path uses this so a finished coroutine leaves
/// no resumable record behind.
#[unsafe(naked)]
unsafe extern "C" fn context_load(_target: *mut ControlBlock) -> ! {
    naked_asm!(
        "mov rsp, [rdi + 0x08]",
        "mov rax, [rdi + 0x10]",
        "mov rbx, [rdi + 0x18]",
        "mov rbp, [rdi + 0x20]",
        "mov r12, [rdi + 0x28]",
        "mov r13, [rdi + 0x30]",
        "mov r14, [rdi + 0x38]",
        "mov r15, [rdi + 0x40]",
        "jmp rax",
    );
}

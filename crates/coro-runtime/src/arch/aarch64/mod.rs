//! aarch64 context switching (AAPCS64)
//!
//! Saved register assignment within `SavedContext::regs`:
//!
//! ```text
//! regs[0..10]  = x19-x28  (cb + 0x18 .. 0x68)  x19 = entry argument,
//!                                              x20 = entry function
//!                                              on first resume
//! regs[10]     = x29      (cb + 0x68)
//! regs[11..19] = d8-d15   (cb + 0x70 .. 0xB0)
//! ```
//!
//! The resume address slot (cb+0x10) holds x30; resuming is a plain
//! `ret` after the restore. As on x86_64, every save also records the
//! cb-minus-sp distance at cb+0x00.

use std::arch::naked_asm;

use coro_core::control::ControlBlock;
use coro_core::traits::ContextSwitch;

/// Native context-switch primitive for this architecture.
pub struct NativeSwitch;

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
        // AAPCS64 requires sp to stay 16-aligned at all times.
        let sp = (stack_top as usize) & !0xF;

        let cb = &mut *cb;
        cb.ctx.sp = sp as u64;
        cb.ctx.pc = entry_trampoline as usize as u64;
        cb.ctx.regs = [0; coro_core::control::SAVED_REG_SLOTS];
        cb.ctx.regs[0] = entry_arg as u64;
        cb.ctx.regs[1] = entry_fn as u64;
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
/// `entry_fn(entry_arg)` from x20/x19, then enters the finish path.
#[unsafe(naked)]
unsafe extern "C" fn entry_trampoline() {
    naked_asm!(
        "mov x0, x19",
        "blr x20",
        "mov x0, x19",
        "bl {finish}",
        "brk #1",
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
        // Save into current (x0): sp, resume address (= x30), sp
        // offset, callee-saved registers.
        "mov x9, sp",
        "str x9, [x0, #0x08]",
        "str x30, [x0, #0x10]",
        "sub x10, x0, x9",
        "str x10, [x0, #0x00]",
        "stp x19, x20, [x0, #0x18]",
        "stp x21, x22, [x0, #0x28]",
        "stp x23, x24, [x0, #0x38]",
        "stp x25, x26, [x0, #0x48]",
        "stp x27, x28, [x0, #0x58]",
        "str x29, [x0, #0x68]",
        "stp d8, d9, [x0, #0x70]",
        "stp d10, d11, [x0, #0x80]",
        "stp d12, d13, [x0, #0x90]",
        "stp d14, d15, [x0, #0xA0]",
        // Load target (x1) and resume it.
        "ldr x9, [x1, #0x08]",
        "mov sp, x9",
        "ldr x30, [x1, #0x10]",
        "ldp x19, x20, [x1, #0x18]",
        "ldp x21, x22, [x1, #0x28]",
        "ldp x23, x24, [x1, #0x38]",
        "ldp x25, x26, [x1, #0x48]",
        "ldp x27, x28, [x1, #0x58]",
        "ldr x29, [x1, #0x68]",
        "ldp d8, d9, [x1, #0x70]",
        "ldp d10, d11, [x1, #0x80]",
        "ldp d12, d13, [x1, #0x90]",
        "ldp d14, d15, [x1, #0xA0]",
        "ret",
    );
}

/// Restore-only switch: load `target` without saving the calling
/// context.
#[unsafe(naked)]
unsafe extern "C" fn context_load(_target: *mut ControlBlock) -> ! {
    naked_asm!(
        "ldr x9, [x0, #0x08]",
        "mov sp, x9",
        "ldr x30, [x0, #0x10]",
        "ldp x19, x20, [x0, #0x18]",
        "ldp x21, x22, [x0, #0x28]",
        "ldp x23, x24, [x0, #0x38]",
        "ldp x25, x26, [x0, #0x48]",
        "ldp x27, x28, [x0, #0x58]",
        "ldr x29, [x0, #0x68]",
        "ldp d8, d9, [x0, #0x70]",
        "ldp d10, d11, [x0, #0x80]",
        "ldp d12, d13, [x0, #0x90]",
        "ldp d14, d15, [x0, #0xA0]",
        "ret",
    );
}

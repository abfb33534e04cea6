//! Guard record and fatal invariant handling
//!
//! Two sentinel words sit between the userdata area and the working
//! stack space of every coroutine block. They are written once at
//! allocation and checked on every resume, on every finish and after
//! every (re)launch. A mismatch proves stack overflow into the guard,
//! userdata overflow, or use of a corrupted/foreign handle; the stack
//! can no longer be trusted, so the process terminates without
//! unwinding.

use crate::control::ControlBlock;
use crate::kerror;

/// First guard sentinel word
pub const GUARD_WORD_0: u64 = 0xBAAD_F00D_DEAD_57AC;

/// Second guard sentinel word
pub const GUARD_WORD_1: u64 = 0xFEED_FACE_CAFE_D00D;

/// Terminate the process after logging an invariant violation.
///
/// Used for guard corruption, saved-stack-pointer mismatches and
/// caller-contract violations. Deliberately aborts instead of
/// panicking: unwinding over a corrupted stack is not safe.
pub fn fatal(msg: core::fmt::Arguments<'_>) -> ! {
    kerror!("fatal: {}", msg);
    std::process::abort();
}

#[inline]
unsafe fn guard_words(cb: *const ControlBlock) -> *mut u64 {
    let cb = &*cb;
    cb.base.add(cb.userdata_size) as *mut u64
}

/// Write the guard sentinels for a freshly allocated block.
///
/// # Safety
///
/// `cb` must be a slot control block whose layout fields are
/// initialized.
pub unsafe fn write_guards(cb: *mut ControlBlock) {
    let words = guard_words(cb);
    words.write(GUARD_WORD_0);
    words.add(1).write(GUARD_WORD_1);
}

/// Non-fatal guard inspection. Reads the two sentinel words at their
/// fixed offsets and nothing else.
///
/// # Safety
///
/// Same as [`write_guards`].
pub unsafe fn check_guards(cb: *const ControlBlock) -> bool {
    let words = guard_words(cb);
    words.read() == GUARD_WORD_0 && words.add(1).read() == GUARD_WORD_1
}

/// Guard check with fatal escalation. No-op for the main
/// pseudo-coroutine, which has no guarded block.
///
/// # Safety
///
/// `cb` must point to a valid control block.
pub unsafe fn verify_guards(cb: *const ControlBlock) {
    let r = &*cb;
    if r.is_main() {
        return;
    }
    if !check_guards(cb) {
        fatal(format_args!(
            "guard corruption on coroutine {}: base={:p} total={} userdata={} sp_offset={:#x}",
            r.index, r.base, r.total_size, r.userdata_size, r.saved_sp_offset
        ));
    }
}

//! Coroutine control block and saved-register area
//!
//! These structures have fixed layouts (repr(C)) because the
//! context-switch primitive accesses them from assembly at hard-coded
//! offsets.

use core::ffi::c_void;
use core::ptr;

use crate::constants::{CONTROL_BLOCK_SIZE, INDEX_MAIN};
use crate::group::{Group, ProcThunk};
use crate::layout::StackLayout;
use crate::state::CoroState;

/// Number of general-purpose save slots in [`SavedContext::regs`].
///
/// Sized for the largest supported calling convention (AAPCS64:
/// x19-x28, x29, d8-d15). Each architecture module documents which
/// slots it uses.
pub const SAVED_REG_SLOTS: usize = 20;

/// A procedure has been attached at least once (distinguishes a
/// finished slot from a never-launched one).
pub const FLAG_LAUNCHED: u32 = 1 << 0;

/// The userdata area holds a single pointer-sized value rather than
/// an inline buffer ("just a pointer" mode).
pub const FLAG_USERDATA_PTR: u32 = 1 << 1;

/// Register state persisted across a suspension.
///
/// Written and read only by the context-switch primitive, except for
/// the stack-pointer consistency check performed before each resume.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SavedContext {
    /// Saved stack pointer (absolute)
    pub sp: u64,
    /// Resume address
    pub pc: u64,
    /// Callee-saved registers, assignment is per-architecture
    pub regs: [u64; SAVED_REG_SLOTS],
}

impl SavedContext {
    pub const fn zeroed() -> Self {
        Self { sp: 0, pc: 0, regs: [0; SAVED_REG_SLOTS] }
    }
}

/// Per-coroutine control block, placed at the high end of the
/// coroutine's stack block (the initial stack pointer starts
/// immediately below it). The ephemeral main pseudo-coroutine uses
/// the same record, stack-allocated in the `start`/`start_cycle`
/// frame with a null `base`.
///
/// Layout (offsets are stable for assembly access):
/// ```text
/// 0x00: saved_sp_offset (u64)  - cb address minus saved SP; 0 = finished/free
/// 0x08: ctx.sp          (u64)  - saved absolute stack pointer
/// 0x10: ctx.pc          (u64)  - resume address
/// 0x18: ctx.regs        (160 bytes) - callee-saved registers
/// 0xB8: group           (ptr)  - owning scheduler group
/// 0xC0: base            (ptr)  - low end of the stack block (null for main)
/// 0xC8: total_size      (usize)
/// 0xD0: userdata_size   (usize, rounded)
/// 0xD8: proc            (ptr)  - boxed procedure, consumed on first resume
/// 0xE0: index           (u32)  - slot index (INDEX_MAIN for main)
/// 0xE4: flags           (u32)
/// 0xE8: reserved        (24 bytes)
/// ```
#[repr(C, align(16))]
pub struct ControlBlock {
    /// Byte distance from this control block's own address down to
    /// the saved stack pointer. `0` is the sentinel for "finished /
    /// never launched"; nonzero means "suspended, resumable". The
    /// switch primitive keeps it in sync with `ctx.sp` on every save.
    pub saved_sp_offset: u64,

    /// Saved register state
    pub ctx: SavedContext,

    /// Back-reference (non-owning) to the owning group
    pub group: *mut Group,

    /// Low end of this coroutine's stack block; null for the main
    /// pseudo-coroutine
    pub base: *mut u8,

    /// Total stack block size in bytes
    pub total_size: usize,

    /// Rounded userdata area size at the low end of the block
    pub userdata_size: usize,

    /// Boxed procedure attached by launch/reload; taken (and nulled)
    /// by the entry path on first resume
    pub proc: *mut ProcThunk,

    /// Slot index within the group
    pub index: u32,

    /// FLAG_* bits
    pub flags: u32,

    _reserved: [u8; 24],
}

// Offsets baked into the architecture modules' assembly.
pub const CB_OFF_SAVED_SP_OFFSET: usize = 0x00;
pub const CB_OFF_SP: usize = 0x08;
pub const CB_OFF_PC: usize = 0x10;
pub const CB_OFF_REGS: usize = 0x18;
pub const CB_OFF_GROUP: usize = 0xB8;

// Verify sizes and assembly offsets at compile time.
const _: () = {
    assert!(core::mem::size_of::<ControlBlock>() == CONTROL_BLOCK_SIZE);
    assert!(core::mem::align_of::<ControlBlock>() == 16);
    assert!(core::mem::offset_of!(ControlBlock, saved_sp_offset) == CB_OFF_SAVED_SP_OFFSET);
    assert!(core::mem::offset_of!(ControlBlock, ctx) == CB_OFF_SP);
    assert!(core::mem::offset_of!(SavedContext, pc) == CB_OFF_PC - CB_OFF_SP);
    assert!(core::mem::offset_of!(SavedContext, regs) == CB_OFF_REGS - CB_OFF_SP);
    assert!(core::mem::offset_of!(ControlBlock, group) == CB_OFF_GROUP);
};

impl ControlBlock {
    /// Initialize a slot coroutine's control block in place.
    ///
    /// # Safety
    ///
    /// `cb` must point to the control-block area of a stack block
    /// whose low end is `base` and whose layout is `layout`.
    pub unsafe fn init_slot(
        cb: *mut ControlBlock,
        group: *mut Group,
        index: u32,
        base: *mut u8,
        layout: &StackLayout,
    ) {
        cb.write(ControlBlock {
            saved_sp_offset: 0,
            ctx: SavedContext::zeroed(),
            group,
            base,
            total_size: layout.total_size,
            userdata_size: layout.userdata_size,
            proc: ptr::null_mut(),
            index,
            flags: 0,
            _reserved: [0; 24],
        });
    }

    /// Fresh record for the main pseudo-coroutine. Lives on the
    /// native stack for the duration of one `start`/`start_cycle`
    /// call and is never persisted across calls.
    pub fn new_main(group: *mut Group) -> ControlBlock {
        ControlBlock {
            saved_sp_offset: 0,
            ctx: SavedContext::zeroed(),
            group,
            base: ptr::null_mut(),
            total_size: 0,
            userdata_size: 0,
            proc: ptr::null_mut(),
            index: INDEX_MAIN,
            flags: 0,
            _reserved: [0; 24],
        }
    }

    /// Whether this record is the main pseudo-coroutine.
    #[inline]
    pub fn is_main(&self) -> bool {
        self.base.is_null()
    }

    /// Slot state as recorded in the control block. `Running` is a
    /// group-level notion (the group knows its current coroutine);
    /// this reports `Suspended` for the running coroutine as well,
    /// which is exactly what the scheduling scan relies on.
    #[inline]
    pub fn slot_state(&self) -> CoroState {
        if self.saved_sp_offset != 0 {
            CoroState::Suspended
        } else if self.flags & FLAG_LAUNCHED != 0 {
            CoroState::Finished
        } else {
            CoroState::Free
        }
    }

    /// Userdata pointer for this coroutine: the stored pointer value
    /// in "just a pointer" mode, the inline buffer otherwise, null if
    /// no userdata was reserved.
    #[inline]
    pub fn userdata(&self) -> *mut c_void {
        if self.userdata_size == 0 {
            return ptr::null_mut();
        }
        if self.flags & FLAG_USERDATA_PTR != 0 {
            // The area's first word holds the payload pointer itself.
            unsafe { (self.base as *const *mut c_void).read() }
        } else {
            self.base as *mut c_void
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_block_asm_offsets() {
        let cb = ControlBlock::new_main(ptr::null_mut());
        let base = &cb as *const _ as usize;

        assert_eq!(&cb.saved_sp_offset as *const _ as usize - base, 0x00);
        assert_eq!(&cb.ctx.sp as *const _ as usize - base, 0x08);
        assert_eq!(&cb.ctx.pc as *const _ as usize - base, 0x10);
        assert_eq!(&cb.ctx.regs as *const _ as usize - base, 0x18);
        assert_eq!(&cb.group as *const _ as usize - base, 0xB8);
        assert_eq!(&cb.index as *const _ as usize - base, 0xE0);
        assert_eq!(&cb.flags as *const _ as usize - base, 0xE4);
    }

    #[test]
    fn test_main_record() {
        let cb = ControlBlock::new_main(ptr::null_mut());
        assert!(cb.is_main());
        assert_eq!(cb.index, INDEX_MAIN);
        assert_eq!(cb.slot_state(), CoroState::Free);
        assert!(cb.userdata().is_null());
    }
}

//! Scheduler group and the yield/finish state machine
//!
//! A group owns a fixed-capacity list of coroutine slots plus the
//! ephemeral main pseudo-coroutine representing the calling context
//! during one `start`/`start_cycle` call. Slot indices are stable for
//! the life of the group; a finished coroutine's slot is reused in
//! place by `reload`, never compacted.
//!
//! Everything here is strictly single-threaded and cooperative. The
//! group uses interior mutability (`Cell`) because control re-enters
//! it from within coroutines while an outer call is still on the
//! native stack; no synchronization is needed since exactly one
//! logical flow executes at a time. A group must never be driven from
//! more than one OS thread.

use core::cell::Cell;
use core::ffi::c_void;
use core::mem;
use core::ptr::{self, NonNull};
use std::alloc::{alloc_zeroed, dealloc, Layout};

use crate::constants::CONTROL_BLOCK_SIZE;
use crate::control::{ControlBlock, FLAG_LAUNCHED, FLAG_USERDATA_PTR};
use crate::error::{CoroError, CoroResult, MemoryError};
use crate::guard::{self, fatal};
use crate::ktrace;
use crate::layout::StackLayout;
use crate::policy::{next_target, Caller, Decision};
use crate::state::{CoroState, RunMode};
use crate::traits::{ContextSwitch, StackMemory};

/// Boxed coroutine procedure. Attached by launch/reload, consumed on
/// the coroutine's first resume.
pub type ProcThunk = Box<dyn FnOnce(Coro)>;

/// Userdata policy applied at launch/reload time.
#[derive(Debug, Clone, Copy)]
pub enum UserdataMode {
    /// Leave the payload as is: zeroed for a fresh allocation, or
    /// whatever the caller seeded into it before a reload.
    Keep,

    /// Store the given pointer as the sole payload; `userdata()`
    /// returns exactly this value.
    JustPointer(*mut c_void),

    /// Zero the payload, then overwrite its first pointer-sized field
    /// with the given value; `userdata()` returns the buffer address.
    SeedPointer(*mut c_void),
}

/// Handle to one coroutine slot. Plain copyable pointer wrapper; the
/// underlying allocation lives until the owning group is torn down.
#[derive(Clone, Copy)]
pub struct Coro {
    cb: NonNull<ControlBlock>,
}

impl Coro {
    #[inline]
    pub(crate) fn from_cb(cb: *mut ControlBlock) -> Coro {
        debug_assert!(!cb.is_null());
        Coro { cb: unsafe { NonNull::new_unchecked(cb) } }
    }

    /// Slot index of this coroutine within its group.
    #[inline]
    pub fn index(&self) -> u32 {
        unsafe { (*self.cb.as_ptr()).index }
    }

    /// Userdata pointer: the stored value in just-a-pointer mode, the
    /// inline buffer otherwise, null when no userdata was reserved.
    #[inline]
    pub fn userdata(&self) -> *mut c_void {
        unsafe { (*self.cb.as_ptr()).userdata() }
    }

    /// Current state of this coroutine.
    pub fn state(&self) -> CoroState {
        let cb = self.cb.as_ptr();
        unsafe {
            let group = &*(*cb).group;
            if group.current.get() == cb {
                CoroState::Running
            } else {
                (*cb).slot_state()
            }
        }
    }

    /// Suspend this coroutine and hand control to the next target
    /// chosen by the group's scheduling policy (step mode: the caller
    /// of `start`; cycle mode: the next live coroutine in slot
    /// order).
    ///
    /// Returns, once this coroutine is resumed, whether the party it
    /// yielded *to* is still live; yields that went to the caller
    /// always report `true`. Calling this on any coroutine other than
    /// the one currently running is a contract violation and
    /// terminates the process.
    pub fn yield_now(&self) -> bool {
        unsafe { yield_current(self.cb.as_ptr()) }
    }
}

/// Scheduler group header. The slot array (one control-block pointer
/// per capacity unit) trails this header in the same allocation, as
/// sized by [`Group::alloc_size`].
#[repr(C)]
pub struct Group {
    capacity: u32,
    count: Cell<u32>,
    run_cursor: Cell<u32>,
    mode: Cell<RunMode>,
    /// Main pseudo-coroutine record of the active `start*` call, null
    /// when the group is not being driven
    main: Cell<*mut ControlBlock>,
    /// Currently executing control block (a slot or main), null when
    /// the group is not being driven
    current: Cell<*mut ControlBlock>,
    switch: &'static dyn ContextSwitch,
    memory: &'static dyn StackMemory,
}

impl Group {
    /// Bytes required for a group of the given capacity: header plus
    /// one handle slot per capacity unit.
    pub fn alloc_size(capacity: u32) -> usize {
        mem::size_of::<Group>() + capacity as usize * mem::size_of::<*mut ControlBlock>()
    }

    /// Initialize a group in caller-provided storage.
    ///
    /// # Safety
    ///
    /// `buf` must point to at least [`Group::alloc_size`] bytes,
    /// aligned to 16, valid for the life of the group and not aliased
    /// by anything else.
    pub unsafe fn init_inplace(
        buf: *mut u8,
        capacity: u32,
        switch: &'static dyn ContextSwitch,
        memory: &'static dyn StackMemory,
    ) -> CoroResult<*mut Group> {
        if capacity == 0 {
            return Err(CoroError::ZeroCapacity);
        }
        let group = buf as *mut Group;
        group.write(Group {
            capacity,
            count: Cell::new(0),
            run_cursor: Cell::new(0),
            mode: Cell::new(RunMode::Step),
            main: Cell::new(ptr::null_mut()),
            current: Cell::new(ptr::null_mut()),
            switch,
            memory,
        });
        let slots = (*group).slots_ptr();
        for i in 0..capacity as usize {
            slots.add(i).write(ptr::null_mut());
        }
        Ok(group)
    }

    /// Fixed capacity declared at creation.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of slots allocated so far (live or finished).
    #[inline]
    pub fn count(&self) -> u32 {
        self.count.get()
    }

    /// Scheduling mode set by the most recent `start`/`start_cycle`.
    #[inline]
    pub fn mode(&self) -> RunMode {
        self.mode.get()
    }

    #[inline]
    fn slots_ptr(&self) -> *mut *mut ControlBlock {
        unsafe { (self as *const Group as *mut Group).add(1) as *mut *mut ControlBlock }
    }

    #[inline]
    fn slot_cb(&self, index: u32) -> *mut ControlBlock {
        unsafe { self.slots_ptr().add(index as usize).read() }
    }

    #[inline]
    fn slot_resumable(&self, index: u32) -> bool {
        unsafe { (*self.slot_cb(index)).saved_sp_offset != 0 }
    }

    /// Allocate and launch a coroutine with no userdata area.
    pub fn create(
        &self,
        stack_size: usize,
        proc: impl FnOnce(Coro) + 'static,
    ) -> CoroResult<Coro> {
        self.ext_create(stack_size, 0, UserdataMode::Keep, proc)
    }

    /// Allocate a coroutine stack block of `stack_size` bytes with a
    /// `userdata_bytes` payload area, then launch `proc` on it.
    ///
    /// Fails without touching existing slots when the group is at
    /// capacity or the stack cannot hold the layout.
    pub fn ext_create(
        &self,
        stack_size: usize,
        userdata_bytes: usize,
        userdata: UserdataMode,
        proc: impl FnOnce(Coro) + 'static,
    ) -> CoroResult<Coro> {
        let index = self.count.get();
        if index >= self.capacity {
            return Err(CoroError::NoSlotsAvailable);
        }

        let userdata_bytes = effective_userdata_bytes(userdata_bytes, &userdata);
        let layout =
            StackLayout::compute(stack_size, userdata_bytes, self.switch.min_stack_depth())?;
        let base = self.memory.alloc(layout.total_size)?;

        let cb = unsafe { base.as_ptr().add(layout.control_offset) } as *mut ControlBlock;
        unsafe {
            ControlBlock::init_slot(
                cb,
                self as *const Group as *mut Group,
                index,
                base.as_ptr(),
                &layout,
            );
            guard::write_guards(cb);
            self.slots_ptr().add(index as usize).write(cb);
        }
        self.count.set(index + 1);

        ktrace!("create: slot {} stack={} userdata={}", index, layout.total_size, layout.userdata_size);
        unsafe { self.launch(cb, Box::new(proc), userdata) };
        Ok(Coro::from_cb(cb))
    }

    /// Look up the coroutine at `index`; `None` past the allocated
    /// count.
    pub fn get(&self, index: u32) -> Option<Coro> {
        if index >= self.count.get() {
            return None;
        }
        Some(Coro::from_cb(self.slot_cb(index)))
    }

    /// Reattach a procedure to a finished (or never-launched) slot,
    /// reusing its stack allocation, with `UserdataMode::Keep`.
    ///
    /// No-op returning `false` while the slot is suspended; this is
    /// the only sanctioned way to reuse a finished slot.
    pub fn reload(&self, index: u32, proc: impl FnOnce(Coro) + 'static) -> bool {
        self.ext_reload(index, UserdataMode::Keep, proc)
    }

    /// [`Group::reload`] with an explicit userdata policy.
    pub fn ext_reload(
        &self,
        index: u32,
        userdata: UserdataMode,
        proc: impl FnOnce(Coro) + 'static,
    ) -> bool {
        if index >= self.count.get() {
            fatal(format_args!(
                "reload: slot {} out of range (count {})",
                index,
                self.count.get()
            ));
        }
        let cb = self.slot_cb(index);
        if unsafe { (*cb).saved_sp_offset } != 0 {
            return false;
        }
        unsafe { self.launch(cb, Box::new(proc), userdata) };
        true
    }

    /// Write a coroutine's initial resume record and apply the
    /// userdata policy. The slot must not be suspended or running.
    unsafe fn launch(&self, cb: *mut ControlBlock, proc: ProcThunk, userdata: UserdataMode) {
        let old = (*cb).proc;
        if !old.is_null() {
            // Previous procedure was never resumed; drop it.
            drop(Box::from_raw(old));
        }
        (*cb).proc = Box::into_raw(Box::new(proc));

        let userdata_size = (*cb).userdata_size;
        match userdata {
            UserdataMode::Keep => {}
            UserdataMode::JustPointer(p) => {
                if userdata_size < mem::size_of::<*mut c_void>() {
                    fatal(format_args!(
                        "launch: slot {} has no userdata area for a pointer payload",
                        (*cb).index
                    ));
                }
                ((*cb).base as *mut *mut c_void).write(p);
                (*cb).flags |= FLAG_USERDATA_PTR;
            }
            UserdataMode::SeedPointer(p) => {
                if userdata_size < mem::size_of::<*mut c_void>() {
                    fatal(format_args!(
                        "launch: slot {} has no userdata area for a pointer seed",
                        (*cb).index
                    ));
                }
                ptr::write_bytes((*cb).base, 0, userdata_size);
                ((*cb).base as *mut *mut c_void).write(p);
                (*cb).flags &= !FLAG_USERDATA_PTR;
            }
        }
        (*cb).flags |= FLAG_LAUNCHED;

        // Initial stack top is the control block's own address.
        let stack_top = ((*cb).base).add((*cb).total_size - CONTROL_BLOCK_SIZE);
        self.switch
            .init_context(cb, stack_top, coro_entry as usize, cb as usize);

        // A failed check here means the layout under/over-sized the
        // block, which is a programming error, not caller input.
        guard::verify_guards(cb);
    }

    /// One explicit step into the chosen coroutine: step mode, cursor
    /// at `index`, resume it directly.
    ///
    /// Returns `false` without running anything when the slot is
    /// finished/never launched, or when the group is already being
    /// driven. An index past the allocated count is a contract
    /// violation.
    pub fn start(&self, index: u32) -> bool {
        if index >= self.count.get() {
            fatal(format_args!(
                "start: slot {} out of range (count {})",
                index,
                self.count.get()
            ));
        }
        if !self.main.get().is_null() {
            return false;
        }
        let cb = self.slot_cb(index);
        if unsafe { (*cb).saved_sp_offset } == 0 {
            return false;
        }
        self.mode.set(RunMode::Step);
        self.run_cursor.set(index);
        ktrace!("start: slot {}", index);
        unsafe { self.drive(cb) }
    }

    /// Round-robin run: cycle mode, cursor reset, resume the first
    /// live coroutine and keep advancing through the group on every
    /// yield/finish until a forward pass finds nothing runnable.
    ///
    /// Returns `false` immediately when no coroutine is live or the
    /// group is already being driven.
    pub fn start_cycle(&self) -> bool {
        if !self.main.get().is_null() {
            return false;
        }
        self.mode.set(RunMode::Cycle);
        self.run_cursor.set(0);

        let mut cursor = 0;
        let decision = next_target(Caller::Main, RunMode::Cycle, &mut cursor, self.count.get(), |i| {
            self.slot_resumable(i)
        });
        self.run_cursor.set(cursor);
        match decision {
            Decision::Main => false,
            Decision::Resume(index) => {
                ktrace!("start_cycle: first slot {}", index);
                unsafe { self.drive(self.slot_cb(index)) }
            }
        }
    }

    /// Construct the ephemeral main record on this native stack frame
    /// and switch into `first`. Returns when the scheduling policy
    /// hands control back to main.
    unsafe fn drive(&self, first: *mut ControlBlock) -> bool {
        let mut main_cb = ControlBlock::new_main(self as *const Group as *mut Group);
        self.main.set(&mut main_cb);
        let ok = self.switch_to(&mut main_cb, first);
        self.main.set(ptr::null_mut());
        self.current.set(ptr::null_mut());
        ok
    }

    /// Checked switch: `false` without switching when the target is
    /// finished; fatal when the target's guard or recorded stack
    /// pointer is inconsistent. Switching to oneself is a no-op.
    unsafe fn switch_to(&self, current: *mut ControlBlock, target: *mut ControlBlock) -> bool {
        if current == target {
            return true;
        }
        if (*target).saved_sp_offset == 0 {
            return false;
        }
        guard::verify_guards(target);
        self.verify_saved_sp(target);
        self.current.set(target);
        self.switch.switch(current, target);
        true
    }

    /// The restored stack pointer must match what was recorded;
    /// anything else means the stack was moved, freed or overwritten
    /// between suspension and resumption.
    unsafe fn verify_saved_sp(&self, cb: *const ControlBlock) {
        let offset = (*cb).saved_sp_offset;
        let expected = (cb as usize as u64).wrapping_sub(offset);
        if (*cb).ctx.sp != expected {
            fatal(format_args!(
                "saved stack pointer mismatch on coroutine {}: sp={:#x} expected={:#x}",
                (*cb).index,
                (*cb).ctx.sp,
                expected
            ));
        }
    }

    /// Release every coroutine's stack block and drop procedures that
    /// were never resumed. Slot handles become dangling; only group
    /// teardown may call this.
    pub fn finish(&self) {
        if !self.main.get().is_null() {
            fatal(format_args!("group finish while the group is running"));
        }
        for index in 0..self.count.get() {
            let cb = self.slot_cb(index);
            if cb.is_null() {
                continue;
            }
            unsafe {
                let proc = (*cb).proc;
                if !proc.is_null() {
                    drop(Box::from_raw(proc));
                    (*cb).proc = ptr::null_mut();
                }
                let base = (*cb).base;
                let size = (*cb).total_size;
                self.slots_ptr().add(index as usize).write(ptr::null_mut());
                self.memory.release(NonNull::new_unchecked(base), size);
            }
        }
        self.count.set(0);
    }
}

/// Round a userdata request up to pointer size when the launch policy
/// needs to store a pointer into it.
fn effective_userdata_bytes(requested: usize, mode: &UserdataMode) -> usize {
    match mode {
        UserdataMode::Keep => requested,
        UserdataMode::JustPointer(_) | UserdataMode::SeedPointer(_) => {
            requested.max(mem::size_of::<*mut c_void>())
        }
    }
}

/// Yield transition. See [`Coro::yield_now`].
unsafe fn yield_current(cb: *mut ControlBlock) -> bool {
    let group = &*(*cb).group;
    if group.current.get() != cb {
        fatal(format_args!(
            "yield from coroutine {} which is not the running one",
            (*cb).index
        ));
    }
    guard::verify_guards(cb);

    let mut cursor = group.run_cursor.get();
    let decision = next_target(
        Caller::Slot((*cb).index),
        group.mode.get(),
        &mut cursor,
        group.count.get(),
        |i| group.slot_resumable(i),
    );
    group.run_cursor.set(cursor);

    let (target, yielded_to_slot) = match decision {
        Decision::Main => (group.main.get(), None),
        Decision::Resume(i) => {
            let t = group.slot_cb(i);
            (t, Some(t))
        }
    };

    group.switch_to(cb, target);

    // Resumed. Report whether the party we handed control to is
    // still live; main cannot finish.
    match yielded_to_slot {
        None => true,
        Some(t) => (*t).saved_sp_offset != 0,
    }
}

/// Entry point executed on the coroutine's own stack, called by the
/// architecture trampoline on the first resume.
///
/// # Safety
///
/// Only the entry trampoline may call this, exactly once per launch.
pub unsafe extern "C" fn coro_entry(cb: *mut ControlBlock) {
    let proc = (*cb).proc;
    (*cb).proc = ptr::null_mut();
    let thunk: Box<ProcThunk> = Box::from_raw(proc);
    let coro = Coro::from_cb(cb);

    // Unwinding over the trampoline frame is undefined; a panicking
    // procedure takes the whole process down instead.
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
        (*thunk)(coro);
    }));
    if result.is_err() {
        fatal(format_args!("coroutine {} procedure panicked", (*cb).index));
    }
}

/// Finish transition, invoked by the architecture trampoline when a
/// coroutine's procedure returns; never called by user code. Marks
/// the slot reloadable (the stack block itself is kept for reuse) and
/// resumes the next scheduling target.
///
/// # Safety
///
/// Only the entry trampoline may call this, on the finishing
/// coroutine's own stack.
pub unsafe extern "C" fn finish_current(cb: *mut ControlBlock) -> ! {
    let group = &*(*cb).group;
    guard::verify_guards(cb);
    (*cb).saved_sp_offset = 0;

    let mut cursor = group.run_cursor.get();
    let decision = next_target(
        Caller::Slot((*cb).index),
        group.mode.get(),
        &mut cursor,
        group.count.get(),
        |i| group.slot_resumable(i),
    );
    group.run_cursor.set(cursor);

    let target = match decision {
        Decision::Main => group.main.get(),
        Decision::Resume(i) => group.slot_cb(i),
    };
    guard::verify_guards(target);
    group.verify_saved_sp(target);
    group.current.set(target);
    group.switch.load(target)
}

/// Heap-owned group. Releases every coroutine stack and its own
/// backing storage on drop.
pub struct OwnedGroup {
    ptr: NonNull<Group>,
}

impl OwnedGroup {
    /// Allocate and initialize a group of the given capacity.
    pub fn new(
        capacity: u32,
        switch: &'static dyn ContextSwitch,
        memory: &'static dyn StackMemory,
    ) -> CoroResult<OwnedGroup> {
        if capacity == 0 {
            return Err(CoroError::ZeroCapacity);
        }
        let size = Group::alloc_size(capacity);
        let layout = Layout::from_size_align(size, 16).map_err(|_| MemoryError::SizeOverflow)?;
        let buf = unsafe { alloc_zeroed(layout) };
        let Some(buf) = NonNull::new(buf) else {
            return Err(MemoryError::AllocationFailed.into());
        };
        let group = unsafe { Group::init_inplace(buf.as_ptr(), capacity, switch, memory) };
        match group {
            Ok(g) => Ok(OwnedGroup { ptr: unsafe { NonNull::new_unchecked(g) } }),
            Err(e) => {
                unsafe { dealloc(buf.as_ptr(), layout) };
                Err(e)
            }
        }
    }
}

impl core::ops::Deref for OwnedGroup {
    type Target = Group;

    fn deref(&self) -> &Group {
        unsafe { self.ptr.as_ref() }
    }
}

impl Drop for OwnedGroup {
    fn drop(&mut self) {
        let group = unsafe { self.ptr.as_ref() };
        group.finish();
        let layout = Layout::from_size_align(Group::alloc_size(group.capacity()), 16)
            .expect("group layout was valid at construction");
        unsafe { dealloc(self.ptr.as_ptr() as *mut u8, layout) };
    }
}

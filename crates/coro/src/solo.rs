//! Single-coroutine convenience wrapper
//!
//! A capacity-one group plus its only coroutine, for generator-style
//! usage where one caller repeatedly steps one coroutine.

use coro_core::error::CoroResult;
use coro_core::group::{Coro, UserdataMode};
use coro_core::state::CoroState;

use crate::OwnedGroup;

pub struct Solo {
    group: OwnedGroup,
    coro: Coro,
}

impl Solo {
    /// One coroutine on its own group, no userdata.
    pub fn new(stack_size: usize, proc: impl FnOnce(Coro) + 'static) -> CoroResult<Solo> {
        Self::ext_new(stack_size, 0, UserdataMode::Keep, proc)
    }

    /// [`Solo::new`] with a userdata area and policy.
    pub fn ext_new(
        stack_size: usize,
        userdata_bytes: usize,
        userdata: UserdataMode,
        proc: impl FnOnce(Coro) + 'static,
    ) -> CoroResult<Solo> {
        let group = crate::group_init(1)?;
        let coro = group.ext_create(stack_size, userdata_bytes, userdata, proc)?;
        Ok(Solo { group, coro })
    }

    /// Run the coroutine until its next yield or finish. `false` once
    /// it has finished.
    pub fn step(&self) -> bool {
        self.group.start(0)
    }

    /// Reattach a procedure after the coroutine finished, reusing its
    /// stack. No-op returning `false` while it is still suspended.
    pub fn reload(&self, proc: impl FnOnce(Coro) + 'static) -> bool {
        self.group.reload(0, proc)
    }

    /// [`Solo::reload`] with an explicit userdata policy.
    pub fn ext_reload(
        &self,
        userdata: UserdataMode,
        proc: impl FnOnce(Coro) + 'static,
    ) -> bool {
        self.group.ext_reload(0, userdata, proc)
    }

    /// Handle to the underlying coroutine.
    pub fn coro(&self) -> Coro {
        self.coro
    }

    /// Userdata pointer of the underlying coroutine.
    pub fn userdata(&self) -> *mut core::ffi::c_void {
        self.coro.userdata()
    }

    pub fn state(&self) -> CoroState {
        self.coro.state()
    }

    pub fn is_finished(&self) -> bool {
        self.coro.state() == CoroState::Finished
    }
}

//! # coro-core
//!
//! Core types and scheduling state machine for the coro stackful
//! coroutine runtime.
//!
//! This crate is platform-agnostic and contains no OS- or
//! architecture-specific code. The context-switch primitive and stack
//! memory provider are declared here as traits (`traits` module) and
//! implemented in `coro-runtime`.
//!
//! ## Modules
//!
//! - `state` - Coroutine state and run-mode enums
//! - `layout` - Per-coroutine stack block layout math
//! - `control` - Control block and saved-register area (repr(C))
//! - `guard` - Guard sentinel words and corruption checks
//! - `policy` - Step/cycle scheduling policy
//! - `group` - Scheduler group and the yield/finish state machine
//! - `traits` - Context-switch and stack-memory seams
//! - `error` - Error types
//! - `kprint` - Kernel-style debug printing macros
//! - `env` - Environment variable utilities

pub mod control;
pub mod env;
pub mod error;
pub mod group;
pub mod guard;
pub mod kprint;
pub mod layout;
pub mod policy;
pub mod state;
pub mod traits;

// Re-exports for convenience
pub use control::{ControlBlock, SavedContext};
pub use error::{CoroError, CoroResult, MemoryError};
pub use group::{Coro, Group, OwnedGroup, UserdataMode};
pub use layout::StackLayout;
pub use policy::{Caller, Decision};
pub use state::{CoroState, RunMode};
pub use traits::{ContextSwitch, StackMemory};

pub use env::{env_get, env_get_bool, env_get_opt, env_get_str, env_is_set};

/// Constants for memory layout
pub mod constants {
    /// Required alignment of every stack block and every internal
    /// boundary inside it.
    pub const STACK_ALIGN: usize = 16;

    /// Size of the guard record (two sentinel words).
    pub const GUARD_SIZE: usize = 16;

    /// Size reserved for the control block at the high end of each
    /// stack block.
    pub const CONTROL_BLOCK_SIZE: usize = 256;

    /// Default stack size per coroutine (64 KiB). Overridable at the
    /// call site and, in the facade crate, via `CORO_STACK_SIZE`.
    pub const DEFAULT_STACK_SIZE: usize = 64 * 1024;

    /// Slot index sentinel for "no coroutine".
    pub const COROUTINE_NONE: u32 = u32::MAX;

    /// Slot index used by the ephemeral main pseudo-coroutine.
    pub const INDEX_MAIN: u32 = u32::MAX - 1;
}

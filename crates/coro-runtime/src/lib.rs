//! # coro-runtime
//!
//! Platform- and architecture-specific backing for `coro-core`:
//!
//! - `stack` - mmap-backed coroutine stack blocks
//! - `arch` - the context-switch primitive (inline assembly per
//!   architecture)
//!
//! Both are exposed through the `coro-core` traits so the scheduler
//! state machine never touches this crate's internals directly.

pub mod arch;
pub mod stack;

pub use arch::NativeSwitch;
pub use stack::MmapMemory;

//! Coroutine state and run-mode types

use core::fmt;

/// Logical state of a coroutine slot
///
/// `Free` and `Finished` are bit-identical in the control block
/// (`saved_sp_offset == 0`); they differ only in whether a procedure
/// has ever been attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoroState {
    /// Allocated, never launched
    Free,

    /// Launched and resumable (`saved_sp_offset != 0`)
    Suspended,

    /// Currently executing; is the group's current coroutine
    Running,

    /// Procedure returned; slot is reloadable
    Finished,
}

impl CoroState {
    /// Check if a resume may target this state
    #[inline]
    pub const fn is_resumable(&self) -> bool {
        matches!(self, CoroState::Suspended)
    }

    /// Check if the slot may be (re)loaded with a new procedure
    #[inline]
    pub const fn is_reloadable(&self) -> bool {
        matches!(self, CoroState::Free | CoroState::Finished)
    }
}

impl fmt::Display for CoroState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoroState::Free => write!(f, "free"),
            CoroState::Suspended => write!(f, "suspended"),
            CoroState::Running => write!(f, "running"),
            CoroState::Finished => write!(f, "finished"),
        }
    }
}

/// Scheduling mode of a group, set on each `start`/`start_cycle`
///
/// Kept as an explicit field next to the slot count rather than a flag
/// bit packed into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum RunMode {
    /// Yielding or finishing inside any coroutine returns control to
    /// the caller of `start`. Single-shot generator pattern.
    #[default]
    Step = 0,

    /// Yielding or finishing advances round-robin to the next live
    /// coroutine, returning to the caller only when a forward pass
    /// from the run cursor finds nothing runnable.
    Cycle = 1,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Step => write!(f, "step"),
            RunMode::Cycle => write!(f, "cycle"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        assert!(CoroState::Suspended.is_resumable());
        assert!(!CoroState::Running.is_resumable());
        assert!(!CoroState::Finished.is_resumable());

        assert!(CoroState::Free.is_reloadable());
        assert!(CoroState::Finished.is_reloadable());
        assert!(!CoroState::Suspended.is_reloadable());
        assert!(!CoroState::Running.is_reloadable());
    }

    #[test]
    fn test_mode_default() {
        assert_eq!(RunMode::default(), RunMode::Step);
    }
}

//! Error types for the coroutine runtime
//!
//! Only allocation-time and setup-time failures are reported through
//! `CoroError`. Invariant violations (guard corruption, stack-pointer
//! mismatch, foreign yields) terminate the process instead; a
//! corrupted stack cannot be trusted to unwind. See `guard::fatal`.

use core::fmt;

/// Result type for runtime operations
pub type CoroResult<T> = Result<T, CoroError>;

/// Errors that can occur while setting up groups and coroutines
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoroError {
    /// All slots of the group are already in use
    NoSlotsAvailable,

    /// Requested stack size cannot hold control block, guard,
    /// userdata and the switch primitive's minimum depth
    StackTooSmall,

    /// Group capacity must be at least 1
    ZeroCapacity,

    /// Memory allocation/mapping failed
    MemoryError(MemoryError),
}

impl fmt::Display for CoroError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoroError::NoSlotsAvailable => write!(f, "no coroutine slots available"),
            CoroError::StackTooSmall => write!(f, "stack size too small for layout"),
            CoroError::ZeroCapacity => write!(f, "group capacity must be at least 1"),
            CoroError::MemoryError(e) => write!(f, "memory error: {}", e),
        }
    }
}

impl std::error::Error for CoroError {}

/// Memory-related errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// mmap (or the configured allocator) failed
    AllocationFailed,

    /// Requested block size overflows
    SizeOverflow,
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryError::AllocationFailed => write!(f, "stack memory allocation failed"),
            MemoryError::SizeOverflow => write!(f, "requested size overflows"),
        }
    }
}

impl From<MemoryError> for CoroError {
    fn from(e: MemoryError) -> Self {
        CoroError::MemoryError(e)
    }
}

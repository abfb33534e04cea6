//! Per-coroutine stack block layout
//!
//! Each coroutine owns exactly one contiguous, 16-byte-aligned block:
//!
//! ```text
//! low                                                          high
//! ┌──────────────┬──────────┬─────────────────────┬───────────────┐
//! │ userdata     │ guard    │ stack working space │ control block │
//! │ (rounded up) │ 2 words  │ grows downward  ←── │ 256 bytes     │
//! └──────────────┴──────────┴─────────────────────┴───────────────┘
//! ```
//!
//! The control block sits at the high end so the initial stack
//! pointer starts immediately below it. All offsets are computed once
//! here and validated against the caller's requested size; there is
//! no other pointer arithmetic over the block.

use crate::constants::{CONTROL_BLOCK_SIZE, GUARD_SIZE, STACK_ALIGN};
use crate::error::{CoroError, CoroResult};

/// Round `n` up to the stack alignment (16 bytes).
#[inline]
pub const fn round_up(n: usize) -> usize {
    (n + STACK_ALIGN - 1) & !(STACK_ALIGN - 1)
}

/// Byte layout of one coroutine's stack block.
///
/// Offsets are relative to the low end of the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackLayout {
    /// Total block size (the rounded-up requested stack size)
    pub total_size: usize,

    /// Rounded userdata area size; the area starts at offset 0
    pub userdata_size: usize,

    /// Offset of the guard record
    pub guard_offset: usize,

    /// Offset of the low end of the working stack space
    pub stack_offset: usize,

    /// Offset of the control block (= initial stack top)
    pub control_offset: usize,
}

impl StackLayout {
    /// Compute the layout for a requested stack size and userdata
    /// request.
    ///
    /// `min_switch_depth` is the context-switch primitive's deepest
    /// stack usage reachable before the first possible yield; the
    /// working space must hold at least that much. Returns
    /// `StackTooSmall` when the request cannot fit, which is a
    /// caller-visible precondition rather than a recoverable runtime
    /// path.
    pub fn compute(
        stack_size: usize,
        userdata_bytes: usize,
        min_switch_depth: usize,
    ) -> CoroResult<StackLayout> {
        let total_size = round_up(stack_size);
        let userdata_size = round_up(userdata_bytes);

        let reserved = userdata_size
            .checked_add(GUARD_SIZE)
            .and_then(|n| n.checked_add(CONTROL_BLOCK_SIZE))
            .and_then(|n| n.checked_add(min_switch_depth))
            .ok_or(CoroError::StackTooSmall)?;
        if total_size <= reserved {
            return Err(CoroError::StackTooSmall);
        }

        Ok(StackLayout {
            total_size,
            userdata_size,
            guard_offset: userdata_size,
            stack_offset: userdata_size + GUARD_SIZE,
            control_offset: total_size - CONTROL_BLOCK_SIZE,
        })
    }

    /// Usable working-stack bytes between guard and control block.
    #[inline]
    pub fn stack_space(&self) -> usize {
        self.control_offset - self.stack_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_up() {
        assert_eq!(round_up(0), 0);
        assert_eq!(round_up(1), 16);
        assert_eq!(round_up(16), 16);
        assert_eq!(round_up(17), 32);
    }

    #[test]
    fn test_layout_offsets() {
        let l = StackLayout::compute(4096, 24, 512).unwrap();
        assert_eq!(l.total_size, 4096);
        assert_eq!(l.userdata_size, 32); // 24 rounded up
        assert_eq!(l.guard_offset, 32);
        assert_eq!(l.stack_offset, 32 + GUARD_SIZE);
        assert_eq!(l.control_offset, 4096 - CONTROL_BLOCK_SIZE);
        assert!(l.stack_space() >= 512);
    }

    #[test]
    fn test_layout_no_userdata() {
        let l = StackLayout::compute(4096, 0, 512).unwrap();
        assert_eq!(l.userdata_size, 0);
        assert_eq!(l.guard_offset, 0);
        assert_eq!(l.stack_offset, GUARD_SIZE);
    }

    #[test]
    fn test_layout_rounds_request() {
        let l = StackLayout::compute(4000, 0, 512).unwrap();
        assert_eq!(l.total_size, 4000usize.next_multiple_of(16));
        assert_eq!(l.control_offset % 16, 0);
    }

    #[test]
    fn test_too_small_rejected() {
        // Exactly the reserved sum is still too small; the working
        // space must be strictly larger.
        let reserved = CONTROL_BLOCK_SIZE + GUARD_SIZE + 512;
        assert_eq!(
            StackLayout::compute(reserved, 0, 512),
            Err(CoroError::StackTooSmall)
        );
        assert!(StackLayout::compute(reserved + 16, 0, 512).is_ok());
    }

    #[test]
    fn test_oversized_userdata_rejected() {
        assert_eq!(
            StackLayout::compute(4096, 4096, 512),
            Err(CoroError::StackTooSmall)
        );
    }
}

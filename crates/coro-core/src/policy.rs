//! Scheduling policy
//!
//! Pure decision logic, separated from the switch machinery so it can
//! be tested without executing real context switches.
//!
//! The run cursor always names the first slot the next cycle-mode
//! scan will consider. Entering a coroutine (via `start`,
//! `start_cycle` or the scan itself resuming it) leaves the cursor
//! *at* that coroutine, so a coroutine that yields before the cursor
//! has moved past it is resumed again itself; once the scan advances
//! past it, its yields and its finish hand control onward. A scan is
//! a single forward pass from the cursor to the end of the slot list;
//! when it finds nothing runnable, control returns to main.

use crate::state::RunMode;

/// Identity of the party giving up control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    /// The group's main pseudo-coroutine (a `start_cycle` entry scan)
    Main,
    /// A real coroutine at this slot index
    Slot(u32),
}

/// Where control goes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Resume the coroutine at this slot index
    Resume(u32),
    /// Return to the main pseudo-coroutine (nothing else runnable)
    Main,
}

/// Compute the next coroutine to run.
///
/// `resumable(i)` reports whether slot `i` currently has a nonzero
/// saved-stack-pointer offset. Note that the *calling* coroutine
/// still looks resumable during its own yield (its offset is only
/// rewritten by the switch), which is what makes the cursor semantics
/// above work.
pub fn next_target(
    caller: Caller,
    mode: RunMode,
    cursor: &mut u32,
    count: u32,
    resumable: impl Fn(u32) -> bool,
) -> Decision {
    match caller {
        Caller::Main => {
            // Scan from the start for the first resumable slot.
            for i in 0..count {
                if resumable(i) {
                    *cursor = i;
                    return Decision::Resume(i);
                }
            }
            Decision::Main
        }
        Caller::Slot(_) if mode == RunMode::Step => Decision::Main,
        Caller::Slot(_) => {
            // Cycle mode: single forward pass from the cursor.
            for i in *cursor..count {
                if resumable(i) {
                    *cursor = i + 1;
                    return Decision::Resume(i);
                }
            }
            Decision::Main
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live(slots: &[bool]) -> impl Fn(u32) -> bool + '_ {
        move |i| slots[i as usize]
    }

    #[test]
    fn test_main_scan_finds_first_live() {
        let slots = [false, true, true];
        let mut cursor = 0;
        let d = next_target(Caller::Main, RunMode::Cycle, &mut cursor, 3, live(&slots));
        assert_eq!(d, Decision::Resume(1));
        assert_eq!(cursor, 1);
    }

    #[test]
    fn test_main_scan_empty_group() {
        let slots = [false, false];
        let mut cursor = 0;
        let d = next_target(Caller::Main, RunMode::Cycle, &mut cursor, 2, live(&slots));
        assert_eq!(d, Decision::Main);
    }

    #[test]
    fn test_step_mode_always_returns_to_main() {
        let slots = [true, true];
        let mut cursor = 0;
        let d = next_target(Caller::Slot(0), RunMode::Step, &mut cursor, 2, live(&slots));
        assert_eq!(d, Decision::Main);
        assert_eq!(cursor, 0);
    }

    #[test]
    fn test_cycle_first_yield_resumes_self() {
        // Cursor still at the yielding coroutine: its own slot is the
        // first hit of the scan.
        let slots = [true, true];
        let mut cursor = 0;
        let d = next_target(Caller::Slot(0), RunMode::Cycle, &mut cursor, 2, live(&slots));
        assert_eq!(d, Decision::Resume(0));
        assert_eq!(cursor, 1);
    }

    #[test]
    fn test_cycle_advances_to_next_live() {
        let slots = [true, true];
        let mut cursor = 1;
        let d = next_target(Caller::Slot(0), RunMode::Cycle, &mut cursor, 2, live(&slots));
        assert_eq!(d, Decision::Resume(1));
        assert_eq!(cursor, 2);
    }

    #[test]
    fn test_cycle_skips_finished_slots() {
        let slots = [true, false, true];
        let mut cursor = 1;
        let d = next_target(Caller::Slot(0), RunMode::Cycle, &mut cursor, 3, live(&slots));
        assert_eq!(d, Decision::Resume(2));
        assert_eq!(cursor, 3);
    }

    #[test]
    fn test_cycle_no_wraparound() {
        // Slot 0 is still suspended but behind the cursor; a single
        // forward pass does not wrap, so control returns to main.
        let slots = [true, false];
        let mut cursor = 1;
        let d = next_target(Caller::Slot(1), RunMode::Cycle, &mut cursor, 2, live(&slots));
        assert_eq!(d, Decision::Main);
    }

    #[test]
    fn test_cycle_round_robin_order() {
        // Three live coroutines; repeated triggers walk 0, 1, 2 then
        // fall back to main.
        let slots = [true, true, true];
        let mut cursor = 0;
        let mut order = vec![];
        loop {
            match next_target(Caller::Slot(0), RunMode::Cycle, &mut cursor, 3, live(&slots)) {
                Decision::Resume(i) => order.push(i),
                Decision::Main => break,
            }
        }
        assert_eq!(order, vec![0, 1, 2]);
    }
}

//! End-to-end scheduling tests over real context switches.

use std::cell::{Cell, RefCell};
use std::ffi::c_void;
use std::rc::Rc;

use coro::{CoroState, UserdataMode};

const STACK: usize = 64 * 1024;

type Log = Rc<RefCell<Vec<String>>>;

fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

fn push(log: &Log, s: &str) {
    log.borrow_mut().push(s.to_string());
}

#[test]
fn test_step_round_trip() {
    let trace = log();
    let group = coro::group_init(1).unwrap();
    let t = trace.clone();
    let c = group
        .create(STACK, move |co| {
            push(&t, "first");
            let live = co.yield_now();
            push(&t, &format!("resumed:{}", live));
        })
        .unwrap();

    assert_eq!(c.state(), CoroState::Suspended);
    assert!(group.start(0));
    assert_eq!(*trace.borrow(), ["first"]);
    assert_eq!(c.state(), CoroState::Suspended);

    assert!(group.start(0));
    // A step-mode yield hands control to the caller, which is always
    // live.
    assert_eq!(*trace.borrow(), ["first", "resumed:true"]);
    assert_eq!(c.state(), CoroState::Finished);

    assert!(!group.start(0));
    assert_eq!(trace.borrow().len(), 2);
}

#[test]
fn test_step_targets_chosen_slot_only() {
    let trace = log();
    let group = coro::group_init(2).unwrap();
    for name in ["a", "b"] {
        let t = trace.clone();
        let name = name.to_string();
        group
            .create(STACK, move |co| {
                push(&t, &format!("{}:0", name));
                co.yield_now();
                push(&t, &format!("{}:1", name));
            })
            .unwrap();
    }

    assert!(group.start(1));
    assert_eq!(*trace.borrow(), ["b:0"]);
    assert!(group.start(0));
    assert_eq!(*trace.borrow(), ["b:0", "a:0"]);
    assert!(group.start(1));
    assert_eq!(*trace.borrow(), ["b:0", "a:0", "b:1"]);
}

#[test]
fn test_cycle_round_robin_order() {
    let trace = log();
    let group = coro::group_init(2).unwrap();

    let t = trace.clone();
    group
        .create(STACK, move |co| {
            push(&t, "a:start");
            co.yield_now();
            push(&t, "a:end");
        })
        .unwrap();
    let t = trace.clone();
    group
        .create(STACK, move |_| {
            push(&t, "b");
        })
        .unwrap();

    assert!(group.start_cycle());
    // The first coroutine's early yield resumes itself (the cycle
    // cursor has not passed it yet), then its finish hands control to
    // the second, whose finish ends the pass.
    assert_eq!(*trace.borrow(), ["a:start", "a:end", "b"]);

    // Everything finished; another cycle finds nothing to run.
    assert!(!group.start_cycle());
}

#[test]
fn test_cycle_continues_across_calls() {
    let trace = log();
    let group = coro::group_init(2).unwrap();
    for name in ["a", "b"] {
        let t = trace.clone();
        let name = name.to_string();
        group
            .create(STACK, move |co| {
                push(&t, &format!("{}:0", name));
                co.yield_now();
                push(&t, &format!("{}:1", name));
            })
            .unwrap();
    }

    assert!(group.start_cycle());
    // a self-resumes past its yield and finishes; b runs to its yield
    // and the forward pass ends without wrapping around.
    assert_eq!(*trace.borrow(), ["a:0", "a:1", "b:0"]);

    assert!(group.start_cycle());
    assert_eq!(*trace.borrow(), ["a:0", "a:1", "b:0", "b:1"]);

    assert!(!group.start_cycle());
}

#[test]
fn test_yield_reports_liveness_of_next_party() {
    let results = Rc::new(RefCell::new(Vec::new()));
    let group = coro::group_init(2).unwrap();

    let r = results.clone();
    group
        .create(STACK, move |co| {
            // First yield self-resumes (cursor still at this slot).
            r.borrow_mut().push(co.yield_now());
            // Second yield runs the neighbor to completion before
            // this coroutine is seen again.
            r.borrow_mut().push(co.yield_now());
        })
        .unwrap();
    group.create(STACK, |_| {}).unwrap();

    assert!(group.start_cycle());
    assert_eq!(*results.borrow(), [true]);

    // The neighbor finished during the first cycle; resuming the
    // yielder now reports that the party it yielded to is gone.
    assert!(group.start_cycle());
    assert_eq!(*results.borrow(), [true, false]);
}

#[test]
fn test_finish_then_reload_reuses_slot() {
    let trace = log();
    let group = coro::group_init(1).unwrap();

    let t = trace.clone();
    group.create(STACK, move |_| push(&t, "one")).unwrap();
    assert!(group.start(0));
    assert_eq!(group.get(0).unwrap().state(), CoroState::Finished);

    // Reload is rejected while suspended, accepted once finished.
    let t = trace.clone();
    assert!(group.reload(0, move |_| push(&t, "two")));
    assert_eq!(group.get(0).unwrap().state(), CoroState::Suspended);
    let t = trace.clone();
    assert!(!group.reload(0, move |_| push(&t, "never")));

    assert!(group.start(0));
    assert_eq!(*trace.borrow(), ["one", "two"]);
}

#[test]
fn test_userdata_just_pointer_round_trip() {
    let shared = Box::new(Cell::new(0u32));
    let ptr = &*shared as *const Cell<u32> as *mut c_void;

    let group = coro::group_init(1).unwrap();
    group
        .ext_create(STACK, 0, UserdataMode::JustPointer(ptr), |co| {
            let cell = unsafe { &*(co.userdata() as *const Cell<u32>) };
            cell.set(cell.get() + 41);
        })
        .unwrap();

    assert_eq!(group.get(0).unwrap().userdata(), ptr);
    assert!(group.start(0));
    assert_eq!(shared.get(), 41);
}

#[test]
fn test_userdata_seeded_buffer() {
    let seed = 0x5EEDusize as *mut c_void;
    let group = coro::group_init(1).unwrap();
    let c = group
        .ext_create(STACK, 64, UserdataMode::SeedPointer(seed), move |co| {
            let buf = co.userdata() as *mut usize;
            unsafe {
                assert_eq!(buf.read(), 0x5EED);
                buf.add(1).write(7);
            }
        })
        .unwrap();

    assert!(group.start(0));
    let buf = c.userdata() as *const usize;
    assert_eq!(unsafe { buf.add(1).read() }, 7);
}

#[test]
fn test_capacity_exhaustion() {
    let group = coro::group_init(2).unwrap();
    group.create(STACK, |_| {}).unwrap();
    group.create(STACK, |_| {}).unwrap();
    assert!(matches!(
        group.create(STACK, |_| {}),
        Err(coro::CoroError::NoSlotsAvailable)
    ));
    // Existing coroutines are untouched and still run.
    assert!(group.start_cycle());
}

#[test]
fn test_running_state_visible_inside() {
    let group = coro::group_init(1).unwrap();
    let c = group
        .create(STACK, |co| {
            assert_eq!(co.state(), CoroState::Running);
            assert_eq!(co.index(), 0);
        })
        .unwrap();
    assert!(group.start(0));
    assert_eq!(c.state(), CoroState::Finished);
}

#[test]
fn test_unlaunched_proc_dropped_on_teardown() {
    let marker = Rc::new(());
    {
        let group = coro::group_init(1).unwrap();
        let m = marker.clone();
        group
            .create(STACK, move |_| {
                let _keep = &m;
            })
            .unwrap();
        assert_eq!(Rc::strong_count(&marker), 2);
        // Dropped without ever running.
    }
    assert_eq!(Rc::strong_count(&marker), 1);
}

#[test]
fn test_group_in_caller_storage() {
    let mut buf = vec![0u8; coro::group_alloc_size(2) + 16];
    let base = {
        let p = buf.as_mut_ptr() as usize;
        ((p + 15) & !15) as *mut u8
    };
    let group = unsafe { &*coro::group_init_inplace(base, 2).unwrap() };

    let trace = log();
    let t = trace.clone();
    group.create(STACK, move |_| push(&t, "ran")).unwrap();
    assert!(group.start(0));
    assert_eq!(*trace.borrow(), ["ran"]);
    group.finish();
}

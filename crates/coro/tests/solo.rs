//! Single-coroutine wrapper used as a resumable generator.

use std::cell::RefCell;
use std::rc::Rc;

use coro::{Solo, UserdataMode};

const STACK: usize = 64 * 1024;

#[test]
fn test_generator_steps() {
    let solo = Solo::ext_new(STACK, 16, UserdataMode::Keep, |co| {
        let out = co.userdata() as *mut u64;
        for i in 1..=3u64 {
            unsafe { out.write(i * 10) };
            co.yield_now();
        }
    })
    .unwrap();

    let out = solo.userdata() as *const u64;
    for expected in [10, 20, 30] {
        assert!(solo.step());
        assert_eq!(unsafe { out.read() }, expected);
        assert!(!solo.is_finished());
    }

    // The loop is exhausted; one more step runs it to completion.
    assert!(solo.step());
    assert!(solo.is_finished());
    assert!(!solo.step());
}

#[test]
fn test_reload_restarts_generator() {
    let trace: Rc<RefCell<Vec<u32>>> = Rc::new(RefCell::new(Vec::new()));

    let t = trace.clone();
    let solo = Solo::new(STACK, move |_| t.borrow_mut().push(1)).unwrap();
    assert!(solo.step());
    assert!(solo.is_finished());

    let t = trace.clone();
    assert!(solo.reload(move |_| t.borrow_mut().push(2)));
    assert!(!solo.is_finished());
    assert!(solo.step());
    assert_eq!(*trace.borrow(), [1, 2]);
}

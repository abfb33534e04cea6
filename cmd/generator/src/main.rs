//! Generator example
//!
//! A single stepped coroutine producing Fibonacci numbers through its
//! userdata buffer, restarted once via reload.

use coro::{Solo, UserdataMode};

fn fibs(limit: u64) -> impl FnOnce(coro::Coro) + 'static {
    move |co| {
        let out = co.userdata() as *mut u64;
        let (mut a, mut b) = (0u64, 1u64);
        while a <= limit {
            unsafe { out.write(a) };
            co.yield_now();
            (a, b) = (b, a + b);
        }
    }
}

fn drain(solo: &Solo) {
    let out = solo.userdata() as *const u64;
    while solo.step() {
        if solo.is_finished() {
            break;
        }
        print!("{} ", unsafe { out.read() });
    }
    println!();
}

fn main() {
    let solo = Solo::ext_new(
        coro::default_stack_size(),
        std::mem::size_of::<u64>(),
        UserdataMode::Keep,
        fibs(100),
    )
    .expect("generator allocation");

    println!("fibonacci up to 100:");
    drain(&solo);

    // The finished slot and its stack are reused in place.
    assert!(solo.reload(fibs(1000)));
    println!("fibonacci up to 1000:");
    drain(&solo);
}

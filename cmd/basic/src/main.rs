//! Basic coroutine example
//!
//! Three coroutines in one group, driven round-robin with
//! `start_cycle` until everything has finished.
//!
//! # Environment Variables
//!
//! - `CORO_LOG_LEVEL=trace` - Show switch-path events
//! - `CORO_STACK_SIZE=<bytes>` - Override the default stack size

// CORO_LOG_LEVEL=trace cargo run -p coro-basic
fn main() {
    println!("=== coro basic example ===\n");

    let group = coro::group_init(8).expect("group allocation");
    let stack = coro::default_stack_size();

    for name in ["red", "green", "blue"] {
        group
            .create(stack, move |co| {
                for round in 0..3 {
                    println!("[{}] slot {} round {}", name, co.index(), round);
                    co.yield_now();
                }
                println!("[{}] done", name);
            })
            .expect("coroutine allocation");
    }

    let mut cycles = 0;
    while group.start_cycle() {
        cycles += 1;
        println!("-- cycle {} returned to main --", cycles);
    }

    println!("\n=== all coroutines finished after {} cycles ===", cycles);
}

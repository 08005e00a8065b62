//! Sleep wake ordering: a thread sleeping N quanta is re-eligible no
//! earlier than N+1 dispatches later.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

static BEFORE: AtomicU64 = AtomicU64::new(0);
static AFTER: AtomicU64 = AtomicU64::new(0);
static DONE: AtomicBool = AtomicBool::new(false);

fn sleeper() {
    BEFORE.store(timeslice::total_quanta(), Ordering::SeqCst);
    timeslice::sleep(3).unwrap();
    AFTER.store(timeslice::total_quanta(), Ordering::SeqCst);
    DONE.store(true, Ordering::SeqCst);
    loop {
        std::hint::spin_loop();
    }
}

fn main() {
    timeslice::init(Duration::from_micros(1000)).unwrap();
    timeslice::spawn(sleeper).unwrap();

    while !DONE.load(Ordering::SeqCst) {
        std::hint::spin_loop();
    }

    let before = BEFORE.load(Ordering::SeqCst);
    let after = AFTER.load(Ordering::SeqCst);
    assert!(
        after - before >= 4,
        "slept 3 quanta but only {} dispatches passed",
        after - before
    );

    timeslice::terminate(0).unwrap();
}

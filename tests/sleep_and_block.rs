//! Double state: a sleeping thread that gets blocked stays suspended
//! after its sleep expires, until it is resumed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

static AWAKE: AtomicBool = AtomicBool::new(false);

fn napper() {
    timeslice::sleep(5).unwrap();
    AWAKE.store(true, Ordering::SeqCst);
    loop {
        std::hint::spin_loop();
    }
}

fn main() {
    timeslice::init(Duration::from_micros(1000)).unwrap();
    let t1 = timeslice::spawn(napper).unwrap();

    // Wait for it to reach its sleep.
    while timeslice::stats().unwrap().sleeping == 0 {
        std::hint::spin_loop();
    }

    timeslice::block(t1).unwrap();
    let s = timeslice::stats().unwrap();
    assert_eq!(s.sleeping, 1, "blocking must not cancel the sleep");
    assert_eq!(s.blocked, 1);
    let frozen = timeslice::quanta_of(t1).unwrap();

    // Outlive the sleep by a comfortable margin.
    let base = timeslice::total_quanta();
    while timeslice::total_quanta() < base + 8 {
        std::hint::spin_loop();
    }

    let s = timeslice::stats().unwrap();
    assert_eq!(s.sleeping, 0, "the sleep never expired");
    assert_eq!(s.blocked, 1, "the expired sleeper lost its block");
    assert!(!AWAKE.load(Ordering::SeqCst));
    assert_eq!(timeslice::quanta_of(t1).unwrap(), frozen);

    timeslice::resume(t1).unwrap();
    while !AWAKE.load(Ordering::SeqCst) {
        std::hint::spin_loop();
    }
    assert!(timeslice::quanta_of(t1).unwrap() > frozen);

    timeslice::terminate(0).unwrap();
}

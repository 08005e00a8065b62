//! Id allocation: smallest-first, exhaustion at the thread limit, and
//! recycling of terminated ids. A long quantum keeps the whole scenario
//! inside the bootstrap thread's first quantum.

use std::time::Duration;

use timeslice::{ThreadError, MAX_THREADS};

fn parked() {
    loop {
        std::hint::spin_loop();
    }
}

fn main() {
    timeslice::init(Duration::from_millis(100)).unwrap();

    for expected in 1..MAX_THREADS {
        assert_eq!(timeslice::spawn(parked).unwrap(), expected);
    }
    assert!(matches!(
        timeslice::spawn(parked),
        Err(ThreadError::ThreadLimitReached { .. })
    ));

    // Freeing any id makes room for exactly one more spawn, and the
    // smallest free id is handed out first.
    timeslice::terminate(1).unwrap();
    assert_eq!(timeslice::spawn(parked).unwrap(), 1);
    assert!(matches!(
        timeslice::spawn(parked),
        Err(ThreadError::ThreadLimitReached { .. })
    ));

    timeslice::terminate(0).unwrap();
}

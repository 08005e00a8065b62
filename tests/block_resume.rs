//! Block freezes a thread's quantum count; resume lets it climb again.

use std::time::Duration;

fn spin() {
    loop {
        std::hint::spin_loop();
    }
}

fn main() {
    timeslice::init(Duration::from_micros(1000)).unwrap();
    let t1 = timeslice::spawn(spin).unwrap();

    // Let it run at least once.
    while timeslice::quanta_of(t1).unwrap() < 1 {
        std::hint::spin_loop();
    }

    timeslice::block(t1).unwrap();
    let frozen = timeslice::quanta_of(t1).unwrap();

    // Several more dispatches happen; the blocked thread gets none of them.
    let base = timeslice::total_quanta();
    while timeslice::total_quanta() < base + 4 {
        std::hint::spin_loop();
    }
    assert_eq!(
        timeslice::quanta_of(t1).unwrap(),
        frozen,
        "a blocked thread kept running"
    );

    timeslice::resume(t1).unwrap();
    while timeslice::quanta_of(t1).unwrap() <= frozen {
        std::hint::spin_loop();
    }

    timeslice::terminate(0).unwrap();
}

//! Round-robin fairness: two spinning threads split the CPU evenly.

use std::time::Duration;

fn spin() {
    loop {
        std::hint::spin_loop();
    }
}

fn main() {
    timeslice::init(Duration::from_micros(1000)).unwrap();
    let t1 = timeslice::spawn(spin).unwrap();
    let t2 = timeslice::spawn(spin).unwrap();

    // Let the rotation run for a handful of quanta.
    while timeslice::total_quanta() < 8 {
        std::hint::spin_loop();
    }

    let q1 = timeslice::quanta_of(t1).unwrap();
    let q2 = timeslice::quanta_of(t2).unwrap();
    let boot = timeslice::quanta_of(0).unwrap();

    // Strict FIFO rotation keeps the two spinners within one quantum of
    // each other at any observation point.
    assert!(
        q1.abs_diff(q2) <= 1,
        "unfair rotation: thread {} ran {} quanta, thread {} ran {}",
        t1,
        q1,
        t2,
        q2
    );
    assert!(q1 + q2 >= 2, "spinners never got the CPU");
    assert!(boot + q1 + q2 >= 5);

    timeslice::terminate(0).unwrap();
}

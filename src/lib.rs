//! timeslice - preemptive user-level threading
//!
//! Multiplexes many logical threads over one kernel thread. A
//! virtual-CPU-time timer delivers a preemption signal every quantum; the
//! dispatcher saves the interrupted thread's machine context and resumes
//! the next READY thread, rotating the CPU in strict round-robin order.
//! Threads can also give the CPU up synchronously by blocking, sleeping,
//! or terminating themselves.
//!
//! The calling thread becomes thread 0 (the bootstrap thread) at `init`
//! and keeps running on the native process stack; every spawned thread
//! gets its own heap-allocated stack. Thread 0 can never be blocked or
//! put to sleep, so there is always a runnable thread.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! fn worker() {
//!     loop {
//!         // preempted transparently every quantum
//!     }
//! }
//!
//! timeslice::init(Duration::from_micros(1000)).unwrap();
//! let tid = timeslice::spawn(worker).unwrap();
//! timeslice::block(tid).unwrap();
//! timeslice::resume(tid).unwrap();
//! timeslice::terminate(0).unwrap(); // exits the process
//! ```
//!
//! The library owns `SIGVTALRM` and the process virtual timer; user code
//! must not install a competing handler or unmask decisions of its own
//! for that signal.

mod context;
mod signal;
mod stack;
mod timer;

pub mod error;
pub mod sched;

pub use error::{ThreadError, ThreadResult};
pub use sched::{
    block, current_tid, init, quanta_of, resume, sleep, spawn, stats, terminate, total_quanta,
    SchedulerStats, ThreadState,
};

/// Thread identifier. Ids live in `[0, MAX_THREADS)`.
pub type Tid = usize;

/// Id of the bootstrap thread: the one that called `init`.
pub const BOOTSTRAP_TID: Tid = 0;

/// Maximum number of live threads, the bootstrap thread included.
pub const MAX_THREADS: usize = 100;

/// Stack size of every spawned thread, in bytes.
pub const STACK_SIZE: usize = 64 * 1024;

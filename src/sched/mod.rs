//! Scheduler core
//!
//! The process-wide scheduler singleton: thread registry, scheduling
//! queues, id allocator, quantum timer, and the dispatcher that rotates
//! the CPU among READY threads in round-robin order.
//!
//! Mutation discipline: the only mutators are the public operations
//! (running on the caller's stack) and the preemption handler. Both hold
//! the preemption signal masked for the whole mutation, so the scheduler
//! lock is never contended and the handler can never interrupt a lock
//! holder.

mod ids;
mod queue;
mod tcb;

pub use tcb::ThreadState;

use std::process;
use std::time::Duration;

use hashbrown::HashMap;
use spin::Mutex;

use crate::context::MachineContext;
use crate::error::{ThreadError, ThreadResult};
use crate::signal::{self, SignalGuard};
use crate::timer::QuantumTimer;
use crate::{Tid, BOOTSTRAP_TID, MAX_THREADS};

use ids::IdAllocator;
use queue::RunQueues;
use tcb::Tcb;

/// Scheduler state behind the singleton lock.
struct Scheduler {
    /// Registry of live threads. Membership here is the one and only
    /// existence predicate for a thread id.
    tcbs: HashMap<Tid, Tcb>,
    queues: RunQueues,
    ids: IdAllocator,
    timer: QuantumTimer,
    /// Id of the thread holding the CPU.
    current: Tid,
    /// Dispatches since init, the bootstrap thread's first quantum included.
    quantum_counter: u64,
    /// Quanta accounted to threads that have since been reaped.
    retired_quanta: u64,
    /// A thread that terminated itself this quantum. Its stack is still
    /// the executing one until the dispatcher switches away.
    dying: Option<Tcb>,
    /// Corpse parked across the last switch; dropped at the next dispatch,
    /// which runs on a different stack.
    zombie: Option<Tcb>,
}

static SCHEDULER: Mutex<Option<Scheduler>> = Mutex::new(None);

impl Scheduler {
    /// Burn one quantum of sleep on every sleeper and move the expired
    /// ones along: SLEEPING wakes to the READY tail, SLEEPING_AND_BLOCKED
    /// stays parked on the BLOCKED queue it already sits on.
    fn wake_sleepers(&mut self) {
        let mut expired = Vec::new();
        for tid in self.queues.sleeping() {
            let tcb = self
                .tcbs
                .get_mut(&tid)
                .expect("sleeping ids are always registered");
            if tcb.tick_sleep() {
                expired.push(tid);
            }
        }
        for tid in expired {
            self.queues.remove_sleeping(tid);
            let tcb = self
                .tcbs
                .get_mut(&tid)
                .expect("sleeping ids are always registered");
            match tcb.state() {
                ThreadState::Sleeping => {
                    tcb.set_state(ThreadState::Ready);
                    self.queues.enqueue_ready(tid);
                }
                ThreadState::SleepingAndBlocked => {
                    tcb.set_state(ThreadState::Blocked);
                }
                state => unreachable!("thread {} slept in state {}", tid, state),
            }
        }
    }

    #[cfg(debug_assertions)]
    fn assert_quanta_ledger(&self) {
        let live: u64 = self.tcbs.values().map(Tcb::quanta_run).sum();
        debug_assert_eq!(
            self.quantum_counter,
            self.retired_quanta + live,
            "quantum ledger out of balance"
        );
    }
}

/// The preemption signal handler. The kernel masks the signal for the
/// duration of the handler, which is the masking the dispatcher requires.
extern "C" fn preempt_handler(_signal: libc::c_int) {
    dispatch();
}

/// Suspend the current thread and resume the next READY one.
///
/// Entered from the timer signal, or synchronously from a thread that
/// just blocked itself, went to sleep, or terminated itself. Callers must
/// hold the preemption signal masked; this returns (into the suspended
/// operation) when the outgoing thread is next dispatched, and does not
/// return at all when the outgoing thread is dead.
///
/// No logging happens here: the handler path runs at signal time, where
/// logger locks are off limits.
fn dispatch() {
    // Raw pointers so no registry borrow is held across the switch. The
    // boxes they point into stay alive: the registry owns the incoming
    // context, and the outgoing one is owned by the registry or parked in
    // the zombie slot.
    let outgoing: Option<*mut libc::ucontext_t>;
    let incoming: *const libc::ucontext_t;

    {
        let mut slot = SCHEDULER.lock();
        let sched = match slot.as_mut() {
            Some(sched) => sched,
            None => return,
        };

        // The corpse parked across the previous switch sits on a stack
        // nobody executes anymore; this dispatch runs on a live one.
        let _reaped = sched.zombie.take();

        if let Some(corpse) = sched.dying.take() {
            sched.retired_quanta += corpse.quanta_run();
            sched.zombie = Some(corpse);
            outgoing = None;
        } else {
            let cur = sched.current;
            let tcb = sched
                .tcbs
                .get_mut(&cur)
                .expect("the running thread is always registered");
            match tcb.state() {
                ThreadState::Running => {
                    tcb.set_state(ThreadState::Ready);
                    sched.queues.enqueue_ready(cur);
                }
                ThreadState::Blocked
                | ThreadState::Sleeping
                | ThreadState::SleepingAndBlocked => {
                    // Parked on its queue at transition time; nothing to do.
                }
                state => unreachable!("thread {} entered dispatch in state {}", cur, state),
            }
            outgoing = Some(tcb.context_mut().as_raw());
        }

        sched.wake_sleepers();

        let next = sched
            .queues
            .next_ready()
            .expect("the ready queue never drains: the bootstrap thread is always runnable");
        sched.current = next;
        sched.quantum_counter += 1;
        let tcb = sched
            .tcbs
            .get_mut(&next)
            .expect("ready ids are always registered");
        tcb.set_state(ThreadState::Running);
        tcb.record_quantum();
        incoming = tcb.context_mut().as_raw();

        // Fresh quantum for the incoming thread, however long this tick took.
        sched.timer.arm();

        #[cfg(debug_assertions)]
        sched.assert_quanta_ledger();
    }

    unsafe {
        match outgoing {
            Some(from) => MachineContext::swap(from, incoming),
            None => MachineContext::activate(incoming),
        }
    }
}

/// First code every spawned thread runs. Fetches the entry function out
/// of the control block, runs it, and terminates the thread if it returns.
extern "C" fn thread_trampoline() {
    let entry = {
        let _guard = SignalGuard::new();
        let mut slot = SCHEDULER.lock();
        let sched = slot
            .as_mut()
            .expect("threads only run while the scheduler is live");
        let cur = sched.current;
        sched
            .tcbs
            .get_mut(&cur)
            .expect("the running thread is always registered")
            .take_entry()
            .expect("spawned threads carry an entry function")
    };
    entry();
    let _ = terminate(current_tid());
    unreachable!("a terminated thread cannot be rescheduled");
}

/// Bring the library up: install the bootstrap thread as id 0 (RUNNING,
/// one quantum on the books), claim the preemption signal, and arm the
/// quantum timer.
///
/// Fails on a zero-length quantum or when already initialized. Handler
/// and timer installation failures are system errors and terminate the
/// process.
pub fn init(quantum: Duration) -> ThreadResult<()> {
    let _guard = SignalGuard::new();

    let usecs = quantum.as_micros();
    if usecs == 0 {
        return Err(ThreadError::InvalidQuantum.reported());
    }
    let usecs = u64::try_from(usecs).unwrap_or(u64::MAX);

    let mut slot = SCHEDULER.lock();
    if slot.is_some() {
        return Err(ThreadError::AlreadyInitialized.reported());
    }

    let mut sched = Scheduler {
        tcbs: HashMap::new(),
        queues: RunQueues::new(),
        ids: IdAllocator::new(MAX_THREADS),
        timer: QuantumTimer::new(usecs),
        current: BOOTSTRAP_TID,
        quantum_counter: 1,
        retired_quanta: 0,
        dying: None,
        zombie: None,
    };
    let mut bootstrap = Tcb::bootstrap();
    bootstrap.record_quantum();
    sched.tcbs.insert(BOOTSTRAP_TID, bootstrap);

    signal::install_handler(preempt_handler);
    sched.timer.arm();
    let quantum_usecs = sched.timer.quantum_usecs();
    *slot = Some(sched);

    log::info!("thread library initialized, quantum {} us", quantum_usecs);
    Ok(())
}

/// Create a thread running `entry` and place it at the READY tail.
///
/// The new thread gets the smallest free id and a fresh stack of
/// `STACK_SIZE` bytes. Fails when every id is in use.
pub fn spawn(entry: fn()) -> ThreadResult<Tid> {
    let _guard = SignalGuard::new();
    let mut slot = SCHEDULER.lock();
    let sched = slot
        .as_mut()
        .ok_or_else(|| ThreadError::NotInitialized.reported())?;

    let tid = sched.ids.allocate().ok_or_else(|| {
        ThreadError::ThreadLimitReached { max: MAX_THREADS }.reported()
    })?;

    let mut tcb = Tcb::spawned(tid, entry);
    tcb.prime(thread_trampoline);
    sched.tcbs.insert(tid, tcb);
    sched.queues.enqueue_ready(tid);

    log::debug!("spawned thread {}", tid);
    Ok(tid)
}

/// Terminate a thread.
///
/// `terminate(0)` destroys every thread and exits the process with
/// status 0. Terminating the calling thread does not return; control
/// passes to the next READY thread. Terminating any other thread takes
/// effect before the call returns.
pub fn terminate(tid: Tid) -> ThreadResult<()> {
    let _guard = SignalGuard::new();

    if tid == BOOTSTRAP_TID {
        let mut slot = SCHEDULER.lock();
        let mut sched = match slot.take() {
            Some(sched) => sched,
            None => return Err(ThreadError::NotInitialized.reported()),
        };
        log::info!("thread {} requested process exit", sched.current);
        // Drop every control block except the caller's own: the caller
        // may be executing on the stack its block owns. Process exit
        // reclaims the rest.
        let current = sched.current;
        sched.tcbs.retain(|&id, _| id == current);
        process::exit(0);
    }

    let self_terminate = {
        let mut slot = SCHEDULER.lock();
        let sched = slot
            .as_mut()
            .ok_or_else(|| ThreadError::NotInitialized.reported())?;

        let mut tcb = match sched.tcbs.remove(&tid) {
            Some(tcb) => tcb,
            None => return Err(ThreadError::UnknownThread { tid }.reported()),
        };
        tcb.set_state(ThreadState::Terminated);
        sched.ids.release(tid);

        if tid == sched.current {
            // The reap happens at the dispatch below; the stack under our
            // feet must survive until the switch completes.
            sched.dying = Some(tcb);
            true
        } else {
            sched.queues.discard(tid);
            sched.retired_quanta += tcb.quanta_run();
            log::debug!("terminated thread {}", tcb.id());
            false
        }
    };

    if self_terminate {
        dispatch();
        unreachable!("a terminated thread cannot be rescheduled");
    }
    Ok(())
}

/// Suspend a thread until `resume` is called on it.
///
/// Blocking the calling thread yields the CPU and returns only after a
/// full block/resume cycle. Blocking an already blocked thread is a
/// no-op; blocking a sleeping thread leaves it sleeping and blocked at
/// once. The bootstrap thread cannot be blocked.
pub fn block(tid: Tid) -> ThreadResult<()> {
    let _guard = SignalGuard::new();

    let self_block = {
        let mut slot = SCHEDULER.lock();
        let sched = slot
            .as_mut()
            .ok_or_else(|| ThreadError::NotInitialized.reported())?;

        if tid == BOOTSTRAP_TID {
            return Err(ThreadError::BootstrapBlocked.reported());
        }
        let tcb = match sched.tcbs.get_mut(&tid) {
            Some(tcb) => tcb,
            None => return Err(ThreadError::UnknownThread { tid }.reported()),
        };

        match tcb.state() {
            // The running thread is necessarily the caller.
            ThreadState::Running => {
                tcb.set_state(ThreadState::Blocked);
                sched.queues.enqueue_blocked(tid);
                true
            }
            ThreadState::Ready => {
                tcb.set_state(ThreadState::Blocked);
                sched.queues.remove_ready(tid);
                sched.queues.enqueue_blocked(tid);
                false
            }
            ThreadState::Sleeping => {
                tcb.set_state(ThreadState::SleepingAndBlocked);
                sched.queues.enqueue_blocked(tid);
                false
            }
            ThreadState::Blocked | ThreadState::SleepingAndBlocked => false,
            state => unreachable!("thread {} blocked in state {}", tid, state),
        }
    };

    if self_block {
        dispatch();
    }
    Ok(())
}

/// Make a blocked thread eligible again.
///
/// A blocked thread moves to the READY tail; a sleeping-and-blocked
/// thread goes back to plain sleeping. Resuming a thread that is not
/// blocked is a no-op.
pub fn resume(tid: Tid) -> ThreadResult<()> {
    let _guard = SignalGuard::new();
    let mut slot = SCHEDULER.lock();
    let sched = slot
        .as_mut()
        .ok_or_else(|| ThreadError::NotInitialized.reported())?;

    let tcb = match sched.tcbs.get_mut(&tid) {
        Some(tcb) => tcb,
        None => return Err(ThreadError::UnknownThread { tid }.reported()),
    };

    match tcb.state() {
        ThreadState::Blocked => {
            tcb.set_state(ThreadState::Ready);
            sched.queues.remove_blocked(tid);
            sched.queues.enqueue_ready(tid);
        }
        ThreadState::SleepingAndBlocked => {
            tcb.set_state(ThreadState::Sleeping);
            sched.queues.remove_blocked(tid);
        }
        ThreadState::Ready | ThreadState::Running | ThreadState::Sleeping => {}
        state => unreachable!("thread {} resumed in state {}", tid, state),
    }
    Ok(())
}

/// Put the calling thread to sleep for `quanta` quanta.
///
/// The thread is suspended for the remainder of the current quantum plus
/// `quanta` full ones; it becomes eligible again afterwards and this
/// returns once it is rescheduled. `sleep(0)` is a no-op that does not
/// yield the CPU. The bootstrap thread cannot sleep.
pub fn sleep(quanta: u64) -> ThreadResult<()> {
    let _guard = SignalGuard::new();

    if quanta == 0 {
        return Ok(());
    }

    {
        let mut slot = SCHEDULER.lock();
        let sched = slot
            .as_mut()
            .ok_or_else(|| ThreadError::NotInitialized.reported())?;

        let cur = sched.current;
        if cur == BOOTSTRAP_TID {
            return Err(ThreadError::BootstrapSleep.reported());
        }
        let tcb = sched
            .tcbs
            .get_mut(&cur)
            .expect("the running thread is always registered");
        tcb.set_state(ThreadState::Sleeping);
        // The current, partially used quantum counts as the first one.
        tcb.begin_sleep(quanta.saturating_add(1));
        sched.queues.enqueue_sleeping(cur);
    }

    dispatch();
    Ok(())
}

/// Id of the running thread. 0 before init.
pub fn current_tid() -> Tid {
    let _guard = SignalGuard::new();
    let slot = SCHEDULER.lock();
    slot.as_ref().map_or(BOOTSTRAP_TID, |sched| sched.current)
}

/// Total dispatches since init, the bootstrap thread's first quantum
/// included. 0 before init.
pub fn total_quanta() -> u64 {
    let _guard = SignalGuard::new();
    let slot = SCHEDULER.lock();
    slot.as_ref().map_or(0, |sched| sched.quantum_counter)
}

/// Quanta in which the named thread held the CPU.
pub fn quanta_of(tid: Tid) -> ThreadResult<u64> {
    let _guard = SignalGuard::new();
    let slot = SCHEDULER.lock();
    let sched = slot
        .as_ref()
        .ok_or_else(|| ThreadError::NotInitialized.reported())?;
    match sched.tcbs.get(&tid) {
        Some(tcb) => Ok(tcb.quanta_run()),
        None => Err(ThreadError::UnknownThread { tid }.reported()),
    }
}

/// Point-in-time scheduler counters.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerStats {
    /// Live threads, the running one included.
    pub live_threads: usize,
    /// Dispatches since init.
    pub total_quanta: u64,
    /// Threads waiting on the READY queue.
    pub ready: usize,
    /// Threads on the BLOCKED queue (sleeping-and-blocked included).
    pub blocked: usize,
    /// Threads on the SLEEPING queue (sleeping-and-blocked included).
    pub sleeping: usize,
}

/// Snapshot the scheduler counters.
pub fn stats() -> ThreadResult<SchedulerStats> {
    let _guard = SignalGuard::new();
    let slot = SCHEDULER.lock();
    let sched = slot
        .as_ref()
        .ok_or_else(|| ThreadError::NotInitialized.reported())?;
    let (ready, blocked, sleeping) = sched.queues.lengths();
    Ok(SchedulerStats {
        live_threads: sched.tcbs.len(),
        total_quanta: sched.quantum_counter,
        ready,
        blocked,
        sleeping,
    })
}

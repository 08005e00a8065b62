//! Thread control blocks and lifecycle states

use std::fmt;

use crate::context::MachineContext;
use crate::stack::Stack;
use crate::Tid;

/// Lifecycle state of a thread. Exactly one holds at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Eligible to run, waiting in the READY queue.
    Ready,

    /// Currently executing on the CPU. At most one thread at any instant.
    Running,

    /// Explicitly suspended; not eligible until resumed.
    Blocked,

    /// Suspended until its sleep quanta elapse.
    Sleeping,

    /// Both suspended and sleeping; becomes `Blocked` when the sleep
    /// expires, and `Sleeping` when resumed early.
    SleepingAndBlocked,

    /// Marked for reaping at the next scheduling point.
    Terminated,
}

impl ThreadState {
    /// True for the states parked on the SLEEPING queue.
    pub fn is_sleeping(self) -> bool {
        matches!(self, Self::Sleeping | Self::SleepingAndBlocked)
    }

    /// True for the states parked on the BLOCKED queue.
    pub fn is_blocked(self) -> bool {
        matches!(self, Self::Blocked | Self::SleepingAndBlocked)
    }
}

impl fmt::Display for ThreadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "ready"),
            Self::Running => write!(f, "running"),
            Self::Blocked => write!(f, "blocked"),
            Self::Sleeping => write!(f, "sleeping"),
            Self::SleepingAndBlocked => write!(f, "sleeping+blocked"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

/// Thread control block: the per-thread record owned by the scheduler.
pub struct Tcb {
    id: Tid,
    state: ThreadState,
    /// Entry function; taken at first dispatch, `None` afterwards and for
    /// the bootstrap thread.
    entry: Option<fn()>,
    /// `None` for the bootstrap thread, which runs on the native stack.
    stack: Option<Stack>,
    context: MachineContext,
    /// Quanta in which this thread was the running thread.
    quanta_run: u64,
    /// Sleep quanta still owed; positive exactly while sleeping.
    sleep_remaining: u64,
}

impl Tcb {
    /// The bootstrap thread: id 0, already running, no owned stack. Its
    /// context is captured by the first swap away from it.
    pub fn bootstrap() -> Self {
        Self {
            id: 0,
            state: ThreadState::Running,
            entry: None,
            stack: None,
            context: MachineContext::new(),
            quanta_run: 0,
            sleep_remaining: 0,
        }
    }

    /// A spawned thread: READY, owning a fresh stack, not yet primed.
    pub fn spawned(id: Tid, entry: fn()) -> Self {
        Self {
            id,
            state: ThreadState::Ready,
            entry: Some(entry),
            stack: Some(Stack::new()),
            context: MachineContext::new(),
            quanta_run: 0,
            sleep_remaining: 0,
        }
    }

    /// Prime the saved context so the first dispatch enters `trampoline`
    /// on this thread's own stack.
    pub fn prime(&mut self, trampoline: extern "C" fn()) {
        let stack = self
            .stack
            .as_ref()
            .expect("the bootstrap thread is never primed");
        self.context.prime(stack, trampoline);
    }

    pub fn id(&self) -> Tid {
        self.id
    }

    pub fn state(&self) -> ThreadState {
        self.state
    }

    pub fn set_state(&mut self, state: ThreadState) {
        self.state = state;
    }

    pub fn quanta_run(&self) -> u64 {
        self.quanta_run
    }

    /// Account one more quantum of CPU to this thread.
    pub fn record_quantum(&mut self) {
        self.quanta_run += 1;
    }

    /// Owe `quanta` quanta of sleep.
    pub fn begin_sleep(&mut self, quanta: u64) {
        self.sleep_remaining = quanta;
    }

    /// Burn one quantum of sleep; true when the sleep has expired.
    pub fn tick_sleep(&mut self) -> bool {
        self.sleep_remaining -= 1;
        self.sleep_remaining == 0
    }

    /// Hand out the entry function for the first dispatch.
    pub fn take_entry(&mut self) -> Option<fn()> {
        self.entry.take()
    }

    pub fn context_mut(&mut self) -> &mut MachineContext {
        &mut self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_predicates() {
        assert!(ThreadState::Sleeping.is_sleeping());
        assert!(ThreadState::SleepingAndBlocked.is_sleeping());
        assert!(ThreadState::SleepingAndBlocked.is_blocked());
        assert!(!ThreadState::Blocked.is_sleeping());
        assert!(!ThreadState::Ready.is_blocked());
    }

    #[test]
    fn sleep_bookkeeping() {
        fn entry() {}
        let mut tcb = Tcb::spawned(3, entry);
        tcb.begin_sleep(3);
        assert!(!tcb.tick_sleep());
        assert!(!tcb.tick_sleep());
        assert!(tcb.tick_sleep());
    }

    #[test]
    fn bootstrap_shape() {
        let boot = Tcb::bootstrap();
        assert_eq!(boot.id(), 0);
        assert_eq!(boot.state(), ThreadState::Running);
        assert_eq!(boot.quanta_run(), 0);
    }

    #[test]
    fn entry_taken_once() {
        fn entry() {}
        let mut tcb = Tcb::spawned(1, entry);
        assert!(tcb.take_entry().is_some());
        assert!(tcb.take_entry().is_none());
    }
}

//! Scheduling queues
//!
//! Three FIFO queues of thread ids, one per parked lifecycle family. The
//! registry owns the control blocks; queue membership mirrors state.

use std::collections::VecDeque;

use crate::Tid;

/// READY, BLOCKED, and SLEEPING queues.
///
/// READY order is the scheduling order: strict FIFO, preempted threads
/// re-enter at the tail. A sleeping-and-blocked thread sits on both the
/// SLEEPING and BLOCKED queues at once.
pub struct RunQueues {
    ready: VecDeque<Tid>,
    blocked: VecDeque<Tid>,
    sleeping: VecDeque<Tid>,
}

fn remove_from(queue: &mut VecDeque<Tid>, tid: Tid) {
    if let Some(pos) = queue.iter().position(|&t| t == tid) {
        queue.remove(pos);
    }
}

impl RunQueues {
    pub fn new() -> Self {
        Self {
            ready: VecDeque::new(),
            blocked: VecDeque::new(),
            sleeping: VecDeque::new(),
        }
    }

    pub fn enqueue_ready(&mut self, tid: Tid) {
        self.ready.push_back(tid);
    }

    pub fn enqueue_blocked(&mut self, tid: Tid) {
        self.blocked.push_back(tid);
    }

    pub fn enqueue_sleeping(&mut self, tid: Tid) {
        self.sleeping.push_back(tid);
    }

    /// Pop the next thread to run.
    pub fn next_ready(&mut self) -> Option<Tid> {
        self.ready.pop_front()
    }

    pub fn remove_ready(&mut self, tid: Tid) {
        remove_from(&mut self.ready, tid);
    }

    pub fn remove_blocked(&mut self, tid: Tid) {
        remove_from(&mut self.blocked, tid);
    }

    pub fn remove_sleeping(&mut self, tid: Tid) {
        remove_from(&mut self.sleeping, tid);
    }

    /// Drop `tid` from every queue it sits on. Used at termination.
    pub fn discard(&mut self, tid: Tid) {
        self.remove_ready(tid);
        self.remove_blocked(tid);
        self.remove_sleeping(tid);
    }

    /// Ids currently parked on the SLEEPING queue, in queue order.
    pub fn sleeping(&self) -> impl Iterator<Item = Tid> + '_ {
        self.sleeping.iter().copied()
    }

    /// Queue lengths: (ready, blocked, sleeping).
    pub fn lengths(&self) -> (usize, usize, usize) {
        (self.ready.len(), self.blocked.len(), self.sleeping.len())
    }
}

//! Thread id allocation
//!
//! Hands out the smallest available id and recycles ids on termination.

use std::collections::BTreeSet;

use crate::Tid;

/// Ordered free-id set over `[1, limit)`. Id 0 is permanently bound to the
/// bootstrap thread and never enters the set.
pub struct IdAllocator {
    free: BTreeSet<Tid>,
}

impl IdAllocator {
    pub fn new(limit: usize) -> Self {
        Self {
            free: (1..limit).collect(),
        }
    }

    /// Claim the smallest free id, if any remains.
    pub fn allocate(&mut self) -> Option<Tid> {
        self.free.pop_first()
    }

    /// Return a terminated thread's id to the pool.
    pub fn release(&mut self, id: Tid) {
        self.free.insert(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_ascending() {
        let mut ids = IdAllocator::new(4);
        assert_eq!(ids.allocate(), Some(1));
        assert_eq!(ids.allocate(), Some(2));
        assert_eq!(ids.allocate(), Some(3));
        assert_eq!(ids.allocate(), None);
    }

    #[test]
    fn released_id_is_reused_first() {
        let mut ids = IdAllocator::new(10);
        for _ in 0..5 {
            ids.allocate();
        }
        ids.release(2);
        assert_eq!(ids.allocate(), Some(2));
        assert_eq!(ids.allocate(), Some(6));
    }

    #[test]
    fn upper_bound_is_exclusive() {
        let mut ids = IdAllocator::new(2);
        assert_eq!(ids.allocate(), Some(1));
        assert_eq!(ids.allocate(), None);
    }
}

#![forbid(unsafe_code)]

use std::collections::{BTreeSet, VecDeque};

use crate::call_graph::ImplId;

/// Implementations excluded from scheduling for the rest of a run.
#[derive(Clone, Debug, Default)]
pub struct Blacklist {
    members: BTreeSet<ImplId>,
}

impl Blacklist {
    pub fn insert(&mut self, id: ImplId) -> bool {
        self.members.insert(id)
    }

    pub fn contains(&self, id: ImplId) -> bool {
        self.members.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ImplId> + '_ {
        self.members.iter().copied()
    }
}

/// FIFO of implementations awaiting verification, without duplicates.
#[derive(Clone, Debug, Default)]
pub struct Worklist {
    queue: VecDeque<ImplId>,
    queued: BTreeSet<ImplId>,
}

impl Worklist {
    pub fn new(ids: impl IntoIterator<Item = ImplId>) -> Self {
        let mut worklist = Self::default();
        for id in ids {
            worklist.push_back(id);
        }
        worklist
    }

    /// Adds `id` at the tail unless it is already queued or blacklisted.
    pub fn enqueue(&mut self, id: ImplId, blacklist: &Blacklist) -> bool {
        if blacklist.contains(id) {
            return false;
        }
        self.push_back(id)
    }

    fn push_back(&mut self, id: ImplId) -> bool {
        if !self.queued.insert(id) {
            return false;
        }
        self.queue.push_back(id);
        true
    }

    pub fn peek(&self) -> Option<ImplId> {
        self.queue.front().copied()
    }

    pub fn dequeue(&mut self) -> Option<ImplId> {
        let id = self.queue.pop_front()?;
        self.queued.remove(&id);
        Some(id)
    }

    /// Moves the head to the tail.
    pub fn rotate(&mut self) {
        if let Some(id) = self.queue.pop_front() {
            self.queue.push_back(id);
        }
    }

    pub fn contains(&self, id: ImplId) -> bool {
        self.queued.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ImplId> + '_ {
        self.queue.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_is_idempotent_and_respects_blacklist() {
        let mut blacklist = Blacklist::default();
        let mut worklist = Worklist::new([ImplId(0), ImplId(1)]);
        assert!(!worklist.enqueue(ImplId(0), &blacklist));
        assert!(worklist.enqueue(ImplId(2), &blacklist));

        blacklist.insert(ImplId(3));
        assert!(!worklist.enqueue(ImplId(3), &blacklist));
        assert_eq!(worklist.iter().collect::<Vec<_>>(), vec![ImplId(0), ImplId(1), ImplId(2)]);
    }

    #[test]
    fn dequeued_items_can_return() {
        let blacklist = Blacklist::default();
        let mut worklist = Worklist::new([ImplId(0)]);
        assert_eq!(worklist.dequeue(), Some(ImplId(0)));
        assert!(worklist.is_empty());
        assert!(worklist.enqueue(ImplId(0), &blacklist));
        assert_eq!(worklist.peek(), Some(ImplId(0)));
    }

    #[test]
    fn rotate_moves_head_to_tail() {
        let mut worklist = Worklist::new([ImplId(0), ImplId(1), ImplId(2)]);
        worklist.rotate();
        assert_eq!(worklist.iter().collect::<Vec<_>>(), vec![ImplId(1), ImplId(2), ImplId(0)]);
        assert!(worklist.contains(ImplId(0)));
    }
}

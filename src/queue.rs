//! The pump's internal bounded FIFO.
//!
//! Modeled as a `VecDeque` rather than a hand-rolled ring buffer: capacity is
//! enforced by the caller (`add` panics past capacity, treated as caller
//! misuse), and `peek`/`drop_front` are split so the pump can hold the head
//! item across a multi-destination, possibly-awaiting delivery attempt
//! without removing it until every destination has been handled.

use std::collections::VecDeque;

pub struct BoundedQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// Appends a value. Panics if the queue is full; callers must check
    /// `is_full` first (the pump only calls this from a `select!` arm gated
    /// on `!is_full()`).
    pub fn add(&mut self, v: T) {
        debug_assert!(!self.is_full(), "add() called on a full queue");
        self.items.push_back(v);
    }

    /// Returns the oldest item without removing it. Panics if empty.
    pub fn peek(&self) -> &T {
        self.items.front().expect("peek() called on an empty queue")
    }

    /// Removes the oldest item. Panics if empty.
    pub fn drop_front(&mut self) {
        self.items.pop_front().expect("drop_front() called on an empty queue");
    }
}

impl<T: Clone> BoundedQueue<T> {
    /// A defensive copy of the remaining items, oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order() {
        let mut q = BoundedQueue::new(4);
        q.add(1);
        q.add(2);
        q.add(3);
        assert_eq!(*q.peek(), 1);
        q.drop_front();
        assert_eq!(*q.peek(), 2);
        assert_eq!(q.snapshot(), vec![2, 3]);
    }

    #[test]
    fn full_and_empty() {
        let mut q = BoundedQueue::new(2);
        assert!(q.is_empty());
        q.add(1);
        q.add(2);
        assert!(q.is_full());
        q.drop_front();
        assert!(!q.is_full());
    }

    #[test]
    #[should_panic(expected = "full queue")]
    fn add_past_capacity_panics() {
        let mut q = BoundedQueue::new(1);
        q.add(1);
        q.add(2);
    }

    #[test]
    #[should_panic(expected = "empty queue")]
    fn peek_empty_panics() {
        let q: BoundedQueue<i32> = BoundedQueue::new(1);
        q.peek();
    }
}

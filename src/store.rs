//! Thread-safe stores for idle pool objects

use crossbeam::queue::SegQueue;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Non-blocking container of idle objects.
///
/// The pool restores with `offer_first`, takes with `poll_first` and shrinks
/// with `poll_last`, so the backing structure alone decides whether takers
/// see LIFO or FIFO order.
pub trait ConcurrentStore<T>: Send + Sync {
    fn offer_first(&self, obj: T);

    fn offer_last(&self, obj: T);

    fn poll_first(&self) -> Option<T>;

    fn poll_last(&self) -> Option<T>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Double-ended store; used as a stack it hands out the warmest object
pub struct DequeStore<T> {
    items: Mutex<VecDeque<T>>,
}

impl<T> DequeStore<T> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Pre-allocate room for `capacity` idle objects; the store grows past it
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }
}

impl<T: Send> ConcurrentStore<T> for DequeStore<T> {
    fn offer_first(&self, obj: T) {
        self.items.lock().push_front(obj);
    }

    fn offer_last(&self, obj: T) {
        self.items.lock().push_back(obj);
    }

    fn poll_first(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    fn poll_last(&self) -> Option<T> {
        self.items.lock().pop_back()
    }

    fn len(&self) -> usize {
        self.items.lock().len()
    }
}

impl<T> Default for DequeStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Lock-free FIFO store.
///
/// A queue only has one insertion end and one removal end, so both offers
/// append and both polls remove the oldest object. It grows on demand and
/// never rejects an object.
pub struct QueueStore<T> {
    items: SegQueue<T>,
}

impl<T> QueueStore<T> {
    pub fn new() -> Self {
        Self {
            items: SegQueue::new(),
        }
    }
}

impl<T> Default for QueueStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> ConcurrentStore<T> for QueueStore<T> {
    fn offer_first(&self, obj: T) {
        self.offer_last(obj);
    }

    fn offer_last(&self, obj: T) {
        self.items.push(obj);
    }

    fn poll_first(&self) -> Option<T> {
        self.items.pop()
    }

    fn poll_last(&self) -> Option<T> {
        self.poll_first()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deque_as_stack() {
        let store = DequeStore::with_capacity(4);
        store.offer_first(1);
        store.offer_first(2);
        store.offer_first(3);

        assert_eq!(store.len(), 3);
        assert_eq!(store.poll_first(), Some(3));
        assert_eq!(store.poll_last(), Some(1));
        assert_eq!(store.poll_first(), Some(2));
        assert!(store.is_empty());
        assert_eq!(store.poll_first(), None);
    }

    #[test]
    fn test_deque_offer_last() {
        let store = DequeStore::with_capacity(2);
        store.offer_first(1);
        store.offer_last(2);
        assert_eq!(store.poll_last(), Some(2));
        assert_eq!(store.poll_last(), Some(1));
    }

    #[test]
    fn test_queue_is_fifo() {
        let store = QueueStore::new();
        store.offer_first(1);
        store.offer_first(2);
        store.offer_last(3);

        assert_eq!(store.poll_first(), Some(1));
        assert_eq!(store.poll_last(), Some(2));
        assert_eq!(store.poll_first(), Some(3));
        assert!(store.is_empty());
    }

    #[test]
    fn test_stores_grow_past_initial_capacity() {
        let deque = DequeStore::with_capacity(1);
        let queue = QueueStore::new();
        for i in 0..1000 {
            deque.offer_first(i);
            queue.offer_first(i);
        }

        assert_eq!(deque.len(), 1000);
        assert_eq!(queue.len(), 1000);
        assert_eq!(queue.poll_first(), Some(0));
        assert_eq!(deque.poll_first(), Some(999));
    }

    #[test]
    fn test_deque_concurrent_offers() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(DequeStore::with_capacity(400));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..100 {
                        store.offer_first(t * 100 + i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 400);
    }
}

//! Bounded drop-oldest queue
//!
//! Both hand-offs in the pipeline (capture callback → control loop,
//! control loop → recognition loop) are bounded and lossy: when a producer
//! outruns its consumer the *oldest* item yields. `tokio::sync::mpsc`
//! cannot express that (`try_send` refuses the newest item), hence this
//! small primitive.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    notify: Notify,
    capacity: usize,
}

/// A bounded single-producer single-consumer queue that drops the oldest
/// item on overflow. Cloning yields another handle to the same queue.
pub struct LossyQueue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for LossyQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> LossyQueue<T> {
    /// Create a queue holding at most `capacity` items
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be nonzero");
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    items: VecDeque::with_capacity(capacity),
                    closed: false,
                }),
                notify: Notify::new(),
                capacity,
            }),
        }
    }

    /// Enqueue an item, never blocking.
    ///
    /// Returns the evicted oldest item when the queue was full, so the
    /// caller can account for the loss. Items pushed after [`close`]
    /// are discarded (returned back).
    pub fn push(&self, item: T) -> Option<T> {
        let evicted = {
            let mut state = self.shared.state.lock().expect("queue lock poisoned");
            if state.closed {
                return Some(item);
            }
            let evicted = if state.items.len() == self.shared.capacity {
                state.items.pop_front()
            } else {
                None
            };
            state.items.push_back(item);
            evicted
        };
        self.shared.notify.notify_one();
        evicted
    }

    /// Take the oldest item without waiting
    pub fn try_pop(&self) -> Option<T> {
        let mut state = self.shared.state.lock().expect("queue lock poisoned");
        state.items.pop_front()
    }

    /// Wait for the oldest item. Returns `None` once the queue is closed
    /// and fully drained.
    pub async fn pop(&self) -> Option<T> {
        loop {
            {
                let mut state = self.shared.state.lock().expect("queue lock poisoned");
                if let Some(item) = state.items.pop_front() {
                    return Some(item);
                }
                if state.closed {
                    return None;
                }
            }
            // notify_one stores a permit when nobody is parked yet, so a
            // push racing this await is never lost.
            self.shared.notify.notified().await;
        }
    }

    /// Close the queue: pending items stay poppable, new pushes are
    /// refused, and a parked consumer wakes to observe the close.
    pub fn close(&self) {
        {
            let mut state = self.shared.state.lock().expect("queue lock poisoned");
            state.closed = true;
        }
        self.shared.notify.notify_one();
    }

    /// Number of buffered items
    pub fn len(&self) -> usize {
        self.shared.state.lock().expect("queue lock poisoned").items.len()
    }

    /// Whether the queue is currently empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let q = LossyQueue::new(4);
        for i in 0..3 {
            assert!(q.push(i).is_none());
        }
        assert_eq!(q.try_pop(), Some(0));
        assert_eq!(q.try_pop(), Some(1));
        assert_eq!(q.try_pop(), Some(2));
        assert_eq!(q.try_pop(), None);
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let q = LossyQueue::new(2);
        assert!(q.push(1).is_none());
        assert!(q.push(2).is_none());
        assert_eq!(q.push(3), Some(1));
        assert_eq!(q.try_pop(), Some(2));
        assert_eq!(q.try_pop(), Some(3));
    }

    #[test]
    fn test_push_after_close_is_refused() {
        let q = LossyQueue::new(2);
        q.push(1);
        q.close();
        assert_eq!(q.push(2), Some(2));
        assert_eq!(q.try_pop(), Some(1));
    }

    #[tokio::test]
    async fn test_pop_waits_for_push() {
        let q = LossyQueue::new(2);
        let reader = q.clone();
        let handle = tokio::spawn(async move { reader.pop().await });

        tokio::task::yield_now().await;
        q.push(42);
        assert_eq!(handle.await.unwrap(), Some(42));
    }

    #[tokio::test]
    async fn test_pop_drains_then_ends_on_close() {
        let q = LossyQueue::new(4);
        q.push(1);
        q.push(2);
        q.close();

        assert_eq!(q.pop().await, Some(1));
        assert_eq!(q.pop().await, Some(2));
        assert_eq!(q.pop().await, None);
    }

    #[tokio::test]
    async fn test_close_wakes_parked_consumer() {
        let q: LossyQueue<u8> = LossyQueue::new(1);
        let reader = q.clone();
        let handle = tokio::spawn(async move { reader.pop().await });

        tokio::task::yield_now().await;
        q.close();
        assert_eq!(handle.await.unwrap(), None);
    }
}

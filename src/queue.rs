use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Items and shutdown flag, always mutated together under one lock
#[derive(Debug)]
struct State<T> {
    items: VecDeque<T>,
    shutdown: bool,
}

/// An unbounded FIFO queue whose blocking pops are released by `shutdown`.
///
/// Items are moved in by `push` and moved out by exactly one popper. The
/// "item available or shut down" predicate is only ever evaluated while
/// holding the same mutex `push` and `shutdown` publish through, so a waiter
/// cannot miss a wakeup between its check and its sleep.
///
/// Share it between stages with an `Arc`.
#[derive(Debug)]
pub struct BlockingQueue<T> {
    state: Mutex<State<T>>,
    available: Condvar,
    /// Mirror of `State::shutdown` for lock-free advisory reads
    shutdown_hint: AtomicBool,
}

impl<T> BlockingQueue<T> {
    /// Create an empty, running queue
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                shutdown: false,
            }),
            available: Condvar::new(),
            shutdown_hint: AtomicBool::new(false),
        }
    }

    /// Append an item and wake one blocked popper.
    ///
    /// Returns the item back if the queue has been shut down.
    pub fn push(&self, item: T) -> Result<(), T> {
        let mut state = self.state.lock();
        if state.shutdown {
            return Err(item);
        }
        state.items.push_back(item);
        drop(state);
        self.available.notify_one();
        Ok(())
    }

    /// Block until an item is available or the queue is shut down.
    ///
    /// Items still queued at shutdown are handed out; `None` means the
    /// queue is shut down and drained.
    pub fn wait_and_pop(&self) -> Option<T> {
        let mut state = self.state.lock();
        while state.items.is_empty() && !state.shutdown {
            self.available.wait(&mut state);
        }
        state.items.pop_front()
    }

    /// Like [`wait_and_pop`](Self::wait_and_pop) but writes into `value`.
    ///
    /// Returns `false` and leaves `value` untouched when woken by shutdown
    /// with nothing left.
    pub fn wait_and_pop_into(&self, value: &mut T) -> bool {
        match self.wait_and_pop() {
            Some(item) => {
                *value = item;
                true
            }
            None => false,
        }
    }

    /// Like [`wait_and_pop`](Self::wait_and_pop) but gives up after `timeout`.
    ///
    /// A timeout too large to represent as a deadline waits without limit.
    pub fn wait_and_pop_timeout(&self, timeout: Duration) -> Option<T> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.wait_and_pop();
        };
        let mut state = self.state.lock();
        while state.items.is_empty() && !state.shutdown {
            if self.available.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        state.items.pop_front()
    }

    /// Pop the front item without waiting, ignoring shutdown state
    pub fn try_pop(&self) -> Option<T> {
        self.state.lock().items.pop_front()
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// Get the current number of queued items
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Reject further pushes and release every blocked popper
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        state.shutdown = true;
        self.shutdown_hint.store(true, Ordering::Release);
        drop(state);
        self.available.notify_all();
    }

    /// Accept pushes again, keeping whatever is still queued
    pub fn restart(&self) {
        let mut state = self.state.lock();
        state.shutdown = false;
        self.shutdown_hint.store(false, Ordering::Release);
        drop(state);
        self.available.notify_all();
    }

    /// Advisory shutdown flag; may be stale by the time it is used
    pub fn is_shutdown(&self) -> bool {
        self.shutdown_hint.load(Ordering::Acquire)
    }
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let queue = BlockingQueue::new();
        for i in 0..10 {
            assert!(queue.push(i).is_ok());
        }
        assert_eq!(queue.len(), 10);
        for i in 0..10 {
            assert_eq!(queue.wait_and_pop(), Some(i));
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_push_after_shutdown_is_rejected() {
        let queue = BlockingQueue::new();
        queue.shutdown();
        assert_eq!(queue.push("late"), Err("late"));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_try_pop_never_blocks() {
        let queue: BlockingQueue<u32> = BlockingQueue::new();
        assert_eq!(queue.try_pop(), None);
        queue.shutdown();
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn test_try_pop_returns_leftovers_after_shutdown() {
        let queue = BlockingQueue::new();
        queue.push(7).unwrap();
        queue.shutdown();
        assert_eq!(queue.try_pop(), Some(7));
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn test_wait_and_pop_drains_then_reports_shutdown() {
        let queue = BlockingQueue::new();
        queue.push(1).unwrap();
        queue.shutdown();
        assert_eq!(queue.wait_and_pop(), Some(1));
        assert_eq!(queue.wait_and_pop(), None);
    }

    #[test]
    fn test_wait_and_pop_into() {
        let queue = BlockingQueue::new();
        queue.push(String::from("hello")).unwrap();

        let mut value = String::new();
        assert!(queue.wait_and_pop_into(&mut value));
        assert_eq!(value, "hello");

        queue.shutdown();
        assert!(!queue.wait_and_pop_into(&mut value));
        assert_eq!(value, "hello");
    }

    #[test]
    fn test_wait_and_pop_timeout_expires() {
        let queue: BlockingQueue<u8> = BlockingQueue::new();
        let start = Instant::now();
        assert_eq!(queue.wait_and_pop_timeout(Duration::from_millis(20)), None);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_unbounded_timeout_waits_without_overflow() {
        let queue = Arc::new(BlockingQueue::new());
        queue.push(1).unwrap();
        assert_eq!(queue.wait_and_pop_timeout(Duration::MAX), Some(1));

        let waiter = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.wait_and_pop_timeout(Duration::MAX))
        };
        thread::sleep(Duration::from_millis(20));
        queue.push(2).unwrap();
        assert_eq!(waiter.join().unwrap(), Some(2));
    }

    #[test]
    fn test_shutdown_wakes_all_waiters() {
        let queue: Arc<BlockingQueue<u32>> = Arc::new(BlockingQueue::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || queue.wait_and_pop())
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        queue.shutdown();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), None);
        }
        assert!(queue.is_shutdown());
    }

    #[test]
    fn test_single_push_reaches_single_waiter() {
        for _ in 0..100 {
            let queue = Arc::new(BlockingQueue::new());
            let consumer = {
                let queue = Arc::clone(&queue);
                thread::spawn(move || queue.wait_and_pop())
            };
            queue.push(42).unwrap();
            assert_eq!(consumer.join().unwrap(), Some(42));
            assert!(queue.is_empty());
        }
    }

    #[test]
    fn test_restart_resumes_service() {
        let queue = BlockingQueue::new();
        queue.push(1).unwrap();
        queue.shutdown();
        queue.restart();
        assert!(!queue.is_shutdown());

        queue.push(2).unwrap();
        assert_eq!(queue.wait_and_pop(), Some(1));
        assert_eq!(queue.wait_and_pop(), Some(2));
    }
}

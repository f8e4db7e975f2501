use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Duration;

/// Suspended continuations waiting out a simulated delay.
///
/// Time only moves when [`LatencyQueue::advance`] is called, so the event loop
/// drives it with wall-clock ticks and tests drive it directly.
#[derive(Debug)]
pub struct LatencyQueue<T> {
    now: Duration,
    next_seq: u64,
    heap: BinaryHeap<Reverse<Scheduled<T>>>,
}

#[derive(Debug)]
struct Scheduled<T> {
    due: Duration,
    seq: u64,
    payload: T,
}

impl<T> PartialEq for Scheduled<T> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<T> Eq for Scheduled<T> {}

impl<T> PartialOrd for Scheduled<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Scheduled<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due
            .cmp(&other.due)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl<T> Default for LatencyQueue<T> {
    fn default() -> Self {
        Self {
            now: Duration::ZERO,
            next_seq: 0,
            heap: BinaryHeap::new(),
        }
    }
}

impl<T> LatencyQueue<T> {
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn schedule(&mut self, delay: Duration, payload: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Scheduled {
            due: self.now + delay,
            seq,
            payload,
        }));
    }

    /// Moves the clock forward and returns everything now due, earliest first;
    /// ties resolve in scheduling order.
    pub fn advance(&mut self, elapsed: Duration) -> Vec<T> {
        self.now += elapsed;
        let mut due = Vec::new();
        while let Some(Reverse(next)) = self.heap.peek() {
            if next.due > self.now {
                break;
            }
            if let Some(Reverse(item)) = self.heap.pop() {
                due.push(item.payload);
            }
        }
        due
    }

    /// Time left until the earliest pending item, if any.
    pub fn next_due_in(&self) -> Option<Duration> {
        self.heap
            .peek()
            .map(|Reverse(next)| next.due.saturating_sub(self.now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn releases_only_due_items_in_order() {
        let mut queue = LatencyQueue::default();
        queue.schedule(Duration::from_millis(300), "slow");
        queue.schedule(Duration::from_millis(100), "fast");
        queue.schedule(Duration::from_millis(100), "fast-second");

        assert!(queue.advance(Duration::from_millis(99)).is_empty());
        assert_eq!(queue.next_due_in(), Some(Duration::from_millis(1)));
        assert_eq!(
            queue.advance(Duration::from_millis(1)),
            vec!["fast", "fast-second"]
        );
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.advance(Duration::from_secs(1)), vec!["slow"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn delays_are_relative_to_current_clock() {
        let mut queue = LatencyQueue::default();
        queue.advance(Duration::from_millis(500));
        queue.schedule(Duration::from_millis(100), 1);
        assert!(queue.advance(Duration::from_millis(50)).is_empty());
        assert_eq!(queue.advance(Duration::from_millis(50)), vec![1]);
        assert_eq!(queue.now(), Duration::from_millis(600));
    }
}

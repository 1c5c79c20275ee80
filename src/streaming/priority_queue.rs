//! Priority queue (§4.H.3): FIFO queues keyed by priority level, bounded
//! by total size, with dequeue awaiting when empty.

use std::collections::VecDeque;

use tokio::sync::Notify;
use tokio::sync::Mutex;

use crate::routing::Priority;

struct Inner<T> {
    critical: VecDeque<T>,
    high: VecDeque<T>,
    normal: VecDeque<T>,
    low: VecDeque<T>,
    bulk: VecDeque<T>,
    len: usize,
}

impl<T> Inner<T> {
    fn queue_for(&mut self, priority: Priority) -> &mut VecDeque<T> {
        match priority {
            Priority::Critical => &mut self.critical,
            Priority::High => &mut self.high,
            Priority::Normal => &mut self.normal,
            Priority::Low => &mut self.low,
            Priority::Bulk => &mut self.bulk,
        }
    }

    fn pop_highest(&mut self) -> Option<T> {
        for priority in [Priority::Critical, Priority::High, Priority::Normal, Priority::Low, Priority::Bulk] {
            if let Some(item) = self.queue_for(priority).pop_front() {
                return Some(item);
            }
        }
        None
    }
}

pub struct PriorityQueue<T> {
    inner: Mutex<Inner<T>>,
    capacity: usize,
    notify: Notify,
}

impl<T> PriorityQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                critical: VecDeque::new(),
                high: VecDeque::new(),
                normal: VecDeque::new(),
                low: VecDeque::new(),
                bulk: VecDeque::new(),
                len: 0,
            }),
            capacity,
            notify: Notify::new(),
        }
    }

    /// Enqueue `item`. Returns `false` without enqueuing if the queue is
    /// already at capacity (back-pressure per §5 — producers await space
    /// at a higher level; this surfaces the "full" condition for them).
    pub async fn try_enqueue(&self, priority: Priority, item: T) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.len >= self.capacity {
            return false;
        }
        inner.queue_for(priority).push_back(item);
        inner.len += 1;
        drop(inner);
        self.notify.notify_one();
        true
    }

    /// Dequeue the head of the highest-priority non-empty queue,
    /// awaiting if every queue is currently empty.
    pub async fn dequeue(&self) -> T {
        loop {
            {
                let mut inner = self.inner.lock().await;
                if let Some(item) = inner.pop_highest() {
                    inner.len -= 1;
                    return item;
                }
            }
            self.notify.notified().await;
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dequeues_highest_priority_first() {
        let queue = PriorityQueue::new(10);
        queue.try_enqueue(Priority::Low, "low").await;
        queue.try_enqueue(Priority::Critical, "critical").await;
        queue.try_enqueue(Priority::Normal, "normal").await;
        assert_eq!(queue.dequeue().await, "critical");
        assert_eq!(queue.dequeue().await, "normal");
        assert_eq!(queue.dequeue().await, "low");
    }

    #[tokio::test]
    async fn respects_fifo_within_same_priority() {
        let queue = PriorityQueue::new(10);
        queue.try_enqueue(Priority::Normal, 1).await;
        queue.try_enqueue(Priority::Normal, 2).await;
        assert_eq!(queue.dequeue().await, 1);
        assert_eq!(queue.dequeue().await, 2);
    }

    #[tokio::test]
    async fn enqueue_rejected_at_capacity() {
        let queue = PriorityQueue::new(1);
        assert!(queue.try_enqueue(Priority::Normal, 1).await);
        assert!(!queue.try_enqueue(Priority::Normal, 2).await);
    }

    #[tokio::test]
    async fn dequeue_awaits_until_item_arrives() {
        let queue = std::sync::Arc::new(PriorityQueue::new(10));
        let queue2 = queue.clone();
        let handle = tokio::spawn(async move { queue2.dequeue().await });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        queue.try_enqueue(Priority::Bulk, "late").await;
        let result = tokio::time::timeout(std::time::Duration::from_secs(1), handle).await;
        assert_eq!(result.unwrap().unwrap(), "late");
    }
}

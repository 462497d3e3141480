//! Bounded frame queues between external producers and the session.
//!
//! Producers never hold channel endpoints directly; every push goes through
//! the session, so only the session side can ever close a queue. Push on a
//! full queue blocks (backpressure); push after close fails immediately.

use crate::errors::SessionError;
use crate::types::VideoPacket;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

pub(crate) const VIDEO_QUEUE_CAPACITY: usize = 30;
pub(crate) const AUDIO_QUEUE_CAPACITY: usize = 1;
pub(crate) const INPUT_QUEUE_CAPACITY: usize = 100;

/// One bounded FIFO lane. The receiver sits in a handoff slot until the
/// consumer claims it; `close` tears down whichever endpoints are still here.
pub(crate) struct Queue<T> {
    sender: Mutex<Option<mpsc::Sender<T>>>,
    receiver: Mutex<Option<mpsc::Receiver<T>>>,
    closed: AtomicBool,
}

impl<T> Queue<T> {
    fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            sender: Mutex::new(Some(sender)),
            receiver: Mutex::new(Some(receiver)),
            closed: AtomicBool::new(false),
        }
    }

    /// Push one item, blocking while the queue is full. Fails fast once the
    /// queue is closed instead of blocking forever.
    pub(crate) async fn push(&self, item: T) -> Result<(), SessionError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SessionError::State("queue is closed".to_string()));
        }
        let sender = {
            let guard = self.sender.lock().expect("lock poisoned");
            guard.clone()
        };
        let Some(sender) = sender else {
            return Err(SessionError::State("queue is closed".to_string()));
        };
        sender
            .send(item)
            .await
            .map_err(|_| SessionError::State("queue is closed".to_string()))
    }

    /// Hand the consumer end to its loop. Yields `None` once taken or closed.
    pub(crate) fn take_receiver(&self) -> Option<mpsc::Receiver<T>> {
        self.receiver.lock().expect("lock poisoned").take()
    }

    /// Close the queue exactly once. Drops the session-held sender so
    /// consumers observe end-of-stream after draining, and tears down the
    /// receiver if no consumer ever claimed it.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.sender.lock().expect("lock poisoned").take();
        if let Some(mut receiver) = self.take_receiver() {
            receiver.close();
        }
    }
}

/// The three lanes owned by one session.
pub(crate) struct FrameQueues {
    pub(crate) video: Queue<VideoPacket>,
    pub(crate) audio: Queue<Bytes>,
    pub(crate) input: Queue<Bytes>,
}

impl FrameQueues {
    pub(crate) fn new() -> Self {
        Self {
            video: Queue::new(VIDEO_QUEUE_CAPACITY),
            audio: Queue::new(AUDIO_QUEUE_CAPACITY),
            input: Queue::new(INPUT_QUEUE_CAPACITY),
        }
    }

    /// Close every lane. Called only by the stop winner, after the transport
    /// is down, so no internal consumer can still be fed by it.
    pub(crate) fn close_all(&self) {
        self.video.close();
        self.audio.close();
        self.input.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_push_and_receive_order() {
        let queue: Queue<u32> = Queue::new(4);
        queue.push(1).await.unwrap();
        queue.push(2).await.unwrap();
        queue.push(3).await.unwrap();

        let mut rx = queue.take_receiver().unwrap();
        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(2));
        assert_eq!(rx.recv().await, Some(3));
    }

    #[tokio::test]
    async fn test_push_after_close_fails_fast() {
        let queue: Queue<u32> = Queue::new(4);
        queue.close();
        let result = queue.push(1).await;
        assert!(matches!(result, Err(SessionError::State(_))));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let queue: Queue<u32> = Queue::new(4);
        queue.close();
        queue.close();
        assert!(matches!(queue.push(1).await, Err(SessionError::State(_))));
    }

    #[tokio::test]
    async fn test_consumer_drains_buffered_items_after_close() {
        let queue: Queue<u32> = Queue::new(4);
        queue.push(7).await.unwrap();
        queue.push(8).await.unwrap();

        let mut rx = queue.take_receiver().unwrap();
        queue.close();

        // Buffered items survive the close; then the lane reports end-of-stream.
        assert_eq!(rx.recv().await, Some(7));
        assert_eq!(rx.recv().await, Some(8));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_receiver_taken_once() {
        let queue: Queue<u32> = Queue::new(4);
        assert!(queue.take_receiver().is_some());
        assert!(queue.take_receiver().is_none());
    }
}

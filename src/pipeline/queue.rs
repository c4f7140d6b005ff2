use std::{
    future::Future,
    sync::atomic::{AtomicUsize, Ordering},
};

use tokio::sync::{mpsc, Mutex};

use crate::cli::{PipelineArgs, QueueKind};
use crate::error::{CommandResult, EnricherError};
use crate::pipeline::models::Message;

/// Work queue shared by the producer and the pipeline workers.
pub trait MessageQueue: Send + Sync {
    /// Waits for room when the queue is bounded and full.
    fn enqueue(&self, message: Message) -> impl Future<Output = CommandResult<()>> + Send;

    /// Waits for the next message; `None` once the queue is closed and drained.
    fn dequeue(&self) -> impl Future<Output = Option<Message>> + Send;

    /// Stops accepting messages. Messages already queued are still delivered.
    fn close(&self) -> impl Future<Output = ()> + Send;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
enum Sender {
    Bounded(mpsc::Sender<Message>),
    Unbounded(mpsc::UnboundedSender<Message>),
}

#[derive(Debug)]
enum Receiver {
    Bounded(mpsc::Receiver<Message>),
    Unbounded(mpsc::UnboundedReceiver<Message>),
}

#[derive(Debug)]
pub struct InMemoryQueue {
    sender: Mutex<Option<Sender>>,
    receiver: Mutex<Receiver>,
    depth: AtomicUsize,
}

impl InMemoryQueue {
    /// A `max_size` of zero means unbounded.
    pub fn new(max_size: usize) -> Self {
        let (sender, receiver) = if max_size > 0 {
            let (tx, rx) = mpsc::channel(max_size);
            (Sender::Bounded(tx), Receiver::Bounded(rx))
        } else {
            let (tx, rx) = mpsc::unbounded_channel();
            (Sender::Unbounded(tx), Receiver::Unbounded(rx))
        };

        Self {
            sender: Mutex::new(Some(sender)),
            receiver: Mutex::new(receiver),
            depth: AtomicUsize::new(0),
        }
    }
}

impl MessageQueue for InMemoryQueue {
    async fn enqueue(&self, message: Message) -> CommandResult<()> {
        let sender = self
            .sender
            .lock()
            .await
            .clone()
            .ok_or(EnricherError::QueueClosed)?;

        // Counted before sending so a fast consumer never sees the depth go negative.
        self.depth.fetch_add(1, Ordering::SeqCst);
        let sent = match sender {
            Sender::Bounded(tx) => tx.send(message).await.is_ok(),
            Sender::Unbounded(tx) => tx.send(message).is_ok(),
        };
        if sent {
            Ok(())
        } else {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            Err(EnricherError::QueueClosed)
        }
    }

    async fn dequeue(&self) -> Option<Message> {
        let mut receiver = self.receiver.lock().await;
        let message = match &mut *receiver {
            Receiver::Bounded(rx) => rx.recv().await,
            Receiver::Unbounded(rx) => rx.recv().await,
        };
        if message.is_some() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
        }
        message
    }

    async fn close(&self) {
        self.sender.lock().await.take();
    }

    fn len(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }
}

/// Builds the queue selected by `--queue-type`.
pub fn create(args: &PipelineArgs) -> InMemoryQueue {
    match args.queue_type {
        QueueKind::Memory => InMemoryQueue::new(args.queue_max_size),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, time::Duration};

    fn message(id: u64) -> Message {
        Message::new(id, "text").unwrap()
    }

    #[tokio::test]
    async fn preserves_fifo_order_until_closed() {
        let queue = InMemoryQueue::new(0);
        queue.enqueue(message(1)).await.unwrap();
        queue.enqueue(message(2)).await.unwrap();
        queue.close().await;
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.dequeue().await.map(|m| m.id), Some(1));
        assert_eq!(queue.dequeue().await.map(|m| m.id), Some(2));
        assert!(queue.dequeue().await.is_none());
        assert_eq!(queue.len(), 0);
    }

    #[tokio::test]
    async fn closed_queue_rejects_messages() {
        let queue = InMemoryQueue::new(0);
        queue.close().await;
        let err = queue.enqueue(message(1)).await.unwrap_err();
        assert!(matches!(err, EnricherError::QueueClosed));
    }

    #[tokio::test]
    async fn full_bounded_queue_waits_for_room() {
        let queue = InMemoryQueue::new(1);
        queue.enqueue(message(1)).await.unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(50), queue.enqueue(message(2)));
        assert!(blocked.await.is_err());
    }

    #[tokio::test]
    async fn bounded_queue_delivers_everything_to_a_concurrent_consumer() {
        let queue = Arc::new(InMemoryQueue::new(2));
        let producer = {
            let queue = queue.clone();
            tokio::spawn(async move {
                for id in 1..=10 {
                    queue.enqueue(message(id)).await.unwrap();
                }
                queue.close().await;
            })
        };

        let mut received = Vec::new();
        while let Some(message) = queue.dequeue().await {
            received.push(message.id);
        }
        producer.await.unwrap();

        assert_eq!(received, (1..=10).collect::<Vec<_>>());
    }
}

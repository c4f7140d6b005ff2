use std::sync::Arc;

use crate::pipeline::llm::LlmProvider;
use crate::pipeline::models::EnrichmentResult;
use crate::pipeline::processor::MessageProcessor;
use crate::pipeline::queue::MessageQueue;

const PROGRESS_EVERY: usize = 10;

pub struct Worker<Q, P> {
    id: usize,
    queue: Arc<Q>,
    processor: Arc<MessageProcessor<P>>,
}

impl<Q, P> Worker<Q, P>
where
    Q: MessageQueue,
    P: LlmProvider,
{
    pub fn new(id: usize, queue: Arc<Q>, processor: Arc<MessageProcessor<P>>) -> Self {
        Self {
            id,
            queue,
            processor,
        }
    }

    /// Processes messages until the queue is closed and drained.
    pub async fn process_all(self) -> Vec<EnrichmentResult> {
        tracing::info!(worker = self.id, "worker started");

        let mut results = Vec::new();
        let mut succeeded = 0;
        while let Some(message) = self.queue.dequeue().await {
            let result = self.processor.process(&message).await;
            if result.success {
                succeeded += 1;
            }
            results.push(result);

            if results.len() % PROGRESS_EVERY == 0 {
                tracing::info!(
                    worker = self.id,
                    processed = results.len(),
                    succeeded,
                    failed = results.len() - succeeded,
                    "progress"
                );
            }
        }

        tracing::info!(
            worker = self.id,
            processed = results.len(),
            succeeded,
            failed = results.len() - succeeded,
            "queue drained"
        );
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::models::Message;
    use crate::pipeline::processor::tests::ScriptedLlm;
    use crate::pipeline::queue::InMemoryQueue;
    use serde_json::json;

    #[tokio::test]
    async fn drains_queue_in_order() {
        let queue = Arc::new(InMemoryQueue::new(0));
        for id in 1..=12 {
            queue
                .enqueue(Message::new(id, format!("message {id}")).unwrap())
                .await
                .unwrap();
        }
        queue.close().await;
        let processor = Arc::new(MessageProcessor::new(ScriptedLlm {
            reply: Some(json!({"category": "newsletter", "description": "Weekly digest"})),
            ..Default::default()
        }));

        let results = Worker::new(1, queue.clone(), processor).process_all().await;

        assert_eq!(results.len(), 12);
        assert!(results.iter().all(|r| r.success));
        assert_eq!(results.first().map(|r| r.id), Some(1));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn closed_empty_queue_yields_nothing() {
        let queue = Arc::new(InMemoryQueue::new(0));
        queue.close().await;
        let processor = Arc::new(MessageProcessor::new(ScriptedLlm::default()));

        assert!(Worker::new(1, queue, processor).process_all().await.is_empty());
    }
}

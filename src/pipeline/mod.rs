//! LLM enrichment pipeline: dataset in, classified results out.
//!
//! Messages are queued, drained by a pool of workers that share one LLM
//! client, and the merged results are written as a JSON array sorted by id.
//! Messages that already succeeded in a previous run are skipped, so the
//! pipeline can be restarted after a crash.

use std::{
    collections::HashSet,
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::task::JoinSet;

pub mod dataset;
pub mod llm;
pub mod models;
pub mod output;
pub mod processor;
pub mod queue;
pub mod validation;
pub mod worker;

use crate::cli::PipelineArgs;
use crate::error::{CommandResult, EnricherError};
use llm::{LlmProvider, OllamaClient};
use models::{EnrichmentResult, Message};
use processor::MessageProcessor;
use queue::MessageQueue;
use worker::Worker;

/// Runs the whole pipeline against the configured Ollama service.
pub async fn run(args: &PipelineArgs) -> CommandResult<Summary> {
    tracing::info!("enrichment pipeline starting");

    let client = OllamaClient::from_args(args)?;
    let retry = client.retry_policy();
    tracing::info!(
        retries = retry.retries,
        backoff_base = ?retry.base,
        backoff_max = ?retry.max,
        jitter = ?retry.jitter,
        status_codes = ?retry.status_codes,
        "LLM retry configuration"
    );
    if !client.health_check().await {
        return Err(EnricherError::LlmUnavailable(client.base_url().to_owned()));
    }

    let app = EnrichmentApp::new(
        queue::create(args),
        client,
        usize::from(args.max_concurrency),
        args.output_path.clone(),
    );
    let messages = dataset::load(&args.input_path).await?;
    app.process(messages).await
}

pub struct EnrichmentApp<Q, P> {
    queue: Arc<Q>,
    processor: Arc<MessageProcessor<P>>,
    workers: usize,
    output_path: PathBuf,
}

impl<Q, P> EnrichmentApp<Q, P>
where
    Q: MessageQueue + 'static,
    P: LlmProvider + 'static,
{
    pub fn new(queue: Q, llm: P, workers: usize, output_path: PathBuf) -> Self {
        Self {
            queue: Arc::new(queue),
            processor: Arc::new(MessageProcessor::new(llm)),
            workers: workers.max(1),
            output_path,
        }
    }

    /// Feeds `messages` to the worker pool and writes the merged results.
    ///
    /// Workers run while messages are being queued, so a bounded queue makes
    /// the producer wait instead of rejecting messages.
    pub async fn process(&self, messages: Vec<Message>) -> CommandResult<Summary> {
        let previous = output::load_previous(&self.output_path).await;
        let done = output::successful_ids(&previous);
        let started = Instant::now();

        let workers = self.start_processing();
        let enqueued = self.enqueue_messages(messages, &done).await;
        self.queue.close().await;

        let mut fresh = enqueued.rejected;
        fresh.extend(join_workers(workers).await);
        let elapsed = started.elapsed();

        let summary = Summary::new(&fresh, enqueued.skipped, self.workers, elapsed);
        let merged = merge(previous, fresh);
        output::write_results(&self.output_path, &merged).await?;

        summary.log(&self.output_path);
        Ok(summary)
    }

    fn start_processing(&self) -> JoinSet<Vec<EnrichmentResult>> {
        tracing::info!(workers = self.workers, "starting message processing");
        let mut tasks = JoinSet::new();
        for id in 1..=self.workers {
            let worker = Worker::new(id, self.queue.clone(), self.processor.clone());
            tasks.spawn(worker.process_all());
        }
        tasks
    }

    /// Queues every message whose id is not in `done`.
    async fn enqueue_messages(&self, messages: Vec<Message>, done: &HashSet<u64>) -> Enqueued {
        tracing::info!(count = messages.len(), "enqueueing messages");

        let mut enqueued = Enqueued::default();
        for message in messages {
            if done.contains(&message.id) {
                enqueued.skipped += 1;
                continue;
            }
            let id = message.id;
            match self.queue.enqueue(message).await {
                Ok(()) => enqueued.queued += 1,
                Err(error) => {
                    tracing::error!(id, %error, "failed to enqueue message");
                    enqueued
                        .rejected
                        .push(EnrichmentResult::failed(id, format!("Enqueue error: {error}")));
                }
            }
        }

        tracing::info!(
            queued = enqueued.queued,
            skipped = enqueued.skipped,
            rejected = enqueued.rejected.len(),
            "messages enqueued"
        );
        enqueued
    }
}

#[derive(Debug, Default)]
struct Enqueued {
    queued: usize,
    skipped: usize,
    rejected: Vec<EnrichmentResult>,
}

async fn join_workers(mut tasks: JoinSet<Vec<EnrichmentResult>>) -> Vec<EnrichmentResult> {
    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(batch) => results.extend(batch),
            Err(error) => tracing::error!(%error, "worker task failed"),
        }
    }
    results
}

/// Keeps earlier successes that were not reprocessed, then sorts by id.
fn merge(previous: Vec<EnrichmentResult>, fresh: Vec<EnrichmentResult>) -> Vec<EnrichmentResult> {
    let fresh_ids: HashSet<u64> = fresh.iter().map(|result| result.id).collect();
    let mut merged: Vec<_> = previous
        .into_iter()
        .filter(|result| result.success && !fresh_ids.contains(&result.id))
        .chain(fresh)
        .collect();
    merged.sort_by_key(|result| result.id);
    merged
}

/// Outcome of one processing run.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Messages left out because an earlier run already enriched them.
    pub skipped: usize,
    pub workers: usize,
    pub elapsed: Duration,
}

impl Summary {
    fn new(
        results: &[EnrichmentResult],
        skipped: usize,
        workers: usize,
        elapsed: Duration,
    ) -> Self {
        let succeeded = results.iter().filter(|result| result.success).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            skipped,
            workers,
            elapsed,
        }
    }

    pub fn average_secs(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.elapsed.as_secs_f64() / self.total as f64
        }
    }

    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total as f64 / secs
        } else {
            0.0
        }
    }

    fn log(&self, output_path: &std::path::Path) {
        tracing::info!(
            total = self.total,
            succeeded = self.succeeded,
            failed = self.failed,
            skipped = self.skipped,
            workers = self.workers,
            "processing complete"
        );
        tracing::info!(
            "total time {:.2}s ({:.2} min), {:.2}s per message, {:.2} messages/s",
            self.elapsed.as_secs_f64(),
            self.elapsed.as_secs_f64() / 60.0,
            self.average_secs(),
            self.throughput(),
        );
        tracing::info!(path = %output_path.display(), "results saved");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::models::Category;
    use crate::pipeline::processor::tests::ScriptedLlm;
    use crate::pipeline::queue::InMemoryQueue;
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use tempfile::tempdir;

    fn messages(ids: &[u64]) -> Vec<Message> {
        ids.iter()
            .map(|&id| Message::new(id, format!("message {id}")).unwrap())
            .collect()
    }

    fn llm() -> ScriptedLlm {
        ScriptedLlm {
            reply: Some(json!({
                "category": "internal",
                "description": "Status update",
                "emails": ["Ops@Example.com"],
            })),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn processes_and_writes_sorted_results() {
        let tmp = tempdir().unwrap();
        let output_path = tmp.path().join("out/results.json");
        let app = EnrichmentApp::new(InMemoryQueue::new(0), llm(), 3, output_path.clone());

        let summary = app.process(messages(&[5, 3, 1, 4, 2])).await.unwrap();

        assert_eq!(summary.total, 5);
        assert_eq!(summary.succeeded, 5);
        assert_eq!(summary.workers, 3);

        let written = output::load_previous(&output_path).await;
        assert_eq!(
            written.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5]
        );
        assert_eq!(written[0].category, Some(Category::Internal));
        assert_eq!(written[0].emails, Some(vec!["ops@example.com".to_string()]));
    }

    #[tokio::test]
    async fn rerun_skips_successful_messages_and_keeps_them() {
        let tmp = tempdir().unwrap();
        let output_path = tmp.path().join("results.json");
        output::write_results(
            &output_path,
            &[
                EnrichmentResult::succeeded(
                    1,
                    models::ValidatedResponse {
                        category: Category::Phishing,
                        description: "Earlier run".into(),
                        emails: vec![],
                    },
                ),
                EnrichmentResult::failed(2, "Processing error: timeout"),
            ],
        )
        .await
        .unwrap();

        let llm = llm();
        let app = EnrichmentApp::new(InMemoryQueue::new(0), llm.clone(), 2, output_path.clone());
        let summary = app.process(messages(&[1, 2, 3])).await.unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 2);

        let written = output::load_previous(&output_path).await;
        assert_eq!(written.len(), 3);
        assert_eq!(written[0].description.as_deref(), Some("Earlier run"));
        assert!(written.iter().all(|r| r.success));
    }

    #[tokio::test]
    async fn bounded_queue_smaller_than_dataset_processes_every_message() {
        let tmp = tempdir().unwrap();
        let output_path = tmp.path().join("results.json");
        let llm = llm();
        let app = EnrichmentApp::new(InMemoryQueue::new(2), llm.clone(), 1, output_path.clone());

        let summary = app.process(messages(&[1, 2, 3, 4, 5])).await.unwrap();

        assert_eq!(summary.total, 5);
        assert_eq!(summary.succeeded, 5);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 5);
        let written = output::load_previous(&output_path).await;
        assert_eq!(
            written.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5]
        );
    }

    #[test]
    fn summary_rates() {
        let results = vec![
            EnrichmentResult::failed(1, "x"),
            EnrichmentResult::failed(2, "y"),
        ];
        let summary = Summary::new(&results, 0, 1, Duration::from_secs(4));
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.average_secs(), 2.0);
        assert_eq!(summary.throughput(), 0.5);

        let empty = Summary::new(&[], 0, 1, Duration::ZERO);
        assert_eq!(empty.average_secs(), 0.0);
        assert_eq!(empty.throughput(), 0.0);
    }
}

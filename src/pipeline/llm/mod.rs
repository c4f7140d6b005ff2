use std::future::Future;

use serde_json::Value;

use crate::error::CommandResult;

pub mod client;
pub mod prompts;

pub use client::{OllamaClient, RetryPolicy};

/// Text generation backend used by the message processor.
pub trait LlmProvider: Send + Sync {
    /// Sends `prompt` and returns the model's answer parsed as JSON.
    fn generate(&self, prompt: &str) -> impl Future<Output = CommandResult<Value>> + Send;

    fn health_check(&self) -> impl Future<Output = bool> + Send;
}

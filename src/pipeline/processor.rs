use crate::pipeline::llm::{prompts::build_extraction_prompt, LlmProvider};
use crate::pipeline::models::{EnrichmentResult, Message};
use crate::pipeline::validation::ResponseValidator;

/// Runs one message through prompt, model and validation.
#[derive(Debug, Clone)]
pub struct MessageProcessor<P> {
    llm: P,
    validator: ResponseValidator,
}

impl<P: LlmProvider> MessageProcessor<P> {
    pub fn new(llm: P) -> Self {
        Self::with_validator(llm, ResponseValidator::default())
    }

    pub fn with_validator(llm: P, validator: ResponseValidator) -> Self {
        Self { llm, validator }
    }

    /// Never fails: problems are recorded on the returned result.
    pub async fn process(&self, message: &Message) -> EnrichmentResult {
        tracing::debug!(id = message.id, "processing message");

        let prompt = build_extraction_prompt(&message.text);
        let outcome = match self.llm.generate(&prompt).await {
            Ok(answer) => self.validator.validate(&answer),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(validated) => EnrichmentResult::succeeded(message.id, validated),
            Err(err) => {
                tracing::warn!(id = message.id, error = %err, "message enrichment failed");
                EnrichmentResult::failed(message.id, format!("Processing error: {err}"))
            }
        }
    }
}

use std::path::PathBuf;

use thiserror::Error;

pub type CommandResult<T> = Result<T, EnricherError>;

#[derive(Debug, Error)]
pub enum EnricherError {
    #[error("compose command is empty")]
    EmptyComposeCommand,

    #[error("failed to spawn {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for {program}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("dataset file not found: {}", .0.display())]
    DatasetNotFound(PathBuf),

    #[error("invalid message at position {position}: {reason}")]
    InvalidMessage { position: usize, reason: String },

    #[error("message id must be positive")]
    ZeroMessageId,

    #[error("message text must be 1 to {max} characters, got {len}")]
    MessageTextLength { len: usize, max: usize },

    #[error("queue is closed")]
    QueueClosed,

    #[error("LLM service is not available at {0}")]
    LlmUnavailable(String),

    #[error("LLM request failed: {0}")]
    Llm(String),

    #[error("{0}")]
    Validation(String),

    #[error("failed to write results to {}", .path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

use std::{path::PathBuf, time::Duration};

use clap::{Args as ClapArgs, Parser, ValueEnum};

/// Command-line arguments for the enricher CLI.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "enricher",
    version,
    about = "Drives the enrichment stack through docker-compose and runs the LLM enrichment pipeline.",
    long_about = None
)]
pub struct Args {
    /// Command to run: start, stop, logs, setup, clean, run or help.
    #[arg(value_name = "COMMAND")]
    pub command: Option<String>,

    #[command(flatten)]
    pub compose: ComposeArgs,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

impl Args {
    /// URL polled by `setup` while waiting for the model service.
    pub fn ready_url(&self) -> String {
        match &self.compose.ready_url {
            Some(url) => url.clone(),
            None => format!("{}/api/tags", self.pipeline.llm_url.trim_end_matches('/')),
        }
    }
}

/// Options for the docker-compose wrapper commands.
#[derive(Debug, Clone, ClapArgs)]
pub struct ComposeArgs {
    /// Orchestration tool to invoke. Extra words are passed as leading arguments.
    #[arg(long, env = "COMPOSE_BIN", default_value = "docker-compose")]
    pub compose_bin: String,

    /// Compose file passed with `-f`.
    #[arg(long, env = "COMPOSE_FILE", value_name = "PATH")]
    pub compose_file: Option<PathBuf>,

    /// Service that hosts the model runtime.
    #[arg(long, env = "MODEL_SERVICE", default_value = "ollama")]
    pub service: String,

    /// Tool inside the service container used to fetch models.
    #[arg(long, env = "MODEL_TOOL", default_value = "ollama")]
    pub model_tool: String,

    /// Upper bound on the wait between starting the service and pulling the model.
    #[arg(long, env = "SETUP_DELAY_SECS", default_value_t = 10)]
    pub setup_delay_secs: u64,

    /// Readiness endpoint polled during setup [default: <LLM_URL>/api/tags].
    #[arg(long, env = "READY_URL")]
    pub ready_url: Option<String>,

    /// Sleep for the full setup delay instead of polling for readiness.
    #[arg(long)]
    pub no_ready_check: bool,
}

impl ComposeArgs {
    pub fn setup_delay(&self) -> Duration {
        Duration::from_secs(self.setup_delay_secs)
    }
}

/// Options for the enrichment pipeline.
#[derive(Debug, Clone, ClapArgs)]
pub struct PipelineArgs {
    /// Base URL of the Ollama-compatible LLM service.
    #[arg(long, env = "LLM_URL", default_value = "http://localhost:11434")]
    pub llm_url: String,

    /// Model used for generation and fetched by `setup`.
    #[arg(long, env = "MODEL_NAME", default_value = "llama3:latest")]
    pub model_name: String,

    /// Per-request timeout in seconds.
    #[arg(long, env = "TIMEOUT_S", default_value_t = 60)]
    pub timeout_secs: u64,

    /// Retries after the first failed LLM request.
    #[arg(long, env = "RETRIES", default_value_t = 3)]
    pub retries: u32,

    #[arg(long, env = "RETRY_BACKOFF_BASE_S", default_value_t = 1.0)]
    pub retry_backoff_base_secs: f64,

    #[arg(long, env = "RETRY_BACKOFF_MAX_S", default_value_t = 30.0)]
    pub retry_backoff_max_secs: f64,

    #[arg(long, env = "RETRY_JITTER_S", default_value_t = 0.25)]
    pub retry_jitter_secs: f64,

    /// HTTP status codes that trigger a retry.
    #[arg(
        long,
        env = "RETRY_STATUS_CODES",
        value_delimiter = ',',
        default_value = "429,500,502,503,504"
    )]
    pub retry_status_codes: Vec<u16>,

    #[arg(long, env = "QUEUE_TYPE", value_enum, ignore_case = true, default_value_t = QueueKind::Memory)]
    pub queue_type: QueueKind,

    /// Capacity of the in-memory queue; 0 means unbounded.
    #[arg(long, env = "MEMORY_QUEUE_MAX_SIZE", default_value_t = 0)]
    pub queue_max_size: usize,

    /// Number of concurrent workers.
    #[arg(long, env = "MAX_CONCURRENCY", default_value_t = 4, value_parser = clap::value_parser!(u16).range(1..))]
    pub max_concurrency: u16,

    #[arg(long, env = "INPUT_PATH", value_name = "PATH", default_value = "data/messages.json")]
    pub input_path: PathBuf,

    #[arg(long, env = "OUTPUT_PATH", value_name = "PATH", default_value = "output/results.json")]
    pub output_path: PathBuf,
}

impl PipelineArgs {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Message queue backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum QueueKind {
    Memory,
}

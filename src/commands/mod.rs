pub mod compose;
pub mod help;
pub mod ready;

use crate::cli::Args;
use crate::error::CommandResult;
use crate::pipeline;

use compose::{Compose, Step};

/// What a single command token asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Help,
    Start,
    Stop,
    Logs,
    Setup,
    Clean,
    Run,
}

impl Action {
    /// Maps the command token; anything unrecognized shows help.
    pub fn from_token(token: Option<&str>) -> Self {
        match token {
            Some("start") => Self::Start,
            Some("stop") => Self::Stop,
            Some("logs") => Self::Logs,
            Some("setup") => Self::Setup,
            Some("clean") => Self::Clean,
            Some("run") => Self::Run,
            _ => Self::Help,
        }
    }

    /// Orchestration steps for this action. Empty for actions handled in-process.
    pub fn plan(self, compose: &Compose, args: &Args) -> Vec<Step> {
        match self {
            Self::Help | Self::Run => Vec::new(),
            Self::Start => vec![Step::Run(compose.up_build())],
            Self::Stop => vec![Step::Run(compose.down())],
            Self::Logs => vec![Step::Run(compose.follow_logs())],
            Self::Clean => vec![Step::Run(compose.down_with_volumes())],
            Self::Setup => {
                let service = args.compose.service.as_str();
                let wait = if args.compose.no_ready_check {
                    Step::Sleep(args.compose.setup_delay())
                } else {
                    Step::AwaitReady {
                        url: args.ready_url(),
                        budget: args.compose.setup_delay(),
                    }
                };
                vec![
                    Step::Run(compose.up_detached(service)),
                    wait,
                    Step::Run(compose.exec(
                        service,
                        &[
                            args.compose.model_tool.as_str(),
                            "pull",
                            args.pipeline.model_name.as_str(),
                        ],
                    )),
                ]
            }
        }
    }
}

/// Dispatches execution to the appropriate command handler and returns the exit code.
pub async fn execute(args: &Args) -> CommandResult<i32> {
    let action = Action::from_token(args.command.as_deref());
    tracing::debug!(?action, token = ?args.command, "dispatching");

    match action {
        Action::Help => {
            help::write_usage(&mut std::io::stdout().lock())?;
            Ok(0)
        }
        Action::Run => {
            pipeline::run(&args.pipeline).await?;
            Ok(0)
        }
        action => {
            let compose = Compose::from_args(&args.compose)?;
            compose::execute(&action.plan(&compose, args)).await
        }
    }
}

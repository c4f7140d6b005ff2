use std::{fmt, process::ExitStatus, time::Duration};

use tokio::{process::Command, sync::watch, task::JoinHandle};

use crate::cli::ComposeArgs;
use crate::commands::ready;
use crate::error::{CommandResult, EnricherError};

/// A fully resolved external command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// One unit of work in a dispatched command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Run(Invocation),
    /// Poll `url` until it answers or `budget` runs out, then continue either way.
    AwaitReady { url: String, budget: Duration },
    Sleep(Duration),
}

/// The orchestration tool plus the arguments every invocation starts with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compose {
    program: String,
    leading: Vec<String>,
}

impl Compose {
    pub fn from_args(args: &ComposeArgs) -> CommandResult<Self> {
        let mut words = args.compose_bin.split_whitespace().map(str::to_owned);
        let program = words.next().ok_or(EnricherError::EmptyComposeCommand)?;
        let mut leading: Vec<String> = words.collect();

        if let Some(file) = &args.compose_file {
            leading.push("-f".to_owned());
            leading.push(file.display().to_string());
        }

        Ok(Self { program, leading })
    }

    pub fn invocation<I, S>(&self, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut all = self.leading.clone();
        all.extend(args.into_iter().map(Into::into));
        Invocation {
            program: self.program.clone(),
            args: all,
        }
    }

    pub fn up_build(&self) -> Invocation {
        self.invocation(["up", "--build"])
    }

    pub fn down(&self) -> Invocation {
        self.invocation(["down"])
    }

    pub fn down_with_volumes(&self) -> Invocation {
        self.invocation(["down", "-v"])
    }

    pub fn follow_logs(&self) -> Invocation {
        self.invocation(["logs", "-f"])
    }

    pub fn up_detached(&self, service: &str) -> Invocation {
        self.invocation(["up", "-d", service])
    }

    pub fn exec(&self, service: &str, command: &[&str]) -> Invocation {
        let mut args = vec!["exec", service];
        args.extend_from_slice(command);
        self.invocation(args)
    }
}

/// Exit code reported when the plan is cut short by Ctrl+C.
pub const INTERRUPTED: i32 = 130;

/// Runs the steps in order and returns the exit code of the command line.
///
/// The first non-zero exit ends the plan and becomes the result. Ctrl+C ends
/// the plan too: a running child is waited for, later steps are skipped.
pub async fn execute(steps: &[Step]) -> CommandResult<i32> {
    if steps.is_empty() {
        return Ok(0);
    }

    let mut interrupts = Interrupts::listen()?;
    for step in steps {
        match step {
            Step::Run(invocation) => {
                tracing::info!(command = %invocation, "running");
                let status = run_foreground(invocation, &mut interrupts).await?;
                let code = exit_code(status);
                if code != 0 {
                    tracing::warn!(command = %invocation, code, "command failed");
                    return Ok(code);
                }
                if interrupts.received() {
                    tracing::warn!(command = %invocation, "interrupted, skipping remaining steps");
                    return Ok(INTERRUPTED);
                }
            }
            Step::AwaitReady { url, budget } => {
                tokio::select! {
                    _ = ready::wait_until_ready(url, *budget) => {}
                    _ = interrupts.wait() => {
                        tracing::warn!("interrupted while waiting for service");
                        return Ok(INTERRUPTED);
                    }
                }
            }
            Step::Sleep(delay) => {
                tracing::info!(seconds = delay.as_secs(), "waiting for service");
                tokio::select! {
                    _ = tokio::time::sleep(*delay) => {}
                    _ = interrupts.wait() => {
                        tracing::warn!("interrupted while waiting for service");
                        return Ok(INTERRUPTED);
                    }
                }
            }
        }
    }

    Ok(0)
}

/// Records Ctrl+C for the lifetime of a plan.
///
/// Registering the handler replaces the default SIGINT behavior, so every
/// step has to observe this flag.
struct Interrupts {
    received: watch::Receiver<bool>,
    listener: JoinHandle<()>,
}

impl Interrupts {
    #[cfg(unix)]
    fn listen() -> CommandResult<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut interrupt = signal(SignalKind::interrupt())?;
        let (tx, received) = watch::channel(false);
        let listener = tokio::spawn(async move {
            while interrupt.recv().await.is_some() {
                tx.send_replace(true);
            }
        });
        Ok(Self { received, listener })
    }

    #[cfg(not(unix))]
    fn listen() -> CommandResult<Self> {
        let (tx, received) = watch::channel(false);
        let listener = tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                tx.send_replace(true);
            }
        });
        Ok(Self { received, listener })
    }

    fn received(&self) -> bool {
        *self.received.borrow()
    }

    /// Resolves once Ctrl+C has been pressed; never resolves if the listener is gone.
    async fn wait(&mut self) {
        if self.received.wait_for(|received| *received).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl Drop for Interrupts {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

async fn run_foreground(
    invocation: &Invocation,
    interrupts: &mut Interrupts,
) -> CommandResult<ExitStatus> {
    let mut child = Command::new(&invocation.program)
        .args(&invocation.args)
        .spawn()
        .map_err(|source| EnricherError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;

    // Ctrl+C reaches the child as well; keep waiting so its exit code is the one reported.
    let mut interrupted = interrupts.received();
    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            _ = interrupts.wait(), if !interrupted => {
                interrupted = true;
                tracing::debug!(program = %invocation.program, "interrupted, waiting for child to exit");
            }
        }
    };

    status.map_err(|source| EnricherError::Wait {
        program: invocation.program.clone(),
        source,
    })
}

fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}

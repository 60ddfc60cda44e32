//! Child-process execution of manifest scripts under a time budget.
//!
//! A run drains stdout and stderr while the child is alive, requests
//! termination once the budget expires, and resolves only after the exit is
//! observed. A child that ignores the termination request keeps the run
//! pending; there is no second, harder kill.

use std::future::Future;
use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};

/// Captured result of a single script run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOutcome {
    /// Whether the process exited successfully.
    pub success: bool,
    /// Wall-clock time from spawn to observed exit.
    pub duration_ms: u64,
    /// Everything the process wrote to stdout.
    pub stdout: String,
    /// Everything the process wrote to stderr.
    pub stderr: String,
}

/// Runs a named script inside a working directory.
pub trait ScriptRunner {
    /// Run `name` in `cwd`, requesting termination after `timeout`.
    /// Failures are reported through `ScriptOutcome::success`, never raised.
    fn run(
        &self,
        name: &str,
        cwd: &Path,
        timeout: Duration,
    ) -> impl Future<Output = ScriptOutcome> + Send;
}

/// Runs scripts as `<program> <args..> <name> <trailing args..>`.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: String,
    args: Vec<String>,
    trailing_args: Vec<String>,
    verbose: bool,
}

impl ProcessRunner {
    /// Runner for `program` with no extra arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            trailing_args: Vec::new(),
            verbose: false,
        }
    }

    /// Runner invoking `npm run <name> --silent`.
    pub fn npm() -> Self {
        let program = if cfg!(windows) { "npm.cmd" } else { "npm" };
        Self::new(program).arg("run").trailing_arg("--silent")
    }

    /// Append an argument placed before the script name.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append an argument placed after the script name.
    pub fn trailing_arg(mut self, arg: impl Into<String>) -> Self {
        self.trailing_args.push(arg.into());
        self
    }

    /// Echo child output to this process's stdout/stderr as it arrives.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn command(&self, name: &str, cwd: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(name)
            .args(&self.trailing_args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }
}

impl ScriptRunner for ProcessRunner {
    async fn run(&self, name: &str, cwd: &Path, timeout: Duration) -> ScriptOutcome {
        let started = Instant::now();
        log::debug!("running script `{name}` in {}", cwd.display());

        let mut child = match self.command(name, cwd).spawn() {
            Ok(child) => child,
            Err(err) => {
                log::warn!("failed to spawn `{}` for script `{name}`: {err}", self.program);
                return ScriptOutcome {
                    success: false,
                    duration_ms: elapsed_ms(started),
                    stdout: String::new(),
                    stderr: err.to_string(),
                };
            }
        };

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let (status, stdout, stderr) = tokio::join!(
            wait_with_timeout(&mut child, timeout, name),
            drain(stdout_pipe, self.verbose.then_some(Echo::Stdout)),
            drain(stderr_pipe, self.verbose.then_some(Echo::Stderr)),
        );

        let success = match status {
            Ok(status) => status.success(),
            Err(err) => {
                log::warn!("failed to wait for script `{name}`: {err}");
                false
            }
        };

        ScriptOutcome {
            success,
            duration_ms: elapsed_ms(started),
            stdout,
            stderr,
        }
    }
}

async fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
    name: &str,
) -> io::Result<ExitStatus> {
    tokio::select! {
        status = child.wait() => status,
        _ = tokio::time::sleep(timeout) => {
            log::warn!(
                "script `{name}` exceeded {}ms, requesting termination",
                timeout.as_millis()
            );
            // SIGKILL on unix.
            if let Err(err) = child.start_kill() {
                log::warn!("failed to signal script `{name}`: {err}");
            }
            child.wait().await
        }
    }
}

#[derive(Debug, Copy, Clone)]
enum Echo {
    Stdout,
    Stderr,
}

impl Echo {
    async fn write(self, bytes: &[u8]) {
        let result = match self {
            Echo::Stdout => {
                let mut out = tokio::io::stdout();
                match out.write_all(bytes).await {
                    Ok(()) => out.flush().await,
                    Err(err) => Err(err),
                }
            }
            Echo::Stderr => {
                let mut out = tokio::io::stderr();
                match out.write_all(bytes).await {
                    Ok(()) => out.flush().await,
                    Err(err) => Err(err),
                }
            }
        };
        if let Err(err) = result {
            log::debug!("failed to echo child output: {err}");
        }
    }
}

async fn drain<R>(pipe: Option<R>, echo: Option<Echo>) -> String
where
    R: AsyncRead + Unpin,
{
    let Some(mut pipe) = pipe else {
        return String::new();
    };
    let mut captured = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) => break,
            Ok(read) => {
                captured.extend_from_slice(&chunk[..read]);
                if let Some(echo) = echo {
                    echo.write(&chunk[..read]).await;
                }
            }
            Err(err) => {
                log::debug!("stopped reading child output: {err}");
                break;
            }
        }
    }
    String::from_utf8_lossy(&captured).into_owned()
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

//! Process Runner: bounded execution of a synthesized command.
//!
//! Children never inherit the host's stdin/stdout (those carry the frame
//! channel). On Unix each child leads its own process group so a timeout can
//! take down anything it spawned (`go run` builds and execs a second process).

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::time::Instant;

use crate::bridge::protocol::ExecutionResult;
use crate::synth::{Argv, ExecutionStrategy};

/// Default wall-clock limit for one `execute` request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Reported as `output` for detached opens.
pub const OPENED_MESSAGE: &str = "File opened successfully";

enum StepOutcome {
    Exited {
        stdout: String,
        stderr: String,
        code: i32,
    },
    TimedOut,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn timeout_message(&self) -> String {
        // f64 Display drops a zero fraction: 30s -> "30", 500ms -> "0.5".
        format!("Command timed out after {} seconds", self.timeout.as_secs_f64())
    }

    /// Run a strategy to completion (or timeout) and capture its outcome.
    ///
    /// Never fails: spawn errors and timeouts come back as `returncode: -1`.
    pub async fn run(&self, strategy: &ExecutionStrategy) -> ExecutionResult {
        let command = strategy.render();
        let deadline = Instant::now() + self.timeout;

        match strategy {
            ExecutionStrategy::Direct(argv) | ExecutionStrategy::CompileOnly(argv) => {
                match run_step(argv, deadline).await {
                    StepOutcome::Exited {
                        stdout,
                        stderr,
                        code,
                    } => ExecutionResult {
                        output: stdout,
                        error: stderr,
                        returncode: code,
                        command,
                    },
                    StepOutcome::TimedOut => {
                        ExecutionResult::failed(self.timeout_message(), command)
                    }
                    StepOutcome::Failed(message) => ExecutionResult::failed(message, command),
                }
            }
            ExecutionStrategy::Pipeline(steps) => self.run_pipeline(steps, deadline, command).await,
            ExecutionStrategy::Open(argv) => launch_detached(argv, command),
        }
    }

    /// Run steps in order under one deadline; stop at the first non-zero exit.
    async fn run_pipeline(
        &self,
        steps: &[Argv],
        deadline: Instant,
        command: String,
    ) -> ExecutionResult {
        let mut output = String::new();
        let mut error = String::new();
        let mut returncode = 0;

        for (index, step) in steps.iter().enumerate() {
            match run_step(step, deadline).await {
                StepOutcome::Exited {
                    stdout,
                    stderr,
                    code,
                } => {
                    output.push_str(&stdout);
                    error.push_str(&stderr);
                    returncode = code;
                    if code != 0 {
                        tracing::debug!(step = index, code, "Pipeline step failed, stopping");
                        break;
                    }
                }
                StepOutcome::TimedOut => {
                    return ExecutionResult::failed(self.timeout_message(), command);
                }
                StepOutcome::Failed(message) => {
                    error.push_str(&message);
                    return ExecutionResult {
                        output,
                        error,
                        returncode: -1,
                        command,
                    };
                }
            }
        }

        ExecutionResult {
            output,
            error,
            returncode,
            command,
        }
    }
}

async fn run_step(argv: &Argv, deadline: Instant) -> StepOutcome {
    let mut cmd = Command::new(argv.program());
    cmd.args(argv.arguments())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    {
        cmd.process_group(0);
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            tracing::warn!(program = %argv.program(), error = %e, "Failed to spawn process");
            return StepOutcome::Failed(format!("failed to spawn {}: {e}", argv.program()));
        }
    };
    tracing::debug!(pid = ?child.id(), command = %argv, "Process spawned");

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let waited = tokio::time::timeout_at(deadline, async {
        tokio::join!(child.wait(), read_pipe(stdout), read_pipe(stderr))
    })
    .await;

    match waited {
        Ok((Ok(status), stdout, stderr)) => StepOutcome::Exited {
            stdout,
            stderr,
            code: exit_code(status),
        },
        Ok((Err(e), _, _)) => StepOutcome::Failed(format!("failed to wait for {}: {e}", argv.program())),
        Err(_) => {
            tracing::warn!(command = %argv, "Process timed out, terminating");
            terminate(&mut child).await;
            StepOutcome::TimedOut
        }
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe
        && let Err(e) = pipe.read_to_end(&mut buf).await
    {
        tracing::debug!(error = %e, "Failed to read child pipe");
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Exit code, or `-signal` for a signal-terminated child on Unix.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

/// Kill the child (and its process group on Unix) and reap it.
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        if let Some(pid) = child.id()
            && let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL)
        {
            tracing::debug!(pid, error = %e, "Failed to signal process group");
        }
    }
    if let Err(e) = child.kill().await {
        tracing::warn!(error = %e, "Failed to kill timed-out process");
    }
}

/// Launch without waiting. The child is reaped in the background by tokio.
fn launch_detached(argv: &Argv, command: String) -> ExecutionResult {
    let spawned = Command::new(argv.program())
        .args(argv.arguments())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();

    match spawned {
        Ok(child) => {
            tracing::debug!(pid = ?child.id(), command = %argv, "Launched detached process");
            ExecutionResult {
                output: OPENED_MESSAGE.to_string(),
                error: String::new(),
                returncode: 0,
                command,
            }
        }
        Err(e) => {
            tracing::warn!(program = %argv.program(), error = %e, "Failed to launch opener");
            ExecutionResult::failed(format!("failed to spawn {}: {e}", argv.program()), command)
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> ExecutionStrategy {
        ExecutionStrategy::Direct(Argv::new("sh").args(["-c", script]))
    }

    #[test]
    fn timeout_message_keeps_fractional_seconds() {
        let message = |timeout| ProcessRunner::new(timeout).timeout_message();
        assert_eq!(
            message(Duration::from_secs(30)),
            "Command timed out after 30 seconds"
        );
        assert_eq!(
            message(Duration::from_millis(500)),
            "Command timed out after 0.5 seconds"
        );
    }

    #[tokio::test]
    async fn captures_stdout_stderr_and_exit_code_separately() {
        let runner = ProcessRunner::default();
        let result = runner.run(&sh("echo out; echo err >&2; exit 3")).await;

        assert_eq!(result.output, "out\n");
        assert_eq!(result.error, "err\n");
        assert_eq!(result.returncode, 3);
        assert_eq!(result.command, "sh -c echo out; echo err >&2; exit 3");
    }

    #[tokio::test]
    async fn missing_executable_is_reported_not_raised() {
        let runner = ProcessRunner::default();
        let strategy = ExecutionStrategy::Direct(Argv::new("codehost-definitely-missing-binary"));
        let result = runner.run(&strategy).await;

        assert_eq!(result.returncode, -1);
        assert!(result.output.is_empty());
        assert!(
            result
                .error
                .starts_with("failed to spawn codehost-definitely-missing-binary"),
            "{}",
            result.error
        );
    }

    #[tokio::test]
    async fn timeout_kills_child_and_reports() {
        let runner = ProcessRunner::new(Duration::from_secs(1));
        let started = std::time::Instant::now();
        let result = runner.run(&sh("sleep 30")).await;

        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(result.returncode, -1);
        assert_eq!(result.output, "");
        assert_eq!(result.error, "Command timed out after 1 seconds");
    }

    #[tokio::test]
    async fn timeout_takes_down_grandchildren() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("late");
        let script = format!("(sleep 2; touch {}) & wait", marker.display());

        let runner = ProcessRunner::new(Duration::from_secs(1));
        let result = runner.run(&sh(&script)).await;
        assert_eq!(result.returncode, -1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!marker.exists(), "grandchild survived the timeout");
    }

    #[tokio::test]
    async fn signal_exit_is_negative() {
        let runner = ProcessRunner::default();
        let result = runner.run(&sh("kill -9 $$")).await;
        assert_eq!(result.returncode, -9);
    }

    #[tokio::test]
    async fn pipeline_stops_at_first_failure() {
        let runner = ProcessRunner::default();
        let strategy = ExecutionStrategy::Pipeline(vec![
            Argv::new("sh").args(["-c", "echo compiling; exit 1"]),
            Argv::new("sh").args(["-c", "echo should-not-run"]),
        ]);
        let result = runner.run(&strategy).await;

        assert_eq!(result.output, "compiling\n");
        assert_eq!(result.returncode, 1);
        assert_eq!(
            result.command,
            "sh -c echo compiling; exit 1 && sh -c echo should-not-run"
        );
    }

    #[tokio::test]
    async fn pipeline_runs_all_steps_on_success() {
        let runner = ProcessRunner::default();
        let strategy = ExecutionStrategy::Pipeline(vec![
            Argv::new("sh").args(["-c", "echo one"]),
            Argv::new("sh").args(["-c", "echo two; echo warn >&2; exit 4"]),
        ]);
        let result = runner.run(&strategy).await;

        assert_eq!(result.output, "one\ntwo\n");
        assert_eq!(result.error, "warn\n");
        assert_eq!(result.returncode, 4);
    }

    #[tokio::test]
    async fn pipeline_shares_one_deadline() {
        let runner = ProcessRunner::new(Duration::from_secs(1));
        let strategy = ExecutionStrategy::Pipeline(vec![
            Argv::new("sleep").arg("0.7"),
            Argv::new("sleep").arg("0.7"),
        ]);
        let result = runner.run(&strategy).await;
        assert_eq!(result.error, "Command timed out after 1 seconds");
        assert_eq!(result.returncode, -1);
    }

    #[tokio::test]
    async fn detached_open_reports_synthetic_success() {
        let runner = ProcessRunner::default();
        let strategy = ExecutionStrategy::Open(Argv::new("true"));
        let result = runner.run(&strategy).await;

        assert_eq!(result.output, OPENED_MESSAGE);
        assert_eq!(result.error, "");
        assert_eq!(result.returncode, 0);
        assert_eq!(result.command, "true");
    }
}

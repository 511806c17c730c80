//! External tool invocation.
//!
//! [`ExternalProcess`] spawns one command, streams its output into `tracing`,
//! keeps the tail of that output, and kills and reaps the child when its
//! cancellation token fires.

mod template;

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{Error, Result};

pub use template::{CommandLine, CommandTemplate, TemplateVars};

/// Number of output lines kept for interrogation after the process exits.
pub const OUTPUT_TAIL_LINES: usize = 200;

/// Result of a finished (or killed) process.
#[derive(Debug, Clone, Default)]
pub struct ProcessExit {
    /// Exit code; `None` when the process died from a signal or was killed.
    pub code: Option<i32>,
    /// Whether the process was killed through its cancellation token.
    pub killed: bool,
    /// Last [`OUTPUT_TAIL_LINES`] lines of stdout and stderr, interleaved.
    pub output: Vec<String>,
}

impl ProcessExit {
    /// Exit code 0 is the only success.
    pub fn success(&self) -> bool {
        !self.killed && self.code == Some(0)
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.code
    }
}

#[derive(Debug, Clone, Default)]
struct OutputTail(Arc<Mutex<VecDeque<String>>>);

impl OutputTail {
    fn push(&self, line: String) {
        let mut lines = self.0.lock();
        if lines.len() == OUTPUT_TAIL_LINES {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    fn take(&self) -> Vec<String> {
        self.0.lock().drain(..).collect()
    }
}

/// A running external command.
#[derive(Debug)]
pub struct ExternalProcess {
    program: String,
    pid: Option<u32>,
    kill: CancellationToken,
    monitor: JoinHandle<ProcessExit>,
}

impl ExternalProcess {
    /// Spawn `command`. Cancelling `token` kills the process.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(command: &CommandLine, token: &CancellationToken) -> Result<Self> {
        let mut cmd = process_utils::tokio_command(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| Error::Spawn {
            program: command.program.clone(),
            source,
        })?;
        let pid = child.id();
        debug!(program = %command.program, pid = ?pid, "Spawned {}", command);

        let tail = OutputTail::default();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, "stdout", tail.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, "stderr", tail.clone()));
        }

        let kill = token.child_token();
        let cancelled = kill.clone();
        let program = command.program.clone();

        let monitor = tokio::spawn(async move {
            let (code, killed) = tokio::select! {
                status = child.wait() => match status {
                    Ok(status) => (status.code(), false),
                    Err(e) => {
                        warn!(program = %program, error = %e, "Failed to wait for process");
                        (None, false)
                    }
                },
                _ = cancelled.cancelled() => {
                    debug!(program = %program, "Killing process");
                    // `kill` also waits for the child, so it never lingers as a zombie.
                    if let Err(e) = child.kill().await {
                        warn!(program = %program, error = %e, "Failed to kill process");
                    }
                    (None, true)
                }
            };

            if killed {
                // A grandchild may still hold the pipes open.
                for reader in &readers {
                    reader.abort();
                }
            } else {
                for reader in readers {
                    let _ = reader.await;
                }
            }

            ProcessExit {
                code,
                killed,
                output: tail.take(),
            }
        });

        Ok(Self {
            program: command.program.clone(),
            pid,
            kill,
            monitor,
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Forcibly terminate the process. Safe to call more than once.
    pub fn kill(&self) {
        self.kill.cancel();
    }

    /// Wait for the process to terminate.
    pub async fn wait(self) -> ProcessExit {
        match self.monitor.await {
            Ok(exit) => exit,
            Err(e) => {
                warn!(program = %self.program, error = %e, "Process monitor failed");
                ProcessExit::default()
            }
        }
    }
}

fn spawn_reader<R>(stream: R, name: &'static str, tail: OutputTail) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!("{}: {}", name, line);
            tail.push(line);
        }
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sh(script: &str) -> CommandLine {
        CommandLine {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
        }
    }

    #[tokio::test]
    async fn test_exit_code_zero_is_success() {
        let token = CancellationToken::new();
        let exit = ExternalProcess::spawn(&sh("echo hello; echo oops >&2"), &token)
            .unwrap()
            .wait()
            .await;
        assert!(exit.success());
        assert_eq!(exit.exit_code(), Some(0));
        assert!(exit.output.contains(&"hello".to_string()));
        assert!(exit.output.contains(&"oops".to_string()));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let token = CancellationToken::new();
        let exit = ExternalProcess::spawn(&sh("exit 7"), &token)
            .unwrap()
            .wait()
            .await;
        assert!(!exit.success());
        assert_eq!(exit.exit_code(), Some(7));
    }

    #[tokio::test]
    async fn test_cancel_kills_process() {
        let token = CancellationToken::new();
        let process = ExternalProcess::spawn(&sh("sleep 30"), &token).unwrap();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let exit = tokio::time::timeout(Duration::from_secs(10), process.wait())
            .await
            .expect("killed process should be reaped promptly");
        assert!(exit.killed);
        assert!(!exit.success());
        assert_eq!(exit.exit_code(), None);
    }

    #[tokio::test]
    async fn test_kill_is_repeatable() {
        let token = CancellationToken::new();
        let process = ExternalProcess::spawn(&sh("sleep 30"), &token).unwrap();
        process.kill();
        process.kill();
        assert!(process.wait().await.killed);
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let token = CancellationToken::new();
        let command = CommandLine {
            program: "/nonexistent/recpipe-tool".to_string(),
            args: Vec::new(),
        };
        let err = ExternalProcess::spawn(&command, &token).unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_output_tail_is_bounded() {
        let token = CancellationToken::new();
        let exit = ExternalProcess::spawn(&sh("seq 1 500"), &token)
            .unwrap()
            .wait()
            .await;
        assert_eq!(exit.output.len(), OUTPUT_TAIL_LINES);
        assert_eq!(exit.output.last().map(String::as_str), Some("500"));
    }
}

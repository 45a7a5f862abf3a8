use std::io;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::ExecError;

/// What a finished child left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when the child was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Turn a non-zero exit into [`ExecError::NonZeroExit`], using `fallback`
    /// when the tool printed nothing on stderr.
    pub fn into_result(self, fallback: &str) -> Result<ProcessOutput, ExecError> {
        if self.success() {
            return Ok(self);
        }
        let stderr = if self.stderr.trim().is_empty() {
            fallback.to_string()
        } else {
            self.stderr
        };
        Err(ExecError::NonZeroExit {
            code: self.code,
            stderr,
        })
    }
}

/// Runs one external command to completion.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Spawn `argv`, write `stdin` if given and close it, then wait at most
    /// `timeout`. A child still running at the deadline is killed.
    async fn run(
        &self,
        argv: &[String],
        stdin: Option<&str>,
        timeout: Duration,
    ) -> Result<ProcessOutput, ExecError>;
}

/// [`ProcessRunner`] backed by `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

fn spawn_reader<R>(reader: Option<R>) -> Option<JoinHandle<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    reader.map(|mut reader| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Err(e) = reader.read_to_end(&mut buf).await {
                debug!("pipe read stopped early: {}", e);
            }
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

// A daemonized grandchild may keep the pipe open, so reading is bounded too.
async fn collect(task: Option<JoinHandle<String>>, deadline: Instant) -> String {
    let Some(mut task) = task else {
        return String::new();
    };
    match tokio::time::timeout_at(deadline, &mut task).await {
        Ok(Ok(text)) => text,
        Ok(Err(_)) => String::new(),
        Err(_) => {
            task.abort();
            String::new()
        }
    }
}

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(
        &self,
        argv: &[String],
        stdin: Option<&str>,
        timeout: Duration,
    ) -> Result<ProcessOutput, ExecError> {
        let Some((program, args)) = argv.split_first() else {
            return Err(ExecError::SpawnFailure {
                program: String::new(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "empty command"),
            });
        };

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let deadline = Instant::now() + timeout;
        let mut child = command.spawn().map_err(|source| ExecError::SpawnFailure {
            program: program.clone(),
            source,
        })?;
        let pid = child.id();
        debug!("spawned {} (pid {:?})", program, pid);

        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        // The stdin write shares the deadline: a child that never reads would
        // otherwise block us once the pipe buffer is full.
        let input_pipe = child.stdin.take();
        let finished = async {
            if let (Some(input), Some(mut pipe)) = (stdin, input_pipe) {
                match pipe.write_all(input.as_bytes()).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                        debug!("{} closed stdin before reading it", program);
                    }
                    Err(e) => warn!("failed to write stdin of {}: {}", program, e),
                }
            }
            child.wait().await
        };

        let status = match tokio::time::timeout_at(deadline, finished).await {
            Ok(Ok(status)) => status,
            Ok(Err(source)) => {
                return Err(ExecError::Io {
                    program: program.clone(),
                    source,
                })
            }
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!("failed to kill {} (pid {:?}): {}", program, pid, e);
                }
                for task in [stdout, stderr].into_iter().flatten() {
                    task.abort();
                }
                return Err(ExecError::Timeout {
                    program: program.clone(),
                    after: timeout,
                    pid,
                });
            }
        };

        Ok(ProcessOutput {
            code: status.code(),
            stdout: collect(stdout, deadline).await,
            stderr: collect(stderr, deadline).await,
        })
    }
}

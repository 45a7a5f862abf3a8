use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// A descriptor was rejected before any process was spawned.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Server address is required")]
    MissingServer,
    #[error("Username is required")]
    MissingUsername,
    #[error("Local directory is required")]
    MissingLocalDir,
    #[error("Password is required for password authentication")]
    MissingPassword,
    #[error("Private key file is required for key authentication")]
    MissingKeyFile,
    #[error("Private key file does not exist: {}", .0.display())]
    KeyFileNotFound(PathBuf),
    #[error("Invalid port: {0:?}")]
    InvalidPort(String),
    #[error("Failed to create local directory {}: {source}", .path.display())]
    CreateLocalDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Running an external tool failed.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("{program} timed out after {}s and was killed", .after.as_secs())]
    Timeout {
        program: String,
        after: Duration,
        /// Pid of the killed child, already reaped when this is returned.
        pid: Option<u32>,
    },
    #[error("{stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },
    #[error("Failed to run {program}: {source}")]
    SpawnFailure {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("I/O error while running {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
}

impl ExecError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecError::Timeout { .. })
    }
}

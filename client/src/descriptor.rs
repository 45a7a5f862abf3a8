use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::ValidationError;

pub const DEFAULT_PORT: u16 = 22;
pub const DEFAULT_REMOTE_DIR: &str = "/";

/// Which credential an sshfs/ssh invocation authenticates with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Password,
    PublicKey,
}

/// The active credential. Only one of the two can exist at a time.
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    Password(String),
    PublicKey(PathBuf),
}

impl Auth {
    pub fn method(&self) -> AuthMethod {
        match self {
            Auth::Password(_) => AuthMethod::Password,
            Auth::PublicKey(_) => AuthMethod::PublicKey,
        }
    }

    pub fn key_file(&self) -> Option<&Path> {
        match self {
            Auth::PublicKey(path) => Some(path),
            Auth::Password(_) => None,
        }
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Password(_) => f.write_str("Password(****)"),
            Auth::PublicKey(path) => f.debug_tuple("PublicKey").field(path).finish(),
        }
    }
}

/// Everything needed for one mount, unmount or connection test.
///
/// # Fields
///
/// - `server`: Host name or address of the SSH server.
/// - `port`: SSH port, `22` unless set.
/// - `username`: Remote user.
/// - `auth`: Password or identity file.
/// - `remote_dir`: Remote directory to mount, `/` unless set.
/// - `local_dir`: Local mount point. Created when missing.
/// - `additional_options`: Raw `-o` tokens passed through to sshfs, in order.
/// - `allow_other`: Adds `-o allow_other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub auth: Auth,
    pub remote_dir: String,
    pub local_dir: PathBuf,
    pub additional_options: Vec<String>,
    pub allow_other: bool,
}

impl ConnectionDescriptor {
    pub fn new(server: impl Into<String>, username: impl Into<String>, auth: Auth) -> Self {
        Self {
            server: server.into(),
            port: DEFAULT_PORT,
            username: username.into(),
            auth,
            remote_dir: DEFAULT_REMOTE_DIR.to_string(),
            local_dir: PathBuf::new(),
            additional_options: Vec::new(),
            allow_other: false,
        }
    }

    /// Profile key, `user@host`.
    pub fn name(&self) -> String {
        format!("{}@{}", self.username, self.server)
    }

    pub fn auth_method(&self) -> AuthMethod {
        self.auth.method()
    }

    /// `user@host:/remote/dir`, the first sshfs argument.
    pub fn remote_spec(&self) -> String {
        let remote_dir = self.remote_dir.trim();
        let remote_dir = if remote_dir.is_empty() {
            DEFAULT_REMOTE_DIR
        } else {
            remote_dir
        };
        format!("{}@{}:{}", self.username, self.server, remote_dir)
    }

    /// Replace the pass-through options with the whitespace-split tokens of `raw`.
    pub fn set_additional_options(&mut self, raw: &str) {
        self.additional_options = split_options(raw);
    }

    /// Pass-through options as the single space-separated string the profile file stores.
    pub fn additional_options_string(&self) -> String {
        self.additional_options.join(" ")
    }
}

pub fn split_options(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(String::from).collect()
}

/// Parse a port field. Blank means the default.
pub fn parse_port(raw: &str) -> Result<u16, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(DEFAULT_PORT);
    }
    match raw.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(ValidationError::InvalidPort(raw.to_string())),
    }
}

/// `~/.ssh/id_rsa` when it exists.
pub fn default_identity_file() -> Option<PathBuf> {
    let key = dirs::home_dir()?.join(".ssh").join("id_rsa");
    key.exists().then_some(key)
}

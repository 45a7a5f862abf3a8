use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Overrides the profile file location.
pub const PROFILE_PATH_ENV: &str = "SSHFS_GUI_CONFIG";
pub const PROFILE_FILE_NAME: &str = ".sshfs_gui_config.json";

/// Upper bounds for each external tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub mount: Duration,
    pub unmount: Duration,
    pub connection_test: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            mount: Duration::from_secs(10),
            unmount: Duration::from_secs(10),
            connection_test: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub profile_path: PathBuf,
    pub timeouts: Timeouts,
}

impl Settings {
    /// Resolve settings, `explicit_profile_path` first, then the environment,
    /// then the home directory.
    pub fn resolve(explicit_profile_path: Option<PathBuf>) -> Self {
        let profile_path = explicit_profile_path
            .or_else(|| env::var_os(PROFILE_PATH_ENV).map(PathBuf::from))
            .unwrap_or_else(default_profile_path);
        Self {
            profile_path,
            timeouts: Timeouts::default(),
        }
    }
}

/// `~/.sshfs_gui_config.json`, or the working directory when there is no home.
pub fn default_profile_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(PROFILE_FILE_NAME)
}

//! Recently used connections, most recent first, persisted as a JSON array.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::descriptor::{
    default_identity_file, parse_port, split_options, Auth, ConnectionDescriptor,
    DEFAULT_REMOTE_DIR,
};
use crate::error::ValidationError;

pub const CAPACITY: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoredAuthMethod {
    #[default]
    Password,
    Key,
}

fn default_port() -> String {
    "22".to_string()
}

fn default_remote_dir() -> String {
    DEFAULT_REMOTE_DIR.to_string()
}

/// A descriptor as written to disk. There is no password field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedDescriptor {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub server: String,
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub auth_method: StoredAuthMethod,
    #[serde(default)]
    pub key_file: String,
    #[serde(default = "default_remote_dir")]
    pub remote_dir: String,
    #[serde(default)]
    pub local_dir: String,
    #[serde(default)]
    pub additional_options: String,
    #[serde(default)]
    pub allow_other: bool,
}

impl From<&ConnectionDescriptor> for PersistedDescriptor {
    fn from(desc: &ConnectionDescriptor) -> Self {
        let (auth_method, key_file) = match &desc.auth {
            Auth::Password(_) => (StoredAuthMethod::Password, String::new()),
            Auth::PublicKey(path) => (StoredAuthMethod::Key, path.to_string_lossy().into_owned()),
        };
        Self {
            name: desc.name(),
            server: desc.server.clone(),
            port: desc.port.to_string(),
            username: desc.username.clone(),
            auth_method,
            key_file,
            remote_dir: desc.remote_dir.clone(),
            local_dir: desc.local_dir.to_string_lossy().into_owned(),
            additional_options: desc.additional_options_string(),
            allow_other: desc.allow_other,
        }
    }
}

impl PersistedDescriptor {
    /// Rebuild a transient descriptor. `password` fills in the credential the
    /// file never stores; a key profile without a key falls back to `~/.ssh/id_rsa`.
    pub fn to_descriptor(
        &self,
        password: Option<String>,
    ) -> Result<ConnectionDescriptor, ValidationError> {
        let auth = match self.auth_method {
            StoredAuthMethod::Password => Auth::Password(password.unwrap_or_default()),
            StoredAuthMethod::Key => {
                let key = if self.key_file.trim().is_empty() {
                    default_identity_file().unwrap_or_default()
                } else {
                    PathBuf::from(self.key_file.trim())
                };
                Auth::PublicKey(key)
            }
        };
        let remote_dir = if self.remote_dir.trim().is_empty() {
            default_remote_dir()
        } else {
            self.remote_dir.clone()
        };
        Ok(ConnectionDescriptor {
            server: self.server.clone(),
            port: parse_port(&self.port)?,
            username: self.username.clone(),
            auth,
            remote_dir,
            local_dir: PathBuf::from(&self.local_dir),
            additional_options: split_options(&self.additional_options),
            allow_other: self.allow_other,
        })
    }
}

fn read_profiles(path: &Path) -> Result<Vec<PersistedDescriptor>> {
    let text = fs::read_to_string(path).context("Failed to read profile file")?;
    serde_json::from_str(&text).context("Failed to parse profile file")
}

/// `profiles.json` -> `profiles.json.<suffix>`, next to the original.
fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

/// Read the profile file. Anything unreadable yields an empty list.
pub fn load_profiles(path: &Path) -> Vec<PersistedDescriptor> {
    load_or_flag(path).0
}

// The flag is set when a file exists but could not be used.
fn load_or_flag(path: &Path) -> (Vec<PersistedDescriptor>, bool) {
    if !path.exists() {
        return (Vec::new(), false);
    }
    match read_profiles(path) {
        Ok(entries) => (entries, false),
        Err(e) => {
            warn!(
                "Ignoring recent servers in {} ({:#}); it moves to {} on the next save",
                path.display(),
                e,
                sibling_path(path, "bak").display()
            );
            (Vec::new(), true)
        }
    }
}

pub struct ProfileStore {
    path: PathBuf,
    entries: Vec<PersistedDescriptor>,
    /// The file on disk could not be parsed and has not been backed up yet.
    unreadable: bool,
}

impl ProfileStore {
    /// Open the store backed by `path`, loading whatever is there.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (entries, unreadable) = load_or_flag(&path);
        debug!("loaded {} profiles from {}", entries.len(), path.display());
        Self {
            path,
            entries,
            unreadable,
        }
    }

    /// Where an unreadable profile file is kept before it is overwritten.
    pub fn backup_path(&self) -> PathBuf {
        sibling_path(&self.path, "bak")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the backing file.
    pub fn load(&mut self) -> &[PersistedDescriptor] {
        let (entries, unreadable) = load_or_flag(&self.path);
        self.entries = entries;
        self.unreadable = unreadable;
        &self.entries
    }

    pub fn entries(&self) -> &[PersistedDescriptor] {
        &self.entries
    }

    pub fn by_index(&self, index: usize) -> Option<&PersistedDescriptor> {
        self.entries.get(index)
    }

    pub fn by_name(&self, name: &str) -> Option<&PersistedDescriptor> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    /// Move `desc` to the front, dropping any entry of the same name and
    /// anything past [`CAPACITY`], then write the file. A failed write is
    /// logged and reported as `false`.
    pub fn upsert(&mut self, desc: &ConnectionDescriptor) -> bool {
        let entry = PersistedDescriptor::from(desc);
        self.entries.retain(|existing| existing.name != entry.name);
        self.entries.insert(0, entry);
        self.entries.truncate(CAPACITY);

        match self.save() {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to save configuration: {:#}", e);
                false
            }
        }
    }

    fn save(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).context("Failed to create profile directory")?;
            }
        }
        if self.unreadable {
            let backup = self.backup_path();
            fs::rename(&self.path, &backup).context("Failed to back up unreadable profile file")?;
            warn!("Moved unreadable profile file to {}", backup.display());
            self.unreadable = false;
        }
        let json =
            serde_json::to_string_pretty(&self.entries).context("Failed to serialize profiles")?;

        let temp_path = sibling_path(&self.path, "tmp");
        fs::write(&temp_path, json).context("Failed to write temporary profile file")?;
        fs::rename(&temp_path, &self.path).context("Failed to replace profile file")?;
        Ok(())
    }
}

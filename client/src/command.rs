//! Argument vectors for the external `sshfs`, `ssh` and unmount tools.
//!
//! Everything here is pure: no filesystem access beyond the key-file check
//! in [`build_test_command`], and nothing is ever joined into a shell string.

use std::path::Path;

use crate::descriptor::{Auth, ConnectionDescriptor};

pub const SSHFS: &str = "sshfs";
pub const SSH: &str = "ssh";

const KEEPALIVE_OPTIONS: [&str; 3] = [
    "reconnect",
    "ServerAliveInterval=15",
    "ServerAliveCountMax=3",
];

fn push_option(cmd: &mut Vec<String>, option: impl Into<String>) {
    cmd.push("-o".to_string());
    cmd.push(option.into());
}

/// Build the sshfs invocation for `desc`.
///
/// Identity options come before the pass-through options so a user-supplied
/// `-o` can shadow them when sshfs takes the last occurrence.
pub fn build_mount_command(desc: &ConnectionDescriptor) -> Vec<String> {
    let mut cmd = vec![
        SSHFS.to_string(),
        desc.remote_spec(),
        desc.local_dir.to_string_lossy().into_owned(),
        "-p".to_string(),
        desc.port.to_string(),
    ];

    if let Auth::PublicKey(key_file) = &desc.auth {
        push_option(&mut cmd, format!("IdentityFile={}", key_file.display()));
        push_option(&mut cmd, "PasswordAuthentication=no");
    }

    for option in KEEPALIVE_OPTIONS {
        push_option(&mut cmd, option);
    }

    if desc.allow_other {
        push_option(&mut cmd, "allow_other");
    }

    for option in &desc.additional_options {
        push_option(&mut cmd, option.as_str());
    }

    cmd
}

/// Build the non-interactive `ssh ... echo` used to check that a host answers.
///
/// `-i` is only passed when the identity file actually exists, BatchMode
/// makes password auth fail instead of prompting.
pub fn build_test_command(desc: &ConnectionDescriptor) -> Vec<String> {
    let mut cmd = vec![
        SSH.to_string(),
        "-p".to_string(),
        desc.port.to_string(),
        "-o".to_string(),
        "ConnectTimeout=10".to_string(),
        "-o".to_string(),
        "BatchMode=yes".to_string(),
    ];

    if let Auth::PublicKey(key_file) = &desc.auth {
        if !key_file.as_os_str().is_empty() && key_file.exists() {
            cmd.push("-i".to_string());
            cmd.push(key_file.to_string_lossy().into_owned());
        }
    }

    cmd.push(desc.name());
    cmd.push("echo 'Connection successful'".to_string());
    cmd
}

/// Unmount invocations to try in order: `umount`, then the platform's alternate.
pub fn unmount_commands(local_dir: &Path) -> Vec<Vec<String>> {
    let dir = local_dir.to_string_lossy().into_owned();
    let mut commands = vec![vec!["umount".to_string(), dir.clone()]];
    if let Some(alternate) = alternate_unmount_command(&dir) {
        commands.push(alternate);
    }
    commands
}

#[cfg(target_os = "linux")]
fn alternate_unmount_command(dir: &str) -> Option<Vec<String>> {
    Some(vec!["fusermount".to_string(), "-u".to_string(), dir.to_string()])
}

#[cfg(target_os = "macos")]
fn alternate_unmount_command(dir: &str) -> Option<Vec<String>> {
    Some(vec!["diskutil".to_string(), "unmount".to_string(), dir.to_string()])
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn alternate_unmount_command(_dir: &str) -> Option<Vec<String>> {
    None
}

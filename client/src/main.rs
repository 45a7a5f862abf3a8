use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use itertools::Itertools;
use log::LevelFilter;

use sshfs_gui_client::command::build_mount_command;
use sshfs_gui_client::descriptor::{default_identity_file, parse_port, split_options};
use sshfs_gui_client::orchestrator::{validate_for_test, validate_unmount};
use sshfs_gui_client::{
    mount_sshfs, Auth, ConnectionDescriptor, Orchestrator, PersistedDescriptor, ProfileStore,
    Settings,
};

fn connection_args() -> Vec<Arg> {
    vec![
        Arg::new("profile")
            .long("profile")
            .value_name("NAME|INDEX")
            .help("Start from a saved profile (user@host or its index in `profiles`)"),
        Arg::new("server")
            .long("server")
            .short('s')
            .value_name("HOST")
            .help("SSH server address"),
        Arg::new("port")
            .long("port")
            .short('p')
            .value_name("PORT")
            .help("SSH port [default: 22]"),
        Arg::new("username")
            .long("username")
            .short('u')
            .value_name("USERNAME")
            .help("Remote user"),
        Arg::new("password")
            .long("password")
            .value_name("PASSWORD")
            .conflicts_with("key")
            .help("Password for password authentication"),
        Arg::new("password-stdin")
            .long("password-stdin")
            .action(ArgAction::SetTrue)
            .conflicts_with_all(["password", "key"])
            .help("Read the password from the first line of stdin"),
        Arg::new("key")
            .long("key")
            .short('i')
            .value_name("FILE")
            .num_args(0..=1)
            .default_missing_value("")
            .help("Use public key authentication with FILE [default: ~/.ssh/id_rsa]"),
        Arg::new("remote-dir")
            .long("remote-dir")
            .short('r')
            .value_name("PATH")
            .help("Remote directory to mount [default: /]"),
        Arg::new("local-dir")
            .long("local-dir")
            .short('l')
            .value_name("PATH")
            .help("Local mount point, created when missing"),
        Arg::new("options")
            .long("options")
            .short('o')
            .value_name("OPTS")
            .help("Extra sshfs options, space separated (each becomes -o OPT)"),
        Arg::new("allow-other")
            .long("allow-other")
            .action(ArgAction::SetTrue)
            .help("Allow other users to access the mount"),
    ]
}

fn cli() -> Command {
    Command::new("sshfs-gui")
        .author("OPaimoe")
        .about("Mount remote directories with sshfs and remember recent connections")
        .subcommand_required(true)
        .arg(
            Arg::new("profiles-file")
                .long("profiles-file")
                .global(true)
                .value_name("FILE")
                .help("Profile file [default: $SSHFS_GUI_CONFIG or ~/.sshfs_gui_config.json]"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log every spawned command"),
        )
        .subcommand(
            Command::new("mount")
                .about("Mount a remote directory and remember the connection")
                .args(connection_args())
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Print the sshfs command instead of running it"),
                ),
        )
        .subcommand(
            Command::new("unmount")
                .about("Unmount a local mount point")
                .arg(Arg::new("LOCAL_DIR").index(1).help("Mount point to release"))
                .arg(
                    Arg::new("profile")
                        .long("profile")
                        .value_name("NAME|INDEX")
                        .help("Use the local directory of a saved profile"),
                ),
        )
        .subcommand(
            Command::new("test")
                .about("Check that the server accepts a non-interactive ssh login")
                .args(connection_args()),
        )
        .subcommand(
            Command::new("save")
                .about("Remember a connection without mounting it")
                .args(connection_args()),
        )
        .subcommand(Command::new("profiles").about("List remembered connections"))
}

fn find_profile<'a>(store: &'a ProfileStore, key: &str) -> Result<&'a PersistedDescriptor> {
    let found = match key.parse::<usize>() {
        Ok(index) => store.by_index(index),
        Err(_) => store.by_name(key),
    };
    found.ok_or_else(|| anyhow!("No saved profile {:?} in {}", key, store.path().display()))
}

fn read_password_line() -> Result<String> {
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn prompt_password(desc: &ConnectionDescriptor) -> Result<String> {
    eprint!("Password for {}: ", desc.name());
    io::stderr().flush()?;
    read_password_line()
}

/// Build a descriptor from the saved profile (if any) overlaid with flags.
fn descriptor_from_matches(
    matches: &ArgMatches,
    store: &ProfileStore,
    need_password: bool,
) -> Result<ConnectionDescriptor> {
    let mut desc = match matches.get_one::<String>("profile") {
        Some(key) => find_profile(store, key)?.to_descriptor(None)?,
        None => ConnectionDescriptor::new("", "", Auth::Password(String::new())),
    };

    if let Some(server) = matches.get_one::<String>("server") {
        desc.server = server.trim().to_string();
    }
    if let Some(port) = matches.get_one::<String>("port") {
        desc.port = parse_port(port)?;
    }
    if let Some(username) = matches.get_one::<String>("username") {
        desc.username = username.trim().to_string();
    }
    if let Some(remote_dir) = matches.get_one::<String>("remote-dir") {
        desc.remote_dir = remote_dir.trim().to_string();
    }
    if let Some(local_dir) = matches.get_one::<String>("local-dir") {
        desc.local_dir = PathBuf::from(local_dir.trim());
    }
    if let Some(options) = matches.get_one::<String>("options") {
        desc.additional_options = split_options(options);
    }
    if matches.get_flag("allow-other") {
        desc.allow_other = true;
    }

    if let Some(key) = matches.get_one::<String>("key") {
        let key = if key.trim().is_empty() {
            default_identity_file().unwrap_or_default()
        } else {
            PathBuf::from(key.trim())
        };
        desc.auth = Auth::PublicKey(key);
    } else if let Some(password) = matches.get_one::<String>("password") {
        desc.auth = Auth::Password(password.clone());
    } else if matches.get_flag("password-stdin") {
        desc.auth = Auth::Password(read_password_line()?);
    } else if need_password && matches!(&desc.auth, Auth::Password(p) if p.is_empty()) {
        desc.auth = Auth::Password(prompt_password(&desc)?);
    }

    Ok(desc)
}

fn print_profiles(store: &ProfileStore) {
    if store.entries().is_empty() {
        println!("No recent servers in {}", store.path().display());
        return;
    }
    for (index, entry) in store.entries().iter().enumerate() {
        println!(
            "{:>2}  {:<30} port {:<5} {} -> {}",
            index,
            entry.name,
            entry.port,
            entry.remote_dir,
            entry.local_dir
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let settings = Settings::resolve(matches.get_one::<String>("profiles-file").map(PathBuf::from));
    let mut store = ProfileStore::open(&settings.profile_path);
    let orchestrator = Arc::new(Orchestrator::new(settings.timeouts));

    match matches.subcommand() {
        Some(("mount", sub)) => {
            let dry_run = sub.get_flag("dry-run");
            let desc = descriptor_from_matches(sub, &store, !dry_run)?;
            if dry_run {
                println!("{}", build_mount_command(&desc).iter().join(" "));
                return Ok(());
            }
            mount_sshfs(&*orchestrator, &mut store, &desc)
                .await
                .context("Failed to mount filesystem")?;
            println!("Filesystem mounted successfully!");
        }
        Some(("unmount", sub)) => {
            let local_dir = match (
                sub.get_one::<String>("LOCAL_DIR"),
                sub.get_one::<String>("profile"),
            ) {
                (Some(dir), _) => PathBuf::from(dir.trim()),
                (None, Some(key)) => PathBuf::from(&find_profile(&store, key)?.local_dir),
                (None, None) => PathBuf::new(),
            };
            validate_unmount(&local_dir)?;
            orchestrator
                .execute_unmount(&local_dir)
                .await
                .context("Failed to unmount filesystem")?;
            println!("Filesystem unmounted successfully!");
        }
        Some(("test", sub)) => {
            let desc = descriptor_from_matches(sub, &store, false)?;
            validate_for_test(&desc)?;
            orchestrator
                .spawn_connection_test(desc)
                .await
                .context("Connection test task failed")?
                .context("Connection test failed")?;
            println!("Connection test successful!");
        }
        Some(("save", sub)) => {
            let desc = descriptor_from_matches(sub, &store, false)?;
            validate_for_test(&desc)?;
            if !store.upsert(&desc) {
                return Err(anyhow!("Failed to save configuration to {}", store.path().display()));
            }
            println!("Configuration saved to recent servers!");
        }
        Some(("profiles", _)) => print_profiles(&store),
        _ => unreachable!("subcommand_required"),
    }

    Ok(())
}

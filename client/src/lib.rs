use anyhow::Result;
pub mod command;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod orchestrator;
pub mod profile;
pub mod runner;

pub use config::{Settings, Timeouts};
pub use descriptor::{Auth, AuthMethod, ConnectionDescriptor};
pub use error::{ExecError, ValidationError};
pub use orchestrator::{validate, MountOutcome, Orchestrator};
pub use profile::{PersistedDescriptor, ProfileStore};
pub use runner::{ProcessOutput, ProcessRunner, SystemRunner};

/// Validate `desc`, mount it, and remember it in `store` once sshfs succeeded.
///
/// Nothing is spawned when validation fails, and a failed mount leaves the
/// store untouched.
pub async fn mount_sshfs<R: ProcessRunner>(
    orchestrator: &Orchestrator<R>,
    store: &mut ProfileStore,
    desc: &ConnectionDescriptor,
) -> Result<MountOutcome> {
    orchestrator.validate(desc)?;
    let outcome = orchestrator.execute_mount(desc).await?;
    store.upsert(desc);
    Ok(outcome)
}

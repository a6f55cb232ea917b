//! Environment bootstrap.
//!
//! A missing environment is created and populated, and any failure there is
//! fatal. An existing environment is never recreated; it gets a best-effort
//! re-sync whose failure is reported and discarded.

use std::{path::Path, sync::Arc};

use serde::Serialize;

use crate::{
    config::{LaunchConfig, SyncPolicy},
    error::{BootError, BootResult},
    progress::{ProgressLogger, begin_step},
    ui,
    venv::{Toolchain, manifest_digest, read_marker, write_marker},
};

/// What `ensure_environment` did to the environment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BootstrapOutcome {
    Created,
    Synced,
    /// Manifest unchanged since the last install under `sync = "on-change"`.
    SyncSkipped,
    /// The re-sync failed and startup continued anyway.
    SyncFailed,
}

/// Action `ensure_environment` will take, decided from directory presence alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PendingAction {
    Create,
    Sync,
}

#[must_use]
pub fn pending_action(venv_dir: &Path) -> PendingAction {
    if venv_dir.is_dir() {
        PendingAction::Sync
    } else {
        PendingAction::Create
    }
}

/// Create or re-sync the virtual environment described by `config`.
///
/// # Errors
///
/// Returns an error only when creating a missing environment fails. Re-sync
/// failures are reported as warnings and yield [`BootstrapOutcome::SyncFailed`].
pub fn ensure_environment(
    config: &LaunchConfig,
    toolchain: &dyn Toolchain,
    sink: &Arc<dyn ProgressLogger>,
) -> BootResult<BootstrapOutcome> {
    match pending_action(&config.venv_dir) {
        PendingAction::Create => create_environment(config, toolchain, sink),
        PendingAction::Sync => Ok(sync_environment(config, toolchain, sink)),
    }
}

fn create_environment(
    config: &LaunchConfig,
    toolchain: &dyn Toolchain,
    sink: &Arc<dyn ProgressLogger>,
) -> BootResult<BootstrapOutcome> {
    let venv = &config.venv_dir;
    let manifest = &config.requirements;

    let digest = manifest_digest(manifest).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            BootError::MissingManifest(manifest.clone())
        } else {
            BootError::Filesystem {
                path: manifest.clone(),
                source,
            }
        }
    })?;

    let (ctx, guard) = begin_step(
        sink,
        "create",
        &format!("Creating virtual environment at {}", venv.display()),
    );
    toolchain.create_venv(venv, &ctx)?;
    guard.done();

    let (ctx, guard) = begin_step(
        sink,
        "install",
        &format!("Installing requirements from {}", manifest.display()),
    );
    toolchain.install_requirements(venv, manifest, &ctx)?;
    guard.done();

    record_install(venv, &digest);
    Ok(BootstrapOutcome::Created)
}

fn sync_environment(
    config: &LaunchConfig,
    toolchain: &dyn Toolchain,
    sink: &Arc<dyn ProgressLogger>,
) -> BootstrapOutcome {
    let venv = &config.venv_dir;
    let manifest = &config.requirements;

    let (ctx, guard) = begin_step(
        sink,
        "sync",
        &format!("Syncing requirements from {}", manifest.display()),
    );

    let digest = match manifest_digest(manifest) {
        Ok(digest) => digest,
        Err(err) => {
            guard.ignore();
            ui::warning(format!(
                "could not read {}: {err}; continuing with the existing environment",
                manifest.display()
            ));
            return BootstrapOutcome::SyncFailed;
        }
    };

    if config.sync == SyncPolicy::OnChange
        && read_marker(venv).is_some_and(|recorded| recorded == digest)
    {
        guard.cached();
        return BootstrapOutcome::SyncSkipped;
    }

    match toolchain.install_requirements(venv, manifest, &ctx) {
        Ok(()) => {
            guard.done();
            record_install(venv, &digest);
            BootstrapOutcome::Synced
        }
        Err(err) => {
            guard.ignore();
            ui::warning(format!(
                "{err}; continuing with the existing environment"
            ));
            BootstrapOutcome::SyncFailed
        }
    }
}

fn record_install(venv: &Path, digest: &str) {
    if let Err(err) = write_marker(venv, digest) {
        ui::warning(format!(
            "could not record install marker in {}: {err}",
            venv.display()
        ));
    }
}

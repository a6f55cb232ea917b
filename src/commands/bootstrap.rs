use std::sync::Arc;

use crate::{
    bootstrap::{BootstrapOutcome, ensure_environment},
    config::LaunchConfig,
    error::BootResult,
    progress::ProgressLogger,
    ui,
    venv::PythonToolchain,
};

/// Create or re-sync the environment without launching the server.
///
/// # Errors
///
/// Returns an error if a fresh environment cannot be built.
pub fn run(config: &LaunchConfig, sink: &Arc<dyn ProgressLogger>) -> BootResult<()> {
    let toolchain = PythonToolchain::new(config.python.clone(), config.build_env.clone());
    let outcome = ensure_environment(config, &toolchain, sink)?;

    let summary = match outcome {
        BootstrapOutcome::Created => "created",
        BootstrapOutcome::Synced => "synced",
        BootstrapOutcome::SyncSkipped => "up to date, sync skipped",
        BootstrapOutcome::SyncFailed => "kept as-is after a failed sync",
    };
    ui::detail(format!(
        "Environment {} {summary}",
        config.venv_dir.display()
    ));
    Ok(())
}

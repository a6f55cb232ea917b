use std::sync::Arc;

use crate::{
    bootstrap::ensure_environment,
    config::LaunchConfig,
    error::BootResult,
    launch::LaunchPlan,
    progress::ProgressLogger,
    ui,
    venv::PythonToolchain,
};

/// Bootstrap the environment, then hand the process over to the notebook server.
///
/// # Errors
///
/// Returns an error if the launch arguments are invalid, a fresh environment
/// cannot be built, or the server cannot be started. On success this never
/// returns.
pub fn run(config: &LaunchConfig, sink: &Arc<dyn ProgressLogger>) -> BootResult<()> {
    let plan = LaunchPlan::new(config)?;

    let toolchain = PythonToolchain::new(config.python.clone(), config.build_env.clone());
    ensure_environment(config, &toolchain, sink)?;

    ui::step(format!(
        "Starting notebook server: {}",
        ui::highlight_command(&plan.program.to_string_lossy(), &plan.args)
    ));
    Err(plan.exec())
}

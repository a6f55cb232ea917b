use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Serialize;

use crate::{
    bootstrap::{PendingAction, pending_action},
    config::{LaunchConfig, SyncPolicy},
    error::{BootError, BootResult},
    launch::LaunchPlan,
    ui,
};

/// Everything `start` would do, resolved without side effects.
#[derive(Debug, Serialize)]
pub struct PlanReport {
    pub requirements: PathBuf,
    pub python: String,
    pub action: PendingAction,
    pub sync: SyncPolicy,
    pub build_env: IndexMap<String, String>,
    pub launch: LaunchPlan,
}

impl PlanReport {
    /// # Errors
    ///
    /// Returns an error if the launch arguments are invalid.
    pub fn new(config: &LaunchConfig) -> BootResult<Self> {
        Ok(Self {
            requirements: config.requirements.clone(),
            python: config.python.clone(),
            action: pending_action(&config.venv_dir),
            sync: config.sync,
            build_env: config.build_env.clone(),
            launch: LaunchPlan::new(config)?,
        })
    }
}

/// Print the resolved plan.
///
/// # Errors
///
/// Returns an error if the launch arguments are invalid.
pub fn run(config: &LaunchConfig, json: bool) -> BootResult<()> {
    let report = PlanReport::new(config)?;

    if json {
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|err| BootError::Output(err.into()))?;
        println!("{rendered}");
        return Ok(());
    }

    let venv = report.launch.venv_dir.display();
    match report.action {
        PendingAction::Create => ui::step(format!(
            "Create {venv} and install {} (failure aborts startup)",
            report.requirements.display()
        )),
        PendingAction::Sync => ui::step(format!(
            "Sync {venv} from {} (failure is ignored, sync policy: {})",
            report.requirements.display(),
            match report.sync {
                SyncPolicy::Always => "always",
                SyncPolicy::OnChange => "on-change",
            }
        )),
    }
    ui::step(format!(
        "Launch from {}",
        report.launch.workdir.display()
    ));
    println!(
        "{}",
        ui::format_command(&report.launch.program.to_string_lossy(), &report.launch.args)
    );
    Ok(())
}

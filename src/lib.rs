#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::literal_string_with_formatting_args)]

pub mod bootstrap;
pub mod command;
mod commands;
mod completion;
pub mod config;
pub mod constants;
pub mod error;
pub mod launch;
pub mod progress;
pub mod ui;
pub mod venv;

use std::{path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand, ValueHint};
use clap_complete::{Shell, engine::ArgValueCompleter};

use crate::{
    config::{LaunchConfig, Overrides},
    error::BootResult,
    progress::{PlainProgressLogger, ProgressLogger, QuietProgressLogger},
};

#[derive(Parser)]
#[command(
    name = "marimo-launch",
    version,
    about = "Bootstrap a Python virtual environment and launch a marimo notebook server in it."
)]
pub struct Cli {
    /// Config file to read. Defaults to launch.toml in the working directory.
    #[arg(short, long, global = true, value_name = "PATH", add = ValueHint::FilePath)]
    config: Option<PathBuf>,
    /// Virtual environment directory.
    #[arg(long, global = true, value_name = "PATH", add = ValueHint::DirPath)]
    venv: Option<PathBuf>,
    /// Dependency manifest installed into the environment.
    #[arg(short, long, global = true, value_name = "PATH", add = ValueHint::FilePath)]
    requirements: Option<PathBuf>,
    /// Interpreter used to create the environment.
    #[arg(long, global = true, value_name = "PROGRAM", add = ValueHint::CommandName)]
    python: Option<String>,
    /// Directory the notebook server is started from.
    #[arg(short = 'C', long, global = true, value_name = "PATH", add = ValueHint::DirPath)]
    workdir: Option<PathBuf>,
    /// Notebook server mode, forwarded as-is.
    #[arg(
        short,
        long,
        global = true,
        value_name = "MODE",
        add = ArgValueCompleter::new(completion::ModeCompleter)
    )]
    mode: Option<String>,
    /// Notebook file, forwarded as-is.
    #[arg(
        short,
        long,
        global = true,
        value_name = "FILE",
        add = ArgValueCompleter::new(completion::NotebookCompleter)
    )]
    file: Option<String>,
    /// Only show installer output for steps that fail.
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Bootstrap the environment and replace this process with the notebook server (default).
    Start {
        /// Arguments forwarded to the notebook server after `--`.
        #[arg(value_name = "ARGS", last = true)]
        extra_args: Vec<String>,
    },
    /// Create or re-sync the environment without launching the server.
    Bootstrap,
    /// Show what start would do without touching anything.
    Plan {
        /// Output the plan as JSON.
        #[arg(long = "json")]
        json: bool,
    },
    /// Remove the virtual environment.
    Clean,
    /// Print the shell completion script.
    Completions {
        #[arg(value_name = "SHELL")]
        shell: Shell,
    },
}

impl Cli {
    fn overrides(&self, extra_args: Vec<String>) -> Overrides {
        Overrides {
            config: self.config.clone(),
            venv: self.venv.clone(),
            requirements: self.requirements.clone(),
            python: self.python.clone(),
            workdir: self.workdir.clone(),
            mode: self.mode.clone(),
            file: self.file.clone(),
            extra_args,
        }
    }

    fn sink(&self) -> Arc<dyn ProgressLogger> {
        if self.quiet {
            Arc::new(QuietProgressLogger::default())
        } else {
            Arc::new(PlainProgressLogger::default())
        }
    }
}

/// Dispatch the selected CLI command.
///
/// # Errors
///
/// Returns an error if command execution fails.
pub fn run_command(mut cli: Cli) -> BootResult<()> {
    let command = cli.command.take().unwrap_or(Commands::Start {
        extra_args: Vec::new(),
    });

    match command {
        Commands::Start { extra_args } => {
            let config = LaunchConfig::load(cli.overrides(extra_args))?;
            commands::start::run(&config, &cli.sink())
        }
        Commands::Bootstrap => {
            let config = LaunchConfig::load(cli.overrides(Vec::new()))?;
            commands::bootstrap::run(&config, &cli.sink())
        }
        Commands::Plan { json } => {
            let config = LaunchConfig::load(cli.overrides(Vec::new()))?;
            commands::plan::run(&config, json)
        }
        Commands::Clean => {
            let config = LaunchConfig::load(cli.overrides(Vec::new()))?;
            commands::clean::run(&config.venv_dir)
        }
        Commands::Completions { shell } => commands::completion::run(shell),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_start() {
        let cli = Cli::try_parse_from(["marimo-launch"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn start_forwards_arguments_after_separator() {
        let cli =
            Cli::try_parse_from(["marimo-launch", "-m", "run", "start", "--", "--headless"])
                .unwrap();
        assert_eq!(cli.mode.as_deref(), Some("run"));
        let Some(Commands::Start { extra_args }) = cli.command else {
            panic!("expected start");
        };
        assert_eq!(extra_args, vec!["--headless"]);
    }
}

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use clap_complete::CompleteEnv;

use marimo_launch::{Cli, run_command, ui};

fn main() -> ExitCode {
    CompleteEnv::with_factory(Cli::command).complete();

    let cli = Cli::parse();

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            ui::error(err.to_string());
            ExitCode::from(err.exit_code())
        }
    }
}

use std::process::Command;

use clap_complete::Shell;

use crate::error::{BootError, BootResult};

/// Print the dynamic completion registration script for `shell`.
///
/// # Errors
///
/// Returns an error if the launcher cannot re-run itself to produce the script.
pub fn run(shell: Shell) -> BootResult<()> {
    let exe = std::env::current_exe().map_err(|source| BootError::Spawn {
        step: "completion generator".to_string(),
        source,
    })?;

    let output = Command::new(&exe)
        .env("COMPLETE", shell.to_string())
        .output()
        .map_err(|source| BootError::Spawn {
            step: "completion generator".to_string(),
            source,
        })?;

    print!("{}", String::from_utf8_lossy(&output.stdout));
    Ok(())
}

use std::{ffi::OsStr, fs, path::PathBuf};

use clap::builder::StyledStr;
use clap_complete::{CompletionCandidate, engine::ValueCompleter};

use crate::constants::{DEFAULT_WORKDIR, ENV_WORKDIR, KNOWN_MODES};

fn mode_help(mode: &str) -> &'static str {
    match mode {
        "edit" => "open the notebook in the editor",
        "run" => "serve the notebook as a read-only app",
        _ => "",
    }
}

pub struct ModeCompleter;

impl ValueCompleter for ModeCompleter {
    fn complete(&self, current: &OsStr) -> Vec<CompletionCandidate> {
        let Some(hint) = current.to_str() else {
            return vec![];
        };

        KNOWN_MODES
            .iter()
            .filter(|mode| mode.starts_with(hint))
            .map(|mode| {
                CompletionCandidate::new(*mode).help(Some(StyledStr::from(mode_help(mode))))
            })
            .collect()
    }
}

/// Completes notebook files found in the working directory.
pub struct NotebookCompleter;

impl ValueCompleter for NotebookCompleter {
    fn complete(&self, current: &OsStr) -> Vec<CompletionCandidate> {
        let Some(hint) = current.to_str() else {
            return vec![];
        };

        let workdir = std::env::var_os(ENV_WORKDIR)
            .filter(|value| !value.is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_WORKDIR), PathBuf::from);
        let Ok(entries) = fs::read_dir(&workdir) else {
            return vec![];
        };

        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_file()))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| {
                PathBuf::from(name)
                    .extension()
                    .is_some_and(|ext| ext == "py" || ext == "md")
            })
            .filter(|name| name.starts_with(hint))
            .collect();
        names.sort();

        names.into_iter().map(CompletionCandidate::new).collect()
    }
}

use std::{
    env,
    ffi::OsString,
    io,
    path::{Path, PathBuf},
    process::Command,
};

use indexmap::IndexMap;
use serde::Serialize;

use crate::{
    config::LaunchConfig,
    constants::{BIND_HOST, BIND_PORT, NO_TOKEN_FLAG, RESERVED_FLAGS, SERVER_BINARY},
    error::{BootError, BootResult},
    venv::{venv_bin_dir, venv_executable},
};

/// The notebook server command the launcher hands the process over to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LaunchPlan {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub workdir: PathBuf,
    pub venv_dir: PathBuf,
    pub env: IndexMap<String, String>,
}

impl LaunchPlan {
    /// Build `marimo <mode> <file> --host <HOST> --port <PORT> --no-token [extra...]`.
    ///
    /// # Errors
    ///
    /// Returns an error if an extra argument sets a fixed server flag or the
    /// environment path cannot be made absolute.
    pub fn new(config: &LaunchConfig) -> BootResult<Self> {
        if let Some(flag) = config.extra_args.iter().find(|arg| is_reserved(arg)) {
            return Err(BootError::ReservedFlag(flag.clone()));
        }

        let venv_dir = absolute(&config.venv_dir)?;
        let mut args = vec![
            config.mode.clone(),
            config.file.clone(),
            "--host".to_string(),
            BIND_HOST.to_string(),
            "--port".to_string(),
            BIND_PORT.to_string(),
            NO_TOKEN_FLAG.to_string(),
        ];
        args.extend(config.extra_args.iter().cloned());

        Ok(Self {
            program: venv_executable(&venv_dir, SERVER_BINARY),
            args,
            workdir: config.workdir.clone(),
            venv_dir,
            env: config.run_env.clone(),
        })
    }

    /// The server command with the environment activated.
    #[must_use]
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .current_dir(&self.workdir)
            .env("VIRTUAL_ENV", &self.venv_dir)
            .env("PATH", self.search_path())
            .env_remove("PYTHONHOME")
            .envs(&self.env);
        command
    }

    /// Replace the current process with the notebook server.
    ///
    /// Only returns if the server could not be started. When the exec itself
    /// fails the calling process is left in `workdir`.
    #[cfg(unix)]
    #[must_use]
    pub fn exec(&self) -> BootError {
        use std::os::unix::process::CommandExt;

        if let Err(err) = self.check_workdir() {
            return err;
        }
        let source = self.command().exec();
        BootError::Launch {
            program: self.program.clone(),
            source,
        }
    }

    /// Run the notebook server and exit with its status.
    ///
    /// Only returns if the server could not be started.
    #[cfg(not(unix))]
    #[must_use]
    pub fn exec(&self) -> BootError {
        if let Err(err) = self.check_workdir() {
            return err;
        }
        match self.command().status() {
            Ok(status) => std::process::exit(status.code().unwrap_or(1)),
            Err(source) => BootError::Launch {
                program: self.program.clone(),
                source,
            },
        }
    }

    /// A missing workdir would otherwise surface as a missing server binary.
    fn check_workdir(&self) -> BootResult<()> {
        if self.workdir.is_dir() {
            Ok(())
        } else {
            Err(BootError::Filesystem {
                path: self.workdir.clone(),
                source: io::Error::new(io::ErrorKind::NotFound, "working directory not found"),
            })
        }
    }

    fn search_path(&self) -> OsString {
        let bin = venv_bin_dir(&self.venv_dir);
        let inherited = env::var_os("PATH").unwrap_or_default();
        let paths = std::iter::once(bin).chain(env::split_paths(&inherited));
        env::join_paths(paths).unwrap_or(inherited)
    }
}

fn is_reserved(arg: &str) -> bool {
    RESERVED_FLAGS.iter().any(|flag| {
        if flag.starts_with("--") {
            arg == *flag
                || arg
                    .strip_prefix(flag)
                    .is_some_and(|rest| rest.starts_with('='))
        } else {
            // Short flags also take their value joined, as in `-p9000`.
            arg.starts_with(flag)
        }
    })
}

fn absolute(path: &Path) -> BootResult<PathBuf> {
    std::path::absolute(path).map_err(|source| BootError::Filesystem {
        path: path.to_path_buf(),
        source,
    })
}

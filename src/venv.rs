use std::{
    fs, io,
    path::{Path, PathBuf},
    process::ExitStatus,
    sync::Arc,
};

use indexmap::IndexMap;
use sha2::{Digest, Sha256};

use crate::{
    command::ManagedCommand,
    constants::DONE_MARKER,
    error::{BootError, BootResult},
    progress::StepContext,
};

/// Directory holding the environment's executables.
#[must_use]
pub fn venv_bin_dir(venv: &Path) -> PathBuf {
    if cfg!(windows) {
        venv.join("Scripts")
    } else {
        venv.join("bin")
    }
}

/// Path of an executable installed into the environment.
#[must_use]
pub fn venv_executable(venv: &Path, name: &str) -> PathBuf {
    let bin = venv_bin_dir(venv);
    if cfg!(windows) {
        bin.join(format!("{name}.exe"))
    } else {
        bin.join(name)
    }
}

#[must_use]
pub fn venv_python_path(venv: &Path) -> PathBuf {
    venv_executable(venv, "python")
}

/// SHA-256 of the manifest contents, hex encoded.
///
/// # Errors
///
/// Returns an error if the manifest cannot be read.
pub fn manifest_digest(manifest: &Path) -> io::Result<String> {
    let contents = fs::read(manifest)?;
    let mut sha = Sha256::new();
    sha.update(&contents);
    Ok(format!("{:x}", sha.finalize()))
}

/// Digest recorded by the last successful install, if any.
#[must_use]
pub fn read_marker(venv: &Path) -> Option<String> {
    fs::read_to_string(venv.join(DONE_MARKER))
        .ok()
        .map(|contents| contents.trim().to_string())
        .filter(|digest| !digest.is_empty())
}

/// Record the manifest digest of a successful install.
///
/// # Errors
///
/// Returns an error if the marker file cannot be written.
pub fn write_marker(venv: &Path, digest: &str) -> io::Result<()> {
    fs::write(venv.join(DONE_MARKER), format!("{digest}\n"))
}

/// External tools used to build the environment.
pub trait Toolchain {
    /// Create a fresh virtual environment at `venv`.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment cannot be created.
    fn create_venv(&self, venv: &Path, ctx: &StepContext) -> BootResult<()>;

    /// Install the manifest into the environment at `venv`.
    ///
    /// # Errors
    ///
    /// Returns an error if the installer cannot be spawned or exits unsuccessfully.
    fn install_requirements(&self, venv: &Path, manifest: &Path, ctx: &StepContext)
    -> BootResult<()>;
}

/// `python -m venv` and `pip install -r`, run as subprocesses.
pub struct PythonToolchain {
    python: String,
    build_env: IndexMap<String, String>,
}

impl PythonToolchain {
    #[must_use]
    pub const fn new(python: String, build_env: IndexMap<String, String>) -> Self {
        Self { python, build_env }
    }
}

impl Toolchain for PythonToolchain {
    fn create_venv(&self, venv: &Path, ctx: &StepContext) -> BootResult<()> {
        let step = format!("{} -m venv", self.python);
        let status = ManagedCommand::new(&self.python, ctx.step_id.clone(), Arc::clone(&ctx.sink))
            .envs(&self.build_env)
            .args(["-m", "venv"])
            .arg(venv)
            .status()
            .map_err(|source| BootError::Spawn {
                step: step.clone(),
                source,
            })?;
        check_status(step, status)
    }

    fn install_requirements(
        &self,
        venv: &Path,
        manifest: &Path,
        ctx: &StepContext,
    ) -> BootResult<()> {
        let python = venv_python_path(venv);
        let status = ManagedCommand::new_pip_install(&python, manifest, ctx)
            .envs(&self.build_env)
            .env("VIRTUAL_ENV", venv)
            .status()
            .map_err(|source| BootError::Spawn {
                step: "pip install".to_string(),
                source,
            })?;
        check_status("pip install".to_string(), status)
    }
}

fn check_status(step: String, status: ExitStatus) -> BootResult<()> {
    if status.success() {
        Ok(())
    } else {
        Err(BootError::StepFailed {
            step,
            code: status.code(),
        })
    }
}

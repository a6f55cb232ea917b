use std::{fs, io, path::Path};

use crate::{
    error::{BootError, BootResult},
    ui,
};

/// Remove the virtual environment so the next start recreates it.
///
/// # Errors
///
/// Returns an error if the directory exists but cannot be removed.
pub fn run(venv_dir: &Path) -> BootResult<()> {
    ui::step(format!(
        "Removing virtual environment {}",
        venv_dir.display()
    ));

    match fs::remove_dir_all(venv_dir) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            ui::detail("Virtual environment not found, nothing to clean.");
        }
        Err(source) => {
            return Err(BootError::Filesystem {
                path: venv_dir.to_path_buf(),
                source,
            });
        }
    }

    ui::blank_line();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_existing_environment() {
        let dir = tempfile::tempdir().unwrap();
        let venv = dir.path().join(".venv");
        fs::create_dir_all(venv.join("bin")).unwrap();

        run(&venv).unwrap();
        assert!(!venv.exists());
    }

    #[test]
    fn missing_environment_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        run(&dir.path().join(".venv")).unwrap();
    }
}

use std::{fmt, io, path::PathBuf};

/// Errors that stop the launcher before the notebook server takes over.
#[derive(Debug)]
pub enum BootError {
    ConfigRead { path: PathBuf, source: io::Error },
    ConfigParse { path: PathBuf, message: String },
    ExtraArgs { value: String, message: String },
    ReservedFlag(String),
    MissingManifest(PathBuf),
    Filesystem { path: PathBuf, source: io::Error },
    Spawn { step: String, source: io::Error },
    StepFailed { step: String, code: Option<i32> },
    Launch { program: PathBuf, source: io::Error },
    Output(io::Error),
}

pub type BootResult<T> = Result<T, BootError>;

impl BootError {
    /// Process exit code reported for this error.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::ConfigRead { .. }
            | Self::ConfigParse { .. }
            | Self::ExtraArgs { .. }
            | Self::ReservedFlag(_) => 2,
            Self::StepFailed {
                code: Some(code), ..
            } => u8::try_from(*code).ok().filter(|c| *c != 0).unwrap_or(1),
            Self::Launch { source, .. } => match source.kind() {
                io::ErrorKind::NotFound => 127,
                io::ErrorKind::PermissionDenied => 126,
                _ => 1,
            },
            Self::MissingManifest(_)
            | Self::Filesystem { .. }
            | Self::Spawn { .. }
            | Self::StepFailed { code: None, .. }
            | Self::Output(_) => 1,
        }
    }
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigRead { path, source } => {
                write!(f, "failed to read {}: {source}", path.display())
            }
            Self::ConfigParse { path, message } => {
                write!(f, "failed to parse {}: {message}", path.display())
            }
            Self::ExtraArgs { value, message } => {
                write!(f, "could not split extra arguments `{value}`: {message}")
            }
            Self::ReservedFlag(flag) => write!(
                f,
                "extra argument `{flag}` would override a fixed server setting"
            ),
            Self::MissingManifest(path) => {
                write!(f, "dependency manifest {} does not exist", path.display())
            }
            Self::Filesystem { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Spawn { step, source } => write!(f, "failed to spawn {step}: {source}"),
            Self::StepFailed {
                step,
                code: Some(code),
            } => write!(f, "{step} exited with status {code}"),
            Self::StepFailed { step, code: None } => {
                write!(f, "{step} was terminated by a signal")
            }
            Self::Launch { program, source } => {
                write!(f, "failed to launch {}: {source}", program.display())
            }
            Self::Output(source) => write!(f, "failed to render output: {source}"),
        }
    }
}

impl std::error::Error for BootError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigRead { source, .. }
            | Self::Filesystem { source, .. }
            | Self::Spawn { source, .. }
            | Self::Launch { source, .. }
            | Self::Output(source) => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_exit_with_usage_code() {
        let err = BootError::ReservedFlag("--port".to_string());
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn step_failure_propagates_child_code() {
        let err = BootError::StepFailed {
            step: "pip install".to_string(),
            code: Some(3),
        };
        assert_eq!(err.exit_code(), 3);

        let out_of_range = BootError::StepFailed {
            step: "pip install".to_string(),
            code: Some(-9),
        };
        assert_eq!(out_of_range.exit_code(), 1);
    }

    #[test]
    fn missing_server_binary_maps_to_127() {
        let err = BootError::Launch {
            program: PathBuf::from("/app/.venv/bin/marimo"),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(err.exit_code(), 127);
        assert!(err.to_string().contains("/app/.venv/bin/marimo"));
    }
}

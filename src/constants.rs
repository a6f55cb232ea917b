//! Constants used throughout the launcher

/// Virtual environment directory used when nothing overrides it
pub const DEFAULT_VENV_DIR: &str = "/app/.venv";

/// Dependency manifest installed into the virtual environment
pub const DEFAULT_REQUIREMENTS: &str = "/app/requirements.txt";

/// Working directory the notebook server is started from
pub const DEFAULT_WORKDIR: &str = "/app";

/// Interpreter used to create the virtual environment
pub const DEFAULT_PYTHON: &str = "python3";

/// Config file name looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "launch.toml";

/// Marker file recording the manifest digest of the last successful install
pub const DONE_MARKER: &str = ".marimo_launch_done";

pub const DEFAULT_MODE: &str = "edit";
pub const DEFAULT_FILE: &str = "main.py";

/// Modes offered by shell completion. Any other value is forwarded as-is.
pub const KNOWN_MODES: &[&str] = &["edit", "run"];

pub const SERVER_BINARY: &str = "marimo";
pub const BIND_HOST: &str = "0.0.0.0";
pub const BIND_PORT: u16 = 80;
pub const NO_TOKEN_FLAG: &str = "--no-token";

/// Server flags that extra arguments may not set.
pub const RESERVED_FLAGS: &[&str] = &["--host", "--port", "-p", "--token", "--token-password"];

pub const ENV_MODE: &str = "MARIMO_MODE";
pub const ENV_FILE: &str = "MARIMO_FILE";
pub const ENV_EXTRA_ARGS: &str = "MARIMO_EXTRA_ARGS";
pub const ENV_CONFIG: &str = "MARIMO_LAUNCH_CONFIG";
pub const ENV_VENV: &str = "MARIMO_VENV";
pub const ENV_REQUIREMENTS: &str = "MARIMO_REQUIREMENTS";
pub const ENV_PYTHON: &str = "MARIMO_PYTHON";
pub const ENV_WORKDIR: &str = "MARIMO_WORKDIR";

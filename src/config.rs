use std::{
    fs,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    constants::{
        CONFIG_FILE_NAME, DEFAULT_FILE, DEFAULT_MODE, DEFAULT_PYTHON, DEFAULT_REQUIREMENTS,
        DEFAULT_VENV_DIR, DEFAULT_WORKDIR, ENV_CONFIG, ENV_EXTRA_ARGS, ENV_FILE, ENV_MODE,
        ENV_PYTHON, ENV_REQUIREMENTS, ENV_VENV, ENV_WORKDIR,
    },
    error::{BootError, BootResult},
};

/// When an existing environment is re-synced against the manifest.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncPolicy {
    #[default]
    Always,
    /// Skip the sync when the manifest digest matches the last install.
    OnChange,
}

/// Values given on the command line. They win over everything else.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub venv: Option<PathBuf>,
    pub requirements: Option<PathBuf>,
    pub python: Option<String>,
    pub workdir: Option<PathBuf>,
    pub mode: Option<String>,
    pub file: Option<String>,
    pub extra_args: Vec<String>,
}

/// Fully resolved launcher settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    pub venv_dir: PathBuf,
    pub requirements: PathBuf,
    pub python: String,
    pub workdir: PathBuf,
    pub mode: String,
    pub file: String,
    pub extra_args: Vec<String>,
    pub sync: SyncPolicy,
    pub build_env: IndexMap<String, String>,
    pub run_env: IndexMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LaunchToml {
    venv: Option<PathBuf>,
    requirements: Option<PathBuf>,
    python: Option<String>,
    mode: Option<String>,
    file: Option<String>,
    sync: Option<SyncPolicy>,
    #[serde(default)]
    extra_args: Vec<String>,
    env: Option<toml::Value>,
}

impl LaunchConfig {
    /// Resolve settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file or `MARIMO_EXTRA_ARGS` cannot be parsed.
    pub fn load(overrides: Overrides) -> BootResult<Self> {
        Self::resolve(overrides, |key| std::env::var(key).ok())
    }

    /// Resolve settings with precedence CLI > environment > `launch.toml` > defaults.
    /// Empty environment values count as unset.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file or `MARIMO_EXTRA_ARGS` cannot be parsed.
    pub fn resolve(
        overrides: Overrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> BootResult<Self> {
        let var = |key: &str| env(key).filter(|value| !value.is_empty());

        let workdir = overrides
            .workdir
            .or_else(|| var(ENV_WORKDIR).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_WORKDIR));

        let explicit_config = overrides
            .config
            .or_else(|| var(ENV_CONFIG).map(PathBuf::from));
        let file_config = match explicit_config {
            Some(path) => load_launch_toml(&path)?,
            None => {
                let path = workdir.join(CONFIG_FILE_NAME);
                if path.is_file() {
                    load_launch_toml(&path)?
                } else {
                    ParsedConfig::default()
                }
            }
        };
        let from_file = file_config.toml;

        let mut extra_args = from_file.extra_args;
        if let Some(raw) = var(ENV_EXTRA_ARGS) {
            let split = shell_words::split(&raw).map_err(|err| BootError::ExtraArgs {
                value: raw.clone(),
                message: err.to_string(),
            })?;
            extra_args.extend(split);
        }
        extra_args.extend(overrides.extra_args);

        Ok(Self {
            venv_dir: overrides
                .venv
                .or_else(|| var(ENV_VENV).map(PathBuf::from))
                .or(from_file.venv)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_VENV_DIR)),
            requirements: overrides
                .requirements
                .or_else(|| var(ENV_REQUIREMENTS).map(PathBuf::from))
                .or(from_file.requirements)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_REQUIREMENTS)),
            python: overrides
                .python
                .or_else(|| var(ENV_PYTHON))
                .or(from_file.python)
                .unwrap_or_else(|| DEFAULT_PYTHON.to_string()),
            mode: overrides
                .mode
                .or_else(|| var(ENV_MODE))
                .or(from_file.mode)
                .unwrap_or_else(|| DEFAULT_MODE.to_string()),
            file: overrides
                .file
                .or_else(|| var(ENV_FILE))
                .or(from_file.file)
                .unwrap_or_else(|| DEFAULT_FILE.to_string()),
            workdir,
            extra_args,
            sync: from_file.sync.unwrap_or_default(),
            build_env: file_config.build_env,
            run_env: file_config.run_env,
        })
    }
}

#[derive(Default)]
struct ParsedConfig {
    toml: LaunchToml,
    build_env: IndexMap<String, String>,
    run_env: IndexMap<String, String>,
}

fn load_launch_toml(config_path: &Path) -> BootResult<ParsedConfig> {
    let contents = fs::read_to_string(config_path).map_err(|source| BootError::ConfigRead {
        path: config_path.to_path_buf(),
        source,
    })?;
    parse_launch_toml(config_path, &contents)
}

fn parse_launch_toml(config_path: &Path, contents: &str) -> BootResult<ParsedConfig> {
    let parse_error = |message: String| BootError::ConfigParse {
        path: config_path.to_path_buf(),
        message,
    };

    let mut parsed: LaunchToml =
        toml::from_str(contents).map_err(|err| parse_error(err.to_string()))?;

    let env_value = parsed.env.take();
    let env_table = match &env_value {
        None => None,
        Some(value) => Some(
            value
                .as_table()
                .ok_or_else(|| parse_error("env must be a table".to_string()))?,
        ),
    };
    let build_env = parse_env_table(env_table.and_then(|tbl| tbl.get("build")), "env.build")
        .map_err(parse_error)?;
    let run_env =
        parse_env_table(env_table.and_then(|tbl| tbl.get("run")), "env.run").map_err(parse_error)?;

    if let Some(table) = env_table
        && let Some(unknown) = table.keys().find(|key| *key != "build" && *key != "run")
    {
        return Err(parse_error(format!("unknown section env.{unknown}")));
    }

    Ok(ParsedConfig {
        toml: parsed,
        build_env,
        run_env,
    })
}

fn parse_env_table(
    value: Option<&toml::Value>,
    section_name: &str,
) -> Result<IndexMap<String, String>, String> {
    let mut env = IndexMap::new();

    let Some(val) = value else {
        return Ok(env);
    };

    let Some(table) = val.as_table() else {
        return Err(format!(
            "{section_name} must be a table of string key/value pairs"
        ));
    };

    for (key, val) in table {
        let Some(val_str) = val.as_str() else {
            return Err(format!("{section_name}.{key} must be a string"));
        };
        env.insert(key.clone(), val_str.to_string());
    }

    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn isolated() -> (tempfile::TempDir, Overrides) {
        let dir = tempfile::tempdir().unwrap();
        let overrides = Overrides {
            workdir: Some(dir.path().to_path_buf()),
            ..Overrides::default()
        };
        (dir, overrides)
    }

    #[test]
    fn defaults_apply_without_any_source() {
        let dir = tempfile::tempdir().unwrap();
        let empty_config = dir.path().join("empty.toml");
        fs::write(&empty_config, "").unwrap();
        let overrides = Overrides {
            config: Some(empty_config),
            ..Overrides::default()
        };

        let config = LaunchConfig::resolve(overrides, env_of(&[])).unwrap();
        assert_eq!(config.venv_dir, PathBuf::from(DEFAULT_VENV_DIR));
        assert_eq!(config.requirements, PathBuf::from(DEFAULT_REQUIREMENTS));
        assert_eq!(config.workdir, PathBuf::from(DEFAULT_WORKDIR));
        assert_eq!(config.mode, "edit");
        assert_eq!(config.file, "main.py");
        assert_eq!(config.sync, SyncPolicy::Always);
        assert!(config.extra_args.is_empty());
    }

    #[test]
    fn environment_overrides_are_taken_verbatim() {
        let (_dir, overrides) = isolated();
        let config = LaunchConfig::resolve(
            overrides,
            env_of(&[(ENV_MODE, "run"), (ENV_FILE, "notebooks/Report 1.py")]),
        )
        .unwrap();
        assert_eq!(config.mode, "run");
        assert_eq!(config.file, "notebooks/Report 1.py");
    }

    #[test]
    fn empty_environment_values_fall_back_to_defaults() {
        let (_dir, overrides) = isolated();
        let config =
            LaunchConfig::resolve(overrides, env_of(&[(ENV_MODE, ""), (ENV_FILE, "")])).unwrap();
        assert_eq!(config.mode, DEFAULT_MODE);
        assert_eq!(config.file, DEFAULT_FILE);
    }

    #[test]
    fn cli_wins_over_environment_and_file() {
        let (dir, mut overrides) = isolated();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "mode = \"run\"\nvenv = \"/from/file\"\n",
        )
        .unwrap();
        overrides.mode = Some("edit".to_string());

        let config = LaunchConfig::resolve(
            overrides,
            env_of(&[(ENV_MODE, "run"), (ENV_VENV, "/from/env")]),
        )
        .unwrap();
        assert_eq!(config.mode, "edit");
        assert_eq!(config.venv_dir, PathBuf::from("/from/env"));
    }

    #[test]
    fn config_file_supplies_env_tables_and_sync_policy() {
        let (dir, overrides) = isolated();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"
sync = "on-change"
extra_args = ["--headless"]

[env.build]
PIP_INDEX_URL = "https://pypi.example/simple"

[env.run]
MARIMO_SKIP_UPDATE_CHECK = "1"
"#,
        )
        .unwrap();

        let config = LaunchConfig::resolve(overrides, env_of(&[])).unwrap();
        assert_eq!(config.sync, SyncPolicy::OnChange);
        assert_eq!(config.extra_args, vec!["--headless".to_string()]);
        assert_eq!(
            config.build_env.get("PIP_INDEX_URL").map(String::as_str),
            Some("https://pypi.example/simple")
        );
        assert_eq!(
            config.run_env.get("MARIMO_SKIP_UPDATE_CHECK").map(String::as_str),
            Some("1")
        );
    }

    #[test]
    fn extra_args_accumulate_from_file_env_and_cli() {
        let (dir, mut overrides) = isolated();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "extra_args = [\"--headless\"]\n",
        )
        .unwrap();
        overrides.extra_args = vec!["--watch".to_string()];

        let config = LaunchConfig::resolve(
            overrides,
            env_of(&[(ENV_EXTRA_ARGS, "--base-url '/my app'")]),
        )
        .unwrap();
        assert_eq!(
            config.extra_args,
            vec!["--headless", "--base-url", "/my app", "--watch"]
        );
    }

    #[test]
    fn unbalanced_extra_args_are_rejected() {
        let (_dir, overrides) = isolated();
        let err = LaunchConfig::resolve(overrides, env_of(&[(ENV_EXTRA_ARGS, "--base-url '/x")]))
            .unwrap_err();
        assert!(matches!(err, BootError::ExtraArgs { .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn env_values_must_be_strings() {
        let err = parse_launch_toml(Path::new("launch.toml"), "[env.run]\nPORT = 8080\n")
            .err()
            .unwrap();
        assert!(err.to_string().contains("env.run.PORT must be a string"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(parse_launch_toml(Path::new("launch.toml"), "prot = 1\n").is_err());
        assert!(parse_launch_toml(Path::new("launch.toml"), "[env.test]\nA = \"b\"\n").is_err());
    }

    #[test]
    fn explicit_config_path_must_exist() {
        let (dir, mut overrides) = isolated();
        overrides.config = Some(dir.path().join("missing.toml"));
        let err = LaunchConfig::resolve(overrides, env_of(&[])).unwrap_err();
        assert!(matches!(err, BootError::ConfigRead { .. }));
    }
}

// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! This module implements the 3-tier configuration loading system:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{ConfigError, ConfigResult, RetargetConfig, TransportBackend};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "retarget_configuration.toml";

/// Find the retargeting configuration file
///
/// Search order:
/// 1. `RETARGET_CONFIG_PATH` environment variable
/// 2. Current working directory: `./retarget_configuration.toml`
/// 3. Up to 5 parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("RETARGET_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        return if path.is_file() {
            Ok(path)
        } else {
            Err(ConfigError::FileNotFound(format!(
                "RETARGET_CONFIG_PATH points to a missing file: {}",
                path.display()
            )))
        };
    }

    // The working directory and up to five of its parents
    let search_paths: Vec<PathBuf> = env::current_dir()
        .map(|cwd| {
            cwd.ancestors()
                .take(6)
                .map(|dir| dir.join(CONFIG_FILE_NAME))
                .collect()
        })
        .unwrap_or_default();

    if let Some(found) = search_paths.iter().find(|path| path.is_file()) {
        return Ok(found.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet RETARGET_CONFIG_PATH to specify a custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// The returned configuration is parsed but not validated; call
/// [`crate::validate_config`] before using it.
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<RetargetConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: RetargetConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);

    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }

    Ok(config)
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `RETARGET_MODULE_NAME` -> `control.module_name`
/// - `RETARGET_CONTROL_PERIOD` -> `control.period`
/// - `RETARGET_TRANSPORT_BACKEND` -> `transport.backend`
/// - `RETARGET_LOG_LEVEL` -> `logging.level`
/// - `RETARGET_APPROACHING_PHASE_DURATION` -> `retargeting.approaching_phase_duration`
pub fn apply_environment_overrides(config: &mut RetargetConfig) {
    let values: HashMap<String, String> = [
        ("module_name", "RETARGET_MODULE_NAME"),
        ("control_period", "RETARGET_CONTROL_PERIOD"),
        ("transport_backend", "RETARGET_TRANSPORT_BACKEND"),
        ("log_level", "RETARGET_LOG_LEVEL"),
        ("approaching_phase_duration", "RETARGET_APPROACHING_PHASE_DURATION"),
    ]
    .into_iter()
    .filter_map(|(key, var)| env::var(var).ok().map(|value| (key.to_string(), value)))
    .collect();

    apply_cli_overrides(config, &values);
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - HashMap of CLI arguments (e.g., `{"module_name": "walking", "control_period": "0.002"}`)
///
/// Values that fail to parse are ignored and the file value is kept.
pub fn apply_cli_overrides(config: &mut RetargetConfig, cli_args: &HashMap<String, String>) {
    if let Some(value) = cli_args.get("module_name") {
        config.control.module_name = value.clone();
    }
    if let Some(value) = cli_args.get("control_period") {
        if let Ok(period) = value.parse::<f64>() {
            config.control.period = period;
        }
    }
    if let Some(value) = cli_args.get("transport_backend") {
        if let Some(backend) = parse_backend(value) {
            config.transport.backend = backend;
        }
    }
    if let Some(value) = cli_args.get("log_level") {
        config.logging.level = value.clone();
    }
    if let Some(value) = cli_args.get("approaching_phase_duration") {
        if let Ok(duration) = value.parse::<f64>() {
            config.retargeting.approaching_phase_duration = Some(duration);
        }
    }
}

fn parse_backend(value: &str) -> Option<TransportBackend> {
    match value.to_lowercase().as_str() {
        "loopback" => Some(TransportBackend::Loopback),
        "udp" => Some(TransportBackend::Udp),
        "zmq" => Some(TransportBackend::Zmq),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_find_config_file_env_var() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("custom_config.toml");
        File::create(&config_path).unwrap();

        env::set_var("RETARGET_CONFIG_PATH", config_path.to_str().unwrap());
        let result = find_config_file();
        env::remove_var("RETARGET_CONFIG_PATH");

        assert_eq!(result.unwrap(), config_path);
    }

    #[test]
    fn test_find_config_file_env_var_missing_file() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("does_not_exist.toml");

        env::set_var("RETARGET_CONFIG_PATH", config_path.to_str().unwrap());
        let result = find_config_file();
        env::remove_var("RETARGET_CONFIG_PATH");

        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_minimal_config() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        env::remove_var("RETARGET_CONTROL_PERIOD");
        env::remove_var("RETARGET_MODULE_NAME");
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[control]").unwrap();
        writeln!(file, "module_name = \"walking\"").unwrap();
        writeln!(file, "period = 0.002").unwrap();

        let config = load_config(Some(&config_path), None).unwrap();

        assert_eq!(config.control.module_name, "walking");
        assert_eq!(config.control.period, 0.002);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let result = load_config(Some(&dir.path().join("nope.toml")), None);
        assert!(matches!(result, Err(ConfigError::IoError(_))));
    }

    #[test]
    fn test_environment_overrides() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let mut config = RetargetConfig::default();

        env::set_var("RETARGET_MODULE_NAME", "env-module");
        env::set_var("RETARGET_TRANSPORT_BACKEND", "UDP");
        env::set_var("RETARGET_APPROACHING_PHASE_DURATION", "3.5");

        apply_environment_overrides(&mut config);

        env::remove_var("RETARGET_MODULE_NAME");
        env::remove_var("RETARGET_TRANSPORT_BACKEND");
        env::remove_var("RETARGET_APPROACHING_PHASE_DURATION");

        assert_eq!(config.control.module_name, "env-module");
        assert_eq!(config.transport.backend, TransportBackend::Udp);
        assert_eq!(config.retargeting.approaching_phase_duration, Some(3.5));
    }

    #[test]
    fn test_cli_overrides_ignore_unparsable_values() {
        let mut config = RetargetConfig::default();
        let mut cli_args = HashMap::new();
        cli_args.insert("control_period".to_string(), "fast".to_string());
        cli_args.insert("log_level".to_string(), "debug".to_string());

        apply_cli_overrides(&mut config, &cli_args);

        assert_eq!(config.control.period, 0.01);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_override_precedence() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[control]").unwrap();
        writeln!(file, "module_name = \"file-module\"").unwrap();
        writeln!(file, "period = 0.01").unwrap();

        env::set_var("RETARGET_MODULE_NAME", "env-module");
        env::set_var("RETARGET_CONTROL_PERIOD", "0.005");

        let mut cli_args = HashMap::new();
        cli_args.insert("module_name".to_string(), "cli-module".to_string());

        let config = load_config(Some(&config_path), Some(&cli_args)).unwrap();

        env::remove_var("RETARGET_MODULE_NAME");
        env::remove_var("RETARGET_CONTROL_PERIOD");

        // CLI wins for module name, env wins for period (no CLI override)
        assert_eq!(config.control.module_name, "cli-module");
        assert_eq!(config.control.period, 0.005);
    }
}

//! Configuration file loading.
//!
//! Every successfully loaded config has passed validation. The file path
//! is part of every error message.

use std::path::Path;

use serde::de::DeserializeOwned;

use super::validation::{self, ConfigError};
use super::{ExperimentConfig, WorkersConfig};

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        file: path.display().to_string(),
        source: e,
    })
}

fn parse<T: DeserializeOwned>(content: &str, source_name: &str) -> Result<T, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::Parse {
        file: source_name.to_string(),
        source: e,
    })
}

fn joined(errors: Vec<ConfigError>) -> ConfigError {
    ConfigError::Validation(
        errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

/// Load and validate `experiment.toml`.
pub fn load_experiment(path: &Path) -> Result<ExperimentConfig, ConfigError> {
    load_experiment_str(&read(path)?, &path.display().to_string())
}

/// Load an experiment config from a TOML string; `source_name` appears in errors.
pub fn load_experiment_str(
    content: &str,
    source_name: &str,
) -> Result<ExperimentConfig, ConfigError> {
    let config: ExperimentConfig = parse(content, source_name)?;
    validation::validate_experiment(&config).map_err(joined)?;
    Ok(config)
}

/// Load and validate `workers.toml`.
pub fn load_workers(path: &Path) -> Result<WorkersConfig, ConfigError> {
    load_workers_str(&read(path)?, &path.display().to_string())
}

pub fn load_workers_str(content: &str, source_name: &str) -> Result<WorkersConfig, ConfigError> {
    let config: WorkersConfig = parse(content, source_name)?;
    validation::validate_workers(&config).map_err(joined)?;
    Ok(config)
}

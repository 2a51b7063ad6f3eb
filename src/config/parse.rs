//! Build script parsing and discovery

use crate::config::schema::validate_config;
use crate::config::types::Config;
use crate::error::{ConfigError, ConfigResult, Result};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default build script names to search for
pub const CONFIG_FILE_NAMES: &[&str] = &["kiln.yml", "kiln.yaml"];

/// Find the build script by searching current and parent directories
pub fn find_config_file() -> ConfigResult<PathBuf> {
    find_config_file_from(env::current_dir().map_err(|e| {
        ConfigError::Invalid(format!("Failed to get current directory: {}", e))
    })?)
}

/// Find the build script starting from a specific directory
pub fn find_config_file_from(start_dir: PathBuf) -> ConfigResult<PathBuf> {
    let mut current_dir = start_dir;
    let mut searched_paths = Vec::new();

    loop {
        for file_name in CONFIG_FILE_NAMES {
            let config_path = current_dir.join(file_name);
            searched_paths.push(config_path.display().to_string());

            if config_path.is_file() {
                debug!(path = %config_path.display(), "found build script");
                return Ok(config_path);
            }
        }

        // Try parent directory
        match current_dir.parent() {
            Some(parent) => current_dir = parent.to_path_buf(),
            None => return Err(ConfigError::NotFound(searched_paths.join(", "))),
        }
    }
}

/// Parse and validate a build script from a path
pub fn parse_config_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path).map_err(|e| {
        ConfigError::Invalid(format!("Failed to read '{}': {}", path.display(), e))
    })?;

    parse_config(&contents)
}

/// Parse and validate a build script from a string
pub fn parse_config(yaml: &str) -> Result<Config> {
    let config: Config = serde_yaml::from_str(yaml)?;
    validate_config(&config)?;
    Ok(config)
}

/// Load the script's env file, if it names one. The path is relative to the
/// directory holding the script.
pub fn load_dotenv(config: &Config, config_dir: &Path) -> ConfigResult<HashMap<String, String>> {
    let Some(dotenv) = &config.dotenv else {
        return Ok(HashMap::new());
    };

    let path = config_dir.join(dotenv);
    let env_error = |error: String| ConfigError::EnvFile {
        path: path.clone(),
        error,
    };

    let mut vars = HashMap::new();
    for item in dotenvy::from_path_iter(&path).map_err(|e| env_error(e.to_string()))? {
        let (key, value) = item.map_err(|e| env_error(e.to_string()))?;
        vars.insert(key, value);
    }

    debug!(path = %path.display(), count = vars.len(), "loaded env file");
    Ok(vars)
}

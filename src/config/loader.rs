//! Configuration and descriptor loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::{ListenerDescriptor, ServerConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Serialize(e) => write!(f, "Serialize error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Serialize(e) => Some(e),
            ConfigError::Validation(_) => None,
        }
    }
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: ServerConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Persist a listener descriptor so the listener process can pick it up.
pub fn write_descriptor(path: &Path, descriptor: &ListenerDescriptor) -> Result<(), ConfigError> {
    let content = toml::to_string(descriptor).map_err(ConfigError::Serialize)?;
    fs::write(path, content).map_err(ConfigError::Io)
}

/// Load the descriptor written by the server that spawned this listener.
pub fn load_descriptor(path: &Path) -> Result<ListenerDescriptor, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&content).map_err(ConfigError::Parse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_survives_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::default();
        config.tmp_root_dir = dir.path().to_path_buf();
        config.public_dir = Some(dir.path().join("public"));

        let descriptor = config.descriptor(51234);
        let path = config.descriptor_path(51234);
        write_descriptor(&path, &descriptor).unwrap();

        assert_eq!(load_descriptor(&path).unwrap(), descriptor);
    }

    #[test]
    fn test_load_config_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("webhook.toml");
        fs::write(&path, "retry_interval_micros = 0\n").unwrap();

        match load_config(&path) {
            Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 1),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_config_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("webhook.toml");
        fs::write(&path, "listen_host = [").unwrap();

        assert!(matches!(load_config(&path), Err(ConfigError::Parse(_))));
    }
}

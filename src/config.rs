//! Configuration management for the annotation server

use std::env;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub taxonomy: TaxonomyConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Autosave file
    pub save_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct TaxonomyConfig {
    /// Taxonomy JSON file; the built-in categories are used when unset
    pub path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid ANNOTATOR_PORT {value:?}: {source}")]
    InvalidPort {
        value: String,
        source: std::num::ParseIntError,
    },
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3030,
            },
            storage: StorageConfig {
                save_path: PathBuf::from("./annotations_progress.json"),
            },
            taxonomy: TaxonomyConfig { path: None },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup, falling back to defaults for unset keys
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let port = match lookup("ANNOTATOR_PORT") {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|source| ConfigError::InvalidPort { value, source })?,
            None => defaults.server.port,
        };

        Ok(Config {
            server: ServerConfig {
                host: lookup("ANNOTATOR_HOST").unwrap_or(defaults.server.host),
                port,
            },
            storage: StorageConfig {
                save_path: lookup("ANNOTATOR_SAVE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.storage.save_path),
            },
            taxonomy: TaxonomyConfig {
                path: lookup("ANNOTATOR_TAXONOMY_PATH")
                    .filter(|p| !p.is_empty())
                    .map(PathBuf::from),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.server.port, 3030);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(config.taxonomy.path.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("ANNOTATOR_HOST", "0.0.0.0"),
            ("ANNOTATOR_PORT", "8088"),
            ("ANNOTATOR_SAVE_PATH", "/tmp/progress.json"),
            ("ANNOTATOR_TAXONOMY_PATH", "taxonomy.json"),
        ]))
        .unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.storage.save_path, PathBuf::from("/tmp/progress.json"));
        assert_eq!(config.taxonomy.path, Some(PathBuf::from("taxonomy.json")));
    }

    #[test]
    fn test_invalid_port() {
        let result = Config::from_lookup(lookup(&[("ANNOTATOR_PORT", "eighty")]));
        assert!(matches!(result, Err(ConfigError::InvalidPort { .. })));
    }
}

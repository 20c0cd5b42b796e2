//! Master/façade configuration, loaded from a TOML file the way a CLI tool
//! would (the library itself stays config-source-agnostic and is
//! constructed directly from a [`CcasConfig`] value).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

fn default_chunksize() -> u64 {
    64 * 1024 * 1024
}

fn default_algorithm() -> String {
    "mirror".to_string()
}

/// Configuration for the master / façade, mirroring the options table in
/// the specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CcasConfig {
    /// Ordered disk roots. A `null` entry marks a permanently disabled slot.
    pub root_path_array: Vec<Option<PathBuf>>,
    pub manifest_path: PathBuf,
    pub index_path: PathBuf,
    pub catalog_path: PathBuf,
    pub tmp_path: PathBuf,
    /// Raw string so that an invalid value can be rejected outright at the
    /// façade layer while still collapsing to `mirror` at the master layer.
    #[serde(default = "default_algorithm")]
    pub write_algorithm: String,
    #[serde(default = "default_chunksize")]
    pub chunksize: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Parse(#[from] toml::de::Error),
}

impl CcasConfig {
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: CcasConfig = toml::from_str(&raw)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let toml = r#"
            root_path_array = ["disk0", "disk1", null, "disk3"]
            manifest_path = "manifest"
            index_path = "index"
            catalog_path = "catalog"
            tmp_path = "tmp"
        "#;
        let config: CcasConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.write_algorithm, "mirror");
        assert_eq!(config.chunksize, 64 * 1024 * 1024);
        assert_eq!(config.root_path_array.len(), 4);
        assert!(config.root_path_array[2].is_none());
    }
}

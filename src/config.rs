//! Configuration management

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::notify::DEFAULT_NOTICE_DELAY_MS;
use crate::storage::DEFAULT_NAMESPACE;

pub const CONFIG_FILE: &str = "config.toml";
/// Overrides the data home directory.
pub const HOME_ENV: &str = "LUNACAL_HOME";
/// When set, stored data is encrypted with this passphrase.
pub const PASSPHRASE_ENV: &str = "LUNACAL_PASSPHRASE";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to write config: {0}")]
    Write(#[from] std::io::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("no data directory found; set LUNACAL_HOME")]
    NoHome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage key holding the day log.
    pub namespace: String,
    /// Delay before a debounced notice is shown.
    pub notice_delay_ms: u64,
    pub show_fertility: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            namespace: DEFAULT_NAMESPACE.to_string(),
            notice_delay_ms: DEFAULT_NOTICE_DELAY_MS,
            show_fertility: true,
        }
    }
}

impl Config {
    /// Load `config.toml` from `home`. A missing file gives the defaults.
    pub fn load_from_dir(home: &Path) -> Result<Self, ConfigError> {
        let path = home.join(CONFIG_FILE);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
            Err(source) => return Err(ConfigError::Read { path, source }),
        };
        toml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn save_to_dir(&self, home: &Path) -> Result<(), ConfigError> {
        fs::create_dir_all(home)?;
        let contents = toml::to_string_pretty(self)?;
        fs::write(home.join(CONFIG_FILE), contents)?;
        Ok(())
    }
}

/// The data home: `$LUNACAL_HOME`, else the platform local data dir.
pub fn resolve_home() -> Result<PathBuf, ConfigError> {
    if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    dirs::data_local_dir()
        .map(|dir| dir.join("lunacal"))
        .ok_or(ConfigError::NoHome)
}

/// The passphrase for encrypted storage, if one is configured.
pub fn passphrase_from_env() -> Option<String> {
    std::env::var(PASSPHRASE_ENV).ok().filter(|p| !p.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = Config::load_from_dir(temp.path()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.namespace, "lunacal-data");
        assert_eq!(config.notice_delay_ms, 1000);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(CONFIG_FILE), "show_fertility = false\n").unwrap();

        let config = Config::load_from_dir(temp.path()).unwrap();
        assert!(!config.show_fertility);
        assert_eq!(config.namespace, DEFAULT_NAMESPACE);
    }

    #[test]
    fn save_then_load() {
        let temp = TempDir::new().unwrap();
        let config = Config {
            namespace: "my-cycle".into(),
            notice_delay_ms: 250,
            show_fertility: false,
        };
        config.save_to_dir(temp.path()).unwrap();
        assert_eq!(Config::load_from_dir(temp.path()).unwrap(), config);
    }

    #[test]
    fn bad_toml_is_an_error() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(CONFIG_FILE), "namespace = [").unwrap();
        let err = Config::load_from_dir(temp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.toml"));
    }
}

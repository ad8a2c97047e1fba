use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const CONFIG_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub version: u32,
    pub music_root: String,
    pub store_path: String,
    pub port: u16,
    pub session_ttl_secs: u64,
    pub artwork_enabled: bool,
    pub artwork_timeout_secs: u64,
    pub scan_art_concurrency: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            music_root: "".to_string(),
            store_path: "melodeon.redb".to_string(),
            port: 3000,
            session_ttl_secs: 60 * 60 * 24 * 7,
            artwork_enabled: true,
            artwork_timeout_secs: 8,
            scan_art_concurrency: 4,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "io error: {}", err),
            ConfigError::Yaml(err) => write!(f, "yaml error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Yaml(err)
    }
}

pub fn config_path_from_env() -> PathBuf {
    match env::var("MELODEON_CONFIG") {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => default_config_path(),
    }
}

fn default_config_path() -> PathBuf {
    match env::current_exe() {
        Ok(exe) => exe
            .parent()
            .map(|dir| dir.join("config.yaml"))
            .unwrap_or_else(|| PathBuf::from("config.yaml")),
        Err(_) => PathBuf::from("config.yaml"),
    }
}

pub fn load_or_create_config(path: &Path) -> Result<(ServerConfig, bool), ConfigError> {
    if path.exists() {
        let contents = fs::read_to_string(path)?;
        let mut config: ServerConfig = serde_yaml::from_str(&contents)?;
        if config.version < CONFIG_VERSION {
            config.version = CONFIG_VERSION;
        }
        if config.store_path.trim().is_empty() {
            config.store_path = "melodeon.redb".to_string();
        }
        if config.port == 0 {
            config.port = 3000;
        }
        if config.session_ttl_secs == 0 {
            config.session_ttl_secs = 60 * 60 * 24 * 7;
        }
        if config.artwork_timeout_secs == 0 {
            config.artwork_timeout_secs = 8;
        }
        if config.scan_art_concurrency == 0 {
            config.scan_art_concurrency = 4;
        }
        return Ok((config, false));
    }

    let config = ServerConfig::default();
    save_config(path, &config)?;
    Ok((config, true))
}

pub fn save_config(path: &Path, config: &ServerConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let contents = serde_yaml::to_string(config)?;
    fs::write(path, contents)?;
    Ok(())
}

/// Relative paths in the config are resolved against the config file's
/// directory.
pub fn resolve_path(config_path: &Path, value: &str) -> PathBuf {
    let raw = PathBuf::from(value);
    if raw.is_absolute() {
        return raw;
    }
    let base = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    base.join(raw)
}

pub fn resolve_music_root(config_path: &Path, value: &str) -> Option<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(resolve_path(config_path, trimmed))
    }
}

#[cfg(test)]
mod tests {
    use super::{load_or_create_config, resolve_path, ServerConfig};
    use std::path::Path;
    use tempfile::TempDir;

    #[test]
    fn creates_default_config_when_missing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        let (config, created) = load_or_create_config(&path).unwrap();
        assert!(created);
        assert!(path.exists());
        assert_eq!(config.port, 3000);
        assert!(config.artwork_enabled);
    }

    #[test]
    fn patches_zero_values_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        let mut config = ServerConfig::default();
        config.port = 0;
        config.store_path = " ".to_string();
        super::save_config(&path, &config).unwrap();

        let (loaded, created) = load_or_create_config(&path).unwrap();
        assert!(!created);
        assert_eq!(loaded.port, 3000);
        assert_eq!(loaded.store_path, "melodeon.redb");
    }

    #[test]
    fn resolves_relative_to_config_dir() {
        let resolved = resolve_path(Path::new("/etc/melodeon/config.yaml"), "data/store.redb");
        assert_eq!(resolved, Path::new("/etc/melodeon/data/store.redb"));
        let absolute = resolve_path(Path::new("/etc/melodeon/config.yaml"), "/var/store.redb");
        assert_eq!(absolute, Path::new("/var/store.redb"));
    }
}

// src/config.rs

//! Configuration file parsing
//!
//! TOML with two sections, every key optional:
//! - [backend] - where the system package database lives, index cache, architectures
//! - [installer] - denylist, privileged helper, Wine dependency markers

use crate::error::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/deb-installer/config.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub installer: InstallerConfig,
}

/// Package database settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BackendConfig {
    /// dpkg status file
    pub dpkg_status: PathBuf,

    /// Directory holding apt's `*_Packages` lists
    pub apt_lists: PathBuf,

    /// SQLite index cache; no caching when unset
    pub index_cache: Option<PathBuf>,

    /// Architectures, native first; asked from dpkg when empty
    pub architectures: Vec<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            dpkg_status: PathBuf::from("/var/lib/dpkg/status"),
            apt_lists: PathBuf::from("/var/lib/apt/lists"),
            index_cache: None,
            architectures: Vec::new(),
        }
    }
}

/// Installation policy and helper settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct InstallerConfig {
    /// Comma-separated list of package names that may not be installed
    pub denylist: PathBuf,

    /// Privileged helper that performs dependency, config and UAB operations
    pub helper: PathBuf,

    /// Program used to gain privileges for the helper
    pub pkexec: PathBuf,

    /// Dependency name fragments that mark a Wine application
    pub wine_markers: Vec<String>,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            denylist: PathBuf::from("/usr/share/udcp/appblacklist.txt"),
            helper: PathBuf::from("/usr/bin/deepin-deb-installer-dependsInstall"),
            pkexec: PathBuf::from("pkexec"),
            wine_markers: vec!["deepin-wine".to_string()],
        }
    }
}

impl Config {
    /// Parse a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse `path` if it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!("No configuration at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.backend.dpkg_status, PathBuf::from("/var/lib/dpkg/status"));
        assert!(config.backend.index_cache.is_none());
        assert_eq!(config.installer.wine_markers, vec!["deepin-wine"]);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[backend]
architectures = ["arm64", "armhf"]
index-cache = "/var/cache/deb-installer/index.db"

[installer]
wine-markers = ["deepin-wine", "spark-wine"]
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.backend.architectures, vec!["arm64", "armhf"]);
        assert_eq!(
            config.backend.index_cache,
            Some(PathBuf::from("/var/cache/deb-installer/index.db"))
        );
        assert_eq!(config.backend.apt_lists, PathBuf::from("/var/lib/apt/lists"));
        assert_eq!(config.installer.wine_markers.len(), 2);
        assert_eq!(config.installer.pkexec, PathBuf::from("pkexec"));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load_or_default(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.installer.denylist, PathBuf::from("/usr/share/udcp/appblacklist.txt"));
    }

    #[test]
    fn test_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[backend\narchitectures = 3").unwrap();
        assert!(matches!(Config::load(&path), Err(Error::Config(_))));
    }
}

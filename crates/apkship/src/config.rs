//! Configuration file support for apkship.
//!
//! An `apkship.toml` file lets users persist settings and avoid
//! passing CLI flags repeatedly. CLI flags always take precedence over
//! config values, which take precedence over environment variables.
//!
//! The file is searched for starting in the current working directory
//! and walking up parent directories, stopping at a repository root
//! (a directory containing `.git`) or the filesystem root.
//!
//! ## Example
//!
//! ```toml
//! [registry]
//! path = "config/projects.json"
//!
//! [publish]
//! platform = "pgyer"
//! api_key = "${PGYER_API_KEY}"
//! install_type = 1
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use apkship_sdk::{PublishPlatform, DEFAULT_REGISTRY_PATH};
use serde::{Deserialize, Serialize};

/// The default configuration file name.
pub const CONFIG_FILE_NAME: &str = "apkship.toml";

/// Root configuration structure for `apkship.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApkshipConfig {
    /// Project registry location.
    pub registry: RegistryConfig,

    /// Publish defaults merged under CLI flags.
    pub publish: PublishDefaults,
}

/// Project registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Path of the projects JSON file, relative to the working
    /// directory unless absolute.
    pub path: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_REGISTRY_PATH),
        }
    }
}

/// Publish defaults. Credential values may reference environment
/// variables as `${VAR_NAME}`; expansion happens at resolution time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishDefaults {
    /// Default platform for `publish` when `--platform` is omitted.
    pub platform: Option<PublishPlatform>,
    /// Pgyer API key.
    pub api_key: Option<String>,
    /// fir.im API token.
    pub api_token: Option<String>,
    /// Install password (Pgyer).
    pub password: Option<String>,
    /// Default changelog text.
    pub changelog: Option<String>,
    /// Pgyer install policy: 1 = public, 2 = password, 3 = invite.
    pub install_type: Option<u8>,
}

impl ApkshipConfig {
    /// Loads configuration from the specified file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {:?}", path))?;
        toml::from_str(&contents).with_context(|| format!("parsing config file {:?}", path))
    }

    /// Finds and loads `apkship.toml` from the current directory or
    /// any parent. Returns the defaults when no file exists.
    pub fn discover() -> Result<Self> {
        let cwd = std::env::current_dir().context("resolving current directory")?;
        Ok(Self::discover_from(&cwd)?.map(|(config, _)| config).unwrap_or_default())
    }

    /// Finds and loads configuration starting from `start_dir`,
    /// returning the config and the path it was loaded from.
    pub fn discover_from(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut current = start_dir.to_path_buf();
        loop {
            let config_path = current.join(CONFIG_FILE_NAME);
            if config_path.is_file() {
                let config = Self::load_from_file(&config_path)?;
                return Ok(Some((config, config_path)));
            }
            if current.join(".git").exists() || !current.pop() {
                break;
            }
        }
        Ok(None)
    }
}

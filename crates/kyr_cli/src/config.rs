//! Configuration file support for kyr.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `KYR_`, sections separated by
//!    `__`, e.g. `KYR_GITHUB__TOKENS=ghp_a,ghp_b`)
//! 3. Config file (./kyr.toml, then ~/.config/kyr/config.toml)
//! 4. Built-in defaults
//!
//! The database URL defaults to `sqlite://~/.local/state/kyr/kyr.db` on Linux
//! (using the XDG state directory) if not explicitly configured.
//!
//! Example config file:
//! ```toml
//! [database]
//! url = "sqlite://~/.local/state/kyr/kyr.db"  # optional, this is the default
//!
//! [github]
//! tokens = ["ghp_...", "ghp_..."]  # or KYR_GITHUB__TOKENS=a,b
//! api_url = "https://api.github.com"
//!
//! [pull]
//! file_paths = ["poetry.lock"]
//! page_size = 100
//! request_timeout_secs = 30
//! requests_per_second = 10  # 0 disables pacing
//! ```

use std::path::PathBuf;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;

use kyr::fetch::{DEFAULT_PAGE_SIZE, DEFAULT_REQUEST_TIMEOUT_SECS, GITHUB_DEFAULT_RPS};
use kyr::github::DEFAULT_API_URL;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub github: GitHubConfig,
    pub pull: PullConfig,
}

/// Database configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database connection URL.
    /// Supports sqlite:// and postgres:// schemes.
    pub url: Option<String>,
}

/// GitHub configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// Personal access tokens, used in order; a rate-limited token cools
    /// down while the next one is tried.
    pub tokens: Vec<String>,
    /// REST API root, e.g. for GitHub Enterprise.
    pub api_url: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            tokens: Vec::new(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

/// Default pull options.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PullConfig {
    /// Files fetched from new and updated repositories.
    pub file_paths: Vec<String>,
    /// Repositories per listing page.
    pub page_size: u32,
    pub request_timeout_secs: u64,
    /// Outgoing request pace. 0 disables it.
    pub requests_per_second: u32,
}

impl Default for PullConfig {
    fn default() -> Self {
        Self {
            file_paths: vec!["poetry.lock".to_string()],
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            requests_per_second: GITHUB_DEFAULT_RPS,
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/kyr/config.toml)
    /// 3. Local config file (./kyr.toml)
    /// 4. Environment variables with KYR_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(xdg_config) = Self::default_config_path()
            && xdg_config.exists()
        {
            tracing::debug!("Loading config from {:?}", xdg_config);
            builder = builder.add_source(
                File::from(xdg_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let local_config = PathBuf::from("kyr.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./kyr.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        builder = builder.add_source(environment());

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    /// Get the database URL, falling back to the default state directory path.
    ///
    /// The `mode=rwc` parameter creates the SQLite file if it doesn't exist.
    pub fn database_url(&self) -> Option<String> {
        self.database.url.clone().or_else(|| {
            Self::default_state_dir().map(|state_dir| {
                let db_path = state_dir.join("kyr.db");
                format!("sqlite://{}?mode=rwc", db_path.display())
            })
        })
    }

    /// Configured tokens with blanks dropped.
    pub fn github_tokens(&self) -> Vec<String> {
        self.github
            .tokens
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "kyr").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// XDG state directory (`~/.local/state/kyr` on Linux), falling back to
    /// the data directory on platforms without one.
    pub fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "kyr").map(|dirs| {
            dirs.state_dir()
                .map(PathBuf::from)
                .unwrap_or_else(|| dirs.data_local_dir().to_path_buf())
        })
    }
}

/// `KYR_SECTION__KEY` variables; lists are comma separated.
fn environment() -> Environment {
    Environment::with_prefix("KYR")
        .prefix_separator("_")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("github.tokens")
        .with_list_parse_key("pull.file_paths")
        .try_parsing(true)
}

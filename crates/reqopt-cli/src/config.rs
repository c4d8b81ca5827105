use anyhow::{Context, Result};
use reqopt::platform::DEFAULT_CONDITIONAL_RULES;
use reqopt::{ConditionalRule, Stability};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "reqopt.toml";

/// The reqopt configuration file structure (reqopt.toml)
#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ReqoptConfig {
    /// SQLite package store, relative to the config file
    pub database: PathBuf,

    /// Platform version used when a request does not send one
    pub default_platform_version: Option<String>,

    /// Lowest stability a resolved release may have
    pub minimum_stability: String,

    /// HTTP API configuration
    pub server: ServerConfig,

    /// Platform filter configuration
    pub platform: PlatformConfig,

    /// Directory of the file this was loaded from
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl Default for ReqoptConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("registry.sqlite"),
            default_platform_version: None,
            minimum_stability: "dev".to_string(),
            server: ServerConfig::default(),
            platform: PlatformConfig::default(),
            base_dir: None,
        }
    }
}

/// HTTP API configuration
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PlatformConfig {
    /// Packages excluded while the platform is older than a version
    #[serde(default = "default_conditional")]
    pub conditional: Vec<ConditionalEntry>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            conditional: default_conditional(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConditionalEntry {
    pub name: String,
    pub min_platform_version: String,
}

fn default_conditional() -> Vec<ConditionalEntry> {
    DEFAULT_CONDITIONAL_RULES
        .iter()
        .map(|(name, min)| ConditionalEntry {
            name: name.to_string(),
            min_platform_version: min.to_string(),
        })
        .collect()
}

impl ReqoptConfig {
    /// Load configuration from reqopt.toml, searching upward from the given directory
    pub fn load(start_dir: &Path) -> Result<Option<Self>> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE);

            if config_path.exists() {
                return Self::load_file(&config_path).map(Some);
            }

            // Move to parent directory
            if !current.pop() {
                return Ok(None);
            }
        }
    }

    /// Load configuration by searching upward from the current working directory
    pub fn load_from_cwd() -> Result<Option<Self>> {
        let cwd = std::env::current_dir()?;
        Self::load(&cwd)
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut config: ReqoptConfig =
            toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply `REQOPT_DATABASE`, `REQOPT_HOST` and `REQOPT_PORT`
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(database) = lookup("REQOPT_DATABASE") {
            self.set_database(PathBuf::from(database));
        }
        if let Some(host) = lookup("REQOPT_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("REQOPT_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("REQOPT_PORT is not a valid port: {}", port))?;
        }
        Ok(())
    }

    /// Override the package store with a path relative to the working directory
    pub fn set_database(&mut self, database: PathBuf) {
        self.database = database;
        self.base_dir = None;
    }

    /// Path of the package store
    pub fn database_path(&self) -> PathBuf {
        match &self.base_dir {
            Some(base) if self.database.is_relative() => base.join(&self.database),
            _ => self.database.clone(),
        }
    }

    pub fn minimum_stability(&self) -> Result<Stability> {
        self.minimum_stability
            .parse()
            .with_context(|| format!("Invalid minimum-stability: {}", self.minimum_stability))
    }

    pub fn conditional_rules(&self) -> Result<Vec<ConditionalRule>> {
        self.platform
            .conditional
            .iter()
            .map(|entry| {
                ConditionalRule::new(&entry.name, &entry.min_platform_version)
                    .with_context(|| format!("Invalid conditional platform rule for {}", entry.name))
            })
            .collect()
    }
}

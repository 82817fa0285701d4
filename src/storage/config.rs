//! Configuration handling for assetpipe
//!
//! Configuration is read from `assetpipe.toml` at the project root and
//! `~/.config/assetpipe/config.toml` (global). Every field has a default,
//! so a project with no config file builds the conventional `src/` layout.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{validate_length, DEFAULT_HASH_LENGTH};

/// Name of the project configuration file
pub const CONFIG_FILE: &str = "assetpipe.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// How a builder attaches its source map
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceMapMode {
    /// Separate `.map` file next to the artifact
    #[default]
    External,
    /// Base64 data URL in the artifact's trailing comment
    Inline,
    None,
}

impl SourceMapMode {
    pub fn as_str(&self) -> &str {
        match self {
            SourceMapMode::External => "external",
            SourceMapMode::Inline => "inline",
            SourceMapMode::None => "none",
        }
    }
}

/// Script bundle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Entry module, relative to the project root
    pub entry: PathBuf,

    /// Directory whose changes trigger a script rebuild
    pub watch_dir: PathBuf,

    /// Subdirectory of the output directory for bundles
    pub output_dir: String,

    /// Bundle base name (`{name}.{hash}.js`)
    pub name: String,

    pub source_map: SourceMapMode,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            entry: PathBuf::from("src/js/index.js"),
            watch_dir: PathBuf::from("src/js"),
            output_dir: "js".to_string(),
            name: "bundle".to_string(),
            source_map: SourceMapMode::External,
        }
    }
}

/// Stylesheet settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    /// SCSS entry, relative to the project root
    pub entry: PathBuf,

    /// Directory whose changes trigger a style rebuild
    pub watch_dir: PathBuf,

    /// Subdirectory of the output directory for stylesheets
    pub output_dir: String,

    /// Stylesheet base name (`{name}.{hash}.css`)
    pub name: String,

    pub source_map: SourceMapMode,

    /// Strip whitespace and comments from the output
    pub minify: bool,

    /// Browserslist queries used for vendor prefixing
    pub browserslist: Vec<String>,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            entry: PathBuf::from("src/scss/main.scss"),
            watch_dir: PathBuf::from("src/scss"),
            output_dir: "css".to_string(),
            name: "style".to_string(),
            source_map: SourceMapMode::External,
            minify: true,
            browserslist: vec!["defaults".to_string()],
        }
    }
}

/// Markup settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PagesConfig {
    /// Directory scanned recursively for `*.html`
    pub dir: PathBuf,
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("src/pages"),
        }
    }
}

/// Development server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl ServerConfig {
    /// `host:port` string for binding
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Watch mode settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds before a batch of changes is handled
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 200 }
    }
}

/// Project-level configuration (`assetpipe.toml`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Output directory, relative to the project root
    pub out_dir: PathBuf,

    /// Hex characters of the content hash kept in filenames
    pub hash_length: usize,

    pub script: ScriptConfig,
    pub style: StyleConfig,
    pub pages: PagesConfig,
    pub server: ServerConfig,
    pub watch: WatchConfig,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("build"),
            hash_length: DEFAULT_HASH_LENGTH,
            script: ScriptConfig::default(),
            style: StyleConfig::default(),
            pages: PagesConfig::default(),
            server: ServerConfig::default(),
            watch: WatchConfig::default(),
        }
    }
}

impl ProjectConfig {
    /// Rejects values no build could honor
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_length(self.hash_length).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.out_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("out_dir must not be empty".to_string()));
        }
        if self.script.name.is_empty() || self.style.name.is_empty() {
            return Err(ConfigError::Invalid(
                "script.name and style.name must not be empty".to_string(),
            ));
        }
        if self.style.browserslist.is_empty() {
            return Err(ConfigError::Invalid(
                "style.browserslist needs at least one query".to_string(),
            ));
        }
        Ok(())
    }
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default output format (text or json)
    pub default_format: OutputFormat,
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Combined configuration (global + project)
#[derive(Debug, Clone)]
pub struct Config {
    pub project: ProjectConfig,
    pub global: GlobalConfig,
    /// Directory holding `assetpipe.toml`, if one was found
    pub project_root: Option<PathBuf>,
}

impl Config {
    /// Loads configuration for a specific project
    pub fn for_project(project_root: &Path) -> Result<Self> {
        let global = Self::load_global()?;
        let project = Self::load_project_config(project_root)?;

        Ok(Self {
            project,
            global,
            project_root: Some(project_root.to_path_buf()),
        })
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "assetpipe", "assetpipe")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Loads global configuration
    pub fn load_global() -> Result<GlobalConfig> {
        let config_dir = match Self::global_config_dir() {
            Some(dir) => dir,
            None => return Ok(GlobalConfig::default()),
        };

        let config_path = config_dir.join("config.toml");
        if !config_path.exists() {
            return Ok(GlobalConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read global config: {}", config_path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse global config")
    }

    /// Loads project configuration from a specific root
    fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
        let config_path = project_root.join(CONFIG_FILE);

        if !config_path.exists() {
            return Ok(ProjectConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read project config: {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .with_context(|| format!("Failed to parse project config: {}", config_path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid project config: {}", config_path.display()))?;

        Ok(config)
    }

    /// Walks up from `start` looking for `assetpipe.toml`
    pub fn find_project_root_from(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();

        loop {
            if current.join(CONFIG_FILE).is_file() {
                return Some(current);
            }

            if !current.pop() {
                return None;
            }
        }
    }
}

//! # Storage Layer
//!
//! Project discovery and configuration.
//!
//! ## Project Structure
//!
//! ```text
//! assetpipe.toml            # Optional project configuration
//! src/
//! ├── js/index.js           # Script entry
//! ├── scss/main.scss        # Stylesheet entry
//! └── pages/**/*.html       # Markup copied verbatim
//! build/                    # Output (deleted by `assetpipe clean`)
//! ```
//!
//! ## Key Types
//!
//! - [`Project`] - Resolves configured paths against the project root
//! - [`Config`] - Project and global configuration

mod config;
mod project;

pub use config::{
    Config, ConfigError, GlobalConfig, OutputFormat, PagesConfig, ProjectConfig, ScriptConfig,
    ServerConfig, SourceMapMode, StyleConfig, WatchConfig, CONFIG_FILE,
};
pub use project::{Project, ProjectError};

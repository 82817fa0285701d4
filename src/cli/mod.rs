//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Commands
//!
//! | Command | Purpose |
//! |---------|---------|
//! | `start` (default) | Full build, then serve and rebuild on change |
//! | `build` | Clean and build once; fails if a builder failed |
//! | `clean` | Empty the output directory |
//! | `serve` | Serve the existing output directory |
//! | `init` | Scaffold a project |
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable, timestamped progress lines
//! - `json` - One JSON object per build cycle
//!
//! The default comes from `default_format` in the global config.
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for debug output:
//! ```bash
//! assetpipe --verbose build
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod build;
mod output;
mod serve;
mod start;

pub use app::{run, Cli, Commands};
pub use output::{Output, OutputFormat};

//! Project management
//!
//! Handles project discovery and scaffolding, and resolves configured paths
//! against the project root.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use super::config::CONFIG_FILE;
use super::Config;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Project directory does not exist: {0}")]
    NotFound(PathBuf),

    #[error("Output directory {0} must not overlap a source directory")]
    OutputOverlapsSources(PathBuf),
}

const DEFAULT_CONFIG: &str = r#"# assetpipe configuration
# Every value below is the default; delete what you don't change.

out_dir = "build"
hash_length = 8

[script]
entry = "src/js/index.js"
watch_dir = "src/js"
output_dir = "js"
name = "bundle"
source_map = "external"   # external | inline | none

[style]
entry = "src/scss/main.scss"
watch_dir = "src/scss"
output_dir = "css"
name = "style"
source_map = "external"
minify = true
browserslist = ["defaults"]

[pages]
dir = "src/pages"

[server]
host = "127.0.0.1"
port = 3000

[watch]
debounce_ms = 200
"#;

const DEFAULT_SCRIPT: &str = r#"import { greet } from "./greet.js";

document.addEventListener("DOMContentLoaded", () => {
  document.querySelector("h1").textContent = greet("assetpipe");
});
"#;

const DEFAULT_SCRIPT_MODULE: &str = r#"export function greet(name) {
  return `Hello from ${name}`;
}
"#;

const DEFAULT_STYLE: &str = r#"$accent: #3355ff;

body {
  font-family: sans-serif;

  h1 {
    color: $accent;
    user-select: none;
  }
}
"#;

const DEFAULT_PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <title>assetpipe</title>
    <!-- inject:css -->
    <!-- endinject -->
  </head>
  <body>
    <h1>Hello</h1>
    <!-- inject:js -->
    <!-- endinject -->
  </body>
</html>
"#;

/// An assetpipe project
pub struct Project {
    root: PathBuf,
    config: Config,
}

impl Project {
    /// Opens the project at the given path
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ProjectError::NotFound(root).into());
        }

        let config = Config::for_project(&root)?;
        let project = Self { root, config };
        project.check_layout()?;
        Ok(project)
    }

    /// Opens the project holding `assetpipe.toml` at the current directory or
    /// a parent, falling back to the current directory with defaults
    pub fn open_current() -> Result<Self> {
        let current = std::env::current_dir().context("Failed to read current directory")?;
        let root = Config::find_project_root_from(&current).unwrap_or(current);

        Self::open(root)
    }

    /// Scaffolds a project at the given path; existing files are left alone
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create project directory: {}", root.display()))?;

        let files: [(&str, &str); 5] = [
            (CONFIG_FILE, DEFAULT_CONFIG),
            ("src/js/index.js", DEFAULT_SCRIPT),
            ("src/js/greet.js", DEFAULT_SCRIPT_MODULE),
            ("src/scss/main.scss", DEFAULT_STYLE),
            ("src/pages/index.html", DEFAULT_PAGE),
        ];

        for (rel, content) in files {
            let path = root.join(rel);
            if path.exists() {
                continue;
            }
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create directory: {}", parent.display())
                })?;
            }
            fs::write(&path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }

        Self::open(root)
    }

    /// Returns the project root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the absolute output directory
    pub fn out_dir(&self) -> PathBuf {
        self.root.join(&self.config.project.out_dir)
    }

    pub fn script_entry(&self) -> PathBuf {
        self.root.join(&self.config.project.script.entry)
    }

    pub fn script_dir(&self) -> PathBuf {
        self.root.join(&self.config.project.script.watch_dir)
    }

    pub fn style_entry(&self) -> PathBuf {
        self.root.join(&self.config.project.style.entry)
    }

    pub fn style_dir(&self) -> PathBuf {
        self.root.join(&self.config.project.style.watch_dir)
    }

    pub fn pages_dir(&self) -> PathBuf {
        self.root.join(&self.config.project.pages.dir)
    }

    /// Returns a path relative to the project root, with `/` separators
    pub fn display_path(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// The cleaner deletes the output directory and the watcher ignores it,
    /// so it may neither hold nor sit inside a source tree
    fn check_layout(&self) -> Result<()> {
        let out_dir = self.out_dir();
        let sources = [self.script_dir(), self.style_dir(), self.pages_dir()];

        let overlaps = sources
            .iter()
            .any(|dir| dir.starts_with(&out_dir) || out_dir.starts_with(dir));
        if out_dir == self.root || overlaps {
            return Err(ProjectError::OutputOverlapsSources(out_dir).into());
        }
        Ok(())
    }
}

//! Page copier
//!
//! Copies `*.html` under the pages directory into the output directory,
//! byte for byte, keeping the relative layout.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use super::BuildError;

/// Pages written and pruned by one copy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CopyReport {
    pub copied: usize,
    pub removed: usize,
}

/// Copies pages and remembers what it produced
#[derive(Debug)]
pub struct PageCopier {
    source_dir: PathBuf,
    out_dir: PathBuf,
    /// Output-relative paths of the pages written by the last copy
    copied: BTreeSet<PathBuf>,
}

impl PageCopier {
    pub fn new(source_dir: PathBuf, out_dir: PathBuf) -> Self {
        Self {
            source_dir,
            out_dir,
            copied: BTreeSet::new(),
        }
    }

    /// Copies every page; output pages whose source is gone are removed
    pub fn copy(&mut self) -> Result<CopyReport, BuildError> {
        let sources = self.discover()?;
        let mut report = CopyReport::default();

        for rel in &sources {
            let from = self.source_dir.join(rel);
            let to = self.out_dir.join(rel);
            if let Some(parent) = to.parent() {
                fs::create_dir_all(parent).map_err(|e| {
                    BuildError::io(format!("Failed to create directory {}", parent.display()), e)
                })?;
            }
            fs::copy(&from, &to).map_err(|e| {
                BuildError::io(format!("Failed to copy page {}", from.display()), e)
            })?;
            report.copied += 1;
        }

        for stale in self.copied.difference(&sources) {
            let path = self.out_dir.join(stale);
            match fs::remove_file(&path) {
                Ok(()) => report.removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(BuildError::io(
                        format!("Failed to remove page {}", path.display()),
                        e,
                    ))
                }
            }
        }

        self.copied = sources;
        Ok(report)
    }

    /// Output-relative paths of the pages currently in the output directory
    pub fn pages(&self) -> impl Iterator<Item = &Path> {
        self.copied.iter().map(PathBuf::as_path)
    }

    /// Drops the record of copied pages (after the output was cleaned)
    pub fn forget(&mut self) {
        self.copied.clear();
    }

    fn discover(&self) -> Result<BTreeSet<PathBuf>, BuildError> {
        let mut pages = BTreeSet::new();
        if !self.source_dir.is_dir() {
            return Ok(pages);
        }

        for entry in WalkDir::new(&self.source_dir).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let context = format!("Failed to scan pages in {}", self.source_dir.display());
                BuildError::io(context, io::Error::other(e))
            })?;
            if !entry.file_type().is_file() || !is_page(entry.path()) {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(&self.source_dir) {
                pages.insert(rel.to_path_buf());
            }
        }

        Ok(pages)
    }
}

fn is_page(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("html"))
}

//! # Build Pipeline
//!
//! Orchestrates the build steps over a project:
//!
//! ```text
//! clean -> copy pages -> (script build || style build) -> inject
//! ```
//!
//! Builders return [`Artifact`]s; the latest successful artifact of each
//! builder is kept in an [`AssetManifest`], which is the only input the
//! injector gets besides the copied pages. Script and style failures are
//! recoverable: they are reported in the [`CycleReport`] and the previous
//! artifact stays in place. Every other failure aborts the cycle.

mod clean;
mod injector;
mod pages;
mod script;
mod server;
mod style;
mod watch;

use std::collections::BTreeSet;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::thread;

use serde::Serialize;
use thiserror::Error;

use crate::domain::ContentHash;
use crate::storage::Project;

pub use clean::clean;
pub use injector::inject_pages;
pub use pages::{CopyReport, PageCopier};
pub use script::{resolve, BundleStats, ScriptBuilder, ScriptError};
pub use server::{Server, ServerError};
pub use style::{StyleBuilder, StyleError};
pub use watch::{drain_pending, SourceWatcher, TriggerClass, TriggerMap, WatchCycle};

/// Which builder produced an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Script,
    Style,
}

/// A hash-named file written to the output directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub kind: ArtifactKind,

    /// Absolute path of the written file
    pub path: PathBuf,

    /// Path relative to the output directory, `/`-separated
    pub rel_path: String,

    /// External source map, if one was written
    pub map_path: Option<PathBuf>,

    pub hash: ContentHash,
}

impl Artifact {
    /// Deletes the artifact and its map; missing files are ignored
    pub(crate) fn remove(&self) -> Result<(), BuildError> {
        let files = std::iter::once(&self.path).chain(self.map_path.iter());
        for file in files {
            match std::fs::remove_file(file) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(BuildError::io(
                        format!("Failed to remove stale artifact {}", file.display()),
                        e,
                    ))
                }
            }
        }
        Ok(())
    }
}

/// Latest successful artifact of each builder
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssetManifest {
    pub script: Option<Artifact>,
    pub style: Option<Artifact>,
}

impl AssetManifest {
    /// Replaces the entry for the artifact's kind
    pub fn record(&mut self, artifact: Artifact) {
        match artifact.kind {
            ArtifactKind::Script => self.script = Some(artifact),
            ArtifactKind::Style => self.style = Some(artifact),
        }
    }

    /// Output-relative stylesheet paths, in injection order
    pub fn style_paths(&self) -> Vec<&str> {
        self.style.iter().map(|a| a.rel_path.as_str()).collect()
    }

    /// Output-relative script paths, in injection order
    pub fn script_paths(&self) -> Vec<&str> {
        self.script.iter().map(|a| a.rel_path.as_str()).collect()
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error(transparent)]
    Style(#[from] StyleError),

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl BuildError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        BuildError::Io {
            context: context.into(),
            source,
        }
    }

    /// Build-tool failures keep the pipeline alive; everything else aborts it
    pub fn is_recoverable(&self) -> bool {
        matches!(self, BuildError::Script(_) | BuildError::Style(_))
    }
}

/// What one build cycle did
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Classes that ran, in execution order
    pub classes: Vec<TriggerClass>,
    pub pages: Option<CopyReport>,
    pub script: Option<Artifact>,
    pub style: Option<Artifact>,
    pub injected: usize,
    /// Recoverable builder failures
    pub failures: Vec<BuildError>,
}

impl CycleReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Owns the builders of one project for the lifetime of a command
pub struct Pipeline {
    out_dir: PathBuf,
    script: ScriptBuilder,
    style: StyleBuilder,
    pages: PageCopier,
    manifest: AssetManifest,
}

impl Pipeline {
    pub fn new(project: &Project) -> Self {
        Self {
            out_dir: project.out_dir(),
            script: ScriptBuilder::new(project),
            style: StyleBuilder::new(project),
            pages: PageCopier::new(project.pages_dir(), project.out_dir()),
            manifest: AssetManifest::default(),
        }
    }

    /// Cleans the output directory and runs every step once
    pub fn full_build(&mut self) -> Result<CycleReport, BuildError> {
        clean(&self.out_dir)?;
        self.pages.forget();
        self.manifest = AssetManifest::default();
        self.script.forget_output();
        self.style.forget_output();

        let classes = BTreeSet::from([TriggerClass::Pages, TriggerClass::Script, TriggerClass::Style]);
        self.rebuild(&classes)
    }

    /// Runs each triggered class once, then injects once
    pub fn rebuild(&mut self, classes: &BTreeSet<TriggerClass>) -> Result<CycleReport, BuildError> {
        let mut report = CycleReport {
            classes: classes.iter().copied().collect(),
            ..CycleReport::default()
        };

        if classes.contains(&TriggerClass::Pages) {
            report.pages = Some(self.pages.copy()?);
        }

        let run_script = classes.contains(&TriggerClass::Script);
        let run_style = classes.contains(&TriggerClass::Style);

        let script = &mut self.script;
        let style = &mut self.style;
        let (script_result, style_result) = thread::scope(|s| {
            let script_handle = if run_script {
                Some(s.spawn(move || script.build()))
            } else {
                None
            };
            let style_handle = if run_style {
                Some(s.spawn(move || style.build()))
            } else {
                None
            };
            (
                script_handle.map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e))),
                style_handle.map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e))),
            )
        });

        for result in [script_result, style_result].into_iter().flatten() {
            match result {
                Ok(artifact) => {
                    match artifact.kind {
                        ArtifactKind::Script => report.script = Some(artifact.clone()),
                        ArtifactKind::Style => report.style = Some(artifact.clone()),
                    }
                    self.manifest.record(artifact);
                }
                Err(e) if e.is_recoverable() => report.failures.push(e),
                Err(e) => return Err(e),
            }
        }

        report.injected = self.inject()?;
        Ok(report)
    }

    /// Points every copied page at the current manifest
    pub fn inject(&self) -> Result<usize, BuildError> {
        inject_pages(&self.out_dir, self.pages.pages(), &self.manifest)
    }

    pub fn manifest(&self) -> &AssetManifest {
        &self.manifest
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Module counts and cycles of the last successful bundle
    pub fn bundle_stats(&self) -> Option<&BundleStats> {
        self.script.stats()
    }
}

/// `/`-separated form of `path` relative to `base`
pub(crate) fn slash_path(base: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(base).unwrap_or(path);
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Resolves `.` and `..` components without touching the filesystem
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

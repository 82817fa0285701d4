//! Source watching
//!
//! Change events are debounced, classified by the source tree they belong
//! to and coalesced: every batch pending when a cycle starts is drained,
//! so each [`TriggerClass`] runs at most once per cycle no matter how many
//! files changed.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};

use crate::storage::Project;

/// Source tree a change belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TriggerClass {
    Pages,
    Script,
    Style,
}

impl TriggerClass {
    pub fn as_str(&self) -> &str {
        match self {
            TriggerClass::Pages => "pages",
            TriggerClass::Script => "script",
            TriggerClass::Style => "style",
        }
    }
}

/// Maps changed paths to trigger classes
#[derive(Debug, Clone)]
pub struct TriggerMap {
    out_dir: Vec<PathBuf>,
    classes: Vec<(Vec<PathBuf>, TriggerClass)>,
}

impl TriggerMap {
    pub fn new(project: &Project) -> Self {
        Self {
            out_dir: both_forms(&project.out_dir()),
            classes: vec![
                (both_forms(&project.script_dir()), TriggerClass::Script),
                (both_forms(&project.style_dir()), TriggerClass::Style),
                (both_forms(&project.pages_dir()), TriggerClass::Pages),
            ],
        }
    }

    /// Class of a changed path; `None` for the output directory and
    /// anything outside the watched trees
    pub fn classify(&self, path: &Path) -> Option<TriggerClass> {
        if self.out_dir.iter().any(|dir| path.starts_with(dir)) {
            return None;
        }
        self.classes
            .iter()
            .find(|(dirs, _)| dirs.iter().any(|dir| path.starts_with(dir)))
            .map(|(_, class)| *class)
    }

    /// Distinct classes touched by `paths`
    pub fn coalesce<'a>(&self, paths: impl IntoIterator<Item = &'a Path>) -> BTreeSet<TriggerClass> {
        paths.into_iter().filter_map(|path| self.classify(path)).collect()
    }

    /// Source directories that exist and can be watched
    pub fn watch_dirs(&self) -> Vec<&Path> {
        self.classes
            .iter()
            .filter_map(|(dirs, _)| dirs.first())
            .map(PathBuf::as_path)
            .filter(|dir| dir.is_dir())
            .collect()
    }
}

/// The path as given plus its canonical form, when that differs
fn both_forms(path: &Path) -> Vec<PathBuf> {
    let mut forms = vec![path.to_path_buf()];
    if let Ok(canonical) = fs::canonicalize(path) {
        if canonical != path {
            forms.push(canonical);
        }
    }
    forms
}

/// Blocks for one item, then takes everything else already queued
///
/// Returns `None` once every sender is gone.
pub fn drain_pending<T>(rx: &Receiver<T>) -> Option<Vec<T>> {
    let first = rx.recv().ok()?;
    let mut items = vec![first];
    items.extend(rx.try_iter());
    Some(items)
}

/// Work for one rebuild cycle
#[derive(Debug, Default)]
pub struct WatchCycle {
    pub classes: BTreeSet<TriggerClass>,
    /// Number of changed paths seen across the drained batches
    pub changes: usize,
    /// Watcher errors reported alongside the batches
    pub errors: Vec<String>,
}

/// Debounced watcher over a project's source trees
pub struct SourceWatcher {
    triggers: TriggerMap,
    rx: Receiver<DebounceEventResult>,
    // Dropping the debouncer stops the watch
    _debouncer: Debouncer<notify::RecommendedWatcher>,
}

impl SourceWatcher {
    pub fn new(triggers: TriggerMap, debounce: Duration) -> notify::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let mut debouncer = new_debouncer(debounce, tx)?;

        for dir in triggers.watch_dirs() {
            debouncer.watcher().watch(dir, RecursiveMode::Recursive)?;
        }

        Ok(Self {
            triggers,
            rx,
            _debouncer: debouncer,
        })
    }

    /// Directories being watched
    pub fn watched(&self) -> Vec<&Path> {
        self.triggers.watch_dirs()
    }

    /// Waits for changes and returns the coalesced work; `None` when the
    /// watcher has shut down
    pub fn next_cycle(&self) -> Option<WatchCycle> {
        loop {
            let batches = drain_pending(&self.rx)?;
            let mut cycle = WatchCycle::default();

            for batch in batches {
                match batch {
                    Ok(events) => {
                        cycle.changes += events.len();
                        cycle
                            .classes
                            .extend(self.triggers.coalesce(events.iter().map(|e| e.path.as_path())));
                    }
                    Err(error) => cycle.errors.push(format!("{:?}", error)),
                }
            }

            if !cycle.classes.is_empty() || !cycle.errors.is_empty() {
                return Some(cycle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project() -> (TempDir, Project) {
        let dir = TempDir::new().unwrap();
        for sub in ["src/js", "src/scss", "src/pages"] {
            fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        let project = Project::open(dir.path()).unwrap();
        (dir, project)
    }

    #[test]
    fn classifies_by_source_tree() {
        let (dir, project) = project();
        let triggers = TriggerMap::new(&project);
        let root = dir.path();

        assert_eq!(triggers.classify(&root.join("src/js/a/b.js")), Some(TriggerClass::Script));
        assert_eq!(triggers.classify(&root.join("src/scss/_vars.scss")), Some(TriggerClass::Style));
        assert_eq!(triggers.classify(&root.join("src/pages/index.html")), Some(TriggerClass::Pages));
        assert_eq!(triggers.classify(&root.join("build/index.html")), None);
        assert_eq!(triggers.classify(&root.join("README.md")), None);
    }

    #[test]
    fn canonical_event_paths_are_recognized() {
        let (dir, project) = project();
        let triggers = TriggerMap::new(&project);
        let canonical = fs::canonicalize(dir.path()).unwrap();

        assert_eq!(
            triggers.classify(&canonical.join("src/scss/main.scss")),
            Some(TriggerClass::Style)
        );
    }

    #[test]
    fn coalesces_many_changes() {
        let (dir, project) = project();
        let triggers = TriggerMap::new(&project);
        let paths: Vec<PathBuf> = [
            "src/js/a.js",
            "src/js/b.js",
            "src/scss/main.scss",
            "src/js/c.js",
            "build/js/bundle.0000aaaa.js",
        ]
        .iter()
        .map(|rel| dir.path().join(rel))
        .collect();

        let classes = triggers.coalesce(paths.iter().map(PathBuf::as_path));
        assert_eq!(
            classes.into_iter().collect::<Vec<_>>(),
            vec![TriggerClass::Script, TriggerClass::Style]
        );
    }

    #[test]
    fn only_existing_directories_are_watched() {
        let (dir, project) = project();
        fs::remove_dir_all(dir.path().join("src/pages")).unwrap();
        let triggers = TriggerMap::new(&project);

        assert_eq!(
            triggers.watch_dirs(),
            vec![dir.path().join("src/js").as_path(), dir.path().join("src/scss").as_path()]
        );
    }

    #[test]
    fn drains_everything_pending() {
        let (tx, rx) = mpsc::channel();
        for i in 0..5 {
            tx.send(i).unwrap();
        }

        assert_eq!(drain_pending(&rx), Some(vec![0, 1, 2, 3, 4]));

        tx.send(9).unwrap();
        drop(tx);
        assert_eq!(drain_pending(&rx), Some(vec![9]));
        assert_eq!(drain_pending(&rx), None);
    }

    #[test]
    fn watcher_reports_source_changes() {
        let (dir, project) = project();
        let watcher =
            SourceWatcher::new(TriggerMap::new(&project), Duration::from_millis(50)).unwrap();
        assert_eq!(watcher.watched().len(), 3);

        std::thread::sleep(Duration::from_millis(100));
        fs::write(dir.path().join("src/scss/main.scss"), "a { b: c }").unwrap();

        let cycle = watcher.next_cycle().unwrap();
        assert!(cycle.classes.contains(&TriggerClass::Style));
        assert!(!cycle.classes.contains(&TriggerClass::Script));
    }
}

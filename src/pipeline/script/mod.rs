//! Script builder
//!
//! Walks the static imports reachable from the entry, lowers each module
//! through the transform chain and emits one hash-named bundle with its
//! source map. The builder lives as long as the command and keeps every
//! transformed module keyed by path; a module is only re-read when its
//! modification time or size changed.

mod bundle;
mod resolve;

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;
use thiserror::Error;

use super::{normalize, slash_path, Artifact, ArtifactKind, BuildError};
use crate::domain::{
    find_requires, CommentStyle, ContentHash, EsModuleTransform, ModuleGraph, ScriptTransform,
    TransformError,
};
use crate::storage::{Project, SourceMapMode};

use bundle::{emit, EmitModule};
pub use resolve::resolve;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Script entry not found: {0}")]
    MissingEntry(PathBuf),

    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("{path}: {error}")]
    Transform { path: String, error: TransformError },

    #[error("{importer}: cannot resolve '{specifier}'")]
    Unresolved { specifier: String, importer: String },

    #[error("Failed to emit bundle: {0}")]
    Emit(String),

    #[error("Failed to generate script source map: {0}")]
    SourceMap(String),

    #[error("Failed to hash bundle: {0}")]
    Hash(String),
}

/// Shape of the last emitted bundle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BundleStats {
    pub modules: usize,
    /// Modules taken from the cache without re-reading
    pub reused: usize,
    /// Groups of modules that import each other, root-relative
    pub cycles: Vec<Vec<String>>,
}

/// File identity used to invalidate cached modules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

impl FileStamp {
    fn of(path: &Path) -> Option<Self> {
        let metadata = fs::metadata(path).ok()?;
        Some(Self {
            modified: metadata.modified().ok(),
            len: metadata.len(),
        })
    }
}

struct CachedModule {
    stamp: FileStamp,
    original: String,
    code: String,
    requires: Vec<String>,
}

/// Long-lived script bundler
pub struct ScriptBuilder {
    root: PathBuf,
    entry: PathBuf,
    out_dir: PathBuf,
    out_rel: String,
    name: String,
    source_map: SourceMapMode,
    hash_length: usize,
    transforms: Vec<Box<dyn ScriptTransform>>,
    cache: HashMap<PathBuf, CachedModule>,
    previous: Option<Artifact>,
    stats: Option<BundleStats>,
}

impl ScriptBuilder {
    pub fn new(project: &Project) -> Self {
        let config = &project.config().project;
        let out_rel = config.script.output_dir.trim_matches('/').to_string();

        Self {
            root: project.root().to_path_buf(),
            entry: normalize(&project.script_entry()),
            out_dir: project.out_dir().join(&out_rel),
            out_rel,
            name: config.script.name.clone(),
            source_map: config.script.source_map,
            hash_length: config.hash_length,
            transforms: vec![Box::new(EsModuleTransform)],
            cache: HashMap::new(),
            previous: None,
            stats: None,
        }
    }

    /// Appends a transform; transforms run in insertion order
    pub fn with_transform(mut self, transform: Box<dyn ScriptTransform>) -> Self {
        self.transforms.push(transform);
        self
    }

    /// Names of the transforms in the chain
    pub fn transform_names(&self) -> Vec<&'static str> {
        self.transforms.iter().map(|t| t.name()).collect()
    }

    pub fn stats(&self) -> Option<&BundleStats> {
        self.stats.as_ref()
    }

    /// Forgets the last artifact (its file was deleted with the output)
    pub fn forget_output(&mut self) {
        self.previous = None;
    }

    /// Bundles the entry and writes the artifact
    ///
    /// On failure nothing in the output directory is touched.
    pub fn build(&mut self) -> Result<Artifact, BuildError> {
        if !self.entry.is_file() {
            return Err(ScriptError::MissingEntry(self.entry.clone()).into());
        }

        let (graph, reused) = self.collect_modules()?;
        let bundle_file = format!("{}.js", self.name);

        let mut modules = Vec::with_capacity(graph.len());
        for (id, path) in graph.modules() {
            if let Some(cached) = self.cache.get(path) {
                modules.push(EmitModule {
                    id,
                    source_name: slash_path(&self.root, path),
                    original: &cached.original,
                    code: &cached.code,
                    dependencies: graph.dependency_table(path),
                });
            }
        }
        let (code, mut map) = emit(&modules, &bundle_file)?;

        let hash = ContentHash::of(code.as_bytes(), self.hash_length)
            .map_err(|e| ScriptError::Hash(e.to_string()))?;
        let file_name = hash.stamp(&self.name, ".js");
        map.file = Some(file_name.clone());

        let path = self.out_dir.join(&file_name);
        let map_name = format!("{}.map", file_name);
        let map_error = |e: serde_json::Error| ScriptError::SourceMap(e.to_string());
        let (contents, map_path) = match self.source_map {
            SourceMapMode::External => (
                format!("{}{}\n", code, CommentStyle::Script.url_comment(&map_name)),
                Some((self.out_dir.join(&map_name), map.to_json().map_err(map_error)?)),
            ),
            SourceMapMode::Inline => {
                let comment = map.inline_comment(CommentStyle::Script).map_err(map_error)?;
                (format!("{}{}\n", code, comment), None)
            }
            SourceMapMode::None => (code, None),
        };

        fs::create_dir_all(&self.out_dir).map_err(|e| {
            BuildError::io(format!("Failed to create {}", self.out_dir.display()), e)
        })?;
        fs::write(&path, contents)
            .map_err(|e| BuildError::io(format!("Failed to write {}", path.display()), e))?;
        if let Some((map_path, json)) = &map_path {
            fs::write(map_path, json).map_err(|e| {
                BuildError::io(format!("Failed to write {}", map_path.display()), e)
            })?;
        }

        let artifact = Artifact {
            kind: ArtifactKind::Script,
            path,
            rel_path: join_rel(&self.out_rel, &file_name),
            map_path: map_path.map(|(path, _)| path),
            hash,
        };

        if let Some(previous) = self.previous.take() {
            if previous.path != artifact.path {
                previous.remove()?;
            }
        }
        self.previous = Some(artifact.clone());
        self.stats = Some(BundleStats {
            modules: graph.len(),
            reused,
            cycles: graph
                .cycles()
                .into_iter()
                .map(|group| group.iter().map(|p| slash_path(&self.root, p)).collect())
                .collect(),
        });

        Ok(artifact)
    }

    /// Discovers every module from the entry, refreshing the cache
    ///
    /// Returns the graph and how many modules came from the cache unchanged.
    fn collect_modules(&mut self) -> Result<(ModuleGraph, usize), ScriptError> {
        let mut graph = ModuleGraph::new();
        let mut queue = VecDeque::new();
        let mut reused = 0;

        graph.add_module(&self.entry);
        queue.push_back(self.entry.clone());

        while let Some(path) = queue.pop_front() {
            if self.load(&path)? {
                reused += 1;
            }
            let requires = self
                .cache
                .get(&path)
                .map(|module| module.requires.clone())
                .unwrap_or_default();

            for specifier in requires {
                let resolved = resolve(&specifier, &path).ok_or_else(|| ScriptError::Unresolved {
                    specifier: specifier.clone(),
                    importer: slash_path(&self.root, &path),
                })?;

                let (_, is_new) = graph.add_module(&resolved);
                // Both ends were added above, so this cannot miss
                let _ = graph.add_dependency(&path, &resolved, &specifier);
                if is_new {
                    queue.push_back(resolved);
                }
            }
        }

        self.cache.retain(|path, _| graph.contains(path));
        Ok((graph, reused))
    }

    /// Makes sure `path` is cached and current; true if the cache was reused
    fn load(&mut self, path: &Path) -> Result<bool, ScriptError> {
        let display = slash_path(&self.root, path);
        let stamp = FileStamp::of(path).ok_or_else(|| ScriptError::Read {
            path: display.clone(),
            message: "file not found".to_string(),
        })?;

        if self.cache.get(path).is_some_and(|cached| cached.stamp == stamp) {
            return Ok(true);
        }

        let original = fs::read_to_string(path).map_err(|e| ScriptError::Read {
            path: display.clone(),
            message: e.to_string(),
        })?;

        let mut code = original.clone();
        for transform in &self.transforms {
            code = transform
                .transform(&code)
                .map_err(|error| ScriptError::Transform {
                    path: display.clone(),
                    error,
                })?;
        }

        let requires = find_requires(&code).map_err(|e| ScriptError::Transform {
            path: display.clone(),
            error: TransformError::Syntax(e),
        })?;

        self.cache.insert(
            path.to_path_buf(),
            CachedModule {
                stamp,
                original,
                code,
                requires,
            },
        );
        Ok(false)
    }
}

fn join_rel(dir: &str, file_name: &str) -> String {
    if dir.is_empty() {
        file_name.to_string()
    } else {
        format!("{}/{}", dir, file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project(files: &[(&str, &str)]) -> (TempDir, Project) {
        project_with_config(files, "")
    }

    fn project_with_config(files: &[(&str, &str)], config: &str) -> (TempDir, Project) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("assetpipe.toml"), config).unwrap();
        for (rel, content) in files {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let project = Project::open(dir.path()).unwrap();
        (dir, project)
    }

    fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn bundles_imports_into_one_artifact() {
        let (dir, project) = project(&[
            ("src/js/index.js", "import { greet } from './greet';\nimport './side.js';\ngreet('x');\n"),
            ("src/js/greet.js", "export function greet(name) {\n  return name;\n}\n"),
            ("src/js/side.js", "window.side = true;\n"),
        ]);
        let mut builder = ScriptBuilder::new(&project);
        let artifact = builder.build().unwrap();

        let js_dir = dir.path().join("build/js");
        let file_name = format!("bundle.{}.js", artifact.hash);
        assert_eq!(files_in(&js_dir), vec![file_name.clone(), format!("{}.map", file_name)]);
        assert_eq!(artifact.rel_path, format!("js/{}", file_name));

        let code = fs::read_to_string(&artifact.path).unwrap();
        assert!(code.contains("__ap_defs[2]"));
        assert!(code.contains("{\"./greet\":1,\"./side.js\":2}"));
        assert!(code.ends_with(&format!("//# sourceMappingURL={}.map\n", file_name)));

        let map: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(artifact.map_path.unwrap()).unwrap()).unwrap();
        assert_eq!(map["sources"][0], "src/js/index.js");
        assert_eq!(map["sources"][1], "src/js/greet.js");
        assert_eq!(map["file"], file_name);

        let stats = builder.stats().unwrap();
        assert_eq!(stats.modules, 3);
        assert!(stats.cycles.is_empty());
    }

    #[test]
    fn hash_is_over_code_without_map_comment() {
        let (_dir, project) = project(&[("src/js/index.js", "console.log(1);\n")]);
        let artifact = ScriptBuilder::new(&project).build().unwrap();

        let code = fs::read_to_string(&artifact.path).unwrap();
        let without_comment = code.rsplit_once("//# sourceMappingURL=").unwrap().0;
        assert_eq!(
            ContentHash::of(without_comment.as_bytes(), 8).unwrap(),
            artifact.hash
        );
    }

    #[test]
    fn rebuild_replaces_previous_artifact() {
        let (dir, project) = project(&[("src/js/index.js", "console.log(1);\n")]);
        let mut builder = ScriptBuilder::new(&project);
        let first = builder.build().unwrap();

        fs::write(dir.path().join("src/js/index.js"), "console.log(22);\n").unwrap();
        let second = builder.build().unwrap();

        assert_ne!(first.hash, second.hash);
        assert!(!first.path.exists());
        assert!(!first.map_path.unwrap().exists());
        assert_eq!(files_in(&dir.path().join("build/js")).len(), 2);
    }

    #[test]
    fn unchanged_input_gives_same_artifact() {
        let (_dir, project) = project(&[("src/js/index.js", "console.log(1);\n")]);
        let mut builder = ScriptBuilder::new(&project);
        let first = builder.build().unwrap();
        let second = builder.build().unwrap();

        assert_eq!(first, second);
        assert!(second.path.exists());
        assert_eq!(builder.stats().unwrap().reused, 1);
    }

    #[test]
    fn syntax_error_keeps_previous_bundle() {
        let (dir, project) = project(&[("src/js/index.js", "console.log(1);\n")]);
        let mut builder = ScriptBuilder::new(&project);
        let good = builder.build().unwrap();

        fs::write(dir.path().join("src/js/index.js"), "console.log(\"oops);\n").unwrap();
        let err = builder.build().unwrap_err();

        assert!(err.is_recoverable());
        assert!(err.to_string().starts_with("src/js/index.js: Syntax error: Unterminated string literal"));
        assert!(good.path.exists());
    }

    #[test]
    fn unresolved_import_is_reported_with_importer() {
        let (_dir, project) = project(&[("src/js/index.js", "import x from './nope';\n")]);
        let err = ScriptBuilder::new(&project).build().unwrap_err();

        assert_eq!(err.to_string(), "src/js/index.js: cannot resolve './nope'");
    }

    #[test]
    fn missing_entry_is_recoverable() {
        let (_dir, project) = project(&[]);
        let err = ScriptBuilder::new(&project).build().unwrap_err();

        assert!(err.is_recoverable());
        assert!(matches!(err, BuildError::Script(ScriptError::MissingEntry(_))));
    }

    #[test]
    fn circular_imports_are_bundled_and_reported() {
        let (_dir, project) = project(&[
            ("src/js/index.js", "import './a.js';\n"),
            ("src/js/a.js", "import './b.js';\nexport const a = 1;\n"),
            ("src/js/b.js", "import './a.js';\nexport const b = 2;\n"),
        ]);
        let mut builder = ScriptBuilder::new(&project);
        builder.build().unwrap();

        assert_eq!(
            builder.stats().unwrap().cycles,
            vec![vec!["src/js/a.js".to_string(), "src/js/b.js".to_string()]]
        );
    }

    #[test]
    fn inline_and_disabled_source_maps() {
        let (dir, project) = project_with_config(
            &[("src/js/index.js", "console.log(1);\n")],
            "[script]\nsource_map = \"inline\"\n",
        );
        let artifact = ScriptBuilder::new(&project).build().unwrap();
        assert!(artifact.map_path.is_none());
        assert!(fs::read_to_string(&artifact.path)
            .unwrap()
            .contains("//# sourceMappingURL=data:application/json;charset=utf-8;base64,"));
        assert_eq!(files_in(&dir.path().join("build/js")).len(), 1);

        let (_dir, project) = project_with_config(
            &[("src/js/index.js", "console.log(1);\n")],
            "[script]\nsource_map = \"none\"\n",
        );
        let artifact = ScriptBuilder::new(&project).build().unwrap();
        assert!(!fs::read_to_string(&artifact.path).unwrap().contains("sourceMappingURL"));
    }

    #[test]
    fn custom_transforms_run_after_module_lowering() {
        struct Banner;
        impl ScriptTransform for Banner {
            fn name(&self) -> &'static str {
                "banner"
            }
            fn transform(&self, source: &str) -> Result<String, TransformError> {
                Ok(format!("/* checked */ {}", source))
            }
        }

        let (_dir, project) = project(&[("src/js/index.js", "console.log(1);\n")]);
        let mut builder = ScriptBuilder::new(&project).with_transform(Box::new(Banner));
        assert_eq!(builder.transform_names(), vec!["esm", "banner"]);

        let artifact = builder.build().unwrap();
        assert!(fs::read_to_string(artifact.path)
            .unwrap()
            .contains("/* checked */ console.log(1);"));
    }

    #[test]
    fn output_dir_may_be_empty() {
        let (dir, project) = project_with_config(
            &[("src/js/index.js", "console.log(1);\n")],
            "[script]\noutput_dir = \"\"\n",
        );
        let artifact = ScriptBuilder::new(&project).build().unwrap();

        assert_eq!(artifact.rel_path, format!("bundle.{}.js", artifact.hash));
        assert_eq!(artifact.path, dir.path().join("build").join(&artifact.rel_path));
    }

    #[test]
    fn cyclic_bundle_with_live_bindings_runs() {
        let (_dir, project) = project(&[
            (
                "src/js/index.js",
                "import { count, inc } from './counter.js';\nimport { a } from './a.js';\ninc();\nconsole.log(count, a);\n",
            ),
            ("src/js/counter.js", "export let count = 0;\nexport function inc() { count++; }\n"),
            ("src/js/a.js", "import { b } from './b.js';\nexport const a = 1;\nexport function getB() { return b; }\n"),
            ("src/js/b.js", "import { a } from './a.js';\nexport const b = 2;\nexport function getA() { return a; }\n"),
        ]);
        let mut builder = ScriptBuilder::new(&project);
        let artifact = builder.build().unwrap();

        let code = fs::read_to_string(&artifact.path).unwrap();
        assert!(code.contains("console.log(__imp0.count, __imp1.a);"));
        assert!(!code.contains("= __imp0.a"));
        assert_eq!(builder.stats().unwrap().cycles.len(), 1);

        // Runs the bundle when a JavaScript runtime is installed
        let Ok(run) = std::process::Command::new("node").arg(&artifact.path).output() else {
            return;
        };
        assert!(run.status.success(), "{}", String::from_utf8_lossy(&run.stderr));
        assert_eq!(String::from_utf8_lossy(&run.stdout), "1 1\n");
    }
}

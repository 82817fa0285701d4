//! Style builder
//!
//! Compiles the SCSS entry with grass, then hands the CSS to lightningcss,
//! which adds vendor prefixes for the configured browserslist targets,
//! minifies, and prints the stylesheet together with its source map.

use std::fs;
use std::path::{Path, PathBuf};

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use thiserror::Error;

use super::{slash_path, Artifact, ArtifactKind, BuildError};
use crate::domain::{CommentStyle, ContentHash, SourceMap};
use crate::storage::{Project, SourceMapMode};

#[derive(Debug, Error)]
pub enum StyleError {
    #[error("Style entry not found: {0}")]
    MissingEntry(PathBuf),

    #[error("{path}: {message}")]
    Compile { path: String, message: String },

    #[error("Invalid browserslist query: {0}")]
    Targets(String),

    #[error("{path}: {message}")]
    Process { path: String, message: String },

    #[error("Failed to generate style source map: {0}")]
    SourceMap(String),

    #[error("Failed to hash stylesheet: {0}")]
    Hash(String),
}

/// Long-lived stylesheet builder
pub struct StyleBuilder {
    root: PathBuf,
    entry: PathBuf,
    out_dir: PathBuf,
    out_rel: String,
    name: String,
    source_map: SourceMapMode,
    minify: bool,
    browserslist: Vec<String>,
    hash_length: usize,
    previous: Option<Artifact>,
}

impl StyleBuilder {
    pub fn new(project: &Project) -> Self {
        let config = &project.config().project;
        let out_rel = config.style.output_dir.trim_matches('/').to_string();

        Self {
            root: project.root().to_path_buf(),
            entry: project.style_entry(),
            out_dir: project.out_dir().join(&out_rel),
            out_rel,
            name: config.style.name.clone(),
            source_map: config.style.source_map,
            minify: config.style.minify,
            browserslist: config.style.browserslist.clone(),
            hash_length: config.hash_length,
            previous: None,
        }
    }

    /// Forgets the last artifact (its file was deleted with the output)
    pub fn forget_output(&mut self) {
        self.previous = None;
    }

    /// Compiles the entry and writes the artifact
    ///
    /// On failure nothing in the output directory is touched.
    pub fn build(&mut self) -> Result<Artifact, BuildError> {
        if !self.entry.is_file() {
            return Err(StyleError::MissingEntry(self.entry.clone()).into());
        }

        let compiled = self.compile()?;
        let (code, map) = self.process(&compiled)?;

        let hash = ContentHash::of(code.as_bytes(), self.hash_length)
            .map_err(|e| StyleError::Hash(e.to_string()))?;
        let file_name = hash.stamp(&self.name, ".css");
        let path = self.out_dir.join(&file_name);
        let map_name = format!("{}.map", file_name);

        let mut contents = code;
        let mut map_path = None;
        if let Some(mut map) = map {
            map.file = Some(file_name.clone());
            let map_error = |e: serde_json::Error| StyleError::SourceMap(e.to_string());
            let comment = match self.source_map {
                SourceMapMode::Inline => {
                    map.inline_comment(CommentStyle::Style).map_err(map_error)?
                }
                _ => {
                    let json = map.to_json().map_err(map_error)?;
                    map_path = Some((self.out_dir.join(&map_name), json));
                    CommentStyle::Style.url_comment(&map_name)
                }
            };
            contents = format!("{}\n{}\n", contents, comment);
        }

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
            kind: ArtifactKind::Style,
            path,
            rel_path: if self.out_rel.is_empty() {
                file_name
            } else {
                format!("{}/{}", self.out_rel, file_name)
            },
            map_path: map_path.map(|(path, _)| path),
            hash,
        };

        if let Some(previous) = self.previous.take() {
            if previous.path != artifact.path {
                previous.remove()?;
            }
        }
        self.previous = Some(artifact.clone());

        Ok(artifact)
    }

    /// SCSS to plain CSS
    fn compile(&self) -> Result<String, StyleError> {
        let load_path = self.entry.parent().unwrap_or(Path::new("."));
        let options = grass::Options::default()
            .load_path(load_path)
            .style(grass::OutputStyle::Expanded);

        grass::from_path(&self.entry, &options).map_err(|e| StyleError::Compile {
            path: slash_path(&self.root, &self.entry),
            message: e.to_string(),
        })
    }

    /// Prefixes and prints `css`; the map is `None` when maps are disabled
    fn process(&self, css: &str) -> Result<(String, Option<SourceMap>), StyleError> {
        let display = slash_path(&self.root, &self.entry);
        let filename = self.entry.to_string_lossy().into_owned();

        let browsers = Browsers::from_browserslist(self.browserslist.iter().map(String::as_str))
            .map_err(|e| StyleError::Targets(e.to_string()))?;

        let mut sheet = StyleSheet::parse(
            css,
            ParserOptions {
                filename: filename.clone(),
                ..ParserOptions::default()
            },
        )
        .map_err(|e| StyleError::Process {
            path: display.clone(),
            message: e.to_string(),
        })?;

        sheet
            .minify(MinifyOptions {
                targets: Targets {
                    browsers,
                    ..Targets::default()
                },
                ..MinifyOptions::default()
            })
            .map_err(|e| StyleError::Process {
                path: display.clone(),
                message: e.to_string(),
            })?;

        let mut css_map = match self.source_map {
            SourceMapMode::None => None,
            SourceMapMode::External | SourceMapMode::Inline => {
                let mut map = parcel_sourcemap::SourceMap::new(&self.root.to_string_lossy());
                let source = map.add_source(&filename);
                map.set_source_content(source as usize, css)
                    .map_err(|e| StyleError::SourceMap(e.to_string()))?;
                Some(map)
            }
        };

        let printed = sheet
            .to_css(PrinterOptions {
                minify: self.minify,
                source_map: css_map.as_mut(),
                targets: Targets {
                    browsers,
                    ..Targets::default()
                },
                ..PrinterOptions::default()
            })
            .map_err(|e| StyleError::Process {
                path: display.clone(),
                message: e.to_string(),
            })?;

        let map = match css_map {
            Some(mut map) => Some(
                SourceMap::from_parcel(&mut map)
                    .map_err(|e| StyleError::SourceMap(e.to_string()))?,
            ),
            None => None,
        };

        Ok((printed.code, map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const STYLE: &str = "$accent: #3355ff;\n\nbody {\n  margin: 0;\n\n  h1 {\n    color: $accent;\n    user-select: none;\n  }\n}\n";

    fn project(style: &str, config: &str) -> (TempDir, Project) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("assetpipe.toml"), config).unwrap();
        fs::create_dir_all(dir.path().join("src/scss")).unwrap();
        fs::write(dir.path().join("src/scss/main.scss"), style).unwrap();
        let project = Project::open(dir.path()).unwrap();
        (dir, project)
    }

    fn code_of(artifact: &Artifact) -> String {
        let contents = fs::read_to_string(&artifact.path).unwrap();
        match contents.split_once("\n/*# sourceMappingURL=") {
            Some((code, _)) => code.to_string(),
            None => contents,
        }
    }

    #[test]
    fn compiles_prefixes_and_minifies() {
        let (dir, project) = project(STYLE, "[style]\nbrowserslist = [\"safari 13\"]\n");
        let artifact = StyleBuilder::new(&project).build().unwrap();

        let code = code_of(&artifact);
        assert!(code.contains("body h1{"));
        assert!(code.contains("-webkit-user-select:none"));
        assert!(!code.contains('\n'));
        assert!(!code.contains("/*"));
        assert!(!code.contains("$accent"));

        let file_name = format!("style.{}.css", artifact.hash);
        assert_eq!(artifact.rel_path, format!("css/{}", file_name));
        assert_eq!(artifact.path, dir.path().join("build/css").join(&file_name));
        assert_eq!(ContentHash::of(code.as_bytes(), 8).unwrap(), artifact.hash);
    }

    #[test]
    fn writes_external_source_map() {
        let (_dir, project) = project(STYLE, "");
        let artifact = StyleBuilder::new(&project).build().unwrap();

        let contents = fs::read_to_string(&artifact.path).unwrap();
        let file_name = format!("style.{}.css", artifact.hash);
        assert!(contents.ends_with(&format!("/*# sourceMappingURL={}.map */\n", file_name)));

        let map: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(artifact.map_path.unwrap()).unwrap()).unwrap();
        assert_eq!(map["version"], 3);
        assert_eq!(map["file"], file_name);
        assert!(map["sources"][0].as_str().unwrap().ends_with("main.scss"));
        assert!(!map["mappings"].as_str().unwrap().is_empty());
    }

    #[test]
    fn unminified_output_keeps_whitespace() {
        let (_dir, project) = project(STYLE, "[style]\nminify = false\nsource_map = \"none\"\n");
        let artifact = StyleBuilder::new(&project).build().unwrap();

        assert!(artifact.map_path.is_none());
        let contents = fs::read_to_string(&artifact.path).unwrap();
        assert!(contents.contains('\n'));
        assert!(!contents.contains("sourceMappingURL"));
    }

    #[test]
    fn compile_error_keeps_previous_stylesheet() {
        let (dir, project) = project(STYLE, "");
        let mut builder = StyleBuilder::new(&project);
        let good = builder.build().unwrap();

        fs::write(dir.path().join("src/scss/main.scss"), "body { color: $missing; }\n").unwrap();
        let err = builder.build().unwrap_err();

        assert!(err.is_recoverable());
        assert!(err.to_string().starts_with("src/scss/main.scss: "));
        assert!(good.path.exists());
    }

    #[test]
    fn rebuild_removes_previous_stylesheet() {
        let (dir, project) = project(STYLE, "");
        let mut builder = StyleBuilder::new(&project);
        let first = builder.build().unwrap();

        fs::write(dir.path().join("src/scss/main.scss"), "p { margin: 1px; }\n").unwrap();
        let second = builder.build().unwrap();

        assert_ne!(first.path, second.path);
        assert!(!first.path.exists());
        assert!(second.path.exists());
    }

    #[test]
    fn bad_browserslist_is_reported() {
        let (_dir, project) = project(STYLE, "[style]\nbrowserslist = [\"not a real query\"]\n");
        let err = StyleBuilder::new(&project).build().unwrap_err();

        assert!(matches!(err, BuildError::Style(StyleError::Targets(_))));
    }
}

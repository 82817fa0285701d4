//! Module specifier resolution
//!
//! Relative specifiers (`./`, `../`, `/`) resolve against the importing
//! file. Bare specifiers are looked up in `node_modules` directories from
//! the importer's directory upwards.
//!
//! A path candidate is tried as a file (exact, then with `.js`, `.mjs`,
//! `.cjs` appended), then as a directory (`package.json` entry fields, then
//! `index.js`).

use std::fs;
use std::path::{Path, PathBuf};

use crate::pipeline::normalize;

const EXTENSIONS: &[&str] = &["js", "mjs", "cjs"];

/// `package.json` fields consulted for a package's entry, in order
const ENTRY_FIELDS: &[&str] = &["browser", "module", "main"];

/// Resolves `specifier` as imported from the file `importer`
pub fn resolve(specifier: &str, importer: &Path) -> Option<PathBuf> {
    let base_dir = importer.parent().unwrap_or(Path::new(""));

    if is_path_specifier(specifier) {
        let candidate = normalize(&base_dir.join(specifier));
        return load_as_file(&candidate).or_else(|| load_as_directory(&candidate));
    }

    resolve_package(specifier, base_dir)
}

fn is_path_specifier(specifier: &str) -> bool {
    specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier.starts_with('/')
        || specifier == "."
        || specifier == ".."
}

fn resolve_package(specifier: &str, from_dir: &Path) -> Option<PathBuf> {
    if specifier.is_empty() {
        return None;
    }

    for dir in from_dir.ancestors() {
        if dir.file_name().is_some_and(|name| name == "node_modules") {
            continue;
        }
        let candidate = normalize(&dir.join("node_modules").join(specifier));
        if let Some(found) = load_as_file(&candidate).or_else(|| load_as_directory(&candidate)) {
            return Some(found);
        }
    }

    None
}

fn load_as_file(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }

    let file_name = path.file_name()?.to_string_lossy().into_owned();
    EXTENSIONS
        .iter()
        .map(|ext| path.with_file_name(format!("{}.{}", file_name, ext)))
        .find(|candidate| candidate.is_file())
}

fn load_as_directory(dir: &Path) -> Option<PathBuf> {
    if !dir.is_dir() {
        return None;
    }

    if let Some(entry) = package_entry(dir) {
        let candidate = normalize(&dir.join(entry));
        let found = load_as_file(&candidate).or_else(|| index_of(&candidate));
        if found.is_some() {
            return found;
        }
    }

    index_of(dir)
}

fn index_of(dir: &Path) -> Option<PathBuf> {
    let index = dir.join("index.js");
    index.is_file().then_some(index)
}

/// Entry path declared by `dir/package.json`, if any
fn package_entry(dir: &Path) -> Option<String> {
    let content = fs::read_to_string(dir.join("package.json")).ok()?;
    let manifest: serde_json::Value = serde_json::from_str(&content).ok()?;

    ENTRY_FIELDS.iter().find_map(|field| {
        manifest
            .get(*field)
            .and_then(|value| value.as_str())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str, content: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn relative_specifiers() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let entry = touch(root, "src/index.js", "");
        let exact = touch(root, "src/exact.js", "");
        let mjs = touch(root, "src/lib/esm.mjs", "");
        let index = touch(root, "src/widgets/index.js", "");
        let parent = touch(root, "shared.js", "");

        assert_eq!(resolve("./exact.js", &entry), Some(exact.clone()));
        assert_eq!(resolve("./exact", &entry), Some(exact));
        assert_eq!(resolve("./lib/esm", &entry), Some(mjs));
        assert_eq!(resolve("./widgets", &entry), Some(index));
        assert_eq!(resolve("../shared", &entry), Some(parent));
        assert_eq!(resolve("./missing", &entry), None);
    }

    #[test]
    fn js_extension_wins_over_others() {
        let dir = TempDir::new().unwrap();
        let entry = touch(dir.path(), "index.js", "");
        let js = touch(dir.path(), "util.js", "");
        touch(dir.path(), "util.cjs", "");

        assert_eq!(resolve("./util", &entry), Some(js));
    }

    #[test]
    fn bare_specifiers_walk_up_node_modules() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let entry = touch(root, "src/js/index.js", "");

        touch(root, "node_modules/plain/index.js", "");
        touch(root, "node_modules/fields/package.json", r#"{"main": "lib/main.js", "module": "esm/entry"}"#);
        let module_entry = touch(root, "node_modules/fields/esm/entry.js", "");
        touch(root, "node_modules/fields/lib/main.js", "");
        let browser = touch(root, "node_modules/@scope/pkg/browser.js", "");
        touch(root, "node_modules/@scope/pkg/package.json", r#"{"browser": "./browser.js", "main": "node.js"}"#);
        let sub = touch(root, "node_modules/plain/sub/file.js", "");

        assert_eq!(resolve("plain", &entry), Some(root.join("node_modules/plain/index.js")));
        assert_eq!(resolve("fields", &entry), Some(module_entry));
        assert_eq!(resolve("@scope/pkg", &entry), Some(browser));
        assert_eq!(resolve("plain/sub/file", &entry), Some(sub));
        assert_eq!(resolve("nope", &entry), None);
    }

    #[test]
    fn browser_object_form_is_ignored() {
        let dir = TempDir::new().unwrap();
        let entry = touch(dir.path(), "index.js", "");
        touch(dir.path(), "node_modules/pkg/package.json", r#"{"browser": {"fs": false}, "main": "main.js"}"#);
        let main = touch(dir.path(), "node_modules/pkg/main.js", "");

        assert_eq!(resolve("pkg", &entry), Some(main));
    }
}

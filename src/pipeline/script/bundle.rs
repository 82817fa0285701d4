//! Bundle emission
//!
//! A bundle is one IIFE holding a module registry. Each module body is
//! wrapped in `function (require, module, exports)` and registered with its
//! `specifier -> id` table; module 0 is loaded last.
//!
//! Module bodies are emitted line for line, so every body line maps back to
//! the same line of its source.

use std::collections::BTreeMap;

use parcel_sourcemap::OriginalLocation;

use super::ScriptError;
use crate::domain::SourceMap;

const PRELUDE: &str = r#"(function () {
var __ap_defs = {};
var __ap_cache = {};
function __ap_load(id) {
  var cached = __ap_cache[id];
  if (cached) return cached.exports;
  var def = __ap_defs[id];
  var module = { exports: {} };
  __ap_cache[id] = module;
  def[0].call(module.exports, function (specifier) {
    var dep = def[1][specifier];
    if (dep === undefined) throw new Error("Cannot find module '" + specifier + "'");
    return __ap_load(dep);
  }, module, module.exports);
  return module.exports;
}
function __ap_default(m) {
  return m && m.__esModule ? m["default"] : m;
}
function __ap_ns(m) {
  if (m && m.__esModule) return m;
  var ns = { "default": m };
  if (m && typeof m === "object") {
    Object.keys(m).forEach(function (k) { if (k !== "default") ns[k] = m[k]; });
  }
  return ns;
}
function __ap_star(m, exports) {
  Object.keys(m).forEach(function (k) {
    if (k === "default" || Object.prototype.hasOwnProperty.call(exports, k)) return;
    Object.defineProperty(exports, k, { enumerable: true, get: function () { return m[k]; } });
  });
}
"#;

const EPILOGUE: &str = "__ap_load(0);\n})();\n";

/// One module ready for emission
pub struct EmitModule<'a> {
    pub id: usize,
    /// Source path as recorded in the source map
    pub source_name: String,
    /// Original source, embedded as `sourcesContent`
    pub original: &'a str,
    /// Transformed body
    pub code: &'a str,
    /// `specifier -> module id`
    pub dependencies: Vec<(String, usize)>,
}

/// Emits the bundle code and its line map; `file` names the bundle in the map
pub fn emit(modules: &[EmitModule<'_>], file: &str) -> Result<(String, SourceMap), ScriptError> {
    let mut out = Emitter {
        code: String::new(),
        map: parcel_sourcemap::SourceMap::new("/"),
        line: 0,
    };

    out.push_unmapped(PRELUDE);

    for module in modules {
        let source = out.map.add_source(&module.source_name);
        out.map
            .set_source_content(source as usize, module.original)
            .map_err(|e| ScriptError::SourceMap(e.to_string()))?;

        out.push_unmapped(&format!(
            "__ap_defs[{}] = [function (require, module, exports) {{\n",
            module.id
        ));

        for (line_no, line) in module.code.lines().enumerate() {
            out.map.add_mapping(
                out.line,
                0,
                Some(OriginalLocation::new(line_no as u32, 0, source, None)),
            );
            out.push_line(line);
        }

        let table: BTreeMap<&str, usize> = module
            .dependencies
            .iter()
            .map(|(specifier, id)| (specifier.as_str(), *id))
            .collect();
        let table =
            serde_json::to_string(&table).map_err(|e| ScriptError::Emit(e.to_string()))?;
        out.push_unmapped(&format!("}}, {}];\n", table));
    }

    out.push_unmapped(EPILOGUE);

    let mut map = SourceMap::from_parcel(&mut out.map)
        .map_err(|e| ScriptError::SourceMap(e.to_string()))?;
    map.file = Some(file.to_string());
    Ok((out.code, map))
}

struct Emitter {
    code: String,
    map: parcel_sourcemap::SourceMap,
    /// Next generated line, 0-based
    line: u32,
}

impl Emitter {
    fn push_line(&mut self, line: &str) {
        self.code.push_str(line);
        self.code.push('\n');
        self.line += 1;
    }

    fn push_unmapped(&mut self, block: &str) {
        for line in block.lines() {
            self.push_line(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module<'a>(id: usize, name: &str, code: &'a str, deps: &[(&str, usize)]) -> EmitModule<'a> {
        EmitModule {
            id,
            source_name: name.to_string(),
            original: code,
            code,
            dependencies: deps.iter().map(|(s, id)| (s.to_string(), *id)).collect(),
        }
    }

    #[test]
    fn wraps_each_module_and_loads_the_entry() {
        let modules = [
            module(0, "src/index.js", "var a = require(\"./a\");\na();", &[("./a", 1)]),
            module(1, "src/a.js", "module.exports = function () {};", &[]),
        ];
        let (code, map) = emit(&modules, "bundle.js").unwrap();

        assert!(code.starts_with("(function () {\n"));
        assert!(code.contains("__ap_defs[0] = [function (require, module, exports) {\nvar a = require(\"./a\");\na();\n}, {\"./a\":1}];\n"));
        assert!(code.contains("__ap_defs[1] = [function (require, module, exports) {\nmodule.exports = function () {};\n}, {}];\n"));
        assert!(code.ends_with("__ap_load(0);\n})();\n"));

        assert_eq!(map.sources, vec!["src/index.js", "src/a.js"]);
        assert_eq!(map.file.as_deref(), Some("bundle.js"));
    }

    #[test]
    fn body_lines_map_to_original_lines() {
        let modules = [module(0, "src/index.js", "one();\ntwo();\nthree();\n", &[])];
        let (code, map) = emit(&modules, "bundle.js").unwrap();

        let lines: Vec<&str> = code.lines().collect();
        let body_start = lines
            .iter()
            .position(|l| l.starts_with("__ap_defs[0]"))
            .unwrap()
            + 1;
        assert_eq!(lines[body_start], "one();");

        // Lines after the last mapped one carry no segment at all
        let segments: Vec<&str> = map.mappings.split(';').collect();
        assert_eq!(segments.len(), body_start + 3);
        assert!(segments[..body_start].iter().all(|s| s.is_empty()));
        assert_eq!(segments[body_start], "AAAA");
        assert_eq!(segments[body_start + 1], "AACA");
        assert_eq!(segments[body_start + 2], "AACA");
        assert_eq!(map.sources_content[0].as_deref(), Some("one();\ntwo();\nthree();\n"));
    }
}

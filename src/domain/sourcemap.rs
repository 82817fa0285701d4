//! Source Map v3 documents
//!
//! Both builders record mappings in a `parcel_sourcemap::SourceMap` and
//! convert it here into the serialized document, so the script and style
//! maps share one encoding and one JSON shape.

use base64::Engine;
use parcel_sourcemap::SourceMapError;
use serde::{Deserialize, Serialize};

/// Serialized form of a v3 source map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub sources: Vec<String>,
    #[serde(default)]
    pub sources_content: Vec<Option<String>>,
    #[serde(default)]
    pub names: Vec<String>,
    pub mappings: String,
}

impl SourceMap {
    /// Encodes the mappings of `map` and copies its sources and names
    pub fn from_parcel(map: &mut parcel_sourcemap::SourceMap) -> Result<Self, SourceMapError> {
        let mut mappings = Vec::new();
        map.write_vlq(&mut mappings)?;

        Ok(SourceMap {
            version: 3,
            file: None,
            sources: map.get_sources().clone(),
            sources_content: map
                .get_sources_content()
                .iter()
                .map(|content| Some(content.clone()))
                .collect(),
            names: map.get_names().clone(),
            mappings: String::from_utf8(mappings)?,
        })
    }

    /// Serializes the map as compact JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Returns the trailing comment for an inline map
    pub fn inline_comment(&self, style: CommentStyle) -> Result<String, serde_json::Error> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(self.to_json()?);
        Ok(style.wrap(&format!(
            "sourceMappingURL=data:application/json;charset=utf-8;base64,{}",
            encoded
        )))
    }
}

/// Comment syntax of the file a map is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentStyle {
    /// `//# ...`
    Script,
    /// `/*# ... */`
    Style,
}

impl CommentStyle {
    fn wrap(self, body: &str) -> String {
        match self {
            CommentStyle::Script => format!("//# {}", body),
            CommentStyle::Style => format!("/*# {} */", body),
        }
    }

    /// Comment pointing at an external map file
    pub fn url_comment(self, map_file_name: &str) -> String {
        self.wrap(&format!("sourceMappingURL={}", map_file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parcel_sourcemap::OriginalLocation;

    fn line_map() -> parcel_sourcemap::SourceMap {
        let mut map = parcel_sourcemap::SourceMap::new("/");
        let a = map.add_source("src/a.js");
        map.set_source_content(a as usize, "a\nb\n").unwrap();
        let b = map.add_source("src/b.js");

        map.add_mapping(1, 0, Some(OriginalLocation::new(0, 0, a, None)));
        map.add_mapping(2, 0, Some(OriginalLocation::new(1, 0, a, None)));
        map.add_mapping(4, 0, Some(OriginalLocation::new(0, 0, b, None)));
        map
    }

    #[test]
    fn converts_line_mappings() {
        let map = SourceMap::from_parcel(&mut line_map()).unwrap();

        assert_eq!(map.version, 3);
        assert_eq!(map.sources, vec!["src/a.js", "src/b.js"]);
        assert_eq!(map.mappings, ";AAAA;AACA;;ACDA");
        assert_eq!(map.sources_content[0].as_deref(), Some("a\nb\n"));
    }

    #[test]
    fn json_uses_camel_case() {
        let mut map = SourceMap::from_parcel(&mut line_map()).unwrap();
        map.file = Some("bundle.js".to_string());
        let json = map.to_json().unwrap();

        assert!(json.contains("\"sourcesContent\":[\"a\\nb\\n\""));
        assert!(json.contains("\"version\":3"));
        assert!(json.contains("\"file\":\"bundle.js\""));

        let parsed: SourceMap = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, map);
    }

    #[test]
    fn comments() {
        assert_eq!(
            CommentStyle::Script.url_comment("bundle.abc.js.map"),
            "//# sourceMappingURL=bundle.abc.js.map"
        );
        assert_eq!(
            CommentStyle::Style.url_comment("style.abc.css.map"),
            "/*# sourceMappingURL=style.abc.css.map */"
        );

        let map = SourceMap::from_parcel(&mut parcel_sourcemap::SourceMap::new("/")).unwrap();
        let inline = map.inline_comment(CommentStyle::Script).unwrap();
        assert!(inline.starts_with("//# sourceMappingURL=data:application/json;charset=utf-8;base64,"));
    }
}

//! Asset reference injection into markup
//!
//! Pages carry marker blocks that are rewritten on every injection:
//!
//! ```html
//! <!-- inject:css -->
//! <link rel="stylesheet" href="css/style.1a2b3c4d.css">
//! <!-- endinject -->
//! ```
//!
//! Everything between a start marker and the next `<!-- endinject -->` is
//! replaced, so injecting the same references twice yields the same bytes.
//! A page without a block gets one before `</head>` (styles) or `</body>`
//! (scripts), or at the end of the document.

use regex::Regex;
use std::path::{Component, Path};
use std::sync::LazyLock;

static START_CSS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!--\s*inject:css\s*-->").expect("valid regex"));
static START_JS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!--\s*inject:js\s*-->").expect("valid regex"));
static END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!--\s*endinject\s*-->").expect("valid regex"));
static HEAD_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</head\s*>").expect("valid regex"));
static BODY_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</body\s*>").expect("valid regex"));

/// Kind of reference tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Css,
    Js,
}

impl TagKind {
    fn start_marker(self) -> &'static Regex {
        match self {
            TagKind::Css => &START_CSS,
            TagKind::Js => &START_JS,
        }
    }

    fn anchor(self) -> &'static Regex {
        match self {
            TagKind::Css => &HEAD_CLOSE,
            TagKind::Js => &BODY_CLOSE,
        }
    }

    fn marker_name(self) -> &'static str {
        match self {
            TagKind::Css => "css",
            TagKind::Js => "js",
        }
    }

    /// Renders the reference tag for `href`
    pub fn tag(self, href: &str) -> String {
        let href = escape_attribute(href);
        match self {
            TagKind::Css => format!("<link rel=\"stylesheet\" href=\"{}\">", href),
            TagKind::Js => format!("<script src=\"{}\"></script>", href),
        }
    }
}

/// Rewrites the `kind` block of `markup` to reference `hrefs`
pub fn inject(markup: &str, kind: TagKind, hrefs: &[String]) -> String {
    if let Some(start) = kind.start_marker().find(markup) {
        if let Some(end) = END.find_at(markup, start.end()) {
            let indent = line_indent(markup, start.start());
            let mut out = String::with_capacity(markup.len() + 128);
            out.push_str(&markup[..start.end()]);
            out.push_str(&block_body(kind, hrefs, indent));
            out.push_str(&markup[end.start()..]);
            return out;
        }
    }

    let (position, indent) = match kind.anchor().find(markup) {
        Some(anchor) => (anchor.start(), line_indent(markup, anchor.start())),
        None => (markup.len(), ""),
    };

    let mut block = format!("<!-- inject:{} -->", kind.marker_name());
    block.push_str(&block_body(kind, hrefs, indent));
    block.push_str("<!-- endinject -->\n");
    if position < markup.len() {
        block.push_str(indent);
    }

    let mut out = String::with_capacity(markup.len() + block.len());
    out.push_str(&markup[..position]);
    if position == markup.len() && !markup.is_empty() && !markup.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&block);
    out.push_str(&markup[position..]);
    out
}

/// Injects style and script references in one pass
pub fn inject_all(markup: &str, styles: &[String], scripts: &[String]) -> String {
    let with_styles = inject(markup, TagKind::Css, styles);
    inject(&with_styles, TagKind::Js, scripts)
}

fn block_body(kind: TagKind, hrefs: &[String], indent: &str) -> String {
    let mut body = String::new();
    for href in hrefs {
        body.push('\n');
        body.push_str(indent);
        body.push_str(&kind.tag(href));
    }
    body.push('\n');
    body.push_str(indent);
    body
}

/// Leading whitespace of the line containing `position`, if the line is
/// whitespace up to that point
fn line_indent(markup: &str, position: usize) -> &str {
    let line_start = markup[..position].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let prefix = &markup[line_start..position];
    if prefix.chars().all(|c| c == ' ' || c == '\t') {
        prefix
    } else {
        ""
    }
}

fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}

/// Path of an output-relative asset as seen from a page at `page_rel`
///
/// Both paths are relative to the output directory.
pub fn relative_href(page_rel: &Path, asset_rel: &str) -> String {
    let depth = page_rel
        .parent()
        .map(|parent| {
            parent
                .components()
                .filter(|c| matches!(c, Component::Normal(_)))
                .count()
        })
        .unwrap_or(0);
    let mut href = "../".repeat(depth);
    href.push_str(asset_rel);
    href
}

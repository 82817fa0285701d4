//! Source-to-source script transforms
//!
//! A transform takes module source and returns module source. Transforms
//! must keep the line count intact: the bundle's source map assumes line
//! `n` of the output came from line `n` of the input.
//!
//! [`EsModuleTransform`] lowers ES module syntax into the bundle registry's
//! `require` / `module` / `exports` calling convention:
//!
//! | Source | Output |
//! |--------|--------|
//! | `import "x"` | `require("x");` |
//! | `import d, { a, b as c } from "x"` | `var __imp0 = require("x");`, then `d`, `a`, `c` read `__ap_default(__imp0)`, `__imp0.a`, `__imp0.b` |
//! | `import * as ns from "x"` | `var __imp0 = require("x"), ns = __ap_ns(__imp0);` |
//! | `export const a = 1` | `const a = 1` plus a getter for `a` |
//! | `export default expr` | `exports.default = expr` |
//! | `export { a as b } from "x"` | `var __re0 = require("x");` plus a getter for `b` |
//! | `export * from "x"` | `__ap_star(require("x"), exports);` |
//!
//! Exports become getters defined at the top of the module, so exported
//! bindings stay live. Imported bindings are never copied: each reference
//! is rewritten to read through the module object, which keeps import
//! cycles and later reassignments in the exporting module visible. Calls go
//! through `(0, __imp0.f)(...)` so `this` stays unbound.
//!
//! The rewrite does not track scopes. An imported name that the module also
//! declares anywhere (variable, function, class, parameter) is bound once
//! with `var` at the import instead.

use std::collections::HashSet;

use thiserror::Error;

use super::lexer::{string_value, tokenize, SyntaxError, Token, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("Syntax error: {0}")]
    Syntax(#[from] SyntaxError),

    #[error("Unsupported syntax: {message} ({line}:{column})")]
    Unsupported {
        message: String,
        line: u32,
        column: u32,
    },
}

/// A source-to-source rewrite applied to every module before bundling
pub trait ScriptTransform: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    fn transform(&self, source: &str) -> Result<String, TransformError>;
}

/// Lowers `import` / `export` syntax to the registry calling convention
#[derive(Debug, Default, Clone, Copy)]
pub struct EsModuleTransform;

impl ScriptTransform for EsModuleTransform {
    fn name(&self) -> &'static str {
        "esm"
    }

    fn transform(&self, source: &str) -> Result<String, TransformError> {
        let tokens = tokenize(source)?;
        let mut rewriter = Rewriter::new(source, &tokens);
        rewriter.run()?;
        Ok(rewriter.finish())
    }
}

/// Collects the literal specifiers of `require("...")` calls, in first-use order
pub fn find_requires(source: &str) -> Result<Vec<String>, SyntaxError> {
    let tokens = tokenize(source)?;
    let mut specifiers: Vec<String> = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        if !token.is_word(source, "require") {
            continue;
        }
        if i > 0 && tokens[i - 1].is_punct(source, '.') {
            continue;
        }
        let call = (tokens.get(i + 1), tokens.get(i + 2), tokens.get(i + 3));
        if let (Some(open), Some(arg), Some(close)) = call {
            if open.is_punct(source, '(')
                && arg.kind == TokenKind::Str
                && close.is_punct(source, ')')
            {
                let specifier = string_value(arg.text(source));
                if !specifiers.contains(&specifier) {
                    specifiers.push(specifier);
                }
            }
        }
    }

    Ok(specifiers)
}

/// Punctuators that, ending a line, mean the expression continues
const CONTINUES_AFTER: &[char] = &[
    ',', '=', '+', '-', '*', '/', '%', '?', ':', '|', '&', '^', '!', '~', '<', '>', '.',
];

/// Punctuators that, starting a line, continue the previous expression
const CONTINUES_BEFORE: &[char] = &[
    ',', '.', '?', ':', '=', '+', '-', '*', '/', '%', '|', '&', '^', '<', '>',
];

struct Edit {
    start: usize,
    end: usize,
    text: String,
}

struct Rewriter<'a> {
    source: &'a str,
    tokens: &'a [Token],
    edits: Vec<Edit>,
    /// `(exported name, local expression)`
    exports: Vec<(String, String)>,
    /// `(local name, expression reading the binding)`
    imports: Vec<(String, String)>,
    /// Names declared somewhere in the module
    declared: HashSet<&'a str>,
    temp_counter: usize,
    is_module: bool,
}

impl<'a> Rewriter<'a> {
    fn new(source: &'a str, tokens: &'a [Token]) -> Self {
        Self {
            source,
            tokens,
            edits: Vec::new(),
            exports: Vec::new(),
            imports: Vec::new(),
            declared: HashSet::new(),
            temp_counter: 0,
            is_module: false,
        }
    }

    fn tok(&self, i: usize) -> Option<&'a Token> {
        self.tokens.get(i)
    }

    fn text(&self, i: usize) -> &'a str {
        self.tokens.get(i).map(|t| t.text(self.source)).unwrap_or("")
    }

    fn is_punct(&self, i: usize, c: char) -> bool {
        self.tok(i).is_some_and(|t| t.is_punct(self.source, c))
    }

    fn is_word(&self, i: usize, word: &str) -> bool {
        self.tok(i).is_some_and(|t| t.is_word(self.source, word))
    }

    fn unsupported(&self, i: usize, message: &str) -> TransformError {
        let token = self.tok(i).or_else(|| self.tokens.last());
        TransformError::Unsupported {
            message: message.to_string(),
            line: token.map(|t| t.line).unwrap_or(1),
            column: token.map(|t| t.column).unwrap_or(1),
        }
    }

    fn expect_string(&self, i: usize, what: &str) -> Result<String, TransformError> {
        match self.tok(i) {
            Some(t) if t.kind == TokenKind::Str => Ok(string_value(t.text(self.source))),
            _ => Err(self.unsupported(i, &format!("expected {}", what))),
        }
    }

    fn expect_word(&self, i: usize, word: &str) -> Result<(), TransformError> {
        if self.is_word(i, word) {
            Ok(())
        } else {
            Err(self.unsupported(i, &format!("expected '{}'", word)))
        }
    }

    /// Reads an import/export name, which may be an identifier or a string
    fn binding_name(&self, i: usize) -> Result<String, TransformError> {
        match self.tok(i) {
            Some(t) if t.kind == TokenKind::Ident => Ok(t.text(self.source).to_string()),
            Some(t) if t.kind == TokenKind::Str => Ok(string_value(t.text(self.source))),
            _ => Err(self.unsupported(i, "expected a binding name")),
        }
    }

    fn next_temp(&mut self, prefix: &str) -> String {
        let name = format!("__{}{}", prefix, self.temp_counter);
        self.temp_counter += 1;
        name
    }

    fn at_statement_start(&self, i: usize) -> bool {
        if i == 0 {
            return true;
        }
        let prev = &self.tokens[i - 1];
        if prev.is_punct(self.source, '.') {
            return false;
        }
        prev.is_punct(self.source, ';')
            || prev.is_punct(self.source, '}')
            || self.tokens[i].newline_before
    }

    /// Replaces tokens `first..=last`, keeping the number of line breaks
    fn replace(&mut self, first: usize, last: usize, text: String) {
        let start = self.tokens[first].start;
        let end = self.tokens[last].end;
        self.replace_span(start, end, text);
    }

    fn replace_span(&mut self, start: usize, end: usize, mut text: String) {
        let removed = self.source[start..end].matches('\n').count();
        for _ in 0..removed {
            text.push('\n');
        }
        self.edits.push(Edit { start, end, text });
    }

    /// Includes a trailing `;` in the statement, if present
    fn statement_end(&self, last: usize) -> usize {
        if self.is_punct(last + 1, ';') {
            last + 1
        } else {
            last
        }
    }

    fn run(&mut self) -> Result<(), TransformError> {
        let tokens = self.tokens;
        self.declared = Scan::new(self.source, tokens).declared_names();
        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            if token.depth != 0 || token.kind != TokenKind::Ident || !self.at_statement_start(i) {
                i += 1;
                continue;
            }

            i = match token.text(self.source) {
                "import" if self.is_punct(i + 1, '(') || self.is_punct(i + 1, '.') => i + 1,
                "import" => self.import_statement(i)?,
                "export" => self.export_statement(i)?,
                _ => i + 1,
            };
        }
        self.rewrite_imported_uses();
        Ok(())
    }

    fn import_statement(&mut self, i: usize) -> Result<usize, TransformError> {
        self.is_module = true;
        let mut j = i + 1;

        if self.tok(j).is_some_and(|t| t.kind == TokenKind::Str) {
            let specifier = self.expect_string(j, "a module specifier")?;
            let end = self.statement_end(j);
            self.replace(i, end, format!("require({});", quote(&specifier)));
            return Ok(end + 1);
        }

        let mut default_binding: Option<String> = None;
        let mut namespace: Option<String> = None;
        let mut named: Vec<(String, String)> = Vec::new();

        if self.tok(j).is_some_and(|t| t.kind == TokenKind::Ident) && !self.is_word(j, "from") {
            default_binding = Some(self.text(j).to_string());
            j += 1;
            if self.is_punct(j, ',') {
                j += 1;
            }
        }

        if self.is_punct(j, '*') {
            self.expect_word(j + 1, "as")?;
            namespace = Some(self.binding_name(j + 2)?);
            j += 3;
        } else if self.is_punct(j, '{') {
            j += 1;
            while !self.is_punct(j, '}') {
                let imported = self.binding_name(j)?;
                j += 1;
                let local = if self.is_word(j, "as") {
                    let local = self.binding_name(j + 1)?;
                    j += 2;
                    local
                } else {
                    imported.clone()
                };
                named.push((imported, local));
                if self.is_punct(j, ',') {
                    j += 1;
                } else if !self.is_punct(j, '}') {
                    return Err(self.unsupported(j, "expected ',' or '}' in import list"));
                }
            }
            j += 1;
        } else if default_binding.is_none() {
            return Err(self.unsupported(j, "unrecognized import form"));
        }

        self.expect_word(j, "from")?;
        let specifier = self.expect_string(j + 1, "a module specifier")?;
        let end = self.statement_end(j + 1);

        let module = self.next_temp("imp");
        let mut declarators = vec![format!("{} = require({})", module, quote(&specifier))];
        if let Some(local) = namespace {
            declarators.push(format!("{} = __ap_ns({})", local, module));
        }
        let bindings = default_binding
            .map(|local| ("default".to_string(), local))
            .into_iter()
            .chain(named);
        for (imported, local) in bindings {
            let value = if imported == "default" {
                format!("__ap_default({})", module)
            } else {
                member(&module, &imported)
            };
            if self.declared.contains(local.as_str()) {
                declarators.push(format!("{} = {}", local, value));
            } else {
                self.imports.push((local, value));
            }
        }

        self.replace(i, end, format!("var {};", declarators.join(", ")));
        Ok(end + 1)
    }

    fn export_statement(&mut self, i: usize) -> Result<usize, TransformError> {
        self.is_module = true;
        let j = i + 1;

        match self.text(j) {
            "default" => self.export_default(i, j),
            "function" | "async" | "class" => {
                let name = self.declaration_name(j)?;
                self.remove_export_keyword(i, j);
                self.exports.push((name.clone(), name));
                Ok(j)
            }
            "var" | "let" | "const" => {
                let names = self.declared_names(j + 1)?;
                self.remove_export_keyword(i, j);
                for name in names {
                    self.exports.push((name.clone(), name));
                }
                Ok(j + 1)
            }
            "{" => self.export_list(i, j),
            "*" => self.export_star(i, j),
            _ => Err(self.unsupported(j, "unrecognized export form")),
        }
    }

    fn remove_export_keyword(&mut self, export: usize, next: usize) {
        let start = self.tokens[export].start;
        let end = self.tokens[next].start;
        self.replace_span(start, end, String::new());
    }

    fn export_default(&mut self, i: usize, j: usize) -> Result<usize, TransformError> {
        let k = j + 1;
        let is_declaration = match self.text(k) {
            "function" | "class" => true,
            "async" => self.is_word(k + 1, "function") && !self.tok(k + 1).is_some_and(|t| t.newline_before),
            _ => false,
        };

        if is_declaration {
            if let Some(name) = self.optional_declaration_name(k) {
                self.remove_export_keyword(i, k);
                self.exports.push(("default".to_string(), name));
                return Ok(k);
            }
        }

        self.replace(i, j, "exports.default =".to_string());
        Ok(k)
    }

    /// Name of a `function` / `async function` / `class` declaration starting at `k`
    fn optional_declaration_name(&self, k: usize) -> Option<String> {
        let mut n = k;
        if self.is_word(n, "async") {
            n += 1;
        }
        let is_class = self.is_word(n, "class");
        n += 1;
        if !is_class && self.is_punct(n, '*') {
            n += 1;
        }
        match self.tok(n) {
            Some(t)
                if t.kind == TokenKind::Ident
                    && !(is_class && t.is_word(self.source, "extends")) =>
            {
                Some(t.text(self.source).to_string())
            }
            _ => None,
        }
    }

    fn declaration_name(&self, k: usize) -> Result<String, TransformError> {
        if self.is_word(k, "async") && !self.is_word(k + 1, "function") {
            return Err(self.unsupported(k + 1, "expected 'function' after 'async'"));
        }
        self.optional_declaration_name(k)
            .ok_or_else(|| self.unsupported(k, "exported declaration needs a name"))
    }

    /// Names bound by a `var` / `let` / `const` declaration list starting at `k`
    fn declared_names(&self, k: usize) -> Result<Vec<String>, TransformError> {
        let mut names = Vec::new();
        let mut expect_name = true;
        let mut n = k;

        while let Some(token) = self.tok(n) {
            if token.depth != 0 {
                n += 1;
                continue;
            }
            if expect_name {
                if token.kind == TokenKind::Ident {
                    names.push(token.text(self.source).to_string());
                    expect_name = false;
                } else if token.is_punct(self.source, '{') || token.is_punct(self.source, '[') {
                    return Err(self.unsupported(n, "destructuring in an exported declaration"));
                } else {
                    return Err(self.unsupported(n, "expected a declared name"));
                }
            } else if token.is_punct(self.source, ';') {
                break;
            } else if token.is_punct(self.source, ',') {
                expect_name = true;
            } else if token.newline_before && !self.line_continues(n) {
                break;
            }
            n += 1;
        }

        Ok(names)
    }

    fn line_continues(&self, n: usize) -> bool {
        let prev_continues = n > 0 && CONTINUES_AFTER.iter().any(|c| self.is_punct(n - 1, *c));
        let next_continues = CONTINUES_BEFORE.iter().any(|c| self.is_punct(n, *c));
        prev_continues || next_continues
    }

    fn export_list(&mut self, i: usize, j: usize) -> Result<usize, TransformError> {
        let mut entries: Vec<(String, String)> = Vec::new();
        let mut n = j + 1;

        while !self.is_punct(n, '}') {
            let local = self.binding_name(n)?;
            n += 1;
            let exported = if self.is_word(n, "as") {
                let exported = self.binding_name(n + 1)?;
                n += 2;
                exported
            } else {
                local.clone()
            };
            entries.push((local, exported));
            if self.is_punct(n, ',') {
                n += 1;
            } else if !self.is_punct(n, '}') {
                return Err(self.unsupported(n, "expected ',' or '}' in export list"));
            }
        }

        if self.is_word(n + 1, "from") {
            let specifier = self.expect_string(n + 2, "a module specifier")?;
            let end = self.statement_end(n + 2);
            let module = self.next_temp("re");
            for (local, exported) in entries {
                let value = if local == "default" {
                    format!("__ap_default({})", module)
                } else {
                    member(&module, &local)
                };
                self.exports.push((exported, value));
            }
            self.replace(i, end, format!("var {} = require({});", module, quote(&specifier)));
            return Ok(end + 1);
        }

        for (local, exported) in entries {
            self.exports.push((exported, local));
        }
        let end = self.statement_end(n);
        self.replace(i, end, String::new());
        Ok(end + 1)
    }

    fn export_star(&mut self, i: usize, j: usize) -> Result<usize, TransformError> {
        if self.is_word(j + 1, "as") {
            let name = self.binding_name(j + 2)?;
            self.expect_word(j + 3, "from")?;
            let specifier = self.expect_string(j + 4, "a module specifier")?;
            let end = self.statement_end(j + 4);
            let module = self.next_temp("re");
            self.exports.push((name, format!("__ap_ns({})", module)));
            self.replace(i, end, format!("var {} = require({});", module, quote(&specifier)));
            return Ok(end + 1);
        }

        self.expect_word(j + 1, "from")?;
        let specifier = self.expect_string(j + 2, "a module specifier")?;
        let end = self.statement_end(j + 2);
        self.replace(
            i,
            end,
            format!("__ap_star(require({}), exports);", quote(&specifier)),
        );
        Ok(end + 1)
    }

    /// Expression that reads the imported binding `name`
    fn imported(&self, name: &str) -> Option<&str> {
        self.imports
            .iter()
            .find(|(local, _)| local == name)
            .map(|(_, value)| value.as_str())
    }

    /// Points every reference to an imported binding at its module object
    fn rewrite_imported_uses(&mut self) {
        if self.imports.is_empty() {
            return;
        }
        let tokens = self.tokens;
        let scan = Scan::new(self.source, tokens);
        let mut rewrites = Vec::new();

        for (i, token) in tokens.iter().enumerate() {
            if token.kind != TokenKind::Ident {
                continue;
            }
            let name = token.text(self.source);
            let Some(value) = self.imported(name) else {
                continue;
            };
            if self
                .edits
                .iter()
                .any(|edit| token.start >= edit.start && token.start < edit.end)
            {
                continue;
            }
            let Some(text) = scan.reference(i, name, value) else {
                continue;
            };
            rewrites.push(Edit {
                start: token.start,
                end: token.end,
                text,
            });
        }

        self.edits.extend(rewrites);
    }

    fn header(&self) -> String {
        let mut header = String::from(
            "\"use strict\"; Object.defineProperty(exports, \"__esModule\", { value: true });",
        );
        for (name, value) in &self.exports {
            let value = self.imported(value).unwrap_or(value);
            header.push_str(&format!(
                " Object.defineProperty(exports, {}, {{ enumerable: true, get: function () {{ return {}; }} }});",
                quote(name),
                value
            ));
        }
        header.push(' ');
        header
    }

    fn finish(mut self) -> String {
        if !self.is_module {
            return self.source.to_string();
        }

        self.edits.sort_by_key(|edit| edit.start);
        let mut out = self.header();
        let mut cursor = 0;
        for edit in &self.edits {
            out.push_str(&self.source[cursor..edit.start]);
            out.push_str(&edit.text);
            cursor = edit.end;
        }
        out.push_str(&self.source[cursor..]);
        out
    }
}

fn quote(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// `object.name`, or `object["name"]` when `name` is not an identifier
fn member(object: &str, name: &str) -> String {
    if is_identifier(name) {
        format!("{}.{}", object, name)
    } else {
        format!("{}[{}]", object, quote(name))
    }
}

/// Bracket structure of a token stream
struct Scan<'a> {
    source: &'a str,
    tokens: &'a [Token],
    /// Innermost open bracket around each token (`$` for a template substitution)
    enclosing: Vec<Option<u8>>,
    /// Index of the matching closer for each opening bracket
    closer: Vec<Option<usize>>,
}

impl<'a> Scan<'a> {
    fn new(source: &'a str, tokens: &'a [Token]) -> Self {
        let mut enclosing = Vec::with_capacity(tokens.len());
        let mut closer = vec![None; tokens.len()];
        let mut stack: Vec<(u8, usize)> = Vec::new();

        for (i, token) in tokens.iter().enumerate() {
            enclosing.push(stack.last().map(|(open, _)| *open));
            let text = token.text(source);
            match token.kind {
                TokenKind::Punct => match text {
                    "(" | "[" | "{" => stack.push((text.as_bytes()[0], i)),
                    ")" | "]" | "}" => {
                        if let Some((_, open)) = stack.pop() {
                            closer[open] = Some(i);
                        }
                    }
                    _ => {}
                },
                TokenKind::Template => {
                    if text.starts_with('}') {
                        stack.pop();
                    }
                    if text.ends_with("${") {
                        stack.push((b'$', i));
                    }
                }
                _ => {}
            }
        }

        Self {
            source,
            tokens,
            enclosing,
            closer,
        }
    }

    fn is_punct(&self, i: usize, c: char) -> bool {
        self.tokens.get(i).is_some_and(|t| t.is_punct(self.source, c))
    }

    fn is_word(&self, i: usize, word: &str) -> bool {
        self.tokens.get(i).is_some_and(|t| t.is_word(self.source, word))
    }

    fn is_arrow(&self, i: usize) -> bool {
        self.is_punct(i, '=')
            && self.is_punct(i + 1, '>')
            && self.tokens[i].end == self.tokens[i + 1].start
    }

    fn is_spread(&self, i: usize) -> bool {
        i >= 3 && (1..=3).all(|back| self.is_punct(i - back, '.'))
    }

    /// Every name a declaration, parameter list or catch clause binds
    ///
    /// Over-approximates: default values and some keys are included too.
    fn declared_names(&self) -> HashSet<&'a str> {
        let mut names = HashSet::new();

        for (i, token) in self.tokens.iter().enumerate() {
            if token.kind == TokenKind::Punct {
                if self.is_punct(i, '(') && self.is_parameter_list(i) {
                    self.collect_group(i, &mut names);
                }
                continue;
            }
            if token.kind != TokenKind::Ident || (i > 0 && self.is_punct(i - 1, '.')) {
                continue;
            }
            match token.text(self.source) {
                "var" | "let" | "const" => self.collect_declarators(i, &mut names),
                "function" | "class" => {
                    let n = if self.is_punct(i + 1, '*') { i + 2 } else { i + 1 };
                    if let Some(name) = self.tokens.get(n) {
                        if name.kind == TokenKind::Ident && !self.is_word(n, "extends") {
                            names.insert(name.text(self.source));
                        }
                    }
                }
                "catch" if self.is_punct(i + 1, '(') => self.collect_group(i + 1, &mut names),
                name if self.is_arrow(i + 1) => {
                    names.insert(name);
                }
                _ => {}
            }
        }

        names
    }

    /// `(` opens parameters when a body or an arrow follows its closer
    fn is_parameter_list(&self, open: usize) -> bool {
        let control = ["if", "while", "for", "with", "switch", "catch"];
        if open > 0 && control.iter().any(|word| self.is_word(open - 1, word)) {
            return false;
        }
        match self.closer[open] {
            Some(close) => self.is_punct(close + 1, '{') || self.is_arrow(close + 1),
            None => false,
        }
    }

    fn collect_group(&self, open: usize, names: &mut HashSet<&'a str>) {
        let Some(close) = self.closer.get(open).copied().flatten() else {
            return;
        };
        for n in open + 1..close {
            let token = &self.tokens[n];
            if token.kind == TokenKind::Ident
                && !self.is_punct(n - 1, '.')
                && !self.is_punct(n + 1, ':')
            {
                names.insert(token.text(self.source));
            }
        }
    }

    /// Names bound by the declaration list after the keyword at `keyword`
    fn collect_declarators(&self, keyword: usize, names: &mut HashSet<&'a str>) {
        let depth = self.tokens[keyword].depth;
        let mut expect_name = true;
        let mut n = keyword + 1;

        while let Some(token) = self.tokens.get(n) {
            if token.depth < depth {
                break;
            }
            if token.depth == depth {
                if expect_name {
                    if token.kind == TokenKind::Ident {
                        names.insert(token.text(self.source));
                    } else if self.is_punct(n, '{') || self.is_punct(n, '[') {
                        self.collect_group(n, names);
                    } else {
                        break;
                    }
                    expect_name = false;
                } else if self.is_punct(n, ';') || self.is_word(n, "in") || self.is_word(n, "of") {
                    break;
                } else if self.is_punct(n, ',') {
                    expect_name = true;
                } else if token.newline_before
                    && !CONTINUES_AFTER.iter().any(|c| self.is_punct(n - 1, *c))
                    && !CONTINUES_BEFORE.iter().any(|c| self.is_punct(n, *c))
                {
                    break;
                }
            }
            n += 1;
        }
    }

    /// Replacement for the identifier at `i` when it references the
    /// imported binding `name`; `None` when it is a property name
    fn reference(&self, i: usize, name: &str, value: &str) -> Option<String> {
        if i > 0 && self.is_punct(i - 1, '.') && !self.is_spread(i) {
            return None;
        }

        if self.enclosing[i] == Some(b'{') && i > 0 {
            let after_open_or_comma = self.is_punct(i - 1, '{') || self.is_punct(i - 1, ',');
            if after_open_or_comma && self.is_punct(i + 1, ':') {
                return None;
            }
            if after_open_or_comma && (self.is_punct(i + 1, ',') || self.is_punct(i + 1, '}')) {
                return Some(format!("{}: {}", name, value));
            }
            // method or class field named like the import
            if self.is_punct(i + 1, '(') {
                let body = self.closer[i + 1].is_some_and(|close| self.is_punct(close + 1, '{'));
                if body {
                    return None;
                }
            }
            let starts_member = ['{', ';', '}'].iter().any(|c| self.is_punct(i - 1, *c));
            if starts_member
                && self.is_punct(i + 1, '=')
                && !self.is_punct(i + 2, '=')
                && !self.is_arrow(i + 1)
            {
                return None;
            }
        }

        let called = self.is_punct(i + 1, '(')
            || self.tokens.get(i + 1).is_some_and(|t| {
                t.kind == TokenKind::Template && t.text(self.source).starts_with('`')
            });
        if i > 0 && self.is_word(i - 1, "new") {
            Some(format!("({})", value))
        } else if called {
            Some(format!("(0, {})", value))
        } else {
            Some(value.to_string())
        }
    }
}

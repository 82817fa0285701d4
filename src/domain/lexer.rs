//! JavaScript tokenizer
//!
//! Just enough lexing to find module syntax and to reject malformed sources.
//! Strings, template literals, comments, regular expression literals and
//! bracket nesting are tracked exactly; everything else is an identifier,
//! a number, or a single-character punctuator.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    Str,
    /// A template literal chunk: head, middle or tail
    Template,
    Regex,
    Punct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offsets into the source
    pub start: usize,
    pub end: usize,
    /// 1-based position of the first character
    pub line: u32,
    pub column: u32,
    /// Bracket nesting depth the token sits at (0 = top level)
    pub depth: usize,
    /// Whether a line terminator separates this token from the previous one
    pub newline_before: bool,
}

impl Token {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }

    pub fn is_punct(&self, source: &str, c: char) -> bool {
        self.kind == TokenKind::Punct && self.text(source).starts_with(c)
    }

    pub fn is_word(&self, source: &str, word: &str) -> bool {
        self.kind == TokenKind::Ident && self.text(source) == word
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} ({line}:{column})")]
pub struct SyntaxError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

/// Words after which a `/` starts a regular expression rather than a division
const REGEX_PREFIX_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case",
    "do", "else", "yield", "await",
];

/// Words whose parenthesized head is followed by a statement
const CONTROL_KEYWORDS: &[&str] = &["if", "while", "for", "with"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Open {
    Paren,
    Bracket,
    Brace,
    /// `${` inside a template literal
    Substitution,
}

impl Open {
    fn symbol(self) -> &'static str {
        match self {
            Open::Paren => "(",
            Open::Bracket => "[",
            Open::Brace => "{",
            Open::Substitution => "${",
        }
    }
}

/// Tokenizes `source`, failing on the first lexical or nesting error
pub fn tokenize(source: &str) -> Result<Vec<Token>, SyntaxError> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
    newline_pending: bool,
    /// Open brackets with their position and whether a `/` after the
    /// matching closer starts a regular expression
    stack: Vec<(Open, u32, u32, bool)>,
    /// Same flag for the most recently closed bracket
    close_allows_regex: bool,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            src: source.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
            newline_pending: false,
            stack: Vec::new(),
            close_allows_regex: false,
            tokens: Vec::new(),
        }
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn bump(&mut self) {
        if let Some(b) = self.peek(0) {
            if b == b'\n' {
                self.line += 1;
                self.column = 1;
            } else if b & 0xC0 != 0x80 {
                self.column += 1;
            }
            self.pos += 1;
        }
    }

    fn error_at(&self, message: impl Into<String>, line: u32, column: u32) -> SyntaxError {
        SyntaxError {
            message: message.into(),
            line,
            column,
        }
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        self.error_at(message, self.line, self.column)
    }

    fn run(mut self) -> Result<Vec<Token>, SyntaxError> {
        if self.src.starts_with("\u{feff}".as_bytes()) {
            self.pos = 3;
        }
        if self.src[self.pos..].starts_with(b"#!") {
            while matches!(self.peek(0), Some(b) if b != b'\n') {
                self.bump();
            }
        }

        loop {
            self.skip_trivia()?;
            let Some(b) = self.peek(0) else { break };

            let start = self.pos;
            let (line, column) = (self.line, self.column);
            let depth_at_start = self.stack.len();
            let mut depth = depth_at_start;

            let kind = match b {
                b'"' | b'\'' => {
                    self.scan_string(b)?;
                    TokenKind::Str
                }
                b'`' => {
                    self.bump();
                    self.scan_template_chunk(line, column)?;
                    TokenKind::Template
                }
                b'0'..=b'9' => {
                    self.scan_number();
                    TokenKind::Number
                }
                b'.' if matches!(self.peek(1), Some(b'0'..=b'9')) => {
                    self.scan_number();
                    TokenKind::Number
                }
                b'/' if self.regex_allowed() => {
                    self.scan_regex()?;
                    TokenKind::Regex
                }
                b'(' | b'[' | b'{' => {
                    let (open, regex_after) = match b {
                        b'(' => (Open::Paren, self.opens_control_head()),
                        b'[' => (Open::Bracket, false),
                        _ => (Open::Brace, self.opens_block()),
                    };
                    self.stack.push((open, line, column, regex_after));
                    self.bump();
                    TokenKind::Punct
                }
                b')' | b']' | b'}' => {
                    let expected = match b {
                        b')' => Open::Paren,
                        b']' => Open::Bracket,
                        _ => Open::Brace,
                    };
                    match self.stack.pop() {
                        Some((Open::Substitution, open_line, open_column, _)) if b == b'}' => {
                            depth = self.stack.len();
                            self.bump();
                            self.scan_template_chunk(open_line, open_column)?;
                            TokenKind::Template
                        }
                        Some((open, open_line, open_column, _)) if open != expected => {
                            return Err(self.error(format!(
                                "Unexpected '{}': '{}' opened at {}:{} is not closed",
                                b as char,
                                open.symbol(),
                                open_line,
                                open_column
                            )));
                        }
                        Some((_, _, _, regex_after)) => {
                            depth = self.stack.len();
                            self.close_allows_regex = regex_after;
                            self.bump();
                            TokenKind::Punct
                        }
                        None => {
                            return Err(self.error(format!("Unexpected '{}'", b as char)));
                        }
                    }
                }
                b if is_ident_start(b) => {
                    self.bump();
                    while matches!(self.peek(0), Some(b) if is_ident_part(b)) {
                        self.bump();
                    }
                    TokenKind::Ident
                }
                _ => {
                    self.bump();
                    TokenKind::Punct
                }
            };

            self.tokens.push(Token {
                kind,
                start,
                end: self.pos,
                line,
                column,
                depth,
                newline_before: std::mem::take(&mut self.newline_pending),
            });
        }

        if let Some((open, line, column, _)) = self.stack.last().copied() {
            let message = match open {
                Open::Substitution => "Unterminated template literal".to_string(),
                _ => format!("Unclosed '{}'", open.symbol()),
            };
            return Err(self.error_at(message, line, column));
        }

        Ok(self.tokens)
    }

    fn skip_trivia(&mut self) -> Result<(), SyntaxError> {
        loop {
            match self.peek(0) {
                Some(b'\n') => {
                    self.newline_pending = true;
                    self.bump();
                }
                Some(b' ' | b'\t' | b'\r' | 0x0b | 0x0c) => self.bump(),
                // U+00A0 and U+FEFF
                Some(0xC2) if self.peek(1) == Some(0xA0) => {
                    self.bump();
                    self.bump();
                }
                Some(0xEF) if self.peek(1) == Some(0xBB) && self.peek(2) == Some(0xBF) => {
                    for _ in 0..3 {
                        self.bump();
                    }
                }
                Some(b'/') if self.peek(1) == Some(b'/') => {
                    while matches!(self.peek(0), Some(b) if b != b'\n') {
                        self.bump();
                    }
                }
                Some(b'/') if self.peek(1) == Some(b'*') => {
                    let (line, column) = (self.line, self.column);
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek(0) {
                            None => {
                                return Err(self.error_at("Unterminated comment", line, column))
                            }
                            Some(b'*') if self.peek(1) == Some(b'/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            Some(b'\n') => {
                                self.newline_pending = true;
                                self.bump();
                            }
                            Some(_) => self.bump(),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn scan_string(&mut self, quote: u8) -> Result<(), SyntaxError> {
        let (line, column) = (self.line, self.column);
        self.bump();
        loop {
            match self.peek(0) {
                None | Some(b'\n') => {
                    return Err(self.error_at("Unterminated string literal", line, column))
                }
                Some(b'\\') => {
                    self.bump();
                    // Escaped line terminators continue the string
                    if self.peek(0) == Some(b'\r') && self.peek(1) == Some(b'\n') {
                        self.bump();
                    }
                    self.bump();
                }
                Some(b) if b == quote => {
                    self.bump();
                    return Ok(());
                }
                Some(_) => self.bump(),
            }
        }
    }

    /// Scans template text up to the closing backtick or the next `${`
    fn scan_template_chunk(&mut self, line: u32, column: u32) -> Result<(), SyntaxError> {
        loop {
            match self.peek(0) {
                None => return Err(self.error_at("Unterminated template literal", line, column)),
                Some(b'\\') => {
                    self.bump();
                    self.bump();
                }
                Some(b'`') => {
                    self.bump();
                    return Ok(());
                }
                Some(b'$') if self.peek(1) == Some(b'{') => {
                    let (sub_line, sub_column) = (self.line, self.column);
                    self.bump();
                    self.bump();
                    self.stack.push((Open::Substitution, sub_line, sub_column, false));
                    return Ok(());
                }
                Some(_) => self.bump(),
            }
        }
    }

    fn scan_number(&mut self) {
        let start = self.pos;
        let hex = matches!(&self.src[start..], [b'0', b'x' | b'X', ..]);
        while let Some(b) = self.peek(0) {
            let exponent_sign = matches!(b, b'+' | b'-')
                && !hex
                && matches!(self.src.get(self.pos.wrapping_sub(1)), Some(b'e' | b'E'))
                && self.pos > start;
            if b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || exponent_sign {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn scan_regex(&mut self) -> Result<(), SyntaxError> {
        let (line, column) = (self.line, self.column);
        self.bump();
        let mut in_class = false;
        loop {
            match self.peek(0) {
                None | Some(b'\n') => {
                    return Err(self.error_at(
                        "Unterminated regular expression",
                        line,
                        column,
                    ))
                }
                Some(b'\\') => {
                    self.bump();
                    if matches!(self.peek(0), None | Some(b'\n')) {
                        return Err(self.error_at(
                            "Unterminated regular expression",
                            line,
                            column,
                        ));
                    }
                    self.bump();
                }
                Some(b'[') => {
                    in_class = true;
                    self.bump();
                }
                Some(b']') => {
                    in_class = false;
                    self.bump();
                }
                Some(b'/') if !in_class => {
                    self.bump();
                    break;
                }
                Some(_) => self.bump(),
            }
        }
        while matches!(self.peek(0), Some(b) if is_ident_part(b)) {
            self.bump();
        }
        Ok(())
    }

    fn regex_allowed(&self) -> bool {
        let Some(prev) = self.tokens.last() else {
            return true;
        };
        let text = &self.src[prev.start..prev.end];
        match prev.kind {
            TokenKind::Punct => match text {
                b")" | b"}" => self.close_allows_regex,
                b"]" => false,
                _ => true,
            },
            TokenKind::Ident => is_one_of(text, REGEX_PREFIX_KEYWORDS),
            _ => false,
        }
    }

    /// Whether a `(` about to be pushed is the head of `if`, `while`, `for` or `with`
    fn opens_control_head(&self) -> bool {
        self.tokens.last().is_some_and(|prev| {
            prev.kind == TokenKind::Ident
                && is_one_of(&self.src[prev.start..prev.end], CONTROL_KEYWORDS)
        })
    }

    /// Whether a `{` about to be pushed opens a block or a body rather than
    /// an object literal
    fn opens_block(&self) -> bool {
        let Some(prev) = self.tokens.last() else {
            return true;
        };
        let text = &self.src[prev.start..prev.end];
        match prev.kind {
            TokenKind::Punct => match text {
                b";" | b"{" | b"}" | b")" => true,
                // arrow body
                b">" => self.tokens.len() >= 2 && {
                    let before = &self.tokens[self.tokens.len() - 2];
                    before.end == prev.start && &self.src[before.start..before.end] == b"="
                },
                _ => false,
            },
            TokenKind::Ident => {
                matches!(text, b"do" | b"else") || !is_one_of(text, REGEX_PREFIX_KEYWORDS)
            }
            _ => false,
        }
    }
}

fn is_one_of(text: &[u8], words: &[&str]) -> bool {
    words.iter().any(|word| word.as_bytes() == text)
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || matches!(b, b'_' | b'$' | b'\\' | b'#') || b >= 0x80
}

fn is_ident_part(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'$' | b'\\') || b >= 0x80
}

/// Decodes a quoted string literal token (quotes included)
pub fn string_value(raw: &str) -> String {
    let inner = raw
        .get(1..raw.len().saturating_sub(1))
        .unwrap_or_default();
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('v') => out.push('\u{b}'),
            Some('0') => out.push('\0'),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                if let Some(ch) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    out.push(ch);
                }
            }
            Some('u') => {
                let hex: String = if chars.peek() == Some(&'{') {
                    chars.next();
                    chars.by_ref().take_while(|c| *c != '}').collect()
                } else {
                    chars.by_ref().take(4).collect()
                };
                if let Some(ch) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    out.push(ch);
                }
            }
            // Line continuation
            Some('\n') => {}
            Some('\r') => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<(TokenKind, String)> {
        tokenize(source)
            .unwrap()
            .iter()
            .map(|t| (t.kind, t.text(source).to_string()))
            .collect()
    }

    #[test]
    fn basic_tokens() {
        let tokens = kinds("import x from './x.js';");
        assert_eq!(
            tokens,
            vec![
                (TokenKind::Ident, "import".to_string()),
                (TokenKind::Ident, "x".to_string()),
                (TokenKind::Ident, "from".to_string()),
                (TokenKind::Str, "'./x.js'".to_string()),
                (TokenKind::Punct, ";".to_string()),
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        let source = "// import a from 'a'\n/* require('b') */ c";
        let tokens = tokenize(source).unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].text(source), "c");
        assert!(tokens[0].newline_before);
        assert_eq!(tokens[0].line, 2);
    }

    #[test]
    fn regex_versus_division() {
        let tokens = kinds("a = b / c; d = /x[/]y/g.test(e)");
        assert!(tokens.contains(&(TokenKind::Punct, "/".to_string())));
        assert!(tokens.contains(&(TokenKind::Regex, "/x[/]y/g".to_string())));

        let tokens = kinds("return /ab+c/i");
        assert_eq!(tokens[1], (TokenKind::Regex, "/ab+c/i".to_string()));
    }

    #[test]
    fn regex_after_control_heads_and_blocks() {
        let tokens = kinds("if (x) /[)]/.test(s)");
        assert_eq!(tokens[4], (TokenKind::Regex, "/[)]/".to_string()));

        let tokens = kinds("while (f(a)) /b/g.exec(c)");
        assert!(tokens.contains(&(TokenKind::Regex, "/b/g".to_string())));

        let tokens = kinds("function f() {}\n/re/.test(s)");
        assert!(tokens.contains(&(TokenKind::Regex, "/re/".to_string())));

        let tokens = kinds("const f = () => {}\n/x/.test(s)");
        assert!(tokens.contains(&(TokenKind::Regex, "/x/".to_string())));

        // Calls, groups and object literals still divide
        for source in ["f(a) / 2", "(a + b) / c", "x = {} / 2", "a[0] / b"] {
            let tokens = kinds(source);
            assert!(
                tokens.contains(&(TokenKind::Punct, "/".to_string())),
                "{source}"
            );
            assert!(tokens.iter().all(|(kind, _)| *kind != TokenKind::Regex), "{source}");
        }
    }

    #[test]
    fn template_substitutions_nest() {
        let source = "const s = `a ${ {b: 1}.b } c ${`inner ${d}`}`;";
        let tokens = tokenize(source).unwrap();
        let templates: Vec<_> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Template)
            .map(|t| t.text(source))
            .collect();
        assert_eq!(templates, vec!["`a ${", "} c ${", "`inner ${", "}`", "}`"]);
        assert!(tokens.iter().all(|t| t.kind != TokenKind::Punct || t.text(source) != "`"));
        assert_eq!(tokens.last().unwrap().depth, 0);
    }

    #[test]
    fn depth_tracks_nesting() {
        let source = "f(a, {b: [c]}); g";
        let tokens = tokenize(source).unwrap();
        let depth_of = |text: &str| {
            tokens
                .iter()
                .find(|t| t.text(source) == text)
                .map(|t| t.depth)
                .unwrap()
        };
        assert_eq!(depth_of("f"), 0);
        assert_eq!(depth_of("a"), 1);
        assert_eq!(depth_of("c"), 3);
        assert_eq!(depth_of(")"), 0);
        assert_eq!(depth_of("g"), 0);
    }

    #[test]
    fn reports_unclosed_brace() {
        let err = tokenize("function f() {\n  return 1;\n").unwrap_err();
        assert_eq!(err.message, "Unclosed '{'");
        assert_eq!((err.line, err.column), (1, 14));
    }

    #[test]
    fn reports_mismatched_bracket() {
        let err = tokenize("f(a]").unwrap_err();
        assert!(err.message.starts_with("Unexpected ']'"));
        assert_eq!((err.line, err.column), (1, 4));
    }

    #[test]
    fn reports_unterminated_literals() {
        assert_eq!(
            tokenize("let s = 'abc\n';").unwrap_err().message,
            "Unterminated string literal"
        );
        assert_eq!(
            tokenize("let s = `abc").unwrap_err().message,
            "Unterminated template literal"
        );
        assert_eq!(
            tokenize("/* open").unwrap_err().message,
            "Unterminated comment"
        );
        assert_eq!(
            tokenize("x = /abc\n").unwrap_err().message,
            "Unterminated regular expression"
        );
        assert_eq!(tokenize("}").unwrap_err().message, "Unexpected '}'");
    }

    #[test]
    fn numbers_with_exponents() {
        let tokens = kinds("1e-5 + 0x1F - .5");
        assert_eq!(tokens[0], (TokenKind::Number, "1e-5".to_string()));
        assert_eq!(tokens[2], (TokenKind::Number, "0x1F".to_string()));
        assert_eq!(tokens[4], (TokenKind::Number, ".5".to_string()));
    }

    #[test]
    fn shebang_and_unicode_columns() {
        let source = "#!/usr/bin/env node\nconst é = 'ü'; x";
        let tokens = tokenize(source).unwrap();
        let x = tokens.last().unwrap();
        assert_eq!(x.text(source), "x");
        assert_eq!((x.line, x.column), (2, 16));
    }

    #[test]
    fn decodes_string_values() {
        assert_eq!(string_value("'./a.js'"), "./a.js");
        assert_eq!(string_value(r#""a\"b""#), "a\"b");
        assert_eq!(string_value(r"'\x41B\u{43}'"), "ABC");
        assert_eq!(string_value(r"'tab\there'"), "tab\there");
    }
}

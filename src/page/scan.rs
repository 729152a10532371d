//! HTML scanner
//!
//! A forgiving tokenizer over page markup. It only knows enough HTML to walk
//! the node structure of server-generated pages: comments, text runs, start
//! and end tags, void elements and raw-text elements. Tokens carry byte
//! offsets into the source so callers can splice markup in place.

use regex::Regex;
use std::sync::OnceLock;

/// Elements that never have children or an end tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Elements whose content is text up to the matching end tag
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

const ATTRIBUTE_PATTERN: &str =
    r#"([^\s"'>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#;

/// Whether `name` is a void element
pub fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

fn is_raw_text(name: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&name)
}

/// What a token is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind<'a> {
    /// Character data between tags
    Text(&'a str),
    /// `<!-- ... -->`, holding the inner text
    Comment(&'a str),
    /// `<!DOCTYPE ...>`, `<?...>` and other markup declarations
    Declaration,
    /// Opening tag; `attrs` is the raw attribute source
    StartTag {
        name: String,
        attrs: &'a str,
        self_closing: bool,
    },
    /// Closing tag
    EndTag { name: String },
}

/// A token and its byte span in the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub start: usize,
    pub end: usize,
}

impl Token<'_> {
    /// Whether this start tag opens an element with content
    pub fn opens_element(&self) -> bool {
        match &self.kind {
            TokenKind::StartTag {
                name, self_closing, ..
            } => !*self_closing && !is_void(name),
            _ => false,
        }
    }
}

/// Iterator over the tokens of an HTML document
pub struct Scanner<'a> {
    src: &'a str,
    pos: usize,
    raw_text_end: Option<String>,
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            raw_text_end: None,
        }
    }

    /// Whether a tag or comment starts at byte `at`
    fn markup_starts_at(&self, at: usize) -> bool {
        let bytes = self.src.as_bytes();
        if bytes.get(at) != Some(&b'<') {
            return false;
        }
        match bytes.get(at + 1) {
            Some(b) if b.is_ascii_alphabetic() => true,
            Some(b'!') | Some(b'?') => true,
            Some(b'/') => bytes
                .get(at + 2)
                .map(|b| b.is_ascii_alphabetic())
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Position of the `>` closing a tag that starts at `from`, skipping quoted values
    fn tag_close(&self, from: usize) -> Option<usize> {
        let mut quote: Option<u8> = None;
        for (offset, &b) in self.src.as_bytes()[from..].iter().enumerate() {
            match quote {
                Some(q) if b == q => quote = None,
                Some(_) => {}
                None if b == b'"' || b == b'\'' => quote = Some(b),
                None if b == b'>' => return Some(from + offset),
                None => {}
            }
        }
        None
    }

    fn tag_name(&self, from: usize) -> (String, usize) {
        let rest = &self.src.as_bytes()[from..];
        let len = rest
            .iter()
            .position(|b| b.is_ascii_whitespace() || *b == b'/' || *b == b'>')
            .unwrap_or(rest.len());
        (
            self.src[from..from + len].to_ascii_lowercase(),
            from + len,
        )
    }

    fn scan_raw_text(&mut self, name: String) -> Option<Token<'a>> {
        let start = self.pos;
        let needle = format!("</{}", name);
        let lowered = self.src[start..].to_ascii_lowercase();
        let end = lowered
            .find(&needle)
            .map(|i| start + i)
            .unwrap_or(self.src.len());
        self.pos = end;
        if end > start {
            Some(Token {
                kind: TokenKind::Text(&self.src[start..end]),
                start,
                end,
            })
        } else {
            self.next()
        }
    }

    fn scan_comment(&mut self) -> Token<'a> {
        let start = self.pos;
        let body_start = start + 4;
        let (body_end, end) = match self.src[body_start..].find("-->") {
            Some(i) => (body_start + i, body_start + i + 3),
            None => (self.src.len(), self.src.len()),
        };
        self.pos = end;
        Token {
            kind: TokenKind::Comment(&self.src[body_start..body_end]),
            start,
            end,
        }
    }

    fn scan_declaration(&mut self) -> Token<'a> {
        let start = self.pos;
        let end = self
            .src[start..]
            .find('>')
            .map(|i| start + i + 1)
            .unwrap_or(self.src.len());
        self.pos = end;
        Token {
            kind: TokenKind::Declaration,
            start,
            end,
        }
    }

    fn scan_end_tag(&mut self) -> Token<'a> {
        let start = self.pos;
        let (name, _) = self.tag_name(start + 2);
        let end = self
            .tag_close(start + 2)
            .map(|i| i + 1)
            .unwrap_or(self.src.len());
        self.pos = end;
        Token {
            kind: TokenKind::EndTag { name },
            start,
            end,
        }
    }

    fn scan_start_tag(&mut self) -> Token<'a> {
        let start = self.pos;
        let (name, attrs_start) = self.tag_name(start + 1);
        let close = self.tag_close(attrs_start).unwrap_or(self.src.len());
        let end = (close + 1).min(self.src.len());

        let inner = &self.src[attrs_start..close];
        let self_closing = inner.trim_end().ends_with('/');
        let attrs = inner.trim_end().trim_end_matches('/');

        self.pos = end;
        if !self_closing && is_raw_text(&name) {
            self.raw_text_end = Some(name.clone());
        }
        Token {
            kind: TokenKind::StartTag {
                name,
                attrs,
                self_closing,
            },
            start,
            end,
        }
    }

    fn scan_text(&mut self) -> Token<'a> {
        let start = self.pos;
        let mut end = start + 1;
        while end < self.src.len() && !self.markup_starts_at(end) {
            end += 1;
        }
        // Text runs may contain multi-byte characters; only stop on a boundary.
        while !self.src.is_char_boundary(end) {
            end += 1;
        }
        self.pos = end;
        Token {
            kind: TokenKind::Text(&self.src[start..end]),
            start,
            end,
        }
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        if let Some(name) = self.raw_text_end.take() {
            return self.scan_raw_text(name);
        }
        if self.pos >= self.src.len() {
            return None;
        }

        let src = self.src;
        let rest = &src[self.pos..];
        let token = if rest.starts_with("<!--") {
            self.scan_comment()
        } else if !self.markup_starts_at(self.pos) {
            self.scan_text()
        } else if rest.starts_with("<!") || rest.starts_with("<?") {
            self.scan_declaration()
        } else if rest.starts_with("</") {
            self.scan_end_tag()
        } else {
            self.scan_start_tag()
        };
        Some(token)
    }
}

/// Stack of open elements used to pair end tags with their start tags
#[derive(Debug, Default)]
pub struct OpenElements {
    stack: Vec<String>,
}

impl OpenElements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>) {
        self.stack.push(name.into());
    }

    /// Close `name` and anything left open inside it.
    ///
    /// Stray end tags with no matching open element are ignored and return false.
    pub fn close(&mut self, name: &str) -> bool {
        match self.stack.iter().rposition(|open| open == name) {
            Some(index) => {
                self.stack.truncate(index);
                true
            }
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

fn attribute_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(ATTRIBUTE_PATTERN).expect("attribute pattern compiles"))
}

/// Parse raw attribute source into lowercased names and unquoted values.
///
/// Attributes without a value get an empty string.
pub fn parse_attributes(raw: &str) -> Vec<(String, String)> {
    attribute_pattern()
        .captures_iter(raw)
        .map(|caps| {
            let name = caps[1].to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            (name, value)
        })
        .collect()
}

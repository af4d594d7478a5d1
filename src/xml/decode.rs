//! XML property list decoding: text → `Value`.
//!
//! A small pull tokenizer feeds a recursive-descent reader. The DOCTYPE is
//! skipped without being resolved, and entities declared in it are never
//! expanded.

use std::num::IntErrorKind;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use super::escape::unescape;
use crate::date::Date;
use crate::error::{PlistError, PlistResult};
use crate::types::{Dictionary, Uid, Value};

/// Key of the single-entry dictionary that stands for a UID in XML.
pub const UID_KEY: &str = "CF$UID";

/// Decodes a complete XML property list.
pub fn decode_document(bytes: &[u8], max_depth: usize) -> PlistResult<Value> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| PlistError::Encoding(format!("XML document is not valid UTF-8: {e}")))?;
    let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);
    let mut reader = XmlReader {
        lexer: Lexer { src: text, pos: 0 },
        max_depth,
    };
    reader.read_document()
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token<'a> {
    Start { name: &'a str, empty: bool, at: usize },
    End { name: &'a str, at: usize },
    Text { raw: &'a str, at: usize },
    CData { text: &'a str, at: usize },
    Eof { at: usize },
}

impl Token<'_> {
    fn at(&self) -> usize {
        match *self {
            Token::Start { at, .. }
            | Token::End { at, .. }
            | Token::Text { at, .. }
            | Token::CData { at, .. }
            | Token::Eof { at } => at,
        }
    }

    fn describe(&self) -> String {
        match self {
            Token::Start { name, .. } => format!("<{name}>"),
            Token::End { name, .. } => format!("</{name}>"),
            Token::Text { .. } | Token::CData { .. } => "text".into(),
            Token::Eof { .. } => "end of document".into(),
        }
    }
}

/// 1-based line and column of a byte offset.
fn position(src: &str, at: usize) -> (usize, usize) {
    let before = &src[..at.min(src.len())];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn error(&self, message: impl Into<String>, at: usize) -> PlistError {
        let (line, column) = position(self.src, at);
        PlistError::xml(message, line, column)
    }

    fn next_token(&mut self) -> PlistResult<Token<'a>> {
        loop {
            let src: &'a str = self.src;
            let at = self.pos;
            let rest = &src[at..];
            if rest.is_empty() {
                return Ok(Token::Eof { at });
            }

            if !rest.starts_with('<') {
                let end = rest.find('<').unwrap_or(rest.len());
                self.pos += end;
                return Ok(Token::Text {
                    raw: &rest[..end],
                    at,
                });
            }

            if rest.starts_with("<!--") {
                self.pos += self.skip_past(rest, "-->", at, "comment")?;
                continue;
            }
            if rest.starts_with("<?") {
                self.pos += self.skip_past(rest, "?>", at, "processing instruction")?;
                continue;
            }
            if let Some(body) = rest.strip_prefix("<![CDATA[") {
                let end = body
                    .find("]]>")
                    .ok_or_else(|| self.error("unterminated CDATA section", at))?;
                self.pos += "<![CDATA[".len() + end + "]]>".len();
                return Ok(Token::CData {
                    text: &body[..end],
                    at,
                });
            }
            if rest.starts_with("<!DOCTYPE") {
                self.skip_doctype(rest, at)?;
                continue;
            }
            if rest.starts_with("<!") {
                return Err(self.error("unsupported markup declaration", at));
            }

            if let Some(body) = rest.strip_prefix("</") {
                let name = tag_name(body);
                if name.is_empty() {
                    return Err(self.error("missing name in closing tag", at));
                }
                let after = body[name.len()..].trim_start();
                if !after.starts_with('>') {
                    return Err(self.error(format!("malformed closing tag </{name}"), at));
                }
                self.pos = src.len() - after.len() + 1;
                return Ok(Token::End { name, at });
            }

            let body = &rest[1..];
            let name = tag_name(body);
            if name.is_empty() {
                return Err(self.error("missing element name", at));
            }
            let (consumed, empty) = self.skip_attributes(&body[name.len()..], at, name)?;
            self.pos = at + 1 + name.len() + consumed;
            return Ok(Token::Start { name, empty, at });
        }
    }

    /// Returns the length of `rest` up to and including `terminator`.
    fn skip_past(&self, rest: &str, terminator: &str, at: usize, what: &str) -> PlistResult<usize> {
        rest.find(terminator)
            .map(|i| i + terminator.len())
            .ok_or_else(|| self.error(format!("unterminated {what}"), at))
    }

    /// Skips a DOCTYPE declaration, including any internal subset. External
    /// identifiers are never dereferenced.
    fn skip_doctype(&mut self, rest: &str, at: usize) -> PlistResult<()> {
        let mut quote = None;
        let mut brackets = 0usize;
        for (i, c) in rest.char_indices() {
            match (quote, c) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, '"' | '\'') => quote = Some(c),
                (None, '[') => brackets += 1,
                (None, ']') => brackets = brackets.saturating_sub(1),
                (None, '>') if brackets == 0 => {
                    self.pos = at + i + 1;
                    return Ok(());
                }
                _ => {}
            }
        }
        Err(self.error("unterminated DOCTYPE declaration", at))
    }

    /// Skips attributes after a start-tag name. Returns the bytes consumed up
    /// to and including the closing `>` and whether the tag was `/>`.
    fn skip_attributes(&self, body: &str, at: usize, name: &str) -> PlistResult<(usize, bool)> {
        let mut quote = None;
        for (i, c) in body.char_indices() {
            match (quote, c) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, '"' | '\'') => quote = Some(c),
                (None, '<') => break,
                (None, '>') => {
                    let empty = body[..i].trim_end().ends_with('/');
                    return Ok((i + 1, empty));
                }
                _ => {}
            }
        }
        Err(self.error(format!("unterminated start tag <{name}>"), at))
    }
}

fn tag_name(s: &str) -> &str {
    let end = s
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .unwrap_or(s.len());
    &s[..end]
}

struct XmlReader<'a> {
    lexer: Lexer<'a>,
    max_depth: usize,
}

impl<'a> XmlReader<'a> {
    fn error(&self, message: impl Into<String>, at: usize) -> PlistError {
        self.lexer.error(message, at)
    }

    fn unexpected(&self, token: &Token<'_>, expected: &str) -> PlistError {
        self.error(
            format!("expected {expected}, found {}", token.describe()),
            token.at(),
        )
    }

    /// Next token that is not inter-element whitespace.
    fn next_significant(&mut self) -> PlistResult<Token<'a>> {
        loop {
            let token = self.lexer.next_token()?;
            match token {
                Token::Text { raw, .. } if raw.trim().is_empty() => continue,
                Token::Text { at, .. } | Token::CData { at, .. } => {
                    return Err(self.error("unexpected text between elements", at));
                }
                _ => return Ok(token),
            }
        }
    }

    fn expect_end(&mut self, name: &str) -> PlistResult<()> {
        match self.next_significant()? {
            Token::End { name: n, .. } if n == name => Ok(()),
            other => Err(self.unexpected(&other, &format!("</{name}>"))),
        }
    }

    fn read_document(&mut self) -> PlistResult<Value> {
        let value = match self.next_significant()? {
            Token::Start {
                name: "plist",
                empty,
                at,
            } => {
                if empty {
                    return Err(self.error("<plist> contains no value", at));
                }
                let value = match self.next_significant()? {
                    Token::Start { name, empty, at } => self.read_element(name, empty, at, 0)?,
                    Token::End { name: "plist", at } => {
                        return Err(self.error("<plist> contains no value", at));
                    }
                    other => return Err(self.unexpected(&other, "a value element")),
                };
                self.expect_end("plist")?;
                value
            }
            Token::Start { name, empty, at } => self.read_element(name, empty, at, 0)?,
            other => return Err(self.unexpected(&other, "<plist>")),
        };

        match self.next_significant()? {
            Token::Eof { .. } => Ok(value),
            other => Err(self.unexpected(&other, "end of document")),
        }
    }

    fn read_element(&mut self, name: &str, empty: bool, at: usize, depth: usize) -> PlistResult<Value> {
        if depth > self.max_depth {
            return Err(PlistError::NestingTooDeep {
                limit: self.max_depth,
            });
        }
        match name {
            "dict" => self.read_dict(empty, depth),
            "array" => self.read_array(empty, depth),
            "string" => self.read_text(name, empty).map(Value::String),
            "integer" => {
                let text = self.read_text(name, empty)?;
                parse_integer(&text)
                    .map(Value::Integer)
                    .map_err(|e| self.located(e, name, at))
            }
            "real" => {
                let text = self.read_text(name, empty)?;
                text.trim()
                    .parse::<f64>()
                    .map(Value::Real)
                    .map_err(|_| self.error(format!("invalid real {text:?}"), at))
            }
            "true" | "false" => {
                if !empty {
                    self.expect_end(name)?;
                }
                Ok(Value::Boolean(name == "true"))
            }
            "date" => {
                let text = self.read_text(name, empty)?;
                Date::parse_iso8601(&text)
                    .map(Value::Date)
                    .map_err(|e| self.located(e, name, at))
            }
            "data" => {
                let text = self.read_text(name, empty)?;
                let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
                BASE64
                    .decode(compact)
                    .map(Value::Data)
                    .map_err(|e| PlistError::Encoding(format!("invalid base64: {e}")))
                    .map_err(|e| self.located(e, name, at))
            }
            _ => Err(self.error(format!("unknown element <{name}>"), at)),
        }
    }

    /// Attaches the position of element `name` to an error raised while
    /// converting its content.
    fn located(&self, err: PlistError, name: &str, at: usize) -> PlistError {
        let (line, column) = position(self.lexer.src, at);
        let suffix = |message: String| format!("{message} in <{name}> at {line}:{column}");
        match err {
            PlistError::XmlSyntax { message, .. } => self.error(message, at),
            PlistError::InvalidDate(message) => PlistError::InvalidDate(suffix(message)),
            PlistError::Encoding(message) => PlistError::Encoding(suffix(message)),
            PlistError::IntegerOverflow(message) => PlistError::IntegerOverflow(suffix(message)),
            other => other,
        }
    }

    fn read_array(&mut self, empty: bool, depth: usize) -> PlistResult<Value> {
        let mut items = Vec::new();
        if empty {
            return Ok(Value::Array(items));
        }
        loop {
            match self.next_significant()? {
                Token::End { name: "array", .. } => return Ok(Value::Array(items)),
                Token::Start { name, empty, at } => {
                    items.push(self.read_element(name, empty, at, depth + 1)?);
                }
                other => return Err(self.unexpected(&other, "</array>")),
            }
        }
    }

    fn read_dict(&mut self, empty: bool, depth: usize) -> PlistResult<Value> {
        let mut dict = Dictionary::new();
        if empty {
            return Ok(Value::Dictionary(dict));
        }
        loop {
            match self.next_significant()? {
                Token::End { name: "dict", .. } => break,
                Token::Start {
                    name: "key", empty, ..
                } => {
                    let key = self.read_text("key", empty)?;
                    let value = match self.next_significant()? {
                        Token::Start { name, empty, at } if name != "key" => {
                            self.read_element(name, empty, at, depth + 1)?
                        }
                        other => {
                            let (line, column) = position(self.lexer.src, other.at());
                            return Err(PlistError::TypeMismatch(format!(
                                "key {key:?} is followed by {} instead of a value at {line}:{column}",
                                other.describe()
                            )));
                        }
                    };
                    dict.insert(key, value);
                }
                Token::Start { name, at, .. } => {
                    let (line, column) = position(self.lexer.src, at);
                    return Err(PlistError::TypeMismatch(format!(
                        "expected <key> in <dict>, found <{name}> at {line}:{column}"
                    )));
                }
                other => return Err(self.unexpected(&other, "</dict>")),
            }
        }

        if dict.len() == 1 {
            if let Some(&Value::Integer(n)) = dict.get(UID_KEY) {
                if let Ok(uid) = u64::try_from(n) {
                    return Ok(Value::Uid(Uid(uid)));
                }
            }
        }
        Ok(Value::Dictionary(dict))
    }

    /// Collects the character content of a text-only element up to its
    /// closing tag.
    fn read_text(&mut self, name: &str, empty: bool) -> PlistResult<String> {
        let mut out = String::new();
        if empty {
            return Ok(out);
        }
        loop {
            match self.lexer.next_token()? {
                Token::Text { raw, at } => {
                    let text = unescape(raw).map_err(|e| self.error(e.message, at + e.offset))?;
                    out.push_str(&text);
                }
                Token::CData { text, .. } => out.push_str(text),
                Token::End { name: n, .. } if n == name => return Ok(out),
                other => return Err(self.unexpected(&other, &format!("</{name}>"))),
            }
        }
    }
}

/// Parses `<integer>` text: optional sign, decimal or `0x` hexadecimal.
fn parse_integer(text: &str) -> PlistResult<i64> {
    let trimmed = text.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let overflow = || PlistError::IntegerOverflow(format!("{trimmed} does not fit in 64 bits"));
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => u128::from_str_radix(hex, 16),
        None => digits.parse::<u128>(),
    }
    .map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow => overflow(),
        _ => PlistError::xml(format!("invalid integer {text:?}"), 0, 0),
    })?;

    let magnitude = i128::try_from(magnitude).map_err(|_| overflow())?;
    let value = if negative { -magnitude } else { magnitude };
    i64::try_from(value).map_err(|_| overflow())
}

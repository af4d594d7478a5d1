//! XML character escaping and entity expansion.
//!
//! Only the five predefined entities and numeric character references are
//! understood. DTD-declared entities are never expanded.

use std::borrow::Cow;

use crate::error::{PlistError, PlistResult};

/// A failed entity expansion, with the byte offset of the `&` in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityError {
    pub message: String,
    pub offset: usize,
}

/// Escapes text for use as element content. Characters XML 1.0 cannot
/// carry at all, even as references, fail with `Encoding`.
pub fn escape(text: &str) -> PlistResult<Cow<'_, str>> {
    if let Some((at, c)) = text.char_indices().find(|&(_, c)| !is_xml_char(c)) {
        return Err(PlistError::Encoding(format!(
            "U+{:04X} at byte {at} cannot appear in an XML property list",
            u32::from(c)
        )));
    }
    if !text.contains(['&', '<', '>', '\r']) {
        return Ok(Cow::Borrowed(text));
    }
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            // A raw CR would be folded into LF by conforming readers.
            '\r' => out.push_str("&#13;"),
            _ => out.push(c),
        }
    }
    Ok(Cow::Owned(out))
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | ' '..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..)
}

/// Expands entity and character references in raw element text.
pub fn unescape(raw: &str) -> Result<Cow<'_, str>, EntityError> {
    if !raw.contains('&') {
        return Ok(Cow::Borrowed(raw));
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let offset = raw.len() - rest.len() + amp;
        let after = &rest[amp + 1..];
        let semi = after.find(';').ok_or_else(|| EntityError {
            message: "unterminated entity reference".into(),
            offset,
        })?;
        let name = &after[..semi];
        out.push(resolve(name).ok_or_else(|| EntityError {
            message: format!("unknown entity &{name};"),
            offset,
        })?);
        rest = &after[semi + 1..];
    }
    out.push_str(rest);
    Ok(Cow::Owned(out))
}

fn resolve(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse::<u32>().ok()?
            } else {
                return None;
            };
            char::from_u32(code)
        }
    }
}

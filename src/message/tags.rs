//! IRCv3 message tag block handling.
//!
//! The wire form is `key=value;key2=value2` with values escaped as
//! `\:` (semicolon), `\s` (space), `\\` (backslash), `\r` and `\n`.

use std::collections::BTreeMap;
use std::fmt::{Result as FmtResult, Write};

/// Parsed tags. Sorted so that serialization is deterministic.
pub type Tags = BTreeMap<String, String>;

/// Split a raw tag block (without the leading `@`) into a [`Tags`] map.
///
/// Keys without `=` map to an empty value. Empty items are skipped and a
/// repeated key keeps its last value.
pub fn parse_tag_block(block: &str) -> Tags {
    block
        .split(';')
        .filter_map(|item| {
            let (key, value) = item.split_once('=').unwrap_or((item, ""));
            if key.is_empty() {
                None
            } else {
                Some((key.to_string(), unescape_tag_value(value)))
            }
        })
        .collect()
}

/// Write `tags` in wire form, without the leading `@`.
pub fn write_tag_block(f: &mut dyn Write, tags: &Tags) -> FmtResult {
    for (i, (key, value)) in tags.iter().enumerate() {
        if i > 0 {
            f.write_char(';')?;
        }
        f.write_str(key)?;
        if !value.is_empty() {
            f.write_char('=')?;
            escape_tag_value(f, value)?;
        }
    }
    Ok(())
}

/// Escape a tag value for the wire.
pub fn escape_tag_value(f: &mut dyn Write, value: &str) -> FmtResult {
    for c in value.chars() {
        let escaped = match c {
            ';' => "\\:",
            ' ' => "\\s",
            '\\' => "\\\\",
            '\r' => "\\r",
            '\n' => "\\n",
            c => {
                f.write_char(c)?;
                continue;
            }
        };
        f.write_str(escaped)?;
    }
    Ok(())
}

/// Reverse [`escape_tag_value`].
///
/// Unknown escapes keep the escaped character; a lone trailing backslash
/// is dropped.
pub fn unescape_tag_value(value: &str) -> String {
    if !value.contains('\\') {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(':') => out.push(';'),
            Some('s') => out.push(' '),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => break,
        }
    }
    out
}

//! Field annotations: `json:"name,omitempty" yaml:"name"`.

use std::fmt;
use std::str::Chars;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Malformed struct tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TagError {
    #[error("bad syntax for struct tag key")]
    KeySyntax,
    #[error("bad syntax for struct tag pair")]
    PairSyntax,
    #[error("bad syntax for struct tag value")]
    ValueSyntax,
    #[error("tag does not exist")]
    NotExist,
}

/// One `key:"name,opt1,opt2"` pair.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub name: String,
    pub options: Vec<String>,
}

impl Tag {
    /// The value as written: `name` or `name,opt1,opt2`.
    pub fn value(&self) -> String {
        if self.options.is_empty() {
            return self.name.clone();
        }
        format!("{},{}", self.name, self.options.join(","))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:?}", self.key, self.value())
    }
}

/// Every tag of a field, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(Vec<Tag>);

impl Tags {
    /// Parses a raw annotation, with or without its surrounding backquotes.
    ///
    /// # Errors
    ///
    /// Fails on the first malformed key, pair or quoted value.
    pub fn parse(raw: &str) -> Result<Self, TagError> {
        let mut rest = raw
            .strip_prefix('`')
            .and_then(|inner| inner.strip_suffix('`'))
            .unwrap_or(raw);
        let mut tags = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }

            let bytes = rest.as_bytes();
            let end = bytes
                .iter()
                .position(|b| *b <= b' ' || *b == b':' || *b == b'"' || *b == 0x7f)
                .unwrap_or(bytes.len());
            if end == 0 {
                return Err(TagError::KeySyntax);
            }
            if end + 1 >= bytes.len() || bytes[end] != b':' {
                return Err(TagError::PairSyntax);
            }
            if bytes[end + 1] != b'"' {
                return Err(TagError::ValueSyntax);
            }
            let key = &rest[..end];
            rest = &rest[end + 1..];

            let bytes = rest.as_bytes();
            let mut close = 1;
            while close < bytes.len() && bytes[close] != b'"' {
                if bytes[close] == b'\\' {
                    close += 1;
                }
                close += 1;
            }
            if close >= bytes.len() {
                return Err(TagError::ValueSyntax);
            }
            let value = unquote(&rest[..=close]).ok_or(TagError::ValueSyntax)?;
            rest = &rest[close + 1..];

            let mut parts = value.split(',').map(str::to_string);
            let name = parts.next().unwrap_or_default();
            tags.push(Tag {
                key: key.to_string(),
                name,
                options: parts.collect(),
            });
        }
        Ok(Self(tags))
    }

    /// # Errors
    ///
    /// [`TagError::NotExist`] when no tag has this key.
    pub fn get(&self, key: &str) -> Result<&Tag, TagError> {
        self.0
            .iter()
            .find(|tag| tag.key == key)
            .ok_or(TagError::NotExist)
    }

    /// Options of the tag with this key, empty when there is none.
    pub fn options_of(&self, key: &str) -> &[String] {
        self.get(key).map(|tag| tag.options.as_slice()).unwrap_or(&[])
    }

    /// Tags in source order.
    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter()
    }

    /// Number of tags.
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no tags.
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, tag) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{tag}")?;
        }
        Ok(())
    }
}

/// Unquotes a double-quoted literal with the usual escapes.
fn unquote(quoted: &str) -> Option<String> {
    let inner = quoted.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' | '\n' => return None,
            '\\' => out.push(unescape(&mut chars)?),
            c => out.push(c),
        }
    }
    Some(out)
}

fn unescape(chars: &mut Chars<'_>) -> Option<char> {
    let c = match chars.next()? {
        'a' => '\x07',
        'b' => '\x08',
        'f' => '\x0c',
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        'v' => '\x0b',
        '\\' => '\\',
        '"' => '"',
        'x' => return digits(chars, 2, 16),
        'u' => return digits(chars, 4, 16),
        'U' => return digits(chars, 8, 16),
        first @ '0'..='7' => {
            let rest = digits(chars, 2, 8)? as u32;
            let value = first.to_digit(8)? * 64 + rest;
            return if value > 0xff {
                None
            } else {
                char::from_u32(value)
            };
        }
        _ => return None,
    };
    Some(c)
}

fn digits(chars: &mut Chars<'_>, count: usize, radix: u32) -> Option<char> {
    let mut value = 0u32;
    for _ in 0..count {
        value = value.checked_mul(radix)? + chars.next()?.to_digit(radix)?;
    }
    char::from_u32(value)
}

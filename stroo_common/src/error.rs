//! Positioned errors attached to compilation units.

use std::fmt;
use std::sync::Arc;

/// A source position: file, 1-based line and column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pos {
    pub file: Arc<str>,
    pub line: u32,
    pub column: u32,
}

impl Pos {
    /// A position in `file`.
    pub fn new(file: Arc<str>, line: u32, column: u32) -> Self {
        Self { file, line, column }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Where an error was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No position or origin could be determined.
    Unknown,
    /// The front-end failed while listing units.
    List,
    /// The source could not be parsed.
    Parse,
    /// The parsed source did not type-check.
    Type,
}

/// An error owned by one compilation unit.
///
/// Unit errors never abort the load of sibling units; they are collected on
/// the unit and make it (and its importers) ill-typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitError {
    pub pos: Option<Pos>,
    pub msg: String,
    pub kind: ErrorKind,
}

impl UnitError {
    /// An error of `kind`, optionally positioned.
    pub fn new(pos: Option<Pos>, msg: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            pos,
            msg: msg.into(),
            kind,
        }
    }

    /// A syntax error.
    pub fn parse(pos: Pos, msg: impl Into<String>) -> Self {
        Self::new(Some(pos), msg, ErrorKind::Parse)
    }

    /// A type-checking error.
    pub fn typed(pos: Pos, msg: impl Into<String>) -> Self {
        Self::new(Some(pos), msg, ErrorKind::Type)
    }

    /// An error without position or origin.
    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::new(None, msg, ErrorKind::Unknown)
    }
}

impl fmt::Display for UnitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.pos {
            Some(pos) => write!(f, "{pos}: {}", self.msg),
            None => write!(f, "-: {}", self.msg),
        }
    }
}

impl std::error::Error for UnitError {}

//! The contract between the loader and a language front-end.
//!
//! A front-end answers two questions: which units match some patterns (and
//! what they import), and what one unit's syntax and symbols are once its
//! imports are available.

use std::collections::BTreeMap;
use std::sync::Arc;

use stroo_common::UnitError;
use stroo_common::symbols::SymbolTable;
use stroo_common::syntax::SourceFile;

use crate::{FrontendError, ImportError, UnitId};

mod checker;
mod lexer;
mod parser;
mod source;

pub use source::SourceFrontend;

/// Import path of the builtin pseudo-unit that has no sources.
pub const UNSAFE_UNIT: &str = "unsafe";

/// Raw metadata of one unit, before anything is parsed or checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitMeta {
    pub id: UnitId,
    /// Declared package name.
    pub name: String,
    pub import_path: String,
    /// Display paths of the unit's source files.
    pub files: Vec<String>,
    /// Imports keyed by import path.
    pub imports: BTreeMap<String, UnitId>,
    /// The unit has no sources of its own (a precompiled or foreign unit).
    pub external: bool,
}

impl UnitMeta {
    /// Whether this is the `unsafe` pseudo-unit.
    pub fn is_unsafe(&self) -> bool {
        self.import_path == UNSAFE_UNIT
    }
}

/// Answer to [`Frontend::list`].
#[derive(Debug, Clone, Default)]
pub struct Listing {
    /// Units matching the patterns, in pattern order.
    pub roots: Vec<UnitId>,
    /// Every unit reachable from the roots.
    pub units: Vec<UnitMeta>,
}

/// Answer to [`Frontend::typecheck`].
#[derive(Debug, Clone)]
pub struct Checked {
    pub syntax: Vec<Arc<SourceFile>>,
    pub symbols: SymbolTable,
    pub errors: Vec<UnitError>,
}

/// Resolves an import path to the symbol table of an already loaded unit.
pub type Resolver<'a> = dyn Fn(&str) -> Result<Arc<SymbolTable>, ImportError> + Sync + 'a;

/// A language front-end: lists units and type-checks them.
pub trait Frontend: Send + Sync {
    /// Lists the units matching `patterns` and everything they import.
    ///
    /// # Errors
    ///
    /// Fails when the patterns cannot be listed at all; a pattern that matches
    /// nothing is not an error here.
    fn list(&self, patterns: &[String]) -> Result<Listing, FrontendError>;

    /// Parses and type-checks one unit.
    ///
    /// Parse and type errors belong in [`Checked::errors`]. An `Err` is only
    /// returned for faults the unit cannot carry, such as an internal
    /// resolver error.
    ///
    /// # Errors
    ///
    /// See above.
    fn typecheck(&self, meta: &UnitMeta, resolver: &Resolver<'_>)
    -> Result<Checked, FrontendError>;
}

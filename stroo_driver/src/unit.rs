use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use stroo_common::UnitError;
use stroo_common::symbols::SymbolTable;
use stroo_common::syntax::SourceFile;

use crate::UnitId;

/// One loaded package: sources, syntax, symbols and errors.
///
/// Units are immutable once built and shared through `Arc`; imports point at
/// the very same `Arc`s, so the graph is a DAG of shared nodes.
#[derive(Debug)]
pub struct CompilationUnit {
    pub(crate) id: UnitId,
    pub(crate) name: String,
    pub(crate) import_path: String,
    pub(crate) files: Vec<String>,
    pub(crate) imports: BTreeMap<String, Arc<CompilationUnit>>,
    pub(crate) symbols: Arc<SymbolTable>,
    pub(crate) syntax: Vec<Arc<SourceFile>>,
    pub(crate) errors: Vec<UnitError>,
    pub(crate) ill_typed: bool,
}

impl CompilationUnit {
    /// The unit id.
    pub const fn id(&self) -> &UnitId {
        &self.id
    }

    /// Declared package name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The import path.
    pub fn import_path(&self) -> &str {
        &self.import_path
    }

    /// Display paths of the unit's source files.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Imports keyed by import path.
    pub const fn imports(&self) -> &BTreeMap<String, Arc<Self>> {
        &self.imports
    }

    /// The unit's symbol table.
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Syntax trees, empty when types were not needed.
    pub fn syntax(&self) -> &[Arc<SourceFile>] {
        &self.syntax
    }

    /// Errors of this unit, not of its imports.
    pub fn errors(&self) -> &[UnitError] {
        &self.errors
    }

    /// True when this unit or any transitive import has errors.
    pub const fn is_ill_typed(&self) -> bool {
        self.ill_typed
    }

    /// Walks the import graph in post-order, imports sorted by path, each
    /// unit once.
    pub fn visit<F>(self: &Arc<Self>, after: &mut F)
    where
        F: FnMut(&Arc<Self>),
    {
        let mut seen = HashSet::new();
        self.visit_with(after, &mut seen);
    }

    /// Like [`visit`](Self::visit), sharing `seen` across several roots.
    pub fn visit_with<F>(self: &Arc<Self>, after: &mut F, seen: &mut HashSet<UnitId>)
    where
        F: FnMut(&Arc<Self>),
    {
        if !seen.insert(self.id.clone()) {
            return;
        }
        // BTreeMap iteration is already sorted by import path
        for import in self.imports.values() {
            import.visit_with(after, seen);
        }
        after(self);
    }
}

impl fmt::Display for CompilationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.import_path)
    }
}

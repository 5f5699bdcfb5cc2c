//! Resolved symbol tables.
//!
//! A [`SymbolTable`] holds the package-level objects of one unit. Named types
//! carry their underlying shape so consumers can classify a reference without
//! re-walking syntax.

use indexmap::IndexMap;
use lazy_static::lazy_static;

use crate::Pos;
use crate::kinds::BASIC_KINDS;

/// Name and import path of the package owning an object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PackageRef {
    pub name: String,
    pub path: String,
}

impl PackageRef {
    /// A package named `name` at import path `path`.
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// The shape a named type ultimately stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Underlying {
    Basic(String),
    Struct,
    Slice,
    Array,
    Pointer(Box<Underlying>),
    Map,
    Chan,
    Interface,
    Signature,
    /// The type could not be resolved (undefined, opaque import, invalid
    /// recursion).
    Unresolved,
}

/// What a named object is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectKind {
    TypeName { underlying: Underlying, is_alias: bool },
    Var { ty: String },
    Const { ty: String },
    Func { signature: String },
}

/// A package-level object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    pub name: String,
    pub package: PackageRef,
    pub kind: ObjectKind,
    pub pos: Option<Pos>,
}

impl Object {
    /// The underlying shape, for type names.
    pub fn underlying(&self) -> Option<&Underlying> {
        match &self.kind {
            ObjectKind::TypeName { underlying, .. } => Some(underlying),
            _ => None,
        }
    }

    /// Type string of a variable or constant, signature of a function.
    pub fn type_string(&self) -> Option<&str> {
        match &self.kind {
            ObjectKind::Var { ty } | ObjectKind::Const { ty } => Some(ty),
            ObjectKind::Func { signature } => Some(signature),
            ObjectKind::TypeName { .. } => None,
        }
    }

    /// Whether the name starts with an upper-case letter.
    pub fn is_exported(&self) -> bool {
        crate::kinds::is_exported(&self.name)
    }
}

/// Package-level scope of one unit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SymbolTable {
    package: PackageRef,
    complete: bool,
    opaque: bool,
    objects: IndexMap<String, Object>,
}

impl SymbolTable {
    /// An empty, incomplete table. The checker marks it complete when done.
    pub fn new(package: PackageRef) -> Self {
        Self {
            package,
            ..Self::default()
        }
    }

    /// A complete table whose contents are unknown (a unit without sources).
    ///
    /// Qualified lookups into it are trusted rather than reported.
    pub fn opaque(package: PackageRef) -> Self {
        Self {
            package,
            complete: true,
            opaque: true,
            objects: IndexMap::new(),
        }
    }

    /// The package the table belongs to.
    pub const fn package(&self) -> &PackageRef {
        &self.package
    }

    /// Whether every declaration has been checked.
    pub const fn is_complete(&self) -> bool {
        self.complete
    }

    /// Whether the table stands for an external unit whose contents are unknown.
    pub const fn is_opaque(&self) -> bool {
        self.opaque
    }

    /// Marks the table as fully checked.
    pub const fn mark_complete(&mut self) {
        self.complete = true;
    }

    /// Inserts an object, returning the previous one with the same name.
    pub fn insert(&mut self, object: Object) -> Option<Object> {
        self.objects.insert(object.name.clone(), object)
    }

    /// The object declared under `name`.
    pub fn lookup(&self, name: &str) -> Option<&Object> {
        self.objects.get(name)
    }

    /// Looks a name up here, then in the universe scope.
    pub fn resolve(&self, name: &str) -> Option<&Object> {
        self.lookup(name).or_else(|| UNIVERSE.lookup(name))
    }

    /// Objects in declaration order.
    pub fn objects(&self) -> impl Iterator<Item = &Object> {
        self.objects.values()
    }

    /// Number of declared objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

lazy_static! {
    /// Builtin scope: basic kinds, `error` and `any`.
    pub static ref UNIVERSE: SymbolTable = {
        let builtin = PackageRef::default();
        let mut table = SymbolTable::new(builtin.clone());
        for kind in BASIC_KINDS {
            table.insert(Object {
                name: (*kind).to_string(),
                package: builtin.clone(),
                kind: ObjectKind::TypeName {
                    underlying: Underlying::Basic((*kind).to_string()),
                    is_alias: false,
                },
                pos: None,
            });
        }
        for name in ["error", "any"] {
            table.insert(Object {
                name: name.to_string(),
                package: builtin.clone(),
                kind: ObjectKind::TypeName {
                    underlying: Underlying::Interface,
                    is_alias: name == "any",
                },
                pos: None,
            });
        }
        table.mark_complete();
        table
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn universe_knows_error_as_interface() {
        let error = UNIVERSE.lookup("error").map(Object::underlying);
        assert_eq!(error, Some(Some(&Underlying::Interface)));
        assert!(UNIVERSE.is_complete());
    }

    #[test]
    fn local_names_shadow_universe() {
        let pkg = PackageRef::new("p", "p");
        let mut table = SymbolTable::new(pkg.clone());
        table.insert(Object {
            name: "string".into(),
            package: pkg,
            kind: ObjectKind::TypeName {
                underlying: Underlying::Struct,
                is_alias: false,
            },
            pos: None,
        });
        let found = table.resolve("string").and_then(Object::underlying);
        assert_eq!(found, Some(&Underlying::Struct));
        assert!(table.resolve("int").is_some());
        assert!(table.resolve("Missing").is_none());
    }
}

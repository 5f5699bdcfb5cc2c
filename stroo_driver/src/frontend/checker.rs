//! Package-level type checker.
//!
//! Declares every top-level name, resolves the underlying shape of each type
//! name and derives a type string for variables, constants and functions.
//! Expressions are not checked.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::trace;

use stroo_common::symbols::{Object, ObjectKind, PackageRef, SymbolTable, UNIVERSE, Underlying};
use stroo_common::syntax::{
    Decl, FuncDecl, FuncType, Ident, InterfaceElem, SourceFile, TypeExpr, TypeSpec, ValueInit,
    ValueSpec,
};
use stroo_common::{Pos, UnitError};

use super::{Resolver, UnitMeta};
use crate::ImportError;

/// Type string of a value whose initializer is not a literal.
pub(crate) const INFERRED: &str = "unknown";

#[derive(Clone, Copy)]
enum Local<'a> {
    Type {
        file: usize,
        spec: &'a TypeSpec,
    },
    Func {
        file: usize,
        decl: &'a FuncDecl,
    },
    Value {
        file: usize,
        spec: &'a ValueSpec,
        index: usize,
        is_const: bool,
    },
}

enum State {
    Resolving,
    Done(Underlying),
}

/// Qualifier bound by an import: `None` when the import failed.
type Qualifiers = HashMap<String, Option<Arc<SymbolTable>>>;

struct Checker<'a> {
    package: PackageRef,
    files: &'a [Arc<SourceFile>],
    qualifiers: Vec<Qualifiers>,
    dot_imports: Vec<bool>,
    locals: IndexMap<String, Local<'a>>,
    types: HashMap<String, State>,
    values: HashMap<String, String>,
    values_busy: HashSet<String>,
    errors: Vec<UnitError>,
    reported: HashSet<(Pos, String)>,
}

/// Checks the parsed files of one unit.
///
/// Import failures become errors on the unit, except internal resolver
/// faults which are returned as is.
pub(crate) fn check(
    meta: &UnitMeta,
    files: &[Arc<SourceFile>],
    resolver: &Resolver<'_>,
) -> Result<(SymbolTable, Vec<UnitError>), ImportError> {
    let mut checker = Checker {
        package: PackageRef::new(meta.name.clone(), meta.import_path.clone()),
        files,
        qualifiers: Vec::with_capacity(files.len()),
        dot_imports: Vec::with_capacity(files.len()),
        locals: IndexMap::new(),
        types: HashMap::new(),
        values: HashMap::new(),
        values_busy: HashSet::new(),
        errors: Vec::new(),
        reported: HashSet::new(),
    };
    checker.bind_imports(resolver)?;
    checker.declare();
    let table = checker.resolve();
    trace!(
        "checked {}: {} objects, {} errors",
        meta.import_path,
        table.len(),
        checker.errors.len()
    );
    Ok((table, checker.errors))
}

fn last_segment(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

impl<'a> Checker<'a> {
    fn error(&mut self, pos: Pos, msg: String) {
        if self.reported.insert((pos.clone(), msg.clone())) {
            self.errors.push(UnitError::typed(pos, msg));
        }
    }

    fn bind_imports(&mut self, resolver: &Resolver<'_>) -> Result<(), ImportError> {
        let files = self.files;
        for file in files {
            let mut qualifiers = Qualifiers::new();
            let mut dot = false;
            for spec in &file.imports {
                let table = match resolver(&spec.path) {
                    Ok(table) => Some(table),
                    Err(err) if err.is_internal() => return Err(err),
                    Err(err) => {
                        self.error(
                            spec.pos.clone(),
                            format!("could not import {} ({err})", spec.path),
                        );
                        None
                    }
                };
                match spec.alias.as_deref() {
                    Some("_") => {}
                    Some(".") => dot = true,
                    Some(alias) => {
                        qualifiers.insert(alias.to_string(), table);
                    }
                    None => {
                        let name = table
                            .as_ref()
                            .map_or_else(|| last_segment(&spec.path), |t| t.package().name.clone());
                        qualifiers.insert(name, table);
                    }
                }
            }
            self.qualifiers.push(qualifiers);
            self.dot_imports.push(dot);
        }
        Ok(())
    }

    fn declare_name(&mut self, ident: &Ident, local: Local<'a>) {
        if ident.name == "_" {
            return;
        }
        if self.locals.contains_key(&ident.name) {
            self.error(
                ident.pos.clone(),
                format!("{} redeclared in this block", ident.name),
            );
            return;
        }
        self.locals.insert(ident.name.clone(), local);
    }

    fn declare(&mut self) {
        let files = self.files;
        for (file, source) in files.iter().enumerate() {
            for decl in &source.decls {
                match decl {
                    Decl::Type(spec) => self.declare_name(&spec.name, Local::Type { file, spec }),
                    Decl::Func(func) if func.recv.is_none() && func.name.name != "init" => {
                        self.declare_name(&func.name, Local::Func { file, decl: func });
                    }
                    Decl::Func(_) => {}
                    Decl::Var(spec) | Decl::Const(spec) => {
                        let is_const = matches!(decl, Decl::Const(_));
                        for (index, name) in spec.names.iter().enumerate() {
                            let local = Local::Value {
                                file,
                                spec,
                                index,
                                is_const,
                            };
                            self.declare_name(name, local);
                        }
                    }
                }
            }
        }
    }

    /// Resolves every declared name and builds the table in declaration
    /// order.
    fn resolve(&mut self) -> SymbolTable {
        let locals: Vec<(String, Local<'a>)> = self
            .locals
            .iter()
            .map(|(name, local)| (name.clone(), *local))
            .collect();
        let mut table = SymbolTable::new(self.package.clone());
        for (name, local) in locals {
            let (kind, pos) = match local {
                Local::Type { spec, .. } => {
                    let underlying = self.named(&spec.name, false);
                    let kind = ObjectKind::TypeName {
                        underlying,
                        is_alias: spec.is_alias,
                    };
                    (kind, spec.name.pos.clone())
                }
                Local::Func { file, decl } => {
                    self.signature(&decl.ty, file);
                    let kind = ObjectKind::Func {
                        signature: decl.ty.to_string(),
                    };
                    (kind, decl.name.pos.clone())
                }
                Local::Value {
                    spec,
                    index,
                    is_const,
                    ..
                } => {
                    let ty = self.value_type(&name);
                    let kind = if is_const {
                        ObjectKind::Const { ty }
                    } else {
                        ObjectKind::Var { ty }
                    };
                    (kind, spec.names[index].pos.clone())
                }
            };
            table.insert(Object {
                name,
                package: self.package.clone(),
                kind,
                pos: Some(pos),
            });
        }
        self.check_methods();
        table.mark_complete();
        table
    }

    fn check_methods(&mut self) {
        let files = self.files;
        for (file, source) in files.iter().enumerate() {
            for decl in &source.decls {
                let Decl::Func(func) = decl else {
                    continue;
                };
                if let Some(recv) = &func.recv {
                    let base = match &recv.ty {
                        TypeExpr::Pointer(inner) => inner.as_ref(),
                        other => other,
                    };
                    self.resolve_expr(base, file, true);
                }
                if func.recv.is_some() || func.name.name == "init" {
                    self.signature(&func.ty, file);
                }
            }
        }
    }

    fn signature(&mut self, ty: &FuncType, file: usize) {
        for param in ty.params.iter().chain(&ty.results) {
            self.resolve_expr(&param.ty, file, true);
        }
    }

    /// Underlying shape of `expr`. `indirect` is set below a pointer, slice,
    /// map, channel or signature, where a type may refer to itself.
    fn resolve_expr(&mut self, expr: &TypeExpr, file: usize, indirect: bool) -> Underlying {
        match expr {
            TypeExpr::Ident(ident) => self.resolve_ident(ident, file, indirect),
            TypeExpr::Selector { package, name } => self.resolve_qualified(package, name, file),
            TypeExpr::Pointer(inner) => {
                Underlying::Pointer(Box::new(self.resolve_expr(inner, file, true)))
            }
            TypeExpr::Slice(elem) => {
                self.resolve_expr(elem, file, true);
                Underlying::Slice
            }
            TypeExpr::Array { elem, .. } => {
                self.resolve_expr(elem, file, indirect);
                Underlying::Array
            }
            TypeExpr::Map { key, value } => {
                self.resolve_expr(key, file, true);
                self.resolve_expr(value, file, true);
                Underlying::Map
            }
            TypeExpr::Chan { elem, .. } => {
                self.resolve_expr(elem, file, true);
                Underlying::Chan
            }
            TypeExpr::Struct(st) => {
                for field in &st.fields {
                    self.resolve_expr(&field.ty, file, indirect);
                }
                Underlying::Struct
            }
            TypeExpr::Interface(iface) => {
                for elem in &iface.elems {
                    match elem {
                        InterfaceElem::Method { ty, .. } => self.signature(ty, file),
                        InterfaceElem::Embedded(ty) => {
                            self.resolve_expr(ty, file, true);
                        }
                    }
                }
                Underlying::Interface
            }
            TypeExpr::Func(ty) => {
                self.signature(ty, file);
                Underlying::Signature
            }
        }
    }

    fn resolve_ident(&mut self, ident: &Ident, file: usize, indirect: bool) -> Underlying {
        match self.locals.get(&ident.name).copied() {
            Some(Local::Type { .. }) => self.named(ident, indirect),
            Some(_) => {
                self.error(ident.pos.clone(), format!("{} is not a type", ident.name));
                Underlying::Unresolved
            }
            None => {
                if let Some(underlying) = UNIVERSE.lookup(&ident.name).and_then(Object::underlying)
                {
                    return underlying.clone();
                }
                if !self.dot_imports[file] {
                    self.error(ident.pos.clone(), format!("undefined: {}", ident.name));
                }
                Underlying::Unresolved
            }
        }
    }

    fn resolve_qualified(&mut self, package: &Ident, name: &Ident, file: usize) -> Underlying {
        let bound = self.qualifiers[file].get(&package.name).cloned();
        match bound {
            None => {
                self.error(package.pos.clone(), format!("undefined: {}", package.name));
                Underlying::Unresolved
            }
            Some(None) => Underlying::Unresolved,
            Some(Some(table)) if table.is_opaque() => Underlying::Unresolved,
            Some(Some(table)) => match table.lookup(&name.name) {
                Some(object) => match object.underlying() {
                    Some(underlying) => underlying.clone(),
                    None => {
                        self.error(
                            name.pos.clone(),
                            format!("{}.{} is not a type", package.name, name.name),
                        );
                        Underlying::Unresolved
                    }
                },
                None => {
                    self.error(
                        name.pos.clone(),
                        format!("undefined: {}.{}", package.name, name.name),
                    );
                    Underlying::Unresolved
                }
            },
        }
    }

    /// Underlying shape of a local type name, resolved once.
    fn named(&mut self, ident: &Ident, indirect: bool) -> Underlying {
        match self.types.get(&ident.name) {
            Some(State::Done(underlying)) => return underlying.clone(),
            Some(State::Resolving) => {
                if !indirect {
                    self.error(
                        ident.pos.clone(),
                        format!("invalid recursive type {}", ident.name),
                    );
                }
                return Underlying::Unresolved;
            }
            None => {}
        }
        let Some(Local::Type { file, spec }) = self.locals.get(&ident.name).copied() else {
            return Underlying::Unresolved;
        };
        self.types.insert(ident.name.clone(), State::Resolving);
        let underlying = self.resolve_expr(&spec.ty, file, false);
        self.types
            .insert(ident.name.clone(), State::Done(underlying.clone()));
        underlying
    }

    fn value_type(&mut self, name: &str) -> String {
        if let Some(ty) = self.values.get(name) {
            return ty.clone();
        }
        let Some(Local::Value {
            file,
            spec,
            index,
            is_const,
        }) = self.locals.get(name).copied()
        else {
            return INFERRED.to_string();
        };
        if !self.values_busy.insert(name.to_string()) {
            return INFERRED.to_string();
        }
        let ty = if let Some(declared) = &spec.ty {
            self.resolve_expr(declared, file, true);
            declared.to_string()
        } else if spec.values.len() == spec.names.len() {
            self.init_type(&spec.values[index], file, is_const)
        } else {
            INFERRED.to_string()
        };
        self.values_busy.remove(name);
        self.values.insert(name.to_string(), ty.clone());
        ty
    }

    fn init_type(&mut self, init: &ValueInit, file: usize, is_const: bool) -> String {
        let literal = |kind: &str, default: &str| {
            if is_const {
                format!("untyped {kind}")
            } else {
                default.to_string()
            }
        };
        match init {
            ValueInit::Int => literal("int", "int"),
            ValueInit::Float => literal("float", "float64"),
            ValueInit::Imag => literal("complex", "complex128"),
            ValueInit::Char => literal("rune", "rune"),
            ValueInit::String => literal("string", "string"),
            ValueInit::Bool => literal("bool", "bool"),
            ValueInit::Composite(ty) => {
                self.resolve_expr(ty, file, true);
                ty.to_string()
            }
            ValueInit::AddressOf(ty) => {
                self.resolve_expr(ty, file, true);
                format!("*{ty}")
            }
            ValueInit::Name(name) if name == "iota" => literal("int", "int"),
            ValueInit::Name(name) if name == "nil" => "untyped nil".to_string(),
            ValueInit::Name(name) => match self.locals.get(name).copied() {
                Some(Local::Value { .. }) => self.value_type(name),
                Some(Local::Func { decl, .. }) => decl.ty.to_string(),
                Some(Local::Type { .. }) | None => INFERRED.to_string(),
            },
            ValueInit::Other => INFERRED.to_string(),
        }
    }
}

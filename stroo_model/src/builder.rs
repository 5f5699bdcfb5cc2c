//! Walks a unit's declarations into a [`PackageModel`].
//!
//! Building happens in two phases. The first reads every top-level
//! declaration in source order; the second attaches methods to their
//! receivers and links kinds to local declarations by name, so a method or
//! field may refer to a type declared later in the unit.

use std::collections::HashMap;

use stroo_common::kinds;
use stroo_common::symbols::{Object, SymbolTable, UNIVERSE, Underlying};
use stroo_common::syntax::{
    Decl, FieldDecl, FuncDecl, Ident, InterfaceElem, StructType, TypeExpr, TypeSpec, ValueSpec,
};
use stroo_driver::CompilationUnit;
use tracing::{debug, trace, warn};

use crate::{
    Declaration, Field, Function, Import, Interface, ModelError, PackageModel, Tags, Variable,
};

/// Type string of a value whose type could not be determined.
const UNKNOWN_TYPE: &str = "unknown";

/// Builds the model of `unit`.
///
/// # Errors
///
/// Fails on a declaration shape the model does not represent, on a malformed
/// field tag, and on units without sources.
pub fn build(unit: &CompilationUnit) -> Result<PackageModel, ModelError> {
    if unit.files().is_empty() {
        return Err(ModelError::NoSyntax(unit.import_path().to_string()));
    }
    debug!("Building model for {}", unit.import_path());

    let imports = unit
        .imports()
        .values()
        .map(|import| Import {
            name: import.name().to_string(),
            path: import.import_path().to_string(),
        })
        .collect();
    let mut builder = Builder {
        symbols: unit.symbols(),
        qualifiers: unit
            .imports()
            .values()
            .map(|import| (import.name().to_string(), import.import_path().to_string()))
            .collect(),
        model: PackageModel {
            name: unit.name().to_string(),
            path: unit.import_path().to_string(),
            imports,
            ..PackageModel::default()
        },
        functions: Vec::new(),
    };

    for file in unit.syntax() {
        trace!("Reading {}", file.path);
        for decl in &file.decls {
            builder.read_decl(decl)?;
        }
    }
    builder.attach_methods();
    builder.link_references();

    let model = builder.model;
    debug!(
        "Model of {}: {} declarations, {} functions, {} variables, {} problems",
        model.path,
        model.declarations.len(),
        model.functions.len(),
        model.variables.len(),
        model.problems.len()
    );
    Ok(model)
}

struct Builder<'u> {
    symbols: &'u SymbolTable,
    /// Import name to import path.
    qualifiers: HashMap<String, String>,
    model: PackageModel,
    /// Every function, until methods are attached.
    functions: Vec<Function>,
}

impl Builder<'_> {
    fn read_decl(&mut self, decl: &Decl) -> Result<(), ModelError> {
        match decl {
            Decl::Type(spec) => self.read_type(spec),
            Decl::Func(func) => {
                let function = self.read_function(func);
                self.functions.push(function);
                Ok(())
            }
            Decl::Var(spec) => {
                self.read_values(spec, false);
                Ok(())
            }
            Decl::Const(spec) => {
                self.read_values(spec, true);
                Ok(())
            }
        }
    }

    fn declaration(&self, spec: &TypeSpec) -> Declaration {
        Declaration {
            name: spec.name.name.clone(),
            package: self.model.name.clone(),
            package_path: self.model.path.clone(),
            is_alias: spec.is_alias,
            comment: spec.doc.clone(),
            ..Declaration::default()
        }
    }

    fn read_type(&mut self, spec: &TypeSpec) -> Result<(), ModelError> {
        let name = spec.name.name.as_str();
        let mut decl = self.declaration(spec);
        match &spec.ty {
            TypeExpr::Struct(st) => {
                trace!("{}: reading struct", name);
                decl.kind = name.to_string();
                decl.is_struct = true;
                decl.fields = self.read_fields(name, st)?;
            }
            TypeExpr::Slice(elem) | TypeExpr::Array { elem, .. } => {
                trace!("{}: reading array of {}", name, elem);
                decl.is_array = true;
                self.read_array_element(&mut decl, elem)?;
            }
            TypeExpr::Interface(it) => {
                decl.kind = name.to_string();
                decl.is_interface = true;
                self.model.interfaces.push(Interface {
                    name: name.to_string(),
                    package: self.model.name.clone(),
                    package_path: self.model.path.clone(),
                    methods: it
                        .elems
                        .iter()
                        .filter_map(|elem| match elem {
                            InterfaceElem::Method { name, .. } => Some(name.name.clone()),
                            InterfaceElem::Embedded(_) => None,
                        })
                        .collect(),
                    comment: spec.doc.clone(),
                });
            }
            TypeExpr::Func(ty) => {
                decl.is_func = true;
                decl.kind = ty.to_string();
            }
            TypeExpr::Map { .. } => {
                decl.is_map = true;
                decl.kind = spec.ty.to_string();
            }
            TypeExpr::Chan { .. } => {
                decl.is_chan = true;
                decl.kind = spec.ty.to_string();
            }
            TypeExpr::Ident(_) | TypeExpr::Selector { .. } | TypeExpr::Pointer(_) => {
                self.read_alias(&mut decl, &spec.ty)?;
            }
        }
        self.model.declarations.push(decl);
        Ok(())
    }

    /// `type T []V`, `type T []*V`, `type T []pkg.V`, `type T []*pkg.V`.
    fn read_array_element(
        &self,
        decl: &mut Declaration,
        elem: &TypeExpr,
    ) -> Result<(), ModelError> {
        let target = match elem {
            TypeExpr::Pointer(inner) => {
                decl.is_pointer = true;
                inner.as_ref()
            }
            other => other,
        };
        match target {
            TypeExpr::Ident(ident) => decl.kind = ident.name.clone(),
            TypeExpr::Selector { package, name } => {
                decl.is_imported = true;
                decl.kind = format!("{}.{}", package.name, name.name);
            }
            // the pointer itself is what cannot be represented
            _ => return Err(ModelError::not_implemented(elem.shape(), &decl.name)),
        }
        Ok(())
    }

    /// `type T = V`, `type T V`, `type T *V`, `type T pkg.V`.
    fn read_alias(&self, decl: &mut Declaration, ty: &TypeExpr) -> Result<(), ModelError> {
        decl.is_alias = true;
        let target = match ty {
            TypeExpr::Pointer(inner) => {
                decl.is_pointer = true;
                inner.as_ref()
            }
            other => other,
        };
        match target {
            TypeExpr::Ident(ident) => {
                decl.kind = ident.name.clone();
                let underlying = self.symbols.resolve(&ident.name).and_then(Object::underlying);
                decl.is_array = matches!(underlying, Some(Underlying::Slice | Underlying::Array));
            }
            TypeExpr::Selector { package, name } => {
                decl.is_imported = true;
                decl.kind = name.name.clone();
                decl.package = package.name.clone();
                decl.package_path = self
                    .qualifiers
                    .get(&package.name)
                    .cloned()
                    .unwrap_or_default();
            }
            _ => return Err(ModelError::not_implemented(ty.shape(), &decl.name)),
        }
        Ok(())
    }

    fn read_fields(&self, decl: &str, st: &StructType) -> Result<Vec<Field>, ModelError> {
        let mut fields = Vec::with_capacity(st.fields.len());
        for field_decl in &st.fields {
            let mut field = Field {
                comment: field_decl.comment.clone(),
                ..Field::default()
            };
            let Some(first) = field_decl.names.first() else {
                // embedded
                field.is_embedded = true;
                field.is_exported = true;
                match &field_decl.ty {
                    TypeExpr::Ident(_) | TypeExpr::Selector { .. } | TypeExpr::Pointer(_) => {
                        self.read_named_kind(decl, &mut field, &field_decl.ty)?;
                    }
                    other => return Err(ModelError::not_implemented(other.shape(), decl)),
                }
                field.name = field.kind.clone();
                field.tags = parse_tags(field_decl, &field.name)?;
                trace!("{}: embedded field {}", decl, field.name);
                fields.push(field);
                continue;
            };

            self.read_field_type(decl, &mut field, &field_decl.ty)?;
            field.tags = parse_tags(field_decl, &first.name)?;
            for name in &field_decl.names {
                trace!("{}: field {} {}", decl, name.name, field_decl.ty);
                fields.push(Field {
                    name: name.name.clone(),
                    is_exported: name.is_exported(),
                    ..field.clone()
                });
            }
        }
        Ok(fields)
    }

    fn read_field_type(
        &self,
        decl: &str,
        field: &mut Field,
        ty: &TypeExpr,
    ) -> Result<(), ModelError> {
        match ty {
            TypeExpr::Ident(_) | TypeExpr::Selector { .. } | TypeExpr::Pointer(_) => {
                self.read_named_kind(decl, field, ty)
            }
            TypeExpr::Slice(elem) | TypeExpr::Array { elem, .. } => {
                field.is_array = true;
                self.read_element(field, elem);
                Ok(())
            }
            TypeExpr::Map { .. } => {
                field.is_map = true;
                field.kind = ty.to_string();
                Ok(())
            }
            TypeExpr::Chan { .. } => {
                field.is_chan = true;
                field.kind = ty.to_string();
                Ok(())
            }
            TypeExpr::Func(_) => {
                field.is_func = true;
                field.kind = ty.to_string();
                Ok(())
            }
            TypeExpr::Interface(_) => {
                field.is_interface = true;
                field.kind = ty.to_string();
                Ok(())
            }
            TypeExpr::Struct(_) => Err(ModelError::not_implemented(ty.shape(), decl)),
        }
    }

    /// An identifier, a selector, or a pointer to either.
    fn read_named_kind(
        &self,
        decl: &str,
        field: &mut Field,
        ty: &TypeExpr,
    ) -> Result<(), ModelError> {
        match ty {
            TypeExpr::Ident(ident) => self.read_ident(decl, field, ident),
            TypeExpr::Selector { package, name } => {
                read_selector(field, package, name);
                Ok(())
            }
            TypeExpr::Pointer(inner) => {
                field.is_pointer = true;
                match inner.as_ref() {
                    TypeExpr::Ident(ident) => self.read_ident(decl, field, ident),
                    TypeExpr::Selector { package, name } => {
                        read_selector(field, package, name);
                        Ok(())
                    }
                    _ => Err(ModelError::not_implemented(ty.shape(), decl)),
                }
            }
            other => Err(ModelError::not_implemented(other.shape(), decl)),
        }
    }

    /// Classifies a local or builtin kind by its underlying shape.
    fn read_ident(&self, decl: &str, field: &mut Field, ident: &Ident) -> Result<(), ModelError> {
        field.kind = ident.name.clone();
        if kinds::is_basic(&ident.name) {
            field.is_basic = true;
            return Ok(());
        }
        let Some(underlying) = self.symbols.resolve(&ident.name).and_then(Object::underlying)
        else {
            trace!("{}: {} does not name a type", decl, ident.name);
            return Ok(());
        };
        match underlying {
            Underlying::Pointer(inner) => {
                field.is_pointer = true;
                match inner.as_ref() {
                    Underlying::Struct => field.is_struct = true,
                    Underlying::Slice | Underlying::Array => field.is_array = true,
                    Underlying::Interface => field.is_interface = true,
                    Underlying::Unresolved => {}
                    other => {
                        return Err(ModelError::not_implemented(
                            format!("Pointer to {}", shape_name(other)),
                            decl,
                        ));
                    }
                }
            }
            Underlying::Struct => field.is_struct = true,
            Underlying::Slice | Underlying::Array => field.is_array = true,
            Underlying::Interface => field.is_interface = true,
            Underlying::Unresolved => trace!("{}: {} is unresolved", decl, ident.name),
            other => return Err(ModelError::not_implemented(shape_name(other), decl)),
        }
        Ok(())
    }

    /// Element of a slice or array field. Elements other than named kinds
    /// leave only `is_array` set.
    fn read_element(&self, field: &mut Field, elem: &TypeExpr) {
        let target = match elem {
            TypeExpr::Pointer(inner)
                if matches!(inner.as_ref(), TypeExpr::Ident(_) | TypeExpr::Selector { .. }) =>
            {
                field.is_pointer = true;
                inner.as_ref()
            }
            other => other,
        };
        match target {
            TypeExpr::Ident(ident) => {
                field.kind = ident.name.clone();
                if kinds::is_basic(&ident.name) {
                    field.is_basic = true;
                    return;
                }
                match self.symbols.resolve(&ident.name).and_then(Object::underlying) {
                    Some(Underlying::Struct) => field.is_struct = true,
                    Some(Underlying::Interface) => field.is_interface = true,
                    _ => {}
                }
            }
            TypeExpr::Selector { package, name } => read_selector(field, package, name),
            other => field.kind = other.to_string(),
        }
    }

    fn read_function(&self, func: &FuncDecl) -> Function {
        let (receiver_name, receiver_type, is_method_receiver) = func
            .recv
            .as_ref()
            .map(|recv| {
                (
                    recv.name.clone().unwrap_or_default(),
                    recv.type_name(),
                    recv.is_pointer(),
                )
            })
            .unwrap_or_default();
        Function {
            name: func.name.name.clone(),
            package: self.model.name.clone(),
            package_path: self.model.path.clone(),
            receiver_name,
            receiver_type,
            is_method_receiver,
            is_exported: func.name.is_exported(),
            signature: func.ty.to_string(),
            comment: func.doc.clone(),
        }
    }

    fn read_values(&mut self, spec: &ValueSpec, is_const: bool) {
        for name in spec.names.iter().filter(|name| name.name != "_") {
            let ty = self
                .symbols
                .lookup(&name.name)
                .and_then(Object::type_string)
                .map(str::to_string)
                .or_else(|| spec.ty.as_ref().map(ToString::to_string))
                .unwrap_or_else(|| UNKNOWN_TYPE.to_string());
            self.model.variables.push(Variable {
                name: name.name.clone(),
                ty,
                is_const,
            });
        }
    }

    /// Second phase: methods go to their struct or array receiver, the rest
    /// stay free functions.
    fn attach_methods(&mut self) {
        for function in std::mem::take(&mut self.functions) {
            if function.is_method() {
                let owner = self.model.declarations.iter_mut().find(|decl| {
                    decl.name == function.receiver_type && (decl.is_struct || decl.is_array)
                });
                if let Some(owner) = owner {
                    trace!("Attaching {} to {}", function.name, owner.name);
                    owner.methods.push(function);
                    continue;
                }
            }
            self.model.functions.push(function);
        }
    }

    /// Second phase: kinds naming local declarations get their reference.
    fn link_references(&mut self) {
        let local: HashMap<String, usize> = self
            .model
            .declarations
            .iter()
            .enumerate()
            .map(|(index, decl)| (decl.name.clone(), index))
            .collect();
        let mut problems = Vec::new();

        for decl in &mut self.model.declarations {
            if !(decl.is_array || decl.is_alias) || decl.is_imported {
                continue;
            }
            match link(&decl.kind, &local) {
                Link::Local => decl.reference = Some(decl.kind.clone()),
                Link::Missing => problems.push(format!(
                    "{}: unresolved reference to {}",
                    decl.name, decl.kind
                )),
                Link::None => {}
            }
        }

        // arrays of structs are referenced through to their element
        let elements: HashMap<String, String> = self
            .model
            .declarations
            .iter()
            .filter(|decl| decl.is_array)
            .filter_map(|decl| {
                let element = decl.reference.as_ref()?;
                let target = &self.model.declarations[*local.get(element)?];
                target
                    .is_struct
                    .then(|| (decl.name.clone(), element.clone()))
            })
            .collect();

        for decl in &mut self.model.declarations {
            for field in &mut decl.fields {
                if field.is_basic || field.is_imported {
                    continue;
                }
                match link(&field.kind, &local) {
                    Link::Local => {
                        if let Some(element) = elements.get(&field.kind) {
                            field.is_array = true;
                            field.reference = Some(element.clone());
                        } else {
                            field.reference = Some(field.kind.clone());
                        }
                    }
                    Link::Missing => problems.push(format!(
                        "{}.{}: unresolved reference to {}",
                        decl.name, field.name, field.kind
                    )),
                    Link::None => {}
                }
            }
        }

        for problem in &problems {
            warn!("{}: {}", self.model.path, problem);
        }
        self.model.problems.extend(problems);
    }
}

enum Link {
    Local,
    Missing,
    /// Builtin or structural kinds never refer to a declaration.
    None,
}

fn link(kind: &str, local: &HashMap<String, usize>) -> Link {
    if local.contains_key(kind) {
        return Link::Local;
    }
    let is_name = kind.chars().next().is_some_and(|c| c == '_' || c.is_alphabetic())
        && kind.chars().all(|c| c == '_' || c.is_alphanumeric());
    if !is_name || kinds::is_basic(kind) || UNIVERSE.lookup(kind).is_some() {
        return Link::None;
    }
    Link::Missing
}

fn read_selector(field: &mut Field, package: &Ident, name: &Ident) {
    field.is_imported = true;
    field.package = package.name.clone();
    field.kind = name.name.clone();
}

fn parse_tags(field_decl: &FieldDecl, field: &str) -> Result<Tags, ModelError> {
    match &field_decl.tag {
        Some(raw) => Tags::parse(raw).map_err(|err| ModelError::tag(err, field, raw)),
        None => Ok(Tags::default()),
    }
}

/// Name of a resolved shape, for "not implemented" errors.
const fn shape_name(underlying: &Underlying) -> &'static str {
    match underlying {
        Underlying::Basic(_) => "Basic",
        Underlying::Struct => "Struct",
        Underlying::Slice => "Slice",
        Underlying::Array => "Array",
        Underlying::Pointer(_) => "Pointer",
        Underlying::Map => "Map",
        Underlying::Chan => "Chan",
        Underlying::Interface => "Interface",
        Underlying::Signature => "Signature",
        Underlying::Unresolved => "Unresolved",
    }
}

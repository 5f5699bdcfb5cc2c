use serde::{Deserialize, Serialize};

use crate::{Declaration, sort_by_name};

/// One import of the unit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Import {
    pub name: String,
    pub path: String,
}

/// A function or method.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub package: String,
    pub package_path: String,
    /// Empty for free functions.
    pub receiver_name: String,
    /// Receiver type with the pointer star stripped.
    pub receiver_type: String,
    /// The receiver is a pointer.
    pub is_method_receiver: bool,
    pub is_exported: bool,
    pub signature: String,
    pub comment: Option<String>,
}

impl Function {
    /// Whether the function has a receiver.
    pub fn is_method(&self) -> bool {
        !self.receiver_type.is_empty()
    }

    /// Name, then signature.
    pub fn sort_key(&self) -> (&str, &str) {
        (&self.name, &self.signature)
    }
}

/// An interface declaration with its method names.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Interface {
    pub name: String,
    pub package: String,
    pub package_path: String,
    pub methods: Vec<String>,
    pub comment: Option<String>,
}

/// A package-level variable or constant.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub is_const: bool,
}

impl Variable {
    /// Name, then type.
    pub fn sort_key(&self) -> (&str, &str) {
        (&self.name, &self.ty)
    }
}

/// The declaration model of one unit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PackageModel {
    pub name: String,
    pub path: String,
    pub imports: Vec<Import>,
    /// Named types, in source order.
    pub declarations: Vec<Declaration>,
    /// Functions without a local struct or array receiver.
    pub functions: Vec<Function>,
    pub interfaces: Vec<Interface>,
    pub variables: Vec<Variable>,
    /// References that could not be resolved while building.
    pub problems: Vec<String>,
}

impl PackageModel {
    /// Finds a declaration by name, then by kind.
    ///
    /// Arrays and aliases carry their element's kind, so an exact name wins
    /// over a declaration that merely refers to `name`.
    pub fn extract(&self, name: &str) -> Option<&Declaration> {
        self.declaration(name)
            .or_else(|| self.declarations.iter().find(|decl| decl.kind == name))
    }

    /// The declaration with exactly this name.
    pub fn declaration(&self, name: &str) -> Option<&Declaration> {
        self.declarations.iter().find(|decl| decl.name == name)
    }

    /// Follows a stored reference to its declaration.
    pub fn resolve(&self, reference: Option<&str>) -> Option<&Declaration> {
        reference.and_then(|name| self.declaration(name))
    }

    /// The interface called `name`.
    pub fn interface(&self, name: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|iface| iface.name == name)
    }

    /// Sorts every list of the model by name, kind as fallback.
    pub fn sort(&mut self) {
        sort_by_name(&mut self.declarations, Declaration::sort_key);
        for decl in &mut self.declarations {
            sort_by_name(&mut decl.fields, crate::Field::sort_key);
            sort_by_name(&mut decl.methods, Function::sort_key);
        }
        sort_by_name(&mut self.functions, Function::sort_key);
        sort_by_name(&mut self.variables, Variable::sort_key);
    }
}

//! Syntax tree of one source file, as produced by a front-end.
//!
//! The tree covers declarations only: function bodies and initializer
//! expressions are not represented beyond what the model needs (the literal
//! kind of a value, the type of a composite literal).

use std::fmt;
use std::sync::Arc;

use crate::Pos;

/// An identifier and where it appeared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub pos: Pos,
}

impl Ident {
    /// An identifier at `pos`.
    pub fn new(name: impl Into<String>, pos: Pos) -> Self {
        Self {
            name: name.into(),
            pos,
        }
    }

    /// Whether the name starts with an upper-case letter.
    pub fn is_exported(&self) -> bool {
        crate::kinds::is_exported(&self.name)
    }
}

/// One parsed file.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    /// Display path of the file.
    pub path: Arc<str>,
    pub package: Ident,
    pub imports: Vec<ImportSpec>,
    pub decls: Vec<Decl>,
}

/// One import of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpec {
    /// Explicit qualifier (`name`, `.` or `_`), if any.
    pub alias: Option<String>,
    pub path: String,
    pub pos: Pos,
}

/// A top-level declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Type(TypeSpec),
    Func(FuncDecl),
    Var(ValueSpec),
    Const(ValueSpec),
}

/// One `type` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeSpec {
    pub name: Ident,
    /// `type T = V` rather than `type T V`.
    pub is_alias: bool,
    pub ty: TypeExpr,
    pub doc: Option<String>,
}

/// One `var` or `const` declaration line.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueSpec {
    pub names: Vec<Ident>,
    pub ty: Option<TypeExpr>,
    /// One entry per initializer expression, in order.
    pub values: Vec<ValueInit>,
    pub doc: Option<String>,
}

/// What little the front-end keeps of an initializer expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueInit {
    Int,
    Float,
    Imag,
    Char,
    String,
    Bool,
    /// `T{...}`
    Composite(TypeExpr),
    /// `&T{...}`
    AddressOf(TypeExpr),
    /// A bare name, such as another constant or `iota`.
    Name(String),
    Other,
}

/// A function or method declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub name: Ident,
    pub recv: Option<Receiver>,
    pub ty: FuncType,
    pub doc: Option<String>,
}

/// The receiver of a method.
#[derive(Debug, Clone, PartialEq)]
pub struct Receiver {
    pub name: Option<String>,
    pub ty: TypeExpr,
}

impl Receiver {
    /// Receiver type name with any pointer stripped.
    pub fn type_name(&self) -> String {
        match &self.ty {
            TypeExpr::Pointer(inner) => inner.to_string(),
            other => other.to_string(),
        }
    }

    /// Whether the receiver is a pointer.
    pub fn is_pointer(&self) -> bool {
        matches!(self.ty, TypeExpr::Pointer(_))
    }
}

/// Parameters and results of a function.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FuncType {
    pub params: Vec<Param>,
    pub results: Vec<Param>,
}

/// One parameter or result.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Option<String>,
    pub ty: TypeExpr,
    pub variadic: bool,
}

/// Direction of a channel type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

/// A type expression.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Ident(Ident),
    /// `pkg.Name`
    Selector { package: Ident, name: Ident },
    Pointer(Box<TypeExpr>),
    Slice(Box<TypeExpr>),
    Array { len: String, elem: Box<TypeExpr> },
    Map { key: Box<TypeExpr>, value: Box<TypeExpr> },
    Chan { dir: ChanDir, elem: Box<TypeExpr> },
    Struct(StructType),
    Interface(InterfaceType),
    Func(FuncType),
}

/// A struct type literal.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructType {
    pub fields: Vec<FieldDecl>,
}

/// One line of a struct body. Embedded fields have no names.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub names: Vec<Ident>,
    pub ty: TypeExpr,
    /// Raw tag literal, quotes included.
    pub tag: Option<String>,
    pub comment: Option<String>,
    pub pos: Pos,
}

/// An interface type literal.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InterfaceType {
    pub elems: Vec<InterfaceElem>,
}

/// One line of an interface type.
#[derive(Debug, Clone, PartialEq)]
pub enum InterfaceElem {
    Method { name: Ident, ty: FuncType },
    Embedded(TypeExpr),
}

/// The syntactic shape of a type expression, named in "not implemented"
/// errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationShape {
    Ident,
    Selector,
    PointerType,
    ArrayType,
    MapType,
    ChanType,
    StructType,
    InterfaceType,
    FuncType,
}

impl fmt::Display for DeclarationShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ident => "Ident",
            Self::Selector => "Selector",
            Self::PointerType => "PointerType",
            Self::ArrayType => "ArrayType",
            Self::MapType => "MapType",
            Self::ChanType => "ChanType",
            Self::StructType => "StructType",
            Self::InterfaceType => "InterfaceType",
            Self::FuncType => "FuncType",
        };
        f.write_str(name)
    }
}

impl TypeExpr {
    /// The shape reported when this expression is not supported.
    pub const fn shape(&self) -> DeclarationShape {
        match self {
            Self::Ident(_) => DeclarationShape::Ident,
            Self::Selector { .. } => DeclarationShape::Selector,
            Self::Pointer(_) => DeclarationShape::PointerType,
            Self::Slice(_) | Self::Array { .. } => DeclarationShape::ArrayType,
            Self::Map { .. } => DeclarationShape::MapType,
            Self::Chan { .. } => DeclarationShape::ChanType,
            Self::Struct(_) => DeclarationShape::StructType,
            Self::Interface(_) => DeclarationShape::InterfaceType,
            Self::Func(_) => DeclarationShape::FuncType,
        }
    }

    /// Position of the leftmost identifier, when there is one.
    pub fn pos(&self) -> Option<&Pos> {
        match self {
            Self::Ident(ident) => Some(&ident.pos),
            Self::Selector { package, .. } => Some(&package.pos),
            Self::Pointer(inner) | Self::Slice(inner) => inner.pos(),
            Self::Array { elem, .. } | Self::Chan { elem, .. } => elem.pos(),
            Self::Map { key, .. } => key.pos(),
            Self::Struct(_) | Self::Interface(_) | Self::Func(_) => None,
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(ident) => f.write_str(&ident.name),
            Self::Selector { package, name } => write!(f, "{}.{}", package.name, name.name),
            Self::Pointer(inner) => write!(f, "*{inner}"),
            Self::Slice(elem) => write!(f, "[]{elem}"),
            Self::Array { len, elem } => write!(f, "[{len}]{elem}"),
            Self::Map { key, value } => write!(f, "map[{key}]{value}"),
            Self::Chan { dir, elem } => match dir {
                ChanDir::Both => write!(f, "chan {elem}"),
                ChanDir::Send => write!(f, "chan<- {elem}"),
                ChanDir::Recv => write!(f, "<-chan {elem}"),
            },
            Self::Struct(st) => {
                f.write_str("struct{")?;
                for (i, field) in st.fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    let names: Vec<&str> = field.names.iter().map(|n| n.name.as_str()).collect();
                    if names.is_empty() {
                        write!(f, "{}", field.ty)?;
                    } else {
                        write!(f, "{} {}", names.join(", "), field.ty)?;
                    }
                }
                f.write_str("}")
            }
            Self::Interface(it) => {
                if it.elems.is_empty() {
                    return f.write_str("interface{}");
                }
                f.write_str("interface{")?;
                for (i, elem) in it.elems.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    match elem {
                        InterfaceElem::Method { name, ty } => {
                            write!(f, "{}", name.name)?;
                            write_signature(f, ty)?;
                        }
                        InterfaceElem::Embedded(ty) => write!(f, "{ty}")?,
                    }
                }
                f.write_str("}")
            }
            Self::Func(ty) => {
                f.write_str("func")?;
                write_signature(f, ty)
            }
        }
    }
}

impl fmt::Display for FuncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("func")?;
        write_signature(f, self)
    }
}

fn write_params(f: &mut fmt::Formatter<'_>, params: &[Param]) -> fmt::Result {
    for (i, param) in params.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        if let Some(name) = &param.name {
            write!(f, "{name} ")?;
        }
        if param.variadic {
            f.write_str("...")?;
        }
        write!(f, "{}", param.ty)?;
    }
    Ok(())
}

/// Writes `(params) results` in the usual signature form.
fn write_signature(f: &mut fmt::Formatter<'_>, ty: &FuncType) -> fmt::Result {
    f.write_str("(")?;
    write_params(f, &ty.params)?;
    f.write_str(")")?;
    match ty.results.as_slice() {
        [] => Ok(()),
        [single] if single.name.is_none() => write!(f, " {}", single.ty),
        results => {
            f.write_str(" (")?;
            write_params(f, results)?;
            f.write_str(")")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> Pos {
        Pos::new(Arc::from("t.go"), 1, 1)
    }

    fn ident(name: &str) -> TypeExpr {
        TypeExpr::Ident(Ident::new(name, pos()))
    }

    #[test]
    fn renders_nested_type_expressions() {
        let ty = TypeExpr::Map {
            key: Box::new(ident("string")),
            value: Box::new(TypeExpr::Slice(Box::new(TypeExpr::Pointer(Box::new(
                TypeExpr::Selector {
                    package: Ident::new("time", pos()),
                    name: Ident::new("Time", pos()),
                },
            ))))),
        };
        assert_eq!(ty.to_string(), "map[string][]*time.Time");
        assert_eq!(ty.shape(), DeclarationShape::MapType);
    }

    #[test]
    fn renders_signatures() {
        let ty = FuncType {
            params: vec![Param {
                name: Some("a".into()),
                ty: ident("int"),
                variadic: false,
            }],
            results: vec![
                Param {
                    name: None,
                    ty: ident("string"),
                    variadic: false,
                },
                Param {
                    name: None,
                    ty: ident("error"),
                    variadic: false,
                },
            ],
        };
        assert_eq!(ty.to_string(), "func(a int) (string, error)");
    }

    #[test]
    fn receiver_strips_pointer() {
        let recv = Receiver {
            name: Some("c".into()),
            ty: TypeExpr::Pointer(Box::new(ident("Cart"))),
        };
        assert_eq!(recv.type_name(), "Cart");
        assert!(recv.is_pointer());
    }
}

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use stroo_common::kinds;

use crate::{Function, Tags};

/// Queries shared by everything that has a textual kind.
pub trait Kinded {
    fn kind(&self) -> &str;
    fn package(&self) -> &str;
    fn is_pointer(&self) -> bool;

    /// `*Kind` for pointers, `Kind` otherwise.
    fn real_kind(&self) -> String {
        if self.is_pointer() {
            format!("*{}", self.kind())
        } else {
            self.kind().to_string()
        }
    }

    fn package_and_kind(&self) -> String {
        format!("{}.{}", self.package(), self.kind())
    }

    fn is_bool(&self) -> bool {
        self.kind() == "bool"
    }

    fn is_string(&self) -> bool {
        self.kind() == "string"
    }

    fn is_rune(&self) -> bool {
        self.kind() == "rune"
    }

    fn is_int(&self) -> bool {
        kinds::is_int(self.kind())
    }

    fn is_uint(&self) -> bool {
        kinds::is_uint(self.kind())
    }

    fn is_float(&self) -> bool {
        kinds::is_float(self.kind())
    }

    fn is_complex(&self) -> bool {
        kinds::is_complex(self.kind())
    }
}

/// A named type of the unit: struct, interface, array, alias, function
/// type, map or chan.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Declaration {
    pub name: String,
    /// How the declaration is referenced: its own name for structs and
    /// interfaces, the element kind for arrays, the target for aliases.
    pub kind: String,
    pub package: String,
    pub package_path: String,
    pub is_array: bool,
    pub is_pointer: bool,
    pub is_struct: bool,
    pub is_interface: bool,
    pub is_alias: bool,
    pub is_imported: bool,
    pub is_func: bool,
    pub is_map: bool,
    pub is_chan: bool,
    pub fields: Vec<Field>,
    pub methods: Vec<Function>,
    pub comment: Option<String>,
    /// Name of the local declaration `kind` refers to.
    pub reference: Option<String>,
}

impl Declaration {
    /// Name, then kind.
    pub fn sort_key(&self) -> (&str, &str) {
        (&self.name, &self.kind)
    }

    /// Whether any field is of `kind`.
    pub fn has_field_kind(&self, kind: &str) -> bool {
        self.fields.iter().any(|field| field.kind == kind)
    }

    /// The field called `name`.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Whether the declaration's kind is basic.
    pub fn is_basic(&self) -> bool {
        kinds::is_basic(&self.kind)
    }
}

impl Kinded for Declaration {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn package(&self) -> &str {
        &self.package
    }

    fn is_pointer(&self) -> bool {
        self.is_pointer
    }
}

/// One struct field. Embedded fields are named after their kind.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub kind: String,
    pub is_basic: bool,
    pub is_pointer: bool,
    pub is_struct: bool,
    pub is_array: bool,
    pub is_map: bool,
    pub is_chan: bool,
    pub is_func: bool,
    pub is_exported: bool,
    pub is_embedded: bool,
    pub is_imported: bool,
    pub is_interface: bool,
    pub tags: Tags,
    /// Name of the local declaration this field's kind refers to.
    pub reference: Option<String>,
    /// Qualifier of an imported kind (`time` for `time.Time`).
    pub package: String,
    pub comment: Option<String>,
}

impl Field {
    /// Name, then kind.
    pub fn sort_key(&self) -> (&str, &str) {
        (&self.name, &self.kind)
    }

    /// Options of the tag with this key.
    pub fn tags_by_key(&self, key: &str) -> &[String] {
        self.tags.options_of(key)
    }
}

impl Kinded for Field {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn package(&self) -> &str {
        &self.package
    }

    fn is_pointer(&self) -> bool {
        self.is_pointer
    }
}

/// Orders by name, or by kind when either name is empty.
pub fn by_name_or_kind(a: (&str, &str), b: (&str, &str)) -> Ordering {
    let ((a_name, a_kind), (b_name, b_kind)) = (a, b);
    if !a_name.is_empty() && !b_name.is_empty() {
        a_name.cmp(b_name)
    } else {
        a_kind.cmp(b_kind)
    }
}

/// Stable sort of fields, declarations or functions by name, kind fallback.
pub fn sort_by_name<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> (&str, &str),
{
    items.sort_by(|a, b| by_name_or_kind(key(a), key(b)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn field(name: &str, kind: &str) -> Field {
        Field {
            name: name.into(),
            kind: kind.into(),
            ..Field::default()
        }
    }

    #[test]
    fn sorting_falls_back_to_kind_for_embedded_fields() {
        let mut fields = vec![
            field("Zeta", "int"),
            field("", "Base"),
            field("Alpha", "string"),
            field("", "Audit"),
        ];
        sort_by_name(&mut fields, Field::sort_key);
        let order: Vec<(&str, &str)> = fields.iter().map(Field::sort_key).collect();
        assert_eq!(
            order,
            [("", "Audit"), ("", "Base"), ("Alpha", "string"), ("Zeta", "int")]
        );
    }

    #[rstest]
    #[case("bool", "is_bool")]
    #[case("string", "is_string")]
    #[case("rune", "is_rune")]
    #[case("int64", "is_int")]
    #[case("uint8", "is_uint")]
    #[case("float32", "is_float")]
    #[case("complex64", "is_complex")]
    fn kind_predicates(#[case] kind: &str, #[case] predicate: &str) {
        let f = field("X", kind);
        let hits = [
            ("is_bool", f.is_bool()),
            ("is_string", f.is_string()),
            ("is_rune", f.is_rune()),
            ("is_int", f.is_int()),
            ("is_uint", f.is_uint()),
            ("is_float", f.is_float()),
            ("is_complex", f.is_complex()),
        ];
        let matched: Vec<&str> = hits.iter().filter(|(_, hit)| *hit).map(|(n, _)| *n).collect();
        assert_eq!(matched, [predicate]);
    }

    #[test]
    fn real_kind_and_qualified_kind() {
        let mut f = field("At", "Time");
        f.package = "time".into();
        assert_eq!(f.real_kind(), "Time");
        f.is_pointer = true;
        assert_eq!(f.real_kind(), "*Time");
        assert_eq!(f.package_and_kind(), "time.Time");
    }
}

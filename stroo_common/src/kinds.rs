//! Classification of builtin kind names.

/// Every builtin basic kind the model recognizes.
pub const BASIC_KINDS: &[&str] = &[
    "bool",
    "int",
    "int8",
    "int16",
    "int32",
    "rune",
    "int64",
    "uint",
    "uint8",
    "byte",
    "uint16",
    "uint32",
    "uint64",
    "uintptr",
    "float32",
    "float64",
    "complex64",
    "complex128",
    "string",
];

/// Whether `kind` is a builtin basic kind.
pub fn is_basic(kind: &str) -> bool {
    BASIC_KINDS.contains(&kind)
}

/// Signed integer kinds.
pub fn is_int(kind: &str) -> bool {
    matches!(kind, "int" | "int8" | "int16" | "int32" | "int64")
}

/// Unsigned integer kinds.
pub fn is_uint(kind: &str) -> bool {
    matches!(kind, "uint" | "uint8" | "uint16" | "uint32" | "uint64")
}

/// Floating-point kinds.
pub fn is_float(kind: &str) -> bool {
    matches!(kind, "float32" | "float64")
}

/// Complex kinds.
pub fn is_complex(kind: &str) -> bool {
    matches!(kind, "complex64" | "complex128")
}

/// Go-style export rule: the first character is an uppercase letter.
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("string", true)]
    #[case("rune", true)]
    #[case("complex128", true)]
    #[case("error", false)]
    #[case("Item", false)]
    fn basic_kinds(#[case] kind: &str, #[case] expected: bool) {
        assert_eq!(is_basic(kind), expected);
    }

    #[test]
    fn numeric_families_do_not_overlap() {
        for kind in BASIC_KINDS {
            let hits = [is_int(kind), is_uint(kind), is_float(kind), is_complex(kind)]
                .iter()
                .filter(|hit| **hit)
                .count();
            assert!(hits <= 1, "{kind} is in more than one family");
        }
    }

    #[test]
    fn export_rule() {
        assert!(is_exported("Name"));
        assert!(!is_exported("name"));
        assert!(!is_exported("_Name"));
        assert!(!is_exported(""));
    }
}

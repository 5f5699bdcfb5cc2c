//! Unit identifiers.
//!
//! A `UnitId` names one compilation unit. The bundled front-end uses the
//! import path as the id; other front-ends may use anything unique.

use std::borrow::Borrow;
use std::fmt;

use contracts::*;

/// Unique identifier of a compilation unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(String);

impl UnitId {
    /// Creates a unit id.
    ///
    /// # Arguments
    ///
    /// * `id` - Non-empty identifier, typically the import path
    #[requires(!id.as_ref().is_empty())]
    pub fn new<S>(id: S) -> Self
    where
        S: AsRef<str> + Into<String>,
    {
        Self(id.into())
    }

    /// The identifier as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for UnitId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for UnitId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

//! Compilation-unit loading.
//!
//! The [`Loader`] asks a [`Frontend`] which units match a set of patterns,
//! builds the import graph, reports import cycles on the importing unit, and
//! then parses and type-checks every unit bottom-up with parallel fan-out.
//! [`SourceFrontend`] is the bundled front-end for Go-style sources.

mod error;
/// The front-end contract and the bundled source front-end.
pub mod frontend;
mod key;
mod loader;
mod unit;

pub use error::{FrontendError, ImportError, LoadError};
pub use frontend::{Checked, Frontend, Listing, Resolver, SourceFrontend, UnitMeta};
pub use key::UnitId;
pub use loader::{LoadConfig, Loader};
pub use unit::CompilationUnit;

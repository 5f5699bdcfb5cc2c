//! Semantic declaration model of one compilation unit.
//!
//! The [`model_analyzer`] turns a loaded unit into a [`PackageModel`]:
//! structs, arrays, aliases, function types, interfaces, functions and
//! variables, with cross-references kept by name. An [`Expander`] renders
//! declarations with their references inlined, cycle-safely, for templates
//! and diagnostics.

mod analyzer;
mod builder;
mod decl;
mod error;
mod expand;
mod package;
mod tag;

pub use crate::analyzer::{MODEL_ANALYZER, model_analyzer};
pub use crate::builder::build;
pub use crate::decl::{Declaration, Field, Kinded, by_name_or_kind, sort_by_name};
pub use crate::error::ModelError;
pub use crate::expand::Expander;
pub use crate::package::{Function, Import, Interface, PackageModel, Variable};
pub use crate::tag::{Tag, TagError, Tags};

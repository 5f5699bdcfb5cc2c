//! Template-driven generation over a [`PackageModel`](stroo_model::PackageModel).
//!
//! A [`Generator`] renders one template file against the declaration bound
//! as `main`. Templates drive the run themselves through the functions in
//! [`functions`]: they `declare` a named section, then ask for it to be
//! generated once per declaration kind, and collect what was stored in the
//! [`Keeper`].

mod error;
/// Functions exposed to templates.
pub mod functions;
mod generator;
mod keeper;
mod session;
mod templates;

pub use crate::error::GenError;
pub use crate::generator::{Generator, Output, banner};
pub use crate::keeper::{Entry, Keeper};
pub use crate::session::{Begin, Job, Session, SharedSession, Skip};
pub use crate::templates::TemplateSet;

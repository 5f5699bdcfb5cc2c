//! Analyzer registration and scheduling.
//!
//! Analyzers declare what they require; the [`Scheduler`] turns every
//! (analyzer, unit) pair into an [`Action`] that runs exactly once, after its
//! dependencies, with the results of same-unit dependencies as inputs.

mod action;
mod analyzer;
mod error;

pub use action::{Action, Actions, Pass, Scheduler};
pub use analyzer::{Analyzer, AnalyzerRegistry, AnalyzerResult, RunFn};
pub use error::{ActionError, RegistryError};

//! Common types shared across the stroo workspace.
//!
//! This crate holds the generation configuration, the syntax tree and symbol
//! tables produced by a language front-end, positioned unit errors, and a few
//! helpers used by both the loader and the scheduler.

mod config;
mod error;
/// Builtin kind predicates.
pub mod kinds;
/// Fan-out helpers.
pub mod parallel;
/// Resolved symbol tables.
pub mod symbols;
/// Source syntax trees.
pub mod syntax;

pub use crate::config::*;
pub use crate::error::*;

use thiserror::Error;

use stroo_common::UnitError;

/// Errors reported by a front-end.
#[derive(Debug, Error)]
pub enum FrontendError {
    /// The patterns could not be listed.
    #[error("listing failed: {0}")]
    List(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// A resolver call failed in a way the unit cannot recover from.
    #[error(transparent)]
    Import(#[from] ImportError),
}

/// Why an import could not be resolved for a unit being type-checked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportError {
    #[error("missing package: {0:?}")]
    Missing(String),
    #[error("import cycle: {0}")]
    Cycle(String),
    #[error("no metadata for {0}")]
    NoMetadata(String),
    /// A dependency claimed to be loaded but lacks a complete symbol table.
    #[error("internal error: unit {path:?} without types was imported from {importer:?}")]
    Internal { path: String, importer: String },
}

impl ImportError {
    /// Internal faults signal a scheduling bug, not bad input.
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

/// Errors returned by [`crate::Loader::load`].
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{0} matched no units")]
    NoMatch(String),
    #[error("root unit {0} is missing")]
    MissingRoot(String),
    #[error("error during loading: {0}")]
    Single(UnitError),
    #[error("{0} errors during loading")]
    Aggregate(usize),
    #[error(transparent)]
    Frontend(#[from] FrontendError),
    /// Internal consistency fault raised while loading.
    #[error("{0}")]
    Internal(String),
}

impl LoadError {
    /// No unit matched `patterns`.
    pub fn no_match(patterns: &[String]) -> Self {
        Self::NoMatch(patterns.join(" "))
    }

    /// A scheduling or consistency fault.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

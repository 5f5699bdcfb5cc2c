use stroo_analysis::RegistryError;
use stroo_driver::{FrontendError, LoadError};
use stroo_gen::GenError;
use thiserror::Error;

/// Everything that can stop a `stroo` run.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("usage: {0}")]
    Usage(String),
    #[error(transparent)]
    Frontend(#[from] FrontendError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// The model analyzer produced this many results instead of one.
    #[error("expected exactly one unit to generate from, got {0}")]
    Results(usize),
    #[error("internal error: model analyzer result is not a package model")]
    NotAModel,
    #[error(transparent)]
    Gen(#[from] GenError),
}

impl CliError {
    /// A command-line usage error.
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }
}

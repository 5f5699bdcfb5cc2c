use thiserror::Error;

/// Problems with the set of registered analyzers, found before anything
/// runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("duplicate analyzer: {0}")]
    Duplicate(String),
    #[error("invalid analyzer name {0:?}")]
    InvalidName(String),
    #[error("analyzer {0:?} is undocumented")]
    Undocumented(String),
    #[error("unknown analyzer {0:?}")]
    Unknown(String),
    #[error("analyzer cycle: {0}")]
    Cycle(String),
    /// A problem found while following `analyzer.requires[index]`.
    #[error("{analyzer}.requires[{index}]: {source}")]
    Requires {
        analyzer: String,
        index: usize,
        source: Box<RegistryError>,
    },
}

impl RegistryError {
    /// A requirement naming no registered analyzer.
    pub fn unknown(name: &str) -> Self {
        Self::Unknown(name.to_string())
    }
}

/// Why an action produced no result. Cloned to every caller of the action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// Sorted, comma-joined `analyzer@unit` list of failed dependencies.
    #[error("failed prerequisites: {0}")]
    FailedPrerequisites(String),
    #[error("analysis skipped due to errors in unit")]
    Skipped,
    #[error(
        "internal error: on unit {unit}, analyzer {analyzer} returned a result of type {got}, but declared result type {want}"
    )]
    ResultType {
        unit: String,
        analyzer: String,
        got: String,
        want: String,
    },
    /// A dependency result was requested that is not an input of the pass.
    #[error("{0}")]
    Input(String),
    /// The analyzer itself failed.
    #[error("{0}")]
    Failed(String),
}

impl ActionError {
    /// The analyzer body failed with `msg`.
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    /// A dependency result was missing or of the wrong type.
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }
}

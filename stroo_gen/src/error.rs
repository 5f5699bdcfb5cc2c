use std::path::PathBuf;

use stroo_model::ModelError;
use thiserror::Error;

/// Errors of a generation run.
#[derive(Debug, Error)]
pub enum GenError {
    #[error("cannot declare empty template name")]
    EmptyTemplateName,
    #[error("main declaration was not selected")]
    NoMain,
    #[error("no template declared: call declare(name) first")]
    NotDeclared,
    #[error("`{0}` already stored")]
    AlreadyStored(String),
    #[error("attempt to retrieve {0:?} - was not found")]
    NotStored(String),
    #[error("error looking for {0:?} into types")]
    UnknownType(String),
    #[error("{template}:{line}: {msg}")]
    TemplateSyntax {
        template: String,
        line: usize,
        msg: String,
    },
    /// The main template failed; `partial` bytes had been produced.
    #[error("failed to render {template}: {source} (partial output: {partial} bytes)")]
    Render {
        template: String,
        partial: usize,
        #[source]
        source: minijinja::Error,
    },
    #[error("no output file given outside test mode")]
    NoOutput,
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Engine(#[from] minijinja::Error),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl GenError {
    /// A template syntax error at `line`.
    pub fn syntax(template: &str, line: usize, msg: impl Into<String>) -> Self {
        Self::TemplateSyntax {
            template: template.to_string(),
            line,
            msg: msg.into(),
        }
    }

    /// An IO error on `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The error as seen by a template calling back into the session.
    pub fn into_engine(self) -> minijinja::Error {
        match self {
            Self::Engine(err) => err,
            other => minijinja::Error::new(
                minijinja::ErrorKind::InvalidOperation,
                other.to_string(),
            ),
        }
    }
}

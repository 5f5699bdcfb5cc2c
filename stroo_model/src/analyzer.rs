use std::any::Any;

use stroo_analysis::{ActionError, Analyzer, Pass};
use tracing::error;

use crate::{PackageModel, build};

/// Name the model analyzer is registered under.
pub const MODEL_ANALYZER: &str = "model";

/// The analyzer producing a [`PackageModel`] per unit. It runs on ill-typed
/// units too, so templates can still be generated from partially broken
/// sources.
pub fn model_analyzer() -> Analyzer {
    Analyzer::new::<PackageModel>(
        MODEL_ANALYZER,
        "builds the declaration model of a unit: types, fields, methods, functions and variables",
        run,
    )
    .with_run_despite_errors(true)
}

fn run(pass: &Pass<'_>) -> Result<Box<dyn Any + Send + Sync>, ActionError> {
    match build(pass.unit()) {
        Ok(model) => Ok(Box::new(model)),
        Err(err) => {
            error!("{}: {}", pass.unit().import_path(), err);
            Err(ActionError::failed(err.to_string()))
        }
    }
}

use std::sync::Arc;

use stroo_analysis::{AnalyzerRegistry, Scheduler};
use stroo_driver::{Loader, SourceFrontend};
use stroo_gen::{Generator, Output};
use stroo_model::{MODEL_ANALYZER, PackageModel, model_analyzer};
use tracing::{error, info};

use crate::args::Args;
use crate::error::CliError;

/// Loads the units, builds the model of the single root and generates from
/// it. Returns the output together with the analysis exit code.
///
/// # Errors
///
/// Fails on usage errors, when loading fails, when there is not exactly one
/// model to generate from, and when generation fails.
pub fn run(args: &Args) -> Result<(Output, i32), CliError> {
    let config = args.to_config()?;
    info!(
        "Processing type {:?} - test mode: {}, debug: {}",
        config.selected_type, config.test_mode, config.debug
    );

    let frontend = SourceFrontend::new(&config.root)?;
    let units = Loader::new(frontend).load(&args.patterns)?;

    let mut registry = AnalyzerRegistry::new();
    registry.register(model_analyzer())?;
    let actions = Scheduler::new(registry)?.analyze(&units, &[MODEL_ANALYZER])?;
    let (results, code) = actions.gather_results();

    let [result] = results.as_slice() else {
        error!("{} models for {} units", results.len(), units.len());
        return Err(CliError::Results(results.len()));
    };
    let model = Arc::clone(result)
        .downcast::<PackageModel>()
        .map_err(|_| CliError::NotAModel)?;

    let output = Generator::from_config(model, config)?.generate()?;
    Ok((output, code))
}

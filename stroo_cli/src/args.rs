use std::path::PathBuf;

use clap::Parser;
use stroo_common::GenConfig;

use crate::error::CliError;

/// stroo - generates source code from templates and a package's declarations
#[derive(Parser, Debug)]
#[command(name = "stroo")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Declaration the template is rendered for, e.g. ShopCart
    #[arg(long = "type")]
    pub type_name: Option<String>,

    /// Template file, e.g. ./templates/stringer.tmpl
    #[arg(long)]
    pub template: Option<PathBuf>,

    /// File the generated code is written to, e.g. cart_string.go
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Peer declaration passed to the template as config.peer_type
    #[arg(long, default_value = "")]
    pub target: String,

    /// Print the result instead of writing it
    #[arg(long, alias = "testmode", default_value_t = false)]
    pub test_mode: bool,

    /// Log progress in detail
    #[arg(long, default_value_t = false)]
    pub debug: bool,

    /// Directory unit patterns are resolved against
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Units to load, as import paths below the root
    #[arg(default_values_t = vec![".".to_string()])]
    pub patterns: Vec<String>,
}

impl Args {
    /// Convert command-line arguments into the generation configuration
    ///
    /// # Errors
    ///
    /// Fails when the template or the type is missing, or when no output is
    /// given outside test mode.
    pub fn to_config(&self) -> Result<GenConfig, CliError> {
        let template = self
            .template
            .as_ref()
            .ok_or_else(|| CliError::usage("you have to provide a template file"))?;
        let type_name = self
            .type_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| CliError::usage("you have to provide a main type to be used in the template"))?;

        let mut config = GenConfig::new()
            .with_selected_type(type_name)
            .with_template_file(template)
            .with_peer_type(&self.target)
            .with_test_mode(self.test_mode)
            .with_debug(self.debug)
            .with_root(&self.root);
        match &self.output {
            Some(output) => config = config.with_output_file(output),
            None if !self.test_mode => {
                return Err(CliError::usage(
                    "you have to specify the file which will be produced",
                ));
            }
            None => {}
        }
        Ok(config)
    }
}

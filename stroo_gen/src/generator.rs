use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use minijinja::{AutoEscape, Environment, Value, context};
use stroo_common::GenConfig;
use stroo_model::{Expander, PackageModel};
use tracing::{error, info};

use crate::{GenError, Session, SharedSession, TemplateSet, functions};

/// Where the generated text went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Written(PathBuf),
    /// Test mode: the text itself, nothing written.
    DryRun(String),
}

/// Header recorded at the top of every generated file.
pub fn banner(config: &GenConfig, at: NaiveDateTime) -> String {
    format!(
        "// Generated on {} by stroo\n\
         // Do NOT bother with altering it by hand : use the tool\n\
         // Arguments at the time of generation:\n\
         //\t{}",
        at.format("%a %b %-d %H:%M:%S"),
        config.flag_pairs()
    )
}

/// Renders one template set for the declaration selected in the config.
pub struct Generator {
    env: Environment<'static>,
    session: SharedSession,
    main_template: String,
}

impl Generator {
    /// Binds the selected declaration and prepares the engine.
    ///
    /// Every template sees `main` (the expanded selected declaration),
    /// `package` (the model with expanded declarations) and `config`. The
    /// import list is read through the `imports()` function, as templates
    /// may add to it while rendering.
    ///
    /// # Errors
    ///
    /// Fails when the selected type is not a declaration of the model and on
    /// template syntax errors.
    pub fn new(
        model: Arc<PackageModel>,
        config: GenConfig,
        templates: &TemplateSet,
    ) -> Result<Self, GenError> {
        let config_value = config_value(&config);
        let selected = config.selected_type.clone();
        let mut session = Session::new(Arc::clone(&model), config);
        let main = session.bind_main(&selected)?;

        let mut expander = Expander::new(&model);
        let main = expander.expand(main)?;
        let package = expander.expand_model()?;

        let session = SharedSession::new(session);
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::None);
        templates.install(&mut env)?;
        functions::register(&mut env, &session);
        env.add_global("main", Value::from_serialize(&main));
        env.add_global("package", Value::from_serialize(&package));
        env.add_global("config", config_value);

        Ok(Self {
            env,
            session,
            main_template: templates.name().to_string(),
        })
    }

    /// Reads the template file named in `config`.
    ///
    /// # Errors
    ///
    /// See [`TemplateSet::from_file`] and [`new`](Self::new).
    pub fn from_config(model: Arc<PackageModel>, config: GenConfig) -> Result<Self, GenError> {
        let templates = TemplateSet::from_file(&config.template_file)?;
        Self::new(model, config, &templates)
    }

    /// The session shared with the template functions.
    pub const fn session(&self) -> &SharedSession {
        &self.session
    }

    /// Renders the main template, without the banner.
    ///
    /// # Errors
    ///
    /// Fails when the main template fails; the error records how much output
    /// had been produced.
    pub fn render(&self) -> Result<String, GenError> {
        let template = self.env.get_template(&self.main_template)?;
        let mut out = Vec::new();
        match template.render_to_write(context! {}, &mut out) {
            Ok(_) => Ok(String::from_utf8_lossy(&out).into_owned()),
            Err(source) => {
                error!(
                    "Failed to render {}: {:#}\nPartial result:\n{}",
                    self.main_template,
                    source,
                    String::from_utf8_lossy(&out)
                );
                Err(GenError::Render {
                    template: self.main_template.clone(),
                    partial: out.len(),
                    source,
                })
            }
        }
    }

    /// Renders, prefixes the banner, and writes the result to the output
    /// file, or returns it in test mode.
    ///
    /// # Errors
    ///
    /// See [`render`](Self::render); also fails without an output file
    /// outside test mode and when writing fails.
    pub fn generate(&self) -> Result<Output, GenError> {
        let body = self.render()?;
        let config = self.session.lock().config().clone();
        let mut text = banner(&config, Local::now().naive_local());
        text.push('\n');
        text.push_str(&body);
        if !text.ends_with('\n') {
            text.push('\n');
        }

        if config.test_mode {
            return Ok(Output::DryRun(text));
        }
        let path = config.output_file.ok_or(GenError::NoOutput)?;
        write_output(&path, &text)?;
        info!("Created {}", path.display());
        Ok(Output::Written(path))
    }
}

fn config_value(config: &GenConfig) -> Value {
    context! {
        selected_type => config.selected_type,
        template_file => config.template_file.display().to_string(),
        output_file => config.output_file.as_ref().map(|p| p.display().to_string()),
        peer_type => config.peer_type,
        test_mode => config.test_mode,
        debug => config.debug,
    }
}

fn write_output(path: &Path, text: &str) -> Result<(), GenError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| GenError::io(parent, err))?;
    }
    fs::write(path, text).map_err(|err| GenError::io(path, err))
}

use std::path::PathBuf;

/// Settings for one generation run.
///
/// Mirrors the command line: which declaration drives the template, where the
/// template lives, and where (or whether) the result is written.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GenConfig {
    /// Declaration bound as `main` in the template (e.g. `ShopCart`).
    pub selected_type: String,
    /// Path of the template file.
    pub template_file: PathBuf,
    /// Destination of the generated text. Ignored in test mode.
    pub output_file: Option<PathBuf>,
    /// Optional peer declaration, exposed to the template verbatim.
    pub peer_type: String,
    /// Dry run: return the text instead of writing it.
    pub test_mode: bool,
    /// Verbose progress logging.
    pub debug: bool,
    /// Directory the unit patterns are resolved against.
    pub root: PathBuf,
}

impl GenConfig {
    /// An empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the declaration the template is rendered for.
    pub fn with_selected_type(mut self, selected_type: &str) -> Self {
        self.selected_type = selected_type.to_string();
        self
    }

    /// Sets the template file.
    pub fn with_template_file<P: Into<PathBuf>>(mut self, template_file: P) -> Self {
        self.template_file = template_file.into();
        self
    }

    /// Sets the file the result is written to.
    pub fn with_output_file<P: Into<PathBuf>>(mut self, output_file: P) -> Self {
        self.output_file = Some(output_file.into());
        self
    }

    /// Sets the peer declaration passed to templates.
    pub fn with_peer_type(mut self, peer_type: &str) -> Self {
        self.peer_type = peer_type.to_string();
        self
    }

    /// Returns the result instead of writing it.
    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }

    /// Enables detailed logging.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Sets the directory patterns are resolved against.
    pub fn with_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.root = root.into();
        self
    }

    /// Renders the configuration as `-name=value` pairs, in a fixed order.
    ///
    /// This is what the generated-file banner records as "arguments at the
    /// time of generation".
    pub fn flag_pairs(&self) -> String {
        let output = self
            .output_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        [
            ("debug", self.debug.to_string()),
            ("output", output),
            ("root", self.root.display().to_string()),
            ("target", self.peer_type.clone()),
            ("template", self.template_file.display().to_string()),
            ("testmode", self.test_mode.to_string()),
            ("type", self.selected_type.clone()),
        ]
        .iter()
        .map(|(name, value)| format!("-{name}={value}"))
        .collect::<Vec<_>>()
        .join(" ")
    }
}

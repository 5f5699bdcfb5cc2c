use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use contracts::*;
use indexmap::IndexMap;
use tracing::debug;

use crate::{ActionError, Pass, RegistryError};

/// Type-erased result of one analyzer run.
pub type AnalyzerResult = Arc<dyn Any + Send + Sync>;

/// The analyzer body.
pub type RunFn = fn(&Pass<'_>) -> Result<Box<dyn Any + Send + Sync>, ActionError>;

/// A named analysis with declared requirements and result type.
#[derive(Clone)]
pub struct Analyzer {
    name: &'static str,
    doc: &'static str,
    requires: Vec<&'static str>,
    result_type: TypeId,
    result_type_name: &'static str,
    run: RunFn,
    run_despite_errors: bool,
    uses_imports: bool,
}

impl Analyzer {
    /// Creates an analyzer whose body returns a boxed `R`.
    ///
    /// # Arguments
    ///
    /// * `name` - Identifier the analyzer is registered and required under
    /// * `doc` - Non-empty description
    /// * `run` - The analyzer body
    #[requires(!name.is_empty())]
    pub fn new<R: Any + Send + Sync>(name: &'static str, doc: &'static str, run: RunFn) -> Self {
        Self {
            name,
            doc,
            requires: Vec::new(),
            result_type: TypeId::of::<R>(),
            result_type_name: std::any::type_name::<R>(),
            run,
            run_despite_errors: false,
            uses_imports: false,
        }
    }

    /// Names of the analyzers whose results this one reads.
    #[must_use]
    pub fn with_requires(mut self, requires: &[&'static str]) -> Self {
        self.requires = requires.to_vec();
        self
    }

    /// Runs the analyzer even on ill-typed units.
    #[must_use]
    pub const fn with_run_despite_errors(mut self, run_despite_errors: bool) -> Self {
        self.run_despite_errors = run_despite_errors;
        self
    }

    /// Also requires this analyzer on every direct import of the unit.
    #[must_use]
    pub const fn with_uses_imports(mut self, uses_imports: bool) -> Self {
        self.uses_imports = uses_imports;
        self
    }

    /// Unique analyzer name.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// What the analyzer computes.
    pub const fn doc(&self) -> &'static str {
        self.doc
    }

    /// Required analyzer names, in declaration order.
    pub fn requires(&self) -> &[&'static str] {
        &self.requires
    }

    /// Type of the value `run` must return.
    pub const fn result_type(&self) -> TypeId {
        self.result_type
    }

    /// Readable name of the declared result type.
    pub const fn result_type_name(&self) -> &'static str {
        self.result_type_name
    }

    /// Whether the analyzer runs on ill-typed units.
    pub const fn run_despite_errors(&self) -> bool {
        self.run_despite_errors
    }

    /// Whether the analyzer also runs on every direct import.
    pub const fn uses_imports(&self) -> bool {
        self.uses_imports
    }

    pub(crate) fn run(
        &self,
        pass: &Pass<'_>,
    ) -> Result<Box<dyn Any + Send + Sync>, ActionError> {
        (self.run)(pass)
    }
}

impl fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analyzer")
            .field("name", &self.name)
            .field("requires", &self.requires)
            .field("result_type", &self.result_type_name)
            .field("run_despite_errors", &self.run_despite_errors)
            .field("uses_imports", &self.uses_imports)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Analyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c == '_' || c.is_alphabetic())
        && chars.all(|c| c == '_' || c.is_alphanumeric())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Pending,
    Done,
}

/// Analyzers by name, in registration order.
#[derive(Debug, Clone, Default)]
pub struct AnalyzerRegistry {
    analyzers: IndexMap<&'static str, Arc<Analyzer>>,
}

impl AnalyzerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an analyzer.
    ///
    /// # Errors
    ///
    /// Fails when another analyzer already has the same name.
    pub fn register(&mut self, analyzer: Analyzer) -> Result<(), RegistryError> {
        if self.analyzers.contains_key(analyzer.name) {
            return Err(RegistryError::Duplicate(analyzer.name.to_string()));
        }
        debug!("Registered analyzer {}", analyzer.name);
        self.analyzers.insert(analyzer.name, Arc::new(analyzer));
        Ok(())
    }

    /// The analyzer registered under `name`.
    pub fn get(&self, name: &str) -> Option<&Arc<Analyzer>> {
        self.analyzers.get(name)
    }

    /// Whether an analyzer is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.analyzers.contains_key(name)
    }

    /// Number of registered analyzers.
    pub fn len(&self) -> usize {
        self.analyzers.len()
    }

    /// Whether no analyzer is registered.
    pub fn is_empty(&self) -> bool {
        self.analyzers.is_empty()
    }

    /// Analyzers in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Analyzer>> {
        self.analyzers.values()
    }

    /// Checks names, docs and the requirement graph of every analyzer.
    ///
    /// # Errors
    ///
    /// Returns the first problem found, nested under the requirement path
    /// that led to it.
    pub fn validate(&self) -> Result<(), RegistryError> {
        let mut marks = HashMap::new();
        let mut stack = Vec::new();
        for name in self.analyzers.keys() {
            self.visit(*name, &mut marks, &mut stack)?;
        }
        Ok(())
    }

    fn visit(
        &self,
        name: &'static str,
        marks: &mut HashMap<&'static str, Mark>,
        stack: &mut Vec<&'static str>,
    ) -> Result<(), RegistryError> {
        match marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Pending) => {
                let start = stack.iter().position(|n| *n == name).unwrap_or(0);
                let mut cycle = stack[start..].to_vec();
                cycle.push(name);
                return Err(RegistryError::Cycle(cycle.join(" -> ")));
            }
            None => {}
        }
        let analyzer = self.get(name).ok_or_else(|| RegistryError::unknown(name))?;
        if !is_identifier(name) {
            return Err(RegistryError::InvalidName(name.to_string()));
        }
        if analyzer.doc.trim().is_empty() {
            return Err(RegistryError::Undocumented(name.to_string()));
        }

        marks.insert(name, Mark::Pending);
        stack.push(name);
        for (index, required) in analyzer.requires.iter().enumerate() {
            self.visit(*required, marks, stack)
                .map_err(|source| RegistryError::Requires {
                    analyzer: name.to_string(),
                    index,
                    source: Box::new(source),
                })?;
        }
        stack.pop();
        marks.insert(name, Mark::Done);
        Ok(())
    }
}

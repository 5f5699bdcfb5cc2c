//! Action graph construction and execution.
//!
//! Two phases, as with any plan:
//! 1. **Planning** (single-threaded): one [`Action`] per (analyzer, unit)
//!    pair, memoized, with its requirements as dependencies
//! 2. **Execution** (multi-threaded): roots fan out on the rayon pool; each
//!    action runs its dependencies on scoped workers, then its own body once

use std::any::{Any, type_name};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock};

use itertools::Itertools;
use rayon::prelude::*;
use tracing::{debug, error, info, trace};

use stroo_common::parallel::fan_out;
use stroo_driver::{CompilationUnit, UnitId};

use crate::{ActionError, Analyzer, AnalyzerRegistry, AnalyzerResult, RegistryError};

type Outcome = Result<AnalyzerResult, ActionError>;

/// One analyzer applied to one unit.
pub struct Action {
    analyzer: Arc<Analyzer>,
    unit: Arc<CompilationUnit>,
    deps: Vec<Arc<Self>>,
    outcome: OnceLock<Outcome>,
}

impl Action {
    /// The analyzer this action runs.
    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    /// The unit this action runs on.
    pub fn unit(&self) -> &Arc<CompilationUnit> {
        &self.unit
    }

    /// Actions that must finish before this one.
    pub fn deps(&self) -> &[Arc<Self>] {
        &self.deps
    }

    /// The outcome, if the action has run.
    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.get()
    }

    /// Runs the action once. Concurrent and later callers wait for and share
    /// the first run's outcome.
    pub fn exec(&self) -> &Outcome {
        self.outcome.get_or_init(|| self.exec_once())
    }

    fn exec_once(&self) -> Outcome {
        fan_out(&self.deps, |dep| {
            dep.exec();
        });

        let failed: Vec<String> = self
            .deps
            .iter()
            .filter(|dep| dep.exec().is_err())
            .map(ToString::to_string)
            .sorted()
            .collect();
        if !failed.is_empty() {
            return Err(ActionError::FailedPrerequisites(failed.join(", ")));
        }

        // only same-unit results are inputs
        let mut inputs = HashMap::new();
        for dep in &self.deps {
            if dep.unit.id() != self.unit.id() {
                continue;
            }
            if let Some(Ok(result)) = dep.outcome.get() {
                inputs.insert(dep.analyzer.name(), result.clone());
            }
        }

        if self.unit.is_ill_typed() && !self.analyzer.run_despite_errors() {
            debug!("Skipping {}: unit is ill-typed", self);
            return Err(ActionError::Skipped);
        }

        debug!("Running {}", self);
        let pass = Pass {
            analyzer: &self.analyzer,
            unit: &self.unit,
            inputs: &inputs,
        };
        let boxed = self.analyzer.run(&pass)?;
        let got = (*boxed).type_id();
        if got != self.analyzer.result_type() {
            return Err(ActionError::ResultType {
                unit: self.unit.import_path().to_string(),
                analyzer: self.analyzer.name().to_string(),
                got: format!("{got:?}"),
                want: self.analyzer.result_type_name().to_string(),
            });
        }
        trace!("{} produced {}", self, self.analyzer.result_type_name());
        Ok(Arc::from(boxed))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.analyzer.name(), self.unit.import_path())
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("action", &self.to_string())
            .field("deps", &self.deps.len())
            .field("done", &self.outcome.get().is_some())
            .finish()
    }
}

/// What an analyzer body sees: the unit and its same-unit inputs.
pub struct Pass<'a> {
    analyzer: &'a Analyzer,
    unit: &'a Arc<CompilationUnit>,
    inputs: &'a HashMap<&'static str, AnalyzerResult>,
}

impl Pass<'_> {
    /// The analyzer being run.
    pub fn analyzer(&self) -> &Analyzer {
        self.analyzer
    }

    /// The unit being analyzed.
    pub fn unit(&self) -> &Arc<CompilationUnit> {
        self.unit
    }

    /// Typed result of a required analyzer.
    ///
    /// # Errors
    ///
    /// Fails when `name` is not an input of this pass or produced another
    /// type.
    pub fn result_of<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, ActionError> {
        let result = self.inputs.get(name).ok_or_else(|| {
            ActionError::input(format!(
                "analyzer {} has no input from {name:?}",
                self.analyzer.name()
            ))
        })?;
        result.clone().downcast::<T>().map_err(|_| {
            ActionError::input(format!(
                "result of {name:?} is not a {}",
                type_name::<T>()
            ))
        })
    }
}

/// The planned root actions of one run.
#[derive(Debug)]
pub struct Actions {
    roots: Vec<Arc<Action>>,
    planned: usize,
}

impl Actions {
    /// One action per requested (analyzer, unit) pair.
    pub fn roots(&self) -> &[Arc<Action>] {
        &self.roots
    }

    /// Number of distinct actions in the plan.
    pub const fn len(&self) -> usize {
        self.planned
    }

    /// Whether nothing was planned.
    pub const fn is_empty(&self) -> bool {
        self.planned == 0
    }

    /// Runs every root action on the rayon pool.
    pub fn exec_all(&self) {
        info!("Executing {} root actions ({} planned)", self.roots.len(), self.planned);
        self.roots.par_iter().for_each(|action| {
            action.exec();
        });
    }

    /// Results of the root actions, in plan order, with an exit code.
    ///
    /// Any failed root yields no results and exit code 1.
    pub fn gather_results(&self) -> (Vec<AnalyzerResult>, i32) {
        let mut seen = HashSet::new();
        let mut results = Vec::new();
        let mut exit_code = 0;
        for root in &self.roots {
            visit_all(root, &mut seen);
            match root.exec() {
                Ok(result) => results.push(result.clone()),
                Err(err) => {
                    error!("{}: {}", root, err);
                    exit_code = 1;
                }
            }
        }
        if exit_code != 0 {
            return (Vec::new(), exit_code);
        }
        (results, exit_code)
    }
}

/// Makes sure every dependency ran, each action once.
fn visit_all(action: &Arc<Action>, seen: &mut HashSet<(&'static str, UnitId)>) {
    if !seen.insert((action.analyzer.name(), action.unit.id().clone())) {
        return;
    }
    for dep in &action.deps {
        visit_all(dep, seen);
    }
    if let Err(err) = action.exec() {
        trace!("{} failed: {}", action, err);
    }
}

/// Plans and runs analyzers over loaded units.
#[derive(Debug, Clone)]
pub struct Scheduler {
    registry: Arc<AnalyzerRegistry>,
}

impl Scheduler {
    /// # Errors
    ///
    /// Fails when the registry does not validate.
    pub fn new(registry: AnalyzerRegistry) -> Result<Self, RegistryError> {
        registry.validate()?;
        Ok(Self {
            registry: Arc::new(registry),
        })
    }

    /// The registry actions are planned from.
    pub fn registry(&self) -> &AnalyzerRegistry {
        &self.registry
    }

    /// Builds the action graph for `roots` on every unit, without running it.
    ///
    /// # Errors
    ///
    /// Fails when a root analyzer is not registered.
    pub fn plan(
        &self,
        units: &[Arc<CompilationUnit>],
        roots: &[&str],
    ) -> Result<Actions, RegistryError> {
        let mut planner = Planner {
            registry: &self.registry,
            memo: HashMap::new(),
        };
        let mut planned_roots = Vec::with_capacity(roots.len() * units.len());
        for name in roots {
            let analyzer = self
                .registry
                .get(name)
                .ok_or_else(|| RegistryError::unknown(name))?;
            for unit in units {
                planned_roots.push(planner.action(analyzer, unit)?);
            }
        }
        debug!(
            "Planned {} actions for {} roots",
            planner.memo.len(),
            planned_roots.len()
        );
        Ok(Actions {
            roots: planned_roots,
            planned: planner.memo.len(),
        })
    }

    /// Plans and executes `roots` on every unit.
    ///
    /// # Errors
    ///
    /// See [`plan`](Self::plan).
    pub fn analyze(
        &self,
        units: &[Arc<CompilationUnit>],
        roots: &[&str],
    ) -> Result<Actions, RegistryError> {
        info!(
            "Analyzing {} units with {}",
            units.len(),
            roots.iter().join(", ")
        );
        let actions = self.plan(units, roots)?;
        actions.exec_all();
        Ok(actions)
    }
}

struct Planner<'r> {
    registry: &'r AnalyzerRegistry,
    memo: HashMap<(&'static str, UnitId), Arc<Action>>,
}

impl Planner<'_> {
    fn action(
        &mut self,
        analyzer: &Arc<Analyzer>,
        unit: &Arc<CompilationUnit>,
    ) -> Result<Arc<Action>, RegistryError> {
        let key = (analyzer.name(), unit.id().clone());
        if let Some(existing) = self.memo.get(&key) {
            return Ok(existing.clone());
        }

        let registry = self.registry;
        let mut deps = Vec::new();
        for required in analyzer.requires() {
            let required = registry
                .get(required)
                .ok_or_else(|| RegistryError::unknown(required))?;
            deps.push(self.action(required, unit)?);
        }
        if analyzer.uses_imports() {
            for import in unit.imports().values() {
                deps.push(self.action(analyzer, import)?);
            }
        }

        trace!("Planned {}@{} ({} deps)", analyzer.name(), unit.import_path(), deps.len());
        let action = Arc::new(Action {
            analyzer: analyzer.clone(),
            unit: unit.clone(),
            deps,
            outcome: OnceLock::new(),
        });
        self.memo.insert(key, action.clone());
        Ok(action)
    }
}

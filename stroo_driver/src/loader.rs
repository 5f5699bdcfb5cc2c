use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

use itertools::Itertools;
use rayon::prelude::*;
use tracing::{debug, error, info, trace, warn};

use stroo_common::parallel::fan_out;
use stroo_common::symbols::{PackageRef, SymbolTable};
use stroo_common::{ErrorKind, UnitError};

use crate::{
    CompilationUnit, Frontend, FrontendError, ImportError, LoadError, UnitId, UnitMeta,
};

/// Loader settings.
#[derive(Debug, Clone, Default)]
pub struct LoadConfig {
    /// Return the units even when some of them have errors.
    pub tolerate_errors: bool,
}

impl LoadConfig {
    /// Default settings: errors fail the load.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns units even when they have errors.
    #[must_use]
    pub const fn with_tolerate_errors(mut self, tolerate: bool) -> Self {
        self.tolerate_errors = tolerate;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Init,
    Pending,
    Done,
}

/// A listed unit on its way to becoming a [`CompilationUnit`].
#[derive(Debug)]
struct PendingUnit {
    meta: UnitMeta,
    /// Import edges kept after cycle and missing-unit detection.
    imports: BTreeMap<String, UnitId>,
    /// Why a dropped import edge was dropped, by import path.
    import_errors: BTreeMap<String, ImportError>,
    needs_source: bool,
    needs_types: bool,
    state: VisitState,
    loaded: OnceLock<Arc<CompilationUnit>>,
}

type Graph = HashMap<UnitId, PendingUnit>;

/// Loads compilation units through a [`Frontend`] and keeps them in a
/// registry shared by every clone of the loader.
#[derive(Debug)]
pub struct Loader<F: Frontend> {
    frontend: Arc<F>,
    config: LoadConfig,
    registry: Arc<RwLock<HashMap<UnitId, Arc<CompilationUnit>>>>,
}

impl<F: Frontend> Clone for Loader<F> {
    fn clone(&self) -> Self {
        Self {
            frontend: self.frontend.clone(),
            config: self.config.clone(),
            registry: self.registry.clone(),
        }
    }
}

impl<F: Frontend> Loader<F> {
    /// A loader over `frontend` with an empty registry.
    pub fn new(frontend: F) -> Self {
        Self {
            frontend: Arc::new(frontend),
            config: LoadConfig::default(),
            registry: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Replaces the loader settings.
    #[must_use]
    pub fn with_config(mut self, config: LoadConfig) -> Self {
        self.config = config;
        self
    }

    /// The front-end units are listed and checked by.
    pub fn frontend(&self) -> &F {
        &self.frontend
    }

    /// A unit loaded by an earlier call, if any.
    pub fn get(&self, id: &UnitId) -> Option<Arc<CompilationUnit>> {
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        registry.get(id).cloned()
    }

    /// Every unit loaded so far, ordered by id.
    pub fn units(&self) -> Vec<Arc<CompilationUnit>> {
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        registry
            .values()
            .sorted_by(|a, b| a.id().cmp(b.id()))
            .cloned()
            .collect()
    }

    /// Loads the units matching `patterns` together with their imports.
    ///
    /// Units already in the registry are reused, so loading the same roots
    /// twice yields the same `Arc`s.
    ///
    /// # Errors
    ///
    /// Fails when the patterns match nothing, when the front-end cannot list
    /// them, on internal consistency faults, and (unless errors are
    /// tolerated) when any reachable unit has errors.
    pub fn load(&self, patterns: &[String]) -> Result<Vec<Arc<CompilationUnit>>, LoadError> {
        info!("Loading units for {}", patterns.join(" "));
        let listing = self.frontend.list(patterns)?;
        if listing.roots.is_empty() {
            return Err(LoadError::no_match(patterns));
        }

        let initial: HashSet<&UnitId> = listing.roots.iter().collect();
        let mut graph: Graph = listing
            .units
            .into_iter()
            .map(|meta| {
                let is_initial = initial.contains(&meta.id);
                let unit = PendingUnit {
                    needs_source: is_initial || (!meta.external && !meta.is_unsafe()),
                    needs_types: is_initial,
                    imports: BTreeMap::new(),
                    import_errors: BTreeMap::new(),
                    state: VisitState::Init,
                    loaded: OnceLock::new(),
                    meta,
                };
                (unit.meta.id.clone(), unit)
            })
            .collect();

        for root in &listing.roots {
            match graph.get(root).map(|unit| unit.state) {
                None => return Err(LoadError::MissingRoot(root.to_string())),
                Some(VisitState::Init) => visit(&mut graph, root, &mut Vec::new()),
                Some(_) => {}
            }
        }
        mark_needs_types(&mut graph);

        let faults = Mutex::new(Vec::new());
        let roots: Vec<Arc<CompilationUnit>> = listing
            .roots
            .par_iter()
            .map(|root| self.load_recursive(&graph, root, &faults))
            .collect();

        let faults = faults.into_inner().unwrap_or_else(PoisonError::into_inner);
        if !faults.is_empty() {
            return Err(LoadError::internal(faults.join("; ")));
        }

        let mut seen = HashSet::new();
        let mut reported: Vec<UnitError> = Vec::new();
        for root in &roots {
            root.visit_with(
                &mut |unit| {
                    for err in unit.errors() {
                        error!("{}", err);
                        reported.push(err.clone());
                    }
                },
                &mut seen,
            );
        }
        info!(
            "Loaded {} root units ({} units visited, {} errors)",
            roots.len(),
            seen.len(),
            reported.len()
        );

        if reported.is_empty() || self.config.tolerate_errors {
            return Ok(roots);
        }
        match reported.len() {
            1 => Err(LoadError::Single(reported.remove(0))),
            n => Err(LoadError::Aggregate(n)),
        }
    }

    fn load_recursive(
        &self,
        graph: &Graph,
        id: &UnitId,
        faults: &Mutex<Vec<String>>,
    ) -> Arc<CompilationUnit> {
        let unit = &graph[id];
        unit.loaded
            .get_or_init(|| {
                if let Some(existing) = self.get(id) {
                    trace!("{} already in registry", id);
                    return existing;
                }
                let deps: Vec<&UnitId> = unit.imports.values().collect();
                fan_out(&deps, |dep| {
                    self.load_recursive(graph, dep, faults);
                });
                let loaded = Arc::new(self.load_unit(graph, unit, faults));
                let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
                registry.entry(id.clone()).or_insert(loaded).clone()
            })
            .clone()
    }

    /// Builds one unit. Every import has been loaded already.
    fn load_unit(
        &self,
        graph: &Graph,
        unit: &PendingUnit,
        faults: &Mutex<Vec<String>>,
    ) -> CompilationUnit {
        let meta = &unit.meta;
        let imports: BTreeMap<String, Arc<CompilationUnit>> = unit
            .imports
            .iter()
            .filter_map(|(path, dep)| {
                let loaded = graph.get(dep)?.loaded.get()?;
                Some((path.clone(), loaded.clone()))
            })
            .collect();

        let mut errors = Vec::new();
        let (syntax, symbols) = if meta.is_unsafe() || unit.needs_types {
            let resolver = |path: &str| -> Result<Arc<SymbolTable>, ImportError> {
                if let Some(err) = unit.import_errors.get(path) {
                    return Err(err.clone());
                }
                if !unit.imports.contains_key(path) {
                    return Err(ImportError::NoMetadata(path.to_string()));
                }
                match imports.get(path) {
                    Some(dep) if dep.symbols().is_complete() => Ok(dep.symbols.clone()),
                    _ => Err(ImportError::Internal {
                        path: path.to_string(),
                        importer: meta.import_path.clone(),
                    }),
                }
            };
            match self.frontend.typecheck(meta, &resolver) {
                Ok(checked) => {
                    errors = checked.errors;
                    (checked.syntax, Arc::new(checked.symbols))
                }
                Err(err) => {
                    if matches!(&err, FrontendError::Import(e) if e.is_internal()) {
                        faults
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .push(err.to_string());
                    }
                    errors.push(UnitError::new(None, err.to_string(), ErrorKind::List));
                    (Vec::new(), Arc::new(empty_symbols(meta)))
                }
            }
        } else {
            trace!("{} needs no types", meta.id);
            (Vec::new(), Arc::new(empty_symbols(meta)))
        };

        let ill_typed = !errors.is_empty() || imports.values().any(|dep| dep.is_ill_typed());
        debug!(
            "Loaded unit {} ({} files, {} errors, ill-typed: {})",
            meta.id,
            meta.files.len(),
            errors.len(),
            ill_typed
        );
        CompilationUnit {
            id: meta.id.clone(),
            name: meta.name.clone(),
            import_path: meta.import_path.clone(),
            files: meta.files.clone(),
            imports,
            symbols,
            syntax,
            errors,
            ill_typed,
        }
    }
}

fn empty_symbols(meta: &UnitMeta) -> SymbolTable {
    SymbolTable::new(PackageRef::new(meta.name.clone(), meta.import_path.clone()))
}

/// Depth-first walk fixing the import DAG. Edges to unknown units and edges
/// closing a cycle are dropped and recorded against the importing unit.
fn visit(graph: &mut Graph, id: &UnitId, stack: &mut Vec<UnitId>) {
    let Some(unit) = graph.get_mut(id) else {
        return;
    };
    unit.state = VisitState::Pending;
    let wanted: Vec<(String, UnitId)> = unit
        .meta
        .imports
        .iter()
        .map(|(path, dep)| (path.clone(), dep.clone()))
        .collect();
    stack.push(id.clone());

    for (path, dep) in wanted {
        let dropped = match graph.get(&dep).map(|u| u.state) {
            None => Some(ImportError::Missing(dep.to_string())),
            Some(VisitState::Pending) => {
                let start = stack.iter().position(|s| s == &dep).unwrap_or(0);
                let cycle = stack[start..].iter().chain([&dep]).join(" -> ");
                Some(ImportError::Cycle(cycle))
            }
            Some(VisitState::Init) => {
                visit(graph, &dep, stack);
                None
            }
            Some(VisitState::Done) => None,
        };
        let dep_needs_source = graph.get(&dep).is_some_and(|u| u.needs_source);
        let Some(unit) = graph.get_mut(id) else {
            continue;
        };
        match dropped {
            Some(err) => {
                warn!("{}: dropping import {:?}: {}", id, path, err);
                unit.import_errors.insert(path, err);
            }
            None => {
                trace!("{} imports {}", id, dep);
                unit.imports.insert(path, dep);
                unit.needs_source |= dep_needs_source;
            }
        }
    }

    stack.pop();
    if let Some(unit) = graph.get_mut(id) {
        unit.state = VisitState::Done;
    }
}

/// Units checked from source need the types of everything they import.
fn mark_needs_types(graph: &mut Graph) {
    let wanted: Vec<UnitId> = graph
        .values()
        .filter(|unit| unit.needs_source && unit.state == VisitState::Done)
        .flat_map(|unit| unit.imports.values().cloned())
        .collect();
    for id in wanted {
        if let Some(unit) = graph.get_mut(&id) {
            unit.needs_types = true;
        }
    }
}

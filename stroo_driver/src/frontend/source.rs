//! Front-end over `.go` sources, on disk or in memory.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tracing::{debug, trace};
use walkdir::WalkDir;

use stroo_common::symbols::{Object, ObjectKind, PackageRef, SymbolTable, Underlying};
use stroo_common::syntax::SourceFile;
use stroo_common::{ErrorKind, UnitError};

use super::checker;
use super::parser::parse_file;
use super::{Checked, Frontend, Listing, Resolver, UNSAFE_UNIT, UnitMeta};
use crate::{FrontendError, UnitId};

type Parsed = Result<Arc<SourceFile>, UnitError>;

/// Parse results per file, computed once even under concurrent loads.
#[derive(Debug, Default)]
struct ParseCache {
    entries: Mutex<HashMap<String, Arc<OnceLock<Parsed>>>>,
}

impl ParseCache {
    fn get_or_parse<F>(&self, file: &str, read: F) -> Parsed
    where
        F: FnOnce() -> std::io::Result<String>,
    {
        let cell = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries
                .entry(file.to_string())
                .or_insert_with(|| Arc::new(OnceLock::new()))
                .clone()
        };
        cell.get_or_init(|| {
            trace!("parsing {}", file);
            let path: Arc<str> = Arc::from(file);
            match read() {
                Ok(src) => parse_file(&path, &src).map(Arc::new),
                Err(err) => Err(UnitError::new(
                    None,
                    format!("reading {file}: {err}"),
                    ErrorKind::List,
                )),
            }
        })
        .clone()
    }
}

/// Reads units from a directory tree or from sources registered in memory.
///
/// On disk, a unit is a directory holding `.go` files (`_test.go` files
/// excluded) and its import path is the directory path relative to the root,
/// `.` for the root itself. Imports that match no unit become opaque
/// external units, unless strict imports are requested, in which case they
/// are left out of the listing.
#[derive(Debug, Default)]
pub struct SourceFrontend {
    root: Option<PathBuf>,
    memory: BTreeMap<String, BTreeMap<String, String>>,
    strict_imports: bool,
    cache: ParseCache,
}

impl SourceFrontend {
    /// A front-end reading units below `root`.
    ///
    /// # Errors
    ///
    /// Fails when `root` cannot be resolved.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, FrontendError> {
        let root = root.as_ref().canonicalize()?;
        Ok(Self {
            root: Some(root),
            ..Self::default()
        })
    }

    /// A front-end with no disk root; add sources with [`with_file`](Self::with_file).
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Registers `source` as file `file_name` of unit `import_path`.
    #[must_use]
    pub fn with_file(
        mut self,
        import_path: impl Into<String>,
        file_name: &str,
        source: impl Into<String>,
    ) -> Self {
        let import_path = import_path.into();
        let file = format!("{import_path}/{file_name}");
        self.memory
            .entry(import_path)
            .or_default()
            .insert(file, source.into());
        self
    }

    /// Leaves imports that match no unit out of the listing.
    #[must_use]
    pub const fn with_strict_imports(mut self, strict: bool) -> Self {
        self.strict_imports = strict;
        self
    }

    /// Display paths of the unit's files, `None` when no such unit exists.
    fn unit_files(&self, import_path: &str) -> Result<Option<Vec<String>>, FrontendError> {
        if let Some(files) = self.memory.get(import_path) {
            return Ok(Some(files.keys().cloned().collect()));
        }
        let Some(root) = &self.root else {
            return Ok(None);
        };
        let dir = dir_of(root, import_path);
        if !dir.is_dir() {
            return Ok(None);
        }
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type()?.is_file()
                && name.ends_with(".go")
                && !name.ends_with("_test.go")
            {
                files.push(if import_path == "." {
                    name
                } else {
                    format!("{import_path}/{name}")
                });
            }
        }
        files.sort();
        Ok((!files.is_empty()).then_some(files))
    }

    fn read(&self, import_path: &str, file: &str) -> std::io::Result<String> {
        if let Some(src) = self.memory.get(import_path).and_then(|f| f.get(file)) {
            return Ok(src.clone());
        }
        match &self.root {
            Some(root) => std::fs::read_to_string(root.join(file)),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{file} is not registered"),
            )),
        }
    }

    fn parse(&self, import_path: &str, file: &str) -> Parsed {
        self.cache
            .get_or_parse(file, || self.read(import_path, file))
    }

    /// Import paths of every unit known without following imports.
    fn all_units(&self) -> Vec<String> {
        let mut units: BTreeSet<String> = self.memory.keys().cloned().collect();
        if let Some(root) = &self.root {
            for entry in WalkDir::new(root)
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || !is_ignored_dir(e.file_name()))
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_dir())
            {
                let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
                let import_path = if rel.as_os_str().is_empty() {
                    ".".to_string()
                } else {
                    rel.to_string_lossy().replace('\\', "/")
                };
                units.insert(import_path);
            }
        }
        units.into_iter().collect()
    }

    fn match_pattern(&self, pattern: &str) -> Result<Vec<String>, FrontendError> {
        let pattern = pattern.strip_prefix("./").unwrap_or(pattern);
        let pattern = if pattern.is_empty() { "." } else { pattern };
        let candidates: Vec<String> = if pattern == "..." {
            self.all_units()
        } else if let Some(prefix) = pattern.strip_suffix("/...") {
            let prefix = if prefix == "." { "" } else { prefix };
            self.all_units()
                .into_iter()
                .filter(|unit| {
                    prefix.is_empty()
                        || unit == prefix
                        || unit.strip_prefix(prefix).is_some_and(|r| r.starts_with('/'))
                })
                .collect()
        } else {
            vec![pattern.to_string()]
        };
        let mut matched = Vec::new();
        for unit in candidates {
            if self.unit_files(&unit)?.is_some() {
                matched.push(unit);
            }
        }
        Ok(matched)
    }

    fn source_meta(&self, import_path: &str, files: Vec<String>) -> UnitMeta {
        let mut name = None;
        let mut imports = BTreeMap::new();
        for file in &files {
            // unparsable files are reported when the unit is checked
            if let Ok(file) = self.parse(import_path, file) {
                name.get_or_insert_with(|| file.package.name.clone());
                for spec in &file.imports {
                    imports.insert(spec.path.clone(), UnitId::new(spec.path.as_str()));
                }
            }
        }
        UnitMeta {
            id: UnitId::new(import_path),
            name: name.unwrap_or_else(|| last_segment(import_path)),
            import_path: import_path.to_string(),
            files,
            imports,
            external: false,
        }
    }
}

fn dir_of(root: &Path, import_path: &str) -> PathBuf {
    if import_path == "." {
        root.to_path_buf()
    } else {
        root.join(import_path)
    }
}

fn is_ignored_dir(name: &std::ffi::OsStr) -> bool {
    let name = name.to_string_lossy();
    name.starts_with('.') || name.starts_with('_') || name == "testdata" || name == "vendor"
}

fn last_segment(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

fn external_meta(import_path: &str) -> UnitMeta {
    UnitMeta {
        id: UnitId::new(import_path),
        name: last_segment(import_path),
        import_path: import_path.to_string(),
        files: Vec::new(),
        imports: BTreeMap::new(),
        external: true,
    }
}

fn unsafe_symbols() -> SymbolTable {
    let package = PackageRef::new(UNSAFE_UNIT, UNSAFE_UNIT);
    let mut table = SymbolTable::new(package.clone());
    table.insert(Object {
        name: "Pointer".to_string(),
        package,
        kind: ObjectKind::TypeName {
            underlying: Underlying::Basic("unsafe.Pointer".to_string()),
            is_alias: false,
        },
        pos: None,
    });
    table.mark_complete();
    table
}

impl Frontend for SourceFrontend {
    fn list(&self, patterns: &[String]) -> Result<Listing, FrontendError> {
        let mut roots = Vec::new();
        for pattern in patterns {
            for unit in self.match_pattern(pattern)? {
                let id = UnitId::new(unit.as_str());
                if !roots.contains(&id) {
                    roots.push(id);
                }
            }
        }

        let mut units = Vec::new();
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut queue: VecDeque<String> = roots.iter().map(|id| id.as_str().to_string()).collect();
        while let Some(import_path) = queue.pop_front() {
            if !seen.insert(import_path.clone()) {
                continue;
            }
            let meta = if import_path == UNSAFE_UNIT {
                external_meta(UNSAFE_UNIT)
            } else if let Some(files) = self.unit_files(&import_path)? {
                self.source_meta(&import_path, files)
            } else if self.strict_imports {
                debug!("import {:?} matches no unit", import_path);
                continue;
            } else {
                external_meta(&import_path)
            };
            queue.extend(meta.imports.keys().cloned());
            units.push(meta);
        }
        debug!("listed {} units for {} roots", units.len(), roots.len());
        Ok(Listing { roots, units })
    }

    fn typecheck(
        &self,
        meta: &UnitMeta,
        resolver: &Resolver<'_>,
    ) -> Result<Checked, FrontendError> {
        if meta.is_unsafe() {
            return Ok(Checked {
                syntax: Vec::new(),
                symbols: unsafe_symbols(),
                errors: Vec::new(),
            });
        }
        if meta.external {
            return Ok(Checked {
                syntax: Vec::new(),
                symbols: SymbolTable::opaque(PackageRef::new(
                    meta.name.clone(),
                    meta.import_path.clone(),
                )),
                errors: Vec::new(),
            });
        }

        let mut syntax = Vec::with_capacity(meta.files.len());
        let mut errors = Vec::new();
        for file in &meta.files {
            match self.parse(&meta.import_path, file) {
                Ok(file) if file.package.name != meta.name => errors.push(UnitError::typed(
                    file.package.pos.clone(),
                    format!(
                        "found packages {} and {} in {}",
                        meta.name, file.package.name, meta.import_path
                    ),
                )),
                Ok(file) => syntax.push(file),
                Err(err) => errors.push(err),
            }
        }
        let (symbols, type_errors) = checker::check(meta, &syntax, resolver)?;
        errors.extend(type_errors);
        Ok(Checked {
            syntax,
            symbols,
            errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> SourceFrontend {
        SourceFrontend::in_memory()
            .with_file("app", "main.go", "package app\nimport \"app/model\"\nimport \"fmt\"\n")
            .with_file("app/model", "item.go", "package model\ntype Item struct{}\n")
            .with_file("app/model/sub", "sub.go", "package sub\n")
    }

    fn patterns(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn lists_imports_transitively() {
        let listing = fixture().list(&patterns(&["app"])).expect("lists");
        assert_eq!(listing.roots, [UnitId::new("app")]);
        let paths: Vec<&str> = listing.units.iter().map(|u| u.import_path.as_str()).collect();
        assert_eq!(paths, ["app", "app/model", "fmt"]);
        assert!(listing.units[2].external);
        assert_eq!(listing.units[1].name, "model");
    }

    #[test]
    fn recursive_patterns_match_subtrees() {
        let listing = fixture()
            .list(&patterns(&["app/model/..."]))
            .expect("lists");
        assert_eq!(
            listing.roots,
            [UnitId::new("app/model"), UnitId::new("app/model/sub")]
        );
    }

    #[test]
    fn strict_imports_leave_unknown_paths_out() {
        let listing = fixture()
            .with_strict_imports(true)
            .list(&patterns(&["app"]))
            .expect("lists");
        assert!(listing.units.iter().all(|u| u.import_path != "fmt"));
    }

    #[test]
    fn unsafe_is_complete_and_not_opaque() {
        let frontend = SourceFrontend::in_memory();
        let checked = frontend
            .typecheck(
                &external_meta(UNSAFE_UNIT),
                &|p: &str| -> Result<Arc<SymbolTable>, crate::ImportError> {
                    Err(crate::ImportError::Missing(p.to_string()))
                },
            )
            .expect("checks");
        assert!(checked.symbols.is_complete());
        assert!(!checked.symbols.is_opaque());
        assert!(checked.symbols.lookup("Pointer").is_some());
    }

    #[test]
    fn parse_cache_reads_each_file_once() {
        let cache = ParseCache::default();
        let mut reads = 0;
        for _ in 0..3 {
            let parsed = cache.get_or_parse("p/a.go", || {
                reads += 1;
                Ok("package p\n".to_string())
            });
            assert!(parsed.is_ok());
        }
        assert_eq!(reads, 1);
    }
}

//! Generation state of one run.
//!
//! A [`Session`] owns the model, the bound `main` declaration and the
//! [`Keeper`]. Templates reach it through a [`SharedSession`], whose render
//! entry points hold the lock only to begin and to finish a render, never
//! while the section itself is rendered, so a section may generate other
//! kinds from inside its own body.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use minijinja::Value;
use stroo_common::GenConfig;
use stroo_common::kinds;
use stroo_model::{Declaration, Expander, PackageModel};
use tracing::{debug, trace, warn};

use crate::{Entry, GenError, Keeper};

/// A render handed out by [`Session::begin`]. Its key already holds the
/// sentinel.
#[derive(Debug, Clone)]
pub struct Job {
    /// Section to render.
    pub template: String,
    pub kind: String,
    /// Keeper key, template name followed by kind.
    pub key: String,
    /// The expanded declaration the section is rendered against.
    pub decl: serde_json::Value,
}

/// Why a kind was not rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    NotDeclared,
    AlreadyGenerated,
    Basic,
    Unknown,
    Imported,
    OtherPackage,
}

impl fmt::Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::NotDeclared => "no template declared",
            Self::AlreadyGenerated => "already generated",
            Self::Basic => "basic kind",
            Self::Unknown => "not a declaration of the package",
            Self::Imported => "imported declaration",
            Self::OtherPackage => "declared in another package",
        };
        f.write_str(reason)
    }
}

/// Outcome of starting a render.
#[derive(Debug)]
pub enum Begin {
    Render(Job),
    Skip(Skip),
}

/// State of one generation run: the model, the bound main declaration and the keeper.
pub struct Session {
    model: Arc<PackageModel>,
    config: GenConfig,
    main: Option<Declaration>,
    template_name: Option<String>,
    keeper: Keeper,
    imports: Vec<String>,
}

impl Session {
    /// A fresh session; the unit's own imports are already recorded.
    pub fn new(model: Arc<PackageModel>, config: GenConfig) -> Self {
        let mut session = Self {
            model,
            config,
            main: None,
            template_name: None,
            keeper: Keeper::new(),
            imports: Vec::new(),
        };
        let paths: Vec<String> = session
            .model
            .imports
            .iter()
            .map(|import| import.path.clone())
            .collect();
        for path in &paths {
            session.add_to_imports(path);
        }
        session
    }

    /// The model being generated from.
    pub fn model(&self) -> &Arc<PackageModel> {
        &self.model
    }

    /// The run configuration.
    pub const fn config(&self) -> &GenConfig {
        &self.config
    }

    /// The bound main declaration.
    pub const fn main(&self) -> Option<&Declaration> {
        self.main.as_ref()
    }

    /// The declared template name.
    pub fn template_name(&self) -> Option<&str> {
        self.template_name.as_deref()
    }

    /// Rendered and stored values.
    pub const fn keeper(&self) -> &Keeper {
        &self.keeper
    }

    /// Import paths collected so far.
    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    /// Binds the declaration the run is about.
    ///
    /// # Errors
    ///
    /// Fails when `selected` is neither the name nor the kind of a
    /// declaration.
    pub fn bind_main(&mut self, selected: &str) -> Result<&Declaration, GenError> {
        let decl = self
            .model
            .extract(selected)
            .cloned()
            .ok_or_else(|| GenError::UnknownType(selected.to_string()))?;
        debug!("Main declaration is {}", decl.name);
        Ok(self.main.insert(decl))
    }

    /// Selects the section the following renders use and marks `main` as
    /// being generated, so a self reference does not render it again.
    ///
    /// # Errors
    ///
    /// Fails on an empty name or when no main declaration is bound.
    pub fn declare(&mut self, name: &str) -> Result<(), GenError> {
        if name.is_empty() {
            return Err(GenError::EmptyTemplateName);
        }
        let main = self.main.as_ref().ok_or(GenError::NoMain)?;
        let key = format!("{name}{}", main.name);
        debug!("Declared {}", name);
        self.template_name = Some(name.to_string());
        self.keeper.insert(key, Entry::Pending);
        Ok(())
    }

    fn key_for(&self, kind: &str) -> Option<String> {
        self.template_name
            .as_ref()
            .map(|template| format!("{template}{kind}"))
    }

    /// First half of a render: checks that `kind` should be rendered and, if
    /// so, writes the sentinel. `package` defaults to the unit's own.
    ///
    /// # Errors
    ///
    /// Fails only if the declaration cannot be expanded.
    pub fn begin(&mut self, kind: &str, package: Option<&str>) -> Result<Begin, GenError> {
        let (Some(template), Some(key)) = (self.template_name.clone(), self.key_for(kind)) else {
            return Ok(Begin::Skip(Skip::NotDeclared));
        };
        if self.keeper.contains(&key) {
            return Ok(Begin::Skip(Skip::AlreadyGenerated));
        }
        if kinds::is_basic(kind) {
            return Ok(Begin::Skip(Skip::Basic));
        }
        let Some(decl) = self.model.extract(kind) else {
            return Ok(Begin::Skip(Skip::Unknown));
        };
        if decl.is_imported {
            return Ok(Begin::Skip(Skip::Imported));
        }
        if decl.package != package.unwrap_or(&self.model.name) {
            return Ok(Begin::Skip(Skip::OtherPackage));
        }

        let decl = Expander::new(&self.model).expand(decl)?;
        self.keeper.insert(key.clone(), Entry::Pending);
        Ok(Begin::Render(Job {
            template,
            kind: kind.to_string(),
            key,
            decl,
        }))
    }

    /// Second half of a render: replaces the sentinel with the text.
    pub fn finish(&mut self, job: Job, text: String) {
        trace!("Stored {}", job.key);
        self.keeper.insert(job.key, Entry::Rendered(text));
    }

    fn fail(&mut self, job: Job, comment: String) {
        self.keeper.insert(job.key, Entry::Failed(comment));
    }

    /// Every non-empty text stored under the active template name.
    pub fn list_stored(&self) -> Vec<String> {
        let Some(template) = self.template_name.as_deref() else {
            return Vec::new();
        };
        self.keeper
            .texts_with_prefix(template)
            .map(str::to_string)
            .collect()
    }

    /// Returns `true` when `key` was already present and got overwritten.
    pub fn store(&mut self, key: &str, value: Value) -> bool {
        self.keeper.insert(key.to_string(), Entry::Scratch(value))
    }

    /// # Errors
    ///
    /// Fails when nothing is stored under `key`.
    pub fn retrieve(&self, key: &str) -> Result<Value, GenError> {
        self.keeper
            .get(key)
            .map(Entry::to_value)
            .ok_or_else(|| GenError::NotStored(key.to_string()))
    }

    /// Whether `key` has a stored value.
    pub fn has_in_store(&self, key: &str) -> bool {
        let has = self.keeper.contains(key);
        trace!("Has in store {:?} = {}", key, has);
        has
    }

    /// Records an import path once; empty paths are ignored.
    pub fn add_to_imports(&mut self, path: &str) {
        if path.is_empty() || self.imports.iter().any(|known| known == path) {
            return;
        }
        self.imports.push(path.to_string());
    }
}

/// Inline comment stored in place of a failed render.
pub fn error_comment(kind: &str, err: &impl fmt::Display) -> String {
    format!("/* error generating {kind}: {err} */")
}

/// A [`Session`] shared between the generator and template callbacks.
#[derive(Clone)]
pub struct SharedSession(Arc<Mutex<Session>>);

impl SharedSession {
    /// Shares `session` with the template functions.
    pub fn new(session: Session) -> Self {
        Self(Arc::new(Mutex::new(session)))
    }

    /// Locks the session, ignoring poisoning.
    pub fn lock(&self) -> MutexGuard<'_, Session> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Renders `kind` with the declared section unless it was generated
    /// already or is not a local declaration. A failed render is stored as
    /// an inline comment and still counts as generated.
    pub fn generate_and_store<R>(&self, kind: &str, render: R) -> bool
    where
        R: FnOnce(&Job) -> Result<String, minijinja::Error>,
    {
        let begun = self.lock().begin(kind, None);
        let job = match begun {
            Ok(Begin::Render(job)) => job,
            Ok(Begin::Skip(reason)) => {
                trace!("Not generating {}: {}", kind, reason);
                return false;
            }
            Err(err) => {
                warn!("Not generating {}: {}", kind, err);
                return false;
            }
        };

        debug!("Generating {} for {}", job.template, kind);
        match render(&job) {
            Ok(text) => self.lock().finish(job, text),
            Err(err) => {
                warn!("Error generating {}: {}", kind, err);
                self.lock().fail(job, error_comment(kind, &err));
            }
        }
        true
    }

    /// Like [`generate_and_store`](Self::generate_and_store) for a kind of
    /// `package`, but a second request for the same kind is an error and a
    /// failed render is returned rather than stored.
    ///
    /// # Errors
    ///
    /// Fails without a declared template, for a kind stored already, and
    /// with the render's own error.
    pub fn recurse_generate<R>(&self, package: &str, kind: &str, render: R) -> Result<bool, GenError>
    where
        R: FnOnce(&Job) -> Result<String, minijinja::Error>,
    {
        let job = {
            let mut session = self.lock();
            let key = session.key_for(kind).ok_or(GenError::NotDeclared)?;
            if session.keeper.contains(&key) {
                return Err(GenError::AlreadyStored(kind.to_string()));
            }
            match session.begin(kind, Some(package))? {
                Begin::Render(job) => job,
                Begin::Skip(reason) => {
                    trace!("Not generating {}.{}: {}", package, kind, reason);
                    return Ok(false);
                }
            }
        };

        debug!("Generating {} for {}.{}", job.template, package, kind);
        match render(&job) {
            Ok(text) => {
                self.lock().finish(job, text);
                Ok(true)
            }
            Err(err) => {
                self.lock().keeper.remove(&job.key);
                Err(err.into())
            }
        }
    }
}

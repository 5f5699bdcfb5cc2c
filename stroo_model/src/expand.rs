use std::collections::{HashMap, HashSet};

use serde_json::{Value, json};

use crate::{Declaration, ModelError, PackageModel};

/// Serializes declarations with their references inlined.
///
/// The first occurrence of a declaration is expanded in full and cached; an
/// occurrence met while that same declaration is still being expanded
/// becomes `{"ref": "<name>"}`; later occurrences reuse the cached expansion.
/// An expander lives for one top-level call and is never shared.
pub struct Expander<'m> {
    model: &'m PackageModel,
    resolving: HashSet<String>,
    cache: HashMap<String, Value>,
}

impl<'m> Expander<'m> {
    /// A fresh context over `model`.
    pub fn new(model: &'m PackageModel) -> Self {
        Self {
            model,
            resolving: HashSet::new(),
            cache: HashMap::new(),
        }
    }

    /// # Errors
    ///
    /// Fails only if a declaration cannot be serialized.
    pub fn expand(&mut self, decl: &Declaration) -> Result<Value, ModelError> {
        if let Some(done) = self.cache.get(&decl.name) {
            return Ok(done.clone());
        }
        if self.resolving.contains(&decl.name) {
            return Ok(json!({ "ref": decl.name }));
        }

        self.resolving.insert(decl.name.clone());
        let expanded = self.expand_fresh(decl);
        self.resolving.remove(&decl.name);

        let value = expanded?;
        self.cache.insert(decl.name.clone(), value.clone());
        Ok(value)
    }

    fn expand_fresh(&mut self, decl: &Declaration) -> Result<Value, ModelError> {
        let model = self.model;
        let mut value = serde_json::to_value(decl)?;
        if let Some(target) = model.resolve(decl.reference.as_deref()) {
            value["reference"] = self.expand(target)?;
        }
        if let Some(Value::Array(fields)) = value.get_mut("fields") {
            for (field, slot) in decl.fields.iter().zip(fields.iter_mut()) {
                if let Some(target) = model.resolve(field.reference.as_deref()) {
                    slot["reference"] = self.expand(target)?;
                }
            }
        }
        Ok(value)
    }

    /// The whole model, every declaration expanded.
    ///
    /// # Errors
    ///
    /// See [`expand`](Self::expand).
    pub fn expand_model(&mut self) -> Result<Value, ModelError> {
        let model = self.model;
        let mut value = serde_json::to_value(model)?;
        let declarations = model
            .declarations
            .iter()
            .map(|decl| self.expand(decl))
            .collect::<Result<Vec<_>, _>>()?;
        value["declarations"] = Value::Array(declarations);
        Ok(value)
    }
}

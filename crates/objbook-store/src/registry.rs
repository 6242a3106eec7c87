//! The process-wide parameter registry.
//!
//! Append-only: classes are added at startup (or whenever a plugin loads)
//! and never removed or mutated. Lookups hand out `Arc`s, so a class stays
//! alive for as long as anything still refers to it.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use objbook_types::{ParamKind, TypeTag};

use crate::class::{ObjectClass, Param};
use crate::error::{StoreError, StoreResult};

/// Table of registered entity types.
#[derive(Debug, Default)]
pub struct Registry {
    classes: RwLock<HashMap<TypeTag, Arc<ObjectClass>>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class. Fails if the type name is taken.
    pub fn register(&self, class: ObjectClass) -> StoreResult<Arc<ObjectClass>> {
        // Append-only: a poisoned lock cannot hide a half-applied mutation.
        let mut classes = self.classes.write().unwrap_or_else(PoisonError::into_inner);
        if classes.contains_key(class.type_tag()) {
            return Err(StoreError::DuplicateType(class.type_tag().to_string()));
        }
        let class = Arc::new(class);
        debug!(
            type_tag = %class.type_tag(),
            params = class.params().len(),
            "registered entity type"
        );
        classes.insert(class.type_tag().clone(), Arc::clone(&class));
        Ok(class)
    }

    /// Look up a class by type name.
    pub fn find(&self, type_tag: &str) -> Option<Arc<ObjectClass>> {
        let classes = self.classes.read().unwrap_or_else(PoisonError::into_inner);
        classes.get(type_tag).cloned()
    }

    /// Like [`Registry::find`], but a missing type is an error.
    pub fn class(&self, type_tag: &str) -> StoreResult<Arc<ObjectClass>> {
        self.find(type_tag)
            .ok_or_else(|| StoreError::UnknownType(type_tag.to_string()))
    }

    /// Look up one parameter of a registered type.
    pub fn param(&self, type_tag: &str, name: &str) -> StoreResult<Arc<Param>> {
        let class = self.class(type_tag)?;
        class
            .param(name)
            .cloned()
            .ok_or_else(|| StoreError::UnknownParam {
                type_tag: type_tag.to_string(),
                param: name.to_string(),
            })
    }

    /// Returns `true` if the type is registered.
    pub fn contains(&self, type_tag: &str) -> bool {
        let classes = self.classes.read().unwrap_or_else(PoisonError::into_inner);
        classes.contains_key(type_tag)
    }

    /// The canonical tag for a registered type.
    pub fn intern(&self, type_tag: &str) -> Option<TypeTag> {
        self.find(type_tag).map(|class| class.type_tag().clone())
    }

    /// Resolve a kind name: a built-in kind, or a registered type (which
    /// makes it a reference). Anything else is unsupported.
    pub fn kind_of(&self, name: &str) -> StoreResult<ParamKind> {
        match ParamKind::from_name(name) {
            Ok(kind) => Ok(kind),
            Err(err) => self
                .intern(name)
                .map(ParamKind::Reference)
                .ok_or(StoreError::Type(err)),
        }
    }

    /// Registered type names, sorted.
    pub fn types(&self) -> Vec<TypeTag> {
        let classes = self.classes.read().unwrap_or_else(PoisonError::into_inner);
        let mut tags: Vec<TypeTag> = classes.keys().cloned().collect();
        tags.sort();
        tags
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! Named, typed object lookup
//!
//! Replaces bean-name based lookups: collaborators (endpoints, validators,
//! correlators) are bound explicitly by name and resolved by name and type.

use crate::ContextError;
use parking_lot::RwLock;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type Binding = Arc<dyn Any + Send + Sync>;

/// Registry of named objects shared by the test contexts of a suite
#[derive(Clone, Default)]
pub struct ReferenceResolver {
    bindings: Arc<RwLock<HashMap<(TypeId, String), Binding>>>,
}

impl ReferenceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `value` under `name`; a previous binding of the same type is replaced
    pub fn bind<T>(&self, name: impl Into<String>, value: T)
    where
        T: Send + Sync + 'static,
    {
        let name = name.into();
        tracing::debug!("Binding reference '{}' of type {}", name, type_name::<T>());
        self.bindings
            .write()
            .insert((TypeId::of::<T>(), name), Arc::new(value));
    }

    /// Resolve the object of type `T` bound under `name`
    pub fn resolve<T>(&self, name: &str) -> Result<T, ContextError>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.bindings
            .read()
            .get(&(TypeId::of::<T>(), name.to_string()))
            .and_then(|binding| binding.downcast_ref::<T>())
            .cloned()
            .ok_or_else(|| ContextError::UnresolvedReference {
                name: name.to_string(),
                type_name: type_name::<T>(),
            })
    }

    /// All objects of type `T`, sorted by name
    pub fn resolve_all<T>(&self) -> Vec<(String, T)>
    where
        T: Clone + Send + Sync + 'static,
    {
        let type_id = TypeId::of::<T>();
        let mut all: Vec<(String, T)> = self
            .bindings
            .read()
            .iter()
            .filter(|((id, _), _)| *id == type_id)
            .filter_map(|((_, name), binding)| {
                binding
                    .downcast_ref::<T>()
                    .map(|value| (name.clone(), value.clone()))
            })
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    pub fn is_resolvable<T>(&self, name: &str) -> bool
    where
        T: Send + Sync + 'static,
    {
        self.bindings
            .read()
            .contains_key(&(TypeId::of::<T>(), name.to_string()))
    }

    pub fn unbind<T>(&self, name: &str) -> bool
    where
        T: Send + Sync + 'static,
    {
        self.bindings
            .write()
            .remove(&(TypeId::of::<T>(), name.to_string()))
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.bindings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.read().is_empty()
    }
}

impl fmt::Debug for ReferenceResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .bindings
            .read()
            .keys()
            .map(|(_, name)| name.clone())
            .collect();
        f.debug_struct("ReferenceResolver")
            .field("bindings", &names)
            .finish()
    }
}

//! Component registry - Delegating name → class lookup.
//!
//! Registries form a chain: each level holds its own entries and falls back
//! to its parent level for anything it does not define. Merging two
//! registries therefore never copies the base side; the merged registry keeps
//! a reference to it, so components registered on the base *after* the merge
//! stay visible through the chain.
//!
//! Explicit registration stores a strong reference: the registry owns the
//! classes registered into it. Self-registration is the exception. A class
//! with a `name` registers itself into its own resolved configuration (that
//! is what lets a component render itself recursively by name), and a strong
//! entry there would pin the class alive through its own configuration, so
//! that path stores a weak reference instead.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::class::ComponentClass;

// =============================================================================
// Registry
// =============================================================================

#[derive(Clone)]
enum Entry {
    Strong(Rc<ComponentClass>),
    Weak(Weak<ComponentClass>),
}

impl Entry {
    fn upgrade(&self) -> Option<Rc<ComponentClass>> {
        match self {
            Entry::Strong(class) => Some(class.clone()),
            Entry::Weak(class) => class.upgrade(),
        }
    }
}

/// A two-level (and deeper, via chaining) name → component class lookup.
#[derive(Default)]
pub struct ComponentRegistry {
    local: RefCell<HashMap<String, Entry>>,
    parent: Option<Rc<ComponentRegistry>>,
}

impl ComponentRegistry {
    /// An empty root registry.
    pub fn new() -> Self {
        ComponentRegistry::default()
    }

    /// A registry whose own entries are `incoming`'s current entries and
    /// whose misses delegate to `base`.
    pub fn chained(base: Rc<ComponentRegistry>, incoming: &ComponentRegistry) -> Self {
        ComponentRegistry {
            local: RefCell::new(incoming.local.borrow().clone()),
            parent: Some(base),
        }
    }

    /// Register a class under `name` at this level. The registry keeps the
    /// class alive.
    pub fn register(&self, name: &str, class: &Rc<ComponentClass>) {
        self.local
            .borrow_mut()
            .insert(name.to_string(), Entry::Strong(class.clone()));
    }

    /// Register a class under `name` without keeping it alive. Used when a
    /// class registers itself into its own configuration.
    pub(crate) fn register_weak(&self, name: &str, class: &Rc<ComponentClass>) {
        self.local
            .borrow_mut()
            .insert(name.to_string(), Entry::Weak(Rc::downgrade(class)));
    }

    /// Look up `name`, checking this level first, then the chain.
    pub fn resolve(&self, name: &str) -> Option<Rc<ComponentClass>> {
        if let Some(class) = self.local.borrow().get(name).and_then(Entry::upgrade) {
            return Some(class);
        }
        self.parent.as_ref().and_then(|parent| parent.resolve(name))
    }

    /// Whether `name` is defined at this level (ignoring the chain).
    pub fn defines_locally(&self, name: &str) -> bool {
        self.local.borrow().contains_key(name)
    }

    /// Number of entries at this level.
    pub fn local_len(&self) -> usize {
        self.local.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigRecord;

    #[test]
    fn test_registered_class_stays_alive() {
        // The registry holds the only strong reference; resolution must
        // still find the class.
        let record = ConfigRecord::new()
            .with_component("item", &ComponentClass::define(ConfigRecord::new()));

        let registry = record.components().unwrap();
        assert!(registry.resolve("item").is_some());
    }

    #[test]
    fn test_self_registration_does_not_pin() {
        let class = ComponentClass::define(ConfigRecord::new().with_name("leaf"));
        let registry = class.resolve_config().components().unwrap();
        assert!(Rc::ptr_eq(&registry.resolve("leaf").unwrap(), &class));

        drop(class);
        assert!(registry.resolve("leaf").is_none());
    }
}

//! Component classes - Declaration, extension, option resolution.
//!
//! A `ComponentClass` is the template instances are created from. Classes
//! form an extension chain (`extend` produces a subclass), and a class's
//! *resolved* configuration is its own configuration merged with everything
//! inherited through that chain.
//!
//! Resolution is cached per class. The cache key is the *identity* of the
//! superclass's resolved record: any mutation that matters produces a new
//! record allocation (copy-on-write in `set_option`), so a cheap `Rc::ptr_eq`
//! detects staleness and invalidates subclasses transitively on their next
//! resolution. When the cache is stale, keys attached to the class after
//! declaration are recovered by diffing the live configuration against the
//! sealed declaration-time snapshot, folded into the recorded extension
//! arguments, and re-merged.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::merge::merge_config;
use crate::config::registry::ComponentRegistry;
use crate::config::{keys, ConfigRecord, ConfigValue};

static NEXT_CLASS_ID: AtomicUsize = AtomicUsize::new(0);

// =============================================================================
// Component class
// =============================================================================

/// A component template. Created once by [`ComponentClass::define`] or
/// [`ComponentClass::extend`], then instantiated any number of times.
pub struct ComponentClass {
    cid: usize,
    super_class: Option<Rc<ComponentClass>>,
    /// The live declared configuration. Copy-on-write: `set_option` replaces
    /// the allocation so identity-based staleness checks see the change.
    own_config: RefCell<Rc<ConfigRecord>>,
    /// Shallow snapshot of the configuration at declaration time, used to
    /// detect keys attached afterward.
    sealed_config: ConfigRecord,
    /// The arguments this class was extended with. Grows when late-attached
    /// keys are folded in, so future re-extensions see them too.
    extend_config: RefCell<ConfigRecord>,
    /// Cache: last computed merge of the super chain with `extend_config`.
    resolved: RefCell<Rc<ConfigRecord>>,
    /// Cache key: the superclass's resolved record at the time `resolved`
    /// was computed.
    resolved_super_snapshot: RefCell<Option<Rc<ConfigRecord>>>,
}

impl ComponentClass {
    /// Declare a root class (no superclass) from its configuration.
    pub fn define(config: ConfigRecord) -> Rc<ComponentClass> {
        let mut config = config;
        ensure_registry_for_name(&mut config);

        let sealed = config.clone();
        let config = Rc::new(config);

        let class = Rc::new(ComponentClass {
            cid: NEXT_CLASS_ID.fetch_add(1, Ordering::Relaxed),
            super_class: None,
            own_config: RefCell::new(config.clone()),
            sealed_config: sealed,
            extend_config: RefCell::new(ConfigRecord::new()),
            resolved: RefCell::new(config.clone()),
            resolved_super_snapshot: RefCell::new(None),
        });

        register_self(&class, &config);
        class
    }

    /// Extend this class into a subclass. The subclass's configuration is
    /// the resolved superclass configuration merged with `extend_config`.
    pub fn extend(self: &Rc<Self>, extend_config: ConfigRecord) -> Rc<ComponentClass> {
        let super_resolved = self.resolve_config();
        let mut merged = merge_config(&super_resolved, &extend_config, None);
        ensure_registry_for_name(&mut merged);

        let sealed = merged.clone();
        let merged = Rc::new(merged);

        let sub = Rc::new(ComponentClass {
            cid: NEXT_CLASS_ID.fetch_add(1, Ordering::Relaxed),
            super_class: Some(self.clone()),
            own_config: RefCell::new(merged.clone()),
            sealed_config: sealed,
            extend_config: RefCell::new(extend_config),
            resolved: RefCell::new(merged.clone()),
            resolved_super_snapshot: RefCell::new(Some(super_resolved)),
        });

        register_self(&sub, &merged);
        sub
    }

    /// Attach a configuration key after declaration.
    ///
    /// Copy-on-write: the live configuration is replaced with a new record so
    /// subclass caches keyed on its identity go stale. The diff against the
    /// sealed snapshot is shallow and identity-based; mutating a value in
    /// place behind an existing key is not detected, replacing it is.
    pub fn set_option(&self, key: &str, value: ConfigValue) {
        let next = {
            let current = self.own_config.borrow();
            let mut record = (**current).clone();
            record.set(key, value);
            Rc::new(record)
        };
        *self.own_config.borrow_mut() = next.clone();
        if self.super_class.is_none() {
            // Root classes resolve to their own configuration; keep the
            // cache in step so both paths hand out the same allocation.
            *self.resolved.borrow_mut() = next;
        }
    }

    /// Resolve this class's effective (fully inherited) configuration.
    ///
    /// O(1) when nothing changed: the cached record is returned as long as
    /// the superclass's resolved record is the same allocation it was when
    /// the cache was computed.
    pub fn resolve_config(self: &Rc<Self>) -> Rc<ConfigRecord> {
        let Some(super_class) = &self.super_class else {
            // A root class's own declared configuration is final.
            return self.own_config.borrow().clone();
        };

        let super_resolved = super_class.resolve_config();
        let cache_valid = self
            .resolved_super_snapshot
            .borrow()
            .as_ref()
            .is_some_and(|snapshot| Rc::ptr_eq(snapshot, &super_resolved));
        if cache_valid {
            return self.resolved.borrow().clone();
        }

        // Superclass configuration changed since the last resolution.
        *self.resolved_super_snapshot.borrow_mut() = Some(super_resolved.clone());

        if let Some(modified) = self.modified_options() {
            self.extend_config.borrow_mut().extend_from(&modified);
        }

        let mut merged = merge_config(&super_resolved, &self.extend_config.borrow(), None);
        ensure_registry_for_name(&mut merged);
        let merged = Rc::new(merged);

        *self.own_config.borrow_mut() = merged.clone();
        *self.resolved.borrow_mut() = merged.clone();
        register_self(self, &merged);
        merged
    }

    /// Keys whose live value differs (by identity) from the sealed
    /// declaration-time snapshot: configuration attached after declaration.
    fn modified_options(&self) -> Option<ConfigRecord> {
        let own = self.own_config.borrow();
        let mut modified: Option<ConfigRecord> = None;
        for (key, value) in own.iter() {
            let unchanged = self
                .sealed_config
                .get(key)
                .is_some_and(|sealed| sealed.ptr_eq(value));
            if !unchanged {
                modified
                    .get_or_insert_with(ConfigRecord::new)
                    .set(key, value.clone());
            }
        }
        modified
    }

    /// The resolved configuration as last computed, without revalidation.
    /// This is what framework-created child instances delegate to.
    pub fn cached_config(&self) -> Rc<ConfigRecord> {
        self.resolved.borrow().clone()
    }

    /// Process-unique class id.
    pub fn cid(&self) -> usize {
        self.cid
    }

    pub fn super_class(&self) -> Option<&Rc<ComponentClass>> {
        self.super_class.as_ref()
    }
}

/// A class with a `name` registers into its own component registry, so it can
/// be rendered recursively by name. Guarantee the registry exists first.
fn ensure_registry_for_name(config: &mut ConfigRecord) {
    if config.name().is_some() && config.components().is_none() {
        config.set(
            keys::COMPONENTS,
            ConfigValue::Components(Rc::new(ComponentRegistry::new())),
        );
    }
}

fn register_self(class: &Rc<ComponentClass>, config: &ConfigRecord) {
    if let Some(name) = config.name() {
        if let Some(registry) = config.components() {
            // Weak: a strong entry would pin the class alive through its
            // own configuration.
            registry.register_weak(&name, class);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn plain(v: impl Into<Value>) -> ConfigValue {
        ConfigValue::Plain(Rc::new(v.into()))
    }

    #[test]
    fn test_resolve_twice_returns_identical_cache() {
        let base = ComponentClass::define(ConfigRecord::new().with_value("x", 1));
        let child = base.extend(ConfigRecord::new().with_value("y", 2));

        let first = child.resolve_config();
        let second = child.resolve_config();
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_super_change_invalidates_and_merges_new_keys() {
        let base = ComponentClass::define(ConfigRecord::new().with_value("x", 1));
        let child = base.extend(ConfigRecord::new().with_value("x", 10));

        let before = child.resolve_config();
        assert!(before.get("z").is_none());

        base.set_option("z", plain(3));

        let after = child.resolve_config();
        assert!(!Rc::ptr_eq(&before, &after));
        assert_eq!(after.get("z").unwrap().as_plain().unwrap().as_int(), Some(3));
        // Child's own value still wins under override.
        assert_eq!(after.get("x").unwrap().as_plain().unwrap().as_int(), Some(10));
    }

    #[test]
    fn test_late_attached_key_visible_to_subclass() {
        // Declared {x: 1}, then y attached after declaration: a subclass
        // resolution must pick y up even though the sealed snapshot lacks it.
        let base = ComponentClass::define(ConfigRecord::new().with_value("x", 1));
        let child = base.extend(ConfigRecord::new());

        base.set_option("y", plain(2));

        let resolved = child.resolve_config();
        assert_eq!(resolved.get("y").unwrap().as_plain().unwrap().as_int(), Some(2));
        assert_eq!(resolved.get("x").unwrap().as_plain().unwrap().as_int(), Some(1));
    }

    #[test]
    fn test_grandchild_invalidates_transitively() {
        let base = ComponentClass::define(ConfigRecord::new().with_value("x", 1));
        let child = base.extend(ConfigRecord::new());
        let grandchild = child.extend(ConfigRecord::new());

        let before = grandchild.resolve_config();
        base.set_option("late", plain(9));
        let after = grandchild.resolve_config();

        assert!(!Rc::ptr_eq(&before, &after));
        assert_eq!(
            after.get("late").unwrap().as_plain().unwrap().as_int(),
            Some(9)
        );
    }

    #[test]
    fn test_subclass_late_attach_folds_into_extend_config() {
        let base = ComponentClass::define(ConfigRecord::new().with_value("x", 1));
        let child = base.extend(ConfigRecord::new().with_value("y", 2));

        // Late-attach on the subclass itself. Recovered on the next
        // resolution triggered by a super change.
        child.set_option("w", plain(7));
        base.set_option("z", plain(3));

        let resolved = child.resolve_config();
        assert_eq!(resolved.get("w").unwrap().as_plain().unwrap().as_int(), Some(7));
        assert_eq!(resolved.get("z").unwrap().as_plain().unwrap().as_int(), Some(3));
        assert_eq!(resolved.get("y").unwrap().as_plain().unwrap().as_int(), Some(2));
    }

    #[test]
    fn test_named_class_registers_itself() {
        let class = ComponentClass::define(ConfigRecord::new().with_name("tree-item"));
        let resolved = class.resolve_config();
        let registry = resolved.components().unwrap();
        assert!(Rc::ptr_eq(&registry.resolve("tree-item").unwrap(), &class));
    }

    #[test]
    fn test_named_subclass_registers_itself() {
        let base = ComponentClass::define(ConfigRecord::new());
        let sub = base.extend(ConfigRecord::new().with_name("leaf"));
        let registry = sub.resolve_config().components().unwrap();
        assert!(Rc::ptr_eq(&registry.resolve("leaf").unwrap(), &sub));
    }

    #[test]
    fn test_methods_inherited_through_chain() {
        let base = ComponentClass::define(
            ConfigRecord::new().with_method("m", |_, _| Value::from(1)),
        );
        let child = base.extend(ConfigRecord::new());

        let resolved = child.resolve_config();
        let methods = resolved.methods().unwrap();
        assert!(methods.contains_key("m"));
    }

    #[test]
    fn test_cids_are_unique() {
        let a = ComponentClass::define(ConfigRecord::new());
        let b = ComponentClass::define(ConfigRecord::new());
        assert_ne!(a.cid(), b.cid());
    }

    #[test]
    fn test_in_place_mutation_not_detected() {
        // The late-attach diff is identity-based: replacing a value is
        // seen, writing through the same allocation is not.
        let base = ComponentClass::define(ConfigRecord::new().with_value("x", 1));
        let child = base.extend(ConfigRecord::new());

        let before = child.resolve_config();
        // Same allocation re-set under the same key: identity unchanged.
        let same = base.own_config.borrow().get("x").unwrap().clone();
        base.set_option("x", same);

        // own_config identity changed (copy-on-write), so the child does
        // recompute, but the diff finds nothing modified.
        let after = child.resolve_config();
        assert_eq!(after.get("x").unwrap().as_plain().unwrap().as_int(), Some(1));
        let _ = before;
    }
}

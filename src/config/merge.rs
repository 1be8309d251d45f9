//! Options merger - Per-key strategy merge of configuration records.
//!
//! `merge_config` produces a new record over the union of keys of `base` and
//! `incoming`. Each key resolves to a merge strategy from a thread-local
//! strategy table, defaulting to **override** (incoming wins when present).
//! Built-in strategy classes:
//!
//! - **override** - the default. Plain settings, data factories, render
//!   functions and provisions: the subclass replaces the base.
//! - **concatenate** - hook lists and watch handler lists. Base entries come
//!   first, so inherited hooks run before subclass-added hooks.
//! - **asset-chain** - component registries. The merged registry delegates to
//!   the base rather than copying it, so components registered on the base
//!   after the merge stay visible.
//! - **union** - method / prop / computed / inject maps. Entry-wise union,
//!   incoming entry wins on collision.
//!
//! The table is an extension point: `set_merge_strategy` installs a custom
//! strategy for a key. The `owner` argument is passed through untouched so
//! custom strategies can resolve owner-relative defaults; the merger itself
//! is side-effect-free.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::instance::Instance;

use super::registry::ComponentRegistry;
use super::{keys, ConfigRecord, ConfigValue};

// =============================================================================
// Strategy table
// =============================================================================

/// A merge strategy for one option key. Receives the base and incoming values
/// (either may be absent) and the owning instance when merging for an
/// instantiation; returns the merged value, or `None` to omit the key.
pub type MergeStrategy =
    Rc<dyn Fn(Option<&ConfigValue>, Option<&ConfigValue>, Option<&Instance>) -> Option<ConfigValue>>;

thread_local! {
    static STRATEGIES: RefCell<HashMap<String, MergeStrategy>> =
        RefCell::new(default_strategies());
}

fn default_strategies() -> HashMap<String, MergeStrategy> {
    let mut table: HashMap<String, MergeStrategy> = HashMap::new();

    let concat: MergeStrategy = Rc::new(concat_hooks);
    for &key in keys::HOOK_KEYS {
        table.insert(key.to_string(), concat.clone());
    }

    table.insert(keys::COMPONENTS.to_string(), Rc::new(chain_components));
    table.insert(keys::WATCH.to_string(), Rc::new(concat_watch));
    table.insert(keys::METHODS.to_string(), Rc::new(union_methods));
    table.insert(keys::PROPS.to_string(), Rc::new(union_props));
    table.insert(keys::COMPUTED.to_string(), Rc::new(union_computed));
    table.insert(keys::INJECT.to_string(), Rc::new(union_inject));

    table
}

/// Install a custom merge strategy for `key`.
pub fn set_merge_strategy(
    key: impl Into<String>,
    strategy: impl Fn(Option<&ConfigValue>, Option<&ConfigValue>, Option<&Instance>) -> Option<ConfigValue>
        + 'static,
) {
    STRATEGIES.with(|table| {
        table.borrow_mut().insert(key.into(), Rc::new(strategy));
    });
}

/// Restore the built-in strategy table (for testing).
pub fn reset_merge_strategies() {
    STRATEGIES.with(|table| {
        *table.borrow_mut() = default_strategies();
    });
}

fn strategy_for(key: &str) -> MergeStrategy {
    STRATEGIES
        .with(|table| table.borrow().get(key).cloned())
        .unwrap_or_else(|| Rc::new(override_value))
}

// =============================================================================
// Merge
// =============================================================================

/// Merge two configuration records. Pure: produces a new record, mutates
/// neither input. A missing side behaves as an empty record, so callers with
/// no incoming configuration pass `&ConfigRecord::default()`.
pub fn merge_config(
    base: &ConfigRecord,
    incoming: &ConfigRecord,
    owner: Option<&Instance>,
) -> ConfigRecord {
    let mut merged = ConfigRecord::new();

    let mut all_keys: Vec<&str> = base.keys().collect();
    for key in incoming.keys() {
        if !base.contains(key) {
            all_keys.push(key);
        }
    }

    for key in all_keys {
        // Clone the strategy out so a strategy may itself install strategies.
        let strategy = strategy_for(key);
        if let Some(value) = strategy(base.get(key), incoming.get(key), owner) {
            merged.set(key, value);
        }
    }

    merged
}

// =============================================================================
// Built-in strategies
// =============================================================================

/// Incoming replaces base when present.
fn override_value(
    base: Option<&ConfigValue>,
    incoming: Option<&ConfigValue>,
    _owner: Option<&Instance>,
) -> Option<ConfigValue> {
    incoming.or(base).cloned()
}

/// Hook lists concatenate, base first. An incoming hook already present in
/// the base (same allocation) is skipped, so re-merging a previously merged
/// list does not double-run inherited hooks.
fn concat_hooks(
    base: Option<&ConfigValue>,
    incoming: Option<&ConfigValue>,
    _owner: Option<&Instance>,
) -> Option<ConfigValue> {
    match (base, incoming) {
        (Some(ConfigValue::Hooks(base)), Some(ConfigValue::Hooks(incoming))) => {
            let mut hooks = (**base).clone();
            for hook in incoming.iter() {
                if !hooks.iter().any(|existing| Rc::ptr_eq(existing, hook)) {
                    hooks.push(hook.clone());
                }
            }
            Some(ConfigValue::Hooks(Rc::new(hooks)))
        }
        (_, Some(incoming)) => Some(incoming.clone()),
        (Some(base), None) => Some(base.clone()),
        (None, None) => None,
    }
}

/// Watch maps union by key; handler lists for a shared key concatenate, base
/// first, with the same already-present dedupe as hooks.
fn concat_watch(
    base: Option<&ConfigValue>,
    incoming: Option<&ConfigValue>,
    _owner: Option<&Instance>,
) -> Option<ConfigValue> {
    match (base, incoming) {
        (Some(ConfigValue::Watch(base)), Some(ConfigValue::Watch(incoming))) => {
            let mut watch = (**base).clone();
            for (key, handlers) in incoming.iter() {
                let merged = watch.entry(key.clone()).or_default();
                for handler in handlers {
                    if !merged.iter().any(|existing| Rc::ptr_eq(existing, handler)) {
                        merged.push(handler.clone());
                    }
                }
            }
            Some(ConfigValue::Watch(Rc::new(watch)))
        }
        (_, Some(incoming)) => Some(incoming.clone()),
        (Some(base), None) => Some(base.clone()),
        (None, None) => None,
    }
}

/// Component registries chain: the merged registry holds the incoming
/// entries and delegates misses to the base registry by reference.
fn chain_components(
    base: Option<&ConfigValue>,
    incoming: Option<&ConfigValue>,
    _owner: Option<&Instance>,
) -> Option<ConfigValue> {
    match (base, incoming) {
        (Some(ConfigValue::Components(base)), Some(ConfigValue::Components(incoming))) => Some(
            ConfigValue::Components(Rc::new(ComponentRegistry::chained(base.clone(), incoming))),
        ),
        (_, Some(incoming)) => Some(incoming.clone()),
        (Some(base), None) => Some(base.clone()),
        (None, None) => None,
    }
}

macro_rules! union_maps {
    ($base:expr, $incoming:expr, $variant:ident) => {
        match ($base, $incoming) {
            (Some(ConfigValue::$variant(base)), Some(ConfigValue::$variant(incoming))) => {
                let mut merged = (**base).clone();
                for (key, value) in incoming.iter() {
                    merged.insert(key.clone(), value.clone());
                }
                Some(ConfigValue::$variant(Rc::new(merged)))
            }
            (_, Some(incoming)) => Some(incoming.clone()),
            (Some(base), None) => Some(base.clone()),
            (None, None) => None,
        }
    };
}

fn union_methods(
    base: Option<&ConfigValue>,
    incoming: Option<&ConfigValue>,
    _owner: Option<&Instance>,
) -> Option<ConfigValue> {
    union_maps!(base, incoming, Methods)
}

fn union_props(
    base: Option<&ConfigValue>,
    incoming: Option<&ConfigValue>,
    _owner: Option<&Instance>,
) -> Option<ConfigValue> {
    union_maps!(base, incoming, Props)
}

fn union_computed(
    base: Option<&ConfigValue>,
    incoming: Option<&ConfigValue>,
    _owner: Option<&Instance>,
) -> Option<ConfigValue> {
    union_maps!(base, incoming, Computed)
}

fn union_inject(
    base: Option<&ConfigValue>,
    incoming: Option<&ConfigValue>,
    _owner: Option<&Instance>,
) -> Option<ConfigValue> {
    union_maps!(base, incoming, Inject)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;
    use crate::class::ComponentClass;
    use crate::value::Value;

    #[test]
    fn test_override_incoming_wins() {
        let base = ConfigRecord::new().with_value("x", 1).with_value("y", 2);
        let incoming = ConfigRecord::new().with_value("x", 10);

        let merged = merge_config(&base, &incoming, None);
        assert_eq!(merged.get("x").unwrap().as_plain().unwrap().as_int(), Some(10));
        assert_eq!(merged.get("y").unwrap().as_plain().unwrap().as_int(), Some(2));
    }

    #[test]
    fn test_absent_sides_treated_as_empty() {
        let record = ConfigRecord::new().with_value("x", 1);
        let empty = ConfigRecord::default();

        let merged = merge_config(&empty, &record, None);
        assert_eq!(merged.len(), 1);
        let merged = merge_config(&record, &empty, None);
        assert_eq!(merged.len(), 1);
        let merged = merge_config(&empty, &empty, None);
        assert!(merged.is_empty());
    }

    #[test]
    fn test_hooks_concatenate_base_first() {
        let order = Rc::new(RefCell::new(Vec::new()));

        let o = order.clone();
        let base = ConfigRecord::new().with_hook(keys::CREATED, move |_| {
            o.borrow_mut().push("a");
            Ok(())
        });
        let o = order.clone();
        let incoming = ConfigRecord::new().with_hook(keys::CREATED, move |_| {
            o.borrow_mut().push("b");
            Ok(())
        });

        let merged = merge_config(&base, &incoming, None);
        let hooks = merged.hooks(keys::CREATED).unwrap();
        assert_eq!(hooks.len(), 2);

        let vm = crate::Instance::new(&ComponentClass::define(ConfigRecord::new()), crate::InstanceArgs::User(ConfigRecord::new())).unwrap();
        for hook in hooks.iter() {
            hook(&vm).unwrap();
        }
        assert_eq!(*order.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn test_hooks_remerge_does_not_duplicate() {
        let base = ConfigRecord::new().with_hook(keys::CREATED, |_| Ok(()));
        let incoming = ConfigRecord::new().with_hook(keys::CREATED, |_| Ok(()));

        let once = merge_config(&base, &incoming, None);
        let twice = merge_config(&base, &once, None);
        assert_eq!(twice.hooks(keys::CREATED).unwrap().len(), 2);
    }

    #[test]
    fn test_asset_chain_delegates_and_sees_late_base_registration() {
        let base_registry = Rc::new(ComponentRegistry::new());
        let incoming_registry = ComponentRegistry::new();

        let item = ComponentClass::define(ConfigRecord::new());
        incoming_registry.register("item", &item);

        let mut base = ConfigRecord::new();
        base.set(keys::COMPONENTS, ConfigValue::Components(base_registry.clone()));
        let mut incoming = ConfigRecord::new();
        incoming.set(
            keys::COMPONENTS,
            ConfigValue::Components(Rc::new(incoming_registry)),
        );

        let merged = merge_config(&base, &incoming, None);
        let chained = merged.components().unwrap();

        // Incoming side is found first.
        assert!(Rc::ptr_eq(&chained.resolve("item").unwrap(), &item));

        // A registration on the base after the merge is visible through
        // the chain: no copying happened.
        let late = ComponentClass::define(ConfigRecord::new());
        base_registry.register("late", &late);
        assert!(Rc::ptr_eq(&chained.resolve("late").unwrap(), &late));
    }

    #[test]
    fn test_methods_union_incoming_wins() {
        let base = ConfigRecord::new()
            .with_method("m", |_, _| Value::from(1))
            .with_method("n", |_, _| Value::from(2));
        let incoming = ConfigRecord::new().with_method("m", |_, _| Value::from(10));

        let merged = merge_config(&base, &incoming, None);
        let methods = merged.methods().unwrap();
        assert_eq!(methods.len(), 2);
        assert!(Rc::ptr_eq(
            methods.get("m").unwrap(),
            incoming.methods().unwrap().get("m").unwrap()
        ));
        assert!(Rc::ptr_eq(
            methods.get("n").unwrap(),
            base.methods().unwrap().get("n").unwrap()
        ));
    }

    #[test]
    fn test_custom_strategy_extension_point() {
        reset_merge_strategies();

        let calls = Rc::new(Cell::new(0));
        let calls_seen = calls.clone();
        set_merge_strategy("custom", move |base, incoming, _| {
            calls_seen.set(calls_seen.get() + 1);
            base.or(incoming).cloned()
        });

        let base = ConfigRecord::new().with_value("custom", 1);
        let incoming = ConfigRecord::new().with_value("custom", 2);
        let merged = merge_config(&base, &incoming, None);

        assert_eq!(calls.get(), 1);
        // Base-wins, per the custom strategy.
        assert_eq!(
            merged.get("custom").unwrap().as_plain().unwrap().as_int(),
            Some(1)
        );

        reset_merge_strategies();
    }
}

//! State initialization - Props, methods, data, computed, watchers.
//!
//! Fixed order, because each layer may read the previous ones: methods may
//! reference props, the data factory may reference props and methods,
//! computed getters may reference data, watchers may reference computed
//! properties.
//!
//! Reactivity is delegated to `spark-signals`: each prop and data key gets a
//! signal, each computed property a derived (lazy, cached,
//! dependency-tracked), each watcher an effect whose stop function is kept
//! for teardown. A derived or effect reading through [`Instance::get`] picks
//! up dependencies on the underlying slots automatically.

use std::collections::HashMap;
use std::rc::Rc;

use spark_signals::{derived, effect, signal};

use crate::value::Value;

use super::{ComputedSlot, Instance};

pub(crate) fn init_state(vm: &Rc<Instance>) {
    init_props(vm);
    init_methods(vm);
    init_data(vm);
    init_computed(vm);
    init_watchers(vm);
}

// =============================================================================
// Props
// =============================================================================

/// Declared input properties, validated against the class's prop schema.
/// Validation failures are dev-mode diagnostics only; the value is kept.
fn init_props(vm: &Instance) {
    let Some(schema) = vm.config.borrow().props() else {
        return;
    };
    let supplied = vm.config.borrow().props_data.clone();

    let mut props = vm.props.borrow_mut();
    for (name, spec) in schema.iter() {
        let value = match supplied.get(name) {
            Some(value) => value.clone(),
            None => {
                if cfg!(debug_assertions) && spec.required {
                    tracing::warn!(uid = vm.uid(), prop = %name, "missing required prop");
                }
                spec.default.clone().unwrap_or(Value::Null)
            }
        };

        if cfg!(debug_assertions) {
            if let Some(expected) = spec.expected {
                if !value.is_null() && value.kind() != expected {
                    tracing::warn!(
                        uid = vm.uid(),
                        prop = %name,
                        ?expected,
                        got = ?value.kind(),
                        "prop kind mismatch"
                    );
                }
            }
            if let Some(validator) = &spec.validator {
                if !validator(&value) {
                    tracing::warn!(uid = vm.uid(), prop = %name, "prop failed validator");
                }
            }
        }

        props.insert(name.clone(), signal(value));
    }
}

// =============================================================================
// Methods
// =============================================================================

fn init_methods(vm: &Instance) {
    let Some(methods) = vm.config.borrow().methods() else {
        return;
    };

    if cfg!(debug_assertions) {
        for name in methods.keys() {
            if vm.props.borrow().contains_key(name) {
                tracing::warn!(uid = vm.uid(), name = %name, "method name collides with a prop");
            }
        }
    }

    *vm.methods.borrow_mut() = (*methods).clone();
}

// =============================================================================
// Data
// =============================================================================

/// Run the data factory (props and methods are live at this point) and wrap
/// each entry in a signal.
fn init_data(vm: &Instance) {
    let Some(factory) = vm.config.borrow().data_factory() else {
        return;
    };
    let entries = factory(vm);

    let mut data = vm.data.borrow_mut();
    for (key, value) in entries {
        if cfg!(debug_assertions)
            && (vm.props.borrow().contains_key(&key) || vm.methods.borrow().contains_key(&key))
        {
            tracing::warn!(uid = vm.uid(), key = %key, "data key collides with a prop or method");
        }
        data.insert(key, signal(value));
    }
}

// =============================================================================
// Computed
// =============================================================================

/// One derived per computed key. The getter captures the instance weakly:
/// the instance owns the derived, not the other way around.
fn init_computed(vm: &Rc<Instance>) {
    let Some(computed) = vm.config.borrow().computed() else {
        return;
    };

    let mut slots = HashMap::new();
    for (name, getter) in computed.iter() {
        if cfg!(debug_assertions)
            && (vm.props.borrow().contains_key(name) || vm.data.borrow().contains_key(name))
        {
            tracing::warn!(
                uid = vm.uid(),
                name = %name,
                "computed key collides with a prop or data key"
            );
        }

        let weak = Rc::downgrade(vm);
        let getter = getter.clone();
        let slot: ComputedSlot = derived(move || match weak.upgrade() {
            Some(vm) => getter(&vm),
            None => Value::Null,
        });
        slots.insert(name.clone(), slot);
    }
    vm.computed.borrow_mut().extend(slots);
}

// =============================================================================
// Watchers
// =============================================================================

/// One effect per watched key. The effect's first run only records the
/// current value; handlers fire on subsequent changes with (new, old).
fn init_watchers(vm: &Rc<Instance>) {
    let Some(watch) = vm.config.borrow().watch() else {
        return;
    };

    let mut stops = vm.watch_stops.borrow_mut();
    for (key, handlers) in watch.iter() {
        let weak = Rc::downgrade(vm);
        let key = key.clone();
        let handlers = handlers.clone();
        let mut previous: Option<Value> = None;

        let stop = effect(move || {
            let Some(vm) = weak.upgrade() else {
                return;
            };
            // Tracked read: re-runs when the watched slot changes.
            let current = vm.get(&key).unwrap_or(Value::Null);
            if let Some(old) = previous.replace(current.clone()) {
                if old != current {
                    for handler in &handlers {
                        handler(&vm, &current, &old);
                    }
                }
            }
        });
        stops.push(Box::new(stop));
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::class::ComponentClass;
    use crate::config::{ConfigRecord, PropSpec};
    use crate::instance::InstanceArgs;
    use crate::value::ValueKind;

    fn instantiate(config: ConfigRecord) -> Rc<Instance> {
        let class = ComponentClass::define(config);
        Instance::new(&class, InstanceArgs::User(ConfigRecord::new())).unwrap()
    }

    #[test]
    fn test_data_factory_sees_props_and_methods() {
        let class = ComponentClass::define(
            ConfigRecord::new()
                .with_prop("base", PropSpec::of_kind(ValueKind::Int).with_default(10))
                .with_method("double", |vm, _| {
                    Value::from(vm.get("base").unwrap().as_int().unwrap() * 2)
                })
                .with_data(|vm| {
                    let doubled = vm.call("double", &[]).unwrap();
                    HashMap::from([("doubled".to_string(), doubled)])
                }),
        );
        let vm = Instance::new(&class, InstanceArgs::User(ConfigRecord::new())).unwrap();
        assert_eq!(vm.get("doubled"), Some(Value::from(20)));
    }

    #[test]
    fn test_computed_tracks_data() {
        let vm = instantiate(
            ConfigRecord::new()
                .with_data(|_| HashMap::from([("n".to_string(), Value::from(2))]))
                .with_computed("squared", |vm| {
                    let n = vm.get("n").unwrap().as_int().unwrap();
                    Value::from(n * n)
                }),
        );

        assert_eq!(vm.get("squared"), Some(Value::from(4)));
        vm.set("n", 5);
        assert_eq!(vm.get("squared"), Some(Value::from(25)));
    }

    #[test]
    fn test_watcher_sees_new_and_old() {
        let seen: Rc<RefCell<Vec<(Value, Value)>>> = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();

        let vm = instantiate(
            ConfigRecord::new()
                .with_data(|_| HashMap::from([("n".to_string(), Value::from(1))]))
                .with_watch("n", move |_, new, old| {
                    log.borrow_mut().push((new.clone(), old.clone()));
                }),
        );

        // First run only records; no handler invocation.
        assert!(seen.borrow().is_empty());

        vm.set("n", 2);
        assert_eq!(*seen.borrow(), vec![(Value::from(2), Value::from(1))]);
    }

    #[test]
    fn test_watcher_on_computed() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();

        let vm = instantiate(
            ConfigRecord::new()
                .with_data(|_| HashMap::from([("n".to_string(), Value::from(1))]))
                .with_computed("plus_one", |vm| {
                    Value::from(vm.get("n").unwrap().as_int().unwrap() + 1)
                })
                .with_watch("plus_one", move |_, new, _| {
                    log.borrow_mut().push(new.clone());
                }),
        );

        vm.set("n", 9);
        assert_eq!(*seen.borrow(), vec![Value::from(10)]);
        let _ = vm;
    }

    #[test]
    fn test_prop_default_applies() {
        let vm = instantiate(
            ConfigRecord::new().with_prop("label", PropSpec::default().with_default("untitled")),
        );
        assert_eq!(vm.get("label"), Some(Value::from("untitled")));
    }

    #[test]
    fn test_set_prop_is_ignored() {
        let vm = instantiate(
            ConfigRecord::new().with_prop("label", PropSpec::default().with_default("fixed")),
        );
        vm.set("label", "changed");
        assert_eq!(vm.get("label"), Some(Value::from("fixed")));
    }
}

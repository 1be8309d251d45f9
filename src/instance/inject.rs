//! Provisions and injections - Ancestor-to-descendant value passing.
//!
//! An ancestor publishes named values (ProvisionsPublished, after its state
//! is live); a descendant resolves declared injections against the nearest
//! ancestor that published the name (InjectionsResolved, before its own
//! state initializes so injected values are available to computed defaults
//! and the data factory).
//!
//! A miss is not an error: the key stays absent unless the declaration
//! carries a default. Dev builds warn on a defaultless miss.

use super::Instance;

// =============================================================================
// InjectionsResolved
// =============================================================================

pub(crate) fn init_injections(vm: &Instance) {
    let Some(specs) = vm.config.borrow().inject() else {
        return;
    };

    let mut injected = vm.injected.borrow_mut();
    for (key, spec) in specs.iter() {
        let mut found = None;
        let mut ancestor = vm.parent();
        while let Some(current) = ancestor {
            if let Some(value) = current.provided.borrow().get(&spec.from) {
                found = Some(value.clone());
                break;
            }
            ancestor = current.parent();
        }

        match found.or_else(|| spec.default.clone()) {
            Some(value) => {
                injected.insert(key.clone(), value);
            }
            None => {
                if cfg!(debug_assertions) {
                    tracing::warn!(
                        uid = vm.uid(),
                        key = %key,
                        from = %spec.from,
                        "injection not found and no default supplied"
                    );
                }
            }
        }
    }
}

// =============================================================================
// ProvisionsPublished
// =============================================================================

pub(crate) fn init_provide(vm: &Instance) {
    let Some(factory) = vm.config.borrow().provide() else {
        return;
    };
    let values = factory(vm);
    vm.provided.borrow_mut().extend(values);
}

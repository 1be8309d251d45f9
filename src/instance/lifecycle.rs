//! Lifecycle bookkeeping - Stage machine, flags, parent linking, hooks.
//!
//! The bootstrap stages are strictly ordered; `enter_stage` asserts the
//! order in dev builds. Hooks are invoked in inheritance order (base-class
//! hooks first, the concatenate merge strategy guarantees the ordering) and
//! a failing hook propagates immediately, aborting the stages after it.

use bitflags::bitflags;

use crate::error::InitError;

use super::Instance;

// =============================================================================
// Stages and flags
// =============================================================================

/// Bootstrap stage machine. Strictly ordered, no skipping, no re-entry;
/// `Mounted` is optional and may also be entered later, on demand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Created,
    LifecycleLinked,
    EventsLinked,
    RenderLinked,
    BeforeCreateHook,
    InjectionsResolved,
    StateInitialized,
    ProvisionsPublished,
    CreatedHook,
    Mounted,
}

bitflags! {
    /// Instance lifecycle flags.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct LifecycleFlags: u8 {
        const MOUNTED = 1 << 0;
        const DESTROYED = 1 << 1;
    }
}

impl Instance {
    pub(crate) fn enter_stage(&self, next: Stage) {
        let current = self.stage.get();
        debug_assert!(
            next as u8 == current as u8 + 1
                || (next == Stage::Mounted && current == Stage::Mounted),
            "lifecycle stage order violated: {current:?} -> {next:?}"
        );
        self.stage.set(next);
    }

    pub(crate) fn set_flag(&self, flag: LifecycleFlags) {
        let mut flags = self.flags.get();
        flags.insert(flag);
        self.flags.set(flags);
    }
}

// =============================================================================
// LifecycleLinked
// =============================================================================

/// Link the instance into the tree: register it as a child of its parent
/// (when the configuration names one), wire the root link, and start with a
/// clean flag set (not mounted, not destroyed).
pub(crate) fn init_lifecycle(vm: &Instance) {
    let parent = vm
        .config
        .borrow()
        .parent
        .as_ref()
        .and_then(std::rc::Weak::upgrade);

    if let Some(parent) = parent {
        parent.children.borrow_mut().push(vm.rc());
        *vm.parent.borrow_mut() = std::rc::Rc::downgrade(&parent);
        *vm.root.borrow_mut() = parent.root.borrow().clone();
    } else {
        *vm.root.borrow_mut() = vm.self_weak.borrow().clone();
    }

    vm.flags.set(LifecycleFlags::empty());
}

// =============================================================================
// Hooks
// =============================================================================

/// Invoke the hooks registered under `key`, base-class hooks first. The
/// first failure aborts and propagates to the instantiation caller.
pub(crate) fn call_hook(vm: &Instance, key: &str) -> Result<(), InitError> {
    // Clone the list out so a hook may reconfigure the instance.
    let hooks = vm.config.borrow().hooks(key);
    if let Some(hooks) = hooks {
        for hook in hooks.iter() {
            hook(vm).map_err(|source| InitError::Hook {
                hook: key.to_string(),
                source,
            })?;
        }
    }
    Ok(())
}

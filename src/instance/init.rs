//! Bootstrap - The fixed-order initialization pipeline.
//!
//! Stage order is invariant:
//!
//! ```text
//! Created -> LifecycleLinked -> EventsLinked -> RenderLinked
//!   -> BeforeCreateHook -> InjectionsResolved -> StateInitialized
//!   -> ProvisionsPublished -> CreatedHook -> (optional) Mounted
//! ```
//!
//! The whole pipeline is synchronous: one instantiation runs to completion
//! (or to a propagated hook failure) before its caller resumes. Nested
//! instantiation is plain call/return nesting.
//!
//! Configuration selection happens at `Created` and takes exactly one of two
//! mutually exclusive paths: the generic path resolves the class
//! configuration and merges the caller's record against it; the internal
//! fast path skips the merger entirely and delegates unset keys to the
//! class's cached configuration, since a framework-created child never needs
//! per-instantiation re-merging of class options.

use std::rc::Rc;

use crate::config::keys;
use crate::config::merge::merge_config;
use crate::error::InitError;

use super::lifecycle::Stage;
use super::{
    events, inject, lifecycle, render, state, Instance, InstanceArgs, InstanceConfig, InternalArgs,
};

// =============================================================================
// Driver
// =============================================================================

pub(crate) fn bootstrap(vm: &Rc<Instance>, args: InstanceArgs) -> Result<(), InitError> {
    // Created: uid was assigned at construction; select the configuration
    // path based on how the instantiation arguments are tagged.
    let config = match args {
        InstanceArgs::Internal(internal) => build_internal_config(vm, internal),
        InstanceArgs::User(record) => {
            let resolved = vm.class().resolve_config();
            InstanceConfig::from_merged(merge_config(&resolved, &record, Some(vm)))
        }
    };
    *vm.config.borrow_mut() = config;

    vm.enter_stage(Stage::LifecycleLinked);
    lifecycle::init_lifecycle(vm);

    vm.enter_stage(Stage::EventsLinked);
    events::init_events(vm);

    vm.enter_stage(Stage::RenderLinked);
    render::init_render(vm);

    vm.enter_stage(Stage::BeforeCreateHook);
    lifecycle::call_hook(vm, keys::BEFORE_CREATE)?;

    vm.enter_stage(Stage::InjectionsResolved);
    inject::init_injections(vm);

    vm.enter_stage(Stage::StateInitialized);
    state::init_state(vm);

    vm.enter_stage(Stage::ProvisionsPublished);
    inject::init_provide(vm);

    vm.enter_stage(Stage::CreatedHook);
    lifecycle::call_hook(vm, keys::CREATED)?;

    // Mounted is conditional: only when the configuration names a target.
    // Otherwise the instance stays fully initialized but unmounted,
    // mountable later on demand.
    let target = vm.config.borrow().mount_target();
    if let Some(target) = target {
        vm.mount(&target)?;
    }

    Ok(())
}

// =============================================================================
// Internal fast path
// =============================================================================

/// Build a fast-path configuration: local entries shadowing the class's
/// cached configuration, plus everything the placeholder's attachment
/// carries for this instance.
fn build_internal_config(vm: &Instance, args: InternalArgs) -> InstanceConfig {
    let InternalArgs {
        parent,
        placeholder,
        render_override,
    } = args;

    let mut config = InstanceConfig {
        class_config: Some(vm.class().cached_config()),
        parent: Some(Rc::downgrade(&parent)),
        render_override,
        ..Default::default()
    };

    if let Some(attachment) = &placeholder.attachment {
        config.props_data = attachment.props_data.clone();
        config.parent_listeners = attachment.listeners.clone();
        config.slot_children = attachment.slot_children.clone();
        config.tag = Some(attachment.tag.clone());
    } else {
        config.tag = Some(placeholder.tag.clone());
    }
    config.placeholder = Some(placeholder);

    config
}

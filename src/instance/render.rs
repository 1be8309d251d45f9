//! Render linkage and mounting.
//!
//! RenderLinked prepares the output-producing function binding without
//! rendering anything: a fast-path render override wins over the class-level
//! render function, and the pass-through bindings (`attrs` for placeholder
//! props not declared in the prop schema, `pass_listeners` for the
//! parent-supplied listener bindings) are resolved for forwarding to nested
//! output.
//!
//! Mounting is the optional final stage: first render, attach the output
//! description to the named target, and run the mount hooks around it. How
//! the output becomes visible is the rendering system's concern; this core
//! only records the description and the target.

use crate::config::keys;
use crate::error::InitError;
use crate::node::PlaceholderNode;

use super::lifecycle::{LifecycleFlags, Stage};
use super::Instance;

// =============================================================================
// RenderLinked
// =============================================================================

pub(crate) fn init_render(vm: &Instance) {
    let config = vm.config.borrow();

    // A render override supplied by the parent bypasses the class render.
    let (render, static_renders) = match &config.render_override {
        Some(over) => (Some(over.render.clone()), over.static_renders.clone()),
        None => (config.render(), Vec::new()),
    };

    // Pass-through attributes: placeholder props the schema does not claim.
    let schema = config.props();
    let attrs = config
        .props_data
        .iter()
        .filter(|(name, _)| !schema.as_ref().is_some_and(|s| s.contains_key(name.as_str())))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    let pass_listeners = config.parent_listeners.clone();
    drop(config);

    *vm.render.borrow_mut() = render;
    *vm.static_renders.borrow_mut() = static_renders;
    *vm.attrs.borrow_mut() = attrs;
    *vm.pass_listeners.borrow_mut() = pass_listeners;
}

// =============================================================================
// Mounted
// =============================================================================

impl Instance {
    /// Render and attach to `target`. Runs the `before_mount` and `mounted`
    /// hooks around the first render; hook failures propagate.
    ///
    /// Called automatically at the end of bootstrap when the configuration
    /// names a `mount_target`, or later on demand.
    pub fn mount(&self, target: &str) -> Result<(), InitError> {
        if cfg!(debug_assertions) && self.is_mounted() {
            tracing::warn!(uid = self.uid(), target, "mount on an already mounted instance");
        }

        super::lifecycle::call_hook(self, keys::BEFORE_MOUNT)?;

        let render = self.render.borrow().clone();
        let output = match render {
            Some(render) => render(self),
            // No render function: the output is an empty node under this
            // instance's tag.
            None => PlaceholderNode::element(self.tag().unwrap_or_default()),
        };

        *self.rendered.borrow_mut() = Some(output);
        *self.mounted_to.borrow_mut() = Some(target.to_string());
        self.set_flag(LifecycleFlags::MOUNTED);
        self.enter_stage(Stage::Mounted);

        super::lifecycle::call_hook(self, keys::MOUNTED)?;
        Ok(())
    }

    /// The static-render helpers accompanying a render override.
    pub fn static_renders(&self) -> Vec<crate::config::RenderFn> {
        self.static_renders.borrow().clone()
    }
}

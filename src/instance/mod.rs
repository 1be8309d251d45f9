//! Instances - One live component, from arguments to initialized state.
//!
//! `Instance::new` runs the whole bootstrap synchronously: configuration
//! selection (generic merge or internal fast path), lifecycle linking, event
//! attachment, render binding, the `before_create` hook, injection
//! resolution, reactive state initialization, provision publication, the
//! `created` hook, and optionally mounting. A nested instantiation started
//! from inside any of those stages completes fully before control returns.
//!
//! Reactive state lives in `spark-signals` slots: a signal per data/prop key,
//! a derived per computed property, an effect per watcher.

pub mod events;
pub mod init;
pub mod inject;
pub mod lifecycle;
pub mod render;
pub mod state;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicUsize, Ordering};

use spark_signals::{Derived, Signal};

use crate::class::ComponentClass;
use crate::config::{
    keys, ConfigRecord, ConfigValue, DataFactory, Hook, InjectSpec, Method, ProvideFactory,
    PropSpec, RenderFn, WatchHandler,
};
use crate::error::InitError;
use crate::node::PlaceholderNode;
use crate::value::Value;

use events::{EventEntry, EventHandler};
use lifecycle::{LifecycleFlags, Stage};

static NEXT_UID: AtomicUsize = AtomicUsize::new(0);

pub(crate) type ComputedSlot = Derived<Value>;

// =============================================================================
// Instantiation arguments
// =============================================================================

/// What the instantiation caller hands in.
pub enum InstanceArgs {
    /// User-supplied configuration: merged against the class's resolved
    /// configuration through the generic options merger.
    User(ConfigRecord),
    /// Framework-created nested instance: takes the internal fast path,
    /// bypassing the generic merger entirely.
    Internal(InternalArgs),
}

/// Fast-path arguments, built by the framework when a parent's rendered
/// output places a component node.
pub struct InternalArgs {
    pub parent: Rc<Instance>,
    pub placeholder: Rc<PlaceholderNode>,
    /// Custom render function bypassing any class-level one.
    pub render_override: Option<RenderOverride>,
}

/// A render function plus its static-render helpers.
#[derive(Clone)]
pub struct RenderOverride {
    pub render: RenderFn,
    pub static_renders: Vec<RenderFn>,
}

// =============================================================================
// Instance configuration
// =============================================================================

/// An instance's effective configuration.
///
/// Two-level lookup: `local` holds instance-specific entries; an unset key
/// falls through to the class's resolved record when one is attached (the
/// internal fast path). The generic path stores the fully merged record in
/// `local` with no fallback.
#[derive(Default)]
pub struct InstanceConfig {
    local: ConfigRecord,
    class_config: Option<Rc<ConfigRecord>>,

    pub parent: Option<Weak<Instance>>,
    pub placeholder: Option<Rc<PlaceholderNode>>,
    /// Prop values extracted from the placeholder's attachment.
    pub props_data: HashMap<String, Value>,
    /// Parent-supplied event listener bindings.
    pub parent_listeners: Vec<(String, EventHandler)>,
    /// Slot content destined for this instance.
    pub slot_children: Vec<Rc<PlaceholderNode>>,
    /// Component tag as written by the parent.
    pub tag: Option<String>,
    pub render_override: Option<RenderOverride>,
}

impl InstanceConfig {
    /// Generic path: a fully merged record, no class fallback.
    pub(crate) fn from_merged(record: ConfigRecord) -> Self {
        InstanceConfig {
            local: record,
            ..Default::default()
        }
    }

    /// Read a configuration key; unset keys fall through to the class level.
    pub fn get(&self, key: &str) -> Option<ConfigValue> {
        if let Some(value) = self.local.get(key) {
            return Some(value.clone());
        }
        self.class_config
            .as_ref()
            .and_then(|class| class.get(key).cloned())
    }

    /// Write a configuration key; shadows the class level locally.
    pub fn set(&mut self, key: impl Into<String>, value: ConfigValue) {
        self.local.set(key, value);
    }

    pub fn hooks(&self, key: &str) -> Option<Rc<Vec<Hook>>> {
        self.get(key)?.as_hooks()
    }

    pub fn data_factory(&self) -> Option<DataFactory> {
        self.get(keys::DATA)?.as_data()
    }

    pub fn methods(&self) -> Option<Rc<HashMap<String, Method>>> {
        self.get(keys::METHODS)?.as_methods()
    }

    pub fn props(&self) -> Option<Rc<HashMap<String, PropSpec>>> {
        self.get(keys::PROPS)?.as_props()
    }

    pub fn computed(&self) -> Option<Rc<HashMap<String, crate::config::ComputedFn>>> {
        self.get(keys::COMPUTED)?.as_computed()
    }

    pub fn watch(&self) -> Option<Rc<HashMap<String, Vec<WatchHandler>>>> {
        self.get(keys::WATCH)?.as_watch()
    }

    pub fn provide(&self) -> Option<ProvideFactory> {
        self.get(keys::PROVIDE)?.as_provide()
    }

    pub fn inject(&self) -> Option<Rc<HashMap<String, InjectSpec>>> {
        self.get(keys::INJECT)?.as_inject()
    }

    pub fn render(&self) -> Option<RenderFn> {
        self.get(keys::RENDER)?.as_render()
    }

    pub fn mount_target(&self) -> Option<String> {
        self.get(keys::MOUNT_TARGET)?
            .as_plain()?
            .as_str()
            .map(str::to_string)
    }
}

// =============================================================================
// Instance
// =============================================================================

/// One live component instance.
pub struct Instance {
    uid: usize,
    class: Rc<ComponentClass>,
    self_weak: RefCell<Weak<Instance>>,

    pub(crate) config: RefCell<InstanceConfig>,
    pub(crate) stage: Cell<Stage>,
    pub(crate) flags: Cell<LifecycleFlags>,

    pub(crate) parent: RefCell<Weak<Instance>>,
    pub(crate) root: RefCell<Weak<Instance>>,
    pub(crate) children: RefCell<Vec<Rc<Instance>>>,

    pub(crate) events: RefCell<HashMap<String, Vec<EventEntry>>>,

    pub(crate) props: RefCell<HashMap<String, Signal<Value>>>,
    pub(crate) data: RefCell<HashMap<String, Signal<Value>>>,
    pub(crate) methods: RefCell<HashMap<String, Method>>,
    pub(crate) computed: RefCell<HashMap<String, ComputedSlot>>,
    pub(crate) watch_stops: RefCell<Vec<Box<dyn FnOnce()>>>,

    pub(crate) attrs: RefCell<HashMap<String, Value>>,
    pub(crate) pass_listeners: RefCell<Vec<(String, EventHandler)>>,

    pub(crate) provided: RefCell<HashMap<String, Value>>,
    pub(crate) injected: RefCell<HashMap<String, Value>>,

    pub(crate) render: RefCell<Option<RenderFn>>,
    pub(crate) static_renders: RefCell<Vec<RenderFn>>,
    pub(crate) rendered: RefCell<Option<PlaceholderNode>>,
    pub(crate) mounted_to: RefCell<Option<String>>,
}

impl Instance {
    /// Create and fully bootstrap an instance of `class`.
    ///
    /// A failing hook aborts the remaining stages and surfaces here; the
    /// partially initialized instance is dropped.
    pub fn new(class: &Rc<ComponentClass>, args: InstanceArgs) -> Result<Rc<Instance>, InitError> {
        let instance = Rc::new(Instance {
            uid: NEXT_UID.fetch_add(1, Ordering::Relaxed),
            class: class.clone(),
            self_weak: RefCell::new(Weak::new()),
            config: RefCell::new(InstanceConfig::default()),
            stage: Cell::new(Stage::Created),
            flags: Cell::new(LifecycleFlags::empty()),
            parent: RefCell::new(Weak::new()),
            root: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            events: RefCell::new(HashMap::new()),
            props: RefCell::new(HashMap::new()),
            data: RefCell::new(HashMap::new()),
            methods: RefCell::new(HashMap::new()),
            computed: RefCell::new(HashMap::new()),
            watch_stops: RefCell::new(Vec::new()),
            attrs: RefCell::new(HashMap::new()),
            pass_listeners: RefCell::new(Vec::new()),
            provided: RefCell::new(HashMap::new()),
            injected: RefCell::new(HashMap::new()),
            render: RefCell::new(None),
            static_renders: RefCell::new(Vec::new()),
            rendered: RefCell::new(None),
            mounted_to: RefCell::new(None),
        });
        *instance.self_weak.borrow_mut() = Rc::downgrade(&instance);

        init::bootstrap(&instance, args)?;
        Ok(instance)
    }

    /// Create a framework-internal child of this instance at `placeholder`.
    /// This is the entry the rendering collaborator uses; it always takes
    /// the fast path.
    pub fn create_child(
        &self,
        class: &Rc<ComponentClass>,
        placeholder: Rc<PlaceholderNode>,
    ) -> Result<Rc<Instance>, InitError> {
        Instance::new(
            class,
            InstanceArgs::Internal(InternalArgs {
                parent: self.rc(),
                placeholder,
                render_override: None,
            }),
        )
    }

    // -------------------------------------------------------------------------
    // Identity and links
    // -------------------------------------------------------------------------

    /// Process-unique, monotonically increasing instance id.
    pub fn uid(&self) -> usize {
        self.uid
    }

    pub fn class(&self) -> &Rc<ComponentClass> {
        &self.class
    }

    /// Current position in the bootstrap stage machine.
    pub fn stage(&self) -> Stage {
        self.stage.get()
    }

    pub fn is_mounted(&self) -> bool {
        self.flags.get().contains(LifecycleFlags::MOUNTED)
    }

    pub fn parent(&self) -> Option<Rc<Instance>> {
        self.parent.borrow().upgrade()
    }

    pub fn root(&self) -> Option<Rc<Instance>> {
        self.root.borrow().upgrade()
    }

    pub fn children(&self) -> Vec<Rc<Instance>> {
        self.children.borrow().clone()
    }

    pub(crate) fn rc(&self) -> Rc<Instance> {
        self.self_weak
            .borrow()
            .upgrade()
            .expect("instance accessed during teardown")
    }

    // -------------------------------------------------------------------------
    // Configuration
    // -------------------------------------------------------------------------

    /// Read a configuration key. For fast-path instances an unset key falls
    /// through to the class's resolved configuration.
    pub fn config_value(&self, key: &str) -> Option<ConfigValue> {
        self.config.borrow().get(key)
    }

    /// Write a configuration key on this instance only. The class level is
    /// shadowed, never touched; other instances are unaffected.
    pub fn set_config_value(&self, key: impl Into<String>, value: ConfigValue) {
        self.config.borrow_mut().set(key, value);
    }

    /// Slot content the parent supplied for this instance.
    pub fn slot_children(&self) -> Vec<Rc<PlaceholderNode>> {
        self.config.borrow().slot_children.clone()
    }

    /// Component tag this instance was placed under, if framework-created.
    pub fn tag(&self) -> Option<String> {
        self.config.borrow().tag.clone()
    }

    /// Placeholder node this instance was created for, if framework-created.
    pub fn placeholder(&self) -> Option<Rc<PlaceholderNode>> {
        self.config.borrow().placeholder.clone()
    }

    // -------------------------------------------------------------------------
    // State access
    // -------------------------------------------------------------------------

    /// Read one state key: props, then data, then computed, then injections.
    /// Reads are tracked when made inside a reactive context.
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some(signal) = self.props.borrow().get(key) {
            return Some(signal.get());
        }
        if let Some(signal) = self.data.borrow().get(key) {
            return Some(signal.get());
        }
        if let Some(slot) = self.computed.borrow().get(key) {
            return Some(slot.get());
        }
        if let Some(value) = self.injected.borrow().get(key) {
            return Some(value.clone());
        }
        None
    }

    /// Write one reactive data key. Props, computed and injected values are
    /// not writable through this surface; writes to unknown keys are dropped
    /// with a dev-mode diagnostic.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        let slot = self.data.borrow().get(key).cloned();
        if let Some(slot) = slot {
            slot.set(value);
            return;
        }
        if cfg!(debug_assertions) {
            if self.props.borrow().contains_key(key) {
                tracing::warn!(uid = self.uid, key, "ignored write to prop");
            } else {
                tracing::warn!(uid = self.uid, key, "ignored write to undeclared state key");
            }
        }
    }

    /// Invoke a declared method. Returns `None` when no such method exists.
    pub fn call(&self, name: &str, args: &[Value]) -> Option<Value> {
        let method = self.methods.borrow().get(name).cloned()?;
        Some(method(self, args))
    }

    /// Pass-through attributes: placeholder props not declared in the prop
    /// schema, available for forwarding to nested output.
    pub fn attrs(&self) -> HashMap<String, Value> {
        self.attrs.borrow().clone()
    }

    /// Pass-through listeners: the parent-supplied bindings, available for
    /// forwarding to nested output.
    pub fn pass_listeners(&self) -> Vec<(String, EventHandler)> {
        self.pass_listeners.borrow().clone()
    }

    /// Value this instance resolved for an injection key, if any.
    pub fn injected(&self, key: &str) -> Option<Value> {
        self.injected.borrow().get(key).cloned()
    }

    /// Value this instance published for descendants, if any.
    pub fn provided(&self, key: &str) -> Option<Value> {
        self.provided.borrow().get(key).cloned()
    }

    /// The output produced at mount time, if this instance has rendered.
    pub fn rendered(&self) -> Option<PlaceholderNode> {
        self.rendered.borrow().clone()
    }

    /// The target this instance was mounted to, if mounted.
    pub fn mounted_to(&self) -> Option<String> {
        self.mounted_to.borrow().clone()
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        self.flags.get_mut().insert(LifecycleFlags::DESTROYED);
        // Watcher effects must not outlive the instance they observe.
        for stop in self.watch_stops.get_mut().drain(..) {
            stop();
        }
    }
}

//! Configuration records - The declarative shape of a component.
//!
//! A `ConfigRecord` maps option keys to typed `ConfigValue`s: lifecycle hook
//! lists, a reactive-data factory, method and computed maps, a prop schema,
//! watchers, a nested component registry, provisions/injections and a render
//! function. Records are what classes declare, what `extend` merges, and what
//! an instance ultimately runs from.
//!
//! Every `ConfigValue` variant is reference-counted. Cloning a record is
//! shallow: the clone shares each value's allocation, which is exactly what
//! the resolver's identity-based change detection relies on (see
//! [`ConfigValue::ptr_eq`]).

pub mod merge;
pub mod registry;

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::HookError;
use crate::instance::Instance;
use crate::node::PlaceholderNode;
use crate::value::{Value, ValueKind};

pub use registry::ComponentRegistry;

// =============================================================================
// Option keys
// =============================================================================

/// Well-known option keys. User code may use arbitrary additional keys; these
/// are the ones the runtime itself interprets.
pub mod keys {
    pub const NAME: &str = "name";
    pub const MOUNT_TARGET: &str = "mount_target";
    pub const DATA: &str = "data";
    pub const PROPS: &str = "props";
    pub const METHODS: &str = "methods";
    pub const COMPUTED: &str = "computed";
    pub const WATCH: &str = "watch";
    pub const COMPONENTS: &str = "components";
    pub const PROVIDE: &str = "provide";
    pub const INJECT: &str = "inject";
    pub const RENDER: &str = "render";

    pub const BEFORE_CREATE: &str = "before_create";
    pub const CREATED: &str = "created";
    pub const BEFORE_MOUNT: &str = "before_mount";
    pub const MOUNTED: &str = "mounted";

    /// Keys holding hook lists, merged by concatenation (base first).
    pub const HOOK_KEYS: &[&str] = &[BEFORE_CREATE, CREATED, BEFORE_MOUNT, MOUNTED];
}

// =============================================================================
// Callback types
// =============================================================================

/// A lifecycle hook. Failure aborts the remaining bootstrap stages and
/// propagates to the instantiation caller.
pub type Hook = Rc<dyn Fn(&Instance) -> Result<(), HookError>>;

/// A declared method, invoked with the owning instance and call arguments.
pub type Method = Rc<dyn Fn(&Instance, &[Value]) -> Value>;

/// Reactive-data factory. Runs after props and methods are live, so it may
/// read both through the instance.
pub type DataFactory = Rc<dyn Fn(&Instance) -> HashMap<String, Value>>;

/// Computed-property getter. Reads through the instance are tracked, so the
/// cached result recomputes when its dependencies change.
pub type ComputedFn = Rc<dyn Fn(&Instance) -> Value>;

/// Watch handler, called as `(instance, new_value, old_value)`.
pub type WatchHandler = Rc<dyn Fn(&Instance, &Value, &Value)>;

/// Provision factory: the values this instance publishes to descendants.
pub type ProvideFactory = Rc<dyn Fn(&Instance) -> HashMap<String, Value>>;

/// Render function: produces the instance's output description.
pub type RenderFn = Rc<dyn Fn(&Instance) -> PlaceholderNode>;

// =============================================================================
// Prop / inject specs
// =============================================================================

/// Schema entry for one declared input property.
#[derive(Clone, Default)]
pub struct PropSpec {
    /// Expected value kind; mismatches warn in dev builds.
    pub expected: Option<ValueKind>,
    /// Warn in dev builds when the parent supplies no value.
    pub required: bool,
    /// Fallback when the parent supplies no value.
    pub default: Option<Value>,
    /// Custom validation; returning false warns in dev builds.
    pub validator: Option<Rc<dyn Fn(&Value) -> bool>>,
}

impl PropSpec {
    pub fn of_kind(kind: ValueKind) -> Self {
        PropSpec {
            expected: Some(kind),
            ..Default::default()
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_validator(mut self, validator: impl Fn(&Value) -> bool + 'static) -> Self {
        self.validator = Some(Rc::new(validator));
        self
    }
}

/// One declared injection: resolve `from` against ancestor provisions,
/// falling back to `default` when no ancestor published it.
#[derive(Clone)]
pub struct InjectSpec {
    pub from: String,
    pub default: Option<Value>,
}

impl InjectSpec {
    pub fn from(key: impl Into<String>) -> Self {
        InjectSpec {
            from: key.into(),
            default: None,
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

// =============================================================================
// Config values
// =============================================================================

/// A typed configuration value. All variants share their payload on clone.
#[derive(Clone)]
pub enum ConfigValue {
    /// A plain setting (`name`, `mount_target`, user-defined keys).
    Plain(Rc<Value>),
    /// An ordered hook list.
    Hooks(Rc<Vec<Hook>>),
    Data(DataFactory),
    Methods(Rc<HashMap<String, Method>>),
    Props(Rc<HashMap<String, PropSpec>>),
    Computed(Rc<HashMap<String, ComputedFn>>),
    /// Watched key → ordered handler list.
    Watch(Rc<HashMap<String, Vec<WatchHandler>>>),
    Components(Rc<ComponentRegistry>),
    Provide(ProvideFactory),
    Inject(Rc<HashMap<String, InjectSpec>>),
    Render(RenderFn),
}

impl ConfigValue {
    /// Reference identity. This is the comparison the resolver's
    /// late-attached-key diff uses: replacing a value is detected, mutating
    /// one in place behind the same allocation deliberately is not.
    pub fn ptr_eq(&self, other: &ConfigValue) -> bool {
        use ConfigValue::*;
        match (self, other) {
            (Plain(a), Plain(b)) => Rc::ptr_eq(a, b),
            (Hooks(a), Hooks(b)) => Rc::ptr_eq(a, b),
            (Data(a), Data(b)) => Rc::ptr_eq(a, b),
            (Methods(a), Methods(b)) => Rc::ptr_eq(a, b),
            (Props(a), Props(b)) => Rc::ptr_eq(a, b),
            (Computed(a), Computed(b)) => Rc::ptr_eq(a, b),
            (Watch(a), Watch(b)) => Rc::ptr_eq(a, b),
            (Components(a), Components(b)) => Rc::ptr_eq(a, b),
            (Provide(a), Provide(b)) => Rc::ptr_eq(a, b),
            (Inject(a), Inject(b)) => Rc::ptr_eq(a, b),
            (Render(a), Render(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn as_plain(&self) -> Option<Rc<Value>> {
        match self {
            ConfigValue::Plain(v) => Some(v.clone()),
            _ => None,
        }
    }

    pub fn as_hooks(&self) -> Option<Rc<Vec<Hook>>> {
        match self {
            ConfigValue::Hooks(h) => Some(h.clone()),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<DataFactory> {
        match self {
            ConfigValue::Data(f) => Some(f.clone()),
            _ => None,
        }
    }

    pub fn as_methods(&self) -> Option<Rc<HashMap<String, Method>>> {
        match self {
            ConfigValue::Methods(m) => Some(m.clone()),
            _ => None,
        }
    }

    pub fn as_props(&self) -> Option<Rc<HashMap<String, PropSpec>>> {
        match self {
            ConfigValue::Props(p) => Some(p.clone()),
            _ => None,
        }
    }

    pub fn as_computed(&self) -> Option<Rc<HashMap<String, ComputedFn>>> {
        match self {
            ConfigValue::Computed(c) => Some(c.clone()),
            _ => None,
        }
    }

    pub fn as_watch(&self) -> Option<Rc<HashMap<String, Vec<WatchHandler>>>> {
        match self {
            ConfigValue::Watch(w) => Some(w.clone()),
            _ => None,
        }
    }

    pub fn as_components(&self) -> Option<Rc<ComponentRegistry>> {
        match self {
            ConfigValue::Components(r) => Some(r.clone()),
            _ => None,
        }
    }

    pub fn as_provide(&self) -> Option<ProvideFactory> {
        match self {
            ConfigValue::Provide(p) => Some(p.clone()),
            _ => None,
        }
    }

    pub fn as_inject(&self) -> Option<Rc<HashMap<String, InjectSpec>>> {
        match self {
            ConfigValue::Inject(i) => Some(i.clone()),
            _ => None,
        }
    }

    pub fn as_render(&self) -> Option<RenderFn> {
        match self {
            ConfigValue::Render(r) => Some(r.clone()),
            _ => None,
        }
    }
}

// =============================================================================
// Config record
// =============================================================================

/// A component configuration record: option key → typed value.
#[derive(Clone, Default)]
pub struct ConfigRecord {
    entries: HashMap<String, ConfigValue>,
}

impl ConfigRecord {
    pub fn new() -> Self {
        ConfigRecord::default()
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: ConfigValue) {
        self.entries.insert(key.into(), value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Shallow-copy `other`'s entries over this record's.
    pub fn extend_from(&mut self, other: &ConfigRecord) {
        for (key, value) in other.iter() {
            self.entries.insert(key.to_string(), value.clone());
        }
    }

    // -------------------------------------------------------------------------
    // Typed accessors
    // -------------------------------------------------------------------------

    pub fn name(&self) -> Option<String> {
        self.get(keys::NAME)?
            .as_plain()?
            .as_str()
            .map(str::to_string)
    }

    pub fn mount_target(&self) -> Option<String> {
        self.get(keys::MOUNT_TARGET)?
            .as_plain()?
            .as_str()
            .map(str::to_string)
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

    pub fn computed(&self) -> Option<Rc<HashMap<String, ComputedFn>>> {
        self.get(keys::COMPUTED)?.as_computed()
    }

    pub fn watch(&self) -> Option<Rc<HashMap<String, Vec<WatchHandler>>>> {
        self.get(keys::WATCH)?.as_watch()
    }

    pub fn components(&self) -> Option<Rc<ComponentRegistry>> {
        self.get(keys::COMPONENTS)?.as_components()
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

    // -------------------------------------------------------------------------
    // Builders
    // -------------------------------------------------------------------------

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, ConfigValue::Plain(Rc::new(value.into())));
        self
    }

    pub fn with_name(self, name: impl Into<String>) -> Self {
        self.with_value(keys::NAME, Value::Str(name.into()))
    }

    pub fn with_mount_target(self, target: impl Into<String>) -> Self {
        self.with_value(keys::MOUNT_TARGET, Value::Str(target.into()))
    }

    /// Append a hook under `key` (one of [`keys::HOOK_KEYS`]).
    pub fn with_hook(
        mut self,
        key: &str,
        hook: impl Fn(&Instance) -> Result<(), HookError> + 'static,
    ) -> Self {
        let mut hooks: Vec<Hook> = self
            .get(key)
            .and_then(ConfigValue::as_hooks)
            .map(|h| (*h).clone())
            .unwrap_or_default();
        hooks.push(Rc::new(hook));
        self.set(key, ConfigValue::Hooks(Rc::new(hooks)));
        self
    }

    pub fn with_data(mut self, factory: impl Fn(&Instance) -> HashMap<String, Value> + 'static) -> Self {
        self.set(keys::DATA, ConfigValue::Data(Rc::new(factory)));
        self
    }

    pub fn with_method(
        mut self,
        name: impl Into<String>,
        method: impl Fn(&Instance, &[Value]) -> Value + 'static,
    ) -> Self {
        let mut methods: HashMap<String, Method> = self
            .get(keys::METHODS)
            .and_then(ConfigValue::as_methods)
            .map(|m| (*m).clone())
            .unwrap_or_default();
        methods.insert(name.into(), Rc::new(method));
        self.set(keys::METHODS, ConfigValue::Methods(Rc::new(methods)));
        self
    }

    pub fn with_prop(mut self, name: impl Into<String>, spec: PropSpec) -> Self {
        let mut props: HashMap<String, PropSpec> = self
            .get(keys::PROPS)
            .and_then(ConfigValue::as_props)
            .map(|p| (*p).clone())
            .unwrap_or_default();
        props.insert(name.into(), spec);
        self.set(keys::PROPS, ConfigValue::Props(Rc::new(props)));
        self
    }

    pub fn with_computed(
        mut self,
        name: impl Into<String>,
        getter: impl Fn(&Instance) -> Value + 'static,
    ) -> Self {
        let mut computed: HashMap<String, ComputedFn> = self
            .get(keys::COMPUTED)
            .and_then(ConfigValue::as_computed)
            .map(|c| (*c).clone())
            .unwrap_or_default();
        computed.insert(name.into(), Rc::new(getter));
        self.set(keys::COMPUTED, ConfigValue::Computed(Rc::new(computed)));
        self
    }

    pub fn with_watch(
        mut self,
        key: impl Into<String>,
        handler: impl Fn(&Instance, &Value, &Value) + 'static,
    ) -> Self {
        let mut watch: HashMap<String, Vec<WatchHandler>> = self
            .get(keys::WATCH)
            .and_then(ConfigValue::as_watch)
            .map(|w| (*w).clone())
            .unwrap_or_default();
        watch.entry(key.into()).or_default().push(Rc::new(handler));
        self.set(keys::WATCH, ConfigValue::Watch(Rc::new(watch)));
        self
    }

    pub fn with_component(mut self, name: &str, class: &Rc<crate::class::ComponentClass>) -> Self {
        let registry = match self.get(keys::COMPONENTS).and_then(ConfigValue::as_components) {
            Some(registry) => registry,
            None => Rc::new(ComponentRegistry::new()),
        };
        registry.register(name, class);
        self.set(keys::COMPONENTS, ConfigValue::Components(registry));
        self
    }

    pub fn with_provide(
        mut self,
        factory: impl Fn(&Instance) -> HashMap<String, Value> + 'static,
    ) -> Self {
        self.set(keys::PROVIDE, ConfigValue::Provide(Rc::new(factory)));
        self
    }

    pub fn with_inject(mut self, key: impl Into<String>, spec: InjectSpec) -> Self {
        let mut inject: HashMap<String, InjectSpec> = self
            .get(keys::INJECT)
            .and_then(ConfigValue::as_inject)
            .map(|i| (*i).clone())
            .unwrap_or_default();
        inject.insert(key.into(), spec);
        self.set(keys::INJECT, ConfigValue::Inject(Rc::new(inject)));
        self
    }

    pub fn with_render(mut self, render: impl Fn(&Instance) -> PlaceholderNode + 'static) -> Self {
        self.set(keys::RENDER, ConfigValue::Render(Rc::new(render)));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shallow_clone_shares_identity() {
        let record = ConfigRecord::new()
            .with_value("x", 1)
            .with_hook(keys::CREATED, |_| Ok(()));

        let snapshot = record.clone();
        for (key, value) in record.iter() {
            assert!(snapshot.get(key).unwrap().ptr_eq(value));
        }
    }

    #[test]
    fn test_replacing_value_breaks_identity() {
        let mut record = ConfigRecord::new().with_value("x", 1);
        let snapshot = record.clone();

        record.set("x", ConfigValue::Plain(Rc::new(Value::from(1))));
        assert!(!snapshot.get("x").unwrap().ptr_eq(record.get("x").unwrap()));
    }

    #[test]
    fn test_hook_builder_appends() {
        let record = ConfigRecord::new()
            .with_hook(keys::CREATED, |_| Ok(()))
            .with_hook(keys::CREATED, |_| Ok(()));
        assert_eq!(record.hooks(keys::CREATED).unwrap().len(), 2);
    }

    #[test]
    fn test_typed_accessors() {
        let record = ConfigRecord::new()
            .with_name("counter")
            .with_method("m", |_, _| Value::from(1));
        assert_eq!(record.name().as_deref(), Some("counter"));
        assert!(record.methods().unwrap().contains_key("m"));
        assert!(record.data_factory().is_none());
    }
}

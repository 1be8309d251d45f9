//! # cinder
//!
//! Reactive component runtime for Rust.
//!
//! Built on [spark-signals](https://github.com/RLabs-Inc/spark-signals) for
//! fine-grained reactivity.
//!
//! ## Architecture
//!
//! Components are declared as classes: configuration records holding hooks,
//! a data factory, methods, a prop schema, computed getters, watchers and
//! nested component registries. Classes extend one another; a class's
//! effective configuration is resolved lazily through its extension chain
//! and cached with identity-based invalidation.
//!
//! Instantiation runs a fixed-order synchronous bootstrap:
//! ```text
//! Created → LifecycleLinked → EventsLinked → RenderLinked
//!   → BeforeCreateHook → InjectionsResolved → StateInitialized
//!   → ProvisionsPublished → CreatedHook → (optional) Mounted
//! ```
//!
//! Framework-created children skip the generic options merge entirely and
//! delegate unset configuration keys to their class (the internal fast
//! path).
//!
//! ## Modules
//!
//! - [`value`] - Dynamic values flowing through instance state
//! - [`config`] - Configuration records, the options merger, registries
//! - [`class`] - Component classes and option resolution
//! - [`instance`] - Instances and the lifecycle bootstrap
//! - [`node`] - Placeholder nodes (render output description)

pub mod class;
pub mod config;
pub mod error;
pub mod instance;
pub mod node;
pub mod value;

// Re-export commonly used items
pub use value::{Value, ValueKind};

pub use config::{
    keys, merge::merge_config, merge::reset_merge_strategies, merge::set_merge_strategy,
    ComponentRegistry, ComputedFn, ConfigRecord, ConfigValue, DataFactory, Hook, InjectSpec,
    Method, PropSpec, ProvideFactory, RenderFn, WatchHandler,
};

pub use class::ComponentClass;

pub use error::{HookError, InitError};

pub use instance::{
    events::EventHandler,
    lifecycle::{LifecycleFlags, Stage},
    Instance, InstanceArgs, InternalArgs, RenderOverride,
};

pub use node::{ComponentAttachment, PlaceholderNode};

//! Instance events - Emitter surface and parent listener attachment.
//!
//! Listeners registered under a name are invoked synchronously, in
//! registration order, when that name is emitted. The EventsLinked bootstrap
//! stage attaches the listeners the parent bound on this instance's
//! placeholder node, so they observe everything emitted from the `created`
//! hook onward.

use std::rc::Rc;

use crate::value::Value;

use super::Instance;

// =============================================================================
// Types
// =============================================================================

/// An event listener: receives the emitting instance and the emit arguments.
pub type EventHandler = Rc<dyn Fn(&Instance, &[Value])>;

#[derive(Clone)]
pub(crate) struct EventEntry {
    pub handler: EventHandler,
    pub once: bool,
}

// =============================================================================
// EventsLinked
// =============================================================================

/// Attach parent-supplied listener bindings carried by the placeholder node.
pub(crate) fn init_events(vm: &Instance) {
    let bindings = vm.config.borrow().parent_listeners.clone();
    for (event, handler) in bindings {
        vm.on(&event, handler);
    }
}

// =============================================================================
// Emitter surface
// =============================================================================

impl Instance {
    /// Register a listener under `event`.
    pub fn on(&self, event: &str, handler: EventHandler) {
        self.events
            .borrow_mut()
            .entry(event.to_string())
            .or_default()
            .push(EventEntry {
                handler,
                once: false,
            });
    }

    /// Register a listener that is removed after its first invocation.
    pub fn once(&self, event: &str, handler: EventHandler) {
        self.events
            .borrow_mut()
            .entry(event.to_string())
            .or_default()
            .push(EventEntry {
                handler,
                once: true,
            });
    }

    /// Remove listeners: all of them, or all registered under `event`.
    pub fn off(&self, event: Option<&str>) {
        match event {
            Some(event) => {
                self.events.borrow_mut().remove(event);
            }
            None => self.events.borrow_mut().clear(),
        }
    }

    /// Remove one specific listener registered under `event`.
    pub fn off_handler(&self, event: &str, handler: &EventHandler) {
        if let Some(entries) = self.events.borrow_mut().get_mut(event) {
            entries.retain(|entry| !Rc::ptr_eq(&entry.handler, handler));
        }
    }

    /// Invoke all listeners registered under `event`, synchronously, in
    /// registration order.
    pub fn emit(&self, event: &str, args: &[Value]) {
        // Snapshot first: listeners may register or remove listeners.
        let entries: Vec<EventEntry> = match self.events.borrow().get(event) {
            Some(entries) => entries.clone(),
            None => return,
        };

        // One-shot listeners come off before invocation so a re-entrant
        // emit cannot fire them twice.
        if entries.iter().any(|entry| entry.once) {
            if let Some(live) = self.events.borrow_mut().get_mut(event) {
                live.retain(|entry| !entry.once);
            }
        }

        for entry in entries {
            (entry.handler)(self, args);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::class::ComponentClass;
    use crate::config::ConfigRecord;
    use crate::instance::InstanceArgs;

    fn bare_instance() -> Rc<Instance> {
        let class = ComponentClass::define(ConfigRecord::new());
        Instance::new(&class, InstanceArgs::User(ConfigRecord::new())).unwrap()
    }

    #[test]
    fn test_emit_in_registration_order() {
        let vm = bare_instance();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let s = seen.clone();
        vm.on("ping", Rc::new(move |_, _| s.borrow_mut().push(1)));
        let s = seen.clone();
        vm.on("ping", Rc::new(move |_, _| s.borrow_mut().push(2)));

        vm.emit("ping", &[]);
        assert_eq!(*seen.borrow(), vec![1, 2]);
    }

    #[test]
    fn test_once_fires_once() {
        let vm = bare_instance();
        let seen = Rc::new(RefCell::new(0));

        let s = seen.clone();
        vm.once("ping", Rc::new(move |_, _| *s.borrow_mut() += 1));

        vm.emit("ping", &[]);
        vm.emit("ping", &[]);
        assert_eq!(*seen.borrow(), 1);
    }

    #[test]
    fn test_off_handler_removes_only_that_listener() {
        let vm = bare_instance();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let s = seen.clone();
        let first: EventHandler = Rc::new(move |_, _| s.borrow_mut().push("first"));
        let s = seen.clone();
        let second: EventHandler = Rc::new(move |_, _| s.borrow_mut().push("second"));

        vm.on("ping", first.clone());
        vm.on("ping", second);
        vm.off_handler("ping", &first);

        vm.emit("ping", &[]);
        assert_eq!(*seen.borrow(), vec!["second"]);
    }

    #[test]
    fn test_emit_args_delivered() {
        let vm = bare_instance();
        let seen = Rc::new(RefCell::new(Value::Null));

        let s = seen.clone();
        vm.on(
            "value",
            Rc::new(move |_, args: &[Value]| *s.borrow_mut() = args[0].clone()),
        );

        vm.emit("value", &[Value::from(42)]);
        assert_eq!(*seen.borrow(), Value::from(42));
    }
}

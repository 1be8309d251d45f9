//! Placeholder nodes - Render output description.
//!
//! A `PlaceholderNode` is one node of the description a render function
//! produces. When a node stands for a nested component inside its parent's
//! output, it carries a `ComponentAttachment`: the prop values, parent-bound
//! event listeners, slot content and tag identity destined for the child
//! instance that will be created at that position.
//!
//! How a node tree becomes visible output is the rendering system's business,
//! not this crate's; the tree is only the contract between the two.

use std::collections::HashMap;
use std::rc::Rc;

use crate::instance::events::EventHandler;
use crate::value::Value;

// =============================================================================
// Placeholder node
// =============================================================================

/// One node of rendered-output description.
#[derive(Clone, Default)]
pub struct PlaceholderNode {
    /// Tag identity ("box", "text", or a registered component name).
    pub tag: String,
    /// Literal text content, for text-only nodes.
    pub text: Option<String>,
    /// Nested output nodes.
    pub children: Vec<Rc<PlaceholderNode>>,
    /// Present when this node stands for a nested component instance.
    pub attachment: Option<ComponentAttachment>,
}

/// Data destined for the child instance a component node stands for.
#[derive(Clone, Default)]
pub struct ComponentAttachment {
    /// Prop values supplied by the parent.
    pub props_data: HashMap<String, Value>,
    /// Event listeners the parent bound on the child (name, handler).
    pub listeners: Vec<(String, EventHandler)>,
    /// Slot content: nodes the parent nested inside the component tag.
    pub slot_children: Vec<Rc<PlaceholderNode>>,
    /// The component tag as written by the parent.
    pub tag: String,
}

impl PlaceholderNode {
    /// A bare element node.
    pub fn element(tag: impl Into<String>) -> Self {
        PlaceholderNode {
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// A text node.
    pub fn text(content: impl Into<String>) -> Self {
        PlaceholderNode {
            tag: String::new(),
            text: Some(content.into()),
            ..Default::default()
        }
    }

    /// A component node carrying attachment data for the child it stands for.
    pub fn component(attachment: ComponentAttachment) -> Self {
        PlaceholderNode {
            tag: attachment.tag.clone(),
            attachment: Some(attachment),
            ..Default::default()
        }
    }

    /// Append a child node.
    pub fn with_child(mut self, child: PlaceholderNode) -> Self {
        self.children.push(Rc::new(child));
        self
    }
}

impl ComponentAttachment {
    pub fn new(tag: impl Into<String>) -> Self {
        ComponentAttachment {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn with_prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props_data.insert(name.into(), value.into());
        self
    }

    pub fn with_listener(mut self, event: impl Into<String>, handler: EventHandler) -> Self {
        self.listeners.push((event.into(), handler));
        self
    }

    pub fn with_slot_child(mut self, child: PlaceholderNode) -> Self {
        self.slot_children.push(Rc::new(child));
        self
    }
}

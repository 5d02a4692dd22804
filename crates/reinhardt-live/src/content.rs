//! Renderable values.
//!
//! `Content` is what an html binding's source emits and what list renderers
//! return. The variant is decided by whoever produces the value, once per
//! emission, so the binders never have to guess what they were given.

use std::fmt;
use std::rc::Rc;

use crate::dom::{NodeId, View};
use crate::live::Live;

/// Post-insert hook, called with the first node of the rendered content.
pub type Hook = Rc<dyn Fn(&Live, NodeId)>;

/// A renderable value.
#[derive(Clone)]
pub enum Content {
	/// Markup parsed into fresh nodes.
	Markup(String),
	/// A single text node.
	Text(String),
	/// A declarative view mounted into fresh nodes.
	View(View),
	/// Existing nodes, reused as they are. Fragments contribute their
	/// children.
	Nodes(Vec<NodeId>),
	/// No content; the hook runs with the placeholder that holds the region.
	Hook(Hook),
	/// No content.
	Empty,
}

impl Content {
	/// Markup content.
	pub fn markup(markup: impl Into<String>) -> Self {
		Self::Markup(markup.into())
	}

	/// Text content.
	pub fn text(text: impl Into<String>) -> Self {
		Self::Text(text.into())
	}

	/// Hook content.
	pub fn hook(hook: impl Fn(&Live, NodeId) + 'static) -> Self {
		Self::Hook(Rc::new(hook))
	}
}

impl Default for Content {
	fn default() -> Self {
		Self::Empty
	}
}

impl PartialEq for Content {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Markup(a), Self::Markup(b)) | (Self::Text(a), Self::Text(b)) => a == b,
			(Self::View(a), Self::View(b)) => a == b,
			(Self::Nodes(a), Self::Nodes(b)) => a == b,
			(Self::Hook(a), Self::Hook(b)) => Rc::ptr_eq(a, b),
			(Self::Empty, Self::Empty) => true,
			_ => false,
		}
	}
}

impl fmt::Debug for Content {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Markup(markup) => f.debug_tuple("Markup").field(markup).finish(),
			Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
			Self::View(view) => f.debug_tuple("View").field(view).finish(),
			Self::Nodes(nodes) => f.debug_tuple("Nodes").field(nodes).finish(),
			Self::Hook(_) => f.write_str("Hook(..)"),
			Self::Empty => f.write_str("Empty"),
		}
	}
}

impl From<String> for Content {
	fn from(markup: String) -> Self {
		Self::Markup(markup)
	}
}

impl From<&str> for Content {
	fn from(markup: &str) -> Self {
		Self::Markup(markup.to_string())
	}
}

impl From<View> for Content {
	fn from(view: View) -> Self {
		Self::View(view)
	}
}

impl<T: Into<Content>> From<Option<T>> for Content {
	fn from(value: Option<T>) -> Self {
		value.map_or(Self::Empty, Into::into)
	}
}

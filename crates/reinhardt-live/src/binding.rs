//! Live binders
//!
//! Each binder subscribes to a reactive source and keeps one region of the
//! document in sync with it:
//!
//! | Binder | Region | Source |
//! |--------|--------|--------|
//! | [`Live::text`] | one text node | any `ToString` value |
//! | [`Live::html`] | a node range | [`Content`] |
//! | [`Live::attr`] | one attribute | any `ToString` value |
//! | [`Live::attrs`] | a set of attributes | `name='value'` strings |
//! | [`Live::list`] | a node range per item | [`ListSource`] |
//!
//! The first render commits synchronously, so the content is in the tree when
//! the binder returns. Every later change goes through the session's
//! [`UpdateQueue`](crate::UpdateQueue). Regions are torn down, releasing their
//! subscriptions, once their nodes leave the document for good.
//!
//! [`Content`]: crate::Content
//! [`ListSource`]: crate::reactive::ListSource
//! [`Live::text`]: crate::Live::text
//! [`Live::html`]: crate::Live::html
//! [`Live::attr`]: crate::Live::attr
//! [`Live::attrs`]: crate::Live::attrs
//! [`Live::list`]: crate::Live::list

mod attr;
mod list;
mod scalar;

use std::fmt;
use std::rc::Rc;

pub use attr::{AttrBinding, parse_attr_set};
pub use list::ItemScope;

use crate::content::Content;
use crate::dom::NodeId;
use crate::error::{LiveError, LiveResult};
use crate::live::Live;
use crate::registry::{RangeId, Teardown};

/// Options for [`Live::text`] and [`Live::html`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BindOptions {
	/// Parent to use when the target sits in a fragment.
	pub parent_node: Option<NodeId>,
	/// Existing range to render into instead of the target alone.
	pub range: Option<RangeId>,
	/// Range the new range is nested in.
	pub parent_range: Option<RangeId>,
}

impl BindOptions {
	/// Default options.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the fallback parent node.
	pub fn parent_node(mut self, node: NodeId) -> Self {
		self.parent_node = Some(node);
		self
	}

	/// Renders into an existing range.
	pub fn range(mut self, range: RangeId) -> Self {
		self.range = Some(range);
		self
	}

	/// Nests the binding's range under `range`.
	pub fn parent_range(mut self, range: RangeId) -> Self {
		self.parent_range = Some(range);
		self
	}
}

/// Renders the content shown while a list is empty.
pub type EmptyRenderer = Rc<dyn Fn(&Live) -> Content>;

/// Options for [`Live::list`].
#[derive(Clone, Default)]
pub struct ListOptions {
	/// Parent to use when the target sits in a fragment.
	pub parent_node: Option<NodeId>,
	/// Existing range to render into instead of the target alone.
	pub range: Option<RangeId>,
	/// Range the list's range is nested in.
	pub parent_range: Option<RangeId>,
	/// Content rendered while the collection has no items.
	pub empty: Option<EmptyRenderer>,
}

impl ListOptions {
	/// Default options.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the fallback parent node.
	pub fn parent_node(mut self, node: NodeId) -> Self {
		self.parent_node = Some(node);
		self
	}

	/// Renders into an existing range.
	pub fn range(mut self, range: RangeId) -> Self {
		self.range = Some(range);
		self
	}

	/// Nests the list's range under `range`.
	pub fn parent_range(mut self, range: RangeId) -> Self {
		self.parent_range = Some(range);
		self
	}

	/// Renders `empty` while the collection has no items.
	pub fn empty(mut self, empty: impl Fn(&Live) -> Content + 'static) -> Self {
		self.empty = Some(Rc::new(empty));
		self
	}
}

impl fmt::Debug for ListOptions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ListOptions")
			.field("parent_node", &self.parent_node)
			.field("range", &self.range)
			.field("parent_range", &self.parent_range)
			.field("empty", &self.empty.is_some())
			.finish()
	}
}

impl Live {
	/// Creates the range a binder renders into: the given existing range, or
	/// a new one holding just the target.
	///
	/// Returns the range and whether it was created here.
	pub(crate) fn binding_range(
		&self,
		target: NodeId,
		existing: Option<RangeId>,
		parent_node: Option<NodeId>,
	) -> LiveResult<(RangeId, bool)> {
		if !self.document().has_node(target) {
			return Err(LiveError::UnknownNode(target));
		}
		let parent_node = self.resolve_parent_node(target, parent_node);
		let mut registry = self.registry_mut();
		let (range, created) = match existing {
			Some(range) if registry.contains(range) => (range, false),
			Some(range) => return Err(LiveError::UnknownRange(range)),
			None => (registry.create(vec![target]), true),
		};
		registry.set_container(range, parent_node)?;
		Ok((range, created))
	}

	/// Registers a binder's range (or attaches the teardown to an existing
	/// one).
	pub(crate) fn register_binding(
		&self,
		range: RangeId,
		created: bool,
		teardown: Teardown,
		parent_range: Option<RangeId>,
	) -> LiveResult<()> {
		let mut registry = self.registry_mut();
		if created {
			registry.register(range, Some(teardown), parent_range)
		} else {
			registry.set_teardown(range, teardown)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_bind_options_builder() {
		let mut live_doc = crate::dom::Document::new();
		let node = live_doc.create_text("x");
		let options = BindOptions::new().parent_node(node);
		assert_eq!(options.parent_node, Some(node));
		assert_eq!(options.range, None);
	}

	#[test]
	fn test_list_options_debug_hides_renderer() {
		let options = ListOptions::new().empty(|_| Content::Empty);
		assert_eq!(
			format!("{:?}", options),
			"ListOptions { parent_node: None, range: None, parent_range: None, empty: true }"
		);
	}
}

//! Node Range Registry
//!
//! A forest of node ranges. Each range is an ordered run of sibling nodes that
//! one live region owns, plus its teardown callback and a non-owning link to
//! the range it is nested in.
//!
//! ## Invariants
//!
//! - A range's recorded nodes are the nodes most recently committed for it.
//!   While a range is live they are contiguous siblings under one parent.
//! - A range never records zero nodes once committed; an empty region is held
//!   by a placeholder node so later content has an anchor.
//! - A child range's top-level nodes form a contiguous slice of its parent's
//!   nodes, or live inside one of them. [`NodeRangeRegistry::update`] keeps
//!   ancestor slices in step.
//! - Unregistering a range unregisters its descendants first and hands back
//!   every teardown exactly once. A range that is no longer tracked yields
//!   nothing, so repeated teardown is a no-op.
//!
//! Teardown callbacks are returned to the caller instead of being run here so
//! they can execute after the registry borrow has been released.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::dom::{Document, NodeId};
use crate::error::{LiveError, LiveResult};
use crate::settings::PlaceholderKind;

/// Handle to a tracked node range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RangeId(u64);

/// Callback releasing a range's resources.
pub type Teardown = Box<dyn FnOnce()>;

struct RangeRecord {
	nodes: Vec<NodeId>,
	parent: Option<RangeId>,
	children: Vec<RangeId>,
	teardown: Option<Teardown>,
	registered: bool,
	container: Option<NodeId>,
}

/// Outcome of [`NodeRangeRegistry::update`].
pub struct RangeUpdate {
	/// The nodes the range owned before the update.
	pub old: Vec<NodeId>,
	/// Teardowns of nested ranges whose content is gone.
	pub torn_down: Vec<Teardown>,
}

impl fmt::Debug for RangeUpdate {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RangeUpdate")
			.field("old", &self.old)
			.field("torn_down", &self.torn_down.len())
			.finish()
	}
}

/// The forest of live node ranges of one session.
#[derive(Default)]
pub struct NodeRangeRegistry {
	ranges: BTreeMap<RangeId, RangeRecord>,
	next_id: u64,
	placeholder: PlaceholderKind,
}

impl fmt::Debug for NodeRangeRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("NodeRangeRegistry")
			.field("ranges", &self.ranges.len())
			.field("placeholder", &self.placeholder)
			.finish()
	}
}

impl NodeRangeRegistry {
	/// Creates an empty registry using `placeholder` nodes for empty ranges.
	pub fn new(placeholder: PlaceholderKind) -> Self {
		Self {
			ranges: BTreeMap::new(),
			next_id: 0,
			placeholder,
		}
	}

	fn record(&self, range: RangeId) -> LiveResult<&RangeRecord> {
		self.ranges.get(&range).ok_or(LiveError::UnknownRange(range))
	}

	fn record_mut(&mut self, range: RangeId) -> LiveResult<&mut RangeRecord> {
		self.ranges.get_mut(&range).ok_or(LiveError::UnknownRange(range))
	}

	/// Starts tracking `nodes` as a new, not yet registered range.
	pub fn create(&mut self, nodes: Vec<NodeId>) -> RangeId {
		let id = RangeId(self.next_id);
		self.next_id += 1;
		self.ranges.insert(
			id,
			RangeRecord {
				nodes,
				parent: None,
				children: Vec::new(),
				teardown: None,
				registered: false,
				container: None,
			},
		);
		id
	}

	/// Registers `range` with its teardown, nested under `parent`.
	///
	/// When `parent` is no longer tracked the range is registered at the top
	/// level instead, so its teardown still runs when its nodes leave the
	/// document.
	pub fn register(
		&mut self,
		range: RangeId,
		teardown: Option<Teardown>,
		parent: Option<RangeId>,
	) -> LiveResult<()> {
		self.record(range)?;
		if let Some(teardown) = teardown {
			self.set_teardown(range, teardown)?;
		}
		let parent = match parent {
			Some(parent) if parent == range => None,
			Some(parent) if self.ranges.contains_key(&parent) => Some(parent),
			Some(parent) => {
				tracing::debug!(range = ?range, parent = ?parent, "parent range gone; registering at top level");
				None
			}
			None => None,
		};
		self.detach_from_parent(range);
		if let Some(parent) = parent {
			if let Some(record) = self.ranges.get_mut(&parent) {
				record.children.push(range);
			}
		}
		let record = self.record_mut(range)?;
		record.parent = parent;
		record.registered = true;
		Ok(())
	}

	fn detach_from_parent(&mut self, range: RangeId) {
		let parent = self.ranges.get(&range).and_then(|r| r.parent);
		if let Some(parent) = parent {
			if let Some(record) = self.ranges.get_mut(&parent) {
				record.children.retain(|child| *child != range);
			}
		}
	}

	/// Adds a teardown to `range`, after any teardown it already has.
	pub fn set_teardown(&mut self, range: RangeId, teardown: Teardown) -> LiveResult<()> {
		let record = self.record_mut(range)?;
		record.teardown = Some(match record.teardown.take() {
			Some(previous) => Box::new(move || {
				previous();
				teardown();
			}),
			None => teardown,
		});
		Ok(())
	}

	/// Sets the node used as parent while the range's nodes sit in a fragment.
	pub fn set_container(&mut self, range: RangeId, container: Option<NodeId>) -> LiveResult<()> {
		self.record_mut(range)?.container = container;
		Ok(())
	}

	/// Returns the nodes a range currently owns.
	pub fn nodes(&self, range: RangeId) -> LiveResult<&[NodeId]> {
		Ok(&self.record(range)?.nodes)
	}

	/// Returns the first node of a range.
	pub fn first(&self, range: RangeId) -> Option<NodeId> {
		self.ranges.get(&range)?.nodes.first().copied()
	}

	/// Returns the last node of a range.
	pub fn last(&self, range: RangeId) -> Option<NodeId> {
		self.ranges.get(&range)?.nodes.last().copied()
	}

	/// Returns the node a range's content lives under.
	///
	/// That is the parent of the first node, unless that parent is a fragment
	/// (or missing), in which case the range's container is used.
	pub fn parent_node_of(&self, doc: &Document, range: RangeId) -> Option<NodeId> {
		let record = self.ranges.get(&range)?;
		let parent = record.nodes.first().and_then(|first| doc.parent(*first));
		match parent {
			Some(parent) if !doc.is_fragment(parent) => Some(parent),
			other => record.container.or(other),
		}
	}

	/// Returns true if the range is tracked.
	pub fn contains(&self, range: RangeId) -> bool {
		self.ranges.contains_key(&range)
	}

	/// Returns true if the range is tracked and registered.
	pub fn is_registered(&self, range: RangeId) -> bool {
		self.ranges.get(&range).is_some_and(|r| r.registered)
	}

	/// Returns the range a range is nested in.
	pub fn parent_of(&self, range: RangeId) -> Option<RangeId> {
		self.ranges.get(&range)?.parent
	}

	/// Returns the ranges nested directly in `range`.
	pub fn children_of(&self, range: RangeId) -> &[RangeId] {
		self.ranges
			.get(&range)
			.map(|r| r.children.as_slice())
			.unwrap_or(&[])
	}

	/// Number of tracked ranges.
	pub fn len(&self) -> usize {
		self.ranges.len()
	}

	/// Returns true if nothing is tracked.
	pub fn is_empty(&self) -> bool {
		self.ranges.is_empty()
	}

	/// Creates the placeholder node that holds the position of empty content.
	pub fn placeholder(&self, doc: &mut Document) -> NodeId {
		match self.placeholder {
			PlaceholderKind::Text => doc.create_text(""),
			PlaceholderKind::Comment => doc.create_comment("live placeholder"),
		}
	}

	/// Records `nodes` as the range's content.
	///
	/// Ancestors whose nodes contain the range's old run as a slice get the
	/// same splice. Nested ranges whose first node is no longer inside the new
	/// content are unregistered; their teardowns are returned.
	pub fn update(&mut self, doc: &Document, range: RangeId, nodes: Vec<NodeId>) -> LiveResult<RangeUpdate> {
		let old = std::mem::replace(&mut self.record_mut(range)?.nodes, nodes.clone());

		let mut ancestor = self.parent_of(range);
		while let Some(id) = ancestor {
			let Some(record) = self.ranges.get_mut(&id) else {
				break;
			};
			let Some(start) = old
				.first()
				.and_then(|first| record.nodes.iter().position(|n| n == first))
			else {
				break;
			};
			let end = (start + old.len()).min(record.nodes.len());
			if record.nodes[start..end] != old[..end - start] {
				break;
			}
			record.nodes.splice(start..end, nodes.iter().copied());
			ancestor = record.parent;
		}

		let stale: Vec<RangeId> = self
			.children_of(range)
			.iter()
			.copied()
			.filter(|child| {
				self.first(*child)
					.is_none_or(|first| !nodes.iter().any(|n| doc.contains(*n, first)))
			})
			.collect();
		let mut torn_down = Vec::new();
		for child in stale {
			tracing::trace!(range = ?child, parent = ?range, "nested range dropped by update");
			torn_down.extend(self.unregister(child));
		}

		Ok(RangeUpdate { old, torn_down })
	}

	/// Replaces `old` with `new` in the tree.
	///
	/// Nodes present in both are kept (moved if needed) rather than removed
	/// and re-inserted. The resulting document order of `new` matches the
	/// slice order. Returns false, doing nothing, when `old` has no parent.
	pub fn replace_nodes(doc: &mut Document, old: &[NodeId], new: &[NodeId]) -> LiveResult<bool> {
		let Some(parent) = old
			.iter()
			.find_map(|node| doc.parent(*node))
		else {
			return Ok(false);
		};
		let old_set: HashSet<NodeId> = old.iter().copied().collect();
		let new_set: HashSet<NodeId> = new.iter().copied().collect();

		let siblings = doc.children(parent);
		let after_old = siblings
			.iter()
			.rposition(|node| old_set.contains(node))
			.map_or(0, |i| i + 1);
		let reference = siblings[after_old..]
			.iter()
			.copied()
			.find(|node| !new_set.contains(node));

		for node in old {
			if !new_set.contains(node) && doc.parent(*node).is_some() {
				doc.remove(*node)?;
			}
		}

		let mut cursor = reference;
		for &node in new.iter().rev() {
			let in_place = doc.parent(node) == Some(parent) && doc.next_sibling(node) == cursor;
			if !in_place {
				doc.insert_before(parent, node, cursor)?;
			}
			cursor = Some(node);
		}
		Ok(true)
	}

	/// Replaces the range's nodes in the tree and records the new ones.
	pub fn replace(&mut self, doc: &mut Document, range: RangeId, new: Vec<NodeId>) -> LiveResult<RangeUpdate> {
		let old = self.nodes(range)?.to_vec();
		if !Self::replace_nodes(doc, &old, &new)? {
			return Err(LiveError::DetachedAnchor(range));
		}
		self.update(doc, range, new)
	}

	/// Stops tracking `range` and everything nested in it.
	///
	/// Returns the teardowns to run, innermost first. Unknown ranges yield
	/// nothing.
	pub fn unregister(&mut self, range: RangeId) -> Vec<Teardown> {
		if !self.ranges.contains_key(&range) {
			return Vec::new();
		}
		self.detach_from_parent(range);

		let mut order = Vec::new();
		let mut stack = vec![(range, false)];
		while let Some((id, expanded)) = stack.pop() {
			if expanded {
				order.push(id);
				continue;
			}
			stack.push((id, true));
			for child in self.children_of(id).iter().rev() {
				stack.push((*child, false));
			}
		}

		let mut teardowns = Vec::new();
		for id in order {
			if let Some(record) = self.ranges.remove(&id) {
				tracing::debug!(range = ?id, "node range unregistered");
				teardowns.extend(record.teardown);
			}
		}
		teardowns
	}

	/// Unregisters every range whose first node lies under `root` and is no
	/// longer attached to the document.
	pub fn teardown_check(&mut self, doc: &Document, root: NodeId) -> Vec<Teardown> {
		let detached: Vec<RangeId> = self
			.ranges
			.iter()
			.filter(|(_, record)| {
				record
					.nodes
					.first()
					.is_some_and(|first| doc.contains(root, *first) && !doc.is_attached(*first))
			})
			.map(|(id, _)| *id)
			.collect();
		let mut teardowns = Vec::new();
		for range in detached {
			teardowns.extend(self.unregister(range));
		}
		teardowns
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::{fixture, rstest};
	use std::cell::Cell;
	use std::rc::Rc;

	struct Fixture {
		doc: Document,
		registry: NodeRangeRegistry,
		host: NodeId,
	}

	#[fixture]
	fn fx() -> Fixture {
		let mut doc = Document::new();
		let host = doc.create_element("div");
		doc.append_child(doc.body(), host).unwrap();
		Fixture {
			doc,
			registry: NodeRangeRegistry::default(),
			host,
		}
	}

	fn texts(doc: &mut Document, parent: NodeId, values: &[&str]) -> Vec<NodeId> {
		values
			.iter()
			.map(|v| {
				let node = doc.create_text(v);
				doc.append_child(parent, node).unwrap();
				node
			})
			.collect()
	}

	fn counter() -> (Rc<Cell<usize>>, Teardown) {
		let calls = Rc::new(Cell::new(0));
		let c = calls.clone();
		(calls, Box::new(move || c.set(c.get() + 1)))
	}

	#[rstest]
	fn test_replace_keeps_surviving_nodes(mut fx: Fixture) {
		let nodes = texts(&mut fx.doc, fx.host, &["a", "b", "c"]);
		let after = texts(&mut fx.doc, fx.host, &["!"]);
		let range = fx.registry.create(nodes.clone());
		let d = fx.doc.create_text("d");

		let new = vec![nodes[2], d, nodes[0]];
		let update = fx.registry.replace(&mut fx.doc, range, new.clone()).unwrap();

		assert_eq!(update.old, nodes);
		assert_eq!(fx.doc.children(fx.host), &[nodes[2], d, nodes[0], after[0]]);
		assert_eq!(fx.doc.text_content(fx.host), "cda!");
		assert_eq!(fx.registry.nodes(range).unwrap(), new.as_slice());
		// only "b" left the document
		assert_eq!(fx.doc.take_removed(), vec![nodes[1]]);
	}

	#[rstest]
	fn test_replace_detached_range_fails(mut fx: Fixture) {
		let loose = fx.doc.create_text("x");
		let range = fx.registry.create(vec![loose]);
		let other = fx.doc.create_text("y");

		let err = fx.registry.replace(&mut fx.doc, range, vec![other]).unwrap_err();
		assert!(matches!(err, LiveError::DetachedAnchor(r) if r == range));
	}

	#[rstest]
	fn test_update_propagates_to_ancestors(mut fx: Fixture) {
		let nodes = texts(&mut fx.doc, fx.host, &["a", "b", "c", "d"]);
		let outer = fx.registry.create(nodes.clone());
		fx.registry.register(outer, None, None).unwrap();
		let inner = fx.registry.create(vec![nodes[1], nodes[2]]);
		fx.registry.register(inner, None, Some(outer)).unwrap();
		let x = fx.doc.create_text("x");

		fx.registry.replace(&mut fx.doc, inner, vec![x]).unwrap();

		assert_eq!(fx.registry.nodes(outer).unwrap(), &[nodes[0], x, nodes[3]]);
		assert_eq!(fx.doc.text_content(fx.host), "axd");
	}

	#[rstest]
	fn test_update_tears_down_orphaned_children(mut fx: Fixture) {
		let nodes = texts(&mut fx.doc, fx.host, &["a", "b"]);
		let outer = fx.registry.create(nodes.clone());
		fx.registry.register(outer, None, None).unwrap();
		let (calls, teardown) = counter();
		let inner = fx.registry.create(vec![nodes[1]]);
		fx.registry.register(inner, Some(teardown), Some(outer)).unwrap();

		let placeholder = fx.registry.placeholder(&mut fx.doc);
		let update = fx.registry.replace(&mut fx.doc, outer, vec![placeholder]).unwrap();
		for teardown in update.torn_down {
			teardown();
		}

		assert_eq!(calls.get(), 1);
		assert!(!fx.registry.contains(inner));
		assert!(fx.registry.children_of(outer).is_empty());
	}

	#[rstest]
	fn test_unregister_cascades_once(mut fx: Fixture) {
		let nodes = texts(&mut fx.doc, fx.host, &["a"]);
		let order = Rc::new(std::cell::RefCell::new(Vec::new()));
		let outer = fx.registry.create(nodes.clone());
		let inner = fx.registry.create(nodes.clone());
		let o = order.clone();
		fx.registry
			.register(outer, Some(Box::new(move || o.borrow_mut().push("outer"))), None)
			.unwrap();
		let i = order.clone();
		fx.registry
			.register(inner, Some(Box::new(move || i.borrow_mut().push("inner"))), Some(outer))
			.unwrap();

		for teardown in fx.registry.unregister(outer) {
			teardown();
		}
		assert!(fx.registry.unregister(outer).is_empty());
		assert!(fx.registry.unregister(inner).is_empty());

		assert_eq!(*order.borrow(), vec!["inner", "outer"]);
		assert!(fx.registry.is_empty());
	}

	#[rstest]
	fn test_register_under_missing_parent_falls_back_to_top_level(mut fx: Fixture) {
		let nodes = texts(&mut fx.doc, fx.host, &["a"]);
		let gone = fx.registry.create(nodes.clone());
		fx.registry.unregister(gone);
		let range = fx.registry.create(nodes);

		fx.registry.register(range, None, Some(gone)).unwrap();

		assert!(fx.registry.is_registered(range));
		assert_eq!(fx.registry.parent_of(range), None);
	}

	#[rstest]
	fn test_set_teardown_chains(mut fx: Fixture) {
		let nodes = texts(&mut fx.doc, fx.host, &["a"]);
		let range = fx.registry.create(nodes);
		let (first, a) = counter();
		let (second, b) = counter();
		fx.registry.register(range, Some(a), None).unwrap();
		fx.registry.set_teardown(range, b).unwrap();

		for teardown in fx.registry.unregister(range) {
			teardown();
		}

		assert_eq!((first.get(), second.get()), (1, 1));
	}

	#[rstest]
	fn test_teardown_check_only_detached(mut fx: Fixture) {
		let kept = texts(&mut fx.doc, fx.host, &["kept"]);
		let wrapper = fx.doc.create_element("section");
		fx.doc.append_child(fx.host, wrapper).unwrap();
		let gone = texts(&mut fx.doc, wrapper, &["gone"]);
		let kept_range = fx.registry.create(kept);
		let gone_range = fx.registry.create(gone);
		fx.registry.register(kept_range, None, None).unwrap();
		let (calls, teardown) = counter();
		fx.registry.register(gone_range, Some(teardown), None).unwrap();

		fx.doc.remove(wrapper).unwrap();
		for teardown in fx.registry.teardown_check(&fx.doc, wrapper) {
			teardown();
		}
		for teardown in fx.registry.teardown_check(&fx.doc, wrapper) {
			teardown();
		}

		assert_eq!(calls.get(), 1);
		assert!(fx.registry.contains(kept_range));
		assert!(!fx.registry.contains(gone_range));
	}

	#[rstest]
	fn test_parent_node_uses_container_inside_fragment(mut fx: Fixture) {
		let frag = fx.doc.create_fragment();
		let nodes = texts(&mut fx.doc, frag, &["a"]);
		let range = fx.registry.create(nodes);
		assert_eq!(fx.registry.parent_node_of(&fx.doc, range), Some(frag));

		fx.registry.set_container(range, Some(fx.host)).unwrap();

		assert_eq!(fx.registry.parent_node_of(&fx.doc, range), Some(fx.host));
	}

	#[rstest]
	#[case(PlaceholderKind::Text, "")]
	#[case(PlaceholderKind::Comment, "<!--live placeholder-->")]
	fn test_placeholder_kind(#[case] kind: PlaceholderKind, #[case] html: &str) {
		let mut doc = Document::new();
		let registry = NodeRangeRegistry::new(kind);
		let node = registry.placeholder(&mut doc);
		assert_eq!(doc.outer_html(node), html);
	}
}

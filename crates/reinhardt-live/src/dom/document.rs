//! In-memory document tree.
//!
//! `Document` is an arena of nodes addressed by [`NodeId`]. It implements the
//! subset of DOM mutation semantics the live-binding engine relies on:
//!
//! - inserting a fragment moves the fragment's children,
//! - inserting a node that already has a parent relocates it,
//! - removing a node from an attached tree is recorded so the teardown
//!   detector can later decide whether the removal was permanent.
//!
//! A removed node keeps its subtree and can be re-inserted until it is
//! explicitly freed with [`Document::free`]. Freed slots are reused; handles
//! are generational, so a stale [`NodeId`] never resolves to the node that
//! took over its slot.

use std::collections::BTreeMap;

use crate::dom::view::is_void_element;
use crate::error::{LiveError, LiveResult};

/// Handle to a node owned by a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId {
	index: u32,
	generation: u32,
}

impl NodeId {
	/// Returns the arena index of this node.
	pub fn index(self) -> usize {
		self.index as usize
	}

	/// Returns how many times the slot was reused before this node took it.
	pub fn generation(self) -> u32 {
		self.generation
	}
}

/// Element payload: tag name, ordered attributes and style properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementData {
	tag: String,
	attributes: Vec<(String, String)>,
	style: Vec<(String, String)>,
}

impl ElementData {
	/// Returns the lower-cased tag name.
	pub fn tag(&self) -> &str {
		&self.tag
	}

	/// Returns the attributes in insertion order.
	pub fn attributes(&self) -> &[(String, String)] {
		&self.attributes
	}

	/// Returns the style properties in insertion order.
	pub fn style(&self) -> &[(String, String)] {
		&self.style
	}
}

/// What a node is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
	/// The document root.
	Document,
	/// An element.
	Element(ElementData),
	/// A text node.
	Text(String),
	/// A comment node.
	Comment(String),
	/// A document fragment (a parentless container).
	Fragment,
}

#[derive(Debug)]
struct NodeSlot {
	kind: NodeKind,
	parent: Option<NodeId>,
	children: Vec<NodeId>,
	markers: BTreeMap<String, String>,
}

impl NodeSlot {
	fn new(kind: NodeKind) -> Self {
		Self {
			kind,
			parent: None,
			children: Vec::new(),
			markers: BTreeMap::new(),
		}
	}
}

#[derive(Debug, Default)]
struct Slot {
	generation: u32,
	node: Option<NodeSlot>,
}

/// An in-memory document.
#[derive(Debug)]
pub struct Document {
	slots: Vec<Slot>,
	free_list: Vec<u32>,
	root: NodeId,
	body: NodeId,
	removed: Vec<NodeId>,
}

impl Default for Document {
	fn default() -> Self {
		Self::new()
	}
}

impl Document {
	/// Creates a document with an attached `body` element.
	pub fn new() -> Self {
		let mut doc = Self {
			slots: Vec::new(),
			free_list: Vec::new(),
			root: NodeId { index: 0, generation: 0 },
			body: NodeId { index: 0, generation: 0 },
			removed: Vec::new(),
		};
		let root = doc.push_slot(NodeKind::Document);
		let body = doc.create_element("body");
		if let Some(slot) = doc.get_mut(body) {
			slot.parent = Some(root);
		}
		if let Some(slot) = doc.get_mut(root) {
			slot.children.push(body);
		}
		doc.root = root;
		doc.body = body;
		doc
	}

	/// The document root node.
	pub fn root(&self) -> NodeId {
		self.root
	}

	/// The `body` element, attached under the root.
	pub fn body(&self) -> NodeId {
		self.body
	}

	fn push_slot(&mut self, kind: NodeKind) -> NodeId {
		if let Some(index) = self.free_list.pop() {
			let slot = &mut self.slots[index as usize];
			slot.node = Some(NodeSlot::new(kind));
			return NodeId {
				index,
				generation: slot.generation,
			};
		}
		let index = self.slots.len() as u32;
		self.slots.push(Slot {
			generation: 0,
			node: Some(NodeSlot::new(kind)),
		});
		NodeId { index, generation: 0 }
	}

	fn get(&self, id: NodeId) -> Option<&NodeSlot> {
		self.slots
			.get(id.index())
			.filter(|slot| slot.generation == id.generation)
			.and_then(|slot| slot.node.as_ref())
	}

	fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeSlot> {
		self.slots
			.get_mut(id.index())
			.filter(|slot| slot.generation == id.generation)
			.and_then(|slot| slot.node.as_mut())
	}

	fn slot(&self, id: NodeId) -> LiveResult<&NodeSlot> {
		self.get(id).ok_or(LiveError::UnknownNode(id))
	}

	fn slot_mut(&mut self, id: NodeId) -> LiveResult<&mut NodeSlot> {
		self.get_mut(id).ok_or(LiveError::UnknownNode(id))
	}

	fn element_mut(&mut self, id: NodeId) -> LiveResult<&mut ElementData> {
		match &mut self.slot_mut(id)?.kind {
			NodeKind::Element(data) => Ok(data),
			_ => Err(LiveError::NotAnElement(id)),
		}
	}

	fn element(&self, id: NodeId) -> Option<&ElementData> {
		match self.kind(id)? {
			NodeKind::Element(data) => Some(data),
			_ => None,
		}
	}

	/// Returns true if the handle refers to a live node of this document.
	pub fn has_node(&self, id: NodeId) -> bool {
		self.get(id).is_some()
	}

	/// Number of live nodes, the root and `body` included.
	pub fn node_count(&self) -> usize {
		self.slots.len() - self.free_list.len()
	}

	/// Number of arena slots, free ones included.
	pub fn slot_count(&self) -> usize {
		self.slots.len()
	}

	/// Frees a parentless node and its whole subtree, returning how many
	/// nodes were freed.
	///
	/// Nodes that still have a parent, the root, `body` and unknown handles
	/// are left alone. Handles to freed nodes stop resolving.
	pub fn free(&mut self, node: NodeId) -> usize {
		if node == self.root || node == self.body || !self.has_node(node) || self.parent(node).is_some() {
			return 0;
		}
		let mut freed = 0;
		let mut stack = vec![node];
		while let Some(id) = stack.pop() {
			let Some(slot) = self.slots.get_mut(id.index()) else {
				continue;
			};
			if slot.generation != id.generation {
				continue;
			}
			let Some(data) = slot.node.take() else {
				continue;
			};
			slot.generation = slot.generation.wrapping_add(1);
			self.free_list.push(id.index);
			stack.extend(data.children);
			freed += 1;
		}
		let slots = &self.slots;
		self.removed
			.retain(|id| slots.get(id.index()).is_some_and(|slot| slot.generation == id.generation));
		freed
	}

	// ------------------------------------------------------------------
	// Creation
	// ------------------------------------------------------------------

	/// Creates a detached element. The tag name is lower-cased.
	pub fn create_element(&mut self, tag: &str) -> NodeId {
		self.push_slot(NodeKind::Element(ElementData {
			tag: tag.to_ascii_lowercase(),
			..ElementData::default()
		}))
	}

	/// Creates a detached text node.
	pub fn create_text(&mut self, text: &str) -> NodeId {
		self.push_slot(NodeKind::Text(text.to_string()))
	}

	/// Creates a detached comment node.
	pub fn create_comment(&mut self, text: &str) -> NodeId {
		self.push_slot(NodeKind::Comment(text.to_string()))
	}

	/// Creates an empty fragment.
	pub fn create_fragment(&mut self) -> NodeId {
		self.push_slot(NodeKind::Fragment)
	}

	// ------------------------------------------------------------------
	// Navigation
	// ------------------------------------------------------------------

	/// Returns the node's kind.
	pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
		self.get(id).map(|slot| &slot.kind)
	}

	/// Returns true for fragment nodes.
	pub fn is_fragment(&self, id: NodeId) -> bool {
		matches!(self.kind(id), Some(NodeKind::Fragment))
	}

	/// Returns true for text nodes.
	pub fn is_text(&self, id: NodeId) -> bool {
		matches!(self.kind(id), Some(NodeKind::Text(_)))
	}

	/// Returns the tag name of an element.
	pub fn tag_name(&self, id: NodeId) -> Option<&str> {
		self.element(id).map(ElementData::tag)
	}

	/// Returns the parent node.
	pub fn parent(&self, id: NodeId) -> Option<NodeId> {
		self.get(id).and_then(|slot| slot.parent)
	}

	/// Returns the children of a node (empty for unknown nodes).
	pub fn children(&self, id: NodeId) -> &[NodeId] {
		self.get(id)
			.map(|slot| slot.children.as_slice())
			.unwrap_or(&[])
	}

	/// Returns the first child.
	pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
		self.children(id).first().copied()
	}

	fn position_in_parent(&self, id: NodeId) -> Option<(NodeId, usize)> {
		let parent = self.parent(id)?;
		let index = self.children(parent).iter().position(|&c| c == id)?;
		Some((parent, index))
	}

	/// Returns the next sibling.
	pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
		let (parent, index) = self.position_in_parent(id)?;
		self.children(parent).get(index + 1).copied()
	}

	/// Returns the previous sibling.
	pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
		let (parent, index) = self.position_in_parent(id)?;
		index
			.checked_sub(1)
			.and_then(|i| self.children(parent).get(i).copied())
	}

	/// Returns true if `node` is `ancestor` or one of its descendants.
	pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
		let mut current = Some(node);
		while let Some(id) = current {
			if id == ancestor {
				return true;
			}
			current = self.parent(id);
		}
		false
	}

	/// Returns true if the node is connected to the document root.
	pub fn is_attached(&self, id: NodeId) -> bool {
		self.contains(self.root, id)
	}

	// ------------------------------------------------------------------
	// Mutation
	// ------------------------------------------------------------------

	/// Appends `child` as the last child of `parent`.
	pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> LiveResult<()> {
		self.insert_before(parent, child, None)
	}

	/// Inserts `child` before `reference` (or at the end when `None`).
	///
	/// A fragment's children are moved instead of the fragment itself. A node
	/// that already has a parent is relocated; relocation is not recorded as
	/// a removal.
	pub fn insert_before(
		&mut self,
		parent: NodeId,
		child: NodeId,
		reference: Option<NodeId>,
	) -> LiveResult<()> {
		self.slot(parent)?;
		self.slot(child)?;
		if let Some(reference) = reference {
			if self.parent(reference) != Some(parent) {
				return Err(LiveError::NotAChild {
					parent,
					child: reference,
				});
			}
			if reference == child {
				return Ok(());
			}
		}
		if self.contains(child, parent) {
			return Err(LiveError::HierarchyRequest { parent, child });
		}

		if self.is_fragment(child) {
			let moved = std::mem::take(&mut self.slot_mut(child)?.children);
			for node in moved {
				self.slot_mut(node)?.parent = None;
				self.attach(parent, node, reference)?;
			}
			return Ok(());
		}

		self.detach(child)?;
		self.attach(parent, child, reference)
	}

	fn attach(
		&mut self,
		parent: NodeId,
		child: NodeId,
		reference: Option<NodeId>,
	) -> LiveResult<()> {
		let index = match reference {
			Some(reference) => self
				.children(parent)
				.iter()
				.position(|&c| c == reference)
				.ok_or(LiveError::NotAChild {
					parent,
					child: reference,
				})?,
			None => self.children(parent).len(),
		};
		self.slot_mut(parent)?.children.insert(index, child);
		self.slot_mut(child)?.parent = Some(parent);
		Ok(())
	}

	fn detach(&mut self, child: NodeId) -> LiveResult<Option<NodeId>> {
		let Some(parent) = self.parent(child) else {
			return Ok(None);
		};
		self.slot_mut(parent)?.children.retain(|&c| c != child);
		self.slot_mut(child)?.parent = None;
		Ok(Some(parent))
	}

	/// Removes a node from its parent. Removing a parentless node is a no-op.
	///
	/// When the node was attached to the document, its id is recorded as a
	/// removed subtree root (see [`Document::take_removed`]).
	pub fn remove(&mut self, node: NodeId) -> LiveResult<()> {
		self.slot(node)?;
		let was_attached = self.is_attached(node);
		if self.detach(node)?.is_some() && was_attached {
			self.removed.push(node);
		}
		Ok(())
	}

	/// Removes `child` from `parent`.
	pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> LiveResult<()> {
		if self.parent(child) != Some(parent) {
			return Err(LiveError::NotAChild { parent, child });
		}
		self.remove(child)
	}

	/// Drains the roots of subtrees removed from the document since the last
	/// call, in removal order and without duplicates.
	pub fn take_removed(&mut self) -> Vec<NodeId> {
		let mut removed = std::mem::take(&mut self.removed);
		let mut seen = std::collections::BTreeSet::new();
		removed.retain(|id| seen.insert(*id));
		removed
	}

	/// Returns true if removals are waiting to be drained.
	pub fn has_pending_removals(&self) -> bool {
		!self.removed.is_empty()
	}

	// ------------------------------------------------------------------
	// Content
	// ------------------------------------------------------------------

	/// Returns the value of a text or comment node.
	pub fn node_value(&self, id: NodeId) -> Option<&str> {
		match self.kind(id)? {
			NodeKind::Text(text) | NodeKind::Comment(text) => Some(text),
			_ => None,
		}
	}

	/// Sets the value of a text or comment node.
	pub fn set_node_value(&mut self, id: NodeId, value: &str) -> LiveResult<()> {
		match &mut self.slot_mut(id)?.kind {
			NodeKind::Text(text) | NodeKind::Comment(text) => {
				*text = value.to_string();
				Ok(())
			}
			_ => Err(LiveError::UnknownNode(id)),
		}
	}

	/// Concatenated text of all descendant text nodes.
	pub fn text_content(&self, id: NodeId) -> String {
		let mut out = String::new();
		self.collect_text(id, &mut out);
		out
	}

	fn collect_text(&self, id: NodeId, out: &mut String) {
		match self.kind(id) {
			Some(NodeKind::Text(text)) => out.push_str(text),
			Some(NodeKind::Comment(_)) | None => {}
			Some(_) => {
				for &child in self.children(id) {
					self.collect_text(child, out);
				}
			}
		}
	}

	/// Returns an attribute value.
	pub fn get_attribute(&self, id: NodeId, name: &str) -> Option<&str> {
		self.element(id)?
			.attributes
			.iter()
			.find(|(n, _)| n == name)
			.map(|(_, v)| v.as_str())
	}

	/// Returns true if the element carries the attribute.
	pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
		self.get_attribute(id, name).is_some()
	}

	/// Returns the attribute names in insertion order.
	pub fn attribute_names(&self, id: NodeId) -> Vec<&str> {
		self.element(id)
			.map(|el| el.attributes.iter().map(|(n, _)| n.as_str()).collect())
			.unwrap_or_default()
	}

	/// Sets (or overwrites) an attribute.
	pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> LiveResult<()> {
		let el = self.element_mut(id)?;
		match el.attributes.iter_mut().find(|(n, _)| n == name) {
			Some((_, existing)) => *existing = value.to_string(),
			None => el.attributes.push((name.to_string(), value.to_string())),
		}
		Ok(())
	}

	/// Removes an attribute, returning whether it was present.
	pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> LiveResult<bool> {
		let el = self.element_mut(id)?;
		let before = el.attributes.len();
		el.attributes.retain(|(n, _)| n != name);
		Ok(el.attributes.len() != before)
	}

	/// Returns a style property.
	pub fn style(&self, id: NodeId, property: &str) -> Option<&str> {
		self.element(id)?
			.style
			.iter()
			.find(|(p, _)| p == property)
			.map(|(_, v)| v.as_str())
	}

	/// Sets a style property.
	pub fn set_style(&mut self, id: NodeId, property: &str, value: &str) -> LiveResult<()> {
		let el = self.element_mut(id)?;
		match el.style.iter_mut().find(|(p, _)| p == property) {
			Some((_, existing)) => *existing = value.to_string(),
			None => el.style.push((property.to_string(), value.to_string())),
		}
		Ok(())
	}

	/// Removes every style property.
	pub fn clear_style(&mut self, id: NodeId) -> LiveResult<()> {
		self.element_mut(id)?.style.clear();
		Ok(())
	}

	/// Attaches an arbitrary marker to a node.
	///
	/// Markers survive relocation, which makes them handy for checking that a
	/// node kept its identity across an update.
	pub fn set_marker(&mut self, id: NodeId, key: &str, value: &str) -> LiveResult<()> {
		self.slot_mut(id)?
			.markers
			.insert(key.to_string(), value.to_string());
		Ok(())
	}

	/// Reads a marker.
	pub fn marker(&self, id: NodeId, key: &str) -> Option<&str> {
		self.get(id)?
			.markers
			.get(key)
			.map(String::as_str)
	}

	/// Descendant elements with the given tag, in document order.
	pub fn elements_by_tag_name(&self, root: NodeId, tag: &str) -> Vec<NodeId> {
		let tag = tag.to_ascii_lowercase();
		let mut found = Vec::new();
		let mut stack: Vec<NodeId> = self.children(root).iter().rev().copied().collect();
		while let Some(id) = stack.pop() {
			if self.tag_name(id) == Some(tag.as_str()) {
				found.push(id);
			}
			stack.extend(self.children(id).iter().rev().copied());
		}
		found
	}

	// ------------------------------------------------------------------
	// Serialization
	// ------------------------------------------------------------------

	/// Serializes the children of a node.
	pub fn inner_html(&self, id: NodeId) -> String {
		let mut out = String::new();
		for &child in self.children(id) {
			self.write_html(child, &mut out);
		}
		out
	}

	/// Serializes a node including itself.
	pub fn outer_html(&self, id: NodeId) -> String {
		let mut out = String::new();
		self.write_html(id, &mut out);
		out
	}

	fn write_html(&self, id: NodeId, out: &mut String) {
		match self.kind(id) {
			Some(NodeKind::Element(el)) => {
				out.push('<');
				out.push_str(&el.tag);
				for (name, value) in &el.attributes {
					out.push(' ');
					out.push_str(name);
					out.push_str("=\"");
					out.push_str(&escape_attr(value));
					out.push('"');
				}
				if !el.style.is_empty() && !el.attributes.iter().any(|(n, _)| n == "style") {
					let decls = el
						.style
						.iter()
						.map(|(p, v)| format!("{}: {};", p, v))
						.collect::<Vec<_>>()
						.join(" ");
					out.push_str(" style=\"");
					out.push_str(&escape_attr(&decls));
					out.push('"');
				}
				out.push('>');
				if is_void_element(&el.tag) {
					return;
				}
				for &child in self.children(id) {
					self.write_html(child, out);
				}
				out.push_str("</");
				out.push_str(&el.tag);
				out.push('>');
			}
			Some(NodeKind::Text(text)) => out.push_str(&escape_text(text)),
			Some(NodeKind::Comment(text)) => {
				out.push_str("<!--");
				out.push_str(text);
				out.push_str("-->");
			}
			Some(NodeKind::Document) | Some(NodeKind::Fragment) => {
				for &child in self.children(id) {
					self.write_html(child, out);
				}
			}
			None => {}
		}
	}
}

/// Escapes text content.
pub fn escape_text(s: &str) -> String {
	s.replace('&', "&amp;")
		.replace('<', "&lt;")
		.replace('>', "&gt;")
}

/// Escapes a string for use in an attribute value.
pub fn escape_attr(s: &str) -> String {
	s.replace('&', "&amp;")
		.replace('"', "&quot;")
		.replace('<', "&lt;")
		.replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::{fixture, rstest};

	#[fixture]
	fn doc() -> Document {
		Document::new()
	}

	#[rstest]
	fn test_body_is_attached(doc: Document) {
		assert!(doc.is_attached(doc.body()));
		assert_eq!(doc.parent(doc.body()), Some(doc.root()));
	}

	#[rstest]
	fn test_insert_before_orders_children(mut doc: Document) {
		let div = doc.create_element("div");
		let a = doc.create_text("a");
		let b = doc.create_text("b");
		let c = doc.create_text("c");
		doc.append_child(div, a).unwrap();
		doc.append_child(div, c).unwrap();
		doc.insert_before(div, b, Some(c)).unwrap();

		assert_eq!(doc.children(div), &[a, b, c]);
		assert_eq!(doc.next_sibling(a), Some(b));
		assert_eq!(doc.previous_sibling(c), Some(b));
		assert_eq!(doc.text_content(div), "abc");
	}

	#[rstest]
	fn test_fragment_insertion_moves_children(mut doc: Document) {
		let div = doc.create_element("div");
		let frag = doc.create_fragment();
		let a = doc.create_text("a");
		let b = doc.create_text("b");
		doc.append_child(frag, a).unwrap();
		doc.append_child(frag, b).unwrap();

		doc.append_child(div, frag).unwrap();

		assert_eq!(doc.children(div), &[a, b]);
		assert!(doc.children(frag).is_empty());
		assert_eq!(doc.parent(a), Some(div));
	}

	#[rstest]
	fn test_relocation_is_not_recorded_as_removal(mut doc: Document) {
		let body = doc.body();
		let first = doc.create_element("p");
		let second = doc.create_element("p");
		doc.append_child(body, first).unwrap();
		doc.append_child(body, second).unwrap();

		doc.insert_before(body, second, Some(first)).unwrap();

		assert_eq!(doc.children(body), &[second, first]);
		assert!(doc.take_removed().is_empty());
	}

	#[rstest]
	fn test_removal_from_attached_tree_is_recorded(mut doc: Document) {
		let body = doc.body();
		let div = doc.create_element("div");
		let detached = doc.create_element("div");
		let child = doc.create_element("span");
		doc.append_child(body, div).unwrap();
		doc.append_child(detached, child).unwrap();

		doc.remove(child).unwrap();
		doc.remove_child(body, div).unwrap();

		assert_eq!(doc.take_removed(), vec![div]);
		assert!(!doc.is_attached(div));
		assert!(!doc.has_pending_removals());
	}

	#[rstest]
	fn test_hierarchy_request_is_rejected(mut doc: Document) {
		let outer = doc.create_element("div");
		let inner = doc.create_element("div");
		doc.append_child(outer, inner).unwrap();

		let err = doc.append_child(inner, outer).unwrap_err();
		assert!(matches!(err, LiveError::HierarchyRequest { .. }));
	}

	#[rstest]
	fn test_reference_must_be_child(mut doc: Document) {
		let div = doc.create_element("div");
		let stray = doc.create_text("x");
		let node = doc.create_text("y");

		let err = doc.insert_before(div, node, Some(stray)).unwrap_err();
		assert!(matches!(err, LiveError::NotAChild { .. }));
	}

	#[rstest]
	fn test_attributes_and_style(mut doc: Document) {
		let div = doc.create_element("DIV");
		doc.set_attribute(div, "class", "a").unwrap();
		doc.set_attribute(div, "id", "x").unwrap();
		doc.set_attribute(div, "class", "b").unwrap();
		doc.set_style(div, "width", "50px").unwrap();

		assert_eq!(doc.tag_name(div), Some("div"));
		assert_eq!(doc.get_attribute(div, "class"), Some("b"));
		assert_eq!(doc.attribute_names(div), vec!["class", "id"]);
		assert_eq!(doc.style(div, "width"), Some("50px"));
		assert!(doc.remove_attribute(div, "id").unwrap());
		assert!(!doc.remove_attribute(div, "id").unwrap());
		assert_eq!(
			doc.outer_html(div),
			"<div class=\"b\" style=\"width: 50px;\"></div>"
		);
	}

	#[rstest]
	fn test_attribute_on_text_node_fails(mut doc: Document) {
		let text = doc.create_text("t");
		let err = doc.set_attribute(text, "class", "a").unwrap_err();
		assert!(matches!(err, LiveError::NotAnElement(_)));
	}

	#[rstest]
	fn test_serialization_escapes(mut doc: Document) {
		let div = doc.create_element("div");
		let br = doc.create_element("br");
		let text = doc.create_text("<b> & \"q\"");
		let comment = doc.create_comment("note");
		doc.append_child(div, text).unwrap();
		doc.append_child(div, br).unwrap();
		doc.append_child(div, comment).unwrap();
		doc.set_attribute(div, "title", "a\"b").unwrap();

		assert_eq!(doc.inner_html(div), "&lt;b&gt; &amp; \"q\"<br><!--note-->");
		assert!(doc.outer_html(div).starts_with("<div title=\"a&quot;b\">"));
	}

	#[rstest]
	fn test_elements_by_tag_name_document_order(mut doc: Document) {
		let root = doc.create_element("div");
		let outer = doc.create_element("span");
		let inner = doc.create_element("span");
		let label = doc.create_element("label");
		doc.append_child(root, outer).unwrap();
		doc.append_child(outer, inner).unwrap();
		doc.append_child(root, label).unwrap();

		assert_eq!(doc.elements_by_tag_name(root, "span"), vec![outer, inner]);
		assert_eq!(doc.elements_by_tag_name(root, "LABEL"), vec![label]);
	}

	#[rstest]
	fn test_free_reclaims_subtree_and_reuses_slots(mut doc: Document) {
		let div = doc.create_element("div");
		let span = doc.create_element("span");
		doc.append_child(div, span).unwrap();
		doc.set_marker(span, "seen", "yes").unwrap();
		let slots = doc.slot_count();

		assert_eq!(doc.free(div), 2);
		assert!(!doc.has_node(div));
		assert!(!doc.has_node(span));
		assert_eq!(doc.marker(span, "seen"), None);

		let a = doc.create_text("a");
		let b = doc.create_text("b");
		assert_eq!(doc.slot_count(), slots);
		assert!(a != div && a != span && b != div && b != span);
		assert!(doc.set_attribute(span, "class", "x").is_err());
		assert_eq!(doc.node_count(), 4);
	}

	#[rstest]
	fn test_free_skips_attached_and_builtin_nodes(mut doc: Document) {
		let body = doc.body();
		let div = doc.create_element("div");
		doc.append_child(body, div).unwrap();

		assert_eq!(doc.free(div), 0);
		assert_eq!(doc.free(body), 0);
		assert_eq!(doc.free(doc.root()), 0);
		assert!(doc.has_node(div));
	}

	#[rstest]
	fn test_markers_survive_relocation(mut doc: Document) {
		let body = doc.body();
		let a = doc.create_element("i");
		let b = doc.create_element("b");
		doc.append_child(body, a).unwrap();
		doc.append_child(body, b).unwrap();
		doc.set_marker(a, "expando", "kept").unwrap();

		doc.append_child(body, a).unwrap();

		assert_eq!(doc.children(body), &[b, a]);
		assert_eq!(doc.marker(a, "expando"), Some("kept"));
	}
}

//! Declarative views mounted into a [`Document`].

use std::borrow::Cow;

use crate::dom::document::{Document, NodeId, escape_attr, escape_text};

/// Returns true for elements that never have children or a closing tag.
pub fn is_void_element(tag: &str) -> bool {
	matches!(
		tag,
		"area"
			| "base" | "br"
			| "col" | "embed"
			| "hr" | "img"
			| "input" | "link"
			| "meta" | "source"
			| "track" | "wbr"
	)
}

/// A unified representation of renderable content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
	/// An element.
	Element(ElementView),
	/// A text node.
	Text(Cow<'static, str>),
	/// A comment node.
	Comment(Cow<'static, str>),
	/// Several views without a wrapper element.
	Fragment(Vec<View>),
	/// Nothing.
	Empty,
}

/// An element in the view tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementView {
	tag: Cow<'static, str>,
	attrs: Vec<(Cow<'static, str>, Cow<'static, str>)>,
	children: Vec<View>,
	is_void: bool,
}

impl ElementView {
	/// Creates a new element view.
	pub fn new(tag: impl Into<Cow<'static, str>>) -> Self {
		let tag = tag.into();
		let is_void = is_void_element(&tag);
		Self {
			tag,
			attrs: Vec::new(),
			children: Vec::new(),
			is_void,
		}
	}

	/// Adds an attribute.
	pub fn attr(
		mut self,
		name: impl Into<Cow<'static, str>>,
		value: impl Into<Cow<'static, str>>,
	) -> Self {
		self.attrs.push((name.into(), value.into()));
		self
	}

	/// Adds a child view. Children of void elements are dropped on mount.
	pub fn child(mut self, child: impl IntoView) -> Self {
		self.children.push(child.into_view());
		self
	}

	/// Adds multiple child views.
	pub fn children(mut self, children: impl IntoIterator<Item = impl IntoView>) -> Self {
		self.children
			.extend(children.into_iter().map(|c| c.into_view()));
		self
	}

	/// Returns the tag name.
	pub fn tag_name(&self) -> &str {
		&self.tag
	}

	/// Returns the attributes.
	pub fn attrs(&self) -> &[(Cow<'static, str>, Cow<'static, str>)] {
		&self.attrs
	}

	/// Returns the child views.
	pub fn child_views(&self) -> &[View] {
		&self.children
	}

	/// Returns whether this is a void element.
	pub fn is_void(&self) -> bool {
		self.is_void
	}
}

impl View {
	/// Creates an element view.
	pub fn element(tag: impl Into<Cow<'static, str>>) -> ElementView {
		ElementView::new(tag)
	}

	/// Creates a text view.
	pub fn text(content: impl Into<Cow<'static, str>>) -> Self {
		Self::Text(content.into())
	}

	/// Creates a comment view.
	pub fn comment(content: impl Into<Cow<'static, str>>) -> Self {
		Self::Comment(content.into())
	}

	/// Creates a fragment view.
	pub fn fragment(children: impl IntoIterator<Item = impl IntoView>) -> Self {
		Self::Fragment(children.into_iter().map(|c| c.into_view()).collect())
	}

	/// Creates an empty view.
	pub fn empty() -> Self {
		Self::Empty
	}

	/// Renders the view to markup, escaped the same way as
	/// [`Document::inner_html`].
	pub fn render_to_string(&self) -> String {
		let mut output = String::new();
		self.render_to_string_inner(&mut output);
		output
	}

	fn render_to_string_inner(&self, output: &mut String) {
		match self {
			View::Element(el) => {
				output.push('<');
				output.push_str(el.tag_name());
				for (name, value) in el.attrs() {
					output.push(' ');
					output.push_str(name);
					output.push_str("=\"");
					output.push_str(&escape_attr(value));
					output.push('"');
				}
				output.push('>');
				if el.is_void() {
					return;
				}
				for child in el.child_views() {
					child.render_to_string_inner(output);
				}
				output.push_str("</");
				output.push_str(el.tag_name());
				output.push('>');
			}
			View::Text(text) => output.push_str(&escape_text(text)),
			View::Comment(text) => {
				output.push_str("<!--");
				output.push_str(text);
				output.push_str("-->");
			}
			View::Fragment(children) => {
				for child in children {
					child.render_to_string_inner(output);
				}
			}
			View::Empty => {}
		}
	}

	/// Creates the view's nodes in `doc`, detached, and returns the
	/// top-level ones in order.
	pub fn mount(&self, doc: &mut Document) -> Vec<NodeId> {
		let mut roots = Vec::new();
		self.mount_inner(doc, &mut roots);
		roots
	}

	fn mount_inner(&self, doc: &mut Document, out: &mut Vec<NodeId>) {
		match self {
			View::Element(el) => {
				let element = doc.create_element(el.tag_name());
				for (name, value) in el.attrs() {
					// A freshly created element always accepts attributes.
					let _ = doc.set_attribute(element, name, value);
				}
				if !el.is_void() {
					let mut children = Vec::new();
					for child in el.child_views() {
						child.mount_inner(doc, &mut children);
					}
					for child in children {
						let _ = doc.append_child(element, child);
					}
				}
				out.push(element);
			}
			View::Text(text) => out.push(doc.create_text(text)),
			View::Comment(text) => out.push(doc.create_comment(text)),
			View::Fragment(children) => {
				for child in children {
					child.mount_inner(doc, out);
				}
			}
			View::Empty => {}
		}
	}
}

impl Document {
	/// Mounts a view, returning its detached top-level nodes.
	pub fn mount(&mut self, view: &View) -> Vec<NodeId> {
		view.mount(self)
	}
}

/// Types that can be converted into a [`View`].
pub trait IntoView {
	/// Converts self into a View.
	fn into_view(self) -> View;
}

impl IntoView for View {
	fn into_view(self) -> View {
		self
	}
}

impl IntoView for ElementView {
	fn into_view(self) -> View {
		View::Element(self)
	}
}

impl IntoView for String {
	fn into_view(self) -> View {
		View::Text(Cow::Owned(self))
	}
}

impl IntoView for &'static str {
	fn into_view(self) -> View {
		View::Text(Cow::Borrowed(self))
	}
}

impl<T: IntoView> IntoView for Option<T> {
	fn into_view(self) -> View {
		match self {
			Some(v) => v.into_view(),
			None => View::Empty,
		}
	}
}

impl<T: IntoView> IntoView for Vec<T> {
	fn into_view(self) -> View {
		View::Fragment(self.into_iter().map(|v| v.into_view()).collect())
	}
}

impl IntoView for () {
	fn into_view(self) -> View {
		View::Empty
	}
}

impl<A: IntoView, B: IntoView> IntoView for (A, B) {
	fn into_view(self) -> View {
		View::Fragment(vec![self.0.into_view(), self.1.into_view()])
	}
}

impl<A: IntoView, B: IntoView, C: IntoView> IntoView for (A, B, C) {
	fn into_view(self) -> View {
		View::Fragment(vec![
			self.0.into_view(),
			self.1.into_view(),
			self.2.into_view(),
		])
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_void_element_detection() {
		assert!(ElementView::new("br").is_void());
		assert!(ElementView::new("input").is_void());
		assert!(!ElementView::new("span").is_void());
	}

	#[test]
	fn test_render_element_with_children() {
		let view = ElementView::new("div")
			.attr("class", "box")
			.child("Hello, ")
			.child(ElementView::new("strong").child("World"))
			.into_view();
		assert_eq!(
			view.render_to_string(),
			"<div class=\"box\">Hello, <strong>World</strong></div>"
		);
	}

	#[test]
	fn test_render_text_with_escaping() {
		assert_eq!(View::text("<b>&").render_to_string(), "&lt;b&gt;&amp;");
	}

	#[test]
	fn test_mount_matches_render() {
		let mut doc = Document::new();
		let view = View::fragment(vec![
			ElementView::new("label").child("one").into_view(),
			View::comment("sep"),
			ElementView::new("br").child("ignored").into_view(),
			View::text("tail"),
		]);

		let nodes = view.mount(&mut doc);
		let host = doc.create_element("div");
		for node in &nodes {
			doc.append_child(host, *node).unwrap();
		}

		assert_eq!(nodes.len(), 4);
		assert!(nodes.iter().all(|n| !doc.is_attached(*n)));
		assert_eq!(doc.inner_html(host), "<label>one</label><!--sep--><br>tail");
		assert_eq!(view.render_to_string(), "<label>one</label><!--sep--><br>tail");
	}

	#[test]
	fn test_into_view_conversions() {
		assert_eq!(None::<String>.into_view(), View::Empty);
		assert_eq!(vec!["A", "B"].into_view().render_to_string(), "AB");
		assert_eq!(("a", "b", "c").into_view().render_to_string(), "abc");
		assert_eq!(().into_view(), View::Empty);
	}
}

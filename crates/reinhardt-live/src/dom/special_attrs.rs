//! Attribute assignment with per-name special cases.
//!
//! Most attributes are written verbatim. Names registered in [`AttrSetters`]
//! are routed to a dedicated setter instead; the default table maps `style`
//! to a setter that splits the declaration list into individual style
//! properties. Boolean attributes are removed when their value is falsy.

use std::collections::HashMap;
use std::fmt;

use crate::dom::document::{Document, NodeId};
use crate::error::LiveResult;

/// Setter for a special attribute. `None` means the attribute is removed.
pub type AttrSetter = fn(&mut Document, NodeId, Option<&str>) -> LiveResult<()>;

/// Lookup table of attribute name to setter.
#[derive(Clone)]
pub struct AttrSetters {
	setters: HashMap<String, AttrSetter>,
}

impl fmt::Debug for AttrSetters {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut names: Vec<&str> = self.setters.keys().map(String::as_str).collect();
		names.sort_unstable();
		f.debug_struct("AttrSetters").field("names", &names).finish()
	}
}

impl Default for AttrSetters {
	fn default() -> Self {
		let mut setters = Self::empty();
		setters.register("style", set_style);
		setters
	}
}

impl AttrSetters {
	/// A table without special cases.
	pub fn empty() -> Self {
		Self {
			setters: HashMap::new(),
		}
	}

	/// Registers (or replaces) the setter for `name`.
	pub fn register(&mut self, name: &str, setter: AttrSetter) {
		self.setters.insert(name.to_ascii_lowercase(), setter);
	}

	/// Returns true if `name` has a dedicated setter.
	pub fn is_special(&self, name: &str) -> bool {
		self.setters.contains_key(&name.to_ascii_lowercase())
	}

	/// Assigns an attribute, or removes it when `value` is `None`.
	pub fn apply(
		&self,
		doc: &mut Document,
		element: NodeId,
		name: &str,
		value: Option<&str>,
	) -> LiveResult<()> {
		if let Some(setter) = self.setters.get(&name.to_ascii_lowercase()) {
			return setter(doc, element, value);
		}
		match value {
			Some(value) if !is_boolean_attr(name) || is_boolean_attr_truthy(value) => {
				doc.set_attribute(element, name, value)
			}
			_ => doc.remove_attribute(element, name).map(|_| ()),
		}
	}

	/// Like [`AttrSetters::apply`], but writes boolean attributes verbatim:
	/// any `Some` value makes them present.
	pub fn apply_verbatim(
		&self,
		doc: &mut Document,
		element: NodeId,
		name: &str,
		value: Option<&str>,
	) -> LiveResult<()> {
		if let Some(setter) = self.setters.get(&name.to_ascii_lowercase()) {
			return setter(doc, element, value);
		}
		match value {
			Some(value) => doc.set_attribute(element, name, value),
			None => doc.remove_attribute(element, name).map(|_| ()),
		}
	}
}

/// Parses `prop: value; prop: value` declarations. Declarations may be
/// separated by newlines as well as semicolons.
pub fn parse_style_declarations(source: &str) -> Vec<(String, String)> {
	source
		.split([';', '\n'])
		.filter_map(|decl| {
			let (prop, value) = decl.split_once(':')?;
			let prop = prop.trim();
			let value = value.trim();
			(!prop.is_empty() && !value.is_empty())
				.then(|| (prop.to_ascii_lowercase(), value.to_string()))
		})
		.collect()
}

fn set_style(doc: &mut Document, element: NodeId, value: Option<&str>) -> LiveResult<()> {
	doc.clear_style(element)?;
	for (prop, value) in parse_style_declarations(value.unwrap_or_default()) {
		doc.set_style(element, &prop, &value)?;
	}
	Ok(())
}

/// Returns true for attributes whose presence alone carries the meaning.
pub fn is_boolean_attr(name: &str) -> bool {
	const BOOLEAN_ATTRS: &[&str] = &[
		"allowfullscreen",
		"async",
		"autofocus",
		"autoplay",
		"checked",
		"controls",
		"default",
		"defer",
		"disabled",
		"formnovalidate",
		"hidden",
		"inert",
		"ismap",
		"itemscope",
		"loop",
		"multiple",
		"muted",
		"nomodule",
		"novalidate",
		"open",
		"playsinline",
		"readonly",
		"required",
		"reversed",
		"selected",
		"truespeed",
	];
	BOOLEAN_ATTRS.contains(&name)
}

/// Checks if a boolean attribute value is truthy.
pub fn is_boolean_attr_truthy(value: &str) -> bool {
	!value.is_empty() && value != "false" && value != "0"
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("width: 50px;\nheight:20px", vec![("width", "50px"), ("height", "20px")])]
	#[case("color: red", vec![("color", "red")])]
	#[case(" ; broken; ", vec![])]
	#[case("COLOR : Blue ;", vec![("color", "Blue")])]
	fn test_parse_style_declarations(#[case] source: &str, #[case] expected: Vec<(&str, &str)>) {
		let parsed = parse_style_declarations(source);
		let parsed: Vec<(&str, &str)> = parsed
			.iter()
			.map(|(p, v)| (p.as_str(), v.as_str()))
			.collect();
		assert_eq!(parsed, expected);
	}

	#[rstest]
	fn test_style_setter_replaces_properties() {
		let mut doc = Document::new();
		let div = doc.create_element("div");
		let setters = AttrSetters::default();

		setters
			.apply(&mut doc, div, "style", Some("width: 50px;\nheight: 20px"))
			.unwrap();
		setters
			.apply(&mut doc, div, "style", Some("width: 10px"))
			.unwrap();

		assert_eq!(doc.style(div, "width"), Some("10px"));
		assert_eq!(doc.style(div, "height"), None);
		assert!(!doc.has_attribute(div, "style"));
	}

	#[rstest]
	#[case("true", true)]
	#[case("selected", true)]
	#[case("", false)]
	#[case("false", false)]
	#[case("0", false)]
	fn test_boolean_attribute_presence(#[case] value: &str, #[case] present: bool) {
		let mut doc = Document::new();
		let option = doc.create_element("option");
		let setters = AttrSetters::default();

		setters
			.apply(&mut doc, option, "selected", Some(value))
			.unwrap();

		assert_eq!(doc.has_attribute(option, "selected"), present);
	}

	#[rstest]
	fn test_plain_attribute_set_and_remove() {
		let mut doc = Document::new();
		let div = doc.create_element("div");
		let setters = AttrSetters::empty();

		setters.apply(&mut doc, div, "title", Some("")).unwrap();
		assert_eq!(doc.get_attribute(div, "title"), Some(""));
		setters.apply(&mut doc, div, "title", None).unwrap();
		assert!(!doc.has_attribute(div, "title"));
		assert!(!setters.is_special("style"));
	}

	#[rstest]
	fn test_custom_setter_is_used() {
		fn upper(doc: &mut Document, el: NodeId, value: Option<&str>) -> LiveResult<()> {
			doc.set_attribute(el, "data-upper", &value.unwrap_or_default().to_uppercase())
		}
		let mut doc = Document::new();
		let div = doc.create_element("div");
		let mut setters = AttrSetters::default();
		setters.register("Shout", upper);

		setters.apply(&mut doc, div, "shout", Some("hey")).unwrap();

		assert!(setters.is_special("SHOUT"));
		assert_eq!(doc.get_attribute(div, "data-upper"), Some("HEY"));
	}
}

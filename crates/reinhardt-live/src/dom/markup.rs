//! Markup to views.
//!
//! Fragments are parsed with `scraper` (html5ever) in a `<body>` context, so
//! markup is handled the way a browser's `innerHTML` would handle it: implied
//! end tags are closed, stray closing tags are dropped and entities are
//! decoded. Parsing never fails; malformed input yields whatever the HTML
//! parsing algorithm recovers.

use scraper::{ElementRef, Html, Node};

use crate::dom::view::{ElementView, View};

/// Parses a markup fragment into top-level views.
///
/// # Examples
///
/// ```
/// use reinhardt_live::dom::{View, parse_fragment};
///
/// let views = parse_fragment("<b>one</b> &amp; two");
/// assert_eq!(View::Fragment(views).render_to_string(), "<b>one</b> &amp; two");
/// ```
pub fn parse_fragment(source: &str) -> Vec<View> {
	if source.is_empty() {
		return Vec::new();
	}
	let html = Html::parse_fragment(source);
	// html5ever hangs fragment content under a synthetic <html> root.
	child_views(html.root_element())
}

fn child_views(parent: ElementRef<'_>) -> Vec<View> {
	parent
		.children()
		.filter_map(|child| match child.value() {
			Node::Text(text) => Some(View::text(String::from(&**text))),
			Node::Comment(comment) => Some(View::comment(String::from(&**comment))),
			Node::Element(_) => ElementRef::wrap(child).map(element_view),
			_ => None,
		})
		.collect()
}

fn element_view(element: ElementRef<'_>) -> View {
	let data = element.value();
	let mut view = ElementView::new(data.name().to_string());
	for (name, value) in data.attrs() {
		view = view.attr(name.to_string(), value.to_string());
	}
	View::Element(view.children(child_views(element)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn round_trip(source: &str) -> String {
		View::Fragment(parse_fragment(source)).render_to_string()
	}

	#[rstest]
	#[case("", "")]
	#[case("plain text", "plain text")]
	#[case("<p>Hello</p><p>World</p>", "<p>Hello</p><p>World</p>")]
	#[case("<DIV Class=a>x</DIV>", "<div class=\"a\">x</div>")]
	#[case("<input type='checkbox' checked>", "<input type=\"checkbox\" checked=\"\">")]
	#[case("<br>after", "<br>after")]
	#[case("<!-- note --><b>x</b>", "<!-- note --><b>x</b>")]
	#[case("<ul><li>a<li>b</ul>", "<ul><li>a</li><li>b</li></ul>")]
	#[case("<p>open", "<p>open</p>")]
	#[case("1 < 2", "1 &lt; 2")]
	fn test_parse_round_trip(#[case] source: &str, #[case] expected: &str) {
		assert_eq!(round_trip(source), expected);
	}

	#[rstest]
	fn test_entities_are_decoded() {
		let views = parse_fragment("&lt;x&gt; &amp; &quot;q&quot; &#65;&#x42;");
		assert_eq!(views, vec![View::text("<x> & \"q\" AB")]);
	}

	#[rstest]
	fn test_attribute_value_with_newline() {
		let views = parse_fragment("<div style=\"width: 50px;\nheight: 20px\"></div>");
		let View::Element(el) = &views[0] else {
			panic!("expected element");
		};
		assert_eq!(el.attrs()[0].1, "width: 50px;\nheight: 20px");
	}

	#[rstest]
	fn test_stray_closing_tag_is_dropped() {
		let views = parse_fragment("<b>x</b></i>y");
		assert_eq!(
			View::Fragment(views).render_to_string(),
			"<b>x</b>y"
		);
	}

	#[rstest]
	fn test_unterminated_tag_is_dropped() {
		assert!(parse_fragment("<div class=\"open").is_empty());
	}
}

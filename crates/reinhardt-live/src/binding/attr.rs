//! Attribute binders.
//!
//! Attribute bindings own no node range. Instead they install a removal
//! watcher on their element; when the element leaves the document for good,
//! the watcher releases the source subscription and disposes of itself.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::dom::NodeId;
use crate::error::{LiveError, LiveResult};
use crate::live::{Live, WeakLive};
use crate::reactive::{Observable, Subscription};
use crate::teardown::WatchId;

static ATTR_PAIR_RE: Lazy<Regex> = Lazy::new(|| {
	Regex::new(r#"([^\s=/>"']+)(?:\s*=\s*(?:'([^']*)'|"([^"]*)"|([^\s'">]+)))?"#)
		.expect("attribute pair pattern is valid")
});

/// Parses `name='value'` pairs. Bare names get an empty value; later
/// duplicates win.
///
/// ```
/// use reinhardt_live::binding::parse_attr_set;
///
/// assert_eq!(
/// 	parse_attr_set("class='a b' hidden data-x=\"1\""),
/// 	vec![
/// 		("class".to_string(), "a b".to_string()),
/// 		("hidden".to_string(), String::new()),
/// 		("data-x".to_string(), "1".to_string()),
/// 	]
/// );
/// ```
pub fn parse_attr_set(source: &str) -> Vec<(String, String)> {
	let mut attrs: Vec<(String, String)> = Vec::new();
	for caps in ATTR_PAIR_RE.captures_iter(source) {
		let name = caps[1].to_ascii_lowercase();
		let value = caps
			.get(2)
			.or_else(|| caps.get(3))
			.or_else(|| caps.get(4))
			.map(|m| m.as_str().to_string())
			.unwrap_or_default();
		match attrs.iter_mut().find(|(n, _)| *n == name) {
			Some((_, existing)) => *existing = value,
			None => attrs.push((name, value)),
		}
	}
	attrs
}

/// A queued update only applies while its binding is still live.
fn still_bound(state: &Weak<AttrState>) -> bool {
	state.upgrade().is_some_and(|state| state.is_bound())
}

#[derive(Default)]
struct AttrState {
	subscription: RefCell<Option<Subscription>>,
	source: RefCell<Option<Box<dyn Any>>>,
	watch: Cell<Option<WatchId>>,
}

impl AttrState {
	fn is_bound(&self) -> bool {
		self.subscription.borrow().is_some()
	}

	/// Releases the subscription and the watcher. Returns false if the
	/// binding was already released.
	fn release(&self, live: Option<&Live>) -> bool {
		let subscription = self.subscription.borrow_mut().take();
		let Some(subscription) = subscription else {
			return false;
		};
		subscription.unsubscribe();
		self.source.borrow_mut().take();
		if let (Some(live), Some(watch)) = (live, self.watch.take()) {
			live.detector_mut().dispose(watch);
		}
		true
	}
}

/// Handle to an attribute binding.
///
/// Dropping the handle keeps the binding alive; it ends when the element is
/// removed from the document or [`AttrBinding::unbind`] is called.
pub struct AttrBinding {
	live: WeakLive,
	element: NodeId,
	state: Weak<AttrState>,
}

impl AttrBinding {
	/// The bound element.
	pub fn element(&self) -> NodeId {
		self.element
	}

	/// Returns true while the binding follows its source.
	pub fn is_bound(&self) -> bool {
		self.state.upgrade().is_some_and(|state| state.is_bound())
	}

	/// Stops following the source and drops the removal watcher. Returns
	/// false if the binding had already ended.
	pub fn unbind(&self) -> bool {
		let Some(state) = self.state.upgrade() else {
			return false;
		};
		state.release(self.live.upgrade().as_ref())
	}
}

impl fmt::Debug for AttrBinding {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AttrBinding")
			.field("element", &self.element)
			.field("bound", &self.is_bound())
			.finish()
	}
}

impl Live {
	/// Binds attribute `name` of `element` to the source's value.
	///
	/// Values are converted with `ToString`. Boolean attributes such as
	/// `selected` are removed while the value is `""`, `"false"` or `"0"`.
	/// Names with a registered setter (by default `style`) go through it.
	pub fn attr<T, S>(&self, element: NodeId, name: &str, source: S) -> LiveResult<AttrBinding>
	where
		T: ToString + 'static,
		S: Observable<T> + 'static,
	{
		self.check_element(element)?;
		let name = name.to_string();
		self.apply_attr(element, &name, &source.get().to_string())?;

		let weak = self.downgrade();
		self.bind_attributes(element, source, move |value: &T, state: &Weak<AttrState>| {
			let value = value.to_string();
			let name = name.clone();
			let Some(live) = weak.upgrade() else {
				return;
			};
			let task_live = live.downgrade();
			let state = state.clone();
			live.queue().enqueue("live.attr set", move || {
				let Some(live) = task_live.upgrade() else {
					return;
				};
				if !still_bound(&state) {
					tracing::trace!(element = ?element, attr = %name, "dropped update for released attribute binding");
					return;
				}
				if let Err(err) = live.apply_attr(element, &name, &value) {
					tracing::warn!(element = ?element, attr = %name, error = %err, "attribute update failed");
				}
			});
		})
	}

	/// Binds a set of attributes of `element` to a source of `name='value'`
	/// strings.
	///
	/// Each change removes the attributes that disappeared from the string
	/// and sets the rest. A bare name sets the attribute with an empty value.
	pub fn attrs<T, S>(&self, element: NodeId, source: S) -> LiveResult<AttrBinding>
	where
		T: ToString + 'static,
		S: Observable<T> + 'static,
	{
		self.check_element(element)?;
		let initial = parse_attr_set(&source.get().to_string());
		self.apply_attr_set(element, &[], &initial)?;
		let applied = Rc::new(RefCell::new(initial));

		let weak = self.downgrade();
		self.bind_attributes(element, source, move |value: &T, state: &Weak<AttrState>| {
			let next = parse_attr_set(&value.to_string());
			let Some(live) = weak.upgrade() else {
				return;
			};
			let task_live = live.downgrade();
			let applied = applied.clone();
			let state = state.clone();
			live.queue().enqueue("live.attrs set", move || {
				let Some(live) = task_live.upgrade() else {
					return;
				};
				if !still_bound(&state) {
					tracing::trace!(element = ?element, "dropped update for released attribute set binding");
					return;
				}
				let previous = applied.replace(next.clone());
				if let Err(err) = live.apply_attr_set(element, &previous, &next) {
					tracing::warn!(element = ?element, error = %err, "attribute set update failed");
				}
			});
		})
	}

	fn check_element(&self, element: NodeId) -> LiveResult<()> {
		let doc = self.document();
		if !doc.has_node(element) {
			return Err(LiveError::UnknownNode(element));
		}
		if doc.tag_name(element).is_none() {
			return Err(LiveError::NotAnElement(element));
		}
		Ok(())
	}

	fn apply_attr(&self, element: NodeId, name: &str, value: &str) -> LiveResult<()> {
		let setters = self.attr_setters();
		setters.apply(&mut self.document_mut(), element, name, Some(value))
	}

	fn apply_attr_set(
		&self,
		element: NodeId,
		previous: &[(String, String)],
		next: &[(String, String)],
	) -> LiveResult<()> {
		let setters = self.attr_setters();
		let mut doc = self.document_mut();
		for (name, _) in previous {
			if !next.iter().any(|(n, _)| n == name) {
				setters.apply_verbatim(&mut doc, element, name, None)?;
			}
		}
		for (name, value) in next {
			let unchanged = previous.iter().any(|(n, v)| n == name && v == value);
			if !unchanged {
				setters.apply_verbatim(&mut doc, element, name, Some(value))?;
			}
		}
		Ok(())
	}

	/// Subscribes `on_change` and installs the removal watcher shared by both
	/// attribute binders.
	fn bind_attributes<T, S>(
		&self,
		element: NodeId,
		source: S,
		on_change: impl Fn(&T, &Weak<AttrState>) + 'static,
	) -> LiveResult<AttrBinding>
	where
		T: 'static,
		S: Observable<T> + 'static,
	{
		let state = Rc::new(AttrState::default());
		let listener_state = Rc::downgrade(&state);
		let subscription = source.subscribe(Rc::new(move |value: &T| on_change(value, &listener_state)));
		*state.subscription.borrow_mut() = Some(subscription);
		*state.source.borrow_mut() = Some(Box::new(source));

		let weak = self.downgrade();
		let watcher_state = state.clone();
		let watch = self.detector_mut().watch(
			element,
			Box::new(move || {
				let live = weak.upgrade();
				if watcher_state.release(live.as_ref()) {
					tracing::trace!(element = ?element, "attribute binding torn down");
				}
			}),
		);
		state.watch.set(Some(watch));

		Ok(AttrBinding {
			live: self.downgrade(),
			element,
			state: Rc::downgrade(&state),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::reactive::{Computed, Signal};
	use rstest::{fixture, rstest};

	struct Host {
		live: Live,
		div: NodeId,
	}

	#[fixture]
	fn host() -> Host {
		let live = Live::new();
		let div = {
			let mut doc = live.document_mut();
			let div = doc.create_element("div");
			let body = doc.body();
			doc.append_child(body, div).unwrap();
			div
		};
		Host { live, div }
	}

	#[rstest]
	#[case("class='foo'", vec![("class", "foo")])]
	#[case("a=1 b = \"two words\"", vec![("a", "1"), ("b", "two words")])]
	#[case("selected", vec![("selected", "")])]
	#[case("x='1' X='2'", vec![("x", "2")])]
	#[case("", vec![])]
	fn test_parse_attr_set(#[case] source: &str, #[case] expected: Vec<(&str, &str)>) {
		let parsed = parse_attr_set(source);
		let parsed: Vec<(&str, &str)> = parsed.iter().map(|(n, v)| (n.as_str(), v.as_str())).collect();
		assert_eq!(parsed, expected);
	}

	#[rstest]
	fn test_attr_composes_class(host: Host) {
		let selected = Signal::new(false);
		let active = Signal::new(false);
		let class_name = Computed::new({
			let (selected, active) = (selected.clone(), active.clone());
			move || {
				format!(
					"foo {} {} end",
					if selected.get() { "selected" } else { "" },
					if active.get() { "active" } else { "" }
				)
			}
		})
		.track(&selected)
		.track(&active);

		host.live.attr(host.div, "class", class_name).unwrap();
		let class = |host: &Host| host.live.document().get_attribute(host.div, "class").map(str::to_string);

		assert_eq!(class(&host).as_deref(), Some("foo   end"));
		selected.set(true);
		assert_eq!(class(&host).as_deref(), Some("foo selected  end"));
		active.set(true);
		assert_eq!(class(&host).as_deref(), Some("foo selected active end"));
		selected.set(false);
		assert_eq!(class(&host).as_deref(), Some("foo  active end"));
	}

	#[rstest]
	fn test_attr_style_with_newline(host: Host) {
		let style = Signal::new("width: 50px;\nheight:50px;".to_string());
		host.live.attr(host.div, "style", style).unwrap();

		let doc = host.live.document();
		assert_eq!(doc.style(host.div, "width"), Some("50px"));
		assert_eq!(doc.style(host.div, "height"), Some("50px"));
	}

	#[rstest]
	fn test_attr_non_string_value(host: Host) {
		host.live
			.document_mut()
			.set_attribute(host.div, "value", "1")
			.unwrap();
		let value = Signal::new(2);

		host.live.attr(host.div, "value", value.clone()).unwrap();
		value.set(3);

		assert_eq!(host.live.document().get_attribute(host.div, "value"), Some("3"));
	}

	#[rstest]
	fn test_attrs_diff(host: Host) {
		let text = Signal::new("class='foo'".to_string());
		host.live.attrs(host.div, text.clone()).unwrap();
		assert_eq!(host.live.document().get_attribute(host.div, "class"), Some("foo"));

		text.set(String::new());
		assert!(!host.live.document().has_attribute(host.div, "class"));

		text.set("foo='bar'".to_string());
		assert_eq!(host.live.document().get_attribute(host.div, "foo"), Some("bar"));
	}

	#[rstest]
	fn test_attrs_toggle_bare_attribute(host: Host) {
		let text = Signal::new(String::new());
		host.live.attrs(host.div, text.clone()).unwrap();
		assert!(!host.live.document().has_attribute(host.div, "selected"));

		text.set("selected".to_string());
		assert_eq!(host.live.document().outer_html(host.div), "<div selected=\"\"></div>");

		text.set(String::new());
		assert_eq!(host.live.document().outer_html(host.div), "<div></div>");
	}

	#[rstest]
	fn test_removal_releases_subscription_and_watcher(host: Host) {
		let text = Signal::new("hello".to_string());
		let binding = host.live.attrs(host.div, text.clone()).unwrap();
		assert_eq!(host.live.detector().len(), 1);
		assert_eq!(text.listener_count(), 1);

		host.live.remove_node(host.div).unwrap();

		assert_eq!(host.live.detector().len(), 0);
		assert_eq!(text.listener_count(), 0);
		assert!(!binding.is_bound());
		text.set("world".to_string());
		assert!(!host.live.document().has_attribute(host.div, "world"));
	}

	#[rstest]
	fn test_queued_attr_update_skipped_after_removal(host: Host) {
		let value = Signal::new("a".to_string());
		let binding = host.live.attr(host.div, "title", value.clone()).unwrap();

		host.live.batch(|| {
			value.set("b".to_string());
			host.live.remove_node(host.div).unwrap();
		});

		assert!(!binding.is_bound());
		assert_eq!(host.live.document().get_attribute(host.div, "title"), Some("a"));
	}

	#[rstest]
	fn test_queued_attrs_update_skipped_after_unbind(host: Host) {
		let text = Signal::new("class='foo'".to_string());
		let binding = host.live.attrs(host.div, text.clone()).unwrap();

		host.live.batch(|| {
			text.set("class='bar' hidden".to_string());
			binding.unbind();
		});

		let doc = host.live.document();
		assert_eq!(doc.get_attribute(host.div, "class"), Some("foo"));
		assert!(!doc.has_attribute(host.div, "hidden"));
	}

	#[rstest]
	fn test_unbind_is_idempotent(host: Host) {
		let value = Signal::new("a".to_string());
		let binding = host.live.attr(host.div, "title", value.clone()).unwrap();

		assert!(binding.unbind());
		assert!(!binding.unbind());
		value.set("b".to_string());

		assert_eq!(host.live.document().get_attribute(host.div, "title"), Some("a"));
		assert!(host.live.detector().is_empty());
	}

	#[rstest]
	fn test_attr_on_text_node_fails(host: Host) {
		let text = host.live.document_mut().create_text("t");
		let err = host
			.live
			.attr(text, "title", Signal::new("x".to_string()))
			.unwrap_err();
		assert!(matches!(err, LiveError::NotAnElement(_)));
	}
}

//! Text and html binders.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::BindOptions;
use crate::content::Content;
use crate::dom::NodeId;
use crate::error::{LiveError, LiveResult};
use crate::live::Live;
use crate::reactive::Observable;
use crate::registry::RangeId;

/// Latest html value waiting for its queued commit.
#[derive(Default)]
struct PendingHtml {
	value: RefCell<Option<Content>>,
	scheduled: Cell<bool>,
}

impl Live {
	/// Replaces `target` with a text node showing the source's value, and
	/// keeps the text in sync.
	///
	/// Returns the range holding the text node.
	pub fn text<T, S>(&self, target: NodeId, source: S, options: BindOptions) -> LiveResult<RangeId>
	where
		T: ToString + 'static,
		S: Observable<T> + 'static,
	{
		let (range, created) = self.binding_range(target, options.range, options.parent_node)?;
		let text = self.document_mut().create_text(&source.get().to_string());
		self.commit_initial(range, created, vec![text])?;

		let weak = self.downgrade();
		let subscription = source.subscribe(Rc::new(move |value: &T| {
			let value = value.to_string();
			let Some(live) = weak.upgrade() else {
				return;
			};
			let task_live = live.downgrade();
			live.queue().enqueue("live.text update", move || {
				let Some(live) = task_live.upgrade() else {
					return;
				};
				if !live.registry().contains(range) {
					return;
				}
				if let Err(err) = live.document_mut().set_node_value(text, &value) {
					tracing::warn!(range = ?range, error = %err, "text update failed");
				}
			});
		}));

		self.register_binding(
			range,
			created,
			Box::new(move || {
				subscription.unsubscribe();
				drop(source);
				tracing::trace!(range = ?range, "text binding torn down");
			}),
			options.parent_range,
		)?;
		self.settle();
		Ok(range)
	}

	/// Replaces `target` (or the given range) with the source's content, and
	/// re-renders it whenever the source changes.
	///
	/// Changes are coalesced: a queued re-render uses the latest value at the
	/// time it runs. [`Content::Hook`] values run the hook with the
	/// placeholder that holds the emptied region.
	pub fn html<V, S>(&self, target: NodeId, source: S, options: BindOptions) -> LiveResult<RangeId>
	where
		V: Into<Content> + Clone + 'static,
		S: Observable<V> + 'static,
	{
		let (range, created) = self.binding_range(target, options.range, options.parent_node)?;
		let initial = self.materialize(source.get().into())?;
		self.commit_initial(range, created, initial.nodes.clone())?;
		self.run_hook(&initial);

		let pending = Rc::new(PendingHtml::default());
		let weak = self.downgrade();
		let listener_pending = pending.clone();
		let subscription = source.subscribe(Rc::new(move |value: &V| {
			*listener_pending.value.borrow_mut() = Some(value.clone().into());
			if listener_pending.scheduled.replace(true) {
				return;
			}
			let Some(live) = weak.upgrade() else {
				return;
			};
			let task_live = live.downgrade();
			let task_pending = listener_pending.clone();
			live.queue().enqueue("live.html replace", move || {
				task_pending.scheduled.set(false);
				let content = task_pending.value.borrow_mut().take();
				if let (Some(live), Some(content)) = (task_live.upgrade(), content) {
					live.rerender_html(range, content);
				}
			});
		}));

		self.register_binding(
			range,
			created,
			Box::new(move || {
				subscription.unsubscribe();
				pending.value.borrow_mut().take();
				drop(source);
				tracing::trace!(range = ?range, "html binding torn down");
			}),
			options.parent_range,
		)?;
		self.settle();
		Ok(range)
	}

	fn rerender_html(&self, range: RangeId, content: Content) {
		if !self.registry().contains(range) {
			return;
		}
		let rendered = match self.materialize(content) {
			Ok(rendered) => rendered,
			Err(err) => {
				tracing::warn!(range = ?range, error = %err, "html render failed; keeping previous content");
				return;
			}
		};
		if let Err(err) = self.commit(range, rendered.nodes.clone()) {
			tracing::warn!(range = ?range, error = %err, "html commit failed");
			return;
		}
		self.run_hook(&rendered);
	}

	/// First commit of a binder. A range created for the binder is dropped
	/// again if the commit fails.
	///
	/// A target without a parent is not an error: the range just records the
	/// rendered nodes, stays registered so it can be torn down, and the first
	/// later commit that still finds no parent tears it down.
	pub(crate) fn commit_initial(&self, range: RangeId, created: bool, nodes: Vec<NodeId>) -> LiveResult<()> {
		let result = {
			let mut doc = self.document_mut();
			let mut registry = self.registry_mut();
			match registry.replace(&mut doc, range, nodes.clone()) {
				Err(LiveError::DetachedAnchor(_)) => {
					tracing::debug!(range = ?range, "binding target is detached; recording nodes only");
					registry.update(&doc, range, nodes)
				}
				other => other,
			}
		};
		match result {
			Ok(update) => {
				Self::run_teardowns(update.torn_down);
				Ok(())
			}
			Err(err) => {
				if created {
					let teardowns = self.registry_mut().unregister(range);
					Self::run_teardowns(teardowns);
				}
				Err(err)
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use crate::reactive::Signal;
	use crate::{BindOptions, Content, Live};
	use rstest::{fixture, rstest};
	use std::cell::Cell;
	use std::rc::Rc;

	use crate::dom::NodeId;

	struct Host {
		live: Live,
		div: NodeId,
		span: NodeId,
	}

	#[fixture]
	fn host() -> Host {
		let live = Live::new();
		let (div, span) = {
			let mut doc = live.document_mut();
			let div = doc.create_element("div");
			let span = doc.create_element("span");
			doc.append_child(div, span).unwrap();
			let body = doc.body();
			doc.append_child(body, div).unwrap();
			(div, span)
		};
		Host { live, div, span }
	}

	#[rstest]
	fn test_text_escapes_and_updates(host: Host) {
		let source = Signal::new("<b>one</b>".to_string());

		host.live.text(host.span, source.clone(), BindOptions::new()).unwrap();
		assert_eq!(host.live.document().inner_html(host.div), "&lt;b&gt;one&lt;/b&gt;");

		source.set("two".to_string());
		assert_eq!(host.live.document().inner_html(host.div), "two");
	}

	#[rstest]
	fn test_text_accepts_numbers(host: Host) {
		let source = Signal::new(41);
		host.live.text(host.span, source.clone(), BindOptions::new()).unwrap();
		source.update(|n| *n += 1);
		assert_eq!(host.live.document().text_content(host.div), "42");
	}

	#[rstest]
	fn test_text_on_detached_target_records_range() {
		let live = Live::new();
		let loose = live.document_mut().create_element("span");
		let source = Signal::new(1);

		let range = live.text(loose, source.clone(), BindOptions::new()).unwrap();

		assert!(live.registry().is_registered(range));
		let text = live.registry().nodes(range).unwrap()[0];
		assert_eq!(live.document().node_value(text), Some("1"));
		assert_eq!(live.document().parent(text), None);
		assert_eq!(source.listener_count(), 1);

		live.teardown(range);
		assert!(live.registry().is_empty());
		assert_eq!(source.listener_count(), 0);
	}

	#[rstest]
	fn test_detached_html_binding_torn_down_by_next_commit() {
		let live = Live::new();
		let loose = live.document_mut().create_element("span");
		let source = Signal::new(Content::markup("<b>a</b>"));
		let range = live.html(loose, source.clone(), BindOptions::new()).unwrap();

		source.set(Content::markup("<b>b</b>"));

		assert!(!live.registry().contains(range));
		assert_eq!(source.listener_count(), 0);
	}

	#[rstest]
	fn test_html_batches_to_latest_value(host: Host) {
		let source = host.live.signal(Content::markup("<i>a</i>"));
		host.live.html(host.span, source.clone(), BindOptions::new()).unwrap();

		host.live.batch(|| {
			source.set(Content::markup("<i>b</i>"));
			source.set(Content::markup("<i>c</i><i>d</i>"));
		});

		assert_eq!(host.live.document().inner_html(host.div), "<i>c</i><i>d</i>");
	}

	#[rstest]
	fn test_html_rerenders_reuse_arena_slots(host: Host) {
		let source = Signal::new(Content::markup("<b>0</b>"));
		host.live.html(host.span, source.clone(), BindOptions::new()).unwrap();
		source.set(Content::markup("<b>1</b>"));
		let slots = host.live.document().slot_count();

		for i in 2..1000 {
			source.set(Content::markup(format!("<b>{i}</b>")));
		}

		assert_eq!(host.live.document().slot_count(), slots);
		assert_eq!(host.live.document().inner_html(host.div), "<b>999</b>");
	}

	#[rstest]
	fn test_html_keeps_caller_nodes_across_hiding(host: Host) {
		let paragraph = host.live.document_mut().create_element("p");
		let source = Signal::new(Content::Nodes(vec![paragraph]));
		host.live.html(host.span, source.clone(), BindOptions::new()).unwrap();

		source.set(Content::Empty);
		assert!(host.live.document().has_node(paragraph));
		source.set(Content::Nodes(vec![paragraph]));

		assert_eq!(host.live.document().inner_html(host.div), "<p></p>");
	}

	#[rstest]
	fn test_html_hook_receives_placeholder(host: Host) {
		let calls = Rc::new(Cell::new(0));
		let c = calls.clone();
		let hook = Content::hook(move |live, node| {
			assert!(live.document().is_text(node));
			c.set(c.get() + 1);
		});
		let source = Signal::new(Content::markup("<h1>Hello</h1>"));
		host.live.html(host.span, source.clone(), BindOptions::new()).unwrap();

		source.set(hook);
		assert_eq!(calls.get(), 1);
		assert!(host.live.document().elements_by_tag_name(host.div, "h1").is_empty());
	}

	#[rstest]
	fn test_html_teardown_releases_source(host: Host) {
		let source = Signal::new(Content::text("x"));
		let range = host.live.html(host.span, source.clone(), BindOptions::new()).unwrap();
		assert_eq!(source.listener_count(), 1);

		host.live.teardown(range);
		host.live.teardown(range);

		assert_eq!(source.listener_count(), 0);
	}
}

//! List binder.
//!
//! Every item of the collection renders into a range of its own, nested in
//! the list's range. Edits are applied to those item ranges as they arrive;
//! putting the resulting node order into the tree is one queued commit that
//! reads the item ranges when it runs, so several edits in a row cost a single
//! tree update.
//!
//! Edits that arrive while an edit is being applied (a renderer mutating the
//! collection, for instance) wait in order and are applied right after it.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use super::{EmptyRenderer, ListOptions};
use crate::content::Content;
use crate::dom::NodeId;
use crate::error::LiveResult;
use crate::live::{Live, Materialized, WeakLive};
use crate::reactive::{ListEvent, ListSource, Observable, ObservableList, Subscription};
use crate::registry::RangeId;

/// What a list renderer gets to see for one item.
pub struct ItemScope<T> {
	/// The session the list belongs to.
	pub live: Live,
	/// The item being rendered.
	pub item: T,
	/// Position of the item at render time.
	pub index: usize,
	/// The item's range. Bindings created while rendering can nest under it.
	pub range: RangeId,
}

impl<T: fmt::Debug> fmt::Debug for ItemScope<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ItemScope")
			.field("item", &self.item)
			.field("index", &self.index)
			.field("range", &self.range)
			.finish()
	}
}

type Renderer<T> = Rc<dyn Fn(&ItemScope<T>) -> Content>;

struct ListState<T: 'static> {
	live: WeakLive,
	range: RangeId,
	render: Renderer<T>,
	empty: Option<EmptyRenderer>,
	bindings: RefCell<Vec<RangeId>>,
	empty_range: Cell<Option<RangeId>>,
	placeholder: Cell<Option<NodeId>>,
	hooks: RefCell<Vec<Materialized>>,
	busy: Cell<bool>,
	pending: RefCell<VecDeque<ListEvent<T>>>,
	commit_scheduled: Cell<bool>,
	torn_down: Cell<bool>,
	collection: RefCell<Option<ObservableList<T>>>,
	edit_subscription: RefCell<Option<Subscription>>,
	source_subscription: RefCell<Option<Subscription>>,
	source: RefCell<Option<ListSource<T>>>,
}

impl<T: Clone + 'static> ListState<T> {
	fn new(live: &Live, range: RangeId, render: Renderer<T>, empty: Option<EmptyRenderer>) -> Self {
		Self {
			live: live.downgrade(),
			range,
			render,
			empty,
			bindings: RefCell::new(Vec::new()),
			empty_range: Cell::new(None),
			placeholder: Cell::new(None),
			hooks: RefCell::new(Vec::new()),
			busy: Cell::new(false),
			pending: RefCell::new(VecDeque::new()),
			commit_scheduled: Cell::new(false),
			torn_down: Cell::new(false),
			collection: RefCell::new(None),
			edit_subscription: RefCell::new(None),
			source_subscription: RefCell::new(None),
			source: RefCell::new(None),
		}
	}

	/// Follows the edits of `list`, dropping the previous collection's
	/// listener.
	fn subscribe_edits(self: &Rc<Self>, list: &ObservableList<T>) {
		let weak = Rc::downgrade(self);
		let subscription = list.on_edit(Rc::new(move |edit: &ListEvent<T>| {
			if let Some(state) = weak.upgrade() {
				state.receive(edit.clone());
			}
		}));
		let previous = self.edit_subscription.replace(Some(subscription));
		if let Some(previous) = previous {
			previous.unsubscribe();
		}
		*self.collection.borrow_mut() = Some(list.clone());
	}

	/// Switches to the collection emitted by a reactive source.
	fn rebind(self: &Rc<Self>, list: &ObservableList<T>) {
		if self.torn_down.get() {
			return;
		}
		let same = self
			.collection
			.borrow()
			.as_ref()
			.is_some_and(|current| current.ptr_eq(list));
		if same {
			tracing::trace!(range = ?self.range, "list source re-emitted the bound collection");
			return;
		}
		tracing::debug!(range = ?self.range, "list rebound to a new collection");
		self.subscribe_edits(list);
		self.receive(ListEvent::Reset {
			items: list.to_vec(),
		});
	}

	fn receive(self: &Rc<Self>, edit: ListEvent<T>) {
		if self.torn_down.get() {
			return;
		}
		self.pending.borrow_mut().push_back(edit);
		if self.busy.get() {
			return;
		}
		let Some(live) = self.live.upgrade() else {
			self.pending.borrow_mut().clear();
			return;
		};
		self.drain(&live);
		if !self.torn_down.get() {
			self.schedule_commit(&live);
		}
	}

	/// Applies pending edits in arrival order.
	fn drain(&self, live: &Live) {
		self.busy.set(true);
		loop {
			let next = self.pending.borrow_mut().pop_front();
			let Some(edit) = next else {
				break;
			};
			if self.torn_down.get() {
				self.pending.borrow_mut().clear();
				break;
			}
			self.apply(live, edit);
		}
		self.busy.set(false);
	}

	fn apply(&self, live: &Live, edit: ListEvent<T>) {
		match edit {
			ListEvent::Insert { index, items } => {
				let len = self.bindings.borrow().len();
				let index = if index > len {
					tracing::warn!(range = ?self.range, index, len, "list insert past the end; appending");
					len
				} else {
					index
				};
				if !items.is_empty() {
					self.drop_empty(live);
				}
				for (offset, item) in items.into_iter().enumerate() {
					let Some(range) = self.render_item(live, item, index + offset) else {
						return;
					};
					let mut bindings = self.bindings.borrow_mut();
					let at = (index + offset).min(bindings.len());
					bindings.insert(at, range);
				}
			}
			ListEvent::Remove { index, count } => {
				let removed: Vec<RangeId> = {
					let mut bindings = self.bindings.borrow_mut();
					if index >= bindings.len() {
						tracing::warn!(range = ?self.range, index, len = bindings.len(), "list remove out of range; ignored");
						return;
					}
					let end = index.saturating_add(count).min(bindings.len());
					bindings.drain(index..end).collect()
				};
				self.unregister_ranges(live, removed);
				self.ensure_empty(live);
			}
			ListEvent::Move { from, to, .. } => {
				let mut bindings = self.bindings.borrow_mut();
				if from >= bindings.len() || to >= bindings.len() {
					tracing::warn!(range = ?self.range, from, to, len = bindings.len(), "list move out of range; ignored");
					return;
				}
				let range = bindings.remove(from);
				bindings.insert(to, range);
			}
			ListEvent::Set { index, item } => {
				if index >= self.bindings.borrow().len() {
					tracing::warn!(range = ?self.range, index, "list set out of range; ignored");
					return;
				}
				let Some(range) = self.render_item(live, item, index) else {
					return;
				};
				let replaced = self
					.bindings
					.borrow_mut()
					.get_mut(index)
					.map(|slot| std::mem::replace(slot, range));
				self.unregister_ranges(live, vec![replaced.unwrap_or(range)]);
			}
			ListEvent::Reset { items } => {
				let mut old = std::mem::take(&mut *self.bindings.borrow_mut());
				old.extend(self.empty_range.take());
				self.unregister_ranges(live, old);
				for (index, item) in items.into_iter().enumerate() {
					let Some(range) = self.render_item(live, item, index) else {
						return;
					};
					self.bindings.borrow_mut().push(range);
				}
				self.ensure_empty(live);
			}
		}
	}

	fn render_item(&self, live: &Live, item: T, index: usize) -> Option<RangeId> {
		let render = self.render.clone();
		self.render_range(live, |range| {
			render(&ItemScope {
				live: live.clone(),
				item,
				index,
				range,
			})
		})
	}

	/// Renders content into a fresh range and nests it in the list's range.
	///
	/// Returns `None` if the list was torn down while rendering.
	fn render_range(&self, live: &Live, render: impl FnOnce(RangeId) -> Content) -> Option<RangeId> {
		let range = live.registry_mut().create(Vec::new());
		let content = render(range);
		let materialized = match live.materialize(content) {
			Ok(materialized) => Some(materialized),
			Err(err) => {
				tracing::warn!(range = ?range, error = %err, "list item render failed; using a placeholder");
				None
			}
		};
		let nodes = match &materialized {
			Some(materialized) => materialized.nodes.clone(),
			None => vec![live.placeholder()],
		};
		let update = {
			let doc = live.document();
			live.registry_mut().update(&doc, range, nodes)
		};
		match update {
			Ok(update) => Live::run_teardowns(update.torn_down),
			Err(err) => tracing::warn!(range = ?range, error = %err, "list item range update failed"),
		}
		if let Some(materialized) = materialized.filter(|m| m.hook.is_some()) {
			self.hooks.borrow_mut().push(materialized);
		}

		if self.torn_down.get() {
			tracing::trace!(range = ?range, "list torn down while rendering; item discarded");
			self.unregister_ranges(live, vec![range]);
			return None;
		}
		if let Err(err) = live.registry_mut().register(range, None, Some(self.range)) {
			tracing::warn!(range = ?range, error = %err, "list item range registration failed");
		}
		Some(range)
	}

	fn drop_empty(&self, live: &Live) {
		if let Some(range) = self.empty_range.take() {
			self.unregister_ranges(live, vec![range]);
		}
	}

	fn ensure_empty(&self, live: &Live) {
		if !self.bindings.borrow().is_empty() || self.empty_range.get().is_some() {
			return;
		}
		let Some(empty) = self.empty.clone() else {
			return;
		};
		if let Some(range) = self.render_range(live, |_| empty(live)) {
			self.empty_range.set(Some(range));
		}
	}

	fn unregister_ranges(&self, live: &Live, ranges: Vec<RangeId>) {
		if ranges.is_empty() {
			return;
		}
		let mut nodes = Vec::new();
		let teardowns: Vec<_> = {
			let mut registry = live.registry_mut();
			for range in &ranges {
				if let Ok(range_nodes) = registry.nodes(*range) {
					nodes.extend_from_slice(range_nodes);
				}
			}
			ranges
				.into_iter()
				.flat_map(|range| registry.unregister(range))
				.collect()
		};
		// Nodes still in the tree are skipped when retired nodes are freed.
		live.retire(nodes);
		Live::run_teardowns(teardowns);
	}

	/// The list's node run: every item's nodes, else the empty content, else
	/// a placeholder.
	fn current_nodes(&self, live: &Live) -> Vec<NodeId> {
		let mut nodes = Vec::new();
		{
			let registry = live.registry();
			for range in self.bindings.borrow().iter() {
				if let Ok(item_nodes) = registry.nodes(*range) {
					nodes.extend_from_slice(item_nodes);
				}
			}
			if nodes.is_empty() {
				if let Some(empty) = self.empty_range.get() {
					if let Ok(empty_nodes) = registry.nodes(empty) {
						nodes.extend_from_slice(empty_nodes);
					}
				}
			}
		}
		if nodes.is_empty() {
			// A placeholder that was freed while items were shown is replaced.
			let reusable = self.placeholder.get().filter(|p| live.document().has_node(*p));
			let placeholder = match reusable {
				Some(placeholder) => placeholder,
				None => {
					let placeholder = live.placeholder();
					self.placeholder.set(Some(placeholder));
					placeholder
				}
			};
			nodes.push(placeholder);
		}
		nodes
	}

	/// Runs the hooks of items rendered since the last commit, now that
	/// their nodes are in the tree.
	fn run_hooks(&self, live: &Live) {
		let hooks = std::mem::take(&mut *self.hooks.borrow_mut());
		for materialized in &hooks {
			live.run_hook(materialized);
		}
	}

	fn schedule_commit(self: &Rc<Self>, live: &Live) {
		if self.commit_scheduled.replace(true) {
			return;
		}
		let weak = Rc::downgrade(self);
		live.queue().enqueue("live.list update", move || {
			let Some(state) = weak.upgrade() else {
				return;
			};
			state.commit_scheduled.set(false);
			if state.torn_down.get() {
				return;
			}
			let Some(live) = state.live.upgrade() else {
				return;
			};
			let nodes = state.current_nodes(&live);
			if let Err(err) = live.commit(state.range, nodes) {
				tracing::warn!(range = ?state.range, error = %err, "list commit failed");
				return;
			}
			if !state.torn_down.get() {
				state.run_hooks(&live);
			}
		});
	}

	/// Releases every subscription and the item ranges. Runs once.
	fn shut_down(&self) {
		if self.torn_down.replace(true) {
			return;
		}
		let edit_subscription = self.edit_subscription.borrow_mut().take();
		if let Some(subscription) = edit_subscription {
			subscription.unsubscribe();
		}
		let source_subscription = self.source_subscription.borrow_mut().take();
		if let Some(subscription) = source_subscription {
			subscription.unsubscribe();
		}
		self.source.borrow_mut().take();
		self.collection.borrow_mut().take();
		self.pending.borrow_mut().clear();
		self.hooks.borrow_mut().clear();

		let mut ranges = std::mem::take(&mut *self.bindings.borrow_mut());
		ranges.extend(self.empty_range.take());
		if let Some(live) = self.live.upgrade() {
			self.unregister_ranges(&live, ranges);
		}
		tracing::trace!(range = ?self.range, "list binding torn down");
	}
}

impl Live {
	/// Renders one range per item of `source` in place of `target` (or into
	/// the given range), and keeps them in sync with the collection's edits.
	///
	/// Unchanged items keep their nodes across edits; a moved item's nodes
	/// are moved, not re-created. While the collection is empty the
	/// [`ListOptions::empty`] content is shown, or a placeholder holds the
	/// list's position.
	///
	/// Returns the list's range. Tearing it down (or removing its nodes from
	/// the document) releases every listener the binding installed.
	pub fn list<T, F>(
		&self,
		target: NodeId,
		source: impl Into<ListSource<T>>,
		render: F,
		options: ListOptions,
	) -> LiveResult<RangeId>
	where
		T: Clone + 'static,
		F: Fn(&ItemScope<T>) -> Content + 'static,
	{
		let source = source.into();
		let (range, created) = self.binding_range(target, options.range, options.parent_node)?;
		let state = Rc::new(ListState::new(self, range, Rc::new(render), options.empty));

		state.busy.set(true);
		let initial = match &source {
			ListSource::Collection(list) => {
				state.subscribe_edits(list);
				list.to_vec()
			}
			ListSource::Reactive(reactive) => {
				let list = reactive.get();
				state.subscribe_edits(&list);
				let weak = Rc::downgrade(&state);
				let subscription = reactive.subscribe(Rc::new(move |list: &ObservableList<T>| {
					if let Some(state) = weak.upgrade() {
						state.rebind(list);
					}
				}));
				*state.source_subscription.borrow_mut() = Some(subscription);
				list.to_vec()
			}
			ListSource::Values(values) => {
				let weak = Rc::downgrade(&state);
				let subscription = values.subscribe(Rc::new(move |items: &Vec<T>| {
					if let Some(state) = weak.upgrade() {
						state.receive(ListEvent::Reset {
							items: items.clone(),
						});
					}
				}));
				*state.source_subscription.borrow_mut() = Some(subscription);
				values.get()
			}
		};
		*state.source.borrow_mut() = Some(source);
		state
			.pending
			.borrow_mut()
			.push_front(ListEvent::Reset { items: initial });
		state.drain(self);

		let nodes = state.current_nodes(self);
		if let Err(err) = self.commit_initial(range, created, nodes) {
			state.shut_down();
			return Err(err);
		}

		let teardown_state = state.clone();
		let registered = self.register_binding(
			range,
			created,
			Box::new(move || teardown_state.shut_down()),
			options.parent_range,
		);
		if let Err(err) = registered {
			state.shut_down();
			return Err(err);
		}
		tracing::debug!(range = ?range, items = state.bindings.borrow().len(), "list bound");
		state.run_hooks(self);
		self.settle();
		Ok(range)
	}
}

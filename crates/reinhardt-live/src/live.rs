//! Live session
//!
//! A [`Live`] owns everything one rendered document needs to stay in sync with
//! its reactive sources: the [`Document`], the [`NodeRangeRegistry`], the
//! [`TeardownDetector`], the [`UpdateQueue`] and the attribute setter table.
//! Cloning a `Live` shares the session; binders keep only a [`WeakLive`].
//!
//! The binder entry points (`text`, `html`, `attr`, `attrs`, `list`) live in
//! [`crate::binding`].
//!
//! ## Borrowing
//!
//! The document and the registry sit behind `RefCell`s. Accessors hand out
//! guards; drop them before setting a source, flushing, or calling a binder,
//! since those may mutate the tree.
//!
//! ## Node reclamation
//!
//! Nodes the session creates itself (parsed markup, text, views and
//! placeholders) are owned by it. Owned nodes a commit takes out of a range
//! are retired; once removal detection has released everything bound to
//! them, retired nodes that were not put back into the tree are freed, so
//! re-rendering does not grow the arena. Nodes handed in through
//! [`Content::Nodes`] stay with the caller.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::content::{Content, Hook};
use crate::dom::{AttrSetter, AttrSetters, Document, NodeId, View, parse_fragment};
use crate::error::{LiveError, LiveResult};
use crate::queue::UpdateQueue;
use crate::reactive::{ObservableList, Signal};
use crate::registry::{NodeRangeRegistry, RangeId, Teardown};
use crate::settings::LiveSettings;
use crate::teardown::TeardownDetector;

pub(crate) struct LiveInner {
	document: RefCell<Document>,
	registry: RefCell<NodeRangeRegistry>,
	detector: RefCell<TeardownDetector>,
	attr_setters: RefCell<AttrSetters>,
	owned: RefCell<HashSet<NodeId>>,
	retired: RefCell<Vec<NodeId>>,
	queue: UpdateQueue,
	settings: LiveSettings,
}

/// A live-binding session over one document.
#[derive(Clone)]
pub struct Live {
	inner: Rc<LiveInner>,
}

/// Non-owning handle to a [`Live`] session.
#[derive(Clone)]
pub struct WeakLive {
	inner: Weak<LiveInner>,
}

impl WeakLive {
	/// Returns the session if it is still alive.
	pub fn upgrade(&self) -> Option<Live> {
		self.inner.upgrade().map(|inner| Live { inner })
	}
}

impl fmt::Debug for WeakLive {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WeakLive")
			.field("alive", &(self.inner.strong_count() > 0))
			.finish()
	}
}

impl fmt::Debug for Live {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Live")
			.field("settings", &self.inner.settings)
			.field("queue", &self.inner.queue)
			.field("ranges", &self.inner.registry.try_borrow().map(|r| r.len()).ok())
			.finish()
	}
}

impl Default for Live {
	fn default() -> Self {
		Self::new()
	}
}

/// Rendered content before it is put in the tree.
pub(crate) struct Materialized {
	pub(crate) nodes: Vec<NodeId>,
	pub(crate) hook: Option<Hook>,
}

impl Live {
	/// Creates a session with default settings.
	pub fn new() -> Self {
		Self::with_settings(LiveSettings::default())
	}

	/// Creates a session with `settings`.
	pub fn with_settings(settings: LiveSettings) -> Self {
		let queue = UpdateQueue::with_max_flush_tasks(settings.max_flush_tasks);
		let live = Self {
			inner: Rc::new(LiveInner {
				document: RefCell::new(Document::new()),
				registry: RefCell::new(NodeRangeRegistry::new(settings.placeholder)),
				detector: RefCell::new(TeardownDetector::new()),
				attr_setters: RefCell::new(AttrSetters::default()),
				owned: RefCell::new(HashSet::new()),
				retired: RefCell::new(Vec::new()),
				queue,
				settings,
			}),
		};
		let weak = live.downgrade();
		live.inner.queue.set_idle_hook(move || {
			if let Some(live) = weak.upgrade() {
				live.detect_removals();
			}
		});
		tracing::debug!(settings = ?live.inner.settings, "live session created");
		live
	}

	/// Returns a non-owning handle.
	pub fn downgrade(&self) -> WeakLive {
		WeakLive {
			inner: Rc::downgrade(&self.inner),
		}
	}

	/// Returns true if both handles share one session.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.inner, &other.inner)
	}

	/// The session settings.
	pub fn settings(&self) -> &LiveSettings {
		&self.inner.settings
	}

	/// The update queue all deferred mutations go through.
	pub fn queue(&self) -> &UpdateQueue {
		&self.inner.queue
	}

	/// Borrows the document.
	pub fn document(&self) -> Ref<'_, Document> {
		self.inner.document.borrow()
	}

	/// Borrows the document mutably.
	pub fn document_mut(&self) -> RefMut<'_, Document> {
		self.inner.document.borrow_mut()
	}

	/// Borrows the range registry.
	pub fn registry(&self) -> Ref<'_, NodeRangeRegistry> {
		self.inner.registry.borrow()
	}

	pub(crate) fn registry_mut(&self) -> RefMut<'_, NodeRangeRegistry> {
		self.inner.registry.borrow_mut()
	}

	/// Borrows the teardown detector.
	pub fn detector(&self) -> Ref<'_, TeardownDetector> {
		self.inner.detector.borrow()
	}

	pub(crate) fn detector_mut(&self) -> RefMut<'_, TeardownDetector> {
		self.inner.detector.borrow_mut()
	}

	pub(crate) fn attr_setters(&self) -> Ref<'_, AttrSetters> {
		self.inner.attr_setters.borrow()
	}

	/// Routes assignments of attribute `name` to `setter`.
	pub fn register_attr_setter(&self, name: &str, setter: AttrSetter) {
		self.inner.attr_setters.borrow_mut().register(name, setter);
	}

	/// Creates a signal whose notifications follow this session's batches.
	pub fn signal<T: Clone + 'static>(&self, value: T) -> Signal<T> {
		Signal::batched(&self.inner.queue, value)
	}

	/// Creates a list whose edit events follow this session's batches.
	pub fn observable_list<T: Clone + 'static>(
		&self,
		items: impl IntoIterator<Item = T>,
	) -> ObservableList<T> {
		ObservableList::batched(&self.inner.queue, items)
	}

	/// Runs every pending update, then tears down regions whose nodes left
	/// the document.
	pub fn flush(&self) {
		self.inner.queue.flush();
	}

	/// Runs `f` inside a batch; updates are applied when the outermost batch
	/// closes.
	pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
		self.inner.queue.batch(f)
	}

	/// Registers `nodes` as a range without a teardown of its own, so binders
	/// can be handed an existing range or nest under one.
	pub fn register_range(&self, nodes: Vec<NodeId>, parent: Option<RangeId>) -> LiveResult<RangeId> {
		let mut registry = self.registry_mut();
		let range = registry.create(nodes);
		registry.register(range, None, parent)?;
		Ok(range)
	}

	/// Tears down `range` and everything nested in it. Repeated calls are
	/// no-ops.
	pub fn teardown(&self, range: RangeId) {
		let teardowns = self.registry_mut().unregister(range);
		Self::run_teardowns(teardowns);
	}

	/// Removes `node` from its parent and tears down what went with it.
	pub fn remove_node(&self, node: NodeId) -> LiveResult<()> {
		self.document_mut().remove(node)?;
		self.settle();
		Ok(())
	}

	/// Tears down every region whose nodes were removed from the document
	/// since the last check.
	pub fn detect_removals(&self) {
		loop {
			let teardowns = {
				let mut doc = self.inner.document.borrow_mut();
				let mut registry = self.inner.registry.borrow_mut();
				self.inner
					.detector
					.borrow_mut()
					.detect(&mut doc, &mut registry)
			};
			if teardowns.is_empty() {
				break;
			}
			Self::run_teardowns(teardowns);
		}
		self.free_retired();
	}

	/// Marks nodes the session created as its own.
	pub(crate) fn own(&self, nodes: &[NodeId]) {
		self.inner.owned.borrow_mut().extend(nodes.iter().copied());
	}

	/// Queues owned nodes for freeing at the next removal check.
	pub(crate) fn retire(&self, nodes: impl IntoIterator<Item = NodeId>) {
		let mut owned = self.inner.owned.borrow_mut();
		self.inner
			.retired
			.borrow_mut()
			.extend(nodes.into_iter().filter(|node| owned.remove(node)));
	}

	/// Frees retired nodes that stayed out of the tree. Nodes that were put
	/// back stay owned.
	fn free_retired(&self) {
		let retired = std::mem::take(&mut *self.inner.retired.borrow_mut());
		if retired.is_empty() {
			return;
		}
		let mut freed = 0;
		let mut kept = Vec::new();
		{
			let mut doc = self.inner.document.borrow_mut();
			for node in retired {
				if doc.parent(node).is_some() {
					kept.push(node);
				} else {
					freed += doc.free(node);
				}
			}
		}
		self.own(&kept);
		tracing::trace!(freed, kept = kept.len(), "retired nodes reclaimed");
	}

	/// Checks for removals unless a flush is running (its idle hook will).
	pub(crate) fn settle(&self) {
		if !self.inner.queue.is_flushing() {
			self.detect_removals();
		}
	}

	pub(crate) fn run_teardowns(teardowns: Vec<Teardown>) {
		for teardown in teardowns {
			teardown();
		}
	}

	/// The node a binder should treat as its parent: the target's own parent,
	/// unless that is a fragment or missing.
	pub fn resolve_parent_node(&self, target: NodeId, fallback: Option<NodeId>) -> Option<NodeId> {
		let doc = self.document();
		match doc.parent(target) {
			Some(parent) if !doc.is_fragment(parent) => Some(parent),
			other => fallback.or(other),
		}
	}

	/// Creates a placeholder node of the configured kind.
	pub(crate) fn placeholder(&self) -> NodeId {
		let placeholder = {
			let mut doc = self.inner.document.borrow_mut();
			self.inner.registry.borrow().placeholder(&mut doc)
		};
		self.own(&[placeholder]);
		placeholder
	}

	/// Turns content into detached nodes. Empty content yields a placeholder.
	pub(crate) fn materialize(&self, content: Content) -> LiveResult<Materialized> {
		let (mut nodes, hook) = match content {
			Content::Markup(markup) => (self.mount(&View::Fragment(parse_fragment(&markup))), None),
			Content::Text(text) => {
				let text = self.document_mut().create_text(&text);
				self.own(&[text]);
				(vec![text], None)
			}
			Content::View(view) => (self.mount(&view), None),
			Content::Nodes(nodes) => {
				let doc = self.document();
				let mut flat = Vec::with_capacity(nodes.len());
				for node in nodes {
					if !doc.has_node(node) {
						return Err(LiveError::UnknownNode(node));
					}
					if doc.is_fragment(node) {
						flat.extend_from_slice(doc.children(node));
					} else {
						flat.push(node);
					}
				}
				(flat, None)
			}
			Content::Hook(hook) => (Vec::new(), Some(hook)),
			Content::Empty => (Vec::new(), None),
		};
		if nodes.is_empty() {
			nodes.push(self.placeholder());
		}
		Ok(Materialized { nodes, hook })
	}

	fn mount(&self, view: &View) -> Vec<NodeId> {
		let nodes = self.document_mut().mount(view);
		self.own(&nodes);
		nodes
	}

	/// Runs a materialized hook with the first rendered node.
	pub(crate) fn run_hook(&self, materialized: &Materialized) {
		if let (Some(hook), Some(first)) = (&materialized.hook, materialized.nodes.first()) {
			hook(self, *first);
		}
	}

	/// Replaces the range's nodes with `nodes` in the tree.
	///
	/// A range that is no longer tracked is left alone. A range whose nodes
	/// have no parent any more is torn down instead. Owned nodes the range
	/// lost are retired.
	pub(crate) fn commit(&self, range: RangeId, nodes: Vec<NodeId>) -> LiveResult<()> {
		let teardowns = {
			let mut doc = self.inner.document.borrow_mut();
			let mut registry = self.inner.registry.borrow_mut();
			if !registry.contains(range) {
				tracing::trace!(range = ?range, "commit skipped; range already torn down");
				return Ok(());
			}
			let kept: HashSet<NodeId> = nodes.iter().copied().collect();
			match registry.replace(&mut doc, range, nodes) {
				Ok(update) => {
					self.retire(update.old.into_iter().filter(|node| !kept.contains(node)));
					update.torn_down
				}
				Err(LiveError::DetachedAnchor(_)) => {
					tracing::debug!(range = ?range, "range lost its parent; tearing down");
					registry.unregister(range)
				}
				Err(err) => return Err(err),
			}
		};
		Self::run_teardowns(teardowns);
		Ok(())
	}
}

//! Observable collections.
//!
//! `ObservableList<T>` owns a vector and emits a [`ListEvent`] for every edit.
//! Edits change the data immediately; a list created with
//! [`ObservableList::batched`] defers only the events while a batch is open on
//! its queue, preserving their order.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::signal::{Listener, ListenerSet};
use super::{Computed, Observable, Signal, Subscription};
use crate::queue::UpdateQueue;

/// One edit of an [`ObservableList`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEvent<T> {
	/// `items` were inserted starting at `index`.
	Insert {
		/// Position of the first inserted item.
		index: usize,
		/// Inserted items, in order.
		items: Vec<T>,
	},
	/// `count` items were removed starting at `index`.
	Remove {
		/// Position of the first removed item.
		index: usize,
		/// Number of removed items.
		count: usize,
	},
	/// `item` moved from `from` to `to`.
	Move {
		/// The moved item.
		item: T,
		/// Old position.
		from: usize,
		/// New position.
		to: usize,
	},
	/// The item at `index` was replaced.
	Set {
		/// Position of the replaced item.
		index: usize,
		/// New item.
		item: T,
	},
	/// The whole content was replaced.
	Reset {
		/// New content.
		items: Vec<T>,
	},
}

struct ListInner<T: 'static> {
	items: RefCell<Vec<T>>,
	listeners: ListenerSet<ListEvent<T>>,
	queue: Option<UpdateQueue>,
}

/// A reactive vector. Cloning shares the list; equality is identity.
pub struct ObservableList<T: 'static> {
	inner: Rc<ListInner<T>>,
}

impl<T: 'static> Clone for ObservableList<T> {
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
		}
	}
}

impl<T: 'static> PartialEq for ObservableList<T> {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.inner, &other.inner)
	}
}

impl<T: Clone + 'static> ObservableList<T> {
	/// Creates a list that emits events synchronously.
	pub fn new(items: impl IntoIterator<Item = T>) -> Self {
		Self::build(items.into_iter().collect(), None)
	}

	/// Creates a list whose events are deferred while a batch is open on
	/// `queue`.
	pub fn batched(queue: &UpdateQueue, items: impl IntoIterator<Item = T>) -> Self {
		Self::build(items.into_iter().collect(), Some(queue.clone()))
	}

	fn build(items: Vec<T>, queue: Option<UpdateQueue>) -> Self {
		Self {
			inner: Rc::new(ListInner {
				items: RefCell::new(items),
				listeners: ListenerSet::new(),
				queue,
			}),
		}
	}

	/// Number of items.
	pub fn len(&self) -> usize {
		self.inner.items.borrow().len()
	}

	/// Returns true if the list has no items.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Returns a copy of the item at `index`.
	pub fn get(&self, index: usize) -> Option<T> {
		self.inner.items.borrow().get(index).cloned()
	}

	/// Returns a copy of all items.
	pub fn to_vec(&self) -> Vec<T> {
		self.inner.items.borrow().clone()
	}

	/// Appends an item.
	pub fn push(&self, item: T) {
		let index = self.len();
		self.insert(index, item);
	}

	/// Removes and returns the last item.
	pub fn pop(&self) -> Option<T> {
		let index = self.len().checked_sub(1)?;
		self.remove(index)
	}

	/// Inserts an item at `index` (clamped to the length).
	pub fn insert(&self, index: usize, item: T) {
		self.splice(index, 0, vec![item]);
	}

	/// Removes and returns the item at `index`.
	pub fn remove(&self, index: usize) -> Option<T> {
		self.splice(index, 1, Vec::new()).into_iter().next()
	}

	/// Removes `delete` items at `index` and inserts `items` there.
	///
	/// Emits a `Remove` event followed by an `Insert` event; empty parts emit
	/// nothing. Returns the removed items.
	pub fn splice(&self, index: usize, delete: usize, items: Vec<T>) -> Vec<T> {
		let (index, removed) = {
			let mut current = self.inner.items.borrow_mut();
			let index = index.min(current.len());
			let end = index.saturating_add(delete).min(current.len());
			let removed: Vec<T> = current
				.splice(index..end, items.iter().cloned())
				.collect();
			(index, removed)
		};
		if !removed.is_empty() {
			self.dispatch(ListEvent::Remove {
				index,
				count: removed.len(),
			});
		}
		if !items.is_empty() {
			self.dispatch(ListEvent::Insert { index, items });
		}
		removed
	}

	/// Replaces the item at `index`. Out-of-range indices are ignored.
	pub fn set(&self, index: usize, item: T) {
		{
			let mut current = self.inner.items.borrow_mut();
			let Some(slot) = current.get_mut(index) else {
				return;
			};
			*slot = item.clone();
		}
		self.dispatch(ListEvent::Set { index, item });
	}

	/// Moves the item at `from` to `to`.
	pub fn move_item(&self, from: usize, to: usize) {
		let item = {
			let mut current = self.inner.items.borrow_mut();
			if from >= current.len() || to >= current.len() {
				return;
			}
			let item = current.remove(from);
			current.insert(to, item.clone());
			item
		};
		if from != to {
			self.dispatch(ListEvent::Move { item, from, to });
		}
	}

	/// Replaces the whole content.
	pub fn replace(&self, items: impl IntoIterator<Item = T>) {
		let items: Vec<T> = items.into_iter().collect();
		*self.inner.items.borrow_mut() = items.clone();
		self.dispatch(ListEvent::Reset { items });
	}

	/// Emits `event` without touching the data.
	pub fn dispatch(&self, event: ListEvent<T>) {
		match &self.inner.queue {
			Some(queue) if queue.is_batching() => {
				let weak = Rc::downgrade(&self.inner);
				queue.enqueue("list edited", move || {
					if let Some(inner) = weak.upgrade() {
						inner.listeners.emit(&event);
					}
				});
			}
			_ => self.inner.listeners.emit(&event),
		}
	}

	/// Registers an edit listener.
	pub fn on_edit(&self, listener: Listener<ListEvent<T>>) -> Subscription {
		let id = self.inner.listeners.add(listener);
		let weak = Rc::downgrade(&self.inner);
		Subscription::new(move || {
			if let Some(inner) = weak.upgrade() {
				inner.listeners.remove(id);
			}
		})
	}

	/// Number of registered edit listeners.
	pub fn edit_listener_count(&self) -> usize {
		self.inner.listeners.len()
	}

	/// Returns true if both handles share one list.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.inner, &other.inner)
	}
}

/// Observing a list as a value: every edit emits the full content.
impl<T: Clone + 'static> Observable<Vec<T>> for ObservableList<T> {
	fn get(&self) -> Vec<T> {
		self.to_vec()
	}

	fn subscribe(&self, listener: Listener<Vec<T>>) -> Subscription {
		let weak = Rc::downgrade(&self.inner);
		self.on_edit(Rc::new(move |_: &ListEvent<T>| {
			if let Some(inner) = weak.upgrade() {
				let items = inner.items.borrow().clone();
				listener(&items);
			}
		}))
	}
}

impl<T: fmt::Debug + 'static> fmt::Debug for ObservableList<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ObservableList")
			.field("items", &*self.inner.items.borrow())
			.field("listeners", &self.inner.listeners.len())
			.finish()
	}
}

/// Where a list binding reads its collection from.
///
/// The shape is resolved once per emission instead of being inspected inside the
/// reconciliation code.
pub enum ListSource<T: 'static> {
	/// A collection whose edit events are applied one by one.
	Collection(ObservableList<T>),
	/// A reactive value holding a collection. Emitting a different instance
	/// rebinds the edit listener to it.
	Reactive(Rc<dyn Observable<ObservableList<T>>>),
	/// A reactive plain vector. Every emission rebuilds the items.
	Values(Rc<dyn Observable<Vec<T>>>),
}

impl<T: 'static> Clone for ListSource<T> {
	fn clone(&self) -> Self {
		match self {
			Self::Collection(list) => Self::Collection(list.clone()),
			Self::Reactive(source) => Self::Reactive(source.clone()),
			Self::Values(source) => Self::Values(source.clone()),
		}
	}
}

impl<T: 'static> fmt::Debug for ListSource<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Collection(_) => f.write_str("ListSource::Collection"),
			Self::Reactive(_) => f.write_str("ListSource::Reactive"),
			Self::Values(_) => f.write_str("ListSource::Values"),
		}
	}
}

impl<T: Clone + 'static> From<ObservableList<T>> for ListSource<T> {
	fn from(list: ObservableList<T>) -> Self {
		Self::Collection(list)
	}
}

impl<T: Clone + 'static> From<Signal<ObservableList<T>>> for ListSource<T> {
	fn from(source: Signal<ObservableList<T>>) -> Self {
		Self::Reactive(Rc::new(source))
	}
}

impl<T: Clone + 'static> From<Computed<ObservableList<T>>> for ListSource<T> {
	fn from(source: Computed<ObservableList<T>>) -> Self {
		Self::Reactive(Rc::new(source))
	}
}

impl<T: Clone + 'static> From<Signal<Vec<T>>> for ListSource<T> {
	fn from(source: Signal<Vec<T>>) -> Self {
		Self::Values(Rc::new(source))
	}
}

impl<T: Clone + PartialEq + 'static> From<Computed<Vec<T>>> for ListSource<T> {
	fn from(source: Computed<Vec<T>>) -> Self {
		Self::Values(Rc::new(source))
	}
}

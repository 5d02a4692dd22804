//! Signal - shared reactive value
//!
//! `Signal<T>` holds a value and notifies its listeners whenever the value is
//! set. A signal created with [`Signal::batched`] is tied to an
//! [`UpdateQueue`]: while a batch is open on that queue, its notification is
//! deferred onto the queue and coalesced, so listeners see only the final
//! value of the batch.
//!
//! ## Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use reinhardt_live::reactive::{Observable, Signal};
//!
//! let count = Signal::new(0);
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let log = seen.clone();
//! let _sub = count.subscribe(Rc::new(move |v: &i32| log.borrow_mut().push(*v)));
//!
//! count.set(1);
//! count.update(|n| *n += 1);
//! assert_eq!(*seen.borrow(), vec![1, 2]);
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::{Observable, Subscription};
use crate::queue::UpdateQueue;

/// Listener callback shape shared by all sources.
pub type Listener<E> = Rc<dyn Fn(&E)>;

/// Ordered listener registry.
///
/// Emission works on a snapshot of the registrations and skips listeners
/// removed by an earlier listener of the same emission. No borrow is held
/// while a listener runs.
pub(crate) struct ListenerSet<E> {
	entries: RefCell<Vec<(u64, Listener<E>)>>,
	next_id: Cell<u64>,
}

impl<E: 'static> ListenerSet<E> {
	pub(crate) fn new() -> Self {
		Self {
			entries: RefCell::new(Vec::new()),
			next_id: Cell::new(0),
		}
	}

	pub(crate) fn add(&self, listener: Listener<E>) -> u64 {
		let id = self.next_id.get();
		self.next_id.set(id + 1);
		self.entries.borrow_mut().push((id, listener));
		id
	}

	pub(crate) fn remove(&self, id: u64) -> bool {
		let mut entries = self.entries.borrow_mut();
		let before = entries.len();
		entries.retain(|(entry, _)| *entry != id);
		entries.len() != before
	}

	pub(crate) fn len(&self) -> usize {
		self.entries.borrow().len()
	}

	pub(crate) fn emit(&self, event: &E) {
		let snapshot: Vec<(u64, Listener<E>)> = self.entries.borrow().clone();
		for (id, listener) in snapshot {
			let still_registered = self.entries.borrow().iter().any(|(entry, _)| *entry == id);
			if still_registered {
				listener(event);
			}
		}
	}
}

struct SignalInner<T> {
	value: RefCell<T>,
	listeners: ListenerSet<T>,
	queue: Option<UpdateQueue>,
	notify_scheduled: Cell<bool>,
}

/// A reactive value. Cloning shares the value and its listeners.
pub struct Signal<T: 'static> {
	inner: Rc<SignalInner<T>>,
}

impl<T: 'static> Clone for Signal<T> {
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
		}
	}
}

impl<T: Clone + 'static> Signal<T> {
	/// Creates a signal that notifies synchronously.
	pub fn new(value: T) -> Self {
		Self::build(value, None)
	}

	/// Creates a signal whose notifications are deferred while a batch is
	/// open on `queue`.
	pub fn batched(queue: &UpdateQueue, value: T) -> Self {
		Self::build(value, Some(queue.clone()))
	}

	fn build(value: T, queue: Option<UpdateQueue>) -> Self {
		Self {
			inner: Rc::new(SignalInner {
				value: RefCell::new(value),
				listeners: ListenerSet::new(),
				queue,
				notify_scheduled: Cell::new(false),
			}),
		}
	}

	/// Returns a copy of the current value.
	pub fn get(&self) -> T {
		self.inner.value.borrow().clone()
	}

	/// Reads the current value without cloning it.
	pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
		f(&self.inner.value.borrow())
	}

	/// Replaces the value and notifies listeners.
	pub fn set(&self, value: T) {
		*self.inner.value.borrow_mut() = value;
		self.notify();
	}

	/// Mutates the value in place and notifies listeners once.
	pub fn update(&self, f: impl FnOnce(&mut T)) {
		f(&mut self.inner.value.borrow_mut());
		self.notify();
	}

	/// Number of registered listeners.
	pub fn listener_count(&self) -> usize {
		self.inner.listeners.len()
	}

	/// Returns true if both handles share one signal.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.inner, &other.inner)
	}

	fn notify(&self) {
		match &self.inner.queue {
			Some(queue) if queue.is_batching() => {
				if self.inner.notify_scheduled.replace(true) {
					return;
				}
				let weak = Rc::downgrade(&self.inner);
				queue.enqueue("signal changed", move || {
					if let Some(inner) = weak.upgrade() {
						inner.notify_scheduled.set(false);
						Signal { inner }.emit();
					}
				});
			}
			_ => self.emit(),
		}
	}

	fn emit(&self) {
		let value = self.get();
		self.inner.listeners.emit(&value);
	}
}

impl<T: Clone + 'static> Observable<T> for Signal<T> {
	fn get(&self) -> T {
		Signal::get(self)
	}

	fn subscribe(&self, listener: Listener<T>) -> Subscription {
		let id = self.inner.listeners.add(listener);
		let weak: Weak<SignalInner<T>> = Rc::downgrade(&self.inner);
		Subscription::new(move || {
			if let Some(inner) = weak.upgrade() {
				inner.listeners.remove(id);
			}
		})
	}
}

impl<T: fmt::Debug + 'static> fmt::Debug for Signal<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Signal")
			.field("value", &*self.inner.value.borrow())
			.field("listeners", &self.inner.listeners.len())
			.finish()
	}
}

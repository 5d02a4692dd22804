//! Derived values.

use std::fmt;
use std::rc::Rc;
use std::cell::RefCell;

use super::signal::Listener;
use super::{Observable, Signal, Subscription};

struct ComputedInner<T: 'static> {
	output: Signal<T>,
	compute: Box<dyn Fn() -> T>,
	dependencies: RefCell<Vec<Subscription>>,
}

impl<T: Clone + PartialEq + 'static> ComputedInner<T> {
	fn recompute(&self) {
		let next = (self.compute)();
		let changed = self.output.with(|current| *current != next);
		if changed {
			self.output.set(next);
		}
	}
}

/// A value derived from other observables.
///
/// Dependencies are declared explicitly with [`Computed::track`]. When any of
/// them changes, the closure runs again and listeners are notified only if the
/// result differs from the previous one.
///
/// ```
/// use reinhardt_live::reactive::{Computed, Observable, Signal};
///
/// let first = Signal::new("Ada".to_string());
/// let greeting = Computed::new({
/// 	let first = first.clone();
/// 	move || format!("Hello, {}", first.get())
/// })
/// .track(&first);
///
/// first.set("Grace".to_string());
/// assert_eq!(greeting.get(), "Hello, Grace");
/// ```
pub struct Computed<T: 'static> {
	inner: Rc<ComputedInner<T>>,
}

impl<T: 'static> Clone for Computed<T> {
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
		}
	}
}

impl<T: Clone + PartialEq + 'static> Computed<T> {
	/// Evaluates `compute` once and wraps the result.
	pub fn new(compute: impl Fn() -> T + 'static) -> Self {
		let initial = compute();
		Self {
			inner: Rc::new(ComputedInner {
				output: Signal::new(initial),
				compute: Box::new(compute),
				dependencies: RefCell::new(Vec::new()),
			}),
		}
	}

	/// Recomputes whenever `dependency` changes.
	pub fn track<U: 'static>(self, dependency: &impl Observable<U>) -> Self {
		let weak = Rc::downgrade(&self.inner);
		let subscription = dependency.subscribe(Rc::new(move |_: &U| {
			if let Some(inner) = weak.upgrade() {
				inner.recompute();
			}
		}));
		self.inner.dependencies.borrow_mut().push(subscription);
		self
	}

	/// Number of tracked dependencies.
	pub fn dependency_count(&self) -> usize {
		self.inner.dependencies.borrow().len()
	}
}

impl<T: Clone + PartialEq + 'static> Observable<T> for Computed<T> {
	fn get(&self) -> T {
		self.inner.output.get()
	}

	fn subscribe(&self, listener: Listener<T>) -> Subscription {
		self.inner.output.subscribe(listener)
	}
}

impl<T: fmt::Debug + 'static> fmt::Debug for Computed<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Computed")
			.field("output", &self.inner.output)
			.field("dependencies", &self.inner.dependencies.borrow().len())
			.finish()
	}
}

//! Reactive sources consumed by the live binders.
//!
//! Binders only depend on the [`Observable`] trait: read the current value and
//! register a change listener that is released through a [`Subscription`].
//! The concrete sources here cover the shapes the binders accept:
//!
//! - [`Signal`]: a settable value
//! - [`Computed`]: a value derived from other observables
//! - [`ObservableList`]: a collection emitting [`ListEvent`]s
//! - [`ListSource`]: the tagged union a list binding is built from

mod computed;
mod list;
mod signal;
mod subscription;

pub use computed::Computed;
pub use list::{ListEvent, ListSource, ObservableList};
pub use signal::{Listener, Signal};
pub use subscription::Subscription;

/// A value that can be read and observed.
pub trait Observable<T: 'static> {
	/// Returns the current value.
	fn get(&self) -> T;

	/// Registers `listener`, called with the new value after each change.
	fn subscribe(&self, listener: Listener<T>) -> Subscription;
}

//! Listener registration handles.

use std::cell::RefCell;
use std::fmt;

/// Owns one listener registration on a reactive source.
///
/// The registration is released exactly once: by [`Subscription::unsubscribe`]
/// or when the handle is dropped, whichever comes first.
#[must_use = "dropping a Subscription removes its listener immediately"]
pub struct Subscription {
	release: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl Subscription {
	/// Wraps the function that removes the listener.
	pub fn new(release: impl FnOnce() + 'static) -> Self {
		Self {
			release: RefCell::new(Some(Box::new(release))),
		}
	}

	/// A subscription with nothing to release.
	pub fn empty() -> Self {
		Self {
			release: RefCell::new(None),
		}
	}

	/// Removes the listener. Later calls do nothing.
	pub fn unsubscribe(&self) {
		let release = self.release.borrow_mut().take();
		if let Some(release) = release {
			release();
		}
	}

	/// Returns true until the listener has been released.
	pub fn is_active(&self) -> bool {
		self.release.borrow().is_some()
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		self.unsubscribe();
	}
}

impl fmt::Debug for Subscription {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Subscription")
			.field("active", &self.is_active())
			.finish()
	}
}

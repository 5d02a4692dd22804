//! Update Queue
//!
//! The single serialization point for deferred tree mutations. Tasks run in
//! enqueue order. Outside of a batch, enqueueing a task flushes the queue
//! right away; inside a batch, tasks accumulate until the outermost batch is
//! closed.
//!
//! ## Re-entrancy
//!
//! A flush pops one task at a time and runs it with no borrow held, so a task
//! may enqueue more work or call [`UpdateQueue::flush`] itself. A nested flush
//! keeps draining the same queue; the tasks it runs are the ones the outer
//! flush would have run next.
//!
//! ## Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use reinhardt_live::UpdateQueue;
//!
//! let queue = UpdateQueue::new();
//! let log = Rc::new(RefCell::new(Vec::new()));
//!
//! queue.batch(|| {
//! 	let a = log.clone();
//! 	queue.enqueue("first", move || a.borrow_mut().push(1));
//! 	let b = log.clone();
//! 	queue.enqueue("second", move || b.borrow_mut().push(2));
//! 	assert!(log.borrow().is_empty());
//! });
//!
//! assert_eq!(*log.borrow(), vec![1, 2]);
//! ```

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

/// A deferred unit of work.
pub type Task = Box<dyn FnOnce()>;

struct Pending {
	reason: Cow<'static, str>,
	run: Task,
}

struct QueueInner {
	tasks: RefCell<VecDeque<Pending>>,
	batch_depth: Cell<usize>,
	flush_depth: Cell<usize>,
	ran: Cell<usize>,
	max_flush_tasks: Cell<usize>,
	idle_hook: RefCell<Option<Rc<dyn Fn()>>>,
}

/// Ordered queue of deferred updates. Cloning shares the queue.
#[derive(Clone)]
pub struct UpdateQueue {
	inner: Rc<QueueInner>,
}

impl fmt::Debug for UpdateQueue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("UpdateQueue")
			.field("len", &self.len())
			.field("batch_depth", &self.inner.batch_depth.get())
			.field("flushing", &self.is_flushing())
			.finish()
	}
}

impl Default for UpdateQueue {
	fn default() -> Self {
		Self::new()
	}
}

impl UpdateQueue {
	/// Creates an empty queue with the default task bound.
	pub fn new() -> Self {
		Self::with_max_flush_tasks(crate::LiveSettings::default().max_flush_tasks)
	}

	/// Creates an empty queue that abandons a flush after `max` tasks.
	pub fn with_max_flush_tasks(max: usize) -> Self {
		Self {
			inner: Rc::new(QueueInner {
				tasks: RefCell::new(VecDeque::new()),
				batch_depth: Cell::new(0),
				flush_depth: Cell::new(0),
				ran: Cell::new(0),
				max_flush_tasks: Cell::new(max),
				idle_hook: RefCell::new(None),
			}),
		}
	}

	/// Schedules `task`. `reason` is only used for diagnostics.
	///
	/// When no batch is open and no flush is running, the queue is flushed
	/// before this call returns.
	pub fn enqueue<F>(&self, reason: impl Into<Cow<'static, str>>, task: F)
	where
		F: FnOnce() + 'static,
	{
		let reason = reason.into();
		tracing::trace!(reason = %reason, "update enqueued");
		self.inner.tasks.borrow_mut().push_back(Pending {
			reason,
			run: Box::new(task),
		});
		if !self.is_batching() && !self.is_flushing() {
			self.flush();
		}
	}

	/// Runs queued tasks until the queue is empty.
	///
	/// The outermost flush also runs the idle hook once the queue drains, and
	/// keeps going if the hook scheduled more work.
	pub fn flush(&self) {
		let outermost = self.inner.flush_depth.get() == 0;
		if outermost {
			self.inner.ran.set(0);
		}
		self.inner.flush_depth.set(self.inner.flush_depth.get() + 1);

		loop {
			while let Some(task) = self.pop() {
				let ran = self.inner.ran.get() + 1;
				self.inner.ran.set(ran);
				if ran > self.inner.max_flush_tasks.get() {
					let dropped = self.inner.tasks.borrow_mut().drain(..).count() + 1;
					tracing::error!(
						reason = %task.reason,
						dropped,
						limit = self.inner.max_flush_tasks.get(),
						"update flush exceeded its task limit; remaining updates dropped"
					);
					break;
				}
				tracing::trace!(reason = %task.reason, "applying update");
				(task.run)();
			}

			if !outermost {
				break;
			}
			let hook = self.inner.idle_hook.borrow().clone();
			if let Some(hook) = hook {
				hook();
			}
			if self.inner.tasks.borrow().is_empty() {
				break;
			}
		}

		self.inner.flush_depth.set(self.inner.flush_depth.get() - 1);
	}

	fn pop(&self) -> Option<Pending> {
		self.inner.tasks.borrow_mut().pop_front()
	}

	/// Opens a batch. Batches nest.
	pub fn start_batch(&self) {
		self.inner.batch_depth.set(self.inner.batch_depth.get() + 1);
	}

	/// Closes a batch. Closing the outermost batch flushes the queue unless a
	/// flush is already running further up the stack.
	pub fn stop_batch(&self) {
		let depth = self.inner.batch_depth.get();
		if depth == 0 {
			tracing::warn!("stop_batch called without a matching start_batch");
			return;
		}
		self.inner.batch_depth.set(depth - 1);
		if depth == 1 && !self.is_flushing() {
			self.flush();
		}
	}

	/// Runs `f` inside a batch.
	pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
		self.start_batch();
		let result = f();
		self.stop_batch();
		result
	}

	/// Returns true while a batch is open.
	pub fn is_batching(&self) -> bool {
		self.inner.batch_depth.get() > 0
	}

	/// Returns true while a flush is running.
	pub fn is_flushing(&self) -> bool {
		self.inner.flush_depth.get() > 0
	}

	/// Number of queued tasks.
	pub fn len(&self) -> usize {
		self.inner.tasks.borrow().len()
	}

	/// Returns true if nothing is queued.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Installs the hook run after each outermost flush.
	pub fn set_idle_hook(&self, hook: impl Fn() + 'static) {
		*self.inner.idle_hook.borrow_mut() = Some(Rc::new(hook));
	}

	/// Changes the per-flush task bound.
	pub fn set_max_flush_tasks(&self, max: usize) {
		self.inner.max_flush_tasks.set(max);
	}

	/// Returns true if both handles share one queue.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.inner, &other.inner)
	}
}

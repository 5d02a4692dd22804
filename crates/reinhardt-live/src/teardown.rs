//! Teardown Detector
//!
//! Decides which live regions are gone for good after the tree has been
//! mutated. The document records the root of every subtree removed from the
//! attached tree; when the detector runs, roots that were re-attached in the
//! meantime (relocations) are skipped. For the remaining roots it collects
//!
//! - the element watchers installed by attribute bindings whose element lies
//!   under a removed root, and
//! - the node ranges anchored under a removed root (see
//!   [`NodeRangeRegistry::teardown_check`]).
//!
//! Every callback is handed out once and forgotten, so running the detector
//! again never fires a teardown twice.

use std::collections::BTreeMap;
use std::fmt;

use crate::dom::{Document, NodeId};
use crate::registry::{NodeRangeRegistry, Teardown};

/// Handle to a removal watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WatchId(u64);

struct Watcher {
	node: NodeId,
	callback: Teardown,
}

/// Removal watchers and the detection pass.
#[derive(Default)]
pub struct TeardownDetector {
	watchers: BTreeMap<WatchId, Watcher>,
	next_id: u64,
}

impl fmt::Debug for TeardownDetector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TeardownDetector")
			.field("watchers", &self.watchers.len())
			.finish()
	}
}

impl TeardownDetector {
	/// Creates a detector with no watchers.
	pub fn new() -> Self {
		Self::default()
	}

	/// Calls `callback` once `node` has been permanently removed from the
	/// document.
	pub fn watch(&mut self, node: NodeId, callback: Teardown) -> WatchId {
		let id = WatchId(self.next_id);
		self.next_id += 1;
		self.watchers.insert(id, Watcher { node, callback });
		id
	}

	/// Drops a watcher without calling it. Returns false if it was already
	/// gone.
	pub fn dispose(&mut self, id: WatchId) -> bool {
		self.watchers.remove(&id).is_some()
	}

	/// Returns true if the watcher is installed.
	pub fn is_watching(&self, id: WatchId) -> bool {
		self.watchers.contains_key(&id)
	}

	/// Number of installed watchers.
	pub fn len(&self) -> usize {
		self.watchers.len()
	}

	/// Returns true if no watcher is installed.
	pub fn is_empty(&self) -> bool {
		self.watchers.is_empty()
	}

	/// Drains the document's removal record and collects the teardowns of
	/// everything that went with the removed subtrees.
	pub fn detect(&mut self, doc: &mut Document, registry: &mut NodeRangeRegistry) -> Vec<Teardown> {
		let roots: Vec<NodeId> = doc
			.take_removed()
			.into_iter()
			.filter(|root| !doc.is_attached(*root))
			.collect();
		if roots.is_empty() {
			return Vec::new();
		}

		let gone: Vec<WatchId> = self
			.watchers
			.iter()
			.filter(|(_, w)| !doc.is_attached(w.node) && roots.iter().any(|r| doc.contains(*r, w.node)))
			.map(|(id, _)| *id)
			.collect();
		let mut teardowns: Vec<Teardown> = gone
			.into_iter()
			.filter_map(|id| self.watchers.remove(&id))
			.map(|w| w.callback)
			.collect();

		for root in &roots {
			teardowns.extend(registry.teardown_check(doc, *root));
		}
		if !teardowns.is_empty() {
			tracing::debug!(roots = roots.len(), teardowns = teardowns.len(), "detached regions torn down");
		}
		teardowns
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use std::cell::Cell;
	use std::rc::Rc;

	fn counter() -> (Rc<Cell<usize>>, Teardown) {
		let calls = Rc::new(Cell::new(0));
		let c = calls.clone();
		(calls, Box::new(move || c.set(c.get() + 1)))
	}

	fn run(teardowns: Vec<Teardown>) {
		for teardown in teardowns {
			teardown();
		}
	}

	#[rstest]
	fn test_removed_ancestor_fires_watcher_once() {
		let mut doc = Document::new();
		let mut registry = NodeRangeRegistry::default();
		let mut detector = TeardownDetector::new();
		let outer = doc.create_element("div");
		let inner = doc.create_element("span");
		doc.append_child(doc.body(), outer).unwrap();
		doc.append_child(outer, inner).unwrap();
		let (calls, callback) = counter();
		detector.watch(inner, callback);

		doc.remove(outer).unwrap();
		run(detector.detect(&mut doc, &mut registry));
		run(detector.detect(&mut doc, &mut registry));

		assert_eq!(calls.get(), 1);
		assert!(detector.is_empty());
	}

	#[rstest]
	fn test_relocation_does_not_fire() {
		let mut doc = Document::new();
		let mut registry = NodeRangeRegistry::default();
		let mut detector = TeardownDetector::new();
		let a = doc.create_element("div");
		let b = doc.create_element("div");
		doc.append_child(doc.body(), a).unwrap();
		doc.append_child(doc.body(), b).unwrap();
		let (calls, callback) = counter();
		detector.watch(a, callback);

		// removed, then put back before detection runs
		doc.remove(a).unwrap();
		doc.append_child(b, a).unwrap();
		run(detector.detect(&mut doc, &mut registry));

		assert_eq!(calls.get(), 0);
		assert_eq!(detector.len(), 1);
	}

	#[rstest]
	fn test_disposed_watcher_never_fires() {
		let mut doc = Document::new();
		let mut registry = NodeRangeRegistry::default();
		let mut detector = TeardownDetector::new();
		let div = doc.create_element("div");
		doc.append_child(doc.body(), div).unwrap();
		let (calls, callback) = counter();
		let id = detector.watch(div, callback);

		assert!(detector.dispose(id));
		assert!(!detector.dispose(id));
		doc.remove(div).unwrap();
		run(detector.detect(&mut doc, &mut registry));

		assert_eq!(calls.get(), 0);
		assert!(!detector.is_watching(id));
	}

	#[rstest]
	fn test_ranges_under_removed_root_are_unregistered() {
		let mut doc = Document::new();
		let mut registry = NodeRangeRegistry::default();
		let mut detector = TeardownDetector::new();
		let div = doc.create_element("div");
		let text = doc.create_text("x");
		doc.append_child(doc.body(), div).unwrap();
		doc.append_child(div, text).unwrap();
		let range = registry.create(vec![text]);
		let (calls, callback) = counter();
		registry.register(range, Some(callback), None).unwrap();

		doc.remove(div).unwrap();
		run(detector.detect(&mut doc, &mut registry));

		assert_eq!(calls.get(), 1);
		assert!(registry.is_empty());
	}
}

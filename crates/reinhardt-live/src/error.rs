//! Error types for the live-binding engine.
//!
//! None of these errors is fatal to a [`Live`](crate::Live) session. Binders
//! turn most of them into logged no-ops scoped to the region that produced
//! them, so unrelated regions keep rendering correctly.

use thiserror::Error;

use crate::dom::NodeId;
use crate::registry::RangeId;

/// Result type for live-binding operations.
pub type LiveResult<T> = Result<T, LiveError>;

/// Live-binding errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LiveError {
	/// The node handle does not belong to the document.
	#[error("unknown node: {0:?}")]
	UnknownNode(NodeId),

	/// The node exists but is not an element.
	#[error("node {0:?} is not an element")]
	NotAnElement(NodeId),

	/// The range is not (or no longer) tracked by the registry.
	#[error("unknown node range: {0:?}")]
	UnknownRange(RangeId),

	/// The range's nodes have no parent to be replaced under.
	#[error("node range {0:?} has no attached anchor")]
	DetachedAnchor(RangeId),

	/// A reference or removed node is not a child of the given parent.
	#[error("node {child:?} is not a child of {parent:?}")]
	NotAChild {
		/// Expected parent.
		parent: NodeId,
		/// Offending node.
		child: NodeId,
	},

	/// Inserting the node would make it its own ancestor.
	#[error("cannot insert {child:?} into its own subtree at {parent:?}")]
	HierarchyRequest {
		/// Insertion parent.
		parent: NodeId,
		/// Node being inserted.
		child: NodeId,
	},

	/// Settings could not be parsed.
	#[error("invalid live settings: {0}")]
	Settings(#[from] toml::de::Error),
}

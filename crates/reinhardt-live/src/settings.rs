//! Session settings.
//!
//! Settings are plain data with serde defaults so they can be embedded in a
//! project's TOML configuration:
//!
//! ```toml
//! placeholder = "comment"
//! max_flush_tasks = 5000
//! ```

use serde::Deserialize;

use crate::error::LiveResult;

/// Kind of node that holds the position of a range with no content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderKind {
	/// An empty text node (invisible in serialized markup).
	#[default]
	Text,
	/// A comment node, visible when inspecting the tree.
	Comment,
}

/// Settings for a [`Live`](crate::Live) session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LiveSettings {
	/// Placeholder node kind for empty ranges.
	pub placeholder: PlaceholderKind,
	/// Maximum number of tasks one outermost flush may run.
	///
	/// Exceeding it means an update keeps re-scheduling itself; the flush is
	/// abandoned and the remaining tasks are dropped.
	pub max_flush_tasks: usize,
}

impl Default for LiveSettings {
	fn default() -> Self {
		Self {
			placeholder: PlaceholderKind::Text,
			max_flush_tasks: 10_000,
		}
	}
}

impl LiveSettings {
	/// Parses settings from a TOML document. Missing keys use defaults.
	pub fn from_toml_str(source: &str) -> LiveResult<Self> {
		Ok(toml::from_str(source)?)
	}
}

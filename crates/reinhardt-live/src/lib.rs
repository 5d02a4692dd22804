//! Reinhardt Live - live-binding reconciliation engine
//!
//! Keeps regions of a document tree in sync with reactive sources. A region is
//! a contiguous run of sibling nodes tracked as a *node range*; binders replace
//! a range's nodes when their source changes and tear the range down, releasing
//! every listener it installed, once its nodes leave the document for good.
//!
//! ## Features
//!
//! - **Scalar binders**: text, html, single attributes and attribute sets
//! - **List reconciliation**: per-item ranges; moved items keep their nodes
//! - **Batched updates**: every deferred mutation goes through one [`UpdateQueue`]
//! - **Deterministic teardown**: nested ranges are released innermost first
//!
//! ## Architecture
//!
//! - [`dom`]: in-memory document tree, markup parsing and attribute setters
//! - [`reactive`]: signals, computed values and observable lists
//! - [`registry`]: the [`NodeRangeRegistry`] holding every live range
//! - [`teardown`]: the [`TeardownDetector`] for permanently removed nodes
//! - [`queue`]: the [`UpdateQueue`] and batching
//! - [`binding`]: the binders, as methods on [`Live`]
//!
//! ## Example
//!
//! ```
//! use reinhardt_live::{BindOptions, Content, ItemScope, Live, ListOptions};
//!
//! let live = Live::new();
//! let (title, items) = {
//! 	let mut doc = live.document_mut();
//! 	let body = doc.body();
//! 	let title = doc.create_text("");
//! 	let items = doc.create_text("");
//! 	doc.append_child(body, title).unwrap();
//! 	doc.append_child(body, items).unwrap();
//! 	(title, items)
//! };
//!
//! let heading = live.signal("Todo".to_string());
//! let todos = live.observable_list(["write docs"]);
//! live.text(title, heading.clone(), BindOptions::new()).unwrap();
//! live.list(
//! 	items,
//! 	todos.clone(),
//! 	|scope: &ItemScope<&'static str>| Content::markup(format!("<li>{}</li>", scope.item)),
//! 	ListOptions::new(),
//! )
//! .unwrap();
//!
//! live.batch(|| {
//! 	heading.set("Today".to_string());
//! 	todos.push("ship it");
//! });
//!
//! let body = live.document().body();
//! assert_eq!(
//! 	live.document().inner_html(body),
//! 	"Today<li>write docs</li><li>ship it</li>"
//! );
//! ```

pub mod binding;
mod content;
pub mod dom;
mod error;
mod live;
pub mod queue;
pub mod reactive;
pub mod registry;
mod settings;
pub mod teardown;

pub use binding::{AttrBinding, BindOptions, EmptyRenderer, ItemScope, ListOptions};
pub use content::{Content, Hook};
pub use dom::{Document, NodeId, View};
pub use error::{LiveError, LiveResult};
pub use live::{Live, WeakLive};
pub use queue::UpdateQueue;
pub use registry::{NodeRangeRegistry, RangeId, Teardown};
pub use settings::{LiveSettings, PlaceholderKind};
pub use teardown::{TeardownDetector, WatchId};

//! In-memory document model used by the live binders.
//!
//! - [`Document`]: node arena with DOM-like mutation semantics
//! - [`View`]: declarative content that can be mounted into a document
//! - [`parse_fragment`]: markup to views
//! - [`AttrSetters`]: special-cased attribute assignment

pub mod document;
pub mod markup;
pub mod special_attrs;
pub mod view;

pub use document::{Document, ElementData, NodeId, NodeKind, escape_attr, escape_text};
pub use markup::parse_fragment;
pub use special_attrs::{
	AttrSetter, AttrSetters, is_boolean_attr, is_boolean_attr_truthy, parse_style_declarations,
};
pub use view::{ElementView, IntoView, View, is_void_element};

//! XML and HTML documents as a mutable arena tree, with CSS queries.
//!
//! sapling provides:
//! - **Parsing**: xml5ever and html5ever with error recovery, from text or
//!   from bytes in any encoding `encoding_rs` knows
//! - **Querying**: `css` / `at_css`, matched by the `selectors` crate
//! - **Editing**: sibling insertion, indexed child insertion, removal, and
//!   attribute and content edits, each validated before the tree changes
//! - **Serialization**: XML or HTML5 markup for any subtree
//!
//! # Example
//!
//! ```rust
//! use sapling::parse_xml;
//!
//! let mut doc = parse_xml(
//!     "<all_item><item><title>item0</title></item><item><title>item1</title></item></all_item>",
//! )
//! .unwrap();
//!
//! let items = doc.css("item").unwrap();
//! doc.add_prev_sibling(items[0], items[1]).unwrap();
//!
//! assert_eq!(
//!     doc.to_xml(),
//!     "<all_item><item><title>item1</title></item><item><title>item0</title></item></all_item>"
//! );
//!
//! let root = doc.root().unwrap();
//! assert_eq!(root.at_css("title").unwrap().unwrap().content(), "item1");
//! ```
//!
//! Nodes are addressed by [`NodeId`]. Ids stay valid across edits and only
//! mean something to the document that issued them; a [`NodeRef`] borrows
//! the document for reading.

#[macro_use]
mod tracing_macros;

mod document;
pub mod encoding;
mod error;
mod mutate;
mod node;
mod parser;
mod query;
pub mod selector;
pub mod serialize;

pub use document::{Document, DocumentKind, ElementData, NodeId, NodeKind};
pub use error::{Error, MutationError, ParseError, Result, SelectorError, SelectorErrorKind};
pub use node::NodeRef;
pub use parser::{
    ParseOptions, parse_html, parse_html_bytes, parse_html_with, parse_xml, parse_xml_bytes,
    parse_xml_with,
};
pub use selector::SelectorList;
pub use serialize::{SerializeOptions, Syntax};

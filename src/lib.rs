//! Structured type catalogs from loosely formatted documentation comments.
//!
//! Three parts cooperate through a [`TypeCatalog`]:
//! - a parser for compact type specs (`list(int), optional`),
//! - an attribute-block parser for indented `name : spec` blocks,
//! - a merge engine that reconciles partial declarations of one named type
//!   written under different channels (create, read, write).
//!
//! ```
//! use doc_typereg::{Channel, TypeCatalog};
//!
//! let mut catalog = TypeCatalog::new();
//! catalog.parse_multi("owner : Person\n    name : str", Channel::Read).unwrap();
//! catalog.parse_multi("owner : Person\n    name : str\n    email : str", Channel::Write).unwrap();
//! catalog.merge_pending().unwrap();
//!
//! let person = catalog.ty(catalog.get("Person").unwrap());
//! assert_eq!(person.fields().len(), 2);
//! assert!(person.field("email").unwrap().params.contains("write"));
//! ```
pub mod alias;
pub mod block;
pub mod catalog;
pub mod channel;
pub mod config;
pub mod cursor;
mod deref;
pub mod emit;
pub mod error;
pub mod grammar;
pub mod lines;
mod merge;
pub mod model;
pub mod render;

pub use block::{BlockParser, Entries, Entry};
pub use catalog::TypeCatalog;
pub use channel::Channel;
pub use config::Config;
pub use error::{Error, Result};
pub use model::{Base, Kind, Literal, Node, Params, Type, TypeId, TypeRef};

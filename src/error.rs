//! Error taxonomy for parsing, registration, merging and dereferencing.
//!
//! Every variant is a hard failure: a bad declaration is an authoring bug to be
//! fixed upstream, so nothing here is recovered locally. Lookups that may
//! legitimately miss (`get`, `resolve_alias`) return `Option` instead.

use std::collections::BTreeSet;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The type-spec grammar rejected the input, or trailing text remained.
    #[error("invalid type specification at column {column}: {message} (near {context:?})")]
    InvalidSpecification {
        message: String,
        /// 1-based column into the text handed to the parser.
        column: usize,
        context: String,
    },

    #[error("alias conflict for {alias:?}: {reason}")]
    AliasConflict { alias: String, reason: String },

    #[error("conflicting base kinds for type {name:?}: {}", join_set(bases))]
    BaseMismatch { name: String, bases: BTreeSet<String> },

    #[error("conflicting declarations of field {field:?} in type {type_name:?}: {left} != {right}")]
    FieldConflict {
        type_name: String,
        field: String,
        left: String,
        right: String,
    },

    #[error("unresolved type reference {0:?}")]
    UnresolvedReference(String),

    #[error("structure violation: {0}")]
    StructureViolation(String),

    #[error("type {0:?} is already registered")]
    DuplicateType(String),

    #[error("invalid configuration at {path}: {message}")]
    Config { path: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build an `InvalidSpecification` pointing at byte offset `pos` of `text`.
    pub fn invalid_spec(text: &str, pos: usize, message: impl Into<String>) -> Self {
        let pos = floor_char_boundary(text, pos.min(text.len()));
        let start = floor_char_boundary(text, pos.saturating_sub(10));
        let end = floor_char_boundary(text, (pos + 10).min(text.len()));
        Error::InvalidSpecification {
            message: message.into(),
            column: text[..pos].chars().count() + 1,
            context: text[start..end].to_string(),
        }
    }

    pub fn structure(message: impl Into<String>) -> Self {
        Error::StructureViolation(message.into())
    }
}

fn join_set(set: &BTreeSet<String>) -> String {
    set.iter().cloned().collect::<Vec<_>>().join(", ")
}

fn floor_char_boundary(s: &str, mut i: usize) -> usize {
    while i > 0 && !s.is_char_boundary(i) { i -= 1; }
    i
}

//! Type trees back to type-spec text.
//!
//! The output of `render_node` parses back (via `parse_declaration`) to an
//! equivalent type with equal qualifiers.

use crate::catalog::TypeCatalog;
use crate::model::{Kind, Node, Params, TypeId};

pub fn render_type(catalog: &TypeCatalog, id: TypeId) -> String {
    let ty = catalog.ty(catalog.follow(id));
    match ty.kind() {
        Kind::Constant => ty.literal().map(ToString::to_string).unwrap_or_else(|| ty.name.clone()),
        Kind::List | Kind::Reference => match ty.inner() {
            Some(inner) => format!("{}({})", ty.name, render_type(catalog, inner.id())),
            None => ty.name.clone(),
        },
        Kind::OneOf | Kind::Union => {
            let alts = ty.alternatives();
            if alts.is_empty() {
                return ty.name.clone();
            }
            let sep = if ty.kind() == Kind::OneOf { " | " } else { " & " };
            let parts: Vec<String> = alts.iter().map(|n| render_type(catalog, n.id())).collect();
            format!("({})", parts.join(sep))
        }
        Kind::Scalar | Kind::AnonRecord | Kind::Record | Kind::Extension | Kind::Unknown => ty.name.clone(),
    }
}

/// `, key` for true flags, `, key: value` otherwise.
pub fn render_params(params: &Params) -> String {
    let mut out = String::new();
    for (key, value) in params.iter() {
        match value.as_bool() {
            Some(true) => out.push_str(&format!(", {key}")),
            _ => out.push_str(&format!(", {key}: {value}")),
        }
    }
    out
}

pub fn render_node(catalog: &TypeCatalog, node: &Node) -> String {
    match node {
        Node::Type(id) => render_type(catalog, *id),
        Node::Ref(r) => format!("{}{}", render_type(catalog, r.ty), render_params(&r.params)),
    }
}

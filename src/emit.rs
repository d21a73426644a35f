//! Catalog dump as JSON, for renderers that want structured data.
//!
//! Named types are emitted once at the top level and referenced elsewhere
//! with `{"$ref": name}`, so cyclic graphs print finitely.

use serde_json::{json, Map, Value};

use crate::catalog::TypeCatalog;
use crate::model::{Kind, Node, Params, TypeId, TypeRef};

/// Every canonical type keyed by name, names sorted case-insensitively.
pub fn catalog_json(catalog: &TypeCatalog) -> Value {
    let mut names: Vec<&str> = catalog.names().collect();
    names.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()).then(a.cmp(b)));
    let mut out = Map::new();
    for name in names {
        if let Some(id) = catalog.get(name) {
            out.insert(name.to_string(), definition_json(catalog, id));
        }
    }
    Value::Object(out)
}

/// Full definition of a named type.
pub fn definition_json(catalog: &TypeCatalog, id: TypeId) -> Value {
    let ty = catalog.ty(catalog.follow(id));
    let mut o = json!({ "base": ty.base.as_str(), "name": ty.name });
    if let Some(doc) = &ty.doc {
        o["doc"] = Value::from(doc.clone());
    }
    match ty.kind() {
        Kind::Record => {
            o["fields"] = Value::Array(ty.fields().iter().map(|f| field_json(catalog, f)).collect());
        }
        Kind::Extension => {
            if let Some(inner) = ty.inner() {
                o["value"] = node_json(catalog, inner);
            }
        }
        _ => return type_json(catalog, id),
    }
    if let Some(source) = ty.meta.get("source") {
        o["source"] = Value::from(source.clone());
    }
    o
}

/// Inline view of a type; named types become references.
pub fn type_json(catalog: &TypeCatalog, id: TypeId) -> Value {
    let ty = catalog.ty(catalog.follow(id));
    let mut o = match ty.kind() {
        Kind::Scalar => json!({ "type": ty.name }),
        Kind::Constant => json!({
            "type": ty.name,
            "const": ty.literal().map(|l| l.to_json()).unwrap_or(Value::Null),
        }),
        Kind::List => {
            let mut o = json!({ "type": "list" });
            if let Some(inner) = ty.inner() { o["items"] = node_json(catalog, inner); }
            o
        }
        Kind::Reference => {
            let mut o = json!({ "type": "reference" });
            if let Some(inner) = ty.inner() { o["target"] = node_json(catalog, inner); }
            o
        }
        Kind::OneOf | Kind::Union => {
            let key = if ty.kind() == Kind::OneOf { "oneOf" } else { "allOf" };
            let mut o = Map::new();
            o.insert(key.into(), Value::Array(ty.alternatives().iter().map(|n| node_json(catalog, n)).collect()));
            Value::Object(o)
        }
        Kind::AnonRecord => json!({
            "type": "record",
            "fields": ty.fields().iter().map(|f| field_json(catalog, f)).collect::<Vec<_>>(),
        }),
        Kind::Record | Kind::Extension => return json!({ "$ref": ty.name }),
        Kind::Unknown => return json!({ "unresolved": ty.name }),
    };
    if let Some(doc) = &ty.doc {
        o["doc"] = Value::from(doc.clone());
    }
    o
}

pub fn node_json(catalog: &TypeCatalog, node: &Node) -> Value {
    match node {
        Node::Type(id) => type_json(catalog, *id),
        Node::Ref(r) => site_json(catalog, r),
    }
}

fn field_json(catalog: &TypeCatalog, field: &TypeRef) -> Value {
    let mut o = Map::new();
    if let Some(name) = &field.name {
        o.insert("name".into(), Value::from(name.clone()));
    }
    if let Value::Object(site) = site_json(catalog, field) {
        o.extend(site);
    }
    Value::Object(o)
}

fn site_json(catalog: &TypeCatalog, site: &TypeRef) -> Value {
    let mut o = json!({ "type": type_json(catalog, site.ty) });
    if let Some(doc) = &site.doc {
        o["doc"] = Value::from(doc.clone());
    }
    if !site.params.is_empty() {
        o["params"] = params_json(&site.params);
    }
    o
}

pub fn params_json(params: &Params) -> Value {
    Value::Object(params.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
}

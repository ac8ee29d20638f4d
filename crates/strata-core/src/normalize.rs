//! Reshape store rows into canonical [`ToolkitRecord`]s.
//!
//! The store embeds related rows in whatever shape its join produced: a
//! to-one relation may arrive as an object, a one-element array or nothing,
//! and tag/tech/language links arrive as join rows wrapping the entity
//! (`{ "tech": { "name": "react" } }`). Every shape is funnelled through
//! [`Relation`] so the rest of the engine only ever sees one record layout.
//!
//! Normalization never fails. Wrongly-typed fields degrade to `None` or an
//! empty list; rows that are not objects or carry no usable id are skipped.

use crate::models::{SubcategoryRef, ToolkitId, ToolkitRecord, TypeRef};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// A related entity as embedded by the store.
#[derive(Debug, Clone, Copy)]
pub enum Relation<'a> {
    One(&'a Value),
    Many(&'a [Value]),
    Absent,
}

impl<'a> Relation<'a> {
    pub fn of(value: Option<&'a Value>) -> Self {
        match value {
            Some(Value::Array(items)) => Relation::Many(items),
            Some(Value::Null) | None => Relation::Absent,
            Some(value) => Relation::One(value),
        }
    }

    /// The single related entity: the value itself, or the first array
    /// element. Only objects count as entities.
    pub fn first(self) -> Option<&'a Map<String, Value>> {
        match self {
            Relation::One(value) => value.as_object(),
            Relation::Many(items) => items.first().and_then(Value::as_object),
            Relation::Absent => None,
        }
    }

    /// Every element, for one-to-many relations. A lone object counts as a
    /// one-element list; a lone scalar is not a relation.
    pub fn all(self) -> &'a [Value] {
        match self {
            Relation::One(value) if value.is_object() => std::slice::from_ref(value),
            Relation::One(_) => &[],
            Relation::Many(items) => items,
            Relation::Absent => &[],
        }
    }
}

/// Join tables and the key of the entity inside each join row.
const TAG_JOIN: (&str, &str) = ("library_tags", "tag");
const TECH_JOIN: (&str, &str) = ("library_tech", "tech");
const LANGUAGE_JOIN: (&str, &str) = ("library_languages", "language");

/// Look up the first present key among `keys` (store name, canonical name).
fn field<'a>(row: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| row.get(*key))
        .find(|value| !value.is_null())
}

fn string_field(row: &Map<String, Value>, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn id_field(row: &Map<String, Value>) -> Option<ToolkitId> {
    match row.get("id")? {
        Value::Number(n) => n.as_i64().map(ToolkitId::Int),
        Value::String(s) if !s.is_empty() => Some(ToolkitId::Text(s.clone())),
        _ => None,
    }
}

fn type_ref(entity: &Map<String, Value>) -> TypeRef {
    TypeRef {
        id: id_field(entity),
        name: string_field(entity, "name"),
        slug: string_field(entity, "slug"),
    }
}

fn subcategory_ref(entity: &Map<String, Value>) -> SubcategoryRef {
    SubcategoryRef {
        id: id_field(entity),
        name: string_field(entity, "name"),
        slug: string_field(entity, "slug"),
        kind: Relation::of(field(entity, &["types", "type"]))
            .first()
            .map(type_ref),
    }
}

/// Name of one linked entity: a join row (`{ tech: { name } }`), a bare
/// entity (`{ name }`) or a plain string.
fn linked_name(item: &Value, entity_key: &str) -> Option<String> {
    let name = match item {
        Value::String(name) => Some(name.clone()),
        Value::Object(row) => match row.get(entity_key) {
            Some(entity) => Relation::of(Some(entity))
                .first()
                .and_then(|e| string_field(e, "name")),
            None => string_field(row, "name"),
        },
        _ => None,
    };
    name.filter(|n| !n.trim().is_empty())
}

/// Flatten a join relation into unique names, first-seen order.
fn linked_names(row: &Map<String, Value>, (join, entity_key): (&str, &str), canonical: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for item in Relation::of(field(row, &[join, canonical])).all() {
        match linked_name(item, entity_key) {
            Some(name) if !names.contains(&name) => names.push(name),
            Some(_) => {}
            None => debug!("Dropping {} link without a related entity", canonical),
        }
    }
    names
}

/// Normalize one store row (or an already-canonical record).
pub fn normalize_row(row: &Value) -> Option<ToolkitRecord> {
    let Some(row) = row.as_object() else {
        warn!("Skipping toolkit row that is not an object");
        return None;
    };
    let Some(id) = id_field(row) else {
        warn!(
            "Skipping toolkit row without an id (name: {:?})",
            string_field(row, "name")
        );
        return None;
    };

    Some(ToolkitRecord {
        name: string_field(row, "name").unwrap_or_default(),
        url: string_field(row, "url").unwrap_or_default(),
        description: string_field(row, "description"),
        pricing: string_field(row, "pricing"),
        image: string_field(row, "image"),
        subcategory: Relation::of(field(row, &["subcategories", "subcategory"]))
            .first()
            .map(subcategory_ref),
        tech: linked_names(row, TECH_JOIN, "tech"),
        tags: linked_names(row, TAG_JOIN, "tags"),
        languages: linked_names(row, LANGUAGE_JOIN, "languages"),
        id,
    })
}

/// Normalize a batch. Bad rows are dropped individually.
pub fn normalize_rows(rows: &[Value]) -> Vec<ToolkitRecord> {
    let records: Vec<ToolkitRecord> = rows.iter().filter_map(normalize_row).collect();
    if records.len() != rows.len() {
        warn!(
            "Normalized {} of {} toolkit rows",
            records.len(),
            rows.len()
        );
    }
    records
}

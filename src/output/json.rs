use std::io::Write;

use indexmap::IndexMap;
use serde_json::{Map, Value as Json};

use crate::error::{Error, Result};
use crate::value::Row;

/// Field names for nested output derived from plain headers.
///
/// Each of the first `levels` headers is followed by the name of its child
/// collection: the next header plus `s`, or `<header>-group` for the
/// innermost level.
pub fn derive_fields(headers: &[String], levels: usize, key_count: usize) -> Result<Vec<String>> {
    if levels == 0 {
        return Ok(headers.to_vec());
    }
    if levels > key_count {
        return Err(Error::runtime(format!(
            "invalid levels value {}: at most {} allowed",
            levels, key_count
        )));
    }

    let mut fields = Vec::with_capacity(headers.len() + levels);
    for (i, header) in headers.iter().enumerate() {
        fields.push(header.clone());
        if i + 1 == levels {
            fields.push(format!("{}-group", header));
        } else if i < levels {
            let next = headers.get(i + 1).map(String::as_str).unwrap_or_default();
            fields.push(format!("{}s", next));
        }
    }
    Ok(fields)
}

/// One distinct key value at some level.
struct Bucket {
    object: Map<String, Json>,
    child_field: String,
    children: Children,
}

enum Children {
    Nested(IndexMap<String, Bucket>),
    Leaves(Vec<Json>),
}

fn field(fields: &[String], i: usize) -> String {
    fields.get(i).cloned().unwrap_or_default()
}

fn insert(buckets: &mut IndexMap<String, Bucket>, row: &Row, level: usize, levels: usize, fields: &[String]) {
    let field_idx = level * 2;
    let key = row.get(level).map(|cell| cell.render()).unwrap_or_default();

    let bucket = buckets.entry(key.clone()).or_insert_with(|| Bucket {
        object: Map::from_iter([(field(fields, field_idx), Json::String(key))]),
        child_field: field(fields, field_idx + 1),
        children: if level + 1 == levels {
            Children::Leaves(Vec::new())
        } else {
            Children::Nested(IndexMap::new())
        },
    });

    match &mut bucket.children {
        Children::Leaves(items) => {
            let names = fields.get(field_idx + 2..).unwrap_or_default();
            let leaf: Map<String, Json> = names
                .iter()
                .zip(row.iter().skip(level + 1))
                .map(|(name, cell)| (name.clone(), cell.to_json()))
                .collect();
            items.push(Json::Object(leaf));
        }
        Children::Nested(next) => insert(next, row, level + 1, levels, fields),
    }
}

fn unwrap(buckets: IndexMap<String, Bucket>) -> Json {
    Json::Array(
        buckets
            .into_values()
            .map(|mut bucket| {
                let children = match bucket.children {
                    Children::Leaves(items) => Json::Array(items),
                    Children::Nested(next) => unwrap(next),
                };
                bucket.object.insert(bucket.child_field, children);
                Json::Object(bucket.object)
            })
            .collect(),
    )
}

/// Headers extended with `colN` names for unlabelled columns.
fn positional_names(headers: &[String], width: usize) -> Vec<String> {
    let mut names = headers.to_vec();
    names.extend((headers.len()..width).map(|i| format!("col{}", i)));
    names
}

/// Build the output document.
///
/// With explicit field names the nesting depth is the number of names
/// beyond the row width. Otherwise names come from `derive_fields`.
pub fn build_document(
    headers: &[String],
    rows: &[Row],
    explicit: bool,
    levels: usize,
    key_count: usize,
) -> Result<Json> {
    let Some(first) = rows.first() else {
        return Ok(Json::Array(Vec::new()));
    };

    let (fields, levels) = if explicit {
        let levels = headers.len().checked_sub(first.len()).ok_or_else(|| {
            Error::runtime(format!(
                "invalid JSON fields: expected at least {}",
                first.len()
            ))
        })?;
        (headers.to_vec(), levels)
    } else {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let headers = positional_names(headers, width);
        (derive_fields(&headers, levels, key_count)?, levels)
    };

    if levels == 0 {
        let objects = rows
            .iter()
            .map(|row| {
                Json::Object(
                    fields
                        .iter()
                        .zip(row)
                        .map(|(name, cell)| (name.clone(), cell.to_json()))
                        .collect(),
                )
            })
            .collect();
        return Ok(Json::Array(objects));
    }

    let mut buckets = IndexMap::new();
    for row in rows {
        insert(&mut buckets, row, 0, levels, &fields);
    }
    Ok(unwrap(buckets))
}

/// Write rows as a single-line JSON array.
pub fn write_json<W: Write>(
    out: &mut W,
    headers: &[String],
    rows: &[Row],
    explicit: bool,
    levels: usize,
    key_count: usize,
) -> Result<()> {
    let document = build_document(headers, rows, explicit, levels, key_count)?;
    serde_json::to_writer(&mut *out, &document)?;
    writeln!(out)?;
    Ok(())
}

//! Flattening of hierarchical documents into rows.
//!
//! Key paths are dot separated; `\.` is a literal dot inside a segment.
//! The requested paths form a tree. The first node with more than one
//! child is the grouping point: every object reached there becomes its own
//! output row, and all values collected below it land in that row.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde_json::{Map, Value as Json};

use crate::value::{MultiText, Row, Value, is_simple, scalar_text};

/// Split a key path on unescaped dots.
pub fn split_key(key: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = key.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'.') => {
                current.push('.');
                chars.next();
            }
            '.' => segments.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    segments.push(current);
    segments
}

/// Append a segment to a path, escaping dots in the segment.
pub fn join_key(prefix: &str, segment: &str) -> String {
    let escaped = segment.replace('.', "\\.");
    if prefix.is_empty() {
        escaped
    } else {
        format!("{}.{}", prefix, escaped)
    }
}

/// Canonical spelling of a key path.
pub fn normalize_key(key: &str) -> String {
    split_key(key)
        .iter()
        .fold(String::new(), |path, segment| join_key(&path, segment))
}

/// Trie over key path segments.
#[derive(Debug, Default)]
pub struct KeyTree {
    children: IndexMap<String, KeyTree>,
    /// A requested path ends here.
    leaf: bool,
    /// Canonical path of this node.
    path: String,
}

impl KeyTree {
    pub fn new(keys: &[String]) -> Self {
        let mut root = Self::default();
        for key in keys {
            root.insert(key);
        }
        root
    }

    fn insert(&mut self, key: &str) {
        let mut node = self;
        for segment in split_key(key) {
            let path = join_key(&node.path, &segment);
            node = node.children.entry(segment).or_insert_with(|| KeyTree {
                path,
                ..KeyTree::default()
            });
        }
        node.leaf = true;
    }
}

/// Values collected per canonical key path.
type Collected = IndexMap<String, Vec<Json>>;

/// Result of walking one subtree.
#[derive(Default)]
struct Walk {
    values: Collected,
    /// One entry per object found at the grouping point.
    groups: Vec<Collected>,
}

impl Walk {
    fn push(&mut self, path: &str, value: Json) {
        self.values.entry(path.to_string()).or_default().push(value);
    }

    fn absorb(&mut self, other: Walk) {
        for (path, values) in other.values {
            self.values.entry(path).or_default().extend(values);
        }
        self.groups.extend(other.groups);
    }
}

/// `depth` is 0 above the grouping point, 1 at it, and counts up below.
fn walk(object: &Map<String, Json>, node: &KeyTree, depth: usize) -> Walk {
    let depth = match depth {
        0 if node.children.len() > 1 => 1,
        0 => 0,
        d => d + 1,
    };

    let mut out = Walk::default();
    for (key, child) in &node.children {
        let Some(value) = object.get(key) else {
            continue;
        };
        let items = match value {
            Json::Array(items) => items.as_slice(),
            other => std::slice::from_ref(other),
        };
        for item in items {
            match item {
                Json::Object(inner) if !child.children.is_empty() => {
                    out.absorb(walk(inner, child, depth));
                    if child.leaf {
                        out.push(&child.path, item.clone());
                    }
                }
                other => out.push(&child.path, other.clone()),
            }
        }
    }

    if depth == 1 {
        Walk {
            values: Collected::new(),
            groups: vec![out.values],
        }
    } else {
        out
    }
}

/// Flatten one document into rows with one cell per key.
///
/// With a grouping point each group is a row. Otherwise a single key fans
/// out into one row per value, and several keys give one row.
pub fn flatten_document(document: &Json, tree: &KeyTree, keys: &[String]) -> Vec<Row> {
    let Json::Object(object) = document else {
        return Vec::new();
    };
    let result = walk(object, tree, 0);
    let paths: Vec<String> = keys.iter().map(|k| normalize_key(k)).collect();

    if !result.groups.is_empty() {
        return result
            .groups
            .iter()
            .map(|group| paths.iter().map(|p| cell(group.get(p))).collect())
            .collect();
    }

    match paths.as_slice() {
        [single] => result
            .values
            .get(single)
            .into_iter()
            .flatten()
            .map(|value| vec![Value::from_json(value.clone())])
            .collect(),
        _ if result.values.is_empty() => Vec::new(),
        _ => vec![paths.iter().map(|p| cell(result.values.get(p))).collect()],
    }
}

/// Collapse collected values into a cell.
fn cell(values: Option<&Vec<Json>>) -> Value {
    match values.map(Vec::as_slice) {
        None | Some([]) => Value::Text(String::new()),
        Some([single]) => Value::from_json(single.clone()),
        Some(many) if many.iter().all(is_simple) => {
            Value::MultiText(many.iter().map(scalar_text).collect::<MultiText>())
        }
        Some(many) => Value::Structured(Json::Array(many.to_vec())),
    }
}

/// Every key path present in the documents, sorted and de-duplicated.
pub fn discover_keys<'a>(documents: impl IntoIterator<Item = &'a Json>) -> Vec<String> {
    let mut keys = BTreeSet::new();
    for document in documents {
        if let Json::Object(object) = document {
            collect_keys("", object, &mut keys);
        }
    }
    keys.into_iter().collect()
}

fn collect_keys(prefix: &str, object: &Map<String, Json>, keys: &mut BTreeSet<String>) {
    for (key, value) in object {
        let path = join_key(prefix, key);
        match value {
            Json::Object(inner) => collect_keys(&path, inner, keys),
            Json::Array(items) => {
                for item in items {
                    if let Json::Object(inner) = item {
                        collect_keys(&path, inner, keys);
                    }
                }
            }
            _ => {}
        }
        keys.insert(path);
    }
}

/// Display form of a discovered path: quoted when it holds an escaped dot.
pub fn display_key(path: &str) -> String {
    if path.contains("\\.") {
        format!("'{}'", path)
    } else {
        path.to_string()
    }
}

/// Value at a key path. Missing paths give an empty string; paths that
/// cross arrays give the list of values found.
pub fn lookup(document: &Json, segments: &[String]) -> Json {
    let Some((first, rest)) = segments.split_first() else {
        return document.clone();
    };
    match document {
        Json::Object(object) => match object.get(first) {
            Some(value) => lookup(value, rest),
            None => Json::String(String::new()),
        },
        Json::Array(items) => Json::Array(
            items
                .iter()
                .filter(|item| item.is_object())
                .map(|item| lookup(item, segments))
                .collect(),
        ),
        _ => Json::String(String::new()),
    }
}

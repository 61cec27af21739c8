//! Data model for cells flowing through the pipeline.
//!
//! The core types are:
//! - `Value`: a typed cell (integer, float, text, set of texts, or a raw
//!   structured document fragment)
//! - `MultiText`: an insertion-ordered set of distinct strings
//! - `Row`: an ordered sequence of cells

use std::fmt;

use indexmap::IndexSet;
use serde::Serialize;
use serde::ser::{SerializeSeq, Serializer};
use serde_json::Value as Json;

/// A row of cells.
pub type Row = Vec<Value>;

/// A single cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
    MultiText(MultiText),
    /// A list or map taken verbatim from a structured document.
    Structured(Json),
}

/// Distinct strings in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct MultiText {
    values: IndexSet<String>,
}

impl MultiText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning false when it was already present.
    pub fn insert(&mut self, value: impl Into<String>) -> bool {
        self.values.insert(value.into())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Join all values with `delimiter`.
    pub fn joined(&self, delimiter: &str) -> String {
        self.values().collect::<Vec<_>>().join(delimiter)
    }
}

impl<S: Into<String>> FromIterator<S> for MultiText {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Order matters: two sets are equal only when they list the same values in
/// the same order.
impl PartialEq for MultiText {
    fn eq(&self, other: &Self) -> bool {
        self.values.iter().eq(other.values.iter())
    }
}

impl Value {
    /// Build a cell from raw text, inferring a number when it parses as one.
    pub fn infer(text: &str) -> Value {
        if let Ok(n) = text.parse::<i64>() {
            return Value::Int(n);
        }
        match text.parse::<f64>() {
            Ok(n) if n.is_finite() => Value::Float(n),
            _ => Value::Text(text.to_string()),
        }
    }

    /// Convert a document fragment into a cell.
    pub fn from_json(json: Json) -> Value {
        match json {
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            Json::String(s) => Value::Text(s),
            Json::Bool(b) => Value::Text(b.to_string()),
            Json::Null => Value::Text(String::new()),
            other => Value::Structured(other),
        }
    }

    /// Convert into a document fragment for JSON output.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Int(n) => Json::from(*n),
            Value::Float(n) => Json::from(*n),
            Value::Text(s) => Json::String(s.clone()),
            Value::MultiText(set) => Json::Array(set.values().map(Json::from).collect()),
            Value::Structured(json) => json.clone(),
        }
    }

    /// Numeric view of the cell, parsing text when needed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            Value::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Integer view of the cell. Floats truncate.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Float(n) => Some(*n as i64),
            Value::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Render as text for delimited and table output.
    ///
    /// Floats print with two decimals, dropping a trailing `.00`. Sets join
    /// with commas. Structured values render as compact JSON.
    pub fn render(&self) -> String {
        match self {
            Value::Int(n) => n.to_string(),
            Value::Float(n) => format_float(*n),
            Value::Text(s) => s.clone(),
            Value::MultiText(set) => set.joined(","),
            Value::Structured(json) => scalar_text(json),
        }
    }
}

/// Two decimals, with an exact `.00` suffix stripped.
pub fn format_float(n: f64) -> String {
    let text = format!("{:.2}", n);
    match text.strip_suffix(".00") {
        Some(whole) => whole.to_string(),
        None => text,
    }
}

/// Text form of a document fragment: strings unquoted, null empty,
/// everything else compact JSON.
pub fn scalar_text(json: &Json) -> String {
    match json {
        Json::String(s) => s.clone(),
        Json::Null => String::new(),
        other => other.to_string(),
    }
}

/// True for document fragments that are neither lists nor maps.
pub fn is_simple(json: &Json) -> bool {
    !matches!(json, Json::Array(_) | Json::Object(_))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Float(n) => serializer.serialize_f64(*n),
            Value::Text(s) => serializer.serialize_str(s),
            Value::MultiText(set) => set.serialize(serializer),
            Value::Structured(json) => json.serialize(serializer),
        }
    }
}

impl Serialize for MultiText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.values.len()))?;
        for value in &self.values {
            seq.serialize_element(value)?;
        }
        seq.end()
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

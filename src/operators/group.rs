use indexmap::IndexMap;
use tracing::debug;

use crate::error::Result;
use crate::format::GroupDef;
use crate::pipeline::{Table, Transform};
use crate::value::{MultiText, Row, Value};

/// Joins key column texts into a single group key.
const KEY_SEPARATOR: &str = ":==:";

/// Groups rows by key columns and aggregates the rest.
///
/// Numeric columns are summed, anything else collects its distinct values.
/// The kind of each column is decided by the first value seen for it.
pub struct GroupBy {
    def: GroupDef,
    joiner: String,
}

impl GroupBy {
    pub fn new(def: GroupDef, joiner: impl Into<String>) -> Self {
        Self {
            def,
            joiner: joiner.into(),
        }
    }
}

/// Running aggregate for one value column.
#[derive(Debug, Clone)]
enum Slot {
    Empty,
    Int(i64),
    Float(f64),
    Set(MultiText),
}

impl Slot {
    fn add(&mut self, text: &str) {
        match self {
            Slot::Empty => {
                *self = match Value::infer(text) {
                    Value::Int(n) => Slot::Int(n),
                    Value::Float(n) => Slot::Float(n),
                    _ => Slot::Set(MultiText::from_iter([text])),
                };
            }
            Slot::Int(sum) => {
                if let Ok(n) = text.parse::<i64>() {
                    match sum.checked_add(n) {
                        Some(total) => *sum = total,
                        None => *self = Slot::Float(*sum as f64 + n as f64),
                    }
                } else if let Ok(n) = text.parse::<f64>() {
                    *self = Slot::Float(*sum as f64 + n);
                } else {
                    debug!(value = text, "skipping non-numeric value in numeric column");
                }
            }
            Slot::Float(sum) => match text.parse::<f64>() {
                Ok(n) => *sum += n,
                Err(_) => debug!(value = text, "skipping non-numeric value in numeric column"),
            },
            Slot::Set(set) => {
                set.insert(text);
            }
        }
    }

    fn into_value(self) -> Value {
        match self {
            Slot::Empty => Value::Text(String::new()),
            Slot::Int(n) => Value::Int(n),
            Slot::Float(n) => Value::Float(n),
            Slot::Set(set) => Value::MultiText(set),
        }
    }
}

struct Group {
    keys: Vec<String>,
    slots: Vec<Slot>,
    count: i64,
}

impl Transform for GroupBy {
    fn apply(&self, table: Table) -> Result<Table> {
        let Some(first) = table.rows.first() else {
            return Ok(table);
        };
        let width = first.len();
        let key_indices = self.def.key_range.positions_in_bounds(width);
        let value_indices: Vec<usize> = (0..width).filter(|i| !key_indices.contains(i)).collect();

        let mut groups: IndexMap<String, Group> = IndexMap::new();
        for row in &table.rows {
            let keys = pick(row, &key_indices);
            let group = groups
                .entry(keys.join(KEY_SEPARATOR))
                .or_insert_with(|| Group {
                    keys,
                    slots: vec![Slot::Empty; value_indices.len()],
                    count: 0,
                });
            for (slot, text) in group.slots.iter_mut().zip(pick(row, &value_indices)) {
                slot.add(&text);
            }
            group.count += 1;
        }

        let rows = groups
            .into_values()
            .map(|group| {
                let mut row: Row = group.keys.into_iter().map(Value::Text).collect();
                let values = group.slots.into_iter().map(Slot::into_value);
                if self.def.fold_row {
                    row.push(fold(values, &self.joiner));
                } else {
                    row.extend(values);
                }
                if self.def.show_count {
                    row.push(Value::Int(group.count));
                }
                row
            })
            .collect();

        let headers = if table.explicit_headers || table.headers.is_empty() {
            table.headers
        } else {
            self.headers(&table.headers, &key_indices, &value_indices)
        };

        Ok(Table {
            headers,
            rows,
            key_count: key_indices.len(),
            typed: true,
            ..table
        })
    }
}

impl GroupBy {
    /// Key labels first, then value labels, then `count`.
    fn headers(&self, source: &[String], keys: &[usize], values: &[usize]) -> Vec<String> {
        let label = |i: &usize| source.get(*i).cloned().unwrap_or_default();
        let mut headers: Vec<String> = keys.iter().map(label).collect();
        if self.def.fold_row {
            headers.push(values.iter().map(label).collect::<Vec<_>>().join("+"));
        } else {
            headers.extend(values.iter().map(label));
        }
        if self.def.show_count {
            headers.push("count".to_string());
        }
        headers
    }
}

/// Cell texts at `indices`; missing cells are empty.
fn pick(row: &Row, indices: &[usize]) -> Vec<String> {
    indices
        .iter()
        .map(|&i| row.get(i).map(Value::render).unwrap_or_default())
        .collect()
}

/// Fold aggregated values left to right: numbers add, anything else joins
/// as text.
fn fold(values: impl Iterator<Item = Value>, joiner: &str) -> Value {
    values
        .reduce(|acc, next| match (&acc, &next) {
            (Value::Int(a), Value::Int(b)) => match a.checked_add(*b) {
                Some(total) => Value::Int(total),
                None => Value::Float(*a as f64 + *b as f64),
            },
            (a, b) if a.is_number() && b.is_number() => {
                Value::Float(a.as_f64().unwrap_or_default() + b.as_f64().unwrap_or_default())
            }
            (a, b) => Value::Text(format!("{}{}{}", a.render(), joiner, b.render())),
        })
        .unwrap_or_else(|| Value::Text(String::new()))
}

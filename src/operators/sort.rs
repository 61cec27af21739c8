use std::cmp::Ordering;

use crate::error::Result;
use crate::format::SortDef;
use crate::pipeline::{Table, Transform};
use crate::value::{Row, Value};

/// Sorts rows by one or more key columns.
///
/// Rows that compare equal on every key keep their input order.
pub struct SortRows {
    def: SortDef,
}

impl SortRows {
    pub fn new(def: SortDef) -> Self {
        Self { def }
    }
}

impl Transform for SortRows {
    fn apply(&self, mut table: Table) -> Result<Table> {
        let Some(first) = table.rows.first() else {
            return Ok(table);
        };
        let keys = self.def.key_range.positions_in_bounds(first.len());

        if !table.typed {
            for row in &mut table.rows {
                for &i in &keys {
                    let converted = match row.get(i) {
                        Some(Value::Text(text)) => Value::infer(text),
                        _ => continue,
                    };
                    row[i] = converted;
                }
            }
        }

        let empty = Value::Text(String::new());
        let descending = self.def.descending;
        table.rows = merge_sort(table.rows, &|a: &Row, b: &Row| {
            for &i in &keys {
                let ordering = compare(a.get(i).unwrap_or(&empty), b.get(i).unwrap_or(&empty));
                let ordering = if descending {
                    ordering.reverse()
                } else {
                    ordering
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
        Ok(table)
    }
}

/// Compare two cells using the left cell's type.
///
/// An integer on the left reads the right as an integer (floats truncate,
/// unparseable text counts as -1). A float on the left reads the right as
/// a float (unparseable counts as -1.0). Anything else compares rendered
/// text. The result is not symmetric for mixed columns.
pub fn compare(left: &Value, right: &Value) -> Ordering {
    match left {
        Value::Int(a) => a.cmp(&right.as_i64().unwrap_or(-1)),
        Value::Float(a) => a.total_cmp(&right.as_f64().unwrap_or(-1.0)),
        _ => left.render().cmp(&right.render()),
    }
}

/// Stable merge sort. `compare` need not be a total order, which rules out
/// the standard library sorts.
fn merge_sort<T>(mut items: Vec<T>, compare: &impl Fn(&T, &T) -> Ordering) -> Vec<T> {
    if items.len() <= 1 {
        return items;
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(items, compare);
    let right = merge_sort(right, compare);

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    loop {
        let take_right = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => compare(r, l) == Ordering::Less,
            (Some(_), None) => false,
            (None, Some(_)) => true,
            (None, None) => break,
        };
        let next = if take_right { right.next() } else { left.next() };
        merged.extend(next);
    }
    merged
}

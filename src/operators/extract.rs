use std::collections::BTreeMap;

use crate::format::ColumnTransform;
use crate::range::IndexRange;

/// Selects columns from a record and applies `tr` rewrites to them.
pub struct Extract<'a> {
    col_range: &'a IndexRange,
    transforms: &'a BTreeMap<usize, Vec<ColumnTransform>>,
}

impl<'a> Extract<'a> {
    pub fn new(
        col_range: &'a IndexRange,
        transforms: &'a BTreeMap<usize, Vec<ColumnTransform>>,
    ) -> Self {
        Self {
            col_range,
            transforms,
        }
    }

    /// Extract a data record. Missing columns become empty strings.
    pub fn record(&self, fields: &[String]) -> Vec<String> {
        let mut out = Vec::with_capacity(fields.len());
        for (field, index) in self.col_range.select(fields) {
            let field = field.map(String::as_str).unwrap_or_default();
            match self.transforms_for(index) {
                Some(transforms) => {
                    let (word, added) = rewrite(field, transforms);
                    out.push(word);
                    out.extend(added);
                }
                None => out.push(field.to_string()),
            }
        }
        out
    }

    /// Extract the header record. Labels are selected by the column range
    /// but never rewritten; a column added by `tr` repeats its source label.
    pub fn header(&self, fields: &[String]) -> Vec<String> {
        let mut out = Vec::with_capacity(fields.len());
        for (field, index) in self.col_range.select(fields) {
            let label = field.cloned().unwrap_or_default();
            let added = self
                .transforms_for(index)
                .map_or(0, |ts| ts.iter().filter(|t| t.add_as_new_column).count());
            out.extend(std::iter::repeat_n(label, added + 1));
        }
        out
    }

    fn transforms_for(&self, index: i64) -> Option<&'a [ColumnTransform]> {
        let index = usize::try_from(index).ok()?;
        self.transforms.get(&index).map(Vec::as_slice)
    }
}

/// Apply a column's rewrites in order.
///
/// Returns the final cell text and the texts of any added columns.
pub fn rewrite(field: &str, transforms: &[ColumnTransform]) -> (String, Vec<String>) {
    let mut word = field.to_string();
    let mut added = Vec::new();

    for transform in transforms {
        let mut text = word.clone();

        if !transform.split.is_empty() {
            let parts = split_literal(&text, &transform.split);
            let parts = match &transform.sub_range {
                Some(range) => range
                    .select(&parts)
                    .into_iter()
                    .map(|(part, _)| part.cloned().unwrap_or_default())
                    .collect(),
                None => parts,
            };
            text = parts.join(transform.merge.as_deref().unwrap_or(","));
        }
        if let Some(prefix) = &transform.prefix {
            text.insert_str(0, prefix);
        }
        if let Some(suffix) = &transform.suffix {
            text.push_str(suffix);
        }
        if let Some(wrap) = &transform.wrap {
            text = format!("{wrap}{text}{wrap}");
        }

        if transform.add_as_new_column {
            added.push(text);
        } else {
            word = text;
        }
    }

    (word, added)
}

/// Split on a literal separator. An empty separator splits into characters.
pub fn split_literal(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        text.chars().map(String::from).collect()
    } else {
        text.split(separator).map(str::to_string).collect()
    }
}

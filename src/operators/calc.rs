use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::warn;

use crate::error::{Error, Result};
use crate::expr::{Bindings, Scalar, parse_expression};
use crate::format::CalcDef;
use crate::pipeline::{Table, Transform};
use crate::value::{Row, Value};

/// Matches a `[N]` column placeholder.
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+)\]").expect("placeholder pattern is valid"));

impl CalcDef {
    /// Compile `calc(...)` text. `[N]` refers to column `N` of the row.
    pub fn compile(source: &str) -> Result<Self> {
        let mut columns = Vec::new();
        let mut invalid = None;
        let rewritten = PLACEHOLDER.replace_all(source, |caps: &Captures| {
            match caps[1].parse::<usize>() {
                Ok(index) => {
                    if !columns.contains(&index) {
                        columns.push(index);
                    }
                    variable_name(index)
                }
                Err(_) => {
                    invalid.get_or_insert_with(|| caps[0].to_string());
                    String::new()
                }
            }
        });
        if let Some(placeholder) = invalid {
            return Err(Error::runtime(format!(
                "invalid column placeholder {} in calc",
                placeholder
            )));
        }
        let expr = parse_expression(&rewritten).map_err(Error::runtime)?;
        Ok(Self {
            source: source.to_string(),
            expr,
            columns,
        })
    }

    /// Evaluate against a row. Evaluation failures become the error text.
    pub fn evaluate(&self, row: &Row) -> Value {
        let bindings: Bindings = self
            .columns
            .iter()
            .filter_map(|&i| {
                row.get(i)
                    .map(|value| (variable_name(i), Scalar::from_value(value)))
            })
            .collect();

        match self.expr.eval(&bindings) {
            Ok(result) => result.into_value(),
            Err(err) => {
                warn!(expression = %self.source, error = %err, "calc evaluation failed");
                Value::Text(err.to_string())
            }
        }
    }

    /// Header label: the expression with placeholders replaced by the
    /// labels of the columns they refer to.
    pub fn header(&self, headers: &[String]) -> String {
        PLACEHOLDER
            .replace_all(&self.source, |caps: &Captures| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| headers.get(i).cloned())
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

fn variable_name(index: usize) -> String {
    format!("col{}", index)
}

/// Appends one computed column per `calc(...)`.
pub struct Calculate {
    defs: Vec<CalcDef>,
}

impl Calculate {
    pub fn new(defs: Vec<CalcDef>) -> Self {
        Self { defs }
    }

    /// Extend a single row in place.
    pub fn extend_row(&self, row: &mut Row) {
        let computed: Vec<Value> = self.defs.iter().map(|def| def.evaluate(row)).collect();
        row.extend(computed);
    }

    /// Extend a header row with expression labels.
    pub fn extend_headers(&self, headers: &mut Vec<String>) {
        let labels: Vec<String> = self.defs.iter().map(|def| def.header(headers)).collect();
        headers.extend(labels);
    }
}

impl Transform for Calculate {
    fn apply(&self, mut table: Table) -> Result<Table> {
        for row in &mut table.rows {
            self.extend_row(row);
        }
        if !table.explicit_headers && !table.headers.is_empty() {
            self.extend_headers(&mut table.headers);
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_row(s: &str) -> Row {
        s.split_whitespace().map(Value::from).collect()
    }

    fn labels(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn compile_records_columns() {
        let def = CalcDef::compile("([2]/[3])+1/3").unwrap();
        assert_eq!(def.columns, vec![2, 3]);
    }

    #[test]
    fn evaluate_ratio() {
        let def = CalcDef::compile("([2]/[3])+1/3").unwrap();
        let value = def.evaluate(&text_row("topic3 0 26984839 26984839 0"));
        assert_eq!(value.render(), "1.33");
    }

    #[test]
    fn evaluate_sum_is_integer() {
        let def = CalcDef::compile("[2]+[3]").unwrap();
        assert_eq!(def.evaluate(&text_row("t 0 21 21")), Value::Int(42));
    }

    #[test]
    fn evaluation_error_becomes_text() {
        let def = CalcDef::compile("[0]*2").unwrap();
        let value = def.evaluate(&text_row("topic"));
        assert_eq!(value, Value::from("cannot apply '*' to text"));
    }

    #[test]
    fn missing_column_is_error_text() {
        let def = CalcDef::compile("[9]+1").unwrap();
        let value = def.evaluate(&text_row("1 2"));
        assert_eq!(value, Value::from("no value bound to 'col9'"));
    }

    #[test]
    fn invalid_expression_fails_to_compile() {
        assert!(CalcDef::compile("[1] +").is_err());
    }

    #[test]
    fn oversized_placeholder_fails_to_compile() {
        let err = CalcDef::compile("[99999999999999999999]+1").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid column placeholder [99999999999999999999] in calc"
        );
    }

    #[test]
    fn header_substitutes_labels() {
        let def = CalcDef::compile("([2]/[3])+1/3").unwrap();
        let headers = labels("TOPIC PARTITION CURRENT-OFFSET LOG-END-OFFSET");
        assert_eq!(def.header(&headers), "(CURRENT-OFFSET/LOG-END-OFFSET)+1/3");
    }

    #[test]
    fn header_keeps_unknown_placeholder() {
        let def = CalcDef::compile("[7]*2").unwrap();
        assert_eq!(def.header(&labels("A B")), "[7]*2");
    }

    #[test]
    fn apply_appends_columns_and_headers() {
        let table = Table::new(labels("A B"), vec![text_row("1 2"), text_row("3 4")]);
        let calc = Calculate::new(vec![
            CalcDef::compile("[0]+[1]").unwrap(),
            CalcDef::compile("[1]*10").unwrap(),
        ]);
        let result = calc.apply(table).unwrap();
        assert_eq!(result.headers, labels("A B A+B B*10"));
        assert_eq!(result.rows[0][2], Value::Int(3));
        assert_eq!(result.rows[1][3], Value::Int(40));
    }

    #[test]
    fn one_column_per_expression_on_every_row() {
        let rows = vec![text_row("1 2 3"), text_row("4 5 6"), text_row("7 8 9")];
        let table = Table::new(labels("A B C"), rows);
        let result = Calculate::new(vec![CalcDef::compile("[0]*[2]").unwrap()])
            .apply(table)
            .unwrap();
        assert_eq!(result.headers.len(), 4);
        assert!(result.rows.iter().all(|row| row.len() == 4));
        let computed: Vec<String> = result.rows.iter().map(|row| row[3].render()).collect();
        assert_eq!(computed, vec!["3", "24", "63"]);
    }
}

//! Input readers: delimited records and structured documents.

use std::io::BufRead;

use serde::Deserialize;
use serde_json::Value as Json;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::format::Split;
use crate::operators::split_literal;

/// Break a line into fields.
pub fn split_line(line: &str, split: &Split) -> Vec<String> {
    match split {
        Split::Whitespace => line.split_whitespace().map(str::to_string).collect(),
        Split::Literal(separator) => split_literal(line, separator),
        Split::Csv => parse_csv_line(line),
    }
}

fn parse_csv_line(line: &str) -> Vec<String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    match reader.records().next() {
        Some(Ok(record)) => record.iter().map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

/// Feed every record of the input to `f`, in order.
///
/// CSV input is read as a stream so quoted fields may span lines; malformed
/// records are skipped.
pub fn for_each_record<R: BufRead>(
    input: R,
    split: &Split,
    mut f: impl FnMut(Vec<String>) -> Result<()>,
) -> Result<()> {
    match split {
        Split::Csv => {
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_reader(input);
            for (i, record) in reader.records().enumerate() {
                match record {
                    Ok(record) => f(record.iter().map(str::to_string).collect())?,
                    Err(err) if err.is_io_error() => return Err(err.into()),
                    Err(err) => warn!(record = i + 1, error = %err, "skipping malformed record"),
                }
            }
        }
        other => {
            for line in input.lines() {
                f(split_line(&line?, other))?;
            }
        }
    }
    Ok(())
}

/// Turn a parsed root into documents: an object is one document, an array
/// contributes its objects.
fn documents_from_root(root: Json) -> Result<Vec<Json>> {
    match root {
        Json::Object(_) => Ok(vec![root]),
        Json::Array(items) => Ok(items
            .into_iter()
            .filter(|item| {
                let keep = item.is_object();
                if !keep {
                    debug!("skipping non-object array element");
                }
                keep
            })
            .collect()),
        Json::Null => Ok(Vec::new()),
        _ => Err(Error::runtime(
            "document root must be an object or an array of objects",
        )),
    }
}

/// Parse a whole JSON input.
pub fn parse_json_documents(text: &str) -> Result<Vec<Json>> {
    let root: Json = serde_json::from_str(text)
        .map_err(|e| Error::at_input(format!("invalid JSON: {}", e), e.line()))?;
    documents_from_root(root)
}

/// Parse a YAML stream; every `---` separated document is read.
pub fn parse_yaml_documents(text: &str) -> Result<Vec<Json>> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let root = Json::deserialize(document).map_err(|e| {
            let err = Error::runtime(format!("invalid YAML: {}", e));
            match e.location() {
                Some(location) => err.with_input_line(location.line()),
                None => err,
            }
        })?;
        documents.extend(documents_from_root(root)?);
    }
    Ok(documents)
}

/// Parse one line of JSON-lines input. Lines that are not a JSON object or
/// array give `None`.
pub fn parse_json_line(line: &str) -> Option<Vec<Json>> {
    match serde_json::from_str::<Json>(line) {
        Ok(root @ (Json::Object(_) | Json::Array(_))) => documents_from_root(root).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(input: &str, split: &Split) -> Vec<Vec<String>> {
        let mut out = Vec::new();
        for_each_record(input.as_bytes(), split, |r| {
            out.push(r);
            Ok(())
        })
        .unwrap();
        out
    }

    #[test]
    fn whitespace_split_ignores_runs() {
        assert_eq!(
            split_line("  topic1   44  808699 ", &Split::Whitespace),
            vec!["topic1", "44", "808699"]
        );
    }

    #[test]
    fn literal_split() {
        assert_eq!(
            split_line("a|b||c", &Split::Literal("|".to_string())),
            vec!["a", "b", "", "c"]
        );
    }

    #[test]
    fn csv_records_keep_quoted_commas() {
        let rows = records("name,hosts\nweb,\"a,b\"\n", &Split::Csv);
        assert_eq!(rows, vec![vec!["name", "hosts"], vec!["web", "a,b"]]);
    }

    #[test]
    fn csv_records_may_differ_in_length() {
        let rows = records("a,b,c\nd\n", &Split::Csv);
        assert_eq!(rows[1], vec!["d"]);
    }

    #[test]
    fn line_records() {
        let rows = records("a b\nc d\n", &Split::Whitespace);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec!["c", "d"]);
    }

    #[test]
    fn json_root_object_or_array() {
        assert_eq!(parse_json_documents(r#"{"a":1}"#).unwrap(), vec![json!({"a": 1})]);
        assert_eq!(
            parse_json_documents(r#"[{"a":1}, 3, {"b":2}]"#).unwrap(),
            vec![json!({"a": 1}), json!({"b": 2})]
        );
    }

    #[test]
    fn json_scalar_root_is_error() {
        assert!(parse_json_documents("42").is_err());
    }

    #[test]
    fn invalid_json_reports_line() {
        let err = parse_json_documents("{\n\"a\": }").unwrap_err();
        assert_eq!(err.position.input_line, Some(2));
    }

    #[test]
    fn yaml_stream_documents() {
        let text = "name: a\n---\nname: b\n";
        assert_eq!(
            parse_yaml_documents(text).unwrap(),
            vec![json!({"name": "a"}), json!({"name": "b"})]
        );
    }

    #[test]
    fn yaml_sequence_root() {
        let text = "- name: a\n- name: b\n";
        assert_eq!(parse_yaml_documents(text).unwrap().len(), 2);
    }

    #[test]
    fn json_lines() {
        assert_eq!(parse_json_line(r#"{"a":1}"#), Some(vec![json!({"a": 1})]));
        assert_eq!(parse_json_line("plain text"), None);
        assert_eq!(parse_json_line("7"), None);
    }
}

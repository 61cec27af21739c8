//! Pipeline execution.
//!
//! Records are read and extracted one at a time. When the configuration
//! only needs per-row work they are written straight away; otherwise all
//! rows are collected into a `Table`, passed through the compiled
//! whole-table stages (group, calc, sort) and rendered at the end.

use std::io::{BufRead, Write};

use serde_json::Value as Json;
use tracing::debug;

use crate::error::{Error, Result};
use crate::format::{FormatConfig, Mode};
use crate::input::{for_each_record, parse_json_documents, parse_json_line, parse_yaml_documents};
use crate::operators::{
    Calculate, Extract, GroupBy, KeyTree, SortRows, discover_keys, display_key, flatten_document,
};
use crate::output::{DelimitedWriter, render};
use crate::value::{Row, Value};

/// Rows collected for whole-table processing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
    /// Number of leading key columns produced by grouping.
    pub key_count: usize,
    /// Cells already carry inferred numeric types.
    pub typed: bool,
    /// Headers came from `head[...]` and must not be derived.
    pub explicit_headers: bool,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            headers,
            rows,
            ..Self::default()
        }
    }

    /// Start a table, preferring explicit headers over captured ones.
    fn with_headers(config: &FormatConfig, captured: Option<Vec<String>>, rows: Vec<Row>) -> Self {
        match &config.headers {
            Some(explicit) => Self {
                explicit_headers: true,
                ..Self::new(explicit.clone(), rows)
            },
            None => Self::new(captured.unwrap_or_default(), rows),
        }
    }
}

/// A whole-table stage.
pub trait Transform {
    /// Apply the stage to a table.
    fn apply(&self, table: Table) -> Result<Table>;
}

/// Compile the whole-table stages in execution order.
pub fn compile(config: &FormatConfig) -> Vec<Box<dyn Transform>> {
    let mut stages: Vec<Box<dyn Transform>> = Vec::new();
    if let Some(group) = &config.group {
        stages.push(Box::new(GroupBy::new(group.clone(), config.joiner())));
    }
    if !config.calcs.is_empty() {
        stages.push(Box::new(Calculate::new(config.calcs.clone())));
    }
    if let Some(sort) = &config.sort {
        stages.push(Box::new(SortRows::new(sort.clone())));
    }
    stages
}

/// Run stages in order.
pub fn run_stages(stages: &[Box<dyn Transform>], table: Table) -> Result<Table> {
    stages.iter().try_fold(table, |table, stage| stage.apply(table))
}

/// Apply the stages and render.
pub fn finish<W: Write>(config: &FormatConfig, table: Table, out: &mut W) -> Result<()> {
    debug!(rows = table.rows.len(), "running whole-table stages");
    let table = run_stages(&compile(config), table)?;
    render(config, &table, out)
}

const NO_DATA: &str = "there is no data to read from STDIN";

/// Run the pipeline for the configured mode over `input`.
pub fn run<R: BufRead, W: Write>(config: &FormatConfig, mut input: R, out: &mut W) -> Result<()> {
    if input.fill_buf()?.is_empty() {
        return Err(Error::runtime(NO_DATA));
    }
    match config.mode {
        Mode::Csv => run_records(config, input, out),
        Mode::JsonLines => run_json_lines(config, input, out),
        Mode::Json | Mode::Yaml => {
            let mut text = String::new();
            input.read_to_string(&mut text)?;
            if text.trim().is_empty() {
                return Err(Error::runtime(NO_DATA));
            }
            let documents = if config.mode == Mode::Json {
                parse_json_documents(&text)?
            } else {
                parse_yaml_documents(&text)?
            };
            run_documents(config, documents, out)
        }
    }
}

fn text_row(fields: Vec<String>) -> Row {
    fields.into_iter().map(Value::Text).collect()
}

/// Delimited input. Record 0 is the header unless `-inhead` was given.
pub fn run_records<R: BufRead, W: Write>(config: &FormatConfig, input: R, out: &mut W) -> Result<()> {
    let extract = Extract::new(&config.col_range, &config.column_transforms);
    let has_header = !config.no_header_in;

    if !config.has_whole_document_op() {
        debug!("streaming records");
        return stream_records(config, &extract, input, out);
    }

    debug!("buffering records");
    let needs_length = config.row_range.needs_length();
    let mut headers = None;
    let mut rows: Vec<(usize, Row)> = Vec::new();
    let mut index = 0;
    for_each_record(input, &config.split, |fields| {
        if index == 0 && has_header {
            headers = Some(extract.header(&fields));
        } else if needs_length || config.row_range.contains(index, None) {
            rows.push((index, text_row(extract.record(&fields))));
        }
        index += 1;
        Ok(())
    })?;

    let total = index;
    let rows = rows
        .into_iter()
        .filter(|(i, _)| !needs_length || config.row_range.contains(*i, Some(total)))
        .map(|(_, row)| row)
        .collect();
    finish(config, Table::with_headers(config, headers, rows), out)
}

fn stream_records<R: BufRead, W: Write>(
    config: &FormatConfig,
    extract: &Extract<'_>,
    input: R,
    out: &mut W,
) -> Result<()> {
    let calc = Calculate::new(config.calcs.clone());
    let mut writer = DelimitedWriter::new(&mut *out, &config.merge, config.wrap.clone());
    let show_header = !config.no_header_out;

    if show_header && config.no_header_in {
        if let Some(explicit) = &config.headers {
            writer.write_header(explicit)?;
        }
    }

    let mut index = 0;
    for_each_record(input, &config.split, |fields| {
        if index == 0 && !config.no_header_in {
            if show_header {
                match &config.headers {
                    Some(explicit) => writer.write_header(explicit)?,
                    None => {
                        let mut labels = extract.header(&fields);
                        calc.extend_headers(&mut labels);
                        writer.write_header(&labels)?;
                    }
                }
            }
        } else if config.row_range.contains(index, None) {
            let mut row = text_row(extract.record(&fields));
            calc.extend_row(&mut row);
            writer.write_row(&row)?;
        }
        index += 1;
        Ok(())
    })?;
    writer.flush()
}

/// Structured documents: filter, then list keys or flatten into rows.
pub fn run_documents<W: Write>(config: &FormatConfig, documents: Vec<Json>, out: &mut W) -> Result<()> {
    let documents = select_documents(config, documents);
    debug!(documents = documents.len(), "documents selected");

    let keys = config.keys.as_ref().ok_or_else(|| {
        Error::runtime("no keys given: use keys to list key paths, keys[a.b,...] to extract")
    })?;

    if keys.is_empty() {
        for key in discover_keys(&documents) {
            writeln!(out, "{}", display_key(&key))?;
        }
        return Ok(());
    }
    flatten_documents(config, keys, &documents, out)
}

fn select_documents(config: &FormatConfig, documents: Vec<Json>) -> Vec<Json> {
    match &config.filter {
        Some(filter) => documents.into_iter().filter(|d| filter.matches(d)).collect(),
        None => documents,
    }
}

fn flatten_documents<W: Write>(
    config: &FormatConfig,
    keys: &[String],
    documents: &[Json],
    out: &mut W,
) -> Result<()> {
    let tree = KeyTree::new(keys);
    let rows: Vec<Row> = documents
        .iter()
        .flat_map(|document| flatten_document(document, &tree, keys))
        .collect();
    let table = Table {
        typed: true,
        ..Table::with_headers(config, Some(keys.to_vec()), rows)
    };
    finish(config, table, out)
}

/// JSON lines. Lines that are not JSON documents are echoed in place.
/// Without `keys`, JSON lines passing the filter are echoed too. With
/// `keys[...]`, each run of consecutive JSON lines is rendered as soon as a
/// non-JSON line or the end of input closes it. Key discovery lists the
/// keys of the whole input at the end.
pub fn run_json_lines<R: BufRead, W: Write>(config: &FormatConfig, input: R, out: &mut W) -> Result<()> {
    let Some(keys) = &config.keys else {
        return echo_json_lines(config, input, out);
    };

    let mut documents = Vec::new();
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_json_line(&line) {
            Some(parsed) => documents.extend(parsed),
            None if keys.is_empty() => {}
            None => {
                flush_run(config, keys, std::mem::take(&mut documents), out)?;
                writeln!(out, "{}", line)?;
            }
        }
    }

    if keys.is_empty() {
        return run_documents(config, documents, out);
    }
    flush_run(config, keys, documents, out)
}

fn echo_json_lines<R: BufRead, W: Write>(config: &FormatConfig, input: R, out: &mut W) -> Result<()> {
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let keep = match parse_json_line(&line) {
            Some(parsed) => parsed
                .iter()
                .any(|d| config.filter.as_ref().is_none_or(|f| f.matches(d))),
            None => true,
        };
        if keep {
            writeln!(out, "{}", line)?;
        }
    }
    Ok(())
}

/// Render one run of JSON lines; runs left empty by the filter print nothing.
fn flush_run<W: Write>(config: &FormatConfig, keys: &[String], run: Vec<Json>, out: &mut W) -> Result<()> {
    let run = select_documents(config, run);
    if run.is_empty() {
        return Ok(());
    }
    debug!(documents = run.len(), "rendering run of JSON lines");
    flatten_documents(config, keys, &run, out)
}

//! Output rendering: delimited text, fixed-width tables and JSON.

mod delimited;
mod json;
mod table;

use std::io::Write;

use tracing::debug;

pub use delimited::{DelimitedWriter, write_line_merged};
pub use json::{build_document, derive_fields, write_json};
pub use table::write_table;

use crate::error::Result;
use crate::format::{FormatConfig, OutputKind};
use crate::pipeline::Table;

/// Render a finished table in the configured output format.
pub fn render<W: Write>(config: &FormatConfig, table: &Table, out: &mut W) -> Result<()> {
    let show_header = !config.no_header_out && !table.headers.is_empty();

    if let Some(delimiter) = &config.line_merge {
        debug!(rows = table.rows.len(), "writing merged line");
        return write_line_merged(
            out,
            &table.rows,
            config.joiner(),
            delimiter,
            config.wrap.as_deref(),
        );
    }

    debug!(rows = table.rows.len(), kind = ?config.output.kind, "rendering output");
    match config.output.kind {
        OutputKind::Csv => {
            let mut writer = DelimitedWriter::new(&mut *out, &config.merge, config.wrap.clone());
            if show_header {
                writer.write_header(&table.headers)?;
            }
            for row in &table.rows {
                writer.write_row(row)?;
            }
            writer.flush()
        }
        OutputKind::Table => {
            let headers = show_header.then_some(table.headers.as_slice());
            write_table(out, headers, &table.rows)
        }
        OutputKind::Json => write_json(
            out,
            &table.headers,
            &table.rows,
            table.explicit_headers,
            config.output.levels,
            table.key_count,
        ),
    }
}

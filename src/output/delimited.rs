use std::io::Write;

use crate::error::Result;
use crate::format::Merge;
use crate::value::{Row, Value};

enum Sink<W: Write> {
    Csv(csv::Writer<W>),
    Joined { out: W, delimiter: String },
}

/// Writes records either as CSV or joined with a literal delimiter.
///
/// Header labels are written as given; data cells are rendered and, when a
/// wrap string is set, wrapped on both sides.
pub struct DelimitedWriter<W: Write> {
    sink: Sink<W>,
    wrap: Option<String>,
}

impl<W: Write> DelimitedWriter<W> {
    pub fn new(out: W, merge: &Merge, wrap: Option<String>) -> Self {
        let sink = match merge {
            Merge::Csv => Sink::Csv(csv::WriterBuilder::new().flexible(true).from_writer(out)),
            Merge::Literal(delimiter) => Sink::Joined {
                out,
                delimiter: delimiter.clone(),
            },
        };
        Self { sink, wrap }
    }

    pub fn write_header(&mut self, labels: &[String]) -> Result<()> {
        self.write_fields(labels)
    }

    pub fn write_row(&mut self, row: &[Value]) -> Result<()> {
        let fields: Vec<String> = row
            .iter()
            .map(|cell| wrap(cell.render(), self.wrap.as_deref()))
            .collect();
        self.write_fields(&fields)
    }

    fn write_fields(&mut self, fields: &[String]) -> Result<()> {
        match &mut self.sink {
            Sink::Csv(writer) => writer.write_record(fields)?,
            Sink::Joined { out, delimiter } => writeln!(out, "{}", fields.join(delimiter))?,
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        match &mut self.sink {
            Sink::Csv(writer) => writer.flush()?,
            Sink::Joined { out, .. } => out.flush()?,
        }
        Ok(())
    }
}

fn wrap(text: String, wrap: Option<&str>) -> String {
    match wrap {
        Some(w) => format!("{w}{text}{w}"),
        None => text,
    }
}

/// Join every row with `joiner`, then all rows onto one line with
/// `delimiter`.
pub fn write_line_merged<W: Write>(
    out: &mut W,
    rows: &[Row],
    joiner: &str,
    delimiter: &str,
    wrap_with: Option<&str>,
) -> Result<()> {
    let line = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| wrap(cell.render(), wrap_with))
                .collect::<Vec<_>>()
                .join(joiner)
        })
        .collect::<Vec<_>>()
        .join(delimiter);
    writeln!(out, "{}", line)?;
    Ok(())
}

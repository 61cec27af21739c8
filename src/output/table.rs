use std::io::Write;

use crate::error::Result;
use crate::value::{Row, Value};

/// Extra padding after the widest cell of a column.
const PADDING: usize = 3;

struct Cell {
    lines: Vec<String>,
}

impl Cell {
    fn new(value: &Value) -> Self {
        let lines = match value {
            Value::MultiText(set) if !set.is_empty() => set.values().map(str::to_string).collect(),
            Value::Structured(json) => match serde_yaml::to_string(json) {
                Ok(yaml) => yaml.trim_end().lines().map(str::to_string).collect(),
                Err(_) => vec![value.render()],
            },
            other => vec![other.render()],
        };
        Self { lines }
    }

    fn line(&self, i: usize) -> &str {
        self.lines.get(i).map(String::as_str).unwrap_or_default()
    }

    fn width(&self) -> usize {
        self.lines
            .iter()
            .map(|line| line.chars().count())
            .max()
            .unwrap_or(0)
    }
}

/// Render rows as fixed-width columns.
///
/// Every column is as wide as its widest header or cell line plus padding,
/// followed by one space. A cell holding several values prints the first on
/// the row's line and the rest on continuation lines, other columns blank.
pub fn write_table<W: Write>(out: &mut W, headers: Option<&[String]>, rows: &[Row]) -> Result<()> {
    let cells: Vec<Vec<Cell>> = rows
        .iter()
        .map(|row| row.iter().map(Cell::new).collect())
        .collect();

    let columns = cells
        .iter()
        .map(Vec::len)
        .chain(headers.map(<[String]>::len))
        .max()
        .unwrap_or(0);

    let mut widths = vec![0; columns];
    if let Some(headers) = headers {
        for (width, header) in widths.iter_mut().zip(headers) {
            *width = header.chars().count();
        }
    }
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.width());
        }
    }

    if let Some(headers) = headers {
        let labels: Vec<&str> = (0..columns)
            .map(|j| headers.get(j).map(String::as_str).unwrap_or_default())
            .collect();
        write_line(out, &widths, &labels)?;
    }

    for row in &cells {
        let height = row.iter().map(|cell| cell.lines.len()).max().unwrap_or(1);
        for i in 0..height.max(1) {
            let texts: Vec<&str> = (0..columns)
                .map(|j| row.get(j).map_or("", |cell| cell.line(i)))
                .collect();
            write_line(out, &widths, &texts)?;
        }
    }
    Ok(())
}

fn write_line<W: Write>(out: &mut W, widths: &[usize], texts: &[&str]) -> Result<()> {
    let mut line = String::new();
    for (text, width) in texts.iter().zip(widths) {
        line.push_str(&format!("{:<w$} ", text, w = width + PADDING));
    }
    writeln!(out, "{}", line)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::MultiText;
    use serde_json::json;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn labels(list: &[&str]) -> Vec<String> {
        list.iter().map(|l| l.to_string()).collect()
    }

    fn render(headers: Option<&[String]>, rows: &[Row]) -> Vec<String> {
        let mut buf = Vec::new();
        write_table(&mut buf, headers, rows).unwrap();
        String::from_utf8(buf)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn pads_to_widest_plus_three() {
        let headers = labels(&["topic", "partition"]);
        let rows = vec![vec![text("topic2"), Value::Int(0)]];
        let lines = render(Some(&headers), &rows);
        assert_eq!(lines[0], "topic     partition    ");
        assert_eq!(lines[1], "topic2    0            ");
    }

    #[test]
    fn multi_values_stack() {
        let headers = labels(&["pods.name", "pods.containers.name"]);
        let containers: MultiText = ["container1", "container2"].into_iter().collect();
        let rows = vec![vec![text("pod1"), Value::MultiText(containers)]];
        let lines = render(Some(&headers), &rows);
        assert_eq!(lines, vec![
            "pods.name    pods.containers.name    ",
            "pod1         container1              ",
            "             container2              ",
        ]);
    }

    #[test]
    fn every_line_has_same_width() {
        let headers = labels(&["a", "b", "c"]);
        let rows = vec![vec![text("only")], vec![text("x"), text("yy"), text("zzz")]];
        let lines = render(Some(&headers), &rows);
        let width = lines[0].chars().count();
        assert!(lines.iter().all(|l| l.chars().count() == width));
    }

    #[test]
    fn structured_values_render_as_yaml_lines() {
        let rows = vec![vec![Value::Structured(json!({"cpu": "1", "memory": "2Gi"}))]];
        let lines = render(None, &rows);
        assert_eq!(lines, vec!["cpu: '1'       ", "memory: 2Gi    "]);
    }

    #[test]
    fn without_header() {
        let rows = vec![vec![text("a"), text("b")]];
        let lines = render(None, &rows);
        assert_eq!(lines, vec!["a    b    "]);
    }

    #[test]
    fn counts_characters_not_bytes() {
        let rows = vec![vec![text("héllo")], vec![text("x")]];
        let lines = render(None, &rows);
        assert_eq!(lines[1], "x        ");
    }
}

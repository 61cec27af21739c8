//! The parsed form of a command line: what to extract, how to group,
//! compute, sort and render.

use std::collections::BTreeMap;

use crate::expr::Expr;
use crate::range::IndexRange;

/// Input flavour selected by the subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Delimited text lines.
    Csv,
    /// A single JSON document.
    Json,
    /// One JSON document per line.
    JsonLines,
    /// A YAML document stream.
    Yaml,
}

impl Mode {
    /// Subcommand name, also the key for settings defaults.
    pub fn name(self) -> &'static str {
        match self {
            Mode::Csv => "csv",
            Mode::Json => "jp",
            Mode::JsonLines => "jpl",
            Mode::Yaml => "yp",
        }
    }

    pub fn is_document(self) -> bool {
        !matches!(self, Mode::Csv)
    }
}

/// How a line is broken into fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Split {
    /// Runs of whitespace; leading and trailing whitespace ignored.
    Whitespace,
    /// CSV quoting rules.
    Csv,
    /// A literal separator. Empty splits into characters.
    Literal(String),
}

impl Split {
    pub fn from_name(name: &str) -> Self {
        match name {
            "space+" => Split::Whitespace,
            "csv" => Split::Csv,
            other => Split::Literal(other.to_string()),
        }
    }
}

/// How output fields are joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Merge {
    /// CSV writer with standard quoting.
    Csv,
    Literal(String),
}

impl Merge {
    pub fn from_name(name: &str) -> Self {
        match name {
            "csv" => Merge::Csv,
            other => Merge::Literal(other.to_string()),
        }
    }

    /// Delimiter used when joining text inside a cell.
    pub fn joiner(&self) -> &str {
        match self {
            Merge::Csv => ",",
            Merge::Literal(delim) => delim,
        }
    }
}

/// Per-column rewrite attached with `tr`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnTransform {
    /// Separator to split the cell on; empty means no split.
    pub split: String,
    /// Joiner after splitting; `None` joins with a comma.
    pub merge: Option<String>,
    pub sub_range: Option<IndexRange>,
    pub wrap: Option<String>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    /// Emit the result as an extra column instead of replacing the cell.
    pub add_as_new_column: bool,
}

/// `group[...]` options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDef {
    pub key_range: IndexRange,
    /// Append a count column.
    pub show_count: bool,
    /// Fold all aggregated value columns into one.
    pub fold_row: bool,
}

/// `sort[...]` options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortDef {
    pub key_range: IndexRange,
    pub descending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputKind {
    #[default]
    Csv,
    Table,
    Json,
}

/// `out..TYPE..levels:N`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutputDef {
    pub kind: OutputKind,
    /// Grouping levels for nested JSON.
    pub levels: usize,
}

/// A compiled `calc(...)` column.
#[derive(Debug, Clone, PartialEq)]
pub struct CalcDef {
    /// Expression as written, with `[i]` placeholders.
    pub source: String,
    pub expr: Expr,
    /// Column indices referenced by the expression.
    pub columns: Vec<usize>,
}

/// A compiled `filter..` expression over document key paths.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterDef {
    pub source: String,
    pub expr: Expr,
    /// Split key paths; path `i` is bound to variable `keyI`.
    pub paths: Vec<Vec<String>>,
}

/// Everything a command line asks for.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatConfig {
    pub mode: Mode,
    pub split: Split,
    pub merge: Merge,
    /// Joins whole output rows onto a single line.
    pub line_merge: Option<String>,
    /// Wraps every emitted data cell.
    pub wrap: Option<String>,
    pub row_range: IndexRange,
    pub col_range: IndexRange,
    pub column_transforms: BTreeMap<usize, Vec<ColumnTransform>>,
    pub group: Option<GroupDef>,
    pub sort: Option<SortDef>,
    pub output: OutputDef,
    /// Header labels given with `head[...]`.
    pub headers: Option<Vec<String>>,
    pub calcs: Vec<CalcDef>,
    /// Keys for hierarchical input. Empty means list the available keys.
    pub keys: Option<Vec<String>>,
    /// Document filter for hierarchical input.
    pub filter: Option<FilterDef>,
    pub no_header_in: bool,
    pub no_header_out: bool,
}

impl FormatConfig {
    /// Defaults for a subcommand before any token is applied.
    pub fn for_mode(mode: Mode) -> Self {
        let (split, merge, kind) = match mode {
            Mode::Csv => (Split::Whitespace, Merge::Csv, OutputKind::Csv),
            Mode::JsonLines => (
                Split::Whitespace,
                Merge::Literal(" ".to_string()),
                OutputKind::Table,
            ),
            Mode::Json | Mode::Yaml => (Split::Whitespace, Merge::Csv, OutputKind::Table),
        };

        Self {
            mode,
            split,
            merge,
            line_merge: None,
            wrap: None,
            row_range: IndexRange::all(),
            col_range: IndexRange::all(),
            column_transforms: BTreeMap::new(),
            group: None,
            sort: None,
            output: OutputDef { kind, levels: 0 },
            headers: None,
            calcs: Vec::new(),
            keys: None,
            filter: None,
            no_header_in: false,
            no_header_out: false,
        }
    }

    /// True when the full set of rows must be collected before output.
    pub fn has_whole_document_op(&self) -> bool {
        self.line_merge.is_some()
            || self.group.is_some()
            || self.sort.is_some()
            || self.output.kind != OutputKind::Csv
            || self.row_range.needs_length()
    }

    /// Text joiner for cells and folded values.
    pub fn joiner(&self) -> &str {
        self.merge.joiner()
    }
}

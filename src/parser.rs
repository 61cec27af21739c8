//! Command token grammar.
//!
//! A command line is a list of tokens, each configuring one aspect of the
//! pipeline. Tokens are applied left to right onto a `FormatConfig`; a later
//! token for the same purpose overrides an earlier one. Unrecognized tokens
//! are ignored.

use tracing::{debug, warn};
use winnow::ModalResult;
use winnow::ascii::digit1;
use winnow::combinator::{cut_err, delimited, preceded, repeat};
use winnow::error::{StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{take_till, take_while};

use crate::error::{Error, Result};
use crate::format::{
    CalcDef, ColumnTransform, FilterDef, FormatConfig, GroupDef, Merge, Mode, OutputKind, SortDef,
    Split,
};
use crate::range::IndexRange;

/// Parse a full token list for a subcommand.
pub fn parse_tokens<S: AsRef<str>>(mode: Mode, tokens: &[S]) -> Result<FormatConfig> {
    let mut config = FormatConfig::for_mode(mode);
    for (index, token) in tokens.iter().enumerate() {
        config = apply_token(config, index, token.as_ref())?;
    }
    if config.no_header_in && config.headers.is_none() {
        config.no_header_out = true;
    }
    Ok(config)
}

/// Apply one token to the configuration.
pub fn apply_token(mut config: FormatConfig, index: usize, token: &str) -> Result<FormatConfig> {
    let token = token.trim();

    if let Some(rest) = token.strip_prefix("lmerge") {
        config.line_merge = Some(match rest.strip_prefix(':') {
            Some(delim) => delimiter(delim),
            None => ",".to_string(),
        });
    } else if let Some(delim) = token.strip_prefix("merge:") {
        config.merge = Merge::from_name(&delimiter(delim));
    } else if token.starts_with("row[") {
        config.row_range = range_arg(token, index)?.0;
    } else if token.starts_with("col[") {
        config.col_range = range_arg(token, index)?.0;
    } else if token.starts_with("ncol[") {
        config.col_range = IndexRange {
            exclude: true,
            ..range_arg(token, index)?.0
        };
    } else if token.starts_with("sort[") {
        let (key_range, options) = range_arg(token, index)?;
        config.sort = Some(SortDef {
            key_range,
            descending: options.iter().any(|o| o == "desc"),
        });
    } else if let Some(delim) = token.strip_prefix("split:") {
        config.split = Split::from_name(&delimiter(delim));
    } else if let Some(delim) = token.strip_prefix("wrap:") {
        config.wrap = Some(delimiter(delim));
    } else if token.starts_with("tr") {
        let (column, transform) = column_transform(token, index)?;
        config
            .column_transforms
            .entry(column)
            .or_default()
            .push(transform);
    } else if token.starts_with("group[") {
        let (key_range, options) = range_arg(token, index)?;
        config.group = Some(GroupDef {
            key_range,
            show_count: options.iter().any(|o| o == "count"),
            fold_row: options.iter().any(|o| o == "row"),
        });
    } else if token.starts_with("out") {
        output_def(&mut config, token, index)?;
    } else if token.starts_with("head") {
        config.headers = Some(list_arg(token, index)?);
    } else if token == "-inhead" {
        config.no_header_in = true;
    } else if token == "-outhead" {
        config.no_header_out = true;
    } else if token.starts_with("calc") {
        let source = paren_body(token)
            .ok_or_else(|| Error::at_token("expected calc(EXPRESSION)", index))?;
        let calc = CalcDef::compile(source).map_err(|e| e.with_token(index))?;
        config.calcs.push(calc);
    } else if token.starts_with("keys") {
        config.keys = Some(if token == "keys" {
            Vec::new()
        } else {
            list_arg(token, index)?
        });
    } else if token.starts_with("filter") {
        let segments = inline_segments(token, "filter")
            .ok_or_else(|| Error::at_token("expected filter..EXPRESSION", index))?;
        let source = segments.join(" ");
        let filter = FilterDef::compile(&source).map_err(|e| e.with_token(index))?;
        config.filter = Some(filter);
    } else {
        debug!(token, "ignoring unrecognized token");
    }

    Ok(config)
}

/// Resolve symbolic delimiter names.
pub fn delimiter(name: &str) -> String {
    match name {
        "comma" => ",",
        "space" => " ",
        "tab" => "\t",
        "newline" => "\n",
        "quote" => "'",
        "dquote" => "\"",
        "none" => "",
        "pipe" => "|",
        other => other,
    }
    .to_string()
}

/// A `name[body]:opt:opt` token.
struct BracketCommand<'a> {
    body: &'a str,
    options: Vec<&'a str>,
}

fn bracket_command<'a>(input: &mut &'a str) -> ModalResult<BracketCommand<'a>> {
    let _name = take_while(1.., |c: char| c.is_ascii_alphabetic()).parse_next(input)?;
    let body = delimited(
        '[',
        take_till(0.., ']'),
        cut_err(']').context(StrContext::Expected(StrContextValue::CharLiteral(']'))),
    )
    .parse_next(input)?;
    let options = repeat(0.., preceded(':', take_till(0.., ':'))).parse_next(input)?;
    Ok(BracketCommand { body, options })
}

/// Parse a bracket command. Text after the last option is ignored.
fn parse_bracket_command(token: &str, index: usize) -> Result<BracketCommand<'_>> {
    let mut input = token;
    let command = bracket_command.parse_next(&mut input).map_err(|_| {
        let offset = token.len() - input.len();
        Error::at_token(format!("malformed token '{}' at offset {}", token, offset), index)
    })?;
    if !input.is_empty() {
        warn!(token, trailing = input, "ignoring trailing text after token");
    }
    Ok(command)
}

/// Range between brackets plus any `:option` suffixes.
fn range_arg(token: &str, index: usize) -> Result<(IndexRange, Vec<String>)> {
    let command = parse_bracket_command(token, index)?;
    let options = command.options.iter().map(|o| o.trim().to_string()).collect();
    Ok((IndexRange::parse(command.body), options))
}

/// Comma separated names between brackets.
fn list_arg(token: &str, index: usize) -> Result<Vec<String>> {
    let command = parse_bracket_command(token, index)?;
    if command.body.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(command
        .body
        .split(',')
        .map(|name| name.trim().to_string())
        .collect())
}

/// Text between the first `(` and the last `)`.
fn paren_body(token: &str) -> Option<&str> {
    let start = token.find('(')?;
    let end = token.rfind(')')?;
    (end > start).then(|| &token[start + 1..end])
}

/// Split an inline command such as `tr..c5..split:/`. The separator is the
/// character right after `prefix` together with any repeats of it.
fn inline_segments<'a>(token: &'a str, prefix: &str) -> Option<Vec<&'a str>> {
    let rest = token.strip_prefix(prefix)?;
    let first = rest.chars().next()?;
    let width: usize = rest
        .chars()
        .take_while(|&c| c == first)
        .map(char::len_utf8)
        .sum();
    let (separator, rest) = rest.split_at(width);
    Some(rest.split(separator).collect())
}

/// `cN` column reference.
fn column_ref(input: &mut &str) -> ModalResult<usize> {
    preceded('c', digit1)
        .try_map(str::parse::<usize>)
        .parse_next(input)
}

fn column_transform(token: &str, index: usize) -> Result<(usize, ColumnTransform)> {
    let segments = inline_segments(token, "tr")
        .ok_or_else(|| Error::at_token("expected tr<sep>cN<sep>OPTIONS", index))?;
    let (column, options) = segments
        .split_first()
        .ok_or_else(|| Error::at_token("missing column in tr", index))?;
    let column = column_ref
        .parse(*column)
        .map_err(|_| Error::at_token(format!("invalid column '{}' in tr", column), index))?;

    let mut transform = ColumnTransform::default();
    for option in options {
        if let Some(delim) = option.strip_prefix("split:") {
            transform.split = delimiter(delim);
        } else if let Some(delim) = option.strip_prefix("merge:") {
            transform.merge = Some(delimiter(delim));
        } else if let Some(delim) = option.strip_prefix("wrap:") {
            transform.wrap = Some(delimiter(delim));
        } else if let Some(text) = option.strip_prefix("pfx:") {
            transform.prefix = Some(unquote(text).to_string());
        } else if let Some(text) = option.strip_prefix("sfx:") {
            transform.suffix = Some(unquote(text).to_string());
        } else if option.starts_with("col[") {
            transform.sub_range = Some(range_arg(option, index)?.0);
        } else if option.starts_with("ncol[") {
            transform.sub_range = Some(IndexRange {
                exclude: true,
                ..range_arg(option, index)?.0
            });
        } else if *option == "add" {
            transform.add_as_new_column = true;
        } else {
            debug!(option, "ignoring unrecognized tr option");
        }
    }
    Ok((column, transform))
}

/// Strip one pair of matching single or double quotes.
fn unquote(text: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(inner) = text
            .strip_prefix(quote)
            .and_then(|t| t.strip_suffix(quote))
        {
            return inner;
        }
    }
    text
}

fn output_def(config: &mut FormatConfig, token: &str, index: usize) -> Result<()> {
    let segments = inline_segments(token, "out")
        .ok_or_else(|| Error::at_token("expected out..TYPE", index))?;
    let (kind, options) = segments
        .split_first()
        .ok_or_else(|| Error::at_token("missing output type", index))?;

    config.output.kind = match *kind {
        "csv" => OutputKind::Csv,
        "table" => OutputKind::Table,
        "json" => OutputKind::Json,
        other => {
            debug!(kind = other, "unknown output type, using csv");
            OutputKind::Csv
        }
    };
    for option in options {
        if let Some(levels) = option.strip_prefix("levels:") {
            config.output.levels = levels
                .parse()
                .map_err(|_| Error::at_token(format!("invalid levels '{}'", levels), index))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv(tokens: &[&str]) -> FormatConfig {
        parse_tokens(Mode::Csv, tokens).unwrap()
    }

    #[test]
    fn row_and_column_ranges() {
        let config = csv(&["row[17:18]", "col[0,2]"]);
        assert_eq!(config.row_range.start, Some(17));
        assert_eq!(config.row_range.end, Some(18));
        assert_eq!(config.col_range.indices, Some(vec![0, 2]));
    }

    #[test]
    fn excluded_columns() {
        let config = csv(&["ncol[-1]"]);
        assert!(config.col_range.exclude);
        assert_eq!(config.col_range.indices, Some(vec![-1]));
    }

    #[test]
    fn later_tokens_override() {
        let config = csv(&["col[1]", "col[2]"]);
        assert_eq!(config.col_range.indices, Some(vec![2]));
    }

    #[test]
    fn merge_and_line_merge() {
        let config = csv(&["merge:::"]);
        assert_eq!(config.merge, Merge::Literal("::".to_string()));

        let config = csv(&["lmerge:--"]);
        assert_eq!(config.line_merge.as_deref(), Some("--"));
        assert!(config.has_whole_document_op());

        let config = csv(&["lmerge"]);
        assert_eq!(config.line_merge.as_deref(), Some(","));
    }

    #[test]
    fn symbolic_delimiters() {
        assert_eq!(csv(&["split:comma"]).split, Split::Literal(",".to_string()));
        assert_eq!(csv(&["split:csv"]).split, Split::Csv);
        assert_eq!(csv(&["merge:tab"]).merge, Merge::Literal("\t".to_string()));
        assert_eq!(csv(&["merge:pipe"]).merge, Merge::Literal("|".to_string()));
        assert_eq!(csv(&["wrap:dquote"]).wrap.as_deref(), Some("\""));
    }

    #[test]
    fn sort_with_direction() {
        let config = csv(&["sort[4]:desc"]);
        let sort = config.sort.unwrap();
        assert_eq!(sort.key_range.indices, Some(vec![4]));
        assert!(sort.descending);

        let sort = csv(&["sort[0,2]"]).sort.unwrap();
        assert!(!sort.descending);
    }

    #[test]
    fn group_options() {
        let group = csv(&["group[0]:count"]).group.unwrap();
        assert!(group.show_count);
        assert!(!group.fold_row);

        let group = csv(&["group[0:2]:row:count"]).group.unwrap();
        assert_eq!(group.key_range.start, Some(0));
        assert_eq!(group.key_range.end, Some(2));
        assert!(group.fold_row);
        assert!(group.show_count);
    }

    #[test]
    fn column_transform_with_custom_separator() {
        let config = csv(&["tr#c5#split:.#merge::"]);
        let transforms = &config.column_transforms[&5];
        assert_eq!(transforms.len(), 1);
        assert_eq!(transforms[0].split, ".");
        assert_eq!(transforms[0].merge.as_deref(), Some(":"));
    }

    #[test]
    fn column_transforms_chain() {
        let config = csv(&[
            "tr..c5..split:/..col[-1]..pfx:'<<<'..sfx:'>>>'",
            "tr..c5..add",
        ]);
        let transforms = &config.column_transforms[&5];
        assert_eq!(transforms.len(), 2);
        assert_eq!(transforms[0].split, "/");
        assert_eq!(transforms[0].sub_range, Some(IndexRange::parse("-1")));
        assert_eq!(transforms[0].prefix.as_deref(), Some("<<<"));
        assert_eq!(transforms[0].suffix.as_deref(), Some(">>>"));
        assert!(transforms[1].add_as_new_column);
    }

    #[test]
    fn non_numeric_tr_column_is_error() {
        let err = parse_tokens(Mode::Csv, &["row[1:]", "tr..cx..split:/"]).unwrap_err();
        assert_eq!(err.position.token, Some(1));
    }

    #[test]
    fn output_definition() {
        let config = csv(&["out..json..levels:2"]);
        assert_eq!(config.output.kind, OutputKind::Json);
        assert_eq!(config.output.levels, 2);

        let config = csv(&["out#table"]);
        assert_eq!(config.output.kind, OutputKind::Table);
    }

    #[test]
    fn explicit_headers() {
        let config = csv(&["head[name, total]"]);
        assert_eq!(
            config.headers,
            Some(vec!["name".to_string(), "total".to_string()])
        );
    }

    #[test]
    fn no_input_header_suppresses_output_header() {
        let config = csv(&["-inhead"]);
        assert!(config.no_header_in);
        assert!(config.no_header_out);

        let config = csv(&["-inhead", "head[a,b]"]);
        assert!(!config.no_header_out);
    }

    #[test]
    fn calc_expression() {
        let config = csv(&["calc(([2]/[3])+1/3)"]);
        assert_eq!(config.calcs.len(), 1);
        assert_eq!(config.calcs[0].source, "([2]/[3])+1/3");
        assert_eq!(config.calcs[0].columns, vec![2, 3]);
    }

    #[test]
    fn invalid_calc_is_error() {
        let err = parse_tokens(Mode::Csv, &["calc([1] +)"]).unwrap_err();
        assert_eq!(err.position.token, Some(0));
    }

    #[test]
    fn keys_forms() {
        let keys = |t: &str| parse_tokens(Mode::Json, &[t]).unwrap().keys;
        assert_eq!(keys("keys"), Some(Vec::new()));
        assert_eq!(keys("keys[]"), Some(Vec::new()));
        assert_eq!(
            keys("keys[pods.name,pods.containers.name]"),
            Some(vec!["pods.name".to_string(), "pods.containers.name".to_string()])
        );
    }

    #[test]
    fn filter_expression() {
        let config = parse_tokens(Mode::Json, &["filter..[metadata.name]..==..'web'"]).unwrap();
        let filter = config.filter.unwrap();
        assert_eq!(filter.source, "[metadata.name] == 'web'");
        assert_eq!(filter.paths, vec![vec!["metadata", "name"]]);
    }

    #[test]
    fn unrecognized_tokens_are_ignored() {
        let config = csv(&["bogus", "col[1]"]);
        assert_eq!(config.col_range.indices, Some(vec![1]));
    }

    #[test]
    fn trailing_text_after_bracket_is_ignored() {
        let config = csv(&["col[0,2]x"]);
        assert_eq!(config.col_range.indices, Some(vec![0, 2]));

        let config = csv(&["row[1:3]extra"]);
        assert_eq!(config.row_range.start, Some(1));
        assert_eq!(config.row_range.end, Some(3));
    }

    #[test]
    fn missing_bracket_is_error() {
        assert!(parse_tokens(Mode::Csv, &["col[1"]).is_err());
    }

    #[test]
    fn inline_segments_use_repeated_separator() {
        assert_eq!(
            inline_segments("tr..c0..split:-", "tr"),
            Some(vec!["c0", "split:-"])
        );
        assert_eq!(inline_segments("tr", "tr"), None);
    }
}

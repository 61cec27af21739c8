//! Arithmetic and boolean expressions for `calc(...)` and `filter..`.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! ternary     := or ('?' ternary ':' ternary)?
//! or          := and ('||' and)*
//! and         := comparison ('&&' comparison)*
//! comparison  := additive (('==' | '!=' | '<=' | '>=' | '=~' | '!~' | '<' | '>') additive)*
//! additive    := multiplicative (('+' | '-') multiplicative)*
//! multiplicative := power (('*' | '/' | '%') power)*
//! power       := unary ('**' power)?
//! unary       := ('-' | '!') unary | primary
//! primary     := number | string | identifier | '(' ternary ')'
//! ```

use std::collections::HashMap;
use std::fmt;

use regex::Regex;
use serde_json::Value as Json;
use winnow::ModalResult;
use winnow::ascii::{digit1, multispace0};
use winnow::combinator::{alt, cut_err, delimited, not, opt, preceded, terminated};
use winnow::error::{StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{one_of, take_till, take_while};

use crate::error::{Error, Result};
use crate::value::{Value, scalar_text};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Bool(bool),
    Variable(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Matches,
    NotMatches,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Matches => "=~",
            BinaryOp::NotMatches => "!~",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Pow => "**",
        }
    }
}

/// Runtime value of an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Number(f64),
    Text(String),
    Bool(bool),
    /// A list or map from a structured document.
    Document(Json),
}

/// Variable bindings for evaluation.
pub type Bindings = HashMap<String, Scalar>;

impl Scalar {
    /// Bind a cell, reading numeric-looking text as a number.
    pub fn from_value(value: &Value) -> Scalar {
        match value {
            Value::Int(n) => Scalar::Number(*n as f64),
            Value::Float(n) => Scalar::Number(*n),
            Value::Text(s) => match s.parse::<f64>() {
                Ok(n) if n.is_finite() => Scalar::Number(n),
                _ => Scalar::Text(s.clone()),
            },
            Value::MultiText(set) => Scalar::Text(set.joined(",")),
            Value::Structured(json) => Scalar::Document(json.clone()),
        }
    }

    pub fn from_json(json: &Json) -> Scalar {
        match json {
            Json::Number(n) => Scalar::Number(n.as_f64().unwrap_or_default()),
            Json::String(s) => Scalar::Text(s.clone()),
            Json::Bool(b) => Scalar::Bool(*b),
            Json::Null => Scalar::Text(String::new()),
            other => Scalar::Document(other.clone()),
        }
    }

    /// Convert a result into a cell. Whole numbers become integers.
    pub fn into_value(self) -> Value {
        match self {
            Scalar::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => Value::Int(n as i64),
            Scalar::Number(n) => Value::Float(n),
            Scalar::Text(s) => Value::Text(s),
            Scalar::Bool(b) => Value::Text(b.to_string()),
            Scalar::Document(json) => Value::from_json(json),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Scalar::Number(_) => "number",
            Scalar::Text(_) => "text",
            Scalar::Bool(_) => "boolean",
            Scalar::Document(_) => "document",
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => {
                write!(f, "{}", *n as i64)
            }
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::Text(s) => write!(f, "{}", s),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Document(json) => write!(f, "{}", scalar_text(json)),
        }
    }
}

/// Parse an expression.
pub fn parse_expression(input: &str) -> std::result::Result<Expr, String> {
    delimited(multispace0, ternary, multispace0)
        .parse(input)
        .map_err(|e| {
            let offset = e.offset();
            let message = if let Some(ctx) = e.inner().context().next() {
                match ctx {
                    StrContext::Label(label) => format!("invalid expression: expected {}", label),
                    StrContext::Expected(StrContextValue::Description(desc)) => {
                        format!("invalid expression: expected {}", desc)
                    }
                    StrContext::Expected(StrContextValue::CharLiteral(c)) => {
                        format!("invalid expression: expected '{}'", c)
                    }
                    _ => "invalid expression: unexpected character".to_string(),
                }
            } else {
                "invalid expression: unexpected character".to_string()
            };
            format!("{}\n  {}\n  {}^", message, input, " ".repeat(offset))
        })
}

fn ternary(input: &mut &str) -> ModalResult<Expr> {
    let condition = or_expr.parse_next(input)?;
    if opt(preceded(multispace0, '?')).parse_next(input)?.is_none() {
        return Ok(condition);
    }
    let then = cut_err(preceded(multispace0, ternary)).parse_next(input)?;
    cut_err(preceded(multispace0, ':'))
        .context(StrContext::Expected(StrContextValue::CharLiteral(':')))
        .parse_next(input)?;
    let otherwise = cut_err(preceded(multispace0, ternary)).parse_next(input)?;
    Ok(Expr::Ternary(
        Box::new(condition),
        Box::new(then),
        Box::new(otherwise),
    ))
}

/// Parse `operand (operator operand)*`, folding to the left.
fn left_assoc(
    input: &mut &str,
    operand: fn(&mut &str) -> ModalResult<Expr>,
    operator: fn(&mut &str) -> ModalResult<BinaryOp>,
) -> ModalResult<Expr> {
    let mut lhs = operand(input)?;
    while let Some(op) = opt(preceded(multispace0, operator)).parse_next(input)? {
        let rhs = cut_err(preceded(multispace0, operand))
            .context(StrContext::Expected(StrContextValue::Description(
                "operand",
            )))
            .parse_next(input)?;
        lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn or_expr(input: &mut &str) -> ModalResult<Expr> {
    left_assoc(input, and_expr, or_op)
}

fn or_op(input: &mut &str) -> ModalResult<BinaryOp> {
    "||".value(BinaryOp::Or).parse_next(input)
}

fn and_expr(input: &mut &str) -> ModalResult<Expr> {
    left_assoc(input, comparison, and_op)
}

fn and_op(input: &mut &str) -> ModalResult<BinaryOp> {
    "&&".value(BinaryOp::And).parse_next(input)
}

fn comparison(input: &mut &str) -> ModalResult<Expr> {
    left_assoc(input, additive, comparison_op)
}

fn comparison_op(input: &mut &str) -> ModalResult<BinaryOp> {
    alt((
        "==".value(BinaryOp::Eq),
        "!=".value(BinaryOp::Ne),
        "<=".value(BinaryOp::Le),
        ">=".value(BinaryOp::Ge),
        "=~".value(BinaryOp::Matches),
        "!~".value(BinaryOp::NotMatches),
        '<'.value(BinaryOp::Lt),
        '>'.value(BinaryOp::Gt),
    ))
    .parse_next(input)
}

fn additive(input: &mut &str) -> ModalResult<Expr> {
    left_assoc(input, multiplicative, additive_op)
}

fn additive_op(input: &mut &str) -> ModalResult<BinaryOp> {
    alt(('+'.value(BinaryOp::Add), '-'.value(BinaryOp::Sub))).parse_next(input)
}

fn multiplicative(input: &mut &str) -> ModalResult<Expr> {
    left_assoc(input, power, multiplicative_op)
}

fn multiplicative_op(input: &mut &str) -> ModalResult<BinaryOp> {
    alt((
        terminated('*', not('*')).value(BinaryOp::Mul),
        '/'.value(BinaryOp::Div),
        '%'.value(BinaryOp::Rem),
    ))
    .parse_next(input)
}

fn power(input: &mut &str) -> ModalResult<Expr> {
    let base = unary.parse_next(input)?;
    if opt(preceded(multispace0, "**")).parse_next(input)?.is_none() {
        return Ok(base);
    }
    let exponent = cut_err(preceded(multispace0, power)).parse_next(input)?;
    Ok(Expr::Binary(
        BinaryOp::Pow,
        Box::new(base),
        Box::new(exponent),
    ))
}

fn unary(input: &mut &str) -> ModalResult<Expr> {
    alt((
        preceded(('-', multispace0), unary).map(|e| Expr::Unary(UnaryOp::Negate, Box::new(e))),
        preceded(('!', multispace0), unary).map(|e| Expr::Unary(UnaryOp::Not, Box::new(e))),
        primary,
    ))
    .parse_next(input)
}

fn primary(input: &mut &str) -> ModalResult<Expr> {
    alt((
        number,
        string_literal,
        identifier,
        delimited(
            ('(', multispace0),
            ternary,
            (
                multispace0,
                cut_err(')').context(StrContext::Expected(StrContextValue::CharLiteral(')'))),
            ),
        ),
    ))
    .context(StrContext::Label("value"))
    .parse_next(input)
}

fn number(input: &mut &str) -> ModalResult<Expr> {
    (digit1, opt(('.', digit1)))
        .take()
        .try_map(str::parse::<f64>)
        .map(Expr::Number)
        .parse_next(input)
}

fn string_literal(input: &mut &str) -> ModalResult<Expr> {
    alt((
        delimited('\'', take_till(0.., '\''), cut_err('\'')),
        delimited('"', take_till(0.., '"'), cut_err('"')),
    ))
    .map(|s: &str| Expr::Text(s.to_string()))
    .parse_next(input)
}

fn identifier(input: &mut &str) -> ModalResult<Expr> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
    )
        .take()
        .map(|name: &str| match name {
            "true" => Expr::Bool(true),
            "false" => Expr::Bool(false),
            _ => Expr::Variable(name.to_string()),
        })
        .parse_next(input)
}

impl Expr {
    /// Names of all variables referenced, in order of appearance.
    pub fn variables(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Expr::Variable(name) => {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
            Expr::Unary(_, inner) => inner.collect_variables(names),
            Expr::Binary(_, lhs, rhs) => {
                lhs.collect_variables(names);
                rhs.collect_variables(names);
            }
            Expr::Ternary(condition, then, otherwise) => {
                condition.collect_variables(names);
                then.collect_variables(names);
                otherwise.collect_variables(names);
            }
            Expr::Number(_) | Expr::Text(_) | Expr::Bool(_) => {}
        }
    }

    /// Evaluate against a set of bindings.
    pub fn eval(&self, env: &Bindings) -> Result<Scalar> {
        match self {
            Expr::Number(n) => Ok(Scalar::Number(*n)),
            Expr::Text(s) => Ok(Scalar::Text(s.clone())),
            Expr::Bool(b) => Ok(Scalar::Bool(*b)),
            Expr::Variable(name) => env
                .get(name)
                .cloned()
                .ok_or_else(|| Error::runtime(format!("no value bound to '{}'", name))),
            Expr::Unary(op, inner) => match (op, inner.eval(env)?) {
                (UnaryOp::Negate, Scalar::Number(n)) => Ok(Scalar::Number(-n)),
                (UnaryOp::Not, Scalar::Bool(b)) => Ok(Scalar::Bool(!b)),
                (UnaryOp::Negate, other) => Err(Error::runtime(format!(
                    "cannot negate {}",
                    other.type_name()
                ))),
                (UnaryOp::Not, other) => Err(Error::runtime(format!(
                    "cannot apply '!' to {}",
                    other.type_name()
                ))),
            },
            Expr::Binary(BinaryOp::And, lhs, rhs) => match lhs.eval(env)? {
                Scalar::Bool(false) => Ok(Scalar::Bool(false)),
                Scalar::Bool(true) => expect_bool(BinaryOp::And, rhs.eval(env)?),
                other => Err(operand_error(BinaryOp::And, &other)),
            },
            Expr::Binary(BinaryOp::Or, lhs, rhs) => match lhs.eval(env)? {
                Scalar::Bool(true) => Ok(Scalar::Bool(true)),
                Scalar::Bool(false) => expect_bool(BinaryOp::Or, rhs.eval(env)?),
                other => Err(operand_error(BinaryOp::Or, &other)),
            },
            Expr::Binary(op, lhs, rhs) => binary(*op, lhs.eval(env)?, rhs.eval(env)?),
            Expr::Ternary(condition, then, otherwise) => match condition.eval(env)? {
                Scalar::Bool(true) => then.eval(env),
                Scalar::Bool(false) => otherwise.eval(env),
                other => Err(Error::runtime(format!(
                    "condition must be boolean, got {}",
                    other.type_name()
                ))),
            },
        }
    }
}

fn expect_bool(op: BinaryOp, value: Scalar) -> Result<Scalar> {
    match value {
        Scalar::Bool(b) => Ok(Scalar::Bool(b)),
        other => Err(operand_error(op, &other)),
    }
}

fn operand_error(op: BinaryOp, value: &Scalar) -> Error {
    Error::runtime(format!(
        "cannot apply '{}' to {}",
        op.symbol(),
        value.type_name()
    ))
}

fn binary(op: BinaryOp, lhs: Scalar, rhs: Scalar) -> Result<Scalar> {
    use Scalar::{Number, Text};

    match op {
        BinaryOp::Add => match (lhs, rhs) {
            (Number(a), Number(b)) => Ok(Number(a + b)),
            (a @ Text(_), b) | (a, b @ Text(_)) => Ok(Text(format!("{}{}", a, b))),
            (a, _) => Err(operand_error(op, &a)),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem | BinaryOp::Pow => {
            let (a, b) = match (lhs, rhs) {
                (Number(a), Number(b)) => (a, b),
                (Number(_), other) | (other, _) => return Err(operand_error(op, &other)),
            };
            match op {
                BinaryOp::Sub => Ok(Number(a - b)),
                BinaryOp::Mul => Ok(Number(a * b)),
                BinaryOp::Div | BinaryOp::Rem if b == 0.0 => {
                    Err(Error::runtime("division by zero"))
                }
                BinaryOp::Div => Ok(Number(a / b)),
                BinaryOp::Rem => Ok(Number(a % b)),
                _ => Ok(Number(a.powf(b))),
            }
        }
        BinaryOp::Eq => Ok(Scalar::Bool(loose_eq(&lhs, &rhs))),
        BinaryOp::Ne => Ok(Scalar::Bool(!loose_eq(&lhs, &rhs))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (&lhs, &rhs) {
                (Number(a), Number(b)) => a.partial_cmp(b),
                (Text(a), Text(b)) => Some(a.cmp(b)),
                _ => None,
            };
            let Some(ordering) = ordering else {
                return Err(Error::runtime(format!(
                    "cannot compare {} with {}",
                    lhs.type_name(),
                    rhs.type_name()
                )));
            };
            Ok(Scalar::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        BinaryOp::Matches | BinaryOp::NotMatches => {
            let pattern = Regex::new(&rhs.to_string())
                .map_err(|e| Error::runtime(format!("invalid pattern: {}", e)))?;
            let matched = pattern.is_match(&lhs.to_string());
            Ok(Scalar::Bool(matched == (op == BinaryOp::Matches)))
        }
        BinaryOp::And | BinaryOp::Or => match (lhs, rhs) {
            (Scalar::Bool(a), Scalar::Bool(b)) => Ok(Scalar::Bool(if op == BinaryOp::And {
                a && b
            } else {
                a || b
            })),
            (Scalar::Bool(_), other) | (other, _) => Err(operand_error(op, &other)),
        },
    }
}

fn loose_eq(lhs: &Scalar, rhs: &Scalar) -> bool {
    match (lhs, rhs) {
        (Scalar::Document(doc), Scalar::Text(text)) | (Scalar::Text(text), Scalar::Document(doc)) => {
            scalar_text(doc) == *text
        }
        _ => lhs == rhs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(source: &str, env: &[(&str, Scalar)]) -> Scalar {
        let expr = parse_expression(source).unwrap();
        let env: Bindings = env
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        expr.eval(&env).unwrap()
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(eval("1 + 2 * 3", &[]), Scalar::Number(7.0));
        assert_eq!(eval("(1 + 2) * 3", &[]), Scalar::Number(9.0));
        assert_eq!(eval("2 ** 3 ** 2", &[]), Scalar::Number(512.0));
        assert_eq!(eval("10 - 4 - 3", &[]), Scalar::Number(3.0));
        assert_eq!(eval("-2 + 5", &[]), Scalar::Number(3.0));
        assert_eq!(eval("7 % 4", &[]), Scalar::Number(3.0));
    }

    #[test]
    fn variables_from_bindings() {
        let value = eval(
            "(col2/col3)+1/3",
            &[("col2", Scalar::Number(10.0)), ("col3", Scalar::Number(10.0))],
        );
        match value {
            Scalar::Number(n) => assert!((n - 4.0 / 3.0).abs() < 1e-9),
            other => panic!("expected number, got {:?}", other),
        }
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(
            eval("name + '-' + 1", &[("name", Scalar::Text("pod".to_string()))]),
            Scalar::Text("pod-1".to_string())
        );
    }

    #[test]
    fn comparisons_and_logic() {
        assert_eq!(eval("3 > 2 && 'a' < 'b'", &[]), Scalar::Bool(true));
        assert_eq!(eval("1 == 2 || !false", &[]), Scalar::Bool(true));
        assert_eq!(eval("'x' != \"x\"", &[]), Scalar::Bool(false));
    }

    #[test]
    fn ternary_selects_branch() {
        assert_eq!(
            eval("lag > 0 ? 'behind' : 'ok'", &[("lag", Scalar::Number(0.0))]),
            Scalar::Text("ok".to_string())
        );
    }

    #[test]
    fn regex_match() {
        assert_eq!(
            eval("host =~ '^10\\.'", &[("host", Scalar::Text("10.9.27.3".to_string()))]),
            Scalar::Bool(true)
        );
        assert_eq!(eval("'abc' !~ 'b'", &[]), Scalar::Bool(false));
    }

    #[test]
    fn document_compares_against_text() {
        let doc = Scalar::Document(json!({"a": 1}));
        assert_eq!(eval("field != ''", &[("field", doc)]), Scalar::Bool(true));
    }

    #[test]
    fn collects_variables_once() {
        let expr = parse_expression("col1 + col2 * col1").unwrap();
        assert_eq!(expr.variables(), vec!["col1", "col2"]);
    }

    #[test]
    fn division_by_zero_is_error() {
        let expr = parse_expression("1 / 0").unwrap();
        let err = expr.eval(&Bindings::new()).unwrap_err();
        assert_eq!(err.to_string(), "division by zero");
    }

    #[test]
    fn unbound_variable_is_error() {
        let expr = parse_expression("col9 + 1").unwrap();
        assert!(expr.eval(&Bindings::new()).is_err());
    }

    #[test]
    fn text_arithmetic_is_error() {
        let expr = parse_expression("'a' * 2").unwrap();
        assert!(expr.eval(&Bindings::new()).is_err());
    }

    #[test]
    fn parse_errors_point_at_offset() {
        let err = parse_expression("1 +").unwrap_err();
        assert!(err.starts_with("invalid expression"));
        assert!(parse_expression("(1 + 2").is_err());
        assert!(parse_expression("1 2").is_err());
    }

    #[test]
    fn whole_numbers_become_integers() {
        assert_eq!(Scalar::Number(42.0).into_value(), Value::Int(42));
        assert_eq!(Scalar::Number(1.5).into_value(), Value::Float(1.5));
        assert_eq!(
            Scalar::Bool(true).into_value(),
            Value::Text("true".to_string())
        );
    }
}

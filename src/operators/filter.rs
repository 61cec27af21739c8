use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value as Json;
use tracing::debug;

use crate::error::{Error, Result};
use crate::expr::{Bindings, Scalar, parse_expression};
use crate::format::FilterDef;

use super::flatten::{lookup, split_key};

/// Matches a `[dotted.key.path]` placeholder.
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\[\]]+)\]").expect("placeholder pattern is valid"));

impl FilterDef {
    /// Compile `filter..` text. `[a.b.c]` refers to the value at that path.
    pub fn compile(source: &str) -> Result<Self> {
        let mut keys: Vec<String> = Vec::new();
        let rewritten = PLACEHOLDER.replace_all(source, |caps: &Captures| {
            let key = caps[1].trim().to_string();
            let index = match keys.iter().position(|k| *k == key) {
                Some(index) => index,
                None => {
                    keys.push(key);
                    keys.len() - 1
                }
            };
            format!("key{}", index)
        });
        let expr = parse_expression(&rewritten).map_err(Error::runtime)?;
        Ok(Self {
            source: source.to_string(),
            expr,
            paths: keys.iter().map(|k| split_key(k)).collect(),
        })
    }

    /// True when the expression evaluates to `true` for the document.
    pub fn matches(&self, document: &Json) -> bool {
        let bindings: Bindings = self
            .paths
            .iter()
            .enumerate()
            .map(|(i, path)| (format!("key{}", i), Scalar::from_json(&lookup(document, path))))
            .collect();

        match self.expr.eval(&bindings) {
            Ok(Scalar::Bool(keep)) => keep,
            Ok(other) => {
                debug!(filter = %self.source, result = %other, "filter result is not boolean");
                false
            }
            Err(err) => {
                debug!(filter = %self.source, error = %err, "filter evaluation failed");
                false
            }
        }
    }
}

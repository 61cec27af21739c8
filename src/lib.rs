//! Slice, group, sort, compute over and re-render tabular or hierarchical
//! text.

pub mod error;
pub mod expr;
pub mod format;
pub mod input;
pub mod operators;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod range;
pub mod settings;
pub mod value;

//! Pipeline operators.
//!
//! Whole-table stages (`GroupBy`, `Calculate`, `SortRows`) implement
//! `Transform`. Record extraction and document flattening run while input is
//! read.

mod calc;
mod extract;
mod filter;
mod flatten;
mod group;
mod sort;

pub use calc::Calculate;
pub use extract::{Extract, rewrite, split_literal};
pub use flatten::{
    KeyTree, discover_keys, display_key, flatten_document, join_key, lookup, normalize_key,
    split_key,
};
pub use group::GroupBy;
pub use sort::{SortRows, compare};

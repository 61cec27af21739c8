//! Index ranges for row and column selection.
//!
//! A range is written inside brackets in a command token, e.g. `col[0,2]`,
//! `row[1:10]`, `ncol[-1]`. The textual forms are:
//!
//! | Form      | Meaning                                  |
//! |-----------|------------------------------------------|
//! | `n`       | the single index `n` (may be negative)   |
//! | `a:b`     | half-open interval, either side optional |
//! | `a,b,...` | explicit list, each part parsed alone    |
//! | `a-b`     | dash interval `a..b` (exclusive end)     |
//!
//! Negative indices count from the end and are resolved once the container
//! length is known.

use std::collections::HashSet;

/// A parsed index selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexRange {
    pub start: Option<i64>,
    pub end: Option<i64>,
    /// Explicit indices; when present `start`/`end` are ignored.
    pub indices: Option<Vec<i64>>,
    /// Select the complement instead.
    pub exclude: bool,
}

impl IndexRange {
    /// Range that selects everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Parse the text between the brackets of a range token.
    ///
    /// Unparseable text yields a range that selects nothing.
    pub fn parse(spec: &str) -> Self {
        let spec = spec.trim();

        if let Ok(index) = spec.parse::<i64>() {
            return Self::from_indices(vec![index]);
        }

        if spec.contains(':') {
            let mut parts = spec.split(':');
            let start = parts.next().and_then(|s| s.trim().parse().ok());
            let end = parts.next().and_then(|s| s.trim().parse().ok());
            return Self {
                start,
                end,
                ..Self::default()
            };
        }

        if spec.contains(',') {
            let indices = spec
                .split(',')
                .flat_map(|part| Self::parse(part).indices.unwrap_or_default())
                .collect();
            return Self::from_indices(indices);
        }

        Self::from_indices(resolve_bounds(&dash_bounds(spec)))
    }

    /// Parse a range that selects the complement of `spec`.
    pub fn parse_excluding(spec: &str) -> Self {
        Self {
            exclude: true,
            ..Self::parse(spec)
        }
    }

    pub fn from_indices(indices: Vec<i64>) -> Self {
        Self {
            indices: Some(indices),
            ..Self::default()
        }
    }

    /// True when this range selects everything.
    pub fn is_all(&self) -> bool {
        !self.exclude && self.indices.is_none() && self.start.is_none() && self.end.is_none()
    }

    /// True when membership can only be decided with the total length known.
    pub fn needs_length(&self) -> bool {
        match &self.indices {
            Some(indices) => indices.iter().any(|&i| i < 0),
            None => self.start.is_some_and(|s| s < 0) || self.end.is_some_and(|e| e < 0),
        }
    }

    /// Resolve to concrete positions for a container of `len` elements.
    ///
    /// Without `exclude` the positions follow the selection order and may
    /// fall outside `0..len`. With `exclude` the result is the in-bounds
    /// complement in original order.
    pub fn positions(&self, len: usize) -> Vec<i64> {
        let len = len as i64;
        let resolve = |i: i64| if i < 0 { len + i } else { i };

        match &self.indices {
            Some(indices) if self.exclude => {
                let excluded: HashSet<i64> = indices.iter().map(|&i| resolve(i)).collect();
                (0..len).filter(|i| !excluded.contains(i)).collect()
            }
            Some(indices) => indices.iter().map(|&i| resolve(i)).collect(),
            None => {
                let span = self.start.map_or(0, resolve)..self.end.map_or(len, resolve);
                if self.exclude {
                    (0..len).filter(|i| !span.contains(i)).collect()
                } else {
                    span.collect()
                }
            }
        }
    }

    /// Positions that exist in a container of `len` elements.
    pub fn positions_in_bounds(&self, len: usize) -> Vec<usize> {
        self.positions(len)
            .into_iter()
            .filter(|&i| i >= 0 && (i as usize) < len)
            .map(|i| i as usize)
            .collect()
    }

    /// Select elements by this range, pairing each with its original index.
    ///
    /// Out-of-bounds positions yield `None` so callers can substitute an
    /// empty value.
    pub fn select<'a, T>(&self, items: &'a [T]) -> Vec<(Option<&'a T>, i64)> {
        self.positions(items.len())
            .into_iter()
            .map(|i| {
                let item = usize::try_from(i).ok().and_then(|i| items.get(i));
                (item, i)
            })
            .collect()
    }

    /// Membership test for a streamed position.
    ///
    /// `len` is the total number of elements when known; negative bounds
    /// never match without it.
    pub fn contains(&self, index: usize, len: Option<usize>) -> bool {
        let index = index as i64;
        let resolve = |i: i64| match len {
            Some(len) if i < 0 => Some(len as i64 + i),
            None if i < 0 => None,
            _ => Some(i),
        };

        let inside = match &self.indices {
            Some(indices) => indices.iter().any(|&i| resolve(i) == Some(index)),
            None => {
                let start = match self.start {
                    Some(s) => resolve(s),
                    None => Some(0),
                };
                let end = match self.end {
                    Some(e) => resolve(e),
                    None => Some(i64::MAX),
                };
                match (start, end) {
                    (Some(start), Some(end)) => start <= index && index < end,
                    _ => false,
                }
            }
        };

        inside != self.exclude
    }
}

/// Scan a dash-delimited range such as `10-12`, `-10-12` or `-10--12`
/// into its numeric bounds.
///
/// A leading `-` marks the first number negative. A `-` directly after
/// another separator marks the following number negative.
pub fn dash_bounds(spec: &str) -> Vec<i64> {
    let chars: Vec<char> = spec.chars().collect();
    let mut bounds = Vec::new();
    let mut digits = String::new();
    let mut negative = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '-' {
            if i == 0 {
                negative = true;
            } else {
                let Ok(value) = digits.parse::<i64>() else {
                    return Vec::new();
                };
                bounds.push(if negative { -value } else { value });
                digits.clear();

                match chars.get(i + 1) {
                    Some('-') => {
                        negative = true;
                        i += 1;
                    }
                    Some(c) if c.is_ascii_digit() => negative = false,
                    Some(_) => {}
                    None => return Vec::new(),
                }
            }
        } else if c.is_ascii_digit() {
            digits.push(c);
        }
        i += 1;
    }

    if !digits.is_empty() {
        match digits.parse::<i64>() {
            Ok(value) => bounds.push(if negative { -value } else { value }),
            Err(_) => return Vec::new(),
        }
    }

    bounds
}

/// Expand scanned bounds into indices: one bound selects itself, two
/// bounds select `lower..upper`, anything else selects nothing.
pub fn resolve_bounds(bounds: &[i64]) -> Vec<i64> {
    match bounds {
        [single] => vec![*single],
        [lower, upper] if upper > lower => (*lower..*upper).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_single_index() {
        assert_eq!(IndexRange::parse("10").indices, Some(vec![10]));
        assert_eq!(IndexRange::parse("-10").indices, Some(vec![-10]));
    }

    #[test]
    fn parse_index_list() {
        assert_eq!(IndexRange::parse("10,20").indices, Some(vec![10, 20]));
        assert_eq!(IndexRange::parse("10, -20").indices, Some(vec![10, -20]));
    }

    #[test]
    fn parse_colon_interval() {
        let range = IndexRange::parse("10:20");
        assert_eq!(range.start, Some(10));
        assert_eq!(range.end, Some(20));
        assert_eq!(range.indices, None);

        let open_end = IndexRange::parse("10:");
        assert_eq!(open_end.start, Some(10));
        assert_eq!(open_end.end, None);

        let open_start = IndexRange::parse(":20");
        assert_eq!(open_start.start, None);
        assert_eq!(open_start.end, Some(20));
    }

    #[test]
    fn dash_bounds_with_signs() {
        assert_eq!(dash_bounds("10-12"), vec![10, 12]);
        assert_eq!(dash_bounds("-10-12"), vec![-10, 12]);
        assert_eq!(dash_bounds("-10--12"), vec![-10, -12]);
        assert_eq!(dash_bounds("10--12"), vec![10, -12]);
    }

    #[test]
    fn dash_bounds_trailing_dash_is_empty() {
        assert!(dash_bounds("3-").is_empty());
    }

    #[test]
    fn parse_dash_interval() {
        assert_eq!(IndexRange::parse("10-12").indices, Some(vec![10, 11]));
        assert_eq!(
            IndexRange::parse("-10-1").indices,
            Some((-10..1).collect::<Vec<_>>())
        );
        assert_eq!(IndexRange::parse("-10--12").indices, Some(vec![]));
        assert_eq!(IndexRange::parse("-12--10").indices, Some(vec![-12, -11]));
    }

    #[test]
    fn unparseable_selects_nothing() {
        let range = IndexRange::parse("abc");
        assert_eq!(range.positions(5), Vec::<i64>::new());
    }

    #[test]
    fn positions_resolve_negative_indices() {
        let range = IndexRange::parse("-1");
        assert_eq!(range.positions(4), vec![3]);

        let interval = IndexRange::parse("-2:");
        assert_eq!(interval.positions(4), vec![2, 3]);
    }

    #[test]
    fn positions_keep_out_of_bounds() {
        let range = IndexRange::parse("1,7");
        assert_eq!(range.positions(3), vec![1, 7]);
        assert_eq!(range.positions_in_bounds(3), vec![1]);
    }

    #[test]
    fn interval_yields_exactly_its_width() {
        let range = IndexRange::parse("1:4");
        let items = ["a", "b"];
        let selected = range.select(&items);
        assert_eq!(selected.len(), 3);
        assert_eq!(selected[0], (Some(&"b"), 1));
        assert_eq!(selected[1], (None, 2));
    }

    #[test]
    fn excluded_positions_keep_original_order() {
        let range = IndexRange::parse_excluding("-1");
        assert_eq!(range.positions(4), vec![0, 1, 2]);

        let range = IndexRange::parse_excluding("2,0");
        assert_eq!(range.positions(4), vec![1, 3]);
    }

    #[test]
    fn empty_interval_when_end_not_after_start() {
        let range = IndexRange::parse("5:5");
        assert!(range.positions(10).is_empty());
        let range = IndexRange::parse("7:3");
        assert!(range.positions(10).is_empty());
    }

    #[test]
    fn contains_streamed_rows() {
        let range = IndexRange::parse("17:18");
        assert!(range.contains(17, None));
        assert!(!range.contains(16, None));
        assert!(!range.contains(18, None));

        assert!(IndexRange::all().contains(1000, None));
    }

    #[test]
    fn contains_negative_needs_length() {
        let range = IndexRange::parse("-2:");
        assert!(range.needs_length());
        assert!(!range.contains(8, None));
        assert!(range.contains(8, Some(10)));
        assert!(!range.contains(7, Some(10)));
    }

    #[test]
    fn contains_excluded() {
        let range = IndexRange::parse_excluding("3");
        assert!(!range.contains(3, None));
        assert!(range.contains(4, None));
    }

    #[test]
    fn excluding_wide_span_stays_in_bounds() {
        let range = IndexRange::parse_excluding("1:1000000000");
        assert_eq!(range.positions(3), vec![0]);
    }

    #[test]
    fn excluding_list_keeps_original_order() {
        let range = IndexRange::parse_excluding("0,-1,0");
        assert_eq!(range.positions(5), vec![1, 2, 3]);
    }
}

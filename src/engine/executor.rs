use serde::Serialize;
use tracing::debug;

use super::predicate::{split_row, ColumnLayout, Predicate};
use crate::error::DbResult;

/// Rows produced by a SELECT, projected in the requested column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultSet {
    /// Names of the projected columns that resolved
    pub columns: Vec<String>,
    /// One entry per matching row
    pub rows: Vec<Vec<String>>,
}

impl ResultSet {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Requested columns resolved against a row layout.
///
/// Names that do not resolve are dropped without error, as are offsets a
/// particular row is too short to hold.
#[derive(Debug, Clone)]
pub struct Projection {
    names: Vec<String>,
    offsets: Vec<usize>,
}

impl Projection {
    pub fn resolve(layout: &ColumnLayout, requested: &[String]) -> Self {
        let mut names = Vec::with_capacity(requested.len());
        let mut offsets = Vec::with_capacity(requested.len());
        for name in requested {
            match layout.resolve(name) {
                Some(offset) => {
                    names.push(name.trim().to_string());
                    offsets.push(offset);
                }
                None => debug!(column = %name, "projection column skipped"),
            }
        }
        Self { names, offsets }
    }

    pub fn apply(&self, fields: &[String]) -> Vec<String> {
        self.offsets
            .iter()
            .filter_map(|&offset| fields.get(offset).cloned())
            .collect()
    }

    fn empty_result(&self) -> ResultSet {
        ResultSet {
            columns: self.names.clone(),
            rows: Vec::new(),
        }
    }
}

/// Filters and projects the data rows of one table.
///
/// ## Query Processing Pipeline
/// ```text
/// Segment lines → Split fields → Predicate filter → Column projection → Results
/// ```
///
/// ## Arguments
/// * `rows` - Raw data lines (headers already skipped)
/// * `layout` - Column layout of the table
/// * `pred` - Parsed WHERE clause
/// * `cols` - Requested column names
///
/// ## Returns
/// * `Ok(result)` - Matching rows in segment order
/// * `Err(_)` - A numeric comparison on non-integer text
pub fn execute_select_scan(
    rows: &[String],
    layout: &ColumnLayout,
    pred: &Predicate,
    cols: &[String],
) -> DbResult<ResultSet> {
    let projection = Projection::resolve(layout, cols);
    let mut out = projection.empty_result();
    for row in rows {
        let fields = split_row(row);
        if pred.matches(layout, &fields)? {
            out.rows.push(projection.apply(&fields));
        }
    }
    Ok(out)
}

/// Nested-loop join of two row sets.
///
/// Every left row is paired with every right row; each pair is concatenated
/// into one combined row (left fields first) and kept when the predicate
/// matches it. Cost is O(n·m) in the two row counts.
///
/// The predicate only sees the left table's columns: a clause naming a
/// right-table column never matches.
///
/// ## Arguments
/// * `left`, `right` - Raw data lines of the two tables
/// * `filter_layout` - Layout of the left table, used for `pred`
/// * `output_layout` - Combined layout, see [`ColumnLayout::joined`]
/// * `pred` - WHERE clause evaluated against the combined row
/// * `cols` - Requested column names, resolved against `output_layout`
pub fn execute_join(
    left: &[String],
    right: &[String],
    filter_layout: &ColumnLayout,
    output_layout: &ColumnLayout,
    pred: &Predicate,
    cols: &[String],
) -> DbResult<ResultSet> {
    let projection = Projection::resolve(output_layout, cols);
    let right_fields: Vec<Vec<String>> = right.iter().map(|r| split_row(r)).collect();

    let mut out = projection.empty_result();
    for l in left {
        let left_fields = split_row(l);
        for r in &right_fields {
            let mut combined = Vec::with_capacity(left_fields.len() + r.len());
            combined.extend(left_fields.iter().cloned());
            combined.extend(r.iter().cloned());
            if pred.matches(filter_layout, &combined)? {
                out.rows.push(projection.apply(&combined));
            }
        }
    }
    Ok(out)
}

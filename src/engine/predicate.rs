//! WHERE clause parsing and evaluation.
//!
//! A clause is a single comparison `<column> <op> <value>` with `op` one of
//! `=`, `>` or `<`. Rows are raw segment lines; fields are split on the
//! delimiter and trimmed of spaces and quotes before comparing.

use std::fmt;

use tracing::{debug, warn};

use super::storage::DELIMITER;
use crate::error::{DbError, DbResult};

/// Comparison operator of a clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Exact, case-sensitive text equality
    Eq,
    /// Integer greater-than
    Gt,
    /// Integer less-than
    Lt,
}

impl CompareOp {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '=' => Some(CompareOp::Eq),
            '>' => Some(CompareOp::Gt),
            '<' => Some(CompareOp::Lt),
            _ => None,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Eq => "=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
        };
        f.write_str(s)
    }
}

/// A parsed WHERE clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Empty clause: every row matches.
    Always,
    /// Clause without any operator: no row matches.
    Malformed(String),
    /// `column op value`
    Compare {
        column: String,
        op: CompareOp,
        value: String,
    },
}

impl Predicate {
    /// Parses a clause. The operator is the first of `=`, `>`, `<` in the text.
    pub fn parse(clause: &str) -> Self {
        let clause = clause.trim();
        if clause.is_empty() {
            return Predicate::Always;
        }

        let found = clause
            .char_indices()
            .find_map(|(pos, c)| CompareOp::from_char(c).map(|op| (pos, op)));

        match found {
            Some((pos, op)) => Predicate::Compare {
                column: clause[..pos].trim().to_string(),
                op,
                value: clean_field(&clause[pos + 1..]).to_string(),
            },
            None => {
                warn!(%clause, "no comparison operator in WHERE clause, nothing will match");
                Predicate::Malformed(clause.to_string())
            }
        }
    }

    /// Tests a raw segment line.
    pub fn matches_row(&self, layout: &ColumnLayout, row: &str) -> DbResult<bool> {
        self.matches(layout, &split_row(row))
    }

    /// Tests an already split row.
    ///
    /// Unresolved columns and rows too short to hold the column never match.
    /// Ordering comparisons on non-integer text fail the whole statement.
    pub fn matches(&self, layout: &ColumnLayout, fields: &[String]) -> DbResult<bool> {
        let (column, op, value) = match self {
            Predicate::Always => return Ok(true),
            Predicate::Malformed(clause) => {
                debug!(%clause, "malformed clause, row rejected");
                return Ok(false);
            }
            Predicate::Compare { column, op, value } => (column, *op, value),
        };

        let Some(offset) = layout.resolve(column) else {
            debug!(%column, "column not found");
            return Ok(false);
        };
        let Some(cell) = fields.get(offset) else {
            return Ok(false);
        };
        debug!(%column, offset, %cell, %op, %value, "evaluating");

        match op {
            CompareOp::Eq => Ok(cell == value),
            CompareOp::Gt | CompareOp::Lt => {
                let numeric_err = || DbError::NumericComparison {
                    column: column.clone(),
                    left: cell.clone(),
                    right: value.clone(),
                };
                let left: i64 = cell.parse().map_err(|_| numeric_err())?;
                let right: i64 = value.parse().map_err(|_| numeric_err())?;
                Ok(if op == CompareOp::Gt {
                    left > right
                } else {
                    left < right
                })
            }
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Always => f.write_str("<all>"),
            Predicate::Malformed(clause) => write!(f, "<malformed: {}>", clause),
            Predicate::Compare { column, op, value } => write!(f, "{}{}{}", column, op, value),
        }
    }
}

/// Strips surrounding spaces and quote characters from a field.
pub fn clean_field(field: &str) -> &str {
    field.trim_matches(|c: char| c == ' ' || c == '"' || c == '\'')
}

/// Splits a segment line into cleaned fields.
pub fn split_row(row: &str) -> Vec<String> {
    row.split(DELIMITER)
        .map(|f| clean_field(f).to_string())
        .collect()
}

/// One table's slice of a row layout.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LayoutSection {
    table: String,
    columns: Vec<String>,
    /// Offset of this table's primary key within the row.
    base: usize,
}

impl LayoutSection {
    fn width(&self) -> usize {
        self.columns.len() + 1
    }

    fn resolve(&self, column: &str) -> Option<usize> {
        if column.strip_suffix("_pk") == Some(self.table.as_str()) {
            return Some(self.base);
        }
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.base + 1 + i)
    }
}

/// Maps column names to field offsets for a single table's rows or for the
/// concatenated rows of a join.
///
/// A single table lays out as `[pk, c1, ..., cN]`. A join appends the second
/// table after the first: `[a_pk, a1, ..., b_pk, b1, ...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    sections: Vec<LayoutSection>,
}

impl ColumnLayout {
    pub fn single(table: &str, columns: &[String]) -> Self {
        Self {
            sections: vec![LayoutSection {
                table: table.to_string(),
                columns: columns.to_vec(),
                base: 0,
            }],
        }
    }

    /// Layout of `left` rows followed by `right` rows.
    pub fn joined(left: &ColumnLayout, right: &ColumnLayout) -> Self {
        let shift = left.width();
        let mut sections = left.sections.clone();
        sections.extend(right.sections.iter().map(|s| LayoutSection {
            base: s.base + shift,
            ..s.clone()
        }));
        Self { sections }
    }

    /// Number of fields in a row of this layout.
    pub fn width(&self) -> usize {
        self.sections.iter().map(LayoutSection::width).sum()
    }

    /// Resolves a possibly qualified column name to a field offset.
    ///
    /// `table.column` only looks inside `table`. Bare names are looked up in
    /// layout order, so the first table wins when both carry the name.
    pub fn resolve(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        if let Some((table, column)) = name.split_once('.') {
            return self
                .sections
                .iter()
                .find(|s| s.table == table)
                .and_then(|s| s.resolve(column));
        }
        self.sections.iter().find_map(|s| s.resolve(name))
    }

    /// Every column of every table. Names are qualified when the layout spans
    /// more than one table.
    pub fn all_columns(&self) -> Vec<String> {
        let qualify = self.sections.len() > 1;
        self.sections
            .iter()
            .flat_map(|s| {
                s.columns.iter().map(move |c| {
                    if qualify {
                        format!("{}.{}", s.table, c)
                    } else {
                        c.clone()
                    }
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> ColumnLayout {
        ColumnLayout::single("people", &["name".to_string(), "age".to_string()])
    }

    #[test]
    fn test_parse_picks_first_operator() {
        assert_eq!(Predicate::parse(""), Predicate::Always);
        assert_eq!(Predicate::parse("   "), Predicate::Always);
        assert_eq!(
            Predicate::parse("age > 25"),
            Predicate::Compare {
                column: "age".into(),
                op: CompareOp::Gt,
                value: "25".into()
            }
        );
        // '<' comes first, the rest belongs to the literal.
        assert_eq!(
            Predicate::parse("a<b=c"),
            Predicate::Compare {
                column: "a".into(),
                op: CompareOp::Lt,
                value: "b=c".into()
            }
        );
        assert_eq!(
            Predicate::parse("name = 'ann'"),
            Predicate::Compare {
                column: "name".into(),
                op: CompareOp::Eq,
                value: "ann".into()
            }
        );
        assert!(matches!(Predicate::parse("age 25"), Predicate::Malformed(_)));
    }

    #[test]
    fn test_age_comparisons() {
        let layout = people();
        let row = "7,bob,30";
        assert!(Predicate::parse("age>25").matches_row(&layout, row).unwrap());
        assert!(!Predicate::parse("age<25").matches_row(&layout, row).unwrap());
        assert!(Predicate::parse("age=30").matches_row(&layout, row).unwrap());
        assert!(!Predicate::parse("age=31").matches_row(&layout, row).unwrap());
    }

    #[test]
    fn test_equality_is_case_sensitive_text() {
        let layout = people();
        let row = "1, \"Ann\" ,30";
        assert!(Predicate::parse("name=Ann").matches_row(&layout, row).unwrap());
        assert!(!Predicate::parse("name=ann").matches_row(&layout, row).unwrap());
        assert!(!Predicate::parse("age=030").matches_row(&layout, row).unwrap());
    }

    #[test]
    fn test_unresolved_and_malformed_fail_closed() {
        let layout = people();
        let row = "1,ann,30";
        assert!(!Predicate::parse("height=3").matches_row(&layout, row).unwrap());
        assert!(!Predicate::parse("other.age=30").matches_row(&layout, row).unwrap());
        assert!(!Predicate::parse("nonsense").matches_row(&layout, row).unwrap());
        assert!(Predicate::parse("").matches_row(&layout, row).unwrap());
    }

    #[test]
    fn test_qualified_and_pk_columns() {
        let layout = people();
        let row = "4,ann,30";
        assert!(Predicate::parse("people.age=30").matches_row(&layout, row).unwrap());
        assert!(Predicate::parse("people_pk=4").matches_row(&layout, row).unwrap());
        assert!(Predicate::parse("people.people_pk>3").matches_row(&layout, row).unwrap());
    }

    #[test]
    fn test_numeric_comparison_error() {
        let layout = people();
        let err = Predicate::parse("name>3")
            .matches_row(&layout, "1,ann,30")
            .unwrap_err();
        assert!(matches!(err, DbError::NumericComparison { .. }));

        let err = Predicate::parse("age<abc")
            .matches_row(&layout, "1,ann,30")
            .unwrap_err();
        assert!(matches!(err, DbError::NumericComparison { .. }));
    }

    struct Capture(std::sync::Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_malformed_clause_warns_once() {
        let logs = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || Capture(sink.clone()))
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let pred = Predicate::parse("nonsense");
            for pk in 0..100 {
                let row = format!("{},ann,30", pk);
                assert!(!pred.matches_row(&people(), &row).unwrap());
            }
        });

        let text = String::from_utf8(logs.lock().clone()).unwrap();
        assert_eq!(text.matches("no comparison operator").count(), 1);
    }

    #[test]
    fn test_short_row_does_not_match() {
        assert!(!Predicate::parse("age=30").matches_row(&people(), "1,ann").unwrap());
    }

    #[test]
    fn test_joined_layout_offsets() {
        let a = ColumnLayout::single("a", &["id".to_string()]);
        let b = ColumnLayout::single("b", &["aid".to_string(), "id".to_string()]);
        let joined = ColumnLayout::joined(&a, &b);

        assert_eq!(joined.width(), 5);
        assert_eq!(joined.resolve("a_pk"), Some(0));
        assert_eq!(joined.resolve("id"), Some(1));
        assert_eq!(joined.resolve("b_pk"), Some(2));
        assert_eq!(joined.resolve("aid"), Some(3));
        assert_eq!(joined.resolve("b.id"), Some(4));
        assert_eq!(joined.resolve("c.id"), None);
        assert_eq!(joined.all_columns(), vec!["a.id", "b.aid", "b.id"]);
    }
}

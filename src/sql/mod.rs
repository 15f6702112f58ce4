//! Statement parsing and execution.
//!
//! Three statement shapes are understood:
//!
//! ```text
//! INSERT INTO <table> (<v1>, <v2>, ...)
//! DELETE FROM <table> [WHERE <clause>]
//! SELECT <cols|*> FROM <table>[, <table>] [WHERE <clause>]
//! ```
//!
//! Keywords are case-insensitive and a trailing `;` is ignored. Text is parsed
//! once into a [`Statement`]; execution never looks at the raw text again.

use std::fmt;

use tracing::debug;

use crate::engine::{clean_field, Catalog, ColumnLayout, Predicate, ResultSet};
use crate::error::{DbError, DbResult};

/// Column list of a SELECT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectColumns {
    /// `*`
    All,
    /// Explicit, possibly qualified, column names in output order
    Named(Vec<String>),
}

/// FROM list of a SELECT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FromClause {
    Single(String),
    Join(String, String),
}

/// A parsed statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Insert {
        table: String,
        values: Vec<String>,
    },
    Select {
        columns: SelectColumns,
        from: FromClause,
        predicate: Predicate,
    },
    Delete {
        table: String,
        predicate: Predicate,
    },
}

/// Result of executing one statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutput {
    Inserted { table: String, pk: u64 },
    Deleted { table: String, rows: usize },
    Rows(ResultSet),
}

impl fmt::Display for QueryOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryOutput::Inserted { pk, .. } => write!(f, "INSERT 1 (pk {})", pk),
            QueryOutput::Deleted { rows, .. } => write!(f, "DELETE {}", rows),
            QueryOutput::Rows(rs) if rs.is_empty() => f.write_str("(no rows)"),
            QueryOutput::Rows(rs) => {
                let json = serde_json::to_string_pretty(rs).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

/// Parses and executes one statement against the catalog.
///
/// ## Example
/// ```no_run
/// # use flatdb::{config::SchemaConfig, engine::Catalog, sql::plan_and_exec};
/// let schema = SchemaConfig::new("shop", 1000).with_table("users", &["name", "age"]);
/// let catalog = Catalog::open("./data", &schema)?;
/// plan_and_exec(&catalog, "INSERT INTO users ('ann', 30)")?;
/// let out = plan_and_exec(&catalog, "SELECT name FROM users WHERE age > 18")?;
/// println!("{}", out);
/// # Ok::<(), flatdb::error::DbError>(())
/// ```
pub fn plan_and_exec(catalog: &Catalog, sql: &str) -> DbResult<QueryOutput> {
    let stmt = parse(sql)?;
    debug!(?stmt, "parsed");
    execute(catalog, stmt)
}

/// Runs a parsed statement.
pub fn execute(catalog: &Catalog, stmt: Statement) -> DbResult<QueryOutput> {
    match stmt {
        Statement::Insert { table, values } => {
            let pk = catalog.insert(&table, &values)?;
            Ok(QueryOutput::Inserted { table, pk })
        }

        Statement::Delete { table, predicate } => {
            let rows = catalog.delete(&table, &predicate)?;
            Ok(QueryOutput::Deleted { table, rows })
        }

        Statement::Select {
            columns,
            from: FromClause::Single(table),
            predicate,
        } => {
            let cols = match columns {
                SelectColumns::All => catalog.resolve(&table)?.columns().to_vec(),
                SelectColumns::Named(cols) => cols,
            };
            Ok(QueryOutput::Rows(catalog.select(&table, &cols, &predicate)?))
        }

        Statement::Select {
            columns,
            from: FromClause::Join(left, right),
            predicate,
        } => {
            let cols = match columns {
                SelectColumns::All => {
                    let t1 = catalog.resolve(&left)?;
                    match catalog.resolve(&right) {
                        Ok(t2) => ColumnLayout::joined(t1.layout(), t2.layout()).all_columns(),
                        Err(_) => t1.columns().to_vec(),
                    }
                }
                SelectColumns::Named(cols) => cols,
            };
            Ok(QueryOutput::Rows(
                catalog.join_select(&left, &right, &cols, &predicate)?,
            ))
        }
    }
}

/// Parses statement text.
pub fn parse(sql: &str) -> DbResult<Statement> {
    let text = sql.trim().trim_end_matches(';').trim();
    let (command, rest) = split_first_word(text);

    match command.to_ascii_uppercase().as_str() {
        "INSERT" => parse_insert(rest),
        "SELECT" => parse_select(rest),
        "DELETE" => parse_delete(rest),
        "" => Err(DbError::syntax("empty statement")),
        _ => Err(DbError::UnknownCommand(command.to_string())),
    }
}

fn parse_insert(rest: &str) -> DbResult<Statement> {
    let rest = expect_keyword(rest, "INTO")?;
    let rest = rest.trim_start();
    let name_end = rest
        .find(|c: char| c.is_whitespace() || c == '(')
        .unwrap_or(rest.len());
    let table = &rest[..name_end];
    if table.is_empty() {
        return Err(DbError::syntax("INSERT needs a table name"));
    }

    let body = &rest[name_end..];
    let (start, end) = match body.find('(') {
        Some(start) => match body[start..].find(')') {
            Some(len) => (start, start + len),
            None => return Err(DbError::syntax("INSERT values must be in parentheses")),
        },
        None => return Err(DbError::syntax("INSERT values must be in parentheses")),
    };

    let inner = &body[start + 1..end];
    let values = if inner.trim().is_empty() {
        Vec::new()
    } else {
        inner.split(',').map(|v| clean_field(v).to_string()).collect()
    };

    Ok(Statement::Insert {
        table: table.to_string(),
        values,
    })
}

fn parse_delete(rest: &str) -> DbResult<Statement> {
    let rest = expect_keyword(rest, "FROM")?;
    let (target, predicate) = split_where(rest)?;
    let table = single_name(target, "DELETE")?;
    Ok(Statement::Delete { table, predicate })
}

fn parse_select(rest: &str) -> DbResult<Statement> {
    let (from_start, from_end) =
        find_keyword(rest, "FROM").ok_or_else(|| DbError::syntax("SELECT without FROM"))?;

    let cols_text = rest[..from_start].trim();
    let columns = if cols_text == "*" {
        SelectColumns::All
    } else {
        let cols: Vec<String> = cols_text
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        if cols.is_empty() {
            return Err(DbError::syntax("SELECT needs a column list or *"));
        }
        SelectColumns::Named(cols)
    };

    let (tables_text, predicate) = split_where(&rest[from_end..])?;
    let tables: Vec<&str> = tables_text.split(',').map(str::trim).collect();
    if tables.iter().any(|t| t.is_empty() || t.contains(char::is_whitespace)) {
        return Err(DbError::syntax(format!("bad table list '{}'", tables_text.trim())));
    }
    let from = match tables.as_slice() {
        [one] => FromClause::Single(one.to_string()),
        [left, right] => FromClause::Join(left.to_string(), right.to_string()),
        _ => {
            return Err(DbError::syntax(format!(
                "SELECT supports one or two tables, got {}",
                tables.len()
            )))
        }
    };

    Ok(Statement::Select {
        columns,
        from,
        predicate,
    })
}

/// Splits `<target> [WHERE <clause>]`.
fn split_where(text: &str) -> DbResult<(&str, Predicate)> {
    match find_keyword(text, "WHERE") {
        Some((start, end)) => {
            let clause = text[end..].trim();
            if clause.is_empty() {
                return Err(DbError::syntax("WHERE without a condition"));
            }
            Ok((&text[..start], Predicate::parse(clause)))
        }
        None => Ok((text, Predicate::Always)),
    }
}

fn single_name(text: &str, stmt: &str) -> DbResult<String> {
    let name = text.trim();
    if name.is_empty() || name.contains(char::is_whitespace) || name.contains(',') {
        return Err(DbError::syntax(format!("{} expects one table, got '{}'", stmt, name)));
    }
    Ok(name.to_string())
}

fn split_first_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(pos) => (&text[..pos], &text[pos..]),
        None => (text, ""),
    }
}

fn expect_keyword<'a>(text: &'a str, keyword: &str) -> DbResult<&'a str> {
    let (word, rest) = split_first_word(text);
    if word.eq_ignore_ascii_case(keyword) {
        Ok(rest)
    } else {
        Err(DbError::syntax(format!("expected {}, found '{}'", keyword, word)))
    }
}

/// Byte range of the first whitespace-delimited, case-insensitive occurrence
/// of `keyword`.
fn find_keyword(text: &str, keyword: &str) -> Option<(usize, usize)> {
    text.char_indices().find_map(|(start, _)| {
        let end = start + keyword.len();
        let candidate = text.get(start..end)?;
        if !candidate.eq_ignore_ascii_case(keyword) {
            return None;
        }
        let before_ok = text[..start]
            .chars()
            .next_back()
            .map_or(true, char::is_whitespace);
        let after_ok = text[end..].chars().next().map_or(true, char::is_whitespace);
        (before_ok && after_ok).then_some((start, end))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemaConfig;
    use crate::engine::CompareOp;
    use tempfile::TempDir;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn catalog(dir: &TempDir) -> Catalog {
        let schema = SchemaConfig::new("school", 3)
            .with_table("students", &["name", "age"])
            .with_table("grades", &["student", "score"]);
        Catalog::open(dir.path(), &schema).unwrap()
    }

    #[test]
    fn test_parse_insert() {
        assert_eq!(
            parse("INSERT INTO students ('ann', \"30\");").unwrap(),
            Statement::Insert {
                table: "students".into(),
                values: strings(&["ann", "30"]),
            }
        );
        assert_eq!(
            parse("insert into students(bob,41)").unwrap(),
            Statement::Insert {
                table: "students".into(),
                values: strings(&["bob", "41"]),
            }
        );
        assert!(matches!(parse("INSERT INTO students 'a', 1"), Err(DbError::Syntax(_))));
        assert!(matches!(parse("INSERT students (1)"), Err(DbError::Syntax(_))));
    }

    #[test]
    fn test_parse_delete() {
        assert_eq!(
            parse("DELETE FROM students").unwrap(),
            Statement::Delete {
                table: "students".into(),
                predicate: Predicate::Always,
            }
        );
        assert_eq!(
            parse("DELETE FROM students WHERE age < 18").unwrap(),
            Statement::Delete {
                table: "students".into(),
                predicate: Predicate::Compare {
                    column: "age".into(),
                    op: CompareOp::Lt,
                    value: "18".into(),
                },
            }
        );
        assert!(matches!(parse("DELETE students"), Err(DbError::Syntax(_))));
        assert!(matches!(parse("DELETE FROM students WHERE"), Err(DbError::Syntax(_))));
    }

    #[test]
    fn test_parse_select() {
        assert_eq!(
            parse("SELECT * FROM students").unwrap(),
            Statement::Select {
                columns: SelectColumns::All,
                from: FromClause::Single("students".into()),
                predicate: Predicate::Always,
            }
        );
        assert_eq!(
            parse("select students.name, grades.score from students, grades where score>50")
                .unwrap(),
            Statement::Select {
                columns: SelectColumns::Named(strings(&["students.name", "grades.score"])),
                from: FromClause::Join("students".into(), "grades".into()),
                predicate: Predicate::parse("score>50"),
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse("SELECT name students"), Err(DbError::Syntax(_))));
        assert!(matches!(parse("SELECT name FROM a, b, c"), Err(DbError::Syntax(_))));
        assert!(matches!(parse("SELECT FROM a"), Err(DbError::Syntax(_))));
        assert!(matches!(parse("UPDATE a SET x=1"), Err(DbError::UnknownCommand(_))));
        assert!(matches!(parse("   "), Err(DbError::Syntax(_))));
    }

    #[test]
    fn test_keyword_needs_word_boundary() {
        assert_eq!(find_keyword("a FROM b", "FROM"), Some((2, 6)));
        assert_eq!(find_keyword("fromage FROM b", "from"), Some((8, 12)));
        assert_eq!(find_keyword("nowhere", "WHERE"), None);
    }

    #[test]
    fn test_insert_then_select_star() {
        let tmp = TempDir::new().unwrap();
        let catalog = catalog(&tmp);

        let out = plan_and_exec(&catalog, "INSERT INTO students ('ann', '30')").unwrap();
        assert_eq!(
            out,
            QueryOutput::Inserted {
                table: "students".into(),
                pk: 1
            }
        );

        match plan_and_exec(&catalog, "SELECT * FROM students").unwrap() {
            QueryOutput::Rows(rs) => {
                assert_eq!(rs.columns, strings(&["name", "age"]));
                assert_eq!(rs.rows, vec![strings(&["ann", "30"])]);
            }
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[test]
    fn test_delete_without_where_empties_segment() {
        let tmp = TempDir::new().unwrap();
        let catalog = catalog(&tmp);
        plan_and_exec(&catalog, "INSERT INTO students (ann, 30)").unwrap();
        plan_and_exec(&catalog, "INSERT INTO students (bob, 41)").unwrap();

        let out = plan_and_exec(&catalog, "DELETE FROM students").unwrap();
        assert_eq!(out.to_string(), "DELETE 2");
        let out = plan_and_exec(&catalog, "SELECT name FROM students").unwrap();
        assert_eq!(out.to_string(), "(no rows)");
    }

    #[test]
    fn test_join_star_expands_both_tables() {
        let tmp = TempDir::new().unwrap();
        let catalog = catalog(&tmp);
        plan_and_exec(&catalog, "INSERT INTO students (ann, 30)").unwrap();
        plan_and_exec(&catalog, "INSERT INTO grades (ann, 90)").unwrap();

        match plan_and_exec(&catalog, "SELECT * FROM students, grades WHERE name=ann").unwrap() {
            QueryOutput::Rows(rs) => {
                assert_eq!(
                    rs.columns,
                    strings(&["students.name", "students.age", "grades.student", "grades.score"])
                );
                assert_eq!(rs.rows, vec![strings(&["ann", "30", "ann", "90"])]);
            }
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[test]
    fn test_numeric_error_is_per_statement() {
        let tmp = TempDir::new().unwrap();
        let catalog = catalog(&tmp);
        plan_and_exec(&catalog, "INSERT INTO students (ann, thirty)").unwrap();

        let err = plan_and_exec(&catalog, "SELECT name FROM students WHERE age > 3").unwrap_err();
        assert!(matches!(err, DbError::NumericComparison { .. }));
        // The catalog keeps working.
        assert!(plan_and_exec(&catalog, "SELECT name FROM students WHERE age = thirty").is_ok());
    }

    #[test]
    fn test_unknown_table_reported() {
        let tmp = TempDir::new().unwrap();
        let catalog = catalog(&tmp);
        assert!(matches!(
            plan_and_exec(&catalog, "SELECT * FROM staff"),
            Err(DbError::TableNotFound(_))
        ));
    }

    #[test]
    fn test_render_rows_as_json() {
        let rs = ResultSet {
            columns: strings(&["name"]),
            rows: vec![strings(&["ann"])],
        };
        let rendered = QueryOutput::Rows(rs).to_string();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["columns"][0], "name");
        assert_eq!(value["rows"][0][0], "ann");
    }
}

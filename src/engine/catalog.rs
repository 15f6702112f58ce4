use std::{fs, path::{Path, PathBuf}};

use tracing::info;

use super::executor::{execute_join, ResultSet};
use super::predicate::{ColumnLayout, Predicate};
use super::table::Table;
use crate::config::{EngineOptions, SchemaConfig};
use crate::error::{DbError, DbResult};

/// The set of tables belonging to one schema.
///
/// The catalog is built once from a decoded schema and owns every [`Table`].
/// Names are resolved by exact match in declaration order.
///
/// ## On-disk Layout
/// ```text
/// <data_dir>/<schema>/
///   users/1.csv, users/2.csv, users/users_pk_sequence
///   users_lock
///   orders/...
///   orders_lock
/// ```
pub struct Catalog {
    /// Schema name from the configuration
    name: String,
    /// Schema directory (`<data_dir>/<schema>`)
    dir: PathBuf,
    /// Tables in declaration order
    tables: Vec<Table>,
    options: EngineOptions,
}

impl Catalog {
    /// Opens every table of `schema` under `data_dir`.
    ///
    /// ## Arguments
    /// * `data_dir` - Root directory; the schema directory is created inside it
    /// * `schema` - Decoded schema (table names, columns, row cap, knobs)
    ///
    /// ## Returns
    /// * `Ok(Catalog)` - All tables opened, counters restored from disk
    /// * `Err(_)` - Directory or counter file I/O failure
    pub fn open<P: Into<PathBuf>>(data_dir: P, schema: &SchemaConfig) -> DbResult<Self> {
        let dir = data_dir.into().join(&schema.name);
        fs::create_dir_all(&dir)?;

        let options = schema.engine_options();
        let tables = schema
            .structure
            .iter()
            .map(|spec| {
                Table::open(
                    &dir,
                    &spec.table_name,
                    spec.columns.clone(),
                    schema.tuples_limit,
                    options,
                )
            })
            .collect::<DbResult<Vec<_>>>()?;

        info!(schema = %schema.name, dir = %dir.display(), tables = tables.len(), "catalog opened");
        Ok(Self {
            name: schema.name.clone(),
            dir,
            tables,
            options,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// Looks a table up by exact name.
    pub fn resolve(&self, name: &str) -> DbResult<&Table> {
        self.tables
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    pub fn insert(&self, table: &str, values: &[String]) -> DbResult<u64> {
        self.resolve(table)?.insert(values)
    }

    pub fn delete(&self, table: &str, pred: &Predicate) -> DbResult<usize> {
        self.resolve(table)?.delete(pred)
    }

    pub fn select(&self, table: &str, cols: &[String], pred: &Predicate) -> DbResult<ResultSet> {
        self.resolve(table)?.select(cols, pred)
    }

    /// Two-table SELECT.
    ///
    /// Loads the in-scope rows of both tables (at most `join_row_limit` each),
    /// pairs every row of `left` with every row of `right` and keeps the pairs
    /// whose concatenation satisfies `pred`. The clause resolves against
    /// `left`'s columns only; projected names resolve against the combined
    /// layout, `left` first.
    ///
    /// When `right` does not exist the query degrades to a plain select on
    /// `left`.
    pub fn join_select(
        &self,
        left: &str,
        right: &str,
        cols: &[String],
        pred: &Predicate,
    ) -> DbResult<ResultSet> {
        let t1 = self.resolve(left)?;
        let t2 = match self.resolve(right) {
            Ok(t) => t,
            Err(_) => {
                info!(left, right, "second table not found, selecting from first only");
                return t1.select(cols, pred);
            }
        };

        let limit = Some(self.options.join_row_limit);
        let rows1 = t1.scan_rows(limit)?;
        let rows2 = t2.scan_rows(limit)?;
        let layout = ColumnLayout::joined(t1.layout(), t2.layout());

        info!(left, right, left_rows = rows1.len(), right_rows = rows2.len(), %pred, "nested-loop join");
        execute_join(&rows1, &rows2, t1.layout(), &layout, pred, cols)
    }
}

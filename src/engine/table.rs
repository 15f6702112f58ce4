use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::executor::{execute_select_scan, ResultSet};
use super::lock::TableLock;
use super::predicate::{ColumnLayout, Predicate};
use super::storage::SegmentStore;
use crate::config::{EngineOptions, SegmentScope};
use crate::error::DbResult;

/// One named relation backed by a set of segment files.
///
/// Inserts and deletes hold the table lock for their whole read/rewrite
/// sequence. Selects read without locking and may observe a concurrent
/// writer's partial work.
pub struct Table {
    name: String,
    columns: Vec<String>,
    layout: ColumnLayout,
    store: SegmentStore,
    /// Guards the next primary key to hand out.
    lock: TableLock<u64>,
    options: EngineOptions,
}

impl Table {
    /// Opens a table under `schema_dir`, restoring its primary-key counter.
    ///
    /// Creates `<schema_dir>/<name>/` and, on first open, a counter file
    /// holding 1. The advisory sentinel lives at `<schema_dir>/<name>_lock`.
    pub fn open(
        schema_dir: &Path,
        name: &str,
        columns: Vec<String>,
        row_cap: usize,
        options: EngineOptions,
    ) -> DbResult<Self> {
        let store = SegmentStore::open(schema_dir.join(name), name, columns.clone(), row_cap)?;
        let pk_sequence = match store.load_pk_sequence()? {
            Some(pk) => pk,
            None => {
                store.store_pk_sequence(1)?;
                1
            }
        };
        let lock = TableLock::new(schema_dir.join(format!("{}_lock", name)), pk_sequence);

        info!(table = name, columns = columns.len(), row_cap, pk_sequence, "table opened");
        Ok(Self {
            name: name.to_string(),
            layout: ColumnLayout::single(name, &columns),
            columns,
            store,
            lock,
            options,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn layout(&self) -> &ColumnLayout {
        &self.layout
    }

    pub fn store(&self) -> &SegmentStore {
        &self.store
    }

    /// Next primary key that an insert would use.
    pub fn pk_sequence(&self) -> u64 {
        self.lock.snapshot()
    }

    /// Appends a row and returns the primary key it was stored under.
    pub fn insert(&self, values: &[String]) -> DbResult<u64> {
        if values.len() != self.columns.len() {
            warn!(
                table = %self.name,
                expected = self.columns.len(),
                got = values.len(),
                "value count does not match column count"
            );
        }

        let mut next_pk = self.lock.acquire();
        let segment = self.store.next_writable_segment()?;
        let pk = *next_pk;
        self.store.append_row(&segment, pk, values)?;

        *next_pk = pk + 1;
        self.store.store_pk_sequence(*next_pk)?;
        debug!(table = %self.name, pk, segment = %segment.display(), "inserted");
        Ok(pk)
    }

    /// Removes rows matching `pred` from the in-scope segments.
    ///
    /// Returns how many rows were removed.
    pub fn delete(&self, pred: &Predicate) -> DbResult<usize> {
        let _guard = self.lock.acquire();
        let mut removed = 0;
        for segment in self.scope_segments()? {
            let layout = &self.layout;
            removed += self
                .store
                .rewrite_excluding(&segment, |row| pred.matches_row(layout, row))?;
        }
        info!(table = %self.name, %pred, removed, "delete finished");
        Ok(removed)
    }

    /// Returns the requested columns of every in-scope row matching `pred`.
    pub fn select(&self, cols: &[String], pred: &Predicate) -> DbResult<ResultSet> {
        let rows = self.scan_rows(None)?;
        execute_select_scan(&rows, &self.layout, pred, cols)
    }

    /// Raw data lines of the in-scope segments, at most `limit` of them.
    pub fn scan_rows(&self, limit: Option<usize>) -> DbResult<Vec<String>> {
        let limit = limit.unwrap_or(usize::MAX);
        let mut rows = Vec::new();
        for segment in self.scope_segments()? {
            for row in self.store.read_rows(&segment)? {
                if rows.len() >= limit {
                    warn!(table = %self.name, limit, "row limit reached, remaining rows ignored");
                    return Ok(rows);
                }
                rows.push(row);
            }
        }
        Ok(rows)
    }

    fn scope_segments(&self) -> DbResult<Vec<PathBuf>> {
        Ok(match self.options.segment_scope {
            SegmentScope::Writable => vec![self.store.next_writable_segment()?],
            SegmentScope::All => self.store.segments(),
        })
    }
}

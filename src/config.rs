//! Schema configuration.
//!
//! The schema file is a small JSON document naming the schema, the per-segment
//! row cap and the tables with their ordered columns:
//!
//! ```json
//! {
//!   "name": "shop",
//!   "tuples_limit": 1000,
//!   "structure": [
//!     { "table_name": "users", "columns": ["name", "age"] }
//!   ]
//! }
//! ```
//!
//! `segment_scope` and `join_row_limit` are optional engine knobs.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{DbError, DbResult};

/// Which segments SELECT, DELETE and joins read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentScope {
    /// Only the segment the next insert would land in.
    #[default]
    Writable,
    /// Every existing segment, lowest index first.
    All,
}

/// One table entry of the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Table name (unique within the schema).
    pub table_name: String,
    /// Ordered column names, excluding the primary key.
    #[serde(default)]
    pub columns: Vec<String>,
}

/// Decoded schema file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Schema name; also the directory holding all table directories.
    #[serde(default)]
    pub name: String,

    /// Maximum number of data rows per segment file.
    #[serde(default = "default_tuples_limit")]
    pub tuples_limit: usize,

    /// Tables in declaration order.
    #[serde(default)]
    pub structure: Vec<TableSpec>,

    /// Segments visible to SELECT / DELETE / joins.
    #[serde(default)]
    pub segment_scope: SegmentScope,

    /// Upper bound on rows loaded per side of a join.
    #[serde(default = "default_join_row_limit")]
    pub join_row_limit: usize,
}

fn default_tuples_limit() -> usize {
    1000
}

fn default_join_row_limit() -> usize {
    1000
}

/// Engine behavior knobs carried by the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub segment_scope: SegmentScope,
    pub join_row_limit: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            segment_scope: SegmentScope::default(),
            join_row_limit: default_join_row_limit(),
        }
    }
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            tuples_limit: default_tuples_limit(),
            structure: Vec::new(),
            segment_scope: SegmentScope::default(),
            join_row_limit: default_join_row_limit(),
        }
    }
}

impl SchemaConfig {
    /// Builds a schema in code, mostly for tests and embedding.
    pub fn new(name: impl Into<String>, tuples_limit: usize) -> Self {
        Self {
            name: name.into(),
            tuples_limit,
            ..Self::default()
        }
    }

    /// Adds a table with the given columns.
    pub fn with_table(mut self, name: &str, columns: &[&str]) -> Self {
        self.structure.push(TableSpec {
            table_name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    pub fn with_segment_scope(mut self, scope: SegmentScope) -> Self {
        self.segment_scope = scope;
        self
    }

    pub fn with_join_row_limit(mut self, limit: usize) -> Self {
        self.join_row_limit = limit;
        self
    }

    /// Reads and validates a schema file.
    pub fn load(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref();
        let config_err = |reason: String| DbError::Config {
            path: path.to_path_buf(),
            reason,
        };

        let text = fs::read_to_string(path).map_err(|e| config_err(e.to_string()))?;
        let config: SchemaConfig =
            serde_json::from_str(&text).map_err(|e| config_err(e.to_string()))?;
        config.validate().map_err(config_err)?;

        info!(
            schema = %config.name,
            tables = config.structure.len(),
            tuples_limit = config.tuples_limit,
            "schema loaded"
        );
        Ok(config)
    }

    /// Like [`SchemaConfig::load`], but reports the failure and falls back to
    /// an empty schema so startup can continue.
    pub fn load_or_empty(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!(error = %e, "failed to load schema, starting with an empty catalog");
                Self::default()
            }
        }
    }

    /// Engine knobs extracted from the schema.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            segment_scope: self.segment_scope,
            join_row_limit: self.join_row_limit,
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.tuples_limit == 0 {
            return Err("tuples_limit must be at least 1".to_string());
        }
        let mut seen = HashSet::new();
        for spec in &self.structure {
            if spec.table_name.is_empty() {
                return Err("table_name must not be empty".to_string());
            }
            if !seen.insert(spec.table_name.as_str()) {
                return Err(format!("duplicate table {}", spec.table_name));
            }
        }
        Ok(())
    }
}

//! # flatdb - a segmented flat-file relational engine
//!
//! Tables live as plain CSV files on disk and are queried through a tiny
//! SQL-like surface:
//! - **Segmented storage**: each table is split into numbered files capped at a
//!   fixed row count, header first
//! - **Primary keys**: a per-table counter persisted next to the segments
//! - **Locking**: per-table mutex around every insert and delete, mirrored to
//!   an advisory `<table>_lock` file
//! - **Queries**: INSERT, DELETE and SELECT with one `=`, `>` or `<` filter,
//!   projection, and a nested-loop join over two tables
//!
//! ## Architecture Overview
//!
//! 1. **Config** (`config` module): decodes the JSON schema file
//! 2. **Engine** (`engine` module): segments, locks, predicates, tables, catalog
//! 3. **SQL** (`sql` module): statement parsing and dispatch to the catalog
//! 4. **Server** (`server` module): line-oriented sessions over stdin or TCP
//!
//! ## Usage Example
//!
//! ```bash
//! cargo run -- --schema schema.json --data ./dbdata
//! > INSERT INTO users ('ann', 30)
//! > SELECT name FROM users WHERE age > 18
//! > exit
//! ```

/// Schema file decoding and engine options
pub mod config;

/// Segment storage, locking, predicates, tables and the catalog
pub mod engine;

/// Error types shared by every layer
pub mod error;

/// Statement sessions over stdin or TCP
pub mod server;

/// Statement parsing and execution
pub mod sql;

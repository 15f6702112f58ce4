//! Storage and query execution engine.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                   Catalog                    │
//! │  resolve · insert · select · delete · join   │
//! └──────────────────────┬───────────────────────┘
//!                        │ one per table
//!                ┌───────▼────────┐
//!                │     Table      │
//!                └──┬─────┬────┬──┘
//!        ┌──────────┘     │    └───────────┐
//! ┌──────▼──────┐ ┌───────▼──────┐ ┌───────▼───────┐
//! │ TableLock   │ │ SegmentStore │ │  Predicate /  │
//! │ (pk guard)  │ │ (n.csv files)│ │  Projection   │
//! └─────────────┘ └──────────────┘ └───────────────┘
//! ```

mod catalog;
mod executor;
mod lock;
mod predicate;
mod storage;
mod table;

pub use catalog::Catalog;
pub use executor::{execute_join, execute_select_scan, Projection, ResultSet};
pub use lock::{TableLock, TableLockGuard};
pub use predicate::{clean_field, split_row, ColumnLayout, CompareOp, Predicate};
pub use storage::{SegmentStore, DELIMITER};
pub use table::Table;

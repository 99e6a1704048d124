//! Storage Layer - SQLite-backed query execution
//!
//! The worker routes do not assume a fixed schema for task ownership; the
//! store answers introspection questions through `sqlite_master` and
//! `pragma_table_info` and runs parameterized queries that return opaque
//! JSON records.
//!
//! Tables with a fixed shape:
//! - feeding_schedule(feeding_ID, Pond_ID, feeding_time)
//! - customer_order(order_id, status, approved_or_rejected, created_at)
//!
//! `schema` holds a demo layout for local databases created by `farmdesk init`.

pub mod schema;
pub mod sqlite;

pub use sqlite::{SqliteStore, DueFeeding};

//! SQLite storage implementation

use std::path::Path;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params, params_from_iter, Connection, ErrorCode, InterruptHandle, OpenFlags, Params, ToSql};
use serde_json::Value;
use crate::{Result, Error};
use crate::claim::OwnerKey;
use crate::resolver::{ColumnInfo, QueryExecutor, Record};
use super::schema;

/// SQLite-backed store for the farm database
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    /// Open an existing database file without write access
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
            | OpenFlags::SQLITE_OPEN_URI;
        let conn = Connection::open_with_flags(path, flags)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Create the demo tables, optionally with sample rows
    pub fn initialize_demo_schema(&self, with_rows: bool) -> Result<()> {
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        let seeded: i64 = self.conn.query_row("SELECT COUNT(*) FROM worker", [], |row| row.get(0))?;
        if with_rows && seeded == 0 {
            for stmt in schema::DEMO_ROWS {
                self.conn.execute(stmt, [])?;
            }
        }
        Ok(())
    }

    /// Run one or more statements without parameters
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql).map_err(storage_error)
    }

    /// Handle that aborts whatever statement this connection is running
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.conn.get_interrupt_handle()
    }

    // ========== Order Operations ==========

    /// Approved customer orders, newest first
    pub fn approved_orders(&self) -> Result<Vec<Record>> {
        self.collect_records(
            "SELECT * FROM customer_order WHERE approved_or_rejected = 'Approved' ORDER BY created_at DESC, order_id DESC",
            [],
        )
    }

    /// Set an order's status. Returns false when no order has that id.
    pub fn update_order_status(&self, order_id: &OwnerKey, status: &str) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "UPDATE customer_order SET status = ?1 WHERE order_id = ?2",
                params![status, order_id],
            )
            .map_err(storage_error)?;
        Ok(changed > 0)
    }

    // ========== Feeding Schedule Operations ==========

    /// Full feeding timetable ordered by pond, then time
    pub fn feeding_schedule(&self) -> Result<Vec<Record>> {
        self.collect_records(
            "SELECT * FROM feeding_schedule ORDER BY Pond_ID ASC, feeding_time ASC, feeding_ID ASC",
            [],
        )
    }

    /// Feedings scheduled exactly 15 minutes after `now` (`HH:MM:SS`)
    pub fn feedings_due(&self, now: &str) -> Result<Vec<DueFeeding>> {
        let mut stmt = self
            .conn
            .prepare(
                r#"
                SELECT feeding_ID, Pond_ID, feeding_time
                FROM feeding_schedule
                WHERE time(feeding_time) = time(?1, '+15 minutes')
                ORDER BY Pond_ID, feeding_ID
                "#,
            )
            .map_err(storage_error)?;

        let due = stmt
            .query_map([now], |row| {
                Ok(DueFeeding {
                    feeding_id: row.get(0)?,
                    pond_id: row.get(1)?,
                    feeding_time: row.get(2)?,
                })
            })
            .map_err(storage_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(storage_error)?;

        Ok(due)
    }

    // ========== Record Helpers ==========

    fn collect_records<P: Params>(&self, sql: &str, params: P) -> Result<Vec<Record>> {
        let mut stmt = self.conn.prepare(sql).map_err(storage_error)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt.query(params).map_err(storage_error)?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().map_err(storage_error)? {
            let mut record = Record::new();
            for (idx, name) in columns.iter().enumerate() {
                let value = row.get_ref(idx).map_err(storage_error)?;
                record.insert(name.clone(), value_to_json(value));
            }
            records.push(record);
        }

        Ok(records)
    }
}

impl QueryExecutor for SqliteStore {
    fn find_table(&self, name: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE LIMIT 1")
            .map_err(storage_error)?;
        let mut rows = stmt.query([name]).map_err(storage_error)?;
        match rows.next().map_err(storage_error)? {
            Some(row) => Ok(Some(row.get(0).map_err(storage_error)?)),
            None => Ok(None),
        }
    }

    fn table_columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, pk FROM pragma_table_info(?1) ORDER BY cid")
            .map_err(storage_error)?;

        let columns = stmt
            .query_map([table], |row| {
                let pk: i64 = row.get(1)?;
                Ok(ColumnInfo {
                    name: row.get(0)?,
                    primary_key: u32::try_from(pk).ok().filter(|p| *p > 0),
                })
            })
            .map_err(storage_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(storage_error)?;

        Ok(columns)
    }

    fn query(&self, sql: &str, params: &[OwnerKey]) -> Result<Vec<Record>> {
        self.collect_records(sql, params_from_iter(params.iter()))
    }
}

impl ToSql for OwnerKey {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            OwnerKey::Int(i) => ToSqlOutput::from(*i),
            OwnerKey::Text(s) => ToSqlOutput::from(s.as_str()),
        })
    }
}

/// Map a rusqlite error, surfacing interruption as its own variant
fn storage_error(err: rusqlite::Error) -> Error {
    if err.sqlite_error_code() == Some(ErrorCode::OperationInterrupted) {
        Error::QueryInterrupted
    } else {
        Error::Storage(err)
    }
}

fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(hex::encode(b)),
    }
}

/// Feeding row that is due for a reminder
#[derive(Debug, Clone, PartialEq)]
pub struct DueFeeding {
    pub feeding_id: i64,
    pub pond_id: i64,
    pub feeding_time: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn demo_store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.initialize_demo_schema(true).unwrap();
        store
    }

    #[test]
    fn test_find_table_is_case_insensitive() {
        let store = demo_store();

        assert_eq!(store.find_table("task").unwrap().as_deref(), Some("task"));
        assert_eq!(store.find_table("TASK").unwrap().as_deref(), Some("task"));
        assert_eq!(store.find_table("tasks").unwrap(), None);
    }

    #[test]
    fn test_table_columns_report_primary_key() {
        let store = demo_store();

        let columns = store.table_columns("task").unwrap();
        assert_eq!(columns[0].name, "task_id");
        assert_eq!(columns[0].primary_key, Some(1));
        assert!(columns.iter().any(|c| c.name == "worker_id" && c.primary_key.is_none()));

        assert!(store.table_columns("missing").unwrap().is_empty());
    }

    #[test]
    fn test_query_converts_values() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .execute_batch(
                "CREATE TABLE t (i INTEGER, r REAL, s TEXT, b BLOB, n TEXT);
                 INSERT INTO t VALUES (7, 1.5, 'pond', x'0aff', NULL);",
            )
            .unwrap();

        let records = store.query("SELECT * FROM t WHERE i = ?1", &[OwnerKey::from("7")]).unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record["i"], Value::from(7));
        assert_eq!(record["r"], Value::from(1.5));
        assert_eq!(record["s"], Value::from("pond"));
        assert_eq!(record["b"], Value::from("0aff"));
        assert_eq!(record["n"], Value::Null);
    }

    #[test]
    fn test_approved_orders_and_status_update() {
        let store = demo_store();

        let approved = store.approved_orders().unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0]["prawn_type"], Value::from("tiger"));

        assert!(store.update_order_status(&OwnerKey::Int(1), "Harvesting").unwrap());
        assert!(!store.update_order_status(&OwnerKey::Int(99), "Harvesting").unwrap());

        let approved = store.approved_orders().unwrap();
        assert_eq!(approved[0]["status"], Value::from("Harvesting"));
    }

    #[test]
    fn test_feedings_due_fifteen_minutes_ahead() {
        let store = demo_store();

        let due = store.feedings_due("05:45:00").unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].pond_id, 1);
        assert_eq!(due[0].feeding_time, "06:00:00");

        assert!(store.feedings_due("05:46:00").unwrap().is_empty());
    }

    #[test]
    fn test_feedings_due_wraps_midnight() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.initialize_demo_schema(false).unwrap();
        store
            .execute_batch("INSERT INTO feeding_schedule (Pond_ID, feeding_time) VALUES (3, '00:05:00')")
            .unwrap();

        let due = store.feedings_due("23:50:00").unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].pond_id, 3);
    }

    #[test]
    fn test_feeding_schedule_order() {
        let store = demo_store();

        let rows = store.feeding_schedule().unwrap();
        let times: Vec<_> = rows.iter().map(|r| r["feeding_time"].clone()).collect();
        assert_eq!(times, vec![Value::from("06:00:00"), Value::from("18:00:00"), Value::from("07:00:00")]);
    }

    #[test]
    fn test_interrupted_query_maps_to_interrupted() {
        let store = SqliteStore::open_in_memory().unwrap();
        let handle = store.interrupt_handle();
        let done = Arc::new(AtomicBool::new(false));

        let stopper = {
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                while !done.load(Ordering::SeqCst) {
                    std::thread::sleep(Duration::from_millis(20));
                    handle.interrupt();
                }
            })
        };

        let result = store.query(
            "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c) SELECT count(*) FROM c",
            &[],
        );
        done.store(true, Ordering::SeqCst);
        stopper.join().unwrap();

        assert!(matches!(result, Err(Error::QueryInterrupted)));
    }

    #[test]
    fn test_demo_rows_seeded_once() {
        let store = demo_store();
        store.initialize_demo_schema(true).unwrap();

        let workers = store.query("SELECT * FROM worker", &[]).unwrap();
        assert_eq!(workers.len(), 2);
    }

    #[test]
    fn test_read_only_store_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("farm.db");
        SqliteStore::open(&path).unwrap().initialize_demo_schema(true).unwrap();

        let store = SqliteStore::open_read_only(&path).unwrap();
        assert_eq!(store.find_table("worker").unwrap().as_deref(), Some("worker"));
        assert!(store.update_order_status(&OwnerKey::Int(1), "Done").is_err());
    }
}

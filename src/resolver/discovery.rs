//! Schema discovery
//!
//! Finds the first existing candidate table and the first matching candidate
//! columns on it. Facts can be kept in a [`DiscoveryCache`]; owned records
//! never are.

use std::sync::Arc;
use std::time::Duration;
use moka::sync::Cache;
use serde::Serialize;
use crate::Result;
use super::{CandidateSet, QueryExecutor};

/// Column of an introspected table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    /// 1-based position in the primary key, if part of it
    pub primary_key: Option<u32>,
}

/// Introspected table: canonical name plus columns in declaration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableSchema {
    /// First candidate that names a column of this table.
    ///
    /// Exact matches win over case-insensitive ones; within each pass the
    /// candidate order decides. Returns the column's declared name.
    pub fn find_column(&self, candidates: &[String]) -> Option<&str> {
        candidates
            .iter()
            .find_map(|c| self.columns.iter().find(|col| col.name == *c))
            .or_else(|| {
                candidates
                    .iter()
                    .find_map(|c| self.columns.iter().find(|col| col.name.eq_ignore_ascii_case(c)))
            })
            .map(|col| col.name.as_str())
    }

    /// Primary key columns in key order
    pub fn primary_key(&self) -> Vec<&str> {
        let mut keyed: Vec<_> = self
            .columns
            .iter()
            .filter_map(|c| c.primary_key.map(|pos| (pos, c.name.as_str())))
            .collect();
        keyed.sort_by_key(|(pos, _)| *pos);
        keyed.into_iter().map(|(_, name)| name).collect()
    }
}

/// Facts discovered for the selected record table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaFacts {
    pub table: String,
    pub owner_column: Option<String>,
    pub email_column: Option<String>,
    pub order_column: Option<String>,
    /// Primary key columns used to break ordering ties; empty means `rowid`
    pub tiebreak: Vec<String>,
}

impl SchemaFacts {
    /// Derive facts for `schema` from the column candidate lists
    pub fn from_schema(schema: &TableSchema, candidates: &CandidateSet) -> Self {
        Self {
            table: schema.name.clone(),
            owner_column: schema.find_column(&candidates.owner_columns).map(String::from),
            email_column: schema.find_column(&candidates.email_columns).map(String::from),
            order_column: schema.find_column(&candidates.order_columns).map(String::from),
            tiebreak: schema.primary_key().into_iter().map(String::from).collect(),
        }
    }
}

/// Time-bounded cache of table existence and column facts.
///
/// Keys are lowercased candidate names; a `None` value records that the
/// table did not exist when looked up.
#[derive(Clone)]
pub struct DiscoveryCache {
    tables: Cache<String, Option<Arc<TableSchema>>>,
}

impl DiscoveryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            tables: Cache::builder().max_capacity(1024).time_to_live(ttl).build(),
        }
    }

    pub fn get(&self, candidate: &str) -> Option<Option<Arc<TableSchema>>> {
        self.tables.get(&cache_key(candidate))
    }

    pub fn insert(&self, candidate: &str, schema: Option<Arc<TableSchema>>) {
        self.tables.insert(cache_key(candidate), schema);
    }

    pub fn invalidate(&self, candidate: &str) {
        self.tables.invalidate(&cache_key(candidate));
    }

    pub fn clear(&self) {
        self.tables.invalidate_all();
    }
}

impl std::fmt::Debug for DiscoveryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryCache")
            .field("entries", &self.tables.entry_count())
            .finish()
    }
}

fn cache_key(candidate: &str) -> String {
    candidate.to_ascii_lowercase()
}

/// Look up one candidate table, through the cache when one is given.
///
/// A failed lookup drops that candidate's cache entry and is returned as is.
pub fn lookup_table<E: QueryExecutor + ?Sized>(
    executor: &E,
    cache: Option<&DiscoveryCache>,
    candidate: &str,
) -> Result<Option<Arc<TableSchema>>> {
    if let Some(hit) = cache.and_then(|c| c.get(candidate)) {
        tracing::trace!(candidate, exists = hit.is_some(), "discovery cache hit");
        return Ok(hit);
    }

    let found = introspect_table(executor, candidate);
    if let Some(cache) = cache {
        match &found {
            Ok(schema) => cache.insert(candidate, schema.clone()),
            Err(_) => cache.invalidate(candidate),
        }
    }
    found
}

/// First candidate table that exists, in list order
pub fn first_table<E: QueryExecutor + ?Sized>(
    executor: &E,
    cache: Option<&DiscoveryCache>,
    candidates: &[String],
) -> Result<Option<Arc<TableSchema>>> {
    for candidate in candidates {
        if let Some(schema) = lookup_table(executor, cache, candidate)? {
            return Ok(Some(schema));
        }
        tracing::debug!(candidate = candidate.as_str(), "candidate table does not exist");
    }
    Ok(None)
}

fn introspect_table<E: QueryExecutor + ?Sized>(executor: &E, candidate: &str) -> Result<Option<Arc<TableSchema>>> {
    let Some(name) = executor.find_table(candidate)? else {
        return Ok(None);
    };
    let columns = executor.table_columns(&name)?;
    Ok(Some(Arc::new(TableSchema { name, columns })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(columns: &[(&str, Option<u32>)]) -> TableSchema {
        TableSchema {
            name: "task".to_string(),
            columns: columns
                .iter()
                .map(|(name, pk)| ColumnInfo { name: name.to_string(), primary_key: *pk })
                .collect(),
        }
    }

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_find_column_follows_candidate_order() {
        let table = schema(&[("assigned_to", None), ("user_id", None)]);
        assert_eq!(table.find_column(&names(&["worker_id", "user_id", "assigned_to"])), Some("user_id"));
        assert_eq!(table.find_column(&names(&["worker_id"])), None);
    }

    #[test]
    fn test_find_column_prefers_exact_match() {
        let table = schema(&[("userId", None), ("user_id", None)]);
        assert_eq!(table.find_column(&names(&["userid", "user_id"])), Some("user_id"));
        assert_eq!(table.find_column(&names(&["USERID"])), Some("userId"));
    }

    #[test]
    fn test_primary_key_in_key_order() {
        let table = schema(&[("b", Some(2)), ("x", None), ("a", Some(1))]);
        assert_eq!(table.primary_key(), vec!["a", "b"]);
    }

    #[test]
    fn test_facts_from_schema() {
        let table = schema(&[("task_id", Some(1)), ("workerId", None), ("createdAt", None)]);
        let facts = SchemaFacts::from_schema(&table, &CandidateSet::default());

        assert_eq!(facts.owner_column.as_deref(), Some("workerId"));
        assert_eq!(facts.email_column, None);
        assert_eq!(facts.order_column.as_deref(), Some("createdAt"));
        assert_eq!(facts.tiebreak, vec!["task_id".to_string()]);
    }

    #[test]
    fn test_cache_keys_ignore_case() {
        let cache = DiscoveryCache::new(Duration::from_secs(60));
        cache.insert("Task", None);
        assert_eq!(cache.get("task"), Some(None));

        cache.invalidate("TASK");
        assert_eq!(cache.get("task"), None);
    }

    #[test]
    fn test_absent_table_is_looked_up_again_after_ttl() {
        let store = crate::storage::SqliteStore::open_in_memory().unwrap();
        let cache = DiscoveryCache::new(Duration::from_millis(50));

        assert!(lookup_table(&store, Some(&cache), "task").unwrap().is_none());
        store.execute_batch("CREATE TABLE task (worker_id INTEGER)").unwrap();
        assert!(lookup_table(&store, Some(&cache), "task").unwrap().is_none());

        std::thread::sleep(Duration::from_millis(120));
        let schema = lookup_table(&store, Some(&cache), "task").unwrap().unwrap();
        assert_eq!(schema.columns[0].name, "worker_id");
    }
}

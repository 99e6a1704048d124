//! Schema-Adaptive Record Resolver
//!
//! Answers "which records belong to this caller" against a database whose
//! task schema is not known in advance.
//!
//! Resolution order:
//! 1. Table discovery (first existing candidate table)
//! 2. Ownership column discovery (owner id column and email column, independently)
//! 3. Ordering column discovery (sorted descending; primary key breaks ties)
//! 4. Priority chain: id match, email match, email-to-id directory mapping or name match
//!
//! Each call is independent and read-only. Only table/column facts may be
//! cached between calls.

pub mod candidates;
pub mod chain;
pub mod discovery;

use std::time::Duration;
use serde::Serialize;
use serde_json::Value;
use crate::claim::{IdentityClaim, OwnerKey};

pub use candidates::{CandidateSet, DirectoryCandidate};
pub use chain::LookupPlan;
pub use discovery::{ColumnInfo, DiscoveryCache, SchemaFacts, TableSchema};

/// Default cap on returned records
pub const DEFAULT_RESULT_LIMIT: usize = 100;

/// Opaque record: column name to value
pub type Record = serde_json::Map<String, Value>;

/// Database access the resolver needs
pub trait QueryExecutor {
    /// Canonical name of the table matching `name`, if it exists
    fn find_table(&self, name: &str) -> crate::Result<Option<String>>;

    /// Columns of an existing table in declaration order
    fn table_columns(&self, table: &str) -> crate::Result<Vec<ColumnInfo>>;

    /// Run a parameterized read query
    fn query(&self, sql: &str, params: &[OwnerKey]) -> crate::Result<Vec<Record>>;
}

/// Resolution failures
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("No record table found (checked: {})", checked.join(", "))]
    TableNotFound { checked: Vec<String> },

    #[error("No owner id or email column found in table {table}")]
    OwnershipColumnNotFound { table: String },

    #[error("Identity claim cannot be matched against table {table}")]
    UnresolvableIdentity { table: String },

    #[error("Resolution timed out")]
    ResolutionTimedOut,

    #[error("Query execution failed: {0}")]
    QueryExecutionFailed(#[source] crate::Error),
}

impl From<crate::Error> for ResolveError {
    fn from(err: crate::Error) -> Self {
        match err {
            crate::Error::QueryInterrupted => Self::ResolutionTimedOut,
            other => Self::QueryExecutionFailed(other),
        }
    }
}

/// Which path produced the records
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolutionPath {
    ById,
    ByEmail,
    ByMappedId { directory: String },
    ByFallbackKey,
    /// Email claim with no directory mapping: no records, not an error
    EmptyByDesign,
}

/// Successful resolution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub table: String,
    pub path: ResolutionPath,
    pub records: Vec<Record>,
}

/// Resolve owned records with explicit candidates and no discovery cache.
pub fn resolve_owned_records<E: QueryExecutor + ?Sized>(
    executor: &E,
    claim: &IdentityClaim,
    candidates: &CandidateSet,
    limit: usize,
) -> Result<Resolution, ResolveError> {
    Pipeline { executor, cache: None, candidates, limit }.run(claim)
}

/// Resolver bound to a candidate set, result cap and optional discovery cache
#[derive(Debug, Clone)]
pub struct SchemaAdaptiveResolver {
    candidates: CandidateSet,
    limit: usize,
    cache: Option<DiscoveryCache>,
}

impl Default for SchemaAdaptiveResolver {
    fn default() -> Self {
        Self::new(CandidateSet::default())
    }
}

impl SchemaAdaptiveResolver {
    pub fn new(candidates: CandidateSet) -> Self {
        Self { candidates, limit: DEFAULT_RESULT_LIMIT, cache: None }
    }

    /// Cap the number of returned records (at least one)
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// Cache discovery facts for `ttl`
    pub fn with_discovery_cache(mut self, ttl: Duration) -> Self {
        self.cache = Some(DiscoveryCache::new(ttl));
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Drop all cached discovery facts
    pub fn invalidate_discovery(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    /// Resolve the records owned by `claim`
    pub fn resolve<E: QueryExecutor + ?Sized>(
        &self,
        executor: &E,
        claim: &IdentityClaim,
    ) -> Result<Resolution, ResolveError> {
        self.pipeline(executor).run(claim)
    }

    /// Run discovery only (table, ownership and ordering columns)
    pub fn discover<E: QueryExecutor + ?Sized>(&self, executor: &E) -> Result<SchemaFacts, ResolveError> {
        self.pipeline(executor).discover()
    }

    fn pipeline<'a, E: QueryExecutor + ?Sized>(&'a self, executor: &'a E) -> Pipeline<'a, E> {
        Pipeline {
            executor,
            cache: self.cache.as_ref(),
            candidates: &self.candidates,
            limit: self.limit,
        }
    }
}

struct Pipeline<'a, E: ?Sized> {
    executor: &'a E,
    cache: Option<&'a DiscoveryCache>,
    candidates: &'a CandidateSet,
    limit: usize,
}

impl<E: QueryExecutor + ?Sized> Pipeline<'_, E> {
    fn discover(&self) -> Result<SchemaFacts, ResolveError> {
        let schema = discovery::first_table(self.executor, self.cache, &self.candidates.tables)?
            .ok_or_else(|| ResolveError::TableNotFound { checked: self.candidates.tables.clone() })?;

        let facts = SchemaFacts::from_schema(&schema, self.candidates);
        if facts.owner_column.is_none() && facts.email_column.is_none() {
            tracing::warn!(
                table = facts.table.as_str(),
                "No owner id or email column among candidates"
            );
            return Err(ResolveError::OwnershipColumnNotFound { table: facts.table });
        }

        tracing::debug!(
            table = facts.table.as_str(),
            owner_column = ?facts.owner_column,
            email_column = ?facts.email_column,
            order_column = ?facts.order_column,
            "Discovered record table"
        );
        Ok(facts)
    }

    fn run(&self, claim: &IdentityClaim) -> Result<Resolution, ResolveError> {
        let facts = self.discover()?;

        let Some(plan) = chain::plan(&facts, claim) else {
            tracing::warn!(
                table = facts.table.as_str(),
                has_id = claim.id.is_some(),
                has_email = claim.email.is_some(),
                has_name = claim.name.is_some(),
                "Unable to match claim to record table"
            );
            return Err(ResolveError::UnresolvableIdentity { table: facts.table });
        };

        let (path, records) = match plan {
            LookupPlan::ById { column, key } => {
                tracing::info!(table = facts.table.as_str(), column = column.as_str(), %key, "Querying records by id");
                (ResolutionPath::ById, self.fetch(&facts, &column, key)?)
            }
            LookupPlan::ByEmail { column, email } => {
                tracing::info!(table = facts.table.as_str(), column = column.as_str(), "Querying records by email");
                (ResolutionPath::ByEmail, self.fetch(&facts, &column, OwnerKey::Text(email))?)
            }
            LookupPlan::ViaDirectory { column, email } => match self.map_email(&email)? {
                Some((directory, id)) => {
                    tracing::info!(
                        table = facts.table.as_str(),
                        column = column.as_str(),
                        directory = directory.as_str(),
                        %id,
                        "Querying records by mapped id"
                    );
                    (ResolutionPath::ByMappedId { directory }, self.fetch(&facts, &column, id)?)
                }
                None => {
                    tracing::info!("No id mapping found for email, returning no records");
                    (ResolutionPath::EmptyByDesign, Vec::new())
                }
            },
            LookupPlan::ByFallbackKey { column, key } => {
                tracing::info!(table = facts.table.as_str(), column = column.as_str(), %key, "Querying records by fallback key");
                (ResolutionPath::ByFallbackKey, self.fetch(&facts, &column, key)?)
            }
        };

        tracing::debug!(count = records.len(), "Records resolved");
        Ok(Resolution { table: facts.table, path, records })
    }

    fn fetch(&self, facts: &SchemaFacts, column: &str, key: OwnerKey) -> Result<Vec<Record>, ResolveError> {
        let sql = chain::record_query(facts, column);
        let limit = OwnerKey::Int(i64::try_from(self.limit).unwrap_or(i64::MAX));
        self.query_table(&facts.table, &sql, &[key, limit])
    }

    /// Run a query built from discovered facts for `table`.
    ///
    /// Any failure but interruption drops the table's cached facts; the next
    /// call rediscovers it.
    fn query_table(&self, table: &str, sql: &str, params: &[OwnerKey]) -> Result<Vec<Record>, ResolveError> {
        match self.executor.query(sql, params) {
            Ok(records) => Ok(records),
            Err(err) => {
                if let Some(cache) = self.cache.filter(|_| !matches!(err, crate::Error::QueryInterrupted)) {
                    tracing::debug!(table, "Dropping cached facts after failed query");
                    cache.invalidate(table);
                }
                Err(err.into())
            }
        }
    }

    /// Map an email to an owner id through the first directory table that knows it
    fn map_email(&self, email: &str) -> Result<Option<(String, OwnerKey)>, ResolveError> {
        for candidate in &self.candidates.directories {
            let Some(directory) = discovery::lookup_table(self.executor, self.cache, &candidate.table)? else {
                continue;
            };
            let Some(email_column) = directory.find_column(&candidate.email_columns) else {
                continue;
            };
            let Some(id_column) = directory.find_column(&candidate.id_columns) else {
                continue;
            };

            let sql = chain::directory_query(&directory, id_column, email_column);
            let rows = self.query_table(&directory.name, &sql, &[OwnerKey::Text(email.to_string())])?;
            if let Some(id) = rows.first().and_then(|row| row.get("id")).and_then(OwnerKey::from_json) {
                return Ok(Some((directory.name.clone(), id)));
            }
        }
        Ok(None)
    }
}

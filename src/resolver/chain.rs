//! Resolution chain
//!
//! Strategies are tried in order; the first one that can build a lookup plan
//! from the discovered facts and the claim wins:
//! 1. Owner column matched by claim id
//! 2. Email column matched by claim email
//! 3. Owner column matched by email (via a directory table) or by name

use crate::claim::{looks_like_email, IdentityClaim, OwnerKey};
use super::discovery::{SchemaFacts, TableSchema};

/// How the record table will be queried
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupPlan {
    ById { column: String, key: OwnerKey },
    ByEmail { column: String, email: String },
    /// Map the email to an id through a directory table, then match `column`
    ViaDirectory { column: String, email: String },
    ByFallbackKey { column: String, key: OwnerKey },
}

type Strategy = fn(&SchemaFacts, &IdentityClaim) -> Option<LookupPlan>;

/// Strategies in priority order
pub const STRATEGIES: &[Strategy] = &[match_by_id, match_by_email, match_by_fallback];

/// Plan a lookup, or `None` when no strategy applies
pub fn plan(facts: &SchemaFacts, claim: &IdentityClaim) -> Option<LookupPlan> {
    STRATEGIES.iter().find_map(|strategy| strategy(facts, claim))
}

fn match_by_id(facts: &SchemaFacts, claim: &IdentityClaim) -> Option<LookupPlan> {
    Some(LookupPlan::ById {
        column: facts.owner_column.clone()?,
        key: claim.id.clone()?,
    })
}

fn match_by_email(facts: &SchemaFacts, claim: &IdentityClaim) -> Option<LookupPlan> {
    Some(LookupPlan::ByEmail {
        column: facts.email_column.clone()?,
        email: claim.email.clone()?,
    })
}

fn match_by_fallback(facts: &SchemaFacts, claim: &IdentityClaim) -> Option<LookupPlan> {
    let column = facts.owner_column.clone()?;
    let value = claim.fallback_value()?;

    if looks_like_email(value) {
        Some(LookupPlan::ViaDirectory { column, email: value.to_string() })
    } else {
        Some(LookupPlan::ByFallbackKey { column, key: OwnerKey::Text(value.to_string()) })
    }
}

/// Quote an identifier for SQL
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `ORDER BY` body: optional descending sort column, then the key ascending
fn order_terms(order_column: Option<&str>, tiebreak: &[String]) -> String {
    let mut terms = Vec::new();
    if let Some(column) = order_column {
        terms.push(format!("{} DESC", quote_ident(column)));
    }
    if tiebreak.is_empty() {
        terms.push("rowid ASC".to_string());
    } else {
        terms.extend(tiebreak.iter().map(|k| format!("{} ASC", quote_ident(k))));
    }
    terms.join(", ")
}

/// Query for owned records. Binds `?1` to the owner value and `?2` to the limit.
pub fn record_query(facts: &SchemaFacts, column: &str) -> String {
    format!(
        "SELECT * FROM {} WHERE {} = ?1 ORDER BY {} LIMIT ?2",
        quote_ident(&facts.table),
        quote_ident(column),
        order_terms(facts.order_column.as_deref(), &facts.tiebreak),
    )
}

/// Query mapping an email to an id in a directory table. Binds `?1` to the email.
pub fn directory_query(directory: &TableSchema, id_column: &str, email_column: &str) -> String {
    let key: Vec<String> = directory.primary_key().into_iter().map(String::from).collect();
    format!(
        "SELECT {} AS id FROM {} WHERE {} = ?1 AND {} IS NOT NULL ORDER BY {} LIMIT 1",
        quote_ident(id_column),
        quote_ident(&directory.name),
        quote_ident(email_column),
        quote_ident(id_column),
        order_terms(None, &key),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts(owner: Option<&str>, email: Option<&str>) -> SchemaFacts {
        SchemaFacts {
            table: "task".to_string(),
            owner_column: owner.map(String::from),
            email_column: email.map(String::from),
            order_column: Some("created_date".to_string()),
            tiebreak: vec!["task_id".to_string()],
        }
    }

    fn full_claim() -> IdentityClaim {
        IdentityClaim {
            id: Some(OwnerKey::Int(7)),
            email: Some("nimal@farm.lk".to_string()),
            name: Some("Nimal".to_string()),
        }
    }

    #[test]
    fn test_id_wins_over_email() {
        let plan = plan(&facts(Some("worker_id"), Some("email")), &full_claim()).unwrap();
        assert_eq!(plan, LookupPlan::ById { column: "worker_id".to_string(), key: OwnerKey::Int(7) });
    }

    #[test]
    fn test_email_when_no_owner_column() {
        let plan = plan(&facts(None, Some("email")), &full_claim()).unwrap();
        assert_eq!(
            plan,
            LookupPlan::ByEmail { column: "email".to_string(), email: "nimal@farm.lk".to_string() }
        );
    }

    #[test]
    fn test_email_claim_without_email_column_goes_through_directory() {
        let plan = plan(&facts(Some("worker_id"), None), &IdentityClaim::with_email("nimal@farm.lk")).unwrap();
        assert_eq!(
            plan,
            LookupPlan::ViaDirectory { column: "worker_id".to_string(), email: "nimal@farm.lk".to_string() }
        );
    }

    #[test]
    fn test_name_is_used_as_key() {
        let plan = plan(&facts(Some("assigned_to"), None), &IdentityClaim::with_name("Nimal")).unwrap();
        assert_eq!(
            plan,
            LookupPlan::ByFallbackKey { column: "assigned_to".to_string(), key: OwnerKey::Text("Nimal".to_string()) }
        );
    }

    #[test]
    fn test_no_plan() {
        assert_eq!(plan(&facts(None, Some("email")), &IdentityClaim::with_id(7)), None);
        assert_eq!(plan(&facts(Some("worker_id"), Some("email")), &IdentityClaim::default()), None);
        assert_eq!(plan(&facts(None, Some("email")), &IdentityClaim::with_name("Nimal")), None);
    }

    #[test]
    fn test_record_query_shape() {
        let sql = record_query(&facts(Some("worker_id"), None), "worker_id");
        assert_eq!(
            sql,
            "SELECT * FROM \"task\" WHERE \"worker_id\" = ?1 ORDER BY \"created_date\" DESC, \"task_id\" ASC LIMIT ?2"
        );

        let mut unordered = facts(Some("worker_id"), None);
        unordered.order_column = None;
        unordered.tiebreak.clear();
        assert!(record_query(&unordered, "worker_id").ends_with("ORDER BY rowid ASC LIMIT ?2"));
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}

//! Candidate lists
//!
//! Every list is ordered by priority. Defaults describe the task tables the
//! farm's mobile app has used over its lifetime.

use serde::{Deserialize, Serialize};

/// Ordered candidate names for each discovery step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateSet {
    pub tables: Vec<String>,
    pub owner_columns: Vec<String>,
    pub email_columns: Vec<String>,
    pub order_columns: Vec<String>,
    pub directories: Vec<DirectoryCandidate>,
}

/// Auxiliary table that maps an email to an owner id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryCandidate {
    pub table: String,
    #[serde(default = "default_directory_id_columns")]
    pub id_columns: Vec<String>,
    #[serde(default = "default_directory_email_columns")]
    pub email_columns: Vec<String>,
}

impl DirectoryCandidate {
    pub fn new(table: &str, id_columns: &[&str], email_columns: &[&str]) -> Self {
        Self {
            table: table.to_string(),
            id_columns: strings(id_columns),
            email_columns: strings(email_columns),
        }
    }

    /// Directory table using the default id and email column candidates
    pub fn with_default_columns(table: &str) -> Self {
        Self {
            table: table.to_string(),
            id_columns: default_directory_id_columns(),
            email_columns: default_directory_email_columns(),
        }
    }
}

impl Default for CandidateSet {
    fn default() -> Self {
        Self {
            tables: strings(&["task", "tasks"]),
            owner_columns: strings(&["worker_id", "workerId", "user_id", "userId", "assigned_to"]),
            email_columns: strings(&[
                "worker_email",
                "email",
                "assigned_email",
                "assignee_email",
                "workerEmail",
            ]),
            order_columns: strings(&["created_date", "created_at", "createdAt", "created"]),
            directories: [
                "worker", "workers", "user", "users", "employee", "employees", "staff", "staffs",
            ]
            .iter()
            .map(|table| DirectoryCandidate::with_default_columns(table))
            .collect(),
        }
    }
}

fn default_directory_id_columns() -> Vec<String> {
    strings(&["id", "user_id", "userId", "worker_id", "workerId"])
}

fn default_directory_email_columns() -> Vec<String> {
    strings(&["email", "worker_email", "user_email", "assigned_email"])
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

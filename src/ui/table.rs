use serde_json::Value;
use tabled::{builder::Builder, settings::Style, Table, Tabled};
use crate::resolver::Record;

#[derive(Tabled)]
struct FactRow {
    #[tabled(rename = "Fact")]
    fact: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// Two-column table of labelled facts
pub fn facts_table(facts: &[(&str, String)]) -> String {
    let rows: Vec<FactRow> = facts
        .iter()
        .map(|(fact, value)| FactRow { fact: fact.to_string(), value: value.clone() })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Records as a table; columns appear in first-seen order across rows
pub fn records_table(records: &[Record]) -> String {
    if records.is_empty() {
        return String::new();
    }

    let mut columns: Vec<&str> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key.as_str());
            }
        }
    }

    let mut builder = Builder::default();
    builder.push_record(columns.iter().map(|c| c.to_string()));
    for record in records {
        builder.push_record(columns.iter().map(|c| cell(record.get(*c))));
    }
    builder.build().with(Style::rounded()).to_string()
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

//! Terminal output for the CLI

pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{dim, field, header, success, warn};
pub use table::{facts_table, records_table};
pub use theme::{theme, Theme};

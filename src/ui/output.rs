use crate::ui::{theme, Icons};
use owo_colors::OwoColorize;

pub fn header(icon: &str, text: &str) {
    println!("{} {}", icon, text.style(theme().title.clone()));
}

/// `  label: value`, label highlighted
pub fn field(label: &str, value: &str) {
    println!("  {}: {}", label.style(theme().label.clone()), value);
}

pub fn success(text: &str) {
    println!("{} {}", Icons::CHECK, text.style(theme().ok.clone()));
}

pub fn warn(text: &str) {
    eprintln!("{} {}", Icons::WARN, text.style(theme().caution.clone()));
}

pub fn dim(text: &str) -> String {
    text.style(theme().faint.clone()).to_string()
}

//! Terminal output helpers.

use console::style;

/// A completed action.
pub fn success(msg: &str) {
    println!("{} {msg}", style("ok").green().bold());
}

/// A failure, on stderr.
pub fn error(msg: &str) {
    eprintln!("{} {msg}", style("error").red().bold());
}

pub fn warning(msg: &str) {
    println!("{} {msg}", style("warn").yellow().bold());
}

pub fn info(msg: &str) {
    println!("{} {msg}", style("::").cyan());
}

/// Title printed before a service starts.
pub fn header(title: &str) {
    println!();
    println!("{}", style(title).bold().underlined());
}

/// An aligned `key: value` line under a header.
pub fn kv(key: &str, value: &str) {
    println!("  {:<14} {value}", style(format!("{key}:")).dim());
}

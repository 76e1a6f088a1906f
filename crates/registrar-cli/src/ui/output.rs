//! Formatted output.
//!
//! Status lines go to stderr so stdout carries only machine-readable
//! results (tokens, identifiers, JSON reports).

use console::style;

/// Print a success line.
pub fn success(msg: &str) {
    eprintln!("{} {msg}", style("✓").green().bold());
}

/// Print an error line.
pub fn error(msg: &str) {
    eprintln!("{} {msg}", style("✗").red().bold());
}

/// Print a warning line.
pub fn warning(msg: &str) {
    eprintln!("{} {msg}", style("⚠").yellow().bold());
}

/// Print an info line.
pub fn info(msg: &str) {
    eprintln!("{} {msg}", style("ℹ").blue().bold());
}

/// Print a section title.
pub fn header(msg: &str) {
    eprintln!("\n{}", style(msg).bold().underlined());
}

/// Print a key-value pair.
pub fn kv(key: &str, value: &str) {
    eprintln!("  {}: {value}", style(key).bold());
}

/// Print a credential that is shown exactly once.
pub fn secret(label: &str, value: &str) {
    eprintln!(
        "{} {label}: {}",
        style("🔑").yellow(),
        style(value).bold().reverse()
    );
    eprintln!("  {}", style("Store it now; it cannot be shown again.").dim());
}

/// Print an access decision.
pub fn decision(allowed: bool, resource: &str, action: &str) {
    if allowed {
        println!("{} {resource}:{action}", style("ALLOWED").green().bold());
    } else {
        println!("{} {resource}:{action}", style("DENIED").red().bold());
    }
}

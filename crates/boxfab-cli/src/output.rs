//! Output helpers shared by the commands.

use colored::Colorize;
use serde::Serialize;

use crate::OutputFormat;

/// Print a serializable result. Text mode falls back to pretty JSON;
/// commands with a text rendering of their own only call this for JSON.
pub fn print<T: Serialize>(value: &T, _format: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("{}: failed to serialize output: {}", "Error".red().bold(), e),
    }
}

/// Green check line. Suppressed in JSON mode so stdout stays parseable.
pub fn success(message: &str, format: OutputFormat, quiet: bool) {
    if quiet || matches!(format, OutputFormat::Json) {
        return;
    }
    println!("{} {}", "✓".green().bold(), message);
}

/// Status line on stderr.
pub fn info(message: &str, format: OutputFormat, quiet: bool) {
    if quiet || matches!(format, OutputFormat::Json) {
        return;
    }
    eprintln!("{} {}", "→".blue(), message);
}

/// Yellow warning on stderr, shown in both formats.
pub fn warn(message: &str, quiet: bool) {
    if quiet {
        return;
    }
    eprintln!("{}: {}", "Warning".yellow().bold(), message);
}

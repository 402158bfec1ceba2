//! Output formatting for CLI commands
//!
//! Commands print text themselves and hand structured results to
//! [`Output::data`]; status lines and `--verbose` tracing go through here.

use serde::Serialize;
use serde_json::json;

pub use crate::storage::OutputFormat;

/// Output helper for consistent formatting
pub struct Output {
    format: OutputFormat,
    verbose: bool,
}

impl Output {
    pub fn new(format: OutputFormat, verbose: bool) -> Self {
        Self { format, verbose }
    }

    /// Prints a one-line status message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Text => println!("{}", message),
            OutputFormat::Json => println!("{}", json!({ "success": true, "message": message })),
        }
    }

    /// Reports a non-fatal error on stderr
    pub fn error(&self, message: &str) {
        match self.format {
            OutputFormat::Text => eprintln!("Error: {}", message),
            OutputFormat::Json => eprintln!("{}", json!({ "success": false, "error": message })),
        }
    }

    /// Prints a serializable result (pretty JSON in text mode)
    pub fn data<T: Serialize + ?Sized>(&self, data: &T) {
        let rendered = match self.format {
            OutputFormat::Text => serde_json::to_string_pretty(data),
            OutputFormat::Json => serde_json::to_string(data),
        };
        match rendered {
            Ok(json) => println!("{}", json),
            Err(e) => self.error(&format!("Failed to serialize output: {}", e)),
        }
    }

    /// Prints an aligned `label: value` line (text only)
    pub fn field(&self, label: &str, value: impl std::fmt::Display) {
        if self.is_text() {
            println!("{:<22} {}", format!("{}:", label), value);
        }
    }

    /// Prints a column header and rule (text only)
    pub fn header(&self, columns: &str, width: usize) {
        if self.is_text() {
            println!("{}", columns);
            println!("{}", "-".repeat(width));
        }
    }

    /// Prints a blank line (text only)
    pub fn blank(&self) {
        if self.is_text() {
            println!();
        }
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    pub fn is_text(&self) -> bool {
        self.format == OutputFormat::Text
    }

    /// Prints a verbose debug message (only when --verbose is set)
    pub fn verbose(&self, message: &str) {
        if self.verbose {
            eprintln!("[verbose] {}", message);
        }
    }

    /// Prints a verbose debug message with context (only when --verbose is set)
    pub fn verbose_ctx(&self, context: &str, message: &str) {
        if self.verbose {
            eprintln!("[verbose:{}] {}", context, message);
        }
    }
}

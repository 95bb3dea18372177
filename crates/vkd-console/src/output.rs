//! Output formatting for CLI results
//!
//! Three formats:
//! - Table: Human-readable property tables (default)
//! - JSON: Structured JSON for scripting and automation
//! - Quiet: Minimal output, exit codes only

use std::str::FromStr;

use comfy_table::{presets::UTF8_FULL, Table};
use serde::Serialize;

use crate::ExitCode;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Quiet,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "quiet" => Ok(Self::Quiet),
            _ => Err(format!("Unknown output format: {s}")),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Json => write!(f, "json"),
            Self::Quiet => write!(f, "quiet"),
        }
    }
}

/// A command result that can be shown as a property table or as JSON.
pub trait Report: Serialize {
    /// Command name recorded in JSON responses.
    fn command(&self) -> &'static str;

    /// (property, value) rows for table output.
    fn rows(&self) -> Vec<(&'static str, String)>;
}

/// Standard JSON response wrapper for consistent schema
#[derive(Serialize)]
pub struct JsonResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// ISO 8601 timestamp
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code_name: Option<&'static str>,
}

impl<T: Serialize> JsonResponse<T> {
    pub fn success_with_command(data: T, command: &str) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            command: Some(command.to_string()),
            exit_code: None,
            exit_code_name: None,
        }
    }
}

impl JsonResponse<()> {
    pub fn error_with_code(message: &str, code: ExitCode) -> JsonResponse<()> {
        JsonResponse {
            success: false,
            data: None,
            error: Some(message.to_string()),
            timestamp: chrono::Utc::now().to_rfc3339(),
            command: None,
            exit_code: Some(code as i32),
            exit_code_name: Some(code.name()),
        }
    }
}

/// Formats output for different modes
pub struct OutputFormatter {
    format: OutputFormat,
    verbose: bool,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat, verbose: bool) -> Self {
        Self { format, verbose }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn is_quiet(&self) -> bool {
        self.format == OutputFormat::Quiet
    }

    /// Render a command result.
    pub fn format_report<R: Report>(&self, report: &R) -> String {
        match self.format {
            OutputFormat::Table => Self::rows_table(&report.rows()),
            OutputFormat::Json => self.to_json_response(report, report.command()),
            OutputFormat::Quiet => String::new(),
        }
    }

    /// Render an error together with the exit code it maps to.
    pub fn format_error_with_code(&self, error: &dyn std::error::Error, code: ExitCode) -> String {
        match self.format {
            OutputFormat::Table => format!("Error: {error}\n{}", code.description()),
            OutputFormat::Json => {
                self.to_json(&JsonResponse::<()>::error_with_code(&error.to_string(), code))
            }
            OutputFormat::Quiet => String::new(),
        }
    }

    /// Progress message, shown in verbose table mode only
    pub fn progress(&self, message: &str) {
        if self.verbose && self.format == OutputFormat::Table {
            eprintln!("... {message}");
        }
    }

    /// Print a rendered block unless it is empty
    pub fn emit(&self, rendered: &str) {
        if !rendered.is_empty() {
            println!("{rendered}");
        }
    }

    fn rows_table(rows: &[(&'static str, String)]) -> String {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Property", "Value"]);
        for (name, value) in rows {
            table.add_row(vec![*name, value.as_str()]);
        }
        table.to_string()
    }

    fn to_json<T: Serialize>(&self, value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }

    fn to_json_response<T: Serialize>(&self, value: &T, command: &str) -> String {
        self.to_json(&JsonResponse::success_with_command(value, command))
    }
}

//! Output rendering and formatting

use chrono::{DateTime, Utc};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use serde::Serialize;
use sideload_errors::{Error, UserFacingError};
use sideload_ops::{BatchResults, ReconcileReport};
use sideload_types::{App, InstalledApp};
use std::io;

/// Terminal outcome of one app in an install or refresh
#[derive(Debug, Clone, Serialize)]
pub struct AppResult {
    pub identifier: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AppResult {
    pub fn new(identifier: &str, result: &Result<InstalledApp, Error>) -> Self {
        match result {
            Ok(installed) => Self {
                identifier: identifier.to_string(),
                success: true,
                expires: Some(installed.expiration_date),
                error: None,
            },
            Err(err) => Self {
                identifier: identifier.to_string(),
                success: false,
                expires: None,
                error: Some(err.user_message().into_owned()),
            },
        }
    }

    /// Rows sorted by identifier
    pub fn from_results(results: &BatchResults) -> Vec<Self> {
        let mut rows: Vec<Self> = results
            .iter()
            .map(|(identifier, result)| Self::new(identifier, result))
            .collect();
        rows.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        rows
    }
}

/// What a command produced
#[derive(Debug, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum CommandOutput {
    Apps(Vec<App>),
    Installed(Vec<InstalledApp>),
    Results(Vec<AppResult>),
    Reconciled(ReconcileReport),
    Message(String),
}

impl CommandOutput {
    /// Number of failed apps in a results listing
    pub fn failures(&self) -> Option<(usize, usize)> {
        match self {
            Self::Results(rows) => {
                let failed = rows.iter().filter(|row| !row.success).count();
                (failed > 0).then_some((failed, rows.len()))
            }
            _ => None,
        }
    }
}

/// Output renderer for CLI results
#[derive(Clone)]
pub struct OutputRenderer {
    json_output: bool,
    colors: bool,
}

impl OutputRenderer {
    pub fn new(json_output: bool, colors: bool) -> Self {
        Self {
            json_output,
            colors,
        }
    }

    pub fn render(&self, output: &CommandOutput) -> io::Result<()> {
        if self.json_output {
            let json = serde_json::to_string_pretty(output).map_err(io::Error::other)?;
            println!("{json}");
            return Ok(());
        }

        match output {
            CommandOutput::Apps(apps) => self.render_apps(apps),
            CommandOutput::Installed(records) => self.render_installed(records),
            CommandOutput::Results(rows) => self.render_results(rows),
            CommandOutput::Reconciled(report) => {
                println!(
                    "Checked {} app(s), removed {} record(s)",
                    report.checked,
                    report.removed.len()
                );
                for identifier in &report.removed {
                    println!("  - {identifier}");
                }
            }
            CommandOutput::Message(message) => println!("{message}"),
        }
        Ok(())
    }

    fn table(&self, headers: &[&str]) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        if !self.colors {
            table.force_no_tty();
        }
        table.set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
        );
        table
    }

    fn render_apps(&self, apps: &[App]) {
        if apps.is_empty() {
            println!("The catalog is empty");
            return;
        }
        let mut table = self.table(&["Identifier", "Name", "Version", "Developer", "Size"]);
        for app in apps {
            table.add_row(vec![
                Cell::new(&app.identifier),
                Cell::new(&app.name),
                Cell::new(&app.version),
                Cell::new(&app.developer),
                Cell::new(app.size.map_or_else(String::new, format_size)),
            ]);
        }
        println!("{table}");
    }

    fn render_installed(&self, records: &[InstalledApp]) {
        if records.is_empty() {
            println!("No apps installed");
            return;
        }
        let now = Utc::now();
        let mut table = self.table(&["Identifier", "Name", "Version", "Refreshed", "Expires"]);
        for record in records {
            let expires = Cell::new(record.expiration_date.format("%Y-%m-%d %H:%M"));
            let expires = if record.is_expired(now) {
                expires.fg(Color::Red)
            } else {
                expires
            };
            table.add_row(vec![
                Cell::new(&record.identifier),
                Cell::new(&record.name),
                Cell::new(&record.version),
                Cell::new(record.refreshed_date.format("%Y-%m-%d %H:%M")),
                expires,
            ]);
        }
        println!("{table}");
    }

    fn render_results(&self, rows: &[AppResult]) {
        if rows.is_empty() {
            println!("Nothing to do");
            return;
        }
        let mut table = self.table(&["App", "Result", "Expires / Error"]);
        for row in rows {
            let (status, detail) = if row.success {
                (
                    Cell::new("ok").fg(Color::Green),
                    row.expires
                        .map(|date| date.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_default(),
                )
            } else {
                (
                    Cell::new("failed").fg(Color::Red),
                    row.error.clone().unwrap_or_default(),
                )
            };
            table.add_row(vec![Cell::new(&row.identifier), status, Cell::new(detail)]);
        }
        println!("{table}");
    }
}

#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sideload_errors::SigningError;

    #[test]
    fn sizes_use_binary_units() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn failures_count_only_failed_rows() {
        let mut results = BatchResults::new();
        results.insert(
            "com.example.b".to_string(),
            Err(SigningError::MissingCredential.into()),
        );
        let rows = AppResult::from_results(&results);
        let output = CommandOutput::Results(rows);
        assert_eq!(output.failures(), Some((1, 1)));
        assert_eq!(CommandOutput::Message(String::new()).failures(), None);
    }
}

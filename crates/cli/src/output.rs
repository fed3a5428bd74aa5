//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use serde::Serialize;
use stepwise_common::{RunReport, StepResult, StepStatus, TestCaseResult};

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<Cell>;
}

impl TableDisplay for TestCaseResult {
    fn headers() -> Vec<&'static str> {
        vec!["Case", "Status", "Steps", "Ended", "Duration", "Error"]
    }

    fn row(&self) -> Vec<Cell> {
        let status = Cell::new(self.status.to_string()).fg(if self.is_pass() {
            Color::Green
        } else {
            Color::Red
        });
        let error = self
            .error
            .clone()
            .or_else(|| self.steps.iter().rev().find_map(|s| s.error.clone()))
            .unwrap_or_default();
        vec![
            Cell::new(&self.name),
            status,
            Cell::new(format!("{}/{}", self.summary.passed, self.summary.total)),
            Cell::new(self.termination.to_string()),
            Cell::new(format!("{} ms", self.duration_ms)),
            Cell::new(error),
        ]
    }
}

/// Print a serializable value in a machine-readable format
pub fn print_serialized<T: Serialize + ?Sized>(value: &T, format: OutputFormat) {
    match format {
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(value).unwrap_or_default());
        }
        _ => {
            println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
        }
    }
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if items.is_empty() {
        println!("No items found.");
        return;
    }

    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }

            println!("{table}");
        }
        _ => print_serialized(items, format),
    }
}

/// Print a run report
pub fn print_report(report: &RunReport, format: OutputFormat) {
    if format != OutputFormat::Table {
        print_serialized(report, format);
        return;
    }

    if let Some(error) = &report.error {
        print_error(error);
    }
    if !report.cases.is_empty() {
        print_list(&report.cases, format);
    }

    let s = &report.summary;
    let line = format!(
        "{} case(s): {} passed, {} failed; {} step(s): {} passed, {} failed ({} ms)",
        s.total_cases,
        s.passed_cases,
        s.failed_cases,
        s.total_steps,
        s.passed_steps,
        s.failed_steps,
        s.duration_ms
    );
    if report.is_success() {
        print_success(&line);
    } else {
        println!("{}", line.red());
    }
}

/// One progress line per finished step
pub fn print_step(case_id: &str, step: &StepResult) {
    let marker = match step.status {
        StepStatus::Pass => "✓".green(),
        StepStatus::Fail => "✗".red(),
        StepStatus::Pending => return,
    };
    let mut line = format!(
        "{} [{}] {}. {} ({} ms)",
        marker,
        case_id,
        step.index + 1,
        step.description,
        step.duration_ms
    );
    if let Some(note) = &step.note {
        line.push_str(&format!(" {}", format!("[{:?}]", note).dimmed()));
    }
    eprintln!("{}", line);
    if let Some(error) = &step.error {
        eprintln!("    {}", error.red());
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    eprintln!("⚠️  {}", message);
}

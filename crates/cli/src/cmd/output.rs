//! Shared output formatting for the vault commands.

use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use vaultlink_core::export::{AnalyzedLink, ExportResult};
use vaultlink_core::rename::{FileError, RenameResult};

/// Print any serializable value as pretty JSON.
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            std::process::exit(1);
        }
    }
}

/// Print rows as a rounded table, or `empty` when there are none.
pub fn print_table<T: Tabled>(rows: &[T], empty: &str) {
    if rows.is_empty() {
        println!("{}", empty);
        return;
    }
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

fn row(metric: &'static str, value: impl ToString) -> SummaryRow {
    SummaryRow { metric, value: value.to_string() }
}

#[derive(Tabled)]
pub struct LinkRow {
    #[tabled(rename = "Type")]
    pub link_type: String,
    #[tabled(rename = "Target")]
    pub target: String,
    #[tabled(rename = "Resolved")]
    pub resolved: String,
    #[tabled(rename = "Category")]
    pub category: String,
}

impl From<&AnalyzedLink> for LinkRow {
    fn from(analyzed: &AnalyzedLink) -> Self {
        let resolved = match (&analyzed.resolved, analyzed.ambiguous) {
            (Some(path), _) => path.clone(),
            (None, true) => "(ambiguous)".to_string(),
            (None, false) => "-".to_string(),
        };
        let link_type =
            if analyzed.link.image { "image" } else { analyzed.link.link_type.as_str() };
        Self {
            link_type: link_type.to_string(),
            target: analyzed.link.target.clone(),
            resolved,
            category: analyzed.category.as_str().to_string(),
        }
    }
}

pub fn print_rename_summary(result: &RenameResult) {
    println!("{} -> {}", result.source_path, result.target_path);
    let rows = vec![
        row("Files scanned", result.files_scanned),
        row("Files modified", result.files_modified),
        row("Links updated", result.links_updated),
        row("Errors", result.errors.len()),
        row("Duration", format!("{:.2?}", result.duration)),
    ];
    print_table(&rows, "");
    for path in &result.modified_files {
        println!("  {}", path);
    }
    print_diagnostics(&result.warnings, &result.errors);
}

pub fn print_export_summary(result: &ExportResult) {
    println!("Export to {}", result.target.display());
    let rows = vec![
        row("Files exported", result.files_exported),
        row("Assets copied", result.assets_copied),
        row("Backlinks included", result.backlinks_included),
        row("External links removed", result.external_links_removed),
        row("External links converted", result.external_links_converted),
        row("Internal links updated", result.internal_links_updated),
        row("Files renamed", result.files_renamed),
        row("Errors", result.errors.len()),
        row("Duration", format!("{:.2?}", result.duration)),
    ];
    print_table(&rows, "");
    if result.backlinks_depth_exhausted {
        eprintln!("warning: backlink depth limit reached; more notes may link into the selection");
    }
    print_diagnostics(&result.warnings, &result.errors);
}

fn print_diagnostics(warnings: &[String], errors: &[FileError]) {
    for warning in warnings {
        eprintln!("warning: {}", warning);
    }
    for error in errors {
        eprintln!("error: {}: {}", error.path, error.message);
    }
}

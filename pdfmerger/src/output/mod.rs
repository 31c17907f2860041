//! Output formatting and display for pdfmerger.
//!
//! This module handles all user-facing output of the command-line tool:
//! - Formatted status messages
//! - Error and warning display
//! - Summary reports
//! - Quiet and verbose modes
//!
//! Diagnostics from inside the library go through `tracing` instead.
//!
//! # Examples
//!
//! ```no_run
//! use pdfmerger::output::OutputFormatter;
//! use pdfmerger::config::Config;
//!
//! # fn example(config: Config) {
//! let formatter = OutputFormatter::from_config(&config);
//! formatter.info("Starting merge operation");
//! formatter.success("Merge completed successfully");
//! # }
//! ```

pub mod formatter;

pub use formatter::{MessageLevel, OutputFormatter};

use crate::merge::MergeStatistics;
use crate::validation::ValidationSummary;

/// Display a dry-run report.
pub fn display_validation_summary(formatter: &OutputFormatter, summary: &ValidationSummary) {
    for document in &summary.documents {
        let name = document
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| format!("input #{}", document.index));
        formatter.list_item(
            document.index + 1,
            &format!(
                "{name}: PDF {}, {} page(s), {} of {} objects reachable, {} xref",
                document.version,
                document.page_count,
                document.reachable_objects,
                document.object_count,
                document.xref_kind
            ),
        );
    }

    for path in &summary.missing {
        formatter.warning(&format!("Skipping {}: not a regular file", path.display()));
    }

    for failed in &summary.failed {
        formatter.warning(&format!(
            "Skipping {}: {}",
            failed.path.display(),
            failed.reason
        ));
    }

    formatter.info(&format!(
        "Validated {} file(s): {} pages, {}",
        summary.documents_validated(),
        summary.total_pages,
        summary.format_total_size()
    ));
}

/// Display the report of a finished merge.
pub fn display_merge_statistics(formatter: &OutputFormatter, stats: &MergeStatistics) {
    for skipped in &stats.skipped {
        formatter.warning(&format!(
            "Skipped input #{}: {}",
            skipped.index, skipped.reason
        ));
    }

    formatter.detail("Documents merged", &stats.documents_merged.to_string());
    formatter.detail("Objects written", &stats.object_count.to_string());
    formatter.detail(
        "Merge time",
        &format!("{:.2}s", stats.merge_time.as_secs_f64()),
    );
}

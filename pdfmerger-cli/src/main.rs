//! pdfmerger - Merge PDF files into a single document.
//!
//! Command-line front end of the pdfmerger library.

mod cli;

use clap::Parser;
use std::process;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use pdfmerger::config::{Config, OverwriteMode};
use pdfmerger::error::PdfMergeError;
use pdfmerger::merge::{CancelToken, PdfMerger};
use pdfmerger::output::{OutputFormatter, display_merge_statistics, display_validation_summary};
use pdfmerger::validation::Validator;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {err}");
        process::exit(err.exit_code());
    }
}

/// Install the log subscriber. `RUST_LOG` takes precedence over the flags.
fn init_tracing(cli: &Cli) {
    let default_level = if cli.verbose {
        "pdfmerger=debug"
    } else if cli.quiet {
        "pdfmerger=error"
    } else {
        "pdfmerger=warn"
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Main application logic.
async fn run(cli: Cli) -> Result<(), PdfMergeError> {
    cli.validate()?;
    let config = cli.to_config()?;
    debug!(inputs = config.inputs.len(), output = %config.output.display(), "configuration loaded");

    let formatter = OutputFormatter::from_config(&config);
    if formatter.should_print() && !config.json {
        formatter.section(&format!("{} v{}", pdfmerger::NAME, pdfmerger::VERSION));
    }

    if config.dry_run {
        return dry_run(&config, &formatter).await;
    }

    let validator = Validator::from_options(&config.merge);
    validator.validate_output(&config).await?;
    handle_output_overwrite(&config, &formatter).await?;

    let cancel = CancelToken::new();
    spawn_interrupt_handler(cancel.clone());

    if !config.json {
        formatter.info(&format!("Merging {} file(s)...", config.inputs.len()));
    }

    let merger = PdfMerger::new(config.merge.clone()).with_cancel_token(cancel);
    let stats = merger
        .merge_files_async(&config.inputs, &config.output)
        .await?;

    if config.json {
        println!("{}", to_json(&stats)?);
        return Ok(());
    }

    if formatter.should_print() {
        formatter.success(&format!(
            "Created {} ({} pages, {})",
            config.output.display(),
            stats.total_pages,
            stats.format_output_size()
        ));

        if formatter.is_verbose() {
            formatter.section("Statistics");
            display_merge_statistics(&formatter, &stats);
        } else {
            for skipped in &stats.skipped {
                formatter.warning(&format!(
                    "Skipped input #{}: {}",
                    skipped.index, skipped.reason
                ));
            }
        }
    }

    Ok(())
}

/// Parse every input and report, without writing the output.
async fn dry_run(config: &Config, formatter: &OutputFormatter) -> Result<(), PdfMergeError> {
    let validator = Validator::from_options(&config.merge);
    let summary = validator.validate_config(config).await?;

    if config.json {
        println!("{}", to_json(&summary)?);
        return Ok(());
    }

    display_validation_summary(formatter, &summary);
    formatter.success("Dry run completed successfully");
    formatter.info(&format!("  Output would be: {}", config.output.display()));
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, PdfMergeError> {
    serde_json::to_string_pretty(value)
        .map_err(|err| PdfMergeError::from(std::io::Error::other(err)))
}

/// Cancel the merge on Ctrl-C.
fn spawn_interrupt_handler(cancel: CancelToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received, cancelling merge");
            cancel.cancel();
        }
    });
}

/// Handle output file overwrite scenarios.
async fn handle_output_overwrite(
    config: &Config,
    formatter: &OutputFormatter,
) -> Result<(), PdfMergeError> {
    if !config.output.exists() {
        return Ok(());
    }

    match config.overwrite_mode {
        OverwriteMode::Force => Ok(()),
        OverwriteMode::NoClobber => Err(PdfMergeError::OutputExists {
            path: config.output.clone(),
        }),
        OverwriteMode::Prompt => {
            // Nobody to ask in quiet or JSON mode
            if formatter.is_quiet() || config.json {
                return Err(PdfMergeError::OutputExists {
                    path: config.output.clone(),
                });
            }

            formatter.warning(&format!(
                "Output file already exists: {}",
                config.output.display()
            ));

            use std::io::{self, Write};
            print!("Overwrite? [y/N]: ");
            io::stdout().flush().ok();

            let mut response = String::new();
            io::stdin().read_line(&mut response)?;

            let response = response.trim().to_lowercase();
            if response == "y" || response == "yes" {
                Ok(())
            } else {
                Err(PdfMergeError::Cancelled)
            }
        }
    }
}

//! CLI argument parsing for pdfmerger.
//!
//! This module defines the command-line interface using `clap` and turns the
//! parsed arguments into a validated [`Config`].

use anyhow::{Context, bail};
use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;

use pdfmerger::config::{
    CompressionLevel, Config, EmptyInput, ErrorMode, MergeOptions, Metadata, OverwriteMode,
};
use pdfmerger::error::PdfMergeError;

/// Merge PDF files into a single document.
///
/// pdfmerger reads each input from raw bytes, copies only the objects its
/// pages use and writes one document with all pages in input order.
#[derive(Parser, Debug)]
#[command(name = "pdfmerger")]
#[command(version)]
#[command(about = "Merge PDF files into a single document", long_about = None)]
#[command(author)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Input PDF files to merge (in order)
    ///
    /// Glob patterns are expanded; matches of one pattern are merged in
    /// lexical order.
    ///
    /// Examples:
    ///   pdfmerger a.pdf b.pdf -o merged.pdf
    ///   pdfmerger 'chapter*.pdf' -o book.pdf
    #[arg(required = true, value_name = "FILE|GLOB")]
    pub inputs: Vec<String>,

    /// Output PDF file path
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Dry run - parse every input and report without writing output
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Verbose output - show per-document details and debug logs
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Overwrite an existing output file without confirmation
    #[arg(short, long)]
    pub force: bool,

    /// Never overwrite an existing output file
    #[arg(long, conflicts_with = "force")]
    pub no_clobber: bool,

    /// Abort on the first input that fails to parse
    ///
    /// By default, broken inputs are skipped with a warning.
    #[arg(long)]
    pub strict: bool,

    /// Write an empty document when no input is usable
    ///
    /// By default, a merge without usable input fails.
    #[arg(long)]
    pub allow_empty: bool,

    /// Compression level for output PDF
    ///
    /// - none: streams copied byte for byte, classic xref table
    /// - standard: unfiltered streams Flate-compressed (default)
    /// - maximum: additionally packs objects into object streams
    #[arg(short, long, value_name = "LEVEL", default_value = "standard")]
    #[arg(value_parser = ["none", "standard", "maximum"])]
    pub compression: String,

    /// Set title metadata for output PDF
    #[arg(long, value_name = "TEXT")]
    pub title: Option<String>,

    /// Set author metadata for output PDF
    #[arg(long, value_name = "TEXT")]
    pub author: Option<String>,

    /// Set subject metadata for output PDF
    #[arg(long, value_name = "TEXT")]
    pub subject: Option<String>,

    /// Set keywords metadata for output PDF (comma-separated)
    #[arg(long, value_name = "TEXT")]
    pub keywords: Option<String>,

    /// Number of parallel parse jobs
    ///
    /// Default is the number of CPU cores. Use 1 for sequential parsing.
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Convert CLI arguments into a validated Config.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if a glob pattern is malformed or matches
    /// nothing, or if the resulting configuration is inconsistent.
    pub fn to_config(&self) -> Result<Config, PdfMergeError> {
        let inputs = self
            .expand_inputs()
            .map_err(|e| PdfMergeError::invalid_config(format!("{e:#}")))?;

        let compression = CompressionLevel::from_str(&self.compression)?;

        let overwrite_mode = if self.force {
            OverwriteMode::Force
        } else if self.no_clobber {
            OverwriteMode::NoClobber
        } else {
            OverwriteMode::Prompt
        };

        let mut merge = MergeOptions::default()
            .with_compression(compression)
            .with_metadata(Metadata::new(
                self.title.clone(),
                self.author.clone(),
                self.subject.clone(),
                self.keywords.clone(),
            ));
        if self.strict {
            merge = merge.with_error_mode(ErrorMode::Strict);
        }
        if self.allow_empty {
            merge = merge.with_empty_input(EmptyInput::EmptyDocument);
        }
        if let Some(jobs) = self.jobs {
            merge = merge.with_jobs(jobs);
        }

        let config = Config {
            inputs,
            output: self.output.clone(),
            dry_run: self.dry_run,
            verbose: self.verbose,
            quiet: self.quiet,
            overwrite_mode,
            json: self.json,
            merge,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate CLI arguments that need no file system access.
    pub fn validate(&self) -> Result<(), PdfMergeError> {
        if self.inputs.is_empty() {
            return Err(PdfMergeError::invalid_config("No input files specified"));
        }

        if self.jobs == Some(0) {
            return Err(PdfMergeError::invalid_config(
                "Number of jobs must be at least 1",
            ));
        }

        if !["none", "standard", "maximum"].contains(&self.compression.as_str()) {
            return Err(PdfMergeError::invalid_config(format!(
                "Invalid compression level: {}",
                self.compression
            )));
        }

        Ok(())
    }

    /// Expand glob patterns in the inputs, keeping argument order.
    ///
    /// Arguments without glob metacharacters are kept as given, so a
    /// missing file surfaces later as a skipped input rather than here.
    pub fn expand_inputs(&self) -> anyhow::Result<Vec<PathBuf>> {
        let mut paths = Vec::new();

        for input in &self.inputs {
            if !input.contains(['*', '?', '[']) {
                paths.push(PathBuf::from(input));
                continue;
            }

            let mut matches = glob::glob(input)
                .with_context(|| format!("Invalid glob pattern: {input}"))?
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("Failed to expand {input}"))?;
            if matches.is_empty() {
                bail!("No files match {input}");
            }
            matches.sort();
            paths.extend(matches);
        }

        Ok(paths)
    }
}

//! Configuration module for pdfmerger.
//!
//! [`MergeOptions`] controls the merge engine itself. [`Config`] is the
//! complete, validated description of one command-line run, built from CLI
//! arguments and carrying a `MergeOptions` inside.

use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{PdfMergeError, Result};

/// What to do when an input document cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorMode {
    /// Skip the document with a warning and merge the rest.
    #[default]
    Lenient,
    /// Abort the whole merge on the first bad document.
    Strict,
}

/// What to produce when no usable document is left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EmptyInput {
    /// Fail with [`PdfMergeError::NoContent`].
    #[default]
    Error,
    /// Write a valid document with an empty page tree.
    EmptyDocument,
}

/// Compression level for the output PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CompressionLevel {
    /// Classic cross-reference table; streams are copied byte for byte.
    None,
    /// Classic cross-reference table; streams without a filter are
    /// Flate-compressed.
    #[default]
    Standard,
    /// Like `Standard`, plus small objects packed into object streams and a
    /// compressed cross-reference stream.
    Maximum,
}

impl CompressionLevel {
    /// Whether unfiltered streams get Flate-compressed.
    pub fn compresses_streams(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Whether the output uses object streams and a cross-reference stream.
    pub fn uses_object_streams(&self) -> bool {
        matches!(self, Self::Maximum)
    }

    /// flate2 level to use for this setting.
    pub fn flate_level(&self) -> flate2::Compression {
        match self {
            Self::None => flate2::Compression::none(),
            Self::Standard => flate2::Compression::default(),
            Self::Maximum => flate2::Compression::best(),
        }
    }
}

impl FromStr for CompressionLevel {
    type Err = PdfMergeError;

    /// Parse compression level from string: "none", "standard" or "maximum".
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "standard" => Ok(Self::Standard),
            "maximum" => Ok(Self::Maximum),
            _ => Err(PdfMergeError::invalid_config(format!(
                "Invalid compression level: {s}. Must be one of: none, standard, maximum"
            ))),
        }
    }
}

/// PDF metadata to set on the output document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    /// Document title.
    pub title: Option<String>,
    /// Document author.
    pub author: Option<String>,
    /// Document subject.
    pub subject: Option<String>,
    /// Document keywords (comma-separated).
    pub keywords: Option<String>,
}

impl Metadata {
    /// Check if any metadata fields are set.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.author.is_none()
            && self.subject.is_none()
            && self.keywords.is_none()
    }

    /// Create metadata from optional strings, trimming whitespace.
    pub fn new(
        title: Option<String>,
        author: Option<String>,
        subject: Option<String>,
        keywords: Option<String>,
    ) -> Self {
        let to_string_opt = |opt: Option<String>| {
            opt.filter(|s| !s.trim().is_empty())
                .map(|s| s.trim().to_string())
        };

        Self {
            title: to_string_opt(title),
            author: to_string_opt(author),
            subject: to_string_opt(subject),
            keywords: to_string_opt(keywords),
        }
    }
}

/// Options of the merge engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOptions {
    /// Per-document failure policy.
    pub error_mode: ErrorMode,
    /// Result of a merge with no usable input.
    pub empty_input: EmptyInput,
    /// Output compression.
    pub compression: CompressionLevel,
    /// Number of parallel parse workers (None = auto-detect).
    pub jobs: Option<usize>,
    /// Document information written to the output.
    pub metadata: Metadata,
}

impl MergeOptions {
    /// Set the per-document failure policy.
    pub fn with_error_mode(mut self, error_mode: ErrorMode) -> Self {
        self.error_mode = error_mode;
        self
    }

    /// Set the behaviour for empty input.
    pub fn with_empty_input(mut self, empty_input: EmptyInput) -> Self {
        self.empty_input = empty_input;
        self
    }

    /// Set the output compression.
    pub fn with_compression(mut self, compression: CompressionLevel) -> Self {
        self.compression = compression;
        self
    }

    /// Set the number of parse workers.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = Some(jobs);
        self
    }

    /// Set the output metadata.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Validate the options.
    pub fn validate(&self) -> Result<()> {
        if self.jobs == Some(0) {
            return Err(PdfMergeError::invalid_config(
                "Number of jobs must be at least 1",
            ));
        }
        Ok(())
    }

    /// Get the effective number of parallel jobs.
    ///
    /// Returns the configured job count, or the number of CPU cores if auto-detect.
    pub fn effective_jobs(&self) -> usize {
        self.jobs.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

/// Output file overwrite behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwriteMode {
    /// Prompt the user before overwriting (default).
    #[default]
    Prompt,
    /// Always overwrite without prompting.
    Force,
    /// Never overwrite, error if file exists.
    NoClobber,
}

/// Complete configuration for a PDF merge run.
///
/// This structure contains all settings needed to perform a merge,
/// derived and validated from CLI arguments.
#[derive(Debug, Clone)]
pub struct Config {
    /// Input PDF file paths (in merge order).
    pub inputs: Vec<PathBuf>,

    /// Output PDF file path.
    pub output: PathBuf,

    /// Dry run mode - validate without creating output.
    pub dry_run: bool,

    /// Verbose output mode.
    pub verbose: bool,

    /// Quiet mode - suppress non-error output.
    pub quiet: bool,

    /// File overwrite behavior.
    pub overwrite_mode: OverwriteMode,

    /// Print machine-readable JSON instead of text.
    pub json: bool,

    /// Merge engine options.
    pub merge: MergeOptions,
}

impl Config {
    /// Returns a reference to inputs.
    pub fn inputs(&self) -> &[PathBuf] {
        self.inputs.as_ref()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if:
    /// - No input files are specified
    /// - Verbose and quiet modes are both enabled
    /// - Jobs count is zero
    /// - The output path is also an input
    pub fn validate(&self) -> Result<()> {
        if self.inputs.is_empty() {
            return Err(PdfMergeError::invalid_config("No input files specified"));
        }

        if self.verbose && self.quiet {
            return Err(PdfMergeError::invalid_config(
                "Cannot use both --verbose and --quiet",
            ));
        }

        self.merge.validate()?;

        if let Some(input) = self.inputs.iter().find(|input| **input == self.output) {
            return Err(PdfMergeError::invalid_config(format!(
                "Output file cannot be the same as an input file: {}",
                input.display()
            )));
        }

        Ok(())
    }

    /// Get the effective number of parallel jobs.
    pub fn effective_jobs(&self) -> usize {
        self.merge.effective_jobs()
    }

    /// Check if output should be displayed.
    ///
    /// Returns false if in quiet mode and not doing a dry run.
    pub fn should_print(&self) -> bool {
        !self.quiet || self.dry_run
    }
}

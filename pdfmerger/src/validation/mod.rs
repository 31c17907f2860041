//! Input validation for pdfmerger.
//!
//! Dry runs resolve every input exactly as a merge would, without writing
//! anything, and report what each document contributes:
//! - Version and cross-reference layout
//! - Page count
//! - Objects in use versus objects reachable from the pages
//!
//! # Examples
//!
//! ```no_run
//! use pdfmerger::validation::Validator;
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let validator = Validator::new();
//! let summary = validator.validate_files(&[PathBuf::from("test.pdf")], 4).await?;
//! println!("{} pages", summary.total_pages);
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::warn;

use crate::config::{Config, EmptyInput, ErrorMode, MergeOptions, OverwriteMode};
use crate::document::{ResolvedDocument, Version, XrefKind};
use crate::error::{PdfMergeError, Result};
use crate::io::{LoadedPdf, PdfReader, PdfWriter};
use crate::merge::CancelToken;
use crate::merge::merger::format_file_size;

/// What one input document would contribute to a merge.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    /// Position in the input sequence.
    pub index: usize,

    /// Source file, when the input came from one.
    pub path: Option<PathBuf>,

    /// Effective PDF version.
    pub version: Version,

    /// Number of pages.
    pub page_count: usize,

    /// Objects in use according to the cross-reference data.
    pub object_count: usize,

    /// Objects reachable from the pages, i.e. what a merge copies.
    pub reachable_objects: usize,

    /// Size of the input in bytes.
    pub size: usize,

    /// Layout of the newest cross-reference section.
    pub xref_kind: XrefKind,
}

impl DocumentSummary {
    /// Summarise a resolved document.
    pub fn new(index: usize, path: Option<PathBuf>, document: &ResolvedDocument) -> Self {
        Self {
            index,
            path,
            version: document.version,
            page_count: document.page_count(),
            object_count: document.source_objects,
            reachable_objects: document.object_count(),
            size: document.size,
            xref_kind: document.xref_kind,
        }
    }

    fn from_loaded(index: usize, loaded: &LoadedPdf) -> Self {
        Self::new(index, Some(loaded.path.clone()), &loaded.document)
    }
}

/// An input that would be skipped by a lenient merge.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedDocument {
    /// Position in the input sequence.
    pub index: usize,

    /// Source file.
    pub path: PathBuf,

    /// Why the document was rejected.
    pub reason: String,
}

/// Summary of validation results for multiple files.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    /// Documents that would be merged, in input order.
    pub documents: Vec<DocumentSummary>,

    /// Documents that failed to parse.
    pub failed: Vec<FailedDocument>,

    /// Paths that do not name a regular file.
    pub missing: Vec<PathBuf>,

    /// Total number of pages across all documents.
    pub total_pages: usize,

    /// Total input size in bytes.
    pub total_size: u64,
}

impl ValidationSummary {
    /// Create a summary from document summaries.
    pub fn from_documents(documents: Vec<DocumentSummary>) -> Self {
        let total_pages = documents.iter().map(|d| d.page_count).sum();
        let total_size = documents.iter().map(|d| d.size as u64).sum();

        Self {
            documents,
            total_pages,
            total_size,
            ..Self::default()
        }
    }

    /// Number of documents that passed validation.
    pub fn documents_validated(&self) -> usize {
        self.documents.len()
    }

    /// Number of documents that failed validation.
    pub fn documents_failed(&self) -> usize {
        self.failed.len()
    }

    /// Format the total file size as a human-readable string.
    pub fn format_total_size(&self) -> String {
        format_file_size(self.total_size)
    }
}

/// Validator for input documents and the output path.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    error_mode: ErrorMode,
    empty_input: EmptyInput,
}

impl Validator {
    /// Create a lenient validator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a validator that fails on the first bad document.
    pub fn strict() -> Self {
        Self {
            error_mode: ErrorMode::Strict,
            ..Self::default()
        }
    }

    /// Apply the same policies a merge with `options` would.
    pub fn from_options(options: &MergeOptions) -> Self {
        Self {
            error_mode: options.error_mode,
            empty_input: options.empty_input,
        }
    }

    /// Validate a document held in memory.
    pub fn validate_bytes(&self, index: usize, data: &[u8]) -> Result<DocumentSummary> {
        ResolvedDocument::from_bytes(data, &CancelToken::new())
            .map(|document| DocumentSummary::new(index, None, &document))
            .map_err(|e| e.with_document(index))
    }

    /// Validate a single PDF file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The path is not a regular file
    /// - The file cannot be read
    /// - The document fails to parse
    pub async fn validate_file(&self, path: &Path) -> Result<DocumentSummary> {
        match PdfReader::new(1).load(path).await? {
            Some(loaded) => Ok(DocumentSummary::from_loaded(0, &loaded)),
            None => Err(PdfMergeError::io_at(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "not a regular file"),
            )),
        }
    }

    /// Validate multiple PDF files, `jobs` at a time.
    ///
    /// Parse failures are collected in lenient mode and returned as errors
    /// in strict mode. Read failures always abort.
    pub async fn validate_files(&self, paths: &[PathBuf], jobs: usize) -> Result<ValidationSummary> {
        let (results, _) = PdfReader::new(jobs).load_all(paths).await;

        let seen: HashSet<usize> = results.iter().map(|(index, _)| *index).collect();
        let mut documents = Vec::new();
        let mut failed = Vec::new();

        for (index, result) in results {
            match result {
                Ok(loaded) => documents.push(DocumentSummary::from_loaded(index, &loaded)),
                Err(e) => {
                    let e = e.with_document(index);
                    if self.error_mode == ErrorMode::Strict || !e.is_recoverable() {
                        return Err(e);
                    }
                    warn!(document = index, error = %e, "document would be skipped");
                    failed.push(FailedDocument {
                        index,
                        path: paths[index].clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if documents.is_empty() && self.empty_input == EmptyInput::Error {
            return Err(PdfMergeError::NoContent);
        }

        let mut summary = ValidationSummary::from_documents(documents);
        summary.failed = failed;
        summary.missing = paths
            .iter()
            .enumerate()
            .filter(|(index, _)| !seen.contains(index))
            .map(|(_, path)| path.clone())
            .collect();

        Ok(summary)
    }

    /// Validate the output path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Output file exists and no_clobber is set
    /// - Output directory doesn't exist
    /// - Output directory is not writable
    pub async fn validate_output(&self, config: &Config) -> Result<()> {
        let writer = PdfWriter::default();

        if config.overwrite_mode == OverwriteMode::NoClobber && writer.exists(&config.output).await {
            return Err(PdfMergeError::OutputExists {
                path: config.output.clone(),
            });
        }

        writer.can_write(&config.output).await
    }

    /// Validate all inputs and the output of a run.
    pub async fn validate_config(&self, config: &Config) -> Result<ValidationSummary> {
        let summary = self
            .validate_files(&config.inputs, config.effective_jobs())
            .await?;
        self.validate_output(config).await?;
        Ok(summary)
    }
}

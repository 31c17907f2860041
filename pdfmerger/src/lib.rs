//! pdfmerger - Merge PDF documents without a PDF library.
//!
//! This library reads PDF files from raw bytes, collects the objects each
//! document's pages actually use, renumbers them into one object space and
//! writes a new document with a single page tree. It supports:
//!
//! - Classic cross-reference tables, cross-reference streams, object streams
//!   and incremental updates
//! - Lenient (skip bad inputs) and strict (fail fast) error handling
//! - Parallel parsing and merge-wide cancellation
//! - Optional stream compression and document metadata
//!
//! # Examples
//!
//! ## In-memory merge
//!
//! ```no_run
//! use pdfmerger::{MergeOptions, PdfMerger};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let a = std::fs::read("a.pdf")?;
//! let b = std::fs::read("b.pdf")?;
//!
//! let merger = PdfMerger::new(MergeOptions::default());
//! let merged = merger.merge([&a, &b])?;
//! println!("Created {} page document", merged.statistics.total_pages);
//! std::fs::write("merged.pdf", &merged.bytes)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Files
//!
//! ```no_run
//! use pdfmerger::config::{ErrorMode, MergeOptions};
//! use pdfmerger::PdfMerger;
//! use std::path::{Path, PathBuf};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let merger = PdfMerger::new(MergeOptions::default().with_error_mode(ErrorMode::Strict));
//! let inputs = vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")];
//! let stats = merger.merge_files_async(&inputs, Path::new("merged.pdf")).await?;
//! println!("Wrote {}", stats.format_output_size());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod document;
pub mod error;
pub mod io;
pub mod merge;
pub mod object;
pub mod output;
pub mod parser;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::{CompressionLevel, Config, EmptyInput, ErrorMode, MergeOptions, Metadata};
pub use document::{ResolvedDocument, SourceDocument, Version};
pub use error::{PdfMergeError, Result};
pub use merge::{CancelToken, MergeStatistics, MergedPdf, PdfMerger, PdfSource};
pub use object::{Dictionary, Object, ObjectId, Stream};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

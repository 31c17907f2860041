//! Reading input files.
//!
//! This module supplies byte buffers to the merge engine:
//! - Async concurrent loading with [`PdfReader`], bounded by a job count
//! - Synchronous path wrappers around [`PdfMerger`]
//!
//! Paths that do not exist or are not regular files are skipped with a
//! warning. Any other read failure is an I/O error.
//!
//! # Examples
//!
//! ```no_run
//! use pdfmerger::io::reader::PdfReader;
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let reader = PdfReader::new(4);
//! let paths = vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")];
//! let (results, stats) = reader.load_all(&paths).await;
//! println!("Loaded {} of {} files", stats.loaded, paths.len());
//! # Ok(())
//! # }
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tokio::task;
use tracing::{debug, warn};

use crate::document::ResolvedDocument;
use crate::error::{PdfMergeError, Result};
use crate::io::writer::merge_to_path;
use crate::merge::merger::format_file_size;
use crate::merge::{CancelToken, MergeStatistics, PdfMerger};

/// A parsed input file.
#[derive(Debug)]
pub struct LoadedPdf {
    /// The resolved document.
    pub document: ResolvedDocument,

    /// Path to the source file.
    pub path: PathBuf,

    /// Time taken to read and resolve the file.
    pub load_time: Duration,

    /// File size in bytes.
    pub file_size: u64,
}

impl LoadedPdf {
    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.document.page_count()
    }
}

/// Result of loading one input, tagged with its position in the path list.
pub type LoadResult = (usize, Result<LoadedPdf>);

/// Statistics for a batch load operation.
#[derive(Debug, Clone, Default)]
pub struct LoadStatistics {
    /// Number of files read and parsed.
    pub loaded: usize,

    /// Number of files that failed to read or parse.
    pub failed: usize,

    /// Number of paths skipped because no regular file was there.
    pub missing: usize,

    /// Total time taken for all loads.
    pub total_time: Duration,

    /// Total size of successfully loaded files.
    pub total_size: u64,

    /// Total number of pages loaded.
    pub total_pages: usize,
}

impl LoadStatistics {
    fn from_results(results: &[LoadResult], missing: usize, total_time: Duration) -> Self {
        let mut stats = Self {
            missing,
            total_time,
            ..Self::default()
        };

        for (_, result) in results {
            match result {
                Ok(loaded) => {
                    stats.loaded += 1;
                    stats.total_size += loaded.file_size;
                    stats.total_pages += loaded.page_count();
                }
                Err(_) => stats.failed += 1,
            }
        }

        stats
    }

    /// Format total size as human-readable string.
    pub fn format_total_size(&self) -> String {
        format_file_size(self.total_size)
    }
}

/// Concurrent loader for input files.
#[derive(Debug, Clone)]
pub struct PdfReader {
    jobs: usize,
    cancel: CancelToken,
}

impl PdfReader {
    /// Create a reader running at most `jobs` loads at a time.
    pub fn new(jobs: usize) -> Self {
        Self {
            jobs: jobs.max(1),
            cancel: CancelToken::new(),
        }
    }

    /// Stop parsing once `cancel` fires.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Read a file, or `None` when the path is not a regular file or is
    /// empty. Empty files are skipped silently, like empty in-memory inputs.
    pub async fn read(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        match tokio::fs::metadata(path).await {
            Ok(metadata) if metadata.is_file() => {}
            _ => {
                warn!(path = %path.display(), "skipping input that is not a regular file");
                return Ok(None);
            }
        }

        let data = tokio::fs::read(path)
            .await
            .map_err(|e| PdfMergeError::io_at(path, e))?;
        if data.is_empty() {
            debug!(path = %path.display(), "skipping empty input");
            return Ok(None);
        }
        Ok(Some(data))
    }

    /// Read and resolve one file. Parsing runs on a blocking worker.
    pub async fn load(&self, path: &Path) -> Result<Option<LoadedPdf>> {
        let start = Instant::now();
        let Some(data) = self.read(path).await? else {
            return Ok(None);
        };
        let file_size = data.len() as u64;

        let cancel = self.cancel.clone();
        let document = task::spawn_blocking(move || ResolvedDocument::from_bytes(&data, &cancel))
            .await
            .map_err(|e| PdfMergeError::io_at(path, std::io::Error::other(e)))??;

        Ok(Some(LoadedPdf {
            document,
            path: path.to_path_buf(),
            load_time: start.elapsed(),
            file_size,
        }))
    }

    /// Load every path, at most `jobs` at a time.
    ///
    /// Results keep the order of `paths`; skipped paths are left out, so
    /// the attached index is the position in `paths`.
    pub async fn load_all(&self, paths: &[PathBuf]) -> (Vec<LoadResult>, LoadStatistics) {
        let start = Instant::now();

        let tasks = paths
            .iter()
            .enumerate()
            .map(|(index, path)| async move { (index, self.load(path).await) });

        let outcomes: Vec<(usize, Result<Option<LoadedPdf>>)> = stream::iter(tasks)
            .buffered(self.jobs)
            .collect()
            .await;

        let mut missing = 0;
        let mut results = Vec::with_capacity(outcomes.len());
        for (index, outcome) in outcomes {
            match outcome {
                Ok(Some(loaded)) => results.push((index, Ok(loaded))),
                Ok(None) => missing += 1,
                Err(e) => results.push((index, Err(e))),
            }
        }

        let stats = LoadStatistics::from_results(&results, missing, start.elapsed());
        (results, stats)
    }

    /// Like [`load_all`](Self::load_all), keeping only the documents.
    pub async fn resolve_all(
        &self,
        paths: &[PathBuf],
    ) -> (Vec<(usize, Result<ResolvedDocument>)>, LoadStatistics) {
        let (results, stats) = self.load_all(paths).await;
        let documents = results
            .into_iter()
            .map(|(index, result)| (index, result.map(|loaded| loaded.document)))
            .collect();
        (documents, stats)
    }
}

/// Read files on the current thread; `None` for paths that are skipped.
pub fn read_inputs<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Option<Vec<u8>>>> {
    paths
        .iter()
        .map(|path| {
            let path = path.as_ref();
            if !path.is_file() {
                warn!(path = %path.display(), "skipping input that is not a regular file");
                return Ok(None);
            }
            std::fs::read(path)
                .map(Some)
                .map_err(|e| PdfMergeError::io_at(path, e))
        })
        .collect()
}

/// Merge files and write the result to `sink`.
pub fn merge_files_to_writer<P, W>(merger: &PdfMerger, paths: &[P], sink: &mut W) -> Result<MergeStatistics>
where
    P: AsRef<Path>,
    W: Write + ?Sized,
{
    let inputs = read_inputs(paths)?;
    merger.merge_to_writer(&inputs, sink)
}

/// Merge files and save the result atomically at `dest`.
pub fn merge_files_to_path<P: AsRef<Path>>(merger: &PdfMerger, paths: &[P], dest: &Path) -> Result<MergeStatistics> {
    let inputs = read_inputs(paths)?;
    merge_to_path(merger, &inputs, dest)
}

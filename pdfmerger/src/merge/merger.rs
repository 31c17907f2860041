//! Core PDF merging implementation.
//!
//! Documents are parsed independently (in parallel when allowed), then
//! renumbered into one object space and assembled under a new catalog and
//! page tree on a single thread. Nothing is written until the whole output
//! exists in memory.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Serialize, Serializer};
use tracing::{debug, info, warn};

use crate::config::{EmptyInput, ErrorMode, MergeOptions};
use crate::document::{ResolvedDocument, Version};
use crate::error::{PdfMergeError, Result};
use crate::io::{PdfReader, PdfWriter};
use crate::merge::cancel::CancelToken;
use crate::merge::metadata::MetadataManager;
use crate::merge::source::{PdfSource, usable_inputs};
use crate::merge::space::GlobalObjectSpace;
use crate::object::{Dictionary, Object, ObjectId};

/// A document that was left out of the merge in lenient mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDocument {
    /// Position of the document in the input sequence.
    pub index: usize,
    /// Why it was skipped.
    pub reason: String,
}

/// Statistics about a merge operation.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeStatistics {
    /// Number of documents whose pages made it into the output.
    pub documents_merged: usize,

    /// Number of documents skipped because they could not be parsed.
    pub documents_skipped: usize,

    /// The skipped documents.
    pub skipped: Vec<SkippedDocument>,

    /// Total number of pages in the merged document.
    pub total_pages: usize,

    /// Number of indirect objects written.
    pub object_count: usize,

    /// Size of the serialized output in bytes.
    pub output_size: u64,

    /// Total time taken for merge.
    #[serde(rename = "mergeTimeMs", serialize_with = "as_millis")]
    pub merge_time: Duration,
}

impl MergeStatistics {
    /// Format output size as human-readable string.
    pub fn format_output_size(&self) -> String {
        format_file_size(self.output_size)
    }
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u128(duration.as_millis())
}

/// The renumbered object graph, ready for serialization.
#[derive(Debug, Clone)]
pub struct MergedDocument {
    /// Highest version among the merged inputs, at least 1.4.
    pub version: Version,
    /// Objects by ascending output number. All have generation 0.
    pub objects: Vec<(u32, Object)>,
    /// Number of the new catalog.
    pub root: u32,
    /// Number of the Info dictionary, if one was written.
    pub info: Option<u32>,
}

impl MergedDocument {
    /// Number of indirect objects.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Largest object number in use.
    pub fn max_object_number(&self) -> u32 {
        self.objects.iter().map(|(num, _)| *num).max().unwrap_or(0)
    }
}

/// Result of an in-memory merge.
#[derive(Debug, Clone)]
pub struct MergedPdf {
    /// The serialized output document.
    pub bytes: Vec<u8>,

    /// Statistics about the merge.
    pub statistics: MergeStatistics,
}

/// PDF merger that combines multiple documents.
#[derive(Debug, Clone, Default)]
pub struct PdfMerger {
    options: MergeOptions,
    cancel: CancelToken,
}

impl PdfMerger {
    /// Create a merger with the given options.
    pub fn new(options: MergeOptions) -> Self {
        Self {
            options,
            cancel: CancelToken::new(),
        }
    }

    /// Share a cancellation token with the caller.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Options this merger runs with.
    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    /// Token that cancels merges run by this merger.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Merge documents held in memory.
    ///
    /// `None` and empty inputs are skipped silently. Document indices in
    /// errors and statistics refer to positions in `inputs`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A document fails to parse in strict mode
    /// - No usable document is left and empty output is not allowed
    /// - The merge is cancelled
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use pdfmerger::{MergeOptions, PdfMerger};
    /// # fn example(a: Vec<u8>, b: Vec<u8>) -> pdfmerger::Result<()> {
    /// let merger = PdfMerger::new(MergeOptions::default());
    /// let merged = merger.merge([a, b])?;
    /// println!("Merged {} pages", merged.statistics.total_pages);
    /// # Ok(())
    /// # }
    /// ```
    pub fn merge<I, S>(&self, inputs: I) -> Result<MergedPdf>
    where
        I: IntoIterator<Item = S>,
        S: PdfSource,
    {
        let started = Instant::now();
        self.options.validate()?;

        let items: Vec<S> = inputs.into_iter().collect();
        let usable = usable_inputs(&items);
        debug!(inputs = items.len(), usable = usable.len(), "starting merge");

        let results = self.resolve_all(&usable);
        self.finish(results, started)
    }

    /// Merge documents held in memory and write the result to `sink`.
    pub fn merge_to_writer<I, S, W>(&self, inputs: I, sink: &mut W) -> Result<MergeStatistics>
    where
        I: IntoIterator<Item = S>,
        S: PdfSource,
        W: Write + ?Sized,
    {
        let merged = self.merge(inputs)?;
        sink.write_all(&merged.bytes)?;
        sink.flush()?;
        Ok(merged.statistics)
    }

    /// Assemble documents that were already resolved, e.g. by
    /// [`PdfReader`]. Each entry carries its input position.
    pub fn merge_resolved(
        &self,
        results: Vec<(usize, Result<ResolvedDocument>)>,
    ) -> Result<MergedPdf> {
        self.options.validate()?;
        self.finish(results, Instant::now())
    }

    /// Read, merge and atomically write files using the async reader.
    ///
    /// Paths that do not name a regular file are skipped with a warning.
    pub async fn merge_files_async(&self, paths: &[PathBuf], dest: &Path) -> Result<MergeStatistics> {
        let started = Instant::now();
        self.options.validate()?;

        let reader = PdfReader::new(self.options.effective_jobs())
            .with_cancel_token(self.cancel.clone());
        let (results, load_stats) = reader.resolve_all(paths).await;
        debug!(
            loaded = load_stats.loaded,
            missing = load_stats.missing,
            bytes = load_stats.total_size,
            "inputs loaded"
        );

        let merged = self.finish(results, started)?;
        PdfWriter::new(self.options.compression)
            .save(merged.bytes, dest)
            .await?;
        Ok(merged.statistics)
    }

    /// Parse every usable input, on a rayon pool when more than one job is
    /// allowed. Results keep input order.
    fn resolve_all(&self, usable: &[(usize, &[u8])]) -> Vec<(usize, Result<ResolvedDocument>)> {
        let jobs = self.options.effective_jobs().min(usable.len());

        if jobs > 1 {
            match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
                Ok(pool) => {
                    return pool.install(|| {
                        usable
                            .par_iter()
                            .map(|&(index, data)| (index, self.resolve_one(data)))
                            .collect()
                    });
                }
                Err(e) => warn!(error = %e, "could not start parse workers, parsing sequentially"),
            }
        }

        usable
            .iter()
            .map(|&(index, data)| (index, self.resolve_one(data)))
            .collect()
    }

    fn resolve_one(&self, data: &[u8]) -> Result<ResolvedDocument> {
        self.cancel.check()?;
        ResolvedDocument::from_bytes(data, &self.cancel)
    }

    fn finish(
        &self,
        results: Vec<(usize, Result<ResolvedDocument>)>,
        started: Instant,
    ) -> Result<MergedPdf> {
        let (document, mut statistics) = self.assemble(results)?;
        let bytes = PdfWriter::new(self.options.compression).serialize(&document)?;
        self.cancel.check()?;

        statistics.output_size = bytes.len() as u64;
        statistics.merge_time = started.elapsed();

        info!(
            documents = statistics.documents_merged,
            skipped = statistics.documents_skipped,
            pages = statistics.total_pages,
            objects = statistics.object_count,
            bytes = statistics.output_size,
            "merge complete"
        );

        Ok(MergedPdf { bytes, statistics })
    }

    /// Apply the error policy, renumber every document into one object
    /// space and build the new catalog and page tree.
    pub fn assemble(
        &self,
        results: Vec<(usize, Result<ResolvedDocument>)>,
    ) -> Result<(MergedDocument, MergeStatistics)> {
        let mut documents = Vec::with_capacity(results.len());
        let mut skipped = Vec::new();

        for (index, result) in results {
            match result {
                Ok(document) => documents.push((index, document)),
                Err(PdfMergeError::Cancelled) => return Err(PdfMergeError::Cancelled),
                Err(e) => {
                    let e = e.with_document(index);
                    if self.options.error_mode == ErrorMode::Strict || !e.is_recoverable() {
                        return Err(e);
                    }
                    warn!(document = index, error = %e, "skipping unreadable document");
                    skipped.push(SkippedDocument {
                        index,
                        reason: e.to_string(),
                    });
                }
            }
        }
        self.cancel.check()?;

        if documents.is_empty() && self.options.empty_input == EmptyInput::Error {
            return Err(PdfMergeError::NoContent);
        }

        // Numbers for every source object first, so references can be
        // rewritten in one pass regardless of discovery order.
        let mut space = GlobalObjectSpace::new();
        for (index, document) in &documents {
            for id in document.objects.keys() {
                space.assign(*index, *id);
            }
        }
        let pages_root = space.allocate();
        let root = space.allocate();
        let info_dict = MetadataManager::new().info_dictionary(&self.options.metadata);
        let info = info_dict.as_ref().map(|_| space.allocate());

        let mut version = Version::V1_4;
        let mut objects = Vec::with_capacity(space.len());
        let mut kids = Vec::new();
        let documents_merged = documents.len();

        for (index, document) in documents {
            version = version.max(document.version);
            let pages: HashSet<ObjectId> = document.pages.iter().copied().collect();

            for (id, mut object) in document.objects {
                object.map_references(&mut |target| space.translate(index, target));
                if pages.contains(&id)
                    && let Some(page) = object.as_dict_mut()
                {
                    page.set("Parent", Object::Reference((pages_root, 0)));
                }
                objects.push((space.translate(index, id).0, object));
            }

            kids.extend(
                document
                    .pages
                    .iter()
                    .map(|id| Object::Reference(space.translate(index, *id))),
            );
        }

        let total_pages = kids.len();
        let mut page_tree = Dictionary::new();
        page_tree.set("Type", Object::name("Pages"));
        page_tree.set("Kids", kids);
        page_tree.set("Count", total_pages as i64);
        objects.push((pages_root, Object::Dictionary(page_tree)));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::name("Catalog"));
        catalog.set("Pages", Object::Reference((pages_root, 0)));
        objects.push((root, Object::Dictionary(catalog)));

        if let (Some(number), Some(dict)) = (info, info_dict) {
            objects.push((number, Object::Dictionary(dict)));
        }

        let statistics = MergeStatistics {
            documents_merged,
            documents_skipped: skipped.len(),
            skipped,
            total_pages,
            object_count: objects.len(),
            ..MergeStatistics::default()
        };

        Ok((
            MergedDocument {
                version,
                objects,
                root,
                info,
            },
            statistics,
        ))
    }
}

/// Format file size as human-readable string.
pub fn format_file_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}

//! The merge engine.
//!
//! [`PdfMerger`] takes documents as byte buffers, renumbers the objects
//! reachable from their pages into one [`GlobalObjectSpace`] and hands the
//! result to the serializer.

pub mod cancel;
pub mod merger;
pub mod metadata;
pub mod source;
pub mod space;

pub use cancel::CancelToken;
pub use merger::{MergeStatistics, MergedDocument, MergedPdf, PdfMerger, SkippedDocument};
pub use metadata::MetadataManager;
pub use source::PdfSource;
pub use space::GlobalObjectSpace;

//! File input and output around the merge engine.

pub mod reader;
pub mod writer;

pub use reader::{
    LoadStatistics, LoadedPdf, PdfReader, merge_files_to_path, merge_files_to_writer, read_inputs,
};
pub use writer::{PdfWriter, WriteOptions, WriteStatistics, merge_to_path};

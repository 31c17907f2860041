//! Error types for pdfmerger.
//!
//! Every failure the merge engine can report is a [`PdfMergeError`].
//! Errors raised while reading one input document carry that document's
//! position in the input sequence once they leave the per-document phase,
//! so callers can tell exactly which input was rejected.
//!
//! # Error Categories
//!
//! - **Syntax errors**: bad tokens, bad objects, broken cross-reference data
//! - **Structure errors**: missing catalog or page tree, cyclic page trees
//! - **Merge errors**: nothing left to merge, cancellation
//! - **I/O errors**: reading inputs or writing the output sink

use std::io;
use std::path::PathBuf;

use crate::object::ObjectId;

/// Result type alias for pdfmerger operations.
pub type Result<T> = std::result::Result<T, PdfMergeError>;

/// Main error type for pdfmerger operations.
#[derive(Debug, thiserror::Error)]
pub enum PdfMergeError {
    /// The lexer hit an unterminated string or stream, or an illegal byte
    /// at a syntax boundary.
    #[error("malformed token{} at byte {offset}: {reason}", in_document(.document))]
    MalformedToken {
        /// Index of the source document, when known.
        document: Option<usize>,
        /// Byte offset of the offending token.
        offset: usize,
        /// What was wrong.
        reason: String,
    },

    /// A declared offset did not lead to a valid object, or an object's
    /// content violates the format.
    #[error("malformed object{}{}: {reason}", in_document(.document), for_object(.object))]
    MalformedObject {
        /// Index of the source document, when known.
        document: Option<usize>,
        /// Object being parsed, when known.
        object: Option<ObjectId>,
        /// What was wrong.
        reason: String,
    },

    /// The catalog or the page tree root could not be located.
    #[error("missing document root{}: {reason}", in_document(.document))]
    MissingRoot {
        /// Index of the source document, when known.
        document: Option<usize>,
        /// What could not be found.
        reason: String,
    },

    /// The page tree revisits a node already on the current path.
    #[error("circular page tree{}: object {} {} revisited", in_document(.document), .object.0, .object.1)]
    CircularReference {
        /// Index of the source document, when known.
        document: Option<usize>,
        /// The node that closed the cycle.
        object: ObjectId,
    },

    /// The document is encrypted, which the merge engine does not handle.
    #[error("encrypted document{} cannot be merged\n  Hint: decrypt it first with 'qpdf --decrypt' or similar tools", in_document(.document))]
    EncryptedDocument {
        /// Index of the source document, when known.
        document: Option<usize>,
    },

    /// No usable document remained after filtering.
    #[error("no PDF content to merge")]
    NoContent,

    /// An underlying read or write failed.
    #[error("I/O error{}: {source}", on_path(.path))]
    Io {
        /// File involved, when the failure is tied to one.
        path: Option<PathBuf>,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Output file already exists and overwrite is not allowed.
    #[error("output file already exists: {}\n  Use --force to overwrite or choose a different output path", .path.display())]
    OutputExists {
        /// Path to the existing output file.
        path: PathBuf,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of what's wrong with the configuration.
        message: String,
    },

    /// The merge was cancelled before the output was produced.
    #[error("merge cancelled")]
    Cancelled,
}

fn in_document(document: &Option<usize>) -> String {
    document
        .map(|index| format!(" in document #{index}"))
        .unwrap_or_default()
}

fn for_object(object: &Option<ObjectId>) -> String {
    object
        .map(|(num, generation)| format!(" (object {num} {generation})"))
        .unwrap_or_default()
}

fn on_path(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" on {}", p.display()))
        .unwrap_or_default()
}

impl From<io::Error> for PdfMergeError {
    fn from(err: io::Error) -> Self {
        Self::Io {
            path: None,
            source: err,
        }
    }
}

impl PdfMergeError {
    /// Create a MalformedToken error.
    pub fn malformed_token(offset: usize, reason: impl Into<String>) -> Self {
        Self::MalformedToken {
            document: None,
            offset,
            reason: reason.into(),
        }
    }

    /// Create a MalformedObject error.
    pub fn malformed_object(reason: impl Into<String>) -> Self {
        Self::MalformedObject {
            document: None,
            object: None,
            reason: reason.into(),
        }
    }

    /// Create a MalformedObject error about a specific object.
    pub fn malformed_object_at(object: ObjectId, reason: impl Into<String>) -> Self {
        Self::MalformedObject {
            document: None,
            object: Some(object),
            reason: reason.into(),
        }
    }

    /// Create a MissingRoot error.
    pub fn missing_root(reason: impl Into<String>) -> Self {
        Self::MissingRoot {
            document: None,
            reason: reason.into(),
        }
    }

    /// Create an Io error tied to a path.
    pub fn io_at(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: Some(path.into()),
            source,
        }
    }

    /// Create an InvalidConfig error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Stamp the index of the source document onto a document-scoped error.
    ///
    /// Errors that are not tied to a document are returned unchanged, and an
    /// index that is already set is kept.
    pub fn with_document(mut self, index: usize) -> Self {
        match &mut self {
            Self::MalformedToken { document, .. }
            | Self::MalformedObject { document, .. }
            | Self::MissingRoot { document, .. }
            | Self::CircularReference { document, .. }
            | Self::EncryptedDocument { document } => {
                document.get_or_insert(index);
            }
            _ => {}
        }
        self
    }

    /// Index of the source document this error belongs to, if any.
    pub fn document_index(&self) -> Option<usize> {
        match self {
            Self::MalformedToken { document, .. }
            | Self::MalformedObject { document, .. }
            | Self::MissingRoot { document, .. }
            | Self::CircularReference { document, .. }
            | Self::EncryptedDocument { document } => *document,
            _ => None,
        }
    }

    /// Check if this error is recoverable (operation can continue).
    ///
    /// Per-document parse failures are recoverable in lenient mode; the
    /// offending document is skipped and the merge goes on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MalformedToken { .. }
                | Self::MalformedObject { .. }
                | Self::MissingRoot { .. }
                | Self::CircularReference { .. }
                | Self::EncryptedDocument { .. }
        )
    }

    /// Get the process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MalformedToken { .. } => 3,
            Self::MalformedObject { .. } => 3,
            Self::MissingRoot { .. } => 3,
            Self::CircularReference { .. } => 3,
            Self::EncryptedDocument { .. } => 3,
            Self::NoContent => 1,
            Self::OutputExists { .. } => 4,
            Self::Io { .. } => 5,
            Self::InvalidConfig { .. } => 1,
            Self::Cancelled => 130, // Standard exit code for SIGINT
        }
    }
}

//! Custom error types for the esm4-store crate.

use thiserror::Error;

use super::formid::FormId;

/// The primary error type for all operations in this crate.
///
/// Every variant is fatal for the load that produced it. Recoverable
/// conditions are reported through [`Diagnostic`](super::diagnostics::Diagnostic)
/// instead and never surface here.
#[derive(Debug, Error)]
pub enum Esm4Error {
    /// An error originating from I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is structurally invalid.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// A record type or group label is not a printable four-character code.
    #[error("Invalid type tag: {0:02x?}")]
    InvalidTag([u8; 4]),

    /// A group header carried a category outside the known hierarchy.
    #[error("Unexpected group type {group_type} at offset {offset:#x}")]
    UnexpectedGroup { group_type: i32, offset: u64 },

    /// The header version is newer than anything this crate understands.
    #[error("Unsupported format version: {0}")]
    UnsupportedVersion(f32),

    /// A plugin names a master that has not been loaded before it.
    #[error("'{file}' requires master '{master}', which is not loaded")]
    MissingMaster { file: String, master: String },

    /// The load order is limited by the one-byte file index of a FormId.
    #[error("Too many content files: the load order holds at most {max} files")]
    TooManyFiles { max: usize },

    /// A compressed record could not be inflated.
    #[error("Decompression failed: {0}")]
    Decompression(String),

    /// A buffer has an unexpected size after an operation.
    #[error("Size mismatch for {context}: expected {expected} bytes, but found {found} bytes")]
    SizeMismatch {
        context: &'static str,
        expected: u64,
        found: u64,
    },

    /// No live record carries the identifier.
    #[error("Record {0} not found")]
    RecordNotFound(FormId),

    /// No cell carries the identifier.
    #[error("Cell {0} not found")]
    CellNotFound(FormId),

    /// An update-in-place call tried to change the record's key.
    #[error("Record identifier changed during update: expected {expected}, found {found}")]
    FormIdMutation { expected: FormId, found: FormId },

    /// A snapshot names a file index that is no longer registered.
    #[error("No content file registered at index {0}")]
    SourceUnavailable(usize),

    /// Wraps a fatal error with the name of the file being read.
    #[error("{file}: {source}")]
    InFile {
        file: String,
        #[source]
        source: Box<Esm4Error>,
    },
}

impl Esm4Error {
    /// Attaches the offending file name, unless one is already attached.
    pub fn in_file(self, file: &str) -> Self {
        match self {
            Esm4Error::InFile { .. } => self,
            other => Esm4Error::InFile {
                file: file.to_string(),
                source: Box::new(other),
            },
        }
    }
}

/// A convenience `Result` type alias using the crate's `Esm4Error` type.
pub type Result<T> = std::result::Result<T, Esm4Error>;

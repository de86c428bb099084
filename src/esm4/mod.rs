//! Core ingestion and indexing module

pub mod cells;
pub mod codec;
pub mod content;
pub mod format;
mod groups;
pub mod loader;
pub mod reader;
pub mod records;
pub mod resolver;
pub mod store;
pub mod types;

pub use cells::{CellContents, CellPhase, CellRegistry};
pub use content::{ContentStore, RecordRef};
pub use loader::{ContentLoader, LoadOutcome, LoaderOptions, ProgressCallback, SourceFile};
pub use reader::{Esm4Reader, ReadContext};
pub use store::{Insertion, RecordStore};
pub use types::diagnostics::{Diagnostic, DiagnosticKind};
pub use types::error::{Esm4Error, Result};
pub use types::formid::{FormId, FormIdMap};

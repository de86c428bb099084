//! # esm4-store
//!
//! Loads ESM4-family master and plugin files (`.esm`, `.esp`) in load order
//! and exposes their records as an override-aware database keyed by
//! [`FormId`]. A later file's version of a record wins; cells are loaded
//! shallowly and their placed references are read on demand.
//!
//! ```no_run
//! use esm4_store::{ContentLoader, LoaderOptions};
//!
//! # fn main() -> esm4_store::Result<()> {
//! let mut loader = ContentLoader::new(LoaderOptions::default());
//! loader.load_files(["Base.esm", "Patch.esp"])?;
//! if let Some(town) = loader.store().lookup_alias("Town") {
//!     loader.materialize(town)?;
//! }
//! # Ok(())
//! # }
//! ```
pub mod esm4;

// Re-export the main types for convenience
pub use esm4::{
    ContentLoader,
    ContentStore,
    Diagnostic,
    DiagnosticKind,
    Esm4Error,
    FormId,
    LoadOutcome,
    LoaderOptions,
    Result,
    records::{AnyRecord, BaseObject, Cell, Reference, World},
    types::models::{Grid, RecordType},
};

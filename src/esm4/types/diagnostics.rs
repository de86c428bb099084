//! Recoverable conditions collected while loading.

use std::fmt;

use super::formid::FormId;
use super::models::{Grid, RecordType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A record of a kind this crate does not model was skipped.
    UnknownRecordType(RecordType),
    /// A deleted record arrived for an identifier that was never live.
    DeletedUnknownRecord(FormId),
    /// Two cells claimed the same world grid slot; the first one stays.
    GridCollision {
        world: FormId,
        grid: Grid,
        kept: FormId,
        rejected: FormId,
    },
    /// The enclosing group and the DATA sub-record disagree about interior status.
    CellLocationMismatch { cell: FormId, group_says_exterior: bool },
    /// The sub-block label does not contain the cell's own grid coordinate.
    GridLabelMismatch {
        cell: FormId,
        label: Grid,
        record: Grid,
    },
    /// A reference was found outside any cell children group.
    OrphanReference(FormId),
}

/// A recoverable condition, tagged with the file it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub file: String,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn new(file: &str, kind: DiagnosticKind) -> Self {
        Self {
            file: file.to_string(),
            kind,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.file)?;
        match &self.kind {
            DiagnosticKind::UnknownRecordType(t) => write!(f, "skipped record of unknown type {}", t),
            DiagnosticKind::DeletedUnknownRecord(id) => {
                write!(f, "deletion of record {} that was never loaded", id)
            }
            DiagnosticKind::GridCollision {
                world,
                grid,
                kept,
                rejected,
            } => write!(
                f,
                "grid {} of world {} claimed by {} and {}; keeping {}",
                grid, world, kept, rejected, kept
            ),
            DiagnosticKind::CellLocationMismatch {
                cell,
                group_says_exterior,
            } => write!(
                f,
                "cell {} is filed as {} but its DATA flags say otherwise",
                cell,
                if *group_says_exterior { "exterior" } else { "interior" }
            ),
            DiagnosticKind::GridLabelMismatch { cell, label, record } => write!(
                f,
                "cell {} at grid {} is filed under sub-block {}",
                cell, record, label
            ),
            DiagnosticKind::OrphanReference(id) => {
                write!(f, "reference {} is not inside any cell", id)
            }
        }
    }
}

//! The group state machine.
//!
//! Walks a file's nested groups in physical order and decides, per group
//! category, whether to recurse, skip, defer or read it. Records reached
//! along the way are decoded and merged into the [`ContentStore`].
//!
//! ```text
//! GRUP Top "WRLD"
//!  ├ WRLD
//!  └ GRUP WorldChildren ──▶ CELL (persistent placeholder)
//!     └ GRUP ExteriorCellBlock
//!        └ GRUP ExteriorCellSubBlock
//!           ├ CELL
//!           └ GRUP CellChildren
//!              ├ GRUP CellPersistentChildren     read now
//!              ├ GRUP CellTemporaryChildren      snapshot + skip
//!              └ GRUP CellVisibleDistantChildren snapshot + skip
//! ```

use std::io::{Read, Seek};

use log::{debug, trace, warn};

use super::cells::ShallowOutcome;
use super::content::ContentStore;
use super::format::record;
use super::loader::{LoaderOptions, ProgressCallback};
use super::reader::{Esm4Reader, GROUP_TAG};
use super::records::{AnyRecord, Cell, DecodeContext};
use super::store::Insertion;
use super::types::diagnostics::{Diagnostic, DiagnosticKind};
use super::types::error::{Esm4Error, Result};
use super::types::formid::FormId;
use super::types::models::{GroupFrame, GroupType, RecordHeader, RecordType};

/// What the walker does with one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupAction {
    /// Descend and dispatch every child.
    Recurse,
    /// Seek past the group.
    Skip,
    /// Leave a snapshot with the owning cell, then seek past the group.
    Defer,
    /// Read the contained references into the owning cell immediately.
    ReadNow,
}

/// Records read from one cell children group, not yet applied.
#[derive(Debug, Default)]
pub(crate) struct ChildRecords {
    pub records: Vec<AnyRecord>,
    /// Kinds skipped because this crate does not model them.
    pub skipped: Vec<RecordType>,
}

/// Reads the records of the group the reader has just entered.
///
/// Shared by inline reads and snapshot replay, so both see the same bytes
/// decoded the same way.
pub(crate) fn read_child_records<R: Read + Seek>(
    reader: &mut Esm4Reader<R>,
    cell: FormId,
    localized: bool,
) -> Result<ChildRecords> {
    let mut children = ChildRecords::default();

    while reader.has_more()? {
        if reader.peek_tag()? == Some(GROUP_TAG) {
            let frame = reader.read_group_header()?;
            warn!(
                "Unexpected {:?} group inside children of cell {}; skipped",
                frame.header.group_type, cell
            );
            reader.skip_to(frame.end)?;
            continue;
        }

        let header = reader.read_record_header()?;
        match header.record_type {
            RecordType::Unknown(_) => {
                reader.skip_record_data(&header)?;
                children.skipped.push(header.record_type);
                continue;
            }
            RecordType::Tes4 | RecordType::Cell | RecordType::Wrld => {
                return Err(Esm4Error::InvalidFormat(format!(
                    "{} record {} inside children of cell {}",
                    header.record_type, header.form_id, cell
                )));
            }
            _ => {}
        }

        let record = decode_record(reader, &header, localized, Some(cell))?;
        children.records.push(record);
    }

    Ok(children)
}

/// Merges records that file `file_index` holds in a children group of `cell`.
///
/// Recoverable conditions are pushed to `diagnostics`.
pub(crate) fn apply_child_records(
    store: &mut ContentStore,
    cell: FormId,
    group_type: GroupType,
    children: ChildRecords,
    file_index: usize,
    file_name: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for kind in children.skipped {
        warn!("{}: skipped record of unknown type {} in cell {}", file_name, kind, cell);
        diagnostics.push(Diagnostic::new(file_name, DiagnosticKind::UnknownRecordType(kind)));
    }

    let known_cell = store.cell(cell).is_some();
    for record in children.records {
        let id = record.form_id();
        if !known_cell && matches!(record, AnyRecord::Reference(_)) {
            warn!("{}: reference {} belongs to unknown cell {}", file_name, id, cell);
            diagnostics.push(Diagnostic::new(file_name, DiagnosticKind::OrphanReference(id)));
        }
        if store.apply_child(cell, group_type, record, file_index) == Insertion::IgnoredDeletion {
            report_ignored_deletion(file_name, id, diagnostics);
        }
    }
}

fn report_ignored_deletion(file_name: &str, id: FormId, diagnostics: &mut Vec<Diagnostic>) {
    warn!("{}: deletion of record {} that was never loaded", file_name, id);
    diagnostics.push(Diagnostic::new(file_name, DiagnosticKind::DeletedUnknownRecord(id)));
}

fn decode_record<R: Read + Seek>(
    reader: &mut Esm4Reader<R>,
    header: &RecordHeader,
    localized: bool,
    cell: Option<FormId>,
) -> Result<AnyRecord> {
    let data = reader.read_record_data(header)?;
    let sub_records = record::parse_sub_records(&data)?;
    let ctx = DecodeContext {
        form_ids: reader.form_ids(),
        localized,
        cell,
    };
    AnyRecord::decode(header, &sub_records, &ctx)
}

/// Walks one file, merging what it reads into a store.
pub(crate) struct GroupWalker<'a, R: Read + Seek> {
    reader: &'a mut Esm4Reader<R>,
    store: &'a mut ContentStore,
    options: &'a LoaderOptions,
    diagnostics: &'a mut Vec<Diagnostic>,
    progress: Option<&'a mut ProgressCallback>,
    file_name: &'a str,
    localized: bool,
    last_progress: Option<u32>,
}

impl<'a, R: Read + Seek> GroupWalker<'a, R> {
    pub(crate) fn new(
        reader: &'a mut Esm4Reader<R>,
        store: &'a mut ContentStore,
        options: &'a LoaderOptions,
        diagnostics: &'a mut Vec<Diagnostic>,
        file_name: &'a str,
        localized: bool,
    ) -> Self {
        Self {
            reader,
            store,
            options,
            diagnostics,
            progress: None,
            file_name,
            localized,
            last_progress: None,
        }
    }

    pub(crate) fn with_progress(mut self, progress: Option<&'a mut ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Dispatches every top-level group following the file header.
    pub(crate) fn walk_file(&mut self) -> Result<()> {
        while self.reader.has_more()? {
            self.dispatch_next()?;
            self.report_progress()?;
        }
        self.finish_progress();
        Ok(())
    }

    fn dispatch_next(&mut self) -> Result<()> {
        match self.reader.peek_tag()? {
            Some(GROUP_TAG) => {
                let frame = self.reader.read_group_header()?;
                self.walk_group(frame)
            }
            Some(_) => self.read_record(),
            None => {
                let pos = self.reader.position()?;
                Err(Esm4Error::InvalidFormat(format!(
                    "Truncated data at offset {:#x} (file length {})",
                    pos,
                    self.reader.len()
                )))
            }
        }
    }

    fn classify(&self, frame: &GroupFrame) -> GroupAction {
        let header = &frame.header;
        match header.group_type {
            GroupType::Top => {
                if self.options.is_eager(header.label.as_record_type()) {
                    GroupAction::Recurse
                } else {
                    GroupAction::Skip
                }
            }
            GroupType::WorldChildren
            | GroupType::InteriorCellBlock
            | GroupType::InteriorCellSubBlock
            | GroupType::ExteriorCellBlock
            | GroupType::ExteriorCellSubBlock
            | GroupType::CellChildren => GroupAction::Recurse,
            GroupType::TopicChildren => GroupAction::Skip,
            GroupType::CellPersistentChildren => GroupAction::ReadNow,
            GroupType::CellTemporaryChildren | GroupType::CellVisibleDistantChildren => {
                if self.options.defer_cell_children {
                    GroupAction::Defer
                } else {
                    GroupAction::ReadNow
                }
            }
        }
    }

    fn walk_group(&mut self, frame: GroupFrame) -> Result<()> {
        let action = self.classify(&frame);
        debug!(
            "{:?} group at {:#x} ({} bytes): {:?}",
            frame.header.group_type, frame.start, frame.header.group_size, action
        );

        match action {
            GroupAction::Skip => self.reader.skip_to(frame.end),
            GroupAction::Recurse => {
                self.reader.enter_group(frame);
                while self.reader.has_more()? {
                    self.dispatch_next()?;
                }
                self.reader.leave_group();
                self.reader.skip_to(frame.end)
            }
            GroupAction::Defer => {
                let cell = self.reader.adjust(frame.header.label.as_raw_form_id());
                let is_empty = frame.end - frame.start <= self.reader.header_width().header_size();
                if !is_empty {
                    let snapshot = self.reader.snapshot(frame.start);
                    if !self.store.cells_mut().push_snapshot(cell, snapshot) {
                        warn!(
                            "{}: children group at {:#x} names unknown cell {}; skipped",
                            self.file_name, frame.start, cell
                        );
                    }
                }
                self.reader.skip_to(frame.end)
            }
            GroupAction::ReadNow => {
                let cell = self.reader.adjust(frame.header.label.as_raw_form_id());
                self.reader.enter_group(frame);
                let children = read_child_records(self.reader, cell, self.localized)?;
                self.reader.leave_group();
                self.reader.skip_to(frame.end)?;
                apply_child_records(
                    self.store,
                    cell,
                    frame.header.group_type,
                    children,
                    self.reader.file_index(),
                    self.file_name,
                    self.diagnostics,
                );
                Ok(())
            }
        }
    }

    fn read_record(&mut self) -> Result<()> {
        let header = self.reader.read_record_header()?;
        match header.record_type {
            RecordType::Unknown(_) => {
                warn!(
                    "{}: skipped record {} of unknown type {}",
                    self.file_name, header.form_id, header.record_type
                );
                self.reader.skip_record_data(&header)?;
                self.diagnostics.push(Diagnostic::new(
                    self.file_name,
                    DiagnosticKind::UnknownRecordType(header.record_type),
                ));
                return Ok(());
            }
            RecordType::Tes4 => {
                return Err(Esm4Error::InvalidFormat(
                    "Second file header record inside the file".to_string(),
                ));
            }
            _ => {}
        }

        let record = decode_record(self.reader, &header, self.localized, None)?;
        trace!("Record {} {} '{}'", header.record_type, record.form_id(), record.editor_id());

        let insertion = match record {
            AnyRecord::Cell(cell) => return self.on_cell(cell),
            AnyRecord::World(world) => self.store.apply_world(world),
            AnyRecord::Object(object) => self.store.apply_object(object, self.reader.file_index()),
            AnyRecord::Reference(reference) => {
                warn!(
                    "{}: reference {} outside any cell children group; skipped",
                    self.file_name, reference.form_id
                );
                self.diagnostics.push(Diagnostic::new(
                    self.file_name,
                    DiagnosticKind::OrphanReference(reference.form_id),
                ));
                return Ok(());
            }
        };
        if insertion == Insertion::IgnoredDeletion {
            report_ignored_deletion(self.file_name, header.form_id, self.diagnostics);
        }
        Ok(())
    }

    /// Shallow loads a cell and indexes it.
    fn on_cell(&mut self, mut cell: Cell) -> Result<()> {
        let id = cell.form_id;
        cell.world = self.reader.current_world();

        let sub_block = self.reader.enclosing(GroupType::ExteriorCellSubBlock).copied();
        let group_says_exterior = if sub_block.is_some()
            || self.reader.enclosing(GroupType::ExteriorCellBlock).is_some()
        {
            Some(true)
        } else if self.reader.enclosing(GroupType::InteriorCellSubBlock).is_some()
            || self.reader.enclosing(GroupType::InteriorCellBlock).is_some()
        {
            Some(false)
        } else {
            None
        };
        let directly_under_world = self
            .reader
            .group_stack()
            .last()
            .map(|g| g.header.group_type == GroupType::WorldChildren)
            .unwrap_or(false);

        let deleted = cell.flags.is_deleted();
        if let Some(exterior) = group_says_exterior {
            if !deleted && exterior == cell.is_interior() {
                warn!(
                    "{}: cell {} is filed as {} but flagged {}",
                    self.file_name,
                    id,
                    if exterior { "exterior" } else { "interior" },
                    if cell.is_interior() { "interior" } else { "exterior" }
                );
                self.diagnostics.push(Diagnostic::new(
                    self.file_name,
                    DiagnosticKind::CellLocationMismatch {
                        cell: id,
                        group_says_exterior: exterior,
                    },
                ));
            }
        }

        let has_children = self.peek_cell_children(id)?;
        let world = cell.world;
        let record_grid = cell.grid;
        let file_index = self.reader.file_index();

        match self.store.apply_cell(cell, has_children, file_index) {
            ShallowOutcome::IgnoredDeletion => {
                report_ignored_deletion(self.file_name, id, self.diagnostics);
                return Ok(());
            }
            ShallowOutcome::Removed => return Ok(()),
            ShallowOutcome::Created | ShallowOutcome::Extended => {}
        }

        let Some(world) = world else {
            return Ok(());
        };
        if directly_under_world {
            self.store.xrefs_mut().register_world_cell(world, id);
            return Ok(());
        }
        let (Some(sub_block), Some(grid)) = (
            sub_block,
            record_grid.or_else(|| self.store.cell(id).and_then(|c| c.grid)),
        ) else {
            return Ok(());
        };

        let label = sub_block.header.label.as_grid();
        if label != grid.sub_block() {
            warn!(
                "{}: cell {} at grid {} is filed under sub-block {}",
                self.file_name, id, grid, label
            );
            self.diagnostics.push(Diagnostic::new(
                self.file_name,
                DiagnosticKind::GridLabelMismatch {
                    cell: id,
                    label,
                    record: grid,
                },
            ));
            return Ok(());
        }
        if let Err(kept) = self.store.xrefs_mut().register_grid(world, grid, id) {
            self.diagnostics.push(Diagnostic::new(
                self.file_name,
                DiagnosticKind::GridCollision {
                    world,
                    grid,
                    kept,
                    rejected: id,
                },
            ));
        }
        Ok(())
    }

    /// Whether a non-empty children group of `cell` follows.
    fn peek_cell_children(&mut self, cell: FormId) -> Result<bool> {
        let header_size = self.reader.header_width().header_size();
        Ok(match self.reader.peek_group_header()? {
            Some(frame) if frame.header.group_type == GroupType::CellChildren => {
                self.reader.adjust(frame.header.label.as_raw_form_id()) == cell
                    && frame.header.group_size as u64 > header_size
            }
            _ => false,
        })
    }

    fn report_progress(&mut self) -> Result<()> {
        let Some(progress) = self.progress.as_mut() else {
            return Ok(());
        };
        let len = self.reader.len().max(1);
        let pos = self.reader.position()?.min(len);
        let value = (pos * self.options.progress_range as u64 / len) as u32;
        if self.last_progress != Some(value) {
            self.last_progress = Some(value);
            progress(self.file_name, value);
        }
        Ok(())
    }

    fn finish_progress(&mut self) {
        let range = self.options.progress_range;
        if let Some(progress) = self.progress.as_mut() {
            if self.last_progress != Some(range) {
                self.last_progress = Some(range);
                progress(self.file_name, range);
            }
        }
    }
}

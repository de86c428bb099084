//! Two-phase cell loading.
//!
//! A cell is *shallow loaded* the first time its header is seen: only the
//! CELL record itself is decoded, and the temporary and visible-distance
//! children groups that follow it are skipped, leaving a [`ReadContext`]
//! behind for each. Later files touching the same cell *extend* it with
//! more contexts. [`materialize`] replays the contexts in load order and
//! merges their references through the store's normal override rule.
//!
//! ```text
//! Unseen ──shallow load──▶ ShallowLoaded ──materialize──▶ Materializing ──▶ Loaded
//!                            ▲    │ more snapshots                               │
//!                            └────┘◀──────────── new snapshot after load ────────┘
//! ```

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;

use log::{debug, info, trace, warn};

use super::content::ContentStore;
use super::groups::{self, ChildRecords};
use super::loader::SourceFile;
use super::reader::{Esm4Reader, ReadContext};
use super::records::{Cell, Esm4Record};
use super::store::{Insertion, RecordStore};
use super::types::diagnostics::Diagnostic;
use super::types::error::{Esm4Error, Result};
use super::types::formid::FormId;
use super::types::models::GroupType;

/// Loading phase of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellPhase {
    Unseen,
    ShallowLoaded,
    Materializing,
    Loaded,
}

/// References placed in a cell, by children group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellContents {
    pub persistent: Vec<FormId>,
    pub temporary: Vec<FormId>,
    pub visible_distant: Vec<FormId>,
}

impl CellContents {
    fn list_mut(&mut self, group_type: GroupType) -> Option<&mut Vec<FormId>> {
        match group_type {
            GroupType::CellPersistentChildren => Some(&mut self.persistent),
            GroupType::CellTemporaryChildren => Some(&mut self.temporary),
            GroupType::CellVisibleDistantChildren => Some(&mut self.visible_distant),
            _ => None,
        }
    }

    fn remove(&mut self, id: FormId) {
        self.persistent.retain(|&r| r != id);
        self.temporary.retain(|&r| r != id);
        self.visible_distant.retain(|&r| r != id);
    }

    pub fn len(&self) -> usize {
        self.persistent.len() + self.temporary.len() + self.visible_distant.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = FormId> + '_ {
        self.persistent
            .iter()
            .chain(&self.temporary)
            .chain(&self.visible_distant)
            .copied()
    }
}

#[derive(Debug, Clone)]
struct CellState {
    phase: CellPhase,
    /// No contributing file gave the cell any children.
    leaf: bool,
    snapshots: Vec<ReadContext>,
    /// Number of snapshots already merged into the store.
    replayed: usize,
    contents: CellContents,
    contributors: Vec<usize>,
}

impl CellState {
    fn new(leaf: bool, file_index: usize) -> Self {
        Self {
            phase: CellPhase::ShallowLoaded,
            leaf,
            snapshots: Vec::new(),
            replayed: 0,
            contents: CellContents::default(),
            contributors: vec![file_index],
        }
    }
}

/// What a shallow load did to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShallowOutcome {
    Created,
    Extended,
    Removed,
    IgnoredDeletion,
}

/// Cells, their loading state, and which cell owns each reference.
#[derive(Debug, Default)]
pub struct CellRegistry {
    cells: RecordStore<Cell>,
    states: HashMap<FormId, CellState>,
    owners: HashMap<FormId, FormId>,
}

impl CellRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cells(&self) -> &RecordStore<Cell> {
        &self.cells
    }

    pub fn get(&self, id: FormId) -> Option<&Cell> {
        self.cells.try_get(id)
    }

    /// Registers a shallow-loaded cell header from one file.
    ///
    /// A cell seen before is extended, not replaced: its display fields
    /// take the later file's values where set, and its snapshots and
    /// contents are kept.
    pub fn register_shallow(&mut self, cell: Cell, has_children: bool, file_index: usize) -> ShallowOutcome {
        let id = cell.form_id;

        if cell.is_deleted() {
            return match self.cells.insert_from_file(cell) {
                Insertion::Removed => {
                    debug!("Cell {} removed by deletion", id);
                    if let Some(state) = self.states.remove(&id) {
                        for reference in state.contents.iter() {
                            self.owners.remove(&reference);
                        }
                    }
                    ShallowOutcome::Removed
                }
                _ => ShallowOutcome::IgnoredDeletion,
            };
        }

        match self.cells.try_get(id).cloned() {
            Some(mut merged) => {
                merged.extend_with(cell);
                self.cells.insert_from_file(merged);
                let state = self
                    .states
                    .entry(id)
                    .or_insert_with(|| CellState::new(true, file_index));
                state.leaf &= !has_children;
                if !state.contributors.contains(&file_index) {
                    state.contributors.push(file_index);
                }
                trace!("Cell {} extended by file {}", id, file_index);
                ShallowOutcome::Extended
            }
            None => {
                self.cells.insert_from_file(cell);
                self.states.insert(id, CellState::new(!has_children, file_index));
                trace!("Cell {} shallow loaded from file {}", id, file_index);
                ShallowOutcome::Created
            }
        }
    }

    /// Remembers where a deferred children group of `cell` lives.
    ///
    /// Returns `false` if the cell is not registered. A snapshot arriving
    /// after the cell was loaded puts it back into the shallow phase.
    pub fn push_snapshot(&mut self, cell: FormId, context: ReadContext) -> bool {
        let Some(state) = self.states.get_mut(&cell) else {
            return false;
        };
        trace!(
            "Cell {}: snapshot at offset {:#x} of file {}",
            cell,
            context.offset,
            context.file_index
        );
        state.snapshots.push(context);
        state.leaf = false;
        if state.phase == CellPhase::Loaded {
            state.phase = CellPhase::ShallowLoaded;
        }
        true
    }

    pub fn phase(&self, id: FormId) -> CellPhase {
        self.states
            .get(&id)
            .map(|s| s.phase)
            .unwrap_or(CellPhase::Unseen)
    }

    pub fn is_leaf(&self, id: FormId) -> Option<bool> {
        self.states.get(&id).map(|s| s.leaf)
    }

    pub fn needs_materialization(&self, id: FormId) -> bool {
        self.states
            .get(&id)
            .map(|s| s.replayed < s.snapshots.len())
            .unwrap_or(false)
    }

    pub fn snapshots(&self, id: FormId) -> &[ReadContext] {
        self.states
            .get(&id)
            .map(|s| s.snapshots.as_slice())
            .unwrap_or(&[])
    }

    /// Load-order indices of the files that declared the cell.
    pub fn contributors(&self, id: FormId) -> &[usize] {
        self.states
            .get(&id)
            .map(|s| s.contributors.as_slice())
            .unwrap_or(&[])
    }

    pub fn contents(&self, id: FormId) -> Option<&CellContents> {
        self.states.get(&id).map(|s| &s.contents)
    }

    /// The cell a reference was placed in.
    pub fn owner_of(&self, reference: FormId) -> Option<FormId> {
        self.owners.get(&reference).copied()
    }

    /// Files a reference under a cell, moving it out of any previous one.
    pub(crate) fn attach_child(&mut self, cell: FormId, group_type: GroupType, reference: FormId) {
        if let Some(previous) = self.owners.insert(reference, cell) {
            if let Some(state) = self.states.get_mut(&previous) {
                state.contents.remove(reference);
            }
        }
        let Some(state) = self.states.get_mut(&cell) else {
            return;
        };
        if let Some(list) = state.contents.list_mut(group_type) {
            if !list.contains(&reference) {
                list.push(reference);
            }
        }
    }

    pub(crate) fn detach_child(&mut self, reference: FormId) {
        if let Some(cell) = self.owners.remove(&reference) {
            if let Some(state) = self.states.get_mut(&cell) {
                state.contents.remove(reference);
            }
        }
    }

    /// Registers a runtime-created cell; it has nothing to materialize.
    pub(crate) fn insert_runtime(&mut self, cell: Cell) {
        let id = cell.form_id;
        self.cells.insert_runtime(cell);
        if let Entry::Vacant(slot) = self.states.entry(id) {
            let mut state = CellState::new(true, FormId::RUNTIME_FILE_INDEX as usize);
            state.phase = CellPhase::Loaded;
            slot.insert(state);
        }
    }

    pub(crate) fn erase_runtime(&mut self, id: FormId) -> Option<Cell> {
        let removed = self.cells.erase_runtime(id)?;
        if !self.cells.contains(id) {
            self.states.remove(&id);
        }
        Some(removed)
    }

    pub(crate) fn update<F: FnOnce(&mut Cell)>(&mut self, id: FormId, f: F) -> Result<()> {
        self.cells.update(id, f)
    }

    /// Drops every snapshot and contribution left by file `file_index`.
    ///
    /// Used when that file failed to load, so its index can be handed to
    /// the next file. Returns the number of snapshots dropped.
    pub(crate) fn discard_file(&mut self, file_index: usize) -> usize {
        let mut dropped = 0;
        for state in self.states.values_mut() {
            let before = state.snapshots.len();
            state.snapshots.retain(|s| s.file_index != file_index);
            state.contributors.retain(|&i| i != file_index);
            if state.snapshots.len() < before {
                dropped += before - state.snapshots.len();
                state.replayed = state.replayed.min(state.snapshots.len());
                if state.replayed > 0 && state.replayed == state.snapshots.len() {
                    state.phase = CellPhase::Loaded;
                }
            }
        }
        dropped
    }

    /// Moves a cell into the materializing phase.
    ///
    /// Returns the snapshots still to replay, or `None` if there are none.
    fn begin_materialize(&mut self, id: FormId) -> Result<Option<Vec<ReadContext>>> {
        let state = self.states.get_mut(&id).ok_or(Esm4Error::CellNotFound(id))?;
        if state.replayed == state.snapshots.len() {
            state.phase = CellPhase::Loaded;
            return Ok(None);
        }
        state.phase = CellPhase::Materializing;
        Ok(Some(state.snapshots[state.replayed..].to_vec()))
    }

    fn finish_materialize(&mut self, id: FormId, replayed: usize) {
        if let Some(state) = self.states.get_mut(&id) {
            state.replayed += replayed;
            state.phase = CellPhase::Loaded;
        }
    }

    fn abort_materialize(&mut self, id: FormId) {
        if let Some(state) = self.states.get_mut(&id) {
            state.phase = CellPhase::ShallowLoaded;
        }
    }
}

/// Reads every pending children group of a cell and merges it.
///
/// Snapshots are replayed oldest file first. All of them are read before
/// anything is applied, so a failure leaves the store and the cell exactly
/// as they were. Materializing a loaded cell is a no-op.
///
/// Returns the number of records merged.
pub fn materialize(
    store: &mut ContentStore,
    sources: &[SourceFile],
    id: FormId,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<usize> {
    let Some(pending) = store.cells_mut().begin_materialize(id)? else {
        trace!("Cell {} has nothing left to materialize", id);
        return Ok(0);
    };
    debug!("Materializing cell {} from {} snapshots", id, pending.len());

    let staged = match read_snapshots(sources, id, &pending) {
        Ok(staged) => staged,
        Err(e) => {
            warn!("Materializing cell {} failed: {}", id, e);
            store.cells_mut().abort_materialize(id);
            return Err(e);
        }
    };

    let mut merged = 0;
    for (source, group_type, children) in staged {
        merged += children.records.len();
        groups::apply_child_records(
            store,
            id,
            group_type,
            children,
            source.index,
            &source.name,
            diagnostics,
        );
    }
    store.cells_mut().finish_materialize(id, pending.len());

    info!("Cell {} materialized: {} records merged", id, merged);
    Ok(merged)
}

fn read_snapshots<'s>(
    sources: &'s [SourceFile],
    cell: FormId,
    pending: &[ReadContext],
) -> Result<Vec<(&'s SourceFile, GroupType, ChildRecords)>> {
    let mut readers: HashMap<usize, Esm4Reader<BufReader<File>>> = HashMap::new();
    let mut staged = Vec::with_capacity(pending.len());

    for context in pending {
        let source = sources
            .get(context.file_index)
            .ok_or(Esm4Error::SourceUnavailable(context.file_index))?;
        let reader = match readers.entry(context.file_index) {
            Entry::Occupied(slot) => slot.into_mut(),
            Entry::Vacant(slot) => slot.insert(source.open().map_err(|e| e.in_file(&source.name))?),
        };

        let (group_type, children) = replay(reader, context, cell, source.header.is_localized())
            .map_err(|e| e.in_file(&source.name))?;
        staged.push((source, group_type, children));
    }

    Ok(staged)
}

fn replay(
    reader: &mut Esm4Reader<BufReader<File>>,
    context: &ReadContext,
    cell: FormId,
    localized: bool,
) -> Result<(GroupType, ChildRecords)> {
    reader.restore(context)?;
    let frame = reader.read_group_header()?;
    let group_type = frame.header.group_type;
    if !group_type.is_deferrable() {
        return Err(Esm4Error::InvalidFormat(format!(
            "Snapshot at offset {:#x} points at a {:?} group",
            context.offset, group_type
        )));
    }
    reader.enter_group(frame);
    let children = groups::read_child_records(reader, cell, localized)?;
    reader.leave_group();
    Ok((group_type, children))
}

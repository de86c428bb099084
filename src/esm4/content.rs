//! The record database consumers query.
//!
//! [`ContentStore`] owns one [`RecordStore`] per record kind, the
//! [`CellRegistry`] and the [`CrossReferences`]. Callers hold identifiers,
//! never references, across anything that mutates it.

use std::collections::{BTreeMap, HashMap};

use log::{debug, trace};

use super::cells::{CellContents, CellPhase, CellRegistry, ShallowOutcome};
use super::records::{AnyRecord, BaseObject, Cell, Esm4Record, Reference, World};
use super::resolver::CrossReferences;
use super::store::{Insertion, RecordStore};
use super::types::error::{Esm4Error, Result};
use super::types::formid::FormId;
use super::types::models::{GroupType, Grid, RecordType};

/// A borrowed record of any kind.
#[derive(Debug, Clone, Copy)]
pub enum RecordRef<'a> {
    Cell(&'a Cell),
    World(&'a World),
    Reference(&'a Reference),
    Object(&'a BaseObject),
}

impl RecordRef<'_> {
    pub fn form_id(&self) -> FormId {
        match self {
            RecordRef::Cell(r) => r.form_id(),
            RecordRef::World(r) => r.form_id(),
            RecordRef::Reference(r) => r.form_id(),
            RecordRef::Object(r) => r.form_id(),
        }
    }

    pub fn editor_id(&self) -> &str {
        match self {
            RecordRef::Cell(r) => r.editor_id(),
            RecordRef::World(r) => r.editor_id(),
            RecordRef::Reference(r) => r.editor_id(),
            RecordRef::Object(r) => r.editor_id(),
        }
    }

    pub fn record_type(&self) -> RecordType {
        match self {
            RecordRef::Cell(_) => RecordType::Cell,
            RecordRef::World(_) => RecordType::Wrld,
            RecordRef::Reference(r) => r.record_type,
            RecordRef::Object(r) => r.record_type,
        }
    }
}

#[derive(Debug, Default)]
pub struct ContentStore {
    worlds: RecordStore<World>,
    cells: CellRegistry,
    references: RecordStore<Reference>,
    objects: BTreeMap<RecordType, RecordStore<BaseObject>>,
    xrefs: CrossReferences,
    /// Load-order index of the file whose version of a reference or base
    /// object was merged last, deletions included.
    origins: HashMap<FormId, usize>,
    next_runtime_sequence: u32,
}

impl ContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- ingestion -----------------------------------------------------

    fn track_alias(&mut self, previous: Option<String>, id: FormId, editor_id: &str, insertion: Insertion) {
        match insertion {
            Insertion::Added | Insertion::Replaced => {
                if let Some(previous) = previous.filter(|p| !p.eq_ignore_ascii_case(editor_id)) {
                    self.xrefs.forget_alias(&previous, id);
                }
                self.xrefs.record_alias(editor_id, id);
            }
            Insertion::Removed => {
                if let Some(previous) = previous {
                    self.xrefs.forget_alias(&previous, id);
                }
            }
            Insertion::IgnoredDeletion | Insertion::Superseded => {}
        }
    }

    /// Claims `id` for `file_index` unless a later file already merged it.
    ///
    /// Deferred groups are replayed after later files were read, so an
    /// older file's copy can arrive last.
    fn claim(&mut self, id: FormId, file_index: usize) -> bool {
        match self.origins.get(&id) {
            Some(&origin) if origin > file_index => {
                trace!("Record {} from file {} superseded by file {}", id, file_index, origin);
                false
            }
            _ => {
                self.origins.insert(id, file_index);
                true
            }
        }
    }

    /// Re-indexes the editor id of `id` after an in-place update.
    fn retrack_alias(&mut self, id: FormId, previous: Option<String>) {
        if let Some(current) = self.find(id).map(|r| r.editor_id().to_string()) {
            self.track_alias(previous, id, &current, Insertion::Replaced);
        }
    }

    pub(crate) fn apply_world(&mut self, world: World) -> Insertion {
        let id = world.form_id;
        let editor_id = world.editor_id.clone();
        let previous = self.worlds.try_get(id).map(|w| w.editor_id.clone());
        let insertion = self.worlds.insert_from_file(world);
        self.track_alias(previous, id, &editor_id, insertion);
        insertion
    }

    pub(crate) fn apply_object(&mut self, object: BaseObject, file_index: usize) -> Insertion {
        let id = object.form_id;
        if !self.claim(id, file_index) {
            return Insertion::Superseded;
        }
        let editor_id = object.editor_id.clone();
        let store = self.objects.entry(object.record_type).or_default();
        let previous = store.try_get(id).map(|o| o.editor_id.clone());
        let insertion = store.insert_from_file(object);
        self.track_alias(previous, id, &editor_id, insertion);
        insertion
    }

    pub(crate) fn apply_cell(&mut self, cell: Cell, has_children: bool, file_index: usize) -> ShallowOutcome {
        let id = cell.form_id;
        let previous = self.cells.get(id).map(|c| c.editor_id.clone());
        let outcome = self.cells.register_shallow(cell, has_children, file_index);
        match outcome {
            ShallowOutcome::Created | ShallowOutcome::Extended => {
                let current = self
                    .cells
                    .get(id)
                    .map(|c| c.editor_id.clone())
                    .unwrap_or_default();
                self.track_alias(previous, id, &current, Insertion::Replaced);
            }
            ShallowOutcome::Removed => {
                self.track_alias(previous, id, "", Insertion::Removed);
                self.xrefs.unregister_cell(id);
            }
            ShallowOutcome::IgnoredDeletion => {}
        }
        outcome
    }

    /// Merges one record read by file `file_index` from a children group of `cell`.
    ///
    /// A record older than the merged version is dropped, so replaying a
    /// deferred group never undoes what a later file did.
    pub(crate) fn apply_child(
        &mut self,
        cell: FormId,
        group_type: GroupType,
        record: AnyRecord,
        file_index: usize,
    ) -> Insertion {
        match record {
            AnyRecord::Reference(reference) => {
                let id = reference.form_id;
                if !self.claim(id, file_index) {
                    return Insertion::Superseded;
                }
                let editor_id = reference.editor_id.clone();
                let teleport = reference.teleport;
                let previous = self.references.try_get(id).map(|r| r.editor_id.clone());
                let insertion = self.references.insert_from_file(reference);
                match insertion {
                    Insertion::Added | Insertion::Replaced => {
                        self.cells.attach_child(cell, group_type, id);
                        match teleport {
                            Some(t) => self.xrefs.record_portal(id, t.destination_door),
                            None => self.xrefs.forget_portal(id),
                        }
                    }
                    Insertion::Removed => {
                        self.cells.detach_child(id);
                        self.xrefs.forget_portal(id);
                    }
                    Insertion::IgnoredDeletion | Insertion::Superseded => {}
                }
                self.track_alias(previous, id, &editor_id, insertion);
                insertion
            }
            AnyRecord::Object(object) => self.apply_object(object, file_index),
            AnyRecord::Cell(nested) => {
                debug!("Cell {} inside children of cell {} ignored", nested.form_id, cell);
                Insertion::IgnoredDeletion
            }
            AnyRecord::World(nested) => {
                debug!("World {} inside children of cell {} ignored", nested.form_id, cell);
                Insertion::IgnoredDeletion
            }
        }
    }

    pub(crate) fn cells_mut(&mut self) -> &mut CellRegistry {
        &mut self.cells
    }

    pub(crate) fn xrefs_mut(&mut self) -> &mut CrossReferences {
        &mut self.xrefs
    }

    /// Resolves portal destinations once every file has been read.
    pub fn finalize(&mut self) -> usize {
        let cells = &self.cells;
        let resolved = self.xrefs.finalize(|door| cells.owner_of(door));
        debug!("{} portal destinations resolved", resolved);
        resolved
    }

    // ---- queries -------------------------------------------------------

    /// Finds the live record with an identifier, whatever its kind.
    pub fn find(&self, id: FormId) -> Option<RecordRef<'_>> {
        if let Some(cell) = self.cells.get(id) {
            return Some(RecordRef::Cell(cell));
        }
        if let Some(world) = self.worlds.try_get(id) {
            return Some(RecordRef::World(world));
        }
        if let Some(reference) = self.references.try_get(id) {
            return Some(RecordRef::Reference(reference));
        }
        self.objects
            .values()
            .find_map(|store| store.try_get(id))
            .map(RecordRef::Object)
    }

    pub fn get(&self, id: FormId) -> Result<RecordRef<'_>> {
        self.find(id).ok_or(Esm4Error::RecordNotFound(id))
    }

    pub fn cell(&self, id: FormId) -> Option<&Cell> {
        self.cells.get(id)
    }

    pub fn world(&self, id: FormId) -> Option<&World> {
        self.worlds.try_get(id)
    }

    pub fn reference(&self, id: FormId) -> Option<&Reference> {
        self.references.try_get(id)
    }

    pub fn object(&self, id: FormId) -> Option<&BaseObject> {
        self.objects.values().find_map(|store| store.try_get(id))
    }

    pub fn lookup_alias(&self, editor_id: &str) -> Option<FormId> {
        self.xrefs.lookup_alias(editor_id)
    }

    pub fn find_by_alias(&self, editor_id: &str) -> Option<RecordRef<'_>> {
        self.lookup_alias(editor_id).and_then(|id| self.find(id))
    }

    pub fn cell_at(&self, world: FormId, x: i32, y: i32) -> Option<FormId> {
        self.xrefs.cell_at(world, Grid::new(x, y))
    }

    /// The placeholder cell holding a world's persistent references.
    pub fn world_persistent_cell(&self, world: FormId) -> Option<FormId> {
        self.xrefs.world_cell(world)
    }

    pub fn cell_phase(&self, id: FormId) -> CellPhase {
        self.cells.phase(id)
    }

    pub fn is_leaf(&self, cell: FormId) -> Option<bool> {
        self.cells.is_leaf(cell)
    }

    pub fn needs_materialization(&self, cell: FormId) -> bool {
        self.cells.needs_materialization(cell)
    }

    pub fn cell_contents(&self, cell: FormId) -> Option<&CellContents> {
        self.cells.contents(cell)
    }

    /// The cell a portal reference leads to.
    ///
    /// Uses the finalized destination map, falling back to resolving the
    /// destination door's owner on the spot.
    pub fn portal_destination(&self, door: FormId) -> Option<FormId> {
        self.xrefs.portal_destination(door).or_else(|| {
            self.xrefs
                .destination_door(door)
                .and_then(|dest| self.cells.owner_of(dest))
        })
    }

    /// Identifiers of one record kind in stable insertion order.
    pub fn identifiers(&self, record_type: RecordType) -> Vec<FormId> {
        match record_type {
            RecordType::Cell => self.cells.cells().list_identifiers().to_vec(),
            RecordType::Wrld => self.worlds.list_identifiers().to_vec(),
            kind if kind.is_reference() => self
                .references
                .iter()
                .filter(|r| r.record_type == record_type)
                .map(|r| r.form_id)
                .collect(),
            other => self
                .objects
                .get(&other)
                .map(|store| store.list_identifiers().to_vec())
                .unwrap_or_default(),
        }
    }

    pub fn worlds(&self) -> &RecordStore<World> {
        &self.worlds
    }

    pub fn cells(&self) -> &CellRegistry {
        &self.cells
    }

    pub fn references(&self) -> &RecordStore<Reference> {
        &self.references
    }

    pub fn objects(&self, record_type: RecordType) -> Option<&RecordStore<BaseObject>> {
        self.objects.get(&record_type)
    }

    pub fn cross_references(&self) -> &CrossReferences {
        &self.xrefs
    }

    /// Record counts per kind, for reporting.
    pub fn counts(&self) -> Vec<(RecordType, usize)> {
        let mut counts = vec![
            (RecordType::Wrld, self.worlds.len()),
            (RecordType::Cell, self.cells.cells().len()),
        ];
        for kind in [RecordType::Refr, RecordType::Achr, RecordType::Acre] {
            let n = self.references.iter().filter(|r| r.record_type == kind).count();
            if n > 0 {
                counts.push((kind, n));
            }
        }
        counts.extend(self.objects.iter().map(|(kind, store)| (*kind, store.len())));
        counts
    }

    // ---- runtime mutation ----------------------------------------------

    /// Hands out an identifier in the runtime file index.
    pub fn next_runtime_id(&mut self) -> FormId {
        loop {
            self.next_runtime_sequence += 1;
            let id = FormId::new(FormId::RUNTIME_FILE_INDEX, self.next_runtime_sequence);
            if self.find(id).is_none() {
                return id;
            }
        }
    }

    /// Adds a record to the runtime layer of its kind.
    pub fn insert_runtime(&mut self, record: AnyRecord) {
        let id = record.form_id();
        let editor_id = record.editor_id().to_string();
        match record {
            AnyRecord::Cell(cell) => self.cells.insert_runtime(cell),
            AnyRecord::World(world) => {
                self.worlds.insert_runtime(world);
            }
            AnyRecord::Reference(reference) => {
                if let Some(cell) = reference.cell {
                    self.cells
                        .attach_child(cell, GroupType::CellTemporaryChildren, id);
                }
                self.references.insert_runtime(reference);
            }
            AnyRecord::Object(object) => {
                self.objects
                    .entry(object.record_type)
                    .or_default()
                    .insert_runtime(object);
            }
        }
        self.xrefs.record_alias(&editor_id, id);
    }

    /// Removes a runtime record, whatever its kind.
    pub fn erase_runtime(&mut self, id: FormId) -> Option<AnyRecord> {
        let erased = if let Some(cell) = self.cells.erase_runtime(id) {
            AnyRecord::Cell(cell)
        } else if let Some(world) = self.worlds.erase_runtime(id) {
            AnyRecord::World(world)
        } else if let Some(reference) = self.references.erase_runtime(id) {
            if !self.references.contains(id) {
                self.cells.detach_child(id);
            }
            AnyRecord::Reference(reference)
        } else {
            let object = self
                .objects
                .values_mut()
                .find_map(|store| store.erase_runtime(id))?;
            AnyRecord::Object(object)
        };

        self.xrefs.forget_alias(erased.editor_id(), id);
        if let Some(visible) = self.find(id) {
            let editor_id = visible.editor_id().to_string();
            self.xrefs.record_alias(&editor_id, id);
        }
        Some(erased)
    }

    pub fn update_cell<F: FnOnce(&mut Cell)>(&mut self, id: FormId, f: F) -> Result<()> {
        let previous = self.cells.get(id).map(|c| c.editor_id.clone());
        self.cells.update(id, f)?;
        self.retrack_alias(id, previous);
        Ok(())
    }

    pub fn update_world<F: FnOnce(&mut World)>(&mut self, id: FormId, f: F) -> Result<()> {
        let previous = self.worlds.try_get(id).map(|w| w.editor_id.clone());
        self.worlds.update(id, f)?;
        self.retrack_alias(id, previous);
        Ok(())
    }

    pub fn update_reference<F: FnOnce(&mut Reference)>(&mut self, id: FormId, f: F) -> Result<()> {
        let previous = self.references.try_get(id).map(|r| r.editor_id.clone());
        self.references.update(id, f)?;
        self.retrack_alias(id, previous);
        Ok(())
    }

    pub fn update_object<F: FnOnce(&mut BaseObject)>(&mut self, id: FormId, f: F) -> Result<()> {
        let store = self
            .objects
            .values_mut()
            .find(|store| store.contains(id))
            .ok_or(Esm4Error::RecordNotFound(id))?;
        let previous = store.try_get(id).map(|o| o.editor_id.clone());
        store.update(id, f)?;
        self.retrack_alias(id, previous);
        Ok(())
    }
}

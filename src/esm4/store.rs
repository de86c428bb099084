//! FormId-keyed record storage with file and runtime layers.
//!
//! A [`RecordStore`] holds one record kind in three structures:
//!
//! - **static**: records read from content files. Inserting an identifier
//!   that is already present replaces the value in place, so the last file
//!   loaded wins.
//! - **dynamic**: records created after ingestion. A dynamic entry shadows
//!   the static entry with the same identifier on lookup.
//! - **ordered view**: identifiers in first-insertion order, the static
//!   prefix followed by the dynamic suffix.

use std::collections::HashMap;

use log::{debug, trace};

use super::records::Esm4Record;
use super::types::error::{Esm4Error, Result};
use super::types::formid::FormId;

/// What a file insertion did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    /// A new identifier was appended.
    Added,
    /// An existing identifier's value was overwritten in place.
    Replaced,
    /// A deleted record removed a live one.
    Removed,
    /// A deleted record named an identifier that was never live.
    IgnoredDeletion,
    /// The record came from an earlier file than the version already merged.
    Superseded,
}

#[derive(Debug, Clone)]
pub struct RecordStore<T: Esm4Record> {
    statics: HashMap<FormId, T>,
    dynamics: HashMap<FormId, T>,
    /// Runtime identifiers in insertion order.
    dynamic_order: Vec<FormId>,
    ordered: Vec<FormId>,
    /// Length of the static prefix of `ordered`.
    static_len: usize,
}

impl<T: Esm4Record> Default for RecordStore<T> {
    fn default() -> Self {
        Self {
            statics: HashMap::new(),
            dynamics: HashMap::new(),
            dynamic_order: Vec::new(),
            ordered: Vec::new(),
            static_len: 0,
        }
    }
}

impl<T: Esm4Record> RecordStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff the record carries the deleted flag.
    pub fn is_record_deleted(record: &T) -> bool {
        record.is_deleted()
    }

    /// Inserts a record read from a content file.
    ///
    /// A deleted record removes the live one with the same identifier
    /// rather than being stored as a tombstone.
    pub fn insert_from_file(&mut self, record: T) -> Insertion {
        let id = record.form_id();

        if Self::is_record_deleted(&record) {
            if self.statics.remove(&id).is_none() {
                debug!("Deletion of unknown record {} ignored", id);
                return Insertion::IgnoredDeletion;
            }
            if let Some(pos) = self.ordered[..self.static_len].iter().position(|&o| o == id) {
                self.ordered.remove(pos);
                self.static_len -= 1;
            }
            self.rebuild_dynamic_suffix();
            trace!("Record {} removed by deletion", id);
            return Insertion::Removed;
        }

        if let Some(slot) = self.statics.get_mut(&id) {
            *slot = record;
            trace!("Record {} overridden", id);
            return Insertion::Replaced;
        }

        self.statics.insert(id, record);
        self.ordered.insert(self.static_len, id);
        self.static_len += 1;
        if self.dynamics.contains_key(&id) {
            self.rebuild_dynamic_suffix();
        }
        Insertion::Added
    }

    /// Inserts or replaces a runtime-created record.
    ///
    /// Returns the previous runtime value, if any.
    pub fn insert_runtime(&mut self, record: T) -> Option<T> {
        let id = record.form_id();
        let previous = self.dynamics.insert(id, record);
        if previous.is_none() {
            self.dynamic_order.push(id);
            if !self.statics.contains_key(&id) {
                self.ordered.push(id);
            }
        }
        previous
    }

    /// Removes a runtime record, rebuilding the ordered view's dynamic suffix.
    pub fn erase_runtime(&mut self, id: FormId) -> Option<T> {
        let removed = self.dynamics.remove(&id)?;
        self.dynamic_order.retain(|&o| o != id);
        self.rebuild_dynamic_suffix();
        Some(removed)
    }

    fn rebuild_dynamic_suffix(&mut self) {
        self.ordered.truncate(self.static_len);
        let statics = &self.statics;
        self.ordered.extend(
            self.dynamic_order
                .iter()
                .copied()
                .filter(|id| !statics.contains_key(id)),
        );
    }

    /// Looks up a record; the runtime layer takes priority.
    pub fn try_get(&self, id: FormId) -> Option<&T> {
        self.dynamics.get(&id).or_else(|| self.statics.get(&id))
    }

    /// Like [`try_get`](Self::try_get), but absence is an error.
    pub fn get(&self, id: FormId) -> Result<&T> {
        self.try_get(id).ok_or(Esm4Error::RecordNotFound(id))
    }

    pub fn contains(&self, id: FormId) -> bool {
        self.dynamics.contains_key(&id) || self.statics.contains_key(&id)
    }

    pub fn is_runtime(&self, id: FormId) -> bool {
        self.dynamics.contains_key(&id)
    }

    /// Modifies the visible version of a record in place.
    ///
    /// # Errors
    /// Fails if the record is absent, or if `f` changes its identifier; in
    /// the latter case the store is left unchanged.
    pub fn update<F>(&mut self, id: FormId, f: F) -> Result<()>
    where
        F: FnOnce(&mut T),
    {
        let layer = if self.dynamics.contains_key(&id) {
            &mut self.dynamics
        } else {
            &mut self.statics
        };
        let slot = layer.get_mut(&id).ok_or(Esm4Error::RecordNotFound(id))?;
        let mut updated = slot.clone();
        f(&mut updated);
        if updated.form_id() != id {
            return Err(Esm4Error::FormIdMutation {
                expected: id,
                found: updated.form_id(),
            });
        }
        *slot = updated;
        Ok(())
    }

    /// Identifiers in first-insertion order, static records first.
    pub fn list_identifiers(&self) -> &[FormId] {
        &self.ordered
    }

    /// Records in the order of [`list_identifiers`](Self::list_identifiers).
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.ordered.iter().filter_map(move |&id| self.try_get(id))
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn static_len(&self) -> usize {
        self.static_len
    }
}

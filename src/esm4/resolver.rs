//! Cross-reference indices that no single record carries.
//!
//! These are maintained incrementally while records stream past:
//! - editor alias → identifier (last write wins, like the store)
//! - (world, grid) → cell (first registration wins, collisions reported)
//! - world → placeholder cell holding the world's persistent references
//! - portal reference → destination door reference, and after
//!   [`finalize`](CrossReferences::finalize), portal → destination cell

use std::collections::HashMap;

use log::{debug, trace, warn};

use super::types::formid::FormId;
use super::types::models::Grid;

#[derive(Debug, Default, Clone)]
pub struct CrossReferences {
    /// Keyed by lower-cased alias; aliases compare case-insensitively.
    aliases: HashMap<String, FormId>,
    grid: HashMap<(FormId, Grid), FormId>,
    world_cells: HashMap<FormId, FormId>,
    portal_doors: HashMap<FormId, FormId>,
    destinations: HashMap<FormId, FormId>,
}

impl CrossReferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_alias(&mut self, editor_id: &str, id: FormId) {
        if editor_id.is_empty() {
            return;
        }
        trace!("Alias '{}' -> {}", editor_id, id);
        self.aliases.insert(editor_id.to_ascii_lowercase(), id);
    }

    /// Drops the alias only if it still points at `id`.
    pub fn forget_alias(&mut self, editor_id: &str, id: FormId) {
        let key = editor_id.to_ascii_lowercase();
        if self.aliases.get(&key) == Some(&id) {
            self.aliases.remove(&key);
        }
    }

    pub fn lookup_alias(&self, editor_id: &str) -> Option<FormId> {
        self.aliases.get(&editor_id.to_ascii_lowercase()).copied()
    }

    /// Registers a cell at a world grid slot.
    ///
    /// Re-registering the same cell is a no-op. A cell registered at a new
    /// slot of the same world leaves its old one. If another cell already
    /// holds the slot, it is kept and returned as the error value.
    pub fn register_grid(&mut self, world: FormId, grid: Grid, cell: FormId) -> Result<(), FormId> {
        match self.grid.get(&(world, grid)) {
            Some(&existing) if existing != cell => {
                warn!(
                    "Grid {} of world {} already holds cell {}; ignoring cell {}",
                    grid, world, existing, cell
                );
                Err(existing)
            }
            Some(_) => Ok(()),
            None => {
                self.grid.retain(|&(w, _), c| w != world || *c != cell);
                debug!("Cell {} registered at {} in world {}", cell, grid, world);
                self.grid.insert((world, grid), cell);
                Ok(())
            }
        }
    }

    /// Removes every grid slot held by `cell`.
    pub fn unregister_cell(&mut self, cell: FormId) {
        self.grid.retain(|_, c| *c != cell);
        self.world_cells.retain(|_, c| *c != cell);
    }

    pub fn cell_at(&self, world: FormId, grid: Grid) -> Option<FormId> {
        self.grid.get(&(world, grid)).copied()
    }

    pub fn register_world_cell(&mut self, world: FormId, cell: FormId) {
        debug!("Cell {} holds the persistent references of world {}", cell, world);
        self.world_cells.insert(world, cell);
    }

    pub fn world_cell(&self, world: FormId) -> Option<FormId> {
        self.world_cells.get(&world).copied()
    }

    pub fn record_portal(&mut self, door: FormId, destination_door: FormId) {
        trace!("Portal {} -> door {}", door, destination_door);
        self.portal_doors.insert(door, destination_door);
    }

    pub fn forget_portal(&mut self, door: FormId) {
        self.portal_doors.remove(&door);
        self.destinations.remove(&door);
    }

    pub fn destination_door(&self, door: FormId) -> Option<FormId> {
        self.portal_doors.get(&door).copied()
    }

    /// Resolves every portal to the cell owning its destination door.
    ///
    /// `owner_of` maps a reference to the cell it was placed in. Portals
    /// whose destination is unknown are left unresolved.
    pub fn finalize<F>(&mut self, owner_of: F) -> usize
    where
        F: Fn(FormId) -> Option<FormId>,
    {
        self.destinations.clear();
        for (&door, &dest) in &self.portal_doors {
            match owner_of(dest) {
                Some(cell) => {
                    self.destinations.insert(door, cell);
                }
                None => debug!("Portal {} leads to door {} outside any known cell", door, dest),
            }
        }
        self.destinations.len()
    }

    /// Destination cell resolved by the last [`finalize`](Self::finalize).
    pub fn portal_destination(&self, door: FormId) -> Option<FormId> {
        self.destinations.get(&door).copied()
    }

    pub fn portals(&self) -> impl Iterator<Item = (FormId, FormId)> + '_ {
        self.destinations.iter().map(|(d, c)| (*d, *c))
    }
}

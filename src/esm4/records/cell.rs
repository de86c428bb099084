//! Location records.

use crate::esm4::format::record;
use crate::esm4::types::error::Result;
use crate::esm4::types::formid::FormId;
use crate::esm4::types::models::{Grid, RecordFlags, RecordHeader, SubRecord};

use super::{editor_id_of, full_name_of, DecodeContext, Esm4Record, LocalizedText};

const DATA: &[u8; 4] = b"DATA";
const XCLC: &[u8; 4] = b"XCLC";

/// A playable area: an exterior grid square or an interior.
///
/// Only the header-level fields are decoded here. The references placed in
/// the cell live in its children groups and are tracked by the
/// [`CellRegistry`](crate::esm4::cells::CellRegistry).
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub form_id: FormId,
    pub editor_id: String,
    pub flags: RecordFlags,
    pub full_name: Option<LocalizedText>,
    /// DATA flags; bit 0x01 marks an interior.
    pub cell_flags: u16,
    pub grid: Option<Grid>,
    /// Owning world, taken from the enclosing world children group.
    pub world: Option<FormId>,
}

impl Cell {
    pub const INTERIOR: u16 = 0x0001;

    pub fn is_interior(&self) -> bool {
        self.cell_flags & Self::INTERIOR != 0
    }

    /// Folds a later file's header over this one.
    ///
    /// Fields the later file leaves unset keep their earlier values; the
    /// record flags always follow the later file.
    pub fn extend_with(&mut self, later: Cell) {
        if !later.editor_id.is_empty() {
            self.editor_id = later.editor_id;
        }
        if later.full_name.is_some() {
            self.full_name = later.full_name;
        }
        if later.grid.is_some() {
            self.grid = later.grid;
        }
        if later.world.is_some() {
            self.world = later.world;
        }
        self.flags = later.flags;
        self.cell_flags = later.cell_flags;
    }
}

impl Esm4Record for Cell {
    fn form_id(&self) -> FormId {
        self.form_id
    }

    fn editor_id(&self) -> &str {
        &self.editor_id
    }

    fn flags(&self) -> RecordFlags {
        self.flags
    }

    fn decode(header: &RecordHeader, sub_records: &[SubRecord], ctx: &DecodeContext) -> Result<Self> {
        let cell_flags = match record::find(sub_records, DATA) {
            Some(data) if data.data.len() >= 2 => data.u16_at(0)?,
            Some(data) => data.u8_at(0)? as u16,
            None => 0,
        };
        let grid = match record::find(sub_records, XCLC) {
            Some(xclc) => Some(Grid::new(xclc.i32_at(0)?, xclc.i32_at(4)?)),
            None => None,
        };

        Ok(Cell {
            form_id: header.form_id,
            editor_id: editor_id_of(sub_records),
            flags: header.flags,
            full_name: full_name_of(sub_records, ctx.localized)?,
            cell_flags,
            grid,
            world: None,
        })
    }
}

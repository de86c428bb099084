//! World space records.

use crate::esm4::format::record;
use crate::esm4::types::error::Result;
use crate::esm4::types::formid::FormId;
use crate::esm4::types::models::{RecordFlags, RecordHeader, SubRecord};

use super::{editor_id_of, full_name_of, DecodeContext, Esm4Record, LocalizedText};

const WNAM: &[u8; 4] = b"WNAM";

/// An exterior space made of grid cells.
///
/// The grid index and the persistent placeholder cell of each world are
/// kept by the [`CrossReferences`](crate::esm4::resolver::CrossReferences),
/// since neither is visible from the world record itself.
#[derive(Debug, Clone, PartialEq)]
pub struct World {
    pub form_id: FormId,
    pub editor_id: String,
    pub flags: RecordFlags,
    pub full_name: Option<LocalizedText>,
    /// World this one inherits land and water from.
    pub parent: Option<FormId>,
}

impl Esm4Record for World {
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
        let parent = record::find(sub_records, WNAM)
            .map(|w| w.form_id_at(0, ctx.form_ids))
            .transpose()?
            .filter(|id| !id.is_null());

        Ok(World {
            form_id: header.form_id,
            editor_id: editor_id_of(sub_records),
            flags: header.flags,
            full_name: full_name_of(sub_records, ctx.localized)?,
            parent,
        })
    }
}

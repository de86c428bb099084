//! Placed references (REFR, ACHR, ACRE).

use crate::esm4::format::record;
use crate::esm4::types::error::Result;
use crate::esm4::types::formid::FormId;
use crate::esm4::types::models::{RecordFlags, RecordHeader, RecordType, SubRecord};

use super::{editor_id_of, DecodeContext, Esm4Record};

const NAME: &[u8; 4] = b"NAME";
const DATA: &[u8; 4] = b"DATA";
const XTEL: &[u8; 4] = b"XTEL";
const XSCL: &[u8; 4] = b"XSCL";

/// Position and rotation (radians) of a placed object.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Placement {
    pub position: [f32; 3],
    pub rotation: [f32; 3],
}

impl Placement {
    fn decode(sub: &SubRecord, offset: usize) -> Result<Self> {
        let mut values = [0f32; 6];
        for (i, value) in values.iter_mut().enumerate() {
            *value = sub.f32_at(offset + i * 4)?;
        }
        Ok(Placement {
            position: [values[0], values[1], values[2]],
            rotation: [values[3], values[4], values[5]],
        })
    }
}

/// Where a door-like reference leads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Teleport {
    /// The reference on the far side of the portal.
    pub destination_door: FormId,
    pub placement: Placement,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub form_id: FormId,
    pub editor_id: String,
    pub flags: RecordFlags,
    pub record_type: RecordType,
    /// The base object this reference places.
    pub base: FormId,
    pub placement: Option<Placement>,
    pub scale: Option<f32>,
    pub teleport: Option<Teleport>,
    /// The cell whose children group held the reference.
    pub cell: Option<FormId>,
}

impl Reference {
    pub fn is_portal(&self) -> bool {
        self.teleport.is_some()
    }
}

impl Esm4Record for Reference {
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
        let base = match record::find(sub_records, NAME) {
            Some(name) => name.form_id_at(0, ctx.form_ids)?,
            None => FormId::NULL,
        };
        let placement = record::find(sub_records, DATA)
            .map(|data| Placement::decode(data, 0))
            .transpose()?;
        let scale = record::find(sub_records, XSCL)
            .map(|xscl| xscl.f32_at(0))
            .transpose()?;
        let teleport = match record::find(sub_records, XTEL) {
            Some(xtel) => Some(Teleport {
                destination_door: xtel.form_id_at(0, ctx.form_ids)?,
                placement: Placement::decode(xtel, 4)?,
            }),
            None => None,
        };

        Ok(Reference {
            form_id: header.form_id,
            editor_id: editor_id_of(sub_records),
            flags: header.flags,
            record_type: header.record_type,
            base,
            placement,
            scale,
            teleport,
            cell: ctx.cell,
        })
    }
}

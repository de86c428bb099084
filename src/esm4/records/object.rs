//! Base objects and every other kind kept as an opaque payload.

use crate::esm4::format::record;
use crate::esm4::types::error::Result;
use crate::esm4::types::formid::FormId;
use crate::esm4::types::models::{RecordFlags, RecordHeader, RecordType, SubRecord};

use super::{editor_id_of, full_name_of, DecodeContext, Esm4Record, LocalizedText};

const MODL: &[u8; 4] = b"MODL";

/// A record whose field layout this crate does not interpret.
///
/// The alias, display name and model path are lifted out because every
/// consumer wants them; the rest stays as raw sub-records for the
/// kind-specific parsers downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseObject {
    pub form_id: FormId,
    pub editor_id: String,
    pub flags: RecordFlags,
    pub record_type: RecordType,
    pub full_name: Option<LocalizedText>,
    pub model: Option<String>,
    pub sub_records: Vec<SubRecord>,
}

impl BaseObject {
    pub fn sub_record(&self, tag: &[u8; 4]) -> Option<&SubRecord> {
        record::find(&self.sub_records, tag)
    }
}

impl Esm4Record for BaseObject {
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
        Ok(BaseObject {
            form_id: header.form_id,
            editor_id: editor_id_of(sub_records),
            flags: header.flags,
            record_type: header.record_type,
            full_name: full_name_of(sub_records, ctx.localized)?,
            model: record::find(sub_records, MODL).map(|m| m.zstring()),
            sub_records: sub_records.to_vec(),
        })
    }
}

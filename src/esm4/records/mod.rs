//! Typed records and the capability every stored kind implements.
//!
//! Each kind is plain data plus a `decode` function. The group walker
//! dispatches on [`AnyRecord`], a closed sum over the kinds below, instead
//! of downcasting.

pub mod cell;
pub mod object;
pub mod reference;
pub mod world;

use std::fmt;

pub use cell::Cell;
pub use object::BaseObject;
pub use reference::{Placement, Reference, Teleport};
pub use world::World;

use crate::esm4::types::error::{Esm4Error, Result};
use crate::esm4::types::formid::{FormId, FormIdMap};
use crate::esm4::types::models::{RecordFlags, RecordHeader, RecordType, SubRecord};

pub(crate) const EDID: &[u8; 4] = b"EDID";
pub(crate) const FULL: &[u8; 4] = b"FULL";

/// What a decoder may consult besides the record's own bytes.
#[derive(Debug, Clone, Copy)]
pub struct DecodeContext<'a> {
    pub form_ids: &'a FormIdMap,
    /// Text fields are string-table ids rather than inline strings.
    pub localized: bool,
    /// The cell whose children group encloses the record, if any.
    pub cell: Option<FormId>,
}

/// The capability a record kind needs to live in a [`RecordStore`](crate::esm4::store::RecordStore).
pub trait Esm4Record: Clone + fmt::Debug {
    fn form_id(&self) -> FormId;

    /// The editor alias. Empty for anonymous records.
    fn editor_id(&self) -> &str;

    fn flags(&self) -> RecordFlags;

    fn decode(header: &RecordHeader, sub_records: &[SubRecord], ctx: &DecodeContext) -> Result<Self>;

    fn is_deleted(&self) -> bool {
        self.flags().is_deleted()
    }
}

/// A display name: inline text, or an id into the string tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalizedText {
    Text(String),
    StringId(u32),
}

impl LocalizedText {
    pub(crate) fn decode(sub: &SubRecord, localized: bool) -> Result<Self> {
        if localized {
            Ok(LocalizedText::StringId(sub.u32_at(0)?))
        } else {
            Ok(LocalizedText::Text(sub.zstring()))
        }
    }
}

impl fmt::Display for LocalizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalizedText::Text(text) => f.write_str(text),
            LocalizedText::StringId(id) => write!(f, "<string {:08X}>", id),
        }
    }
}

pub(crate) fn editor_id_of(sub_records: &[SubRecord]) -> String {
    sub_records
        .iter()
        .find(|s| s.is(EDID))
        .map(|s| s.zstring())
        .unwrap_or_default()
}

pub(crate) fn full_name_of(sub_records: &[SubRecord], localized: bool) -> Result<Option<LocalizedText>> {
    sub_records
        .iter()
        .find(|s| s.is(FULL))
        .map(|s| LocalizedText::decode(s, localized))
        .transpose()
}

/// One decoded record of any stored kind.
#[derive(Debug, Clone)]
pub enum AnyRecord {
    Cell(Cell),
    World(World),
    Reference(Reference),
    Object(BaseObject),
}

impl AnyRecord {
    /// Decodes a record by dispatching on its type.
    ///
    /// # Errors
    /// The file header type never appears past the start of a file, and
    /// unknown kinds must be skipped by the caller before decoding.
    pub fn decode(header: &RecordHeader, sub_records: &[SubRecord], ctx: &DecodeContext) -> Result<Self> {
        use RecordType as RT;
        match header.record_type {
            RT::Cell => Ok(AnyRecord::Cell(Cell::decode(header, sub_records, ctx)?)),
            RT::Wrld => Ok(AnyRecord::World(World::decode(header, sub_records, ctx)?)),
            RT::Refr | RT::Achr | RT::Acre => {
                Ok(AnyRecord::Reference(Reference::decode(header, sub_records, ctx)?))
            }
            RT::Acti | RT::Alch | RT::Ammo | RT::Armo | RT::Book
            | RT::Clot | RT::Cont | RT::Crea | RT::Dial | RT::Door
            | RT::Flor | RT::Furn | RT::Gras | RT::Idlm | RT::Info
            | RT::Ingr | RT::Keym | RT::Land | RT::Ligh | RT::Ltex
            | RT::Lvlc | RT::Lvli | RT::Lvln | RT::Misc | RT::Mstt
            | RT::Navm | RT::Note | RT::Npc | RT::Pgrd | RT::Regn
            | RT::Road | RT::Scol | RT::Scpt | RT::Sgst | RT::Slgm
            | RT::Soun | RT::Stat | RT::Tact | RT::Term | RT::Tree
            | RT::Txst | RT::Weap => {
                Ok(AnyRecord::Object(BaseObject::decode(header, sub_records, ctx)?))
            }
            RT::Tes4 => Err(Esm4Error::InvalidFormat(format!(
                "Unexpected file header record {}",
                header.form_id
            ))),
            RT::Unknown(tag) => Err(Esm4Error::InvalidFormat(format!(
                "Cannot decode record of unknown type {}",
                RecordType::Unknown(tag)
            ))),
        }
    }

    pub fn form_id(&self) -> FormId {
        match self {
            AnyRecord::Cell(r) => r.form_id(),
            AnyRecord::World(r) => r.form_id(),
            AnyRecord::Reference(r) => r.form_id(),
            AnyRecord::Object(r) => r.form_id(),
        }
    }

    pub fn editor_id(&self) -> &str {
        match self {
            AnyRecord::Cell(r) => r.editor_id(),
            AnyRecord::World(r) => r.editor_id(),
            AnyRecord::Reference(r) => r.editor_id(),
            AnyRecord::Object(r) => r.editor_id(),
        }
    }

    pub fn is_deleted(&self) -> bool {
        match self {
            AnyRecord::Cell(r) => r.is_deleted(),
            AnyRecord::World(r) => r.is_deleted(),
            AnyRecord::Reference(r) => r.is_deleted(),
            AnyRecord::Object(r) => r.is_deleted(),
        }
    }
}

//! Core data structures for ESM4 format components.
//!
//! This module defines the fundamental types used throughout the library:
//! - Format versions and header widths
//! - Record and group headers
//! - Record-type and group-category enumerations

use std::fmt;

use super::error::{Esm4Error, Result};
use super::formid::FormId;

/// Width of record and group headers.
///
/// The oldest titles use a 20-byte header. Later ones append a four-byte
/// form-version/unknown field, giving 24 bytes. The two layouts are
/// otherwise identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderWidth {
    Short,
    Long,
}

impl HeaderWidth {
    /// Returns the byte size of a record or group header.
    pub fn header_size(&self) -> u64 {
        match self {
            HeaderWidth::Short => 20,
            HeaderWidth::Long => 24,
        }
    }

    /// Returns the width expected for a declared format version.
    ///
    /// `1.0` appears in both layouts, so `None` means "ambiguous".
    pub fn expected_for(version: f32) -> Option<HeaderWidth> {
        const EPS: f32 = 0.001;
        if (version - 0.8).abs() < EPS {
            Some(HeaderWidth::Short)
        } else if (version - 0.94).abs() < EPS
            || (version - 0.95).abs() < EPS
            || (version - 1.7).abs() < EPS
        {
            Some(HeaderWidth::Long)
        } else {
            None
        }
    }
}

/// Flag bits carried by every record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct RecordFlags(pub u32);

impl RecordFlags {
    /// On the file header record: the file is a master.
    pub const MASTER: u32 = 0x0000_0001;
    pub const DELETED: u32 = 0x0000_0020;
    /// On the file header record: text fields are string-table ids.
    pub const LOCALIZED: u32 = 0x0000_0080;
    pub const INITIALLY_DISABLED: u32 = 0x0000_0800;
    pub const IGNORED: u32 = 0x0000_1000;
    pub const VISIBLE_WHEN_DISTANT: u32 = 0x0000_8000;
    pub const COMPRESSED: u32 = 0x0004_0000;

    pub fn contains(&self, bit: u32) -> bool {
        self.0 & bit != 0
    }

    pub fn is_deleted(&self) -> bool {
        self.contains(Self::DELETED)
    }

    pub fn is_compressed(&self) -> bool {
        self.contains(Self::COMPRESSED)
    }
}

/// Formats a four-character code, failing on non-printable bytes.
pub fn tag_to_string(tag: &[u8; 4]) -> Result<String> {
    if tag.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        Ok(tag.iter().map(|&b| b as char).collect())
    } else {
        Err(Esm4Error::InvalidTag(*tag))
    }
}

macro_rules! record_types {
    ($($variant:ident => $code:literal),+ $(,)?) => {
        /// The closed set of record kinds this crate knows by name.
        ///
        /// Anything else is carried as [`RecordType::Unknown`] so that
        /// ingestion can log and skip it.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum RecordType {
            $($variant,)+
            Unknown([u8; 4]),
        }

        impl RecordType {
            pub fn from_tag(tag: [u8; 4]) -> Self {
                match &tag {
                    $($code => RecordType::$variant,)+
                    _ => RecordType::Unknown(tag),
                }
            }

            pub fn tag(&self) -> [u8; 4] {
                match self {
                    $(RecordType::$variant => *$code,)+
                    RecordType::Unknown(tag) => *tag,
                }
            }
        }
    };
}

record_types! {
    Tes4 => b"TES4",
    Acti => b"ACTI",
    Achr => b"ACHR",
    Acre => b"ACRE",
    Alch => b"ALCH",
    Ammo => b"AMMO",
    Armo => b"ARMO",
    Book => b"BOOK",
    Cell => b"CELL",
    Clot => b"CLOT",
    Cont => b"CONT",
    Crea => b"CREA",
    Dial => b"DIAL",
    Door => b"DOOR",
    Flor => b"FLOR",
    Furn => b"FURN",
    Gras => b"GRAS",
    Idlm => b"IDLM",
    Info => b"INFO",
    Ingr => b"INGR",
    Keym => b"KEYM",
    Land => b"LAND",
    Ligh => b"LIGH",
    Ltex => b"LTEX",
    Lvlc => b"LVLC",
    Lvli => b"LVLI",
    Lvln => b"LVLN",
    Misc => b"MISC",
    Mstt => b"MSTT",
    Navm => b"NAVM",
    Note => b"NOTE",
    Npc => b"NPC_",
    Pgrd => b"PGRD",
    Refr => b"REFR",
    Regn => b"REGN",
    Road => b"ROAD",
    Scol => b"SCOL",
    Scpt => b"SCPT",
    Sgst => b"SGST",
    Slgm => b"SLGM",
    Soun => b"SOUN",
    Stat => b"STAT",
    Tact => b"TACT",
    Term => b"TERM",
    Tree => b"TREE",
    Txst => b"TXST",
    Weap => b"WEAP",
    Wrld => b"WRLD",
}

impl RecordType {
    /// The default allow-list of kinds whose top-level groups are walked.
    pub fn eager_default() -> Vec<RecordType> {
        use RecordType::*;
        vec![
            Wrld, Cell, Acti, Alch, Ammo, Armo, Book, Clot, Cont, Crea, Door, Flor, Furn, Gras,
            Idlm, Ingr, Keym, Ligh, Ltex, Lvlc, Lvli, Lvln, Misc, Mstt, Note, Npc, Scol, Sgst, Slgm,
            Soun, Stat, Tact, Term, Tree, Txst, Weap,
        ]
    }

    /// Placed instances of a base object; these live in cell children.
    pub fn is_reference(&self) -> bool {
        matches!(self, RecordType::Refr | RecordType::Achr | RecordType::Acre)
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.tag();
        match tag_to_string(&tag) {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "{:02x?}", tag),
        }
    }
}

/// Group categories, numbered as they appear on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupType {
    /// Label is a record type.
    Top,
    /// Label is the parent world.
    WorldChildren,
    /// Label is a block number.
    InteriorCellBlock,
    /// Label is a sub-block number.
    InteriorCellSubBlock,
    /// Label is a block grid.
    ExteriorCellBlock,
    /// Label is a sub-block grid.
    ExteriorCellSubBlock,
    /// Label is the parent cell.
    CellChildren,
    /// Label is the parent dialogue topic.
    TopicChildren,
    CellPersistentChildren,
    CellTemporaryChildren,
    CellVisibleDistantChildren,
}

impl GroupType {
    pub fn from_raw(raw: i32) -> Option<Self> {
        Some(match raw {
            0 => GroupType::Top,
            1 => GroupType::WorldChildren,
            2 => GroupType::InteriorCellBlock,
            3 => GroupType::InteriorCellSubBlock,
            4 => GroupType::ExteriorCellBlock,
            5 => GroupType::ExteriorCellSubBlock,
            6 => GroupType::CellChildren,
            7 => GroupType::TopicChildren,
            8 => GroupType::CellPersistentChildren,
            9 => GroupType::CellTemporaryChildren,
            10 => GroupType::CellVisibleDistantChildren,
            _ => return None,
        })
    }

    pub fn raw(&self) -> i32 {
        match self {
            GroupType::Top => 0,
            GroupType::WorldChildren => 1,
            GroupType::InteriorCellBlock => 2,
            GroupType::InteriorCellSubBlock => 3,
            GroupType::ExteriorCellBlock => 4,
            GroupType::ExteriorCellSubBlock => 5,
            GroupType::CellChildren => 6,
            GroupType::TopicChildren => 7,
            GroupType::CellPersistentChildren => 8,
            GroupType::CellTemporaryChildren => 9,
            GroupType::CellVisibleDistantChildren => 10,
        }
    }

    /// Children groups whose contents can be read later from a snapshot.
    pub fn is_deferrable(&self) -> bool {
        matches!(
            self,
            GroupType::CellTemporaryChildren | GroupType::CellVisibleDistantChildren
        )
    }
}

/// Exterior grid coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Grid {
    pub x: i32,
    pub y: i32,
}

impl Grid {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Sub-block a cell at this coordinate is filed under (8x8 cells).
    pub fn sub_block(&self) -> Grid {
        Grid::new(self.x.div_euclid(8), self.y.div_euclid(8))
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// The four label bytes of a group header.
///
/// Their meaning depends on the [`GroupType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupLabel(pub [u8; 4]);

impl GroupLabel {
    pub fn as_record_type(&self) -> RecordType {
        RecordType::from_tag(self.0)
    }

    /// Raw (unadjusted) identifier for world, cell and topic children.
    pub fn as_raw_form_id(&self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    /// Exterior block grids are stored as `(y: i16, x: i16)`.
    pub fn as_grid(&self) -> Grid {
        let y = i16::from_le_bytes([self.0[0], self.0[1]]);
        let x = i16::from_le_bytes([self.0[2], self.0[3]]);
        Grid::new(x as i32, y as i32)
    }
}

/// A parsed record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub record_type: RecordType,
    pub data_size: u32,
    pub flags: RecordFlags,
    /// Identifier after adjustment to the global load order.
    pub form_id: FormId,
    pub version_control: u32,
    /// Present only with [`HeaderWidth::Long`].
    pub form_version: Option<u16>,
}

/// A parsed group header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupHeader {
    /// Total size including the header itself.
    pub group_size: u32,
    pub label: GroupLabel,
    pub group_type: GroupType,
    pub stamp: u32,
}

/// One entry of the group stack: the header and where its bytes lie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupFrame {
    pub header: GroupHeader,
    /// Offset of the group header.
    pub start: u64,
    /// Offset one past the group's last byte.
    pub end: u64,
}

/// A typed field inside a record's data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubRecord {
    pub tag: [u8; 4],
    pub data: Vec<u8>,
}

impl SubRecord {
    pub fn is(&self, tag: &[u8; 4]) -> bool {
        &self.tag == tag
    }
}

/// Metadata from a file's leading TES4 record.
#[derive(Debug, Clone)]
pub struct FileHeader {
    pub version: f32,
    pub header_width: HeaderWidth,
    pub flags: RecordFlags,
    pub num_records: i32,
    pub next_object_id: u32,
    pub author: Option<String>,
    pub description: Option<String>,
    /// Master file names in declaration order.
    pub masters: Vec<String>,
}

impl FileHeader {
    pub fn is_master(&self) -> bool {
        self.flags.contains(RecordFlags::MASTER)
    }

    pub fn is_localized(&self) -> bool {
        self.flags.contains(RecordFlags::LOCALIZED)
    }
}

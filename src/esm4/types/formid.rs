//! Record identifiers and their per-file adjustment.

use std::fmt;
use std::str::FromStr;

use super::error::{Esm4Error, Result};

/// A 32-bit record identifier.
///
/// The high byte is the load-order index of the file that introduced the
/// record, the low 24 bits are a per-file sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FormId(pub u32);

impl FormId {
    /// The null reference used by sub-records that point at nothing.
    pub const NULL: FormId = FormId(0);

    /// File index reserved for records created after ingestion.
    pub const RUNTIME_FILE_INDEX: u8 = 0xFF;

    const SEQUENCE_MASK: u32 = 0x00FF_FFFF;

    pub fn new(file_index: u8, sequence: u32) -> Self {
        FormId(((file_index as u32) << 24) | (sequence & Self::SEQUENCE_MASK))
    }

    pub fn file_index(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub fn sequence(&self) -> u32 {
        self.0 & Self::SEQUENCE_MASK
    }

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    pub fn with_file_index(&self, file_index: u8) -> Self {
        FormId::new(file_index, self.sequence())
    }
}

impl fmt::Display for FormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}

impl FromStr for FormId {
    type Err = Esm4Error;

    /// Parses the eight hex digit form, with or without a `0x` prefix.
    fn from_str(s: &str) -> Result<Self> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if digits.is_empty() || digits.len() > 8 {
            return Err(Esm4Error::InvalidFormat(format!("Invalid FormId '{}'", s)));
        }
        u32::from_str_radix(digits, 16)
            .map(FormId)
            .map_err(|e| Esm4Error::InvalidFormat(format!("Invalid FormId '{}': {}", s, e)))
    }
}

impl From<u32> for FormId {
    fn from(raw: u32) -> Self {
        FormId(raw)
    }
}

/// Rewrites identifiers read from one file into global load-order terms.
///
/// A plugin numbers its masters `0..n` in the order its header lists them
/// and numbers its own records with index `n`. Neither matches the global
/// load order in general, so every identifier read from the file passes
/// through [`FormIdMap::adjust`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormIdMap {
    /// Global index of each declared master, in declaration order.
    parent_indices: Vec<u8>,
    /// Global index of the file itself.
    own_index: u8,
}

impl FormIdMap {
    pub fn new(parent_indices: Vec<u8>, own_index: u8) -> Self {
        Self {
            parent_indices,
            own_index,
        }
    }

    /// Map for a file without masters loaded at `own_index`.
    pub fn standalone(own_index: u8) -> Self {
        Self::new(Vec::new(), own_index)
    }

    pub fn own_index(&self) -> u8 {
        self.own_index
    }

    pub fn parent_indices(&self) -> &[u8] {
        &self.parent_indices
    }

    /// Substitutes the global file index for the local one.
    ///
    /// A local index that names a declared master resolves to that master's
    /// global index. Any other local index belongs to the file itself. The
    /// null identifier is left untouched.
    pub fn adjust(&self, raw: u32) -> FormId {
        let id = FormId(raw);
        if id.is_null() {
            return id;
        }
        let local = id.file_index() as usize;
        match self.parent_indices.get(local) {
            Some(&global) => id.with_file_index(global),
            None => id.with_file_index(self.own_index),
        }
    }
}

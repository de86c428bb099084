//! Sub-record parsing inside a record's (decompressed) data.
//!
//! # Sub-record Structure
//! ```text
//! [4 bytes] Type
//! [2 bytes] Data size
//! [N bytes] Data
//! ```
//!
//! A size too large for the u16 field is announced by a preceding `XXXX`
//! sub-record whose 4-byte payload is the real size of the next one, which
//! then carries a zero size field.

use byteorder::{LittleEndian, ReadBytesExt};
use log::trace;

use crate::esm4::codec::strings;
use crate::esm4::types::error::{Esm4Error, Result};
use crate::esm4::types::formid::{FormId, FormIdMap};
use crate::esm4::types::models::SubRecord;

const LARGE_SIZE_TAG: [u8; 4] = *b"XXXX";

/// Splits record data into its sub-records.
pub fn parse_sub_records(data: &[u8]) -> Result<Vec<SubRecord>> {
    let mut reader = data;
    let mut sub_records = Vec::new();
    let mut pending_size: Option<u32> = None;

    while !reader.is_empty() {
        if reader.len() < 6 {
            return Err(Esm4Error::InvalidFormat(format!(
                "Truncated sub-record header ({} bytes left)",
                reader.len()
            )));
        }
        let mut tag = [0u8; 4];
        tag.copy_from_slice(&reader[..4]);
        reader = &reader[4..];
        let declared = reader.read_u16::<LittleEndian>()? as u32;
        let size = pending_size.take().unwrap_or(declared) as usize;

        if reader.len() < size {
            return Err(Esm4Error::SizeMismatch {
                context: "sub-record data",
                expected: size as u64,
                found: reader.len() as u64,
            });
        }
        let (body, rest) = reader.split_at(size);
        reader = rest;

        if tag == LARGE_SIZE_TAG {
            let mut body = body;
            pending_size = Some(body.read_u32::<LittleEndian>()?);
            continue;
        }

        trace!("Sub-record {:?}: {} bytes", String::from_utf8_lossy(&tag), size);
        sub_records.push(SubRecord {
            tag,
            data: body.to_vec(),
        });
    }

    Ok(sub_records)
}

/// Finds the first sub-record with the given tag.
pub fn find<'a>(sub_records: &'a [SubRecord], tag: &[u8; 4]) -> Option<&'a SubRecord> {
    sub_records.iter().find(|s| s.is(tag))
}

impl SubRecord {
    fn slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.data.get(offset..offset + len).ok_or_else(|| {
            Esm4Error::InvalidFormat(format!(
                "Sub-record {} too short: need {} bytes at offset {}, have {}",
                String::from_utf8_lossy(&self.tag),
                len,
                offset,
                self.data.len()
            ))
        })
    }

    pub fn u8_at(&self, offset: usize) -> Result<u8> {
        Ok(self.slice(offset, 1)?[0])
    }

    pub fn u16_at(&self, offset: usize) -> Result<u16> {
        Ok(self.slice(offset, 2)?.read_u16::<LittleEndian>()?)
    }

    pub fn u32_at(&self, offset: usize) -> Result<u32> {
        Ok(self.slice(offset, 4)?.read_u32::<LittleEndian>()?)
    }

    pub fn i32_at(&self, offset: usize) -> Result<i32> {
        Ok(self.slice(offset, 4)?.read_i32::<LittleEndian>()?)
    }

    pub fn f32_at(&self, offset: usize) -> Result<f32> {
        Ok(self.slice(offset, 4)?.read_f32::<LittleEndian>()?)
    }

    pub fn form_id_at(&self, offset: usize, ids: &FormIdMap) -> Result<FormId> {
        Ok(ids.adjust(self.u32_at(offset)?))
    }

    pub fn zstring(&self) -> String {
        strings::decode_zstring(&self.data)
    }
}

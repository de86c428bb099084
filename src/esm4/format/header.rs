//! Content file header parsing.
//!
//! Every content file opens with a single `TES4` record. Its sub-records
//! carry the format version, authoring metadata and the list of master
//! files the plugin depends on.

use std::io::{Read, Seek};

use log::{debug, info, warn};

use crate::esm4::reader::Esm4Reader;
use crate::esm4::types::error::{Esm4Error, Result};
use crate::esm4::types::models::{FileHeader, HeaderWidth, RecordType};

use super::record;

const FILE_HEADER_TAG: [u8; 4] = *b"TES4";
const HEDR: &[u8; 4] = b"HEDR";
const CNAM: &[u8; 4] = b"CNAM";
const SNAM: &[u8; 4] = b"SNAM";
const MAST: &[u8; 4] = b"MAST";

/// Parses the file header from the beginning of the file.
///
/// # Header Width Detection
/// The `TES4` record header is either 20 or 24 bytes. The first sub-record
/// is always `HEDR`, so peeking for it right after the 20-byte prefix tells
/// the two layouts apart. The detected width is stored on the reader and
/// governs every later record and group header of the file.
///
/// # Errors
/// Fails if the file does not start with `TES4`, lacks `HEDR`, or declares
/// a version this crate does not understand.
pub fn parse<R: Read + Seek>(reader: &mut Esm4Reader<R>) -> Result<FileHeader> {
    info!("Parsing file header");

    // Step 1: Detect header width
    reader.skip_to(0)?;
    let tag = reader.read_tag()?;
    if tag != FILE_HEADER_TAG {
        return Err(Esm4Error::InvalidFormat(format!(
            "File does not start with a TES4 record (found {:02x?})",
            tag
        )));
    }
    reader.skip_bytes(16)?;
    let width = if reader.peek_tag()?.as_ref() == Some(HEDR) {
        HeaderWidth::Short
    } else {
        HeaderWidth::Long
    };
    debug!("Header width: {} bytes", width.header_size());
    reader.set_header_width(width);

    // Step 2: Read the record under the detected width
    reader.skip_to(0)?;
    let header = reader.read_record_header()?;
    debug_assert_eq!(header.record_type, RecordType::Tes4);
    let data = reader.read_record_data(&header)?;
    let sub_records = record::parse_sub_records(&data)?;

    // Step 3: Version
    let hedr = record::find(&sub_records, HEDR)
        .ok_or_else(|| Esm4Error::InvalidFormat("File header has no HEDR".to_string()))?;
    let version = hedr.f32_at(0)?;
    let num_records = hedr.i32_at(4)?;
    let next_object_id = hedr.u32_at(8)?;
    if !(0.0..2.0).contains(&version) {
        return Err(Esm4Error::UnsupportedVersion(version));
    }
    match HeaderWidth::expected_for(version) {
        Some(expected) if expected != width => warn!(
            "Format version {} normally uses {}-byte headers, file has {}-byte headers",
            version,
            expected.header_size(),
            width.header_size()
        ),
        _ => {}
    }

    // Step 4: Metadata and masters
    let mut author = None;
    let mut description = None;
    let mut masters = Vec::new();
    for sub in &sub_records {
        match &sub.tag {
            CNAM => author = Some(sub.zstring()),
            SNAM => description = Some(sub.zstring()),
            MAST => masters.push(sub.zstring()),
            _ => {}
        }
    }

    info!(
        "File header parsed: version={}, records={}, masters={:?}",
        version, num_records, masters
    );

    Ok(FileHeader {
        version,
        header_width: width,
        flags: header.flags,
        num_records,
        next_object_id,
        author,
        description,
        masters,
    })
}

//! Decompression of compressed record payloads.
//!
//! A record whose header carries the compressed flag stores its data as:
//! - 4 bytes: decompressed size (little-endian u32)
//! - N bytes: zlib stream

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};
use flate2::read::ZlibDecoder;
use log::trace;

use crate::esm4::types::error::{Esm4Error, Result};

/// Upper bound on the up-front allocation, as a multiple of the stream length.
const MAX_RESERVE_RATIO: u64 = 16;

/// Inflates a compressed record payload into a pre-allocated output buffer.
///
/// # Validation
/// Verifies that the stream produces exactly the declared number of bytes.
///
/// # Errors
/// Returns an error if the size prefix is missing, the stream is corrupt,
/// or the inflated size differs from the prefix.
pub fn decompress_record_into(output: &mut Vec<u8>, payload: &[u8]) -> Result<()> {
    let mut reader = payload;
    let expected_size = reader.read_u32::<LittleEndian>().map_err(|_| {
        Esm4Error::Decompression("Compressed record is missing its size prefix".to_string())
    })? as u64;

    trace!(
        "Inflating record: {} bytes -> {} bytes (expected)",
        reader.len(),
        expected_size
    );

    // The prefix is untrusted; inflating stops one byte past it.
    output.clear();
    output.reserve(expected_size.min(reader.len() as u64 * MAX_RESERVE_RATIO) as usize);
    let mut decoder = ZlibDecoder::new(reader).take(expected_size + 1);
    decoder
        .read_to_end(output)
        .map_err(|e| Esm4Error::Decompression(format!("Zlib decompression failed: {}", e)))?;

    if output.len() as u64 != expected_size {
        return Err(Esm4Error::SizeMismatch {
            context: "inflated record",
            expected: expected_size,
            found: output.len() as u64,
        });
    }

    Ok(())
}

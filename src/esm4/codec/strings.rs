//! Text decoding for sub-record strings.

use encoding_rs::WINDOWS_1252;

/// Decodes a zero-terminated string.
///
/// Content files store text in Windows-1252. Bytes after the first NUL are
/// ignored; a missing terminator is tolerated.
pub fn decode_zstring(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let (text, _, _) = WINDOWS_1252.decode(&bytes[..end]);
    text.into_owned()
}

/// Compares file names the way the games do: ASCII case-insensitive.
pub fn same_file_name(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

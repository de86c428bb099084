//! Codec layer for the byte-level transformations inside records.
//!
//! # Submodules
//!
//! - [`compression`][]: Inflating compressed record data (zlib)
//! - [`strings`][]: Decoding zero-terminated Windows-1252 text

pub mod compression;
pub mod strings;

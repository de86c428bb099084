//! File format parsing layer for content files.
//!
//! # Module Organization
//!
//! - [`header`]: Parses the leading `TES4` record (version, masters)
//! - [`record`]: Splits record data into typed sub-records
//!
//! # Architecture
//!
//! ```text
//! File Structure:
//! ┌─────────────────┐
//! │  TES4 record    │ ← header::parse()
//! ├─────────────────┤
//! │  GRUP (top)     │ ← groups::GroupWalker
//! │   ├ record      │ ← record::parse_sub_records()
//! │   └ GRUP ...    │
//! ├─────────────────┤
//! │  GRUP (top) ... │
//! └─────────────────┘
//! ```

pub mod header;
pub mod record;

//! Foundational data structures, error types, and identifiers.

pub mod diagnostics;
pub mod error;
pub mod formid;
pub mod models;

//! Shared primitive types used across the crate.

/// Name of a reporting region, e.g. "DMV" or "California South".
pub type RegionName = String;

/// Stable row identifier in the record store.
pub type RowId = i64;

/// The canonical run identifier.
pub type RunId = String;

//! Pagination module
//!
//! Supports: timestamp-filtered list endpoints, property-filtered search endpoints
//!
//! # Overview
//!
//! The API offers two crude read primitives: a cursor-paginated list filtered
//! by creation/update time, and a search with property filters but no stable
//! cursor. [`Pagination`] hides the difference behind one snapshot fetch and
//! one change fetch, and is chosen once per resource from the registry.

mod strategies;
mod types;

pub use strategies::{SearchPaged, TimestampPaged};
pub use types::{Cursor, ItemFields, Page, Pagination, SnapshotQuery};

#[cfg(test)]
mod tests;

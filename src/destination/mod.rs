//! Destination side of the connector
//!
//! Applies change records to HubSpot: snapshot and create records create
//! items, updates patch the item named by the record key, deletes remove it.

mod writer;

pub use writer::{key_value, Destination, RecordWriter, Writer};

#[cfg(test)]
mod tests;

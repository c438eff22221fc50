//! # HubSpot Connector
//!
//! Snapshot and change-data-capture connector for the HubSpot API.
//!
//! A source walks every existing item of one resource as of a fixed instant,
//! then polls for items changed after a watermark and classifies each change
//! as a create, update or delete. Every record carries an opaque position the
//! host hands back to resume after a restart. A destination applies such
//! records back to HubSpot.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hubspot_connector::config::ConnectorConfig;
//! use hubspot_connector::hubspot::ResourceRegistry;
//! use hubspot_connector::iterator::CancelToken;
//! use hubspot_connector::source::Source;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> hubspot_connector::Result<()> {
//!     let config = ConnectorConfig::new("pat-...", "crm.contacts");
//!     let registry = Arc::new(ResourceRegistry::hubspot());
//!
//!     let cancel = CancelToken::never();
//!     let mut source = Source::connect(&config, b"", registry, &cancel).await?;
//!     while let Some(record) = source.read(&cancel).await? {
//!         println!("{:?} {:?}", record.operation, record.key);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │            Source (open / read / ack / teardown)             │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │
//! ┌──────────────────────────────┴───────────────────────────────┐
//! │          Combined: Snapshot ──(exhausted)──▶ CDC             │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │
//! ┌───────────────┬──────────────┴──┬───────────────────────────┐
//! │  Pagination   │  HubSpot client │   Resource registry       │
//! ├───────────────┼─────────────────┼───────────────────────────┤
//! │ Timestamp     │ list / search   │ paths, time fields,       │
//! │ Search        │ create / update │ capability per resource   │
//! │               │ delete          │                           │
//! └───────────────┴─────────────────┴───────────────────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the connector
pub mod error;

/// Common types and type aliases
pub mod types;

/// Connector configuration
pub mod config;

/// HTTP client with retry and rate limiting
pub mod http;

/// HubSpot API client and resource table
pub mod hubspot;

/// Pagination strategies
pub mod pagination;

/// Snapshot, CDC and combined iterators
pub mod iterator;

/// Source host
pub mod source;

/// Destination writer
pub mod destination;

/// Position store for the CLI
pub mod state;

/// Command-line interface
pub mod cli;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

pub use config::ConnectorConfig;
pub use destination::Destination;
pub use source::Source;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

//! Change-capture iterator module
//!
//! - [`Position`]: opaque resume checkpoint
//! - [`Snapshot`]: point-in-time enumeration of a resource
//! - [`Cdc`]: create / update / delete events after a watermark
//! - [`Combined`]: snapshot first, then CDC, behind one interface
//!
//! # Concurrency
//!
//! Each sub-iterator runs one background poll task that pushes records into
//! a bounded queue (capacity = buffer size). The host's task is the only
//! consumer. A full queue pauses polling until the host catches up.

mod cancel;
mod cdc;
mod combined;
mod poller;
mod position;
mod record;
mod snapshot;

pub use cancel::{CancelHandle, CancelToken};
pub use cdc::{classify, Cdc, CdcParams};
pub use combined::{Combined, CombinedParams};
pub use position::{ItemId, Position, PositionMode};
pub use record::{Operation, Record, METADATA_CREATED_AT};
pub use snapshot::{Snapshot, SnapshotParams};

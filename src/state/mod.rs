//! State management module
//!
//! Keeps the last acknowledged [`Position`](crate::iterator::Position) of each
//! resource so a host can resume across runs.
//!
//! - `State` - acknowledged position per resource
//! - `StateManager` - file-based persistence with atomic writes, or in memory

mod manager;
mod types;

pub use manager::StateManager;
pub use types::{ResourceState, State};

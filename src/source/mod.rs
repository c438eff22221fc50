//! Source side of the connector
//!
//! [`Source`] is what a host drives: open it with a config and the last
//! acknowledged position, then read records until shutdown. A read that
//! returns `None` means "nothing yet, back off and ask again".

mod reader;

pub use reader::Source;

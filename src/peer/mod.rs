//! Friend agent discovery and connections
//!
//! Capability cards are resolved once at startup from the configured
//! addresses. Every peer that resolves gets a connection; the resulting
//! registry is read-only for the rest of the process.

pub mod connection;
pub mod directory;
pub mod registry;

pub use connection::*;
pub use directory::*;
pub use registry::*;

//! Rally Host - pickleball scheduling host agent
//!
//! Resolves friend agents from their capability cards, delegates tasks to
//! them with stable correlation ids, and streams a chat model's progress and
//! final answer back to the caller.

pub mod cli;
pub mod config;
pub mod correlation;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod logging;
pub mod peer;
pub mod prompt;
pub mod protocol;
pub mod runtime;
pub mod session;
pub mod tools;
pub mod version;

pub use config::HostConfig;
pub use correlation::{CorrelationState, CorrelationTriple};
pub use dispatch::{Dispatch, DispatchOutcome, Dispatcher};
pub use error::{Error, ErrorCode, Result};
pub use host::{HostAgent, StreamUpdate};
pub use peer::{ConnectionRegistry, PeerConnection, PeerDirectory};

//! Peer protocol
//!
//! Wire types for talking to friend agents: the capability card served at a
//! well-known path, and the JSON-RPC `message/send` exchange whose reply is
//! either a task carrying artifacts or an error envelope.

mod card;
mod jsonrpc;
mod messages;

pub use card::*;
pub use jsonrpc::*;
pub use messages::*;

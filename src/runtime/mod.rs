//! Decision-making runtime
//!
//! A runtime consumes one user turn against a session and reports what it
//! does as an ordered stream of events, the last answering event flagged
//! final. The host only depends on the [`DecisionRuntime`] seam.

mod chat;
mod event;
mod model;

pub use chat::ChatRuntime;
pub use event::{Content, ContentPart, ContentRole, RuntimeEvent};
pub use model::{
    ChatMessage, ChatModel, ChatReply, ChatRequest, FunctionInvocation, FunctionSpec,
    OpenAiChatModel, ToolCall, ToolDefinition,
};

use std::pin::Pin;

use futures_util::Stream;

use crate::error::Result;
use crate::session::SessionHandle;

/// Ordered events of one turn
pub type EventStream = Pin<Box<dyn Stream<Item = Result<RuntimeEvent>> + Send>>;

pub trait DecisionRuntime: Send + Sync {
    /// Feed `message` into `session` as one turn.
    ///
    /// Dropping the stream abandons the turn.
    fn run_turn(&self, session: SessionHandle, message: Content) -> EventStream;
}

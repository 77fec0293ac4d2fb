//! Dispatcher: correlated sends to named peers
//!
//! Looks the peer up, stamps the outbound message with correlation ids,
//! validates the reply and flattens its artifacts into fragments. Transport
//! failures and unusable replies degrade to "no fragments"; only an unknown
//! peer name is a hard error.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::correlation::{CorrelationState, CorrelationTriple};
use crate::error::{Error, Result};
use crate::peer::ConnectionRegistry;
use crate::protocol::{FailureReason, Message, Part, PeerReply, SendMessageRequest};

/// Why a dispatch produced no fragments
#[derive(Debug, Clone, PartialEq)]
pub enum DegradeReason {
    /// The peer could not be reached, or timed out
    Transport(String),
    /// The peer replied, but not with a task
    Rejected(FailureReason),
    /// The reply body was not decodable
    Malformed(String),
}

/// What a single dispatch yielded
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// A task with at least one fragment
    Fragments(Vec<Part>),
    /// A valid task that carried no artifact parts
    EmptyTask,
    /// Nothing usable came back; already logged
    Degraded(DegradeReason),
}

impl DispatchOutcome {
    pub fn into_fragments(self) -> Vec<Part> {
        match self {
            DispatchOutcome::Fragments(parts) => parts,
            DispatchOutcome::EmptyTask | DispatchOutcome::Degraded(_) => Vec::new(),
        }
    }
}

/// Result of [`Dispatcher::send_detailed`]
#[derive(Debug, Clone)]
pub struct Dispatch {
    /// Identifiers stamped on the outbound message
    pub correlation: CorrelationTriple,
    pub outcome: DispatchOutcome,
}

/// Sends tasks to registered peers
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ConnectionRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Send `task` to `peer` and return the reply's fragments in order.
    ///
    /// Fails only with `PeerNotFound`; degraded replies yield an empty list.
    pub async fn send(&self, peer: &str, task: &str, state: &CorrelationState) -> Result<Vec<Part>> {
        Ok(self.send_detailed(peer, task, state).await?.outcome.into_fragments())
    }

    /// Like [`send`](Self::send), but keeps the ids used and distinguishes an
    /// empty task from a degraded exchange.
    pub async fn send_detailed(
        &self,
        peer: &str,
        task: &str,
        state: &CorrelationState,
    ) -> Result<Dispatch> {
        // Unknown names fail before the correlation state is touched
        let connection = self
            .registry
            .get(peer)
            .ok_or_else(|| Error::peer_not_found(peer))?;

        let correlation = state.next();
        let request = SendMessageRequest::new(Message::user_text(task, &correlation));

        info!(
            peer = %peer,
            task_id = %correlation.task_id,
            context_id = %correlation.context_id,
            message_id = %correlation.message_id,
            "Dispatching task to peer"
        );

        let outcome = match connection.send_message(&request).await {
            Ok(PeerReply::Task(task)) => {
                let fragments = task.fragments();
                debug!(
                    peer = %peer,
                    state = ?task.status.state,
                    fragments = fragments.len(),
                    "Peer returned task"
                );
                if fragments.is_empty() {
                    info!(peer = %peer, "Peer task carried no artifacts");
                    DispatchOutcome::EmptyTask
                } else {
                    DispatchOutcome::Fragments(fragments)
                }
            }
            Ok(PeerReply::Failure(FailureReason::Malformed(detail))) => {
                warn!(peer = %peer, detail = %detail, "Received a malformed response, cannot proceed");
                DispatchOutcome::Degraded(DegradeReason::Malformed(detail))
            }
            Ok(PeerReply::Failure(reason)) => {
                warn!(peer = %peer, reason = %reason, "Received a non-success or non-task response, cannot proceed");
                DispatchOutcome::Degraded(DegradeReason::Rejected(reason))
            }
            Err(Error::MalformedResponse { message, .. }) => {
                warn!(peer = %peer, detail = %message, "Received a malformed response, cannot proceed");
                DispatchOutcome::Degraded(DegradeReason::Malformed(message))
            }
            Err(e) if e.is_degradable() => {
                warn!(peer = %peer, error = %e.format_for_log(), "Peer unreachable, continuing without its reply");
                DispatchOutcome::Degraded(DegradeReason::Transport(e.to_string()))
            }
            Err(e) => return Err(e),
        };

        Ok(Dispatch { correlation, outcome })
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

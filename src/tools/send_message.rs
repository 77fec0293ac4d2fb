use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};

use super::{Tool, ToolContext};

const NAME: &str = "send_message";

#[derive(Debug, Deserialize)]
struct Args {
    agent_name: String,
    task: String,
}

/// Delegates a task to a friend agent and returns the parts it sent back
pub struct SendMessageTool {
    dispatcher: Dispatcher,
}

impl SendMessageTool {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl Tool for SendMessageTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Sends a task to a remote friend agent and returns the content parts of its reply. \
         Use the exact agent name from the list of available agents."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "agent_name": {
                    "type": "string",
                    "description": "Official name of the friend agent, e.g. Bob_Agent"
                },
                "task": {
                    "type": "string",
                    "description": "What to ask the friend agent"
                }
            },
            "required": ["agent_name", "task"]
        })
    }

    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        let args: Args =
            serde_json::from_value(args).map_err(|e| Error::tool(NAME, e.to_string()))?;

        let parts = self
            .dispatcher
            .send(&args.agent_name, &args.task, &ctx.correlation)
            .await?;

        Ok(serde_json::to_value(parts)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::correlation::CorrelationState;
    use crate::peer::{ConnectionRegistry, PeerConnection, PeerTransport};
    use crate::protocol::{PeerCard, SendMessageRequest};

    struct Availability;

    #[async_trait]
    impl PeerTransport for Availability {
        async fn send(&self, request: &SendMessageRequest) -> Result<Value> {
            Ok(json!({
                "jsonrpc": "2.0",
                "id": request.id,
                "result": {
                    "kind": "task",
                    "id": request.message().task_id,
                    "contextId": request.message().context_id,
                    "status": {"state": "completed"},
                    "artifacts": [{"artifactId": "a", "parts": [{"kind": "text", "text": "Free all weekend"}]}]
                }
            }))
        }
    }

    fn tool() -> SendMessageTool {
        let connection = PeerConnection::with_transport(
            PeerCard::new("Kaitlynn_Agent", "Kaitlynn", "http://k"),
            "http://k",
            Arc::new(Availability),
        );
        let registry = ConnectionRegistry::from_connections(vec![connection]);
        SendMessageTool::new(Dispatcher::new(Arc::new(registry)))
    }

    fn ctx() -> ToolContext {
        ToolContext {
            session_id: "s".into(),
            correlation: Arc::new(CorrelationState::new()),
        }
    }

    #[tokio::test]
    async fn test_returns_reply_parts() {
        let ctx = ctx();
        let result = tool()
            .call(json!({"agent_name": "Kaitlynn_Agent", "task": "free this weekend?"}), &ctx)
            .await
            .unwrap();

        assert_eq!(result, json!([{"kind": "text", "text": "Free all weekend"}]));
        assert!(ctx.correlation.task_id().is_some());
    }

    #[tokio::test]
    async fn test_unknown_agent_is_an_error() {
        let err = tool()
            .call(json!({"agent_name": "Nobody", "task": "hi"}), &ctx())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Agent Nobody not found");
    }

    #[tokio::test]
    async fn test_missing_arguments() {
        let err = tool().call(json!({"agent_name": "x"}), &ctx()).await.unwrap_err();
        assert!(matches!(err, Error::Tool { .. }));
    }
}

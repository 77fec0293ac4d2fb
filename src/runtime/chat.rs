//! Tool-calling decision loop over a chat model

use std::sync::Arc;

use async_stream::stream;
use futures_util::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::session::SessionHandle;
use crate::tools::{ToolContext, ToolSet};

use super::event::{Content, ContentPart, ContentRole, RuntimeEvent};
use super::model::{ChatMessage, ChatModel, ChatRequest, ToolCall};
use super::{DecisionRuntime, EventStream};

type InstructionFn = dyn Fn() -> String + Send + Sync;

/// Runs rounds of "ask the model, run the tools it asked for" until the
/// model answers in plain text or the round limit is hit.
pub struct ChatRuntime {
    model: Arc<dyn ChatModel>,
    tools: Arc<ToolSet>,
    instruction: Arc<InstructionFn>,
    author: String,
    max_rounds: u32,
}

impl ChatRuntime {
    pub fn new(
        model: Arc<dyn ChatModel>,
        tools: ToolSet,
        author: impl Into<String>,
        max_rounds: u32,
    ) -> Self {
        Self {
            model,
            tools: Arc::new(tools),
            instruction: Arc::new(String::new),
            author: author.into(),
            max_rounds: max_rounds.max(1),
        }
    }

    /// System instruction, rebuilt at the start of every turn
    pub fn with_instruction(mut self, instruction: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.instruction = Arc::new(instruction);
        self
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }
}

impl DecisionRuntime for ChatRuntime {
    fn run_turn(&self, session: SessionHandle, message: Content) -> EventStream {
        let model = self.model.clone();
        let tools = self.tools.clone();
        let instruction = (self.instruction)();
        let author = self.author.clone();
        let max_rounds = self.max_rounds;

        Box::pin(stream! {
            let mut session = session.lock_owned().await;
            let ctx = ToolContext {
                session_id: session.id().to_string(),
                correlation: session.correlation(),
            };
            session.push(message);
            let definitions = tools.definitions();

            for round in 1..=max_rounds {
                let request = ChatRequest {
                    messages: to_messages(&instruction, session.history()),
                    tools: definitions.clone(),
                };
                debug!(round, model = %model.name(), messages = request.messages.len(), "Requesting completion");

                let reply = match model.complete(&request).await {
                    Ok(reply) => reply,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };

                if reply.tool_calls.is_empty() {
                    let content = Content::model_text(reply.content.unwrap_or_default());
                    session.push(content.clone());
                    yield Ok(RuntimeEvent::final_response(&author, Some(content)));
                    return;
                }

                let calls: Vec<(String, String, Result<Value>)> = reply
                    .tool_calls
                    .iter()
                    .map(|call| (call_id(call), call.function.name.clone(), call.arguments()))
                    .collect();
                info!(
                    round,
                    session_id = %ctx.session_id,
                    tools = ?calls.iter().map(|(_, name, _)| name.as_str()).collect::<Vec<_>>(),
                    "Model requested tool calls"
                );

                let mut call_parts = Vec::with_capacity(calls.len() + 1);
                if let Some(text) = reply.content.filter(|text| !text.trim().is_empty()) {
                    call_parts.push(ContentPart::Text(text));
                }
                call_parts.extend(calls.iter().map(|(id, name, args)| ContentPart::FunctionCall {
                    id: id.clone(),
                    name: name.clone(),
                    args: args.as_ref().ok().cloned().unwrap_or(Value::Null),
                }));
                // Calls enter the history only together with their responses,
                // so a turn dropped mid-round leaves no unanswered call behind
                let call_content = Content::new(ContentRole::Model, call_parts);
                yield Ok(RuntimeEvent::partial(&author, call_content.clone()));

                let tools = &tools;
                let ctx = &ctx;
                let responses = join_all(calls.into_iter().map(|(id, name, args)| async move {
                    let response = tools.respond(&name, args, ctx).await;
                    ContentPart::FunctionResponse { id, name, response }
                }))
                .await;

                let response_content = Content::new(ContentRole::Tool, responses);
                session.push(call_content);
                session.push(response_content.clone());
                yield Ok(RuntimeEvent::partial(&author, response_content));
            }

            warn!(max_rounds, session_id = %ctx.session_id, "Tool round limit reached");
            let content = Content::model_text(format!(
                "I stopped after {} rounds of tool calls without reaching an answer. Please try rephrasing the request.",
                max_rounds
            ));
            session.push(content.clone());
            yield Ok(RuntimeEvent::final_response(&author, Some(content)));
        })
    }
}

fn call_id(call: &ToolCall) -> String {
    if call.id.is_empty() {
        format!("call_{}", Uuid::new_v4().simple())
    } else {
        call.id.clone()
    }
}

/// Chat transcript for one request: the instruction, then the history
fn to_messages(instruction: &str, history: &[Content]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    if !instruction.is_empty() {
        messages.push(ChatMessage::system(instruction));
    }

    for content in history {
        match content.role {
            ContentRole::User => messages.push(ChatMessage::user(content.joined_text())),
            ContentRole::Model => {
                let calls: Vec<ToolCall> = content
                    .parts
                    .iter()
                    .filter_map(|part| match part {
                        ContentPart::FunctionCall { id, name, args } => Some(ToolCall::new(id, name, args)),
                        _ => None,
                    })
                    .collect();
                let text = content.joined_text();
                if calls.is_empty() {
                    messages.push(ChatMessage::assistant(text));
                } else {
                    let text = (!text.is_empty()).then_some(text);
                    messages.push(ChatMessage::assistant_tool_calls(text, calls));
                }
            }
            ContentRole::Tool => {
                messages.extend(content.parts.iter().filter_map(|part| match part {
                    ContentPart::FunctionResponse { id, name, response } => {
                        Some(ChatMessage::tool_result(id, name, response.to_string()))
                    }
                    _ => None,
                }));
            }
        }
    }
    messages
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;

    use async_trait::async_trait;
    use futures_util::StreamExt;
    use parking_lot::Mutex;
    use serde_json::json;
    use tokio::sync::Barrier;

    use crate::error::Error;
    use crate::runtime::ChatReply;
    use crate::session::{SessionKey, SessionStore};
    use crate::tools::Tool;

    /// Replays canned replies and records every request
    struct ScriptedModel {
        replies: Mutex<VecDeque<Result<ChatReply>>>,
        requests: Mutex<Vec<ChatRequest>>,
        repeat_last: Option<ChatReply>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<ChatReply>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
                repeat_last: None,
            })
        }

        fn forever(reply: ChatReply) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(VecDeque::new()),
                requests: Mutex::new(Vec::new()),
                repeat_last: Some(reply),
            })
        }

        fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().clone()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: &ChatRequest) -> Result<ChatReply> {
            self.requests.lock().push(request.clone());
            match self.replies.lock().pop_front() {
                Some(reply) => reply,
                None => self
                    .repeat_last
                    .clone()
                    .ok_or_else(|| Error::model("script exhausted")),
            }
        }
    }

    /// Waits until every concurrent call of a round has arrived
    struct Rendezvous {
        barrier: Arc<Barrier>,
    }

    #[async_trait]
    impl Tool for Rendezvous {
        fn name(&self) -> &str {
            "rendezvous"
        }

        fn description(&self) -> &str {
            "Meet the other calls"
        }

        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }

        async fn call(&self, args: Value, _ctx: &ToolContext) -> Result<Value> {
            self.barrier.wait().await;
            Ok(json!({"who": args["who"]}))
        }
    }

    struct Failing;

    #[async_trait]
    impl Tool for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn description(&self) -> &str {
            "Always fails"
        }

        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }

        async fn call(&self, _args: Value, _ctx: &ToolContext) -> Result<Value> {
            Err(Error::peer_not_found("Ghost_Agent"))
        }
    }

    fn text(reply: &str) -> Result<ChatReply> {
        Ok(ChatReply {
            content: Some(reply.to_string()),
            ..Default::default()
        })
    }

    fn calls(calls: &[(&str, &str, Value)]) -> ChatReply {
        ChatReply {
            content: None,
            tool_calls: calls
                .iter()
                .map(|(id, name, args)| ToolCall::new(*id, *name, args))
                .collect(),
            finish_reason: Some("tool_calls".into()),
        }
    }

    fn session() -> SessionHandle {
        SessionStore::new().get_or_create(SessionKey::new("Host_Agent", "host_agent", "s1"))
    }

    async fn run(runtime: &ChatRuntime, session: SessionHandle, query: &str) -> Vec<Result<RuntimeEvent>> {
        runtime
            .run_turn(session, Content::user_text(query))
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_plain_answer_is_single_final_event() {
        let model = ScriptedModel::new(vec![text("Hi! Who should I invite?")]);
        let runtime = ChatRuntime::new(model.clone(), ToolSet::new(), "Host_Agent", 4)
            .with_instruction(|| "You are the host".to_string());
        let session = session();

        let events = run(&runtime, session.clone(), "hello").await;
        assert_eq!(events.len(), 1);
        let event = events[0].as_ref().unwrap();
        assert!(event.is_final);
        assert_eq!(event.author, "Host_Agent");
        assert_eq!(event.final_text(), "Hi! Who should I invite?");

        let sent = &model.requests()[0].messages;
        assert_eq!(sent[0].role, "system");
        assert_eq!(sent[1].content.as_deref(), Some("hello"));

        let history = session.lock().await.history().to_vec();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].role, ContentRole::Model);
    }

    #[tokio::test]
    async fn test_tool_round_then_answer() {
        let model = ScriptedModel::new(vec![
            Ok(calls(&[("c1", "failing", json!({}))])),
            text("Ghost is not around"),
        ]);
        let runtime = ChatRuntime::new(model.clone(), ToolSet::new().with(Failing), "Host_Agent", 4);

        let events = run(&runtime, session(), "ask ghost").await;
        let events: Vec<_> = events.into_iter().map(Result::unwrap).collect();
        assert_eq!(events.len(), 3);
        assert!(!events[0].is_final);
        assert!(!events[1].is_final);
        assert!(events[2].is_final);

        // The tool error went back to the model instead of ending the turn
        let second = &model.requests()[1].messages;
        let tool_message = second.iter().find(|m| m.role == "tool").unwrap();
        assert_eq!(tool_message.tool_call_id.as_deref(), Some("c1"));
        assert!(tool_message.content.as_deref().unwrap().contains("Agent Ghost_Agent not found"));

        let assistant = second.iter().find(|m| m.tool_calls.is_some()).unwrap();
        assert_eq!(assistant.tool_calls.as_ref().unwrap()[0].function.name, "failing");
    }

    #[tokio::test]
    async fn test_calls_of_one_round_run_concurrently() {
        let barrier = Arc::new(Barrier::new(2));
        let model = ScriptedModel::new(vec![
            Ok(calls(&[
                ("a", "rendezvous", json!({"who": "Karley"})),
                ("b", "rendezvous", json!({"who": "Nate"})),
            ])),
            text("both answered"),
        ]);
        let tools = ToolSet::new().with(Rendezvous { barrier });
        let runtime = ChatRuntime::new(model, tools, "Host_Agent", 4);

        let events = tokio::time::timeout(Duration::from_secs(5), run(&runtime, session(), "go"))
            .await
            .expect("calls of one round should not run one after another");

        let responses = events[1].as_ref().unwrap().content.clone().unwrap();
        assert_eq!(responses.role, ContentRole::Tool);
        assert_eq!(
            responses.parts[1],
            ContentPart::FunctionResponse {
                id: "b".into(),
                name: "rendezvous".into(),
                response: json!({"who": "Nate"}),
            }
        );
    }

    #[tokio::test]
    async fn test_round_limit_ends_with_final_event() {
        let model = ScriptedModel::forever(calls(&[("c", "failing", json!({}))]));
        let runtime = ChatRuntime::new(model.clone(), ToolSet::new().with(Failing), "Host_Agent", 2);

        let events = run(&runtime, session(), "loop").await;
        assert_eq!(events.len(), 5);
        let last = events.last().unwrap().as_ref().unwrap();
        assert!(last.is_final);
        assert!(last.final_text().contains("2 rounds"));
        assert_eq!(model.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_model_error_ends_stream() {
        let model = ScriptedModel::new(vec![Err(Error::model("connection refused"))]);
        let runtime = ChatRuntime::new(model, ToolSet::new(), "Host_Agent", 4);

        let events = run(&runtime, session(), "hi").await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Err(Error::Model { .. })));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported_to_model() {
        let model = ScriptedModel::new(vec![
            Ok(calls(&[("c", "teleport", json!({}))])),
            text("cannot teleport"),
        ]);
        let runtime = ChatRuntime::new(model.clone(), ToolSet::new(), "Host_Agent", 4);

        let events = run(&runtime, session(), "go").await;
        assert!(events.last().unwrap().as_ref().unwrap().is_final);

        let tool_message = model.requests()[1]
            .messages
            .iter()
            .find(|m| m.role == "tool")
            .cloned()
            .unwrap();
        assert!(tool_message.content.unwrap().contains("Unknown tool"));
    }

    #[tokio::test]
    async fn test_history_carries_over_between_turns() {
        let model = ScriptedModel::new(vec![text("first answer"), text("second answer")]);
        let runtime = ChatRuntime::new(model.clone(), ToolSet::new(), "Host_Agent", 4);
        let session = session();

        run(&runtime, session.clone(), "one").await;
        run(&runtime, session.clone(), "two").await;

        let second = &model.requests()[1].messages;
        let roles: Vec<_> = second.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "assistant", "user"]);
    }

    #[tokio::test]
    async fn test_dropped_turn_leaves_no_unanswered_call() {
        let model = ScriptedModel::new(vec![
            Ok(calls(&[("c1", "failing", json!({}))])),
            text("fresh start"),
        ]);
        let runtime = ChatRuntime::new(model.clone(), ToolSet::new().with(Failing), "Host_Agent", 4);
        let session = session();

        let mut first = runtime.run_turn(session.clone(), Content::user_text("ask ghost"));
        let event = first.next().await.unwrap().unwrap();
        assert!(!event.is_final);
        drop(first);

        let events = run(&runtime, session.clone(), "never mind").await;
        assert!(events.last().unwrap().as_ref().unwrap().is_final);

        let second = &model.requests()[1].messages;
        let roles: Vec<_> = second.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "user"]);
        assert!(second.iter().all(|m| m.tool_calls.is_none()));
    }

    #[tokio::test]
    async fn test_completed_round_keeps_call_before_response() {
        let model = ScriptedModel::new(vec![
            Ok(calls(&[("c1", "failing", json!({}))])),
            text("done"),
        ]);
        let runtime = ChatRuntime::new(model, ToolSet::new().with(Failing), "Host_Agent", 4);
        let session = session();

        run(&runtime, session.clone(), "ask ghost").await;

        let roles: Vec<_> = session.lock().await.history().iter().map(|c| c.role).collect();
        assert_eq!(
            roles,
            vec![ContentRole::User, ContentRole::Model, ContentRole::Tool, ContentRole::Model]
        );
    }

    #[test]
    fn test_to_messages_expands_tool_responses() {
        let history = vec![
            Content::user_text("plan a game"),
            Content::new(
                ContentRole::Model,
                vec![ContentPart::FunctionCall {
                    id: "c1".into(),
                    name: "send_message".into(),
                    args: json!({"agent_name": "Nate_Agent"}),
                }],
            ),
            Content::new(
                ContentRole::Tool,
                vec![ContentPart::FunctionResponse {
                    id: "c1".into(),
                    name: "send_message".into(),
                    response: json!({"result": []}),
                }],
            ),
        ];

        let messages = to_messages("sys", &history);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2].content, None);
        assert_eq!(
            messages[2].tool_calls.as_ref().unwrap()[0].arguments().unwrap(),
            json!({"agent_name": "Nate_Agent"})
        );
        assert_eq!(messages[3].role, "tool");
        assert_eq!(messages[3].content.as_deref(), Some(r#"{"result":[]}"#));
    }
}

//! The host agent: registry, sessions and the caller-facing update stream
//!
//! `HostAgent::stream` runs one query as one runtime turn and turns the
//! runtime's events into updates. Every stream ends with exactly one
//! `Complete` update, whatever the runtime does.

use std::pin::Pin;
use std::sync::Arc;

use async_stream::stream;
use chrono::Local;
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::{debug, info, warn};

use crate::config::{AgentSettings, HostConfig, PeerSettings};
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::peer::{ConnectionRegistry, PeerDirectory};
use crate::prompt::root_instruction;
use crate::runtime::{ChatRuntime, Content, DecisionRuntime, OpenAiChatModel};
use crate::session::{SessionKey, SessionStore};
use crate::tools::{BookCourtTool, CourtSchedule, ListCourtAvailabilitiesTool, SendMessageTool, ToolSet};

/// Status text of every intermediate update
pub const WORKING_MESSAGE: &str = "The host agent is thinking...";

// ─────────────────────────────────────────────────────────────────
// Updates
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamUpdate {
    Working { updates: String },
    Complete { content: String },
}

impl StreamUpdate {
    pub fn working() -> Self {
        StreamUpdate::Working {
            updates: WORKING_MESSAGE.to_string(),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, StreamUpdate::Complete { .. })
    }

    /// Status text for working updates, the answer for the final one
    pub fn text(&self) -> &str {
        match self {
            StreamUpdate::Working { updates } => updates,
            StreamUpdate::Complete { content } => content,
        }
    }
}

/// `{"is_task_complete": bool, "updates" | "content": string}`
impl Serialize for StreamUpdate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("is_task_complete", &self.is_complete())?;
        match self {
            StreamUpdate::Working { updates } => map.serialize_entry("updates", updates)?,
            StreamUpdate::Complete { content } => map.serialize_entry("content", content)?,
        }
        map.end()
    }
}

pub type UpdateStream = Pin<Box<dyn Stream<Item = StreamUpdate> + Send>>;

// ─────────────────────────────────────────────────────────────────
// Host Agent
// ─────────────────────────────────────────────────────────────────

pub struct HostAgent {
    name: String,
    user_id: String,
    registry: Arc<ConnectionRegistry>,
    sessions: Arc<SessionStore>,
    runtime: Arc<dyn DecisionRuntime>,
}

impl HostAgent {
    /// Resolve the configured peers and wire the chat runtime with its tools
    pub async fn create(config: &HostConfig) -> Result<Self> {
        let registry = Arc::new(build_registry(&config.peers).await?);
        let dispatcher = Dispatcher::new(registry.clone());
        let schedule = Arc::new(CourtSchedule::new());

        let tools = ToolSet::new()
            .with(SendMessageTool::new(dispatcher))
            .with(BookCourtTool::new(schedule.clone()))
            .with(ListCourtAvailabilitiesTool::new(schedule));

        let model = Arc::new(OpenAiChatModel::new(&config.model)?);
        let summary = registry.summary().to_string();
        let runtime = ChatRuntime::new(model, tools, &config.agent.name, config.agent.max_tool_rounds)
            .with_instruction(move || root_instruction(&summary, Local::now().date_naive()));

        info!(
            agent = %config.agent.name,
            peers = registry.len(),
            model = %config.model.model,
            "Host agent ready"
        );

        Ok(Self::from_parts(&config.agent, registry, Arc::new(runtime)))
    }

    pub fn from_parts(
        settings: &AgentSettings,
        registry: Arc<ConnectionRegistry>,
        runtime: Arc<dyn DecisionRuntime>,
    ) -> Self {
        Self {
            name: settings.name.clone(),
            user_id: settings.user_id.clone(),
            registry,
            sessions: Arc::new(SessionStore::new()),
            runtime,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Run `query` as one turn of session `session_id`.
    ///
    /// Lazy: nothing happens until the stream is polled. Dropping it early
    /// abandons the turn.
    pub fn stream(&self, query: &str, session_id: &str) -> UpdateStream {
        let key = SessionKey::new(&self.name, &self.user_id, session_id);
        let sessions = self.sessions.clone();
        let runtime = self.runtime.clone();
        let query = query.to_string();

        Box::pin(stream! {
            let session = match sessions.get(&key) {
                Some(existing) => existing,
                None => {
                    info!(session_id = %key.session_id, "Starting new session");
                    sessions.get_or_create(key.clone())
                }
            };

            let mut events = runtime.run_turn(session, Content::user_text(query));
            while let Some(event) = events.next().await {
                match event {
                    Ok(event) if event.is_final => {
                        debug!(session_id = %key.session_id, author = %event.author, "Turn complete");
                        yield StreamUpdate::Complete { content: event.final_text() };
                        return;
                    }
                    Ok(event) => {
                        debug!(session_id = %key.session_id, event_id = %event.id, "Intermediate event");
                        yield StreamUpdate::working();
                    }
                    Err(e) => {
                        warn!(session_id = %key.session_id, error = %e.format_for_log(), "Turn failed");
                        yield StreamUpdate::Complete { content: format!("Error: {}", e) };
                        return;
                    }
                }
            }

            warn!(session_id = %key.session_id, "Runtime ended without a final response");
            yield StreamUpdate::Complete { content: String::new() };
        })
    }
}

/// Resolve every configured address into a registry
pub async fn build_registry(settings: &PeerSettings) -> Result<ConnectionRegistry> {
    let directory = PeerDirectory::new(&settings.card_path, settings.resolve_timeout())?;
    let client = Client::builder()
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

    Ok(ConnectionRegistry::build_from(
        &settings.addresses,
        &directory,
        &client,
        settings.request_timeout(),
    )
    .await)
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{ContentPart, EventStream, RuntimeEvent};
    use crate::session::SessionHandle;
    use serde_json::json;

    /// Emits a fixed script of events after recording the message
    struct ScriptedRuntime {
        script: Vec<std::result::Result<RuntimeEvent, String>>,
    }

    impl ScriptedRuntime {
        fn new(script: Vec<std::result::Result<RuntimeEvent, String>>) -> Arc<Self> {
            Arc::new(Self { script })
        }
    }

    impl DecisionRuntime for ScriptedRuntime {
        fn run_turn(&self, session: SessionHandle, message: Content) -> EventStream {
            let script = self.script.clone();
            Box::pin(stream! {
                session.lock().await.push(message);
                for item in script {
                    yield item.map_err(Error::model);
                }
            })
        }
    }

    fn partial(text: &str) -> std::result::Result<RuntimeEvent, String> {
        Ok(RuntimeEvent::partial("Host_Agent", Content::model_text(text)))
    }

    fn final_event(parts: Vec<ContentPart>) -> std::result::Result<RuntimeEvent, String> {
        Ok(RuntimeEvent::final_response(
            "Host_Agent",
            Some(Content::new(crate::runtime::ContentRole::Model, parts)),
        ))
    }

    fn host(runtime: Arc<dyn DecisionRuntime>) -> HostAgent {
        HostAgent::from_parts(
            &AgentSettings::default(),
            Arc::new(ConnectionRegistry::from_connections(vec![])),
            runtime,
        )
    }

    async fn collect(host: &HostAgent, query: &str, session: &str) -> Vec<StreamUpdate> {
        host.stream(query, session).collect().await
    }

    fn assert_single_terminal(updates: &[StreamUpdate]) {
        let (last, rest) = updates.split_last().unwrap();
        assert!(last.is_complete());
        assert!(rest.iter().all(|update| !update.is_complete()));
    }

    #[tokio::test]
    async fn test_working_updates_then_complete() {
        let host = host(ScriptedRuntime::new(vec![
            partial("calling Nate"),
            partial("Nate answered"),
            final_event(vec![
                ContentPart::Text("Saturday 10:00 works.".into()),
                ContentPart::Text(String::new()),
                ContentPart::Text("Court booked.".into()),
            ]),
        ]));

        let updates = collect(&host, "book a game", "s1").await;
        assert_eq!(updates.len(), 3);
        assert_single_terminal(&updates);
        assert_eq!(updates[0], StreamUpdate::working());
        assert_eq!(updates[2].text(), "Saturday 10:00 works.\nCourt booked.");
    }

    #[tokio::test]
    async fn test_nothing_after_final() {
        let host = host(ScriptedRuntime::new(vec![
            final_event(vec![ContentPart::Text("done".into())]),
            partial("late"),
            final_event(vec![ContentPart::Text("again".into())]),
        ]));

        let updates = collect(&host, "q", "s").await;
        assert_eq!(updates, vec![StreamUpdate::Complete { content: "done".into() }]);
    }

    #[tokio::test]
    async fn test_final_without_text_is_empty() {
        let host = host(ScriptedRuntime::new(vec![Ok(RuntimeEvent::final_response(
            "Host_Agent",
            None,
        ))]));

        let updates = collect(&host, "q", "s").await;
        assert_eq!(updates, vec![StreamUpdate::Complete { content: String::new() }]);
    }

    #[tokio::test]
    async fn test_runtime_error_becomes_terminal_update() {
        let host = host(ScriptedRuntime::new(vec![
            partial("thinking"),
            Err("model offline".to_string()),
            partial("never seen"),
        ]));

        let updates = collect(&host, "q", "s").await;
        assert_eq!(updates.len(), 2);
        assert_single_terminal(&updates);
        assert_eq!(updates[1].text(), "Error: Model request failed: model offline");
    }

    #[tokio::test]
    async fn test_runtime_without_final_still_terminates() {
        let host = host(ScriptedRuntime::new(vec![partial("a"), partial("b")]));

        let updates = collect(&host, "q", "s").await;
        assert_eq!(updates.len(), 3);
        assert_single_terminal(&updates);
        assert_eq!(updates[2].text(), "");
    }

    #[tokio::test]
    async fn test_sessions_are_created_lazily_and_reused() {
        let host = host(ScriptedRuntime::new(vec![final_event(vec![])]));
        let key = SessionKey::new("Host_Agent", "host_agent", "s1");

        let stream = host.stream("first", "s1");
        assert!(host.sessions().get(&key).is_none());
        stream.collect::<Vec<_>>().await;

        collect(&host, "second", "s1").await;
        collect(&host, "other", "s2").await;

        let session = host.sessions().get(&key).unwrap();
        assert_eq!(session.lock().await.history().len(), 2);
        assert_eq!(host.sessions().len(), 2);
    }

    #[test]
    fn test_update_serialization() {
        assert_eq!(
            serde_json::to_value(StreamUpdate::working()).unwrap(),
            json!({"is_task_complete": false, "updates": "The host agent is thinking..."})
        );
        assert_eq!(
            serde_json::to_value(StreamUpdate::Complete { content: "Booked!".into() }).unwrap(),
            json!({"is_task_complete": true, "content": "Booked!"})
        );
    }
}

//! Tools the decision runtime can call
//!
//! A tool takes a JSON arguments object and returns a JSON value. Failures
//! come back as `Err` and are reported to the model, never to the caller of
//! the stream.

mod court;
mod send_message;

pub use court::{BookCourtTool, CourtSchedule, ListCourtAvailabilitiesTool};
pub use send_message::SendMessageTool;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::correlation::CorrelationState;
use crate::error::{Error, Result};
use crate::runtime::ToolDefinition;

/// Per-call context handed to every tool
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub session_id: String,
    /// Correlation state of the session issuing the call
    pub correlation: Arc<CorrelationState>,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments object
    fn parameters(&self) -> Value;

    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<Value>;
}

/// Tools by name, in registration order
#[derive(Default, Clone)]
pub struct ToolSet {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool; a tool with the same name is replaced
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        match self.index.get(&name) {
            Some(&slot) => self.tools[slot] = tool,
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.register(Arc::new(tool));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.index.get(name).map(|&slot| &self.tools[slot])
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|tool| tool.name())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Function definitions advertised to the model
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|tool| ToolDefinition::function(tool.name(), tool.description(), tool.parameters()))
            .collect()
    }

    pub async fn call(&self, name: &str, args: Value, ctx: &ToolContext) -> Result<Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| Error::UnknownTool { name: name.to_string() })?;
        debug!(tool = %name, session_id = %ctx.session_id, "Calling tool");
        tool.call(args, ctx).await
    }

    /// Call a tool and shape its outcome as a function response object
    pub async fn respond(&self, name: &str, args: Result<Value>, ctx: &ToolContext) -> Value {
        let outcome = match args {
            Ok(args) => self.call(name, args, ctx).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(value @ Value::Object(_)) => value,
            Ok(value) => json!({ "result": value }),
            Err(e) => {
                warn!(tool = %name, error = %e.format_for_log(), "Tool call failed");
                json!({ "error": e.to_string() })
            }
        }
    }
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

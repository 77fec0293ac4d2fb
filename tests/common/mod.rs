//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const CARD_PATH: &str = "/.well-known/agent.json";

/// Command for the rally-host binary with no RALLY_* leakage from the caller
pub fn host_cmd() -> Command {
    let mut cmd = Command::cargo_bin("rally-host").unwrap();
    for (key, _) in std::env::vars() {
        if key.starts_with("RALLY_") {
            cmd.env_remove(key);
        }
    }
    cmd
}

/// A config file in its own temp directory
pub struct ConfigFixture {
    _temp_dir: TempDir,
    config_path: PathBuf,
}

impl ConfigFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("rally-host.toml");
        Self {
            _temp_dir: temp_dir,
            config_path,
        }
    }

    pub fn with(content: &str) -> Self {
        let fixture = Self::new();
        fixture.write_config(content);
        fixture
    }

    pub fn write_config(&self, content: &str) {
        fs::write(&self.config_path, content).unwrap();
    }

    pub fn path(&self) -> &str {
        self.config_path.to_str().unwrap()
    }
}

/// Answers every `message/send` with a completed task echoing the ids
pub struct TaskReply {
    pub texts: Vec<String>,
}

impl Respond for TaskReply {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or_default();
        let message = &body["params"]["message"];
        let task_id = message["taskId"].as_str().unwrap_or("task-1").to_string();
        let context_id = message["contextId"].as_str().unwrap_or("ctx-1").to_string();
        let parts: Vec<Value> = self
            .texts
            .iter()
            .map(|text| json!({"kind": "text", "text": text}))
            .collect();

        ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": body["id"],
            "result": {
                "kind": "task",
                "id": task_id,
                "contextId": context_id,
                "status": {"state": "completed"},
                "artifacts": [{"artifactId": "availability", "parts": parts}]
            }
        }))
    }
}

/// A friend agent serving its card and answering sends with `texts`
pub async fn friend_agent(name: &str, description: &str, texts: &[&str]) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CARD_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": name,
            "description": description,
            "url": server.uri(),
            "version": "1.0.0",
            "capabilities": {"streaming": false},
            "skills": [{"id": "availability", "name": "Check availability"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(TaskReply {
            texts: texts.iter().map(|text| text.to_string()).collect(),
        })
        .mount(&server)
        .await;
    server
}

//! Recording fakes for the HTTP and qmd seams.

use crate::http::{HttpPoster, HttpReply};
use crate::qmd::{ExternalToolResult, SpawnError, ToolRunner};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(Value),
    Form(Vec<(String, String)>),
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub body: RequestBody,
    pub bearer: Option<String>,
}

impl RecordedRequest {
    pub fn json(&self) -> Option<&Value> {
        match &self.body {
            RequestBody::Json(value) => Some(value),
            RequestBody::Form(_) => None,
        }
    }
}

/// Replays queued replies in order; once the queue is empty every request
/// gets `200 {}`.
#[derive(Default)]
pub struct FakeHttp {
    replies: Mutex<VecDeque<Result<HttpReply, String>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl FakeHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, status: u16, body: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(HttpReply {
            status,
            body: body.to_string(),
        }));
        self
    }

    pub fn fail(self, error: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(error.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn record(&self, request: RecordedRequest) -> Result<HttpReply, String> {
        self.requests.lock().unwrap().push(request);
        self.replies.lock().unwrap().pop_front().unwrap_or(Ok(HttpReply {
            status: 200,
            body: "{}".to_string(),
        }))
    }
}

#[async_trait]
impl HttpPoster for FakeHttp {
    async fn post_json(
        &self,
        url: &str,
        body: &Value,
        bearer: Option<&str>,
    ) -> Result<HttpReply, String> {
        self.record(RecordedRequest {
            url: url.to_string(),
            body: RequestBody::Json(body.clone()),
            bearer: bearer.map(str::to_string),
        })
    }

    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<HttpReply, String> {
        self.record(RecordedRequest {
            url: url.to_string(),
            body: RequestBody::Form(
                form.iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            bearer: None,
        })
    }
}

pub fn tool_ok(stdout: &str) -> ExternalToolResult {
    ExternalToolResult {
        exit_code: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

pub fn tool_exit(code: i32, stderr: &str) -> ExternalToolResult {
    ExternalToolResult {
        exit_code: Some(code),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

/// Scripted qmd stand-in. Commands without a scripted result succeed, and
/// `collection list` reports one collection by default.
#[derive(Default)]
pub struct FakeTool {
    results: HashMap<String, ExternalToolResult>,
    spawn_errors: HashMap<String, String>,
    not_installed: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeTool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates a missing binary: every spawn fails with `NotFound`.
    pub fn not_installed() -> Self {
        Self {
            not_installed: true,
            ..Self::default()
        }
    }

    pub fn with(mut self, command: &str, result: ExternalToolResult) -> Self {
        self.results.insert(command.to_string(), result);
        self
    }

    /// `command` fails to start with `SpawnError::Other(message)`.
    pub fn with_spawn_error(mut self, command: &str, message: &str) -> Self {
        self.spawn_errors
            .insert(command.to_string(), message.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolRunner for FakeTool {
    fn name(&self) -> &str {
        "qmd"
    }

    async fn run(&self, args: &[&str]) -> Result<ExternalToolResult, SpawnError> {
        if self.not_installed {
            return Err(SpawnError::NotFound("qmd".to_string()));
        }

        let command = args.join(" ");
        self.calls.lock().unwrap().push(command.clone());

        if let Some(message) = self.spawn_errors.get(&command) {
            return Err(SpawnError::Other(message.clone()));
        }

        Ok(self.results.get(&command).cloned().unwrap_or_else(|| {
            if command == "collection list" {
                tool_ok("workspace (qmd://workspace/)\n  Files: 42\n")
            } else {
                tool_ok("done\n")
            }
        }))
    }
}

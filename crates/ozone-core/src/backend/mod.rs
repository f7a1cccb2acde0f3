//! **Backend boundary** — the request/response surface this core consumes.
//!
//! The task engine, the orchestration pipeline and the affect subsystems live in
//! the backend. The core only ever talks to them through [`Backend`] (generic
//! pipeline invocation, tasks, config, status) and, when wired, [`Orchestrate`]
//! (the one-shot primary conversation path).

mod http;

pub use http::HttpBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::BackendResult;
use crate::registry::PipelineId;

/// Status of a backend task as reported by `task.list()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Running or queued: counts toward the tasks badge.
    pub fn is_pending(&self) -> bool {
        matches!(self, TaskStatus::Running | TaskStatus::Queued)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_pending()
    }
}

/// One task as reported by the task engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: String,
    pub pipeline_id: PipelineId,
    pub status: TaskStatus,
    /// Data of the currently active step, if the engine exposes one.
    #[serde(default)]
    pub step_data: Option<Value>,
}

/// Connection stats for the legacy status poll.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStats {
    pub connected: bool,
    #[serde(default)]
    pub latency_ms: Option<u64>,
    #[serde(default)]
    pub active_tasks: u32,
}

/// Primary orchestration request: prompt plus ambient context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrateRequest {
    pub prompt: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub workspace_id: Option<String>,
    pub user_id: String,
    pub device_id: String,
    /// Whether affect/reflection features are enabled on this client.
    pub consciousness_enabled: bool,
    pub token_budget: u32,
}

/// Primary orchestration response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrchestrateResponse {
    #[serde(default)]
    pub response: String,
    pub success: bool,
    #[serde(default)]
    pub consciousness_gate: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Generic backend surface. All calls are async and may fail with a [`crate::BackendError`].
#[async_trait]
pub trait Backend: Send + Sync {
    /// Invoke any pipeline with a JSON input.
    async fn execute(&self, pipeline_id: PipelineId, input: Value) -> BackendResult<Value>;

    async fn task_list(&self) -> BackendResult<Vec<TaskSummary>>;

    async fn task_status(&self, task_id: &str) -> BackendResult<TaskSummary>;

    async fn task_cancel(&self, task_id: &str) -> BackendResult<()>;

    async fn config_get(&self) -> BackendResult<Value>;

    async fn config_set(&self, updates: Value) -> BackendResult<Value>;

    async fn status(&self) -> BackendResult<ConnectionStats>;
}

/// Optional one-shot orchestration entry point (the primary conversation path).
#[async_trait]
pub trait Orchestrate: Send + Sync {
    async fn orchestrate(&self, request: OrchestrateRequest) -> BackendResult<OrchestrateResponse>;
}

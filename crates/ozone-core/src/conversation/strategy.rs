//! Submission strategies: the primary orchestration call, or the generic prompt pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::backend::{Backend, Orchestrate, OrchestrateRequest};
use crate::error::{BackendError, BackendResult};
use crate::registry::well_known;

/// Which path a strategy takes. The fallback path shows a placeholder turn while it waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitPath {
    Primary,
    Fallback,
}

/// Ambient context carried with every submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmitContext {
    pub project_id: Option<String>,
    pub workspace_id: Option<String>,
    pub user_id: String,
    pub device_id: String,
    pub affect_enabled: bool,
    pub token_budget: u32,
}

#[async_trait]
pub trait SubmitStrategy: Send + Sync {
    fn path(&self) -> SubmitPath;

    /// Send one prompt and return the assistant's text.
    async fn submit(&self, prompt: &str, ctx: &SubmitContext) -> BackendResult<String>;
}

/// One-shot orchestration call.
pub struct PrimaryStrategy {
    orchestrator: Arc<dyn Orchestrate>,
}

impl PrimaryStrategy {
    pub fn new(orchestrator: Arc<dyn Orchestrate>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl SubmitStrategy for PrimaryStrategy {
    fn path(&self) -> SubmitPath {
        SubmitPath::Primary
    }

    async fn submit(&self, prompt: &str, ctx: &SubmitContext) -> BackendResult<String> {
        let request = OrchestrateRequest {
            prompt: prompt.to_string(),
            project_id: ctx.project_id.clone(),
            workspace_id: ctx.workspace_id.clone(),
            user_id: ctx.user_id.clone(),
            device_id: ctx.device_id.clone(),
            consciousness_enabled: ctx.affect_enabled,
            token_budget: ctx.token_budget,
        };
        let response = self.orchestrator.orchestrate(request).await?;
        if !response.success {
            return Err(BackendError::Orchestration(
                response
                    .error
                    .unwrap_or_else(|| "orchestration reported failure".to_string()),
            ));
        }
        if let Some(gate) = &response.consciousness_gate {
            tracing::debug!(target: "ozone::conversation", %gate, "orchestration gate");
        }
        Ok(response.response)
    }
}

/// Generic prompt pipeline through `pipeline.execute`.
pub struct FallbackStrategy {
    backend: Arc<dyn Backend>,
}

impl FallbackStrategy {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }
}

/// Pull the reply text out of a prompt pipeline output.
fn response_text(output: &Value) -> BackendResult<String> {
    if let Some(s) = output.as_str() {
        return Ok(s.to_string());
    }
    output
        .get("response")
        .or_else(|| output.get("text"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| BackendError::Decode("prompt pipeline returned no response text".to_string()))
}

#[async_trait]
impl SubmitStrategy for FallbackStrategy {
    fn path(&self) -> SubmitPath {
        SubmitPath::Fallback
    }

    async fn submit(&self, prompt: &str, ctx: &SubmitContext) -> BackendResult<String> {
        let input = json!({
            "prompt": prompt,
            "user_id": ctx.user_id,
            "device_id": ctx.device_id,
            "project_id": ctx.project_id,
            "workspace_id": ctx.workspace_id,
        });
        let output = self.backend.execute(well_known::PROMPT, input).await?;
        response_text(&output)
    }
}

/// Primary when an orchestration collaborator is wired, fallback otherwise.
pub fn select_strategy(
    orchestrator: Option<Arc<dyn Orchestrate>>,
    backend: Arc<dyn Backend>,
) -> Arc<dyn SubmitStrategy> {
    match orchestrator {
        Some(o) => Arc::new(PrimaryStrategy::new(o)),
        None => {
            tracing::info!(target: "ozone::conversation", "no orchestration entry point; using prompt pipeline");
            Arc::new(FallbackStrategy::new(backend))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::OrchestrateResponse;
    use std::sync::Mutex;

    struct Recorder {
        seen: Mutex<Vec<OrchestrateRequest>>,
        reply: OrchestrateResponse,
    }

    #[async_trait]
    impl Orchestrate for Recorder {
        async fn orchestrate(&self, request: OrchestrateRequest) -> BackendResult<OrchestrateResponse> {
            self.seen.lock().unwrap().push(request);
            Ok(self.reply.clone())
        }
    }

    fn ctx() -> SubmitContext {
        SubmitContext {
            project_id: Some("p1".into()),
            workspace_id: None,
            user_id: "u1".into(),
            device_id: "d1".into(),
            affect_enabled: true,
            token_budget: 32_000,
        }
    }

    #[tokio::test]
    async fn test_primary_carries_context() {
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
            reply: OrchestrateResponse {
                response: "hi".into(),
                success: true,
                ..Default::default()
            },
        });
        let strategy = PrimaryStrategy::new(recorder.clone());
        assert_eq!(strategy.submit("hello", &ctx()).await.unwrap(), "hi");

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].project_id.as_deref(), Some("p1"));
        assert!(seen[0].consciousness_enabled);
        assert_eq!(seen[0].token_budget, 32_000);
    }

    #[tokio::test]
    async fn test_primary_unsuccessful_response_is_error() {
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
            reply: OrchestrateResponse {
                success: false,
                error: Some("gate closed".into()),
                ..Default::default()
            },
        });
        let strategy = PrimaryStrategy::new(recorder);
        match strategy.submit("hello", &ctx()).await {
            Err(BackendError::Orchestration(msg)) => assert_eq!(msg, "gate closed"),
            other => panic!("expected orchestration error, got {:?}", other),
        }
    }

    #[test]
    fn test_response_text_shapes() {
        assert_eq!(response_text(&json!("plain")).unwrap(), "plain");
        assert_eq!(response_text(&json!({ "response": "a" })).unwrap(), "a");
        assert_eq!(response_text(&json!({ "text": "b" })).unwrap(), "b");
        assert!(matches!(response_text(&json!({ "n": 1 })), Err(BackendError::Decode(_))));
    }
}

//! HTTP implementation of [`Backend`] and [`Orchestrate`] over the shell's REST surface.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{Backend, ConnectionStats, Orchestrate, OrchestrateRequest, OrchestrateResponse, TaskSummary};
use crate::error::{BackendError, BackendResult};
use crate::registry::PipelineId;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// REST client for the backend.
///
/// ```text
/// POST  /pipelines/{id}/execute   generic pipeline invocation
/// POST  /orchestrate              primary conversation path
/// GET   /tasks                    task.list
/// GET   /tasks/{id}               task.status
/// POST  /tasks/{id}/cancel        task.cancel
/// GET   /config                   config.get
/// PATCH /config                   config.set
/// GET   /status                   connection stats
/// ```
#[derive(Clone)]
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, format!("{}{}", self.base_url, path))
    }

    async fn send(builder: RequestBuilder) -> BackendResult<Response> {
        let res = builder
            .send()
            .await
            .map_err(|e| BackendError::Unreachable(e.to_string()))?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body
            };
            return Err(BackendError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(res)
    }

    async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> BackendResult<T> {
        let res = Self::send(builder).await?;
        let bytes = res
            .bytes()
            .await
            .map_err(|e| BackendError::Unreachable(e.to_string()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Pipelines report their own failures as `{"success": false, "error": "..."}` inside a 2xx.
fn pipeline_failure(pipeline_id: PipelineId, output: &Value) -> Option<BackendError> {
    if output.get("success").and_then(Value::as_bool) != Some(false) {
        return None;
    }
    let message = output
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("pipeline reported failure")
        .to_string();
    Some(BackendError::Pipeline { pipeline_id, message })
}

#[async_trait]
impl Backend for HttpBackend {
    async fn execute(&self, pipeline_id: PipelineId, input: Value) -> BackendResult<Value> {
        tracing::debug!(target: "ozone::backend", pipeline_id, "execute");
        let builder = self
            .request(Method::POST, &format!("/pipelines/{}/execute", pipeline_id))
            .json(&input);
        let output: Value = Self::send_json(builder).await?;
        match pipeline_failure(pipeline_id, &output) {
            Some(err) => Err(err),
            None => Ok(output),
        }
    }

    async fn task_list(&self) -> BackendResult<Vec<TaskSummary>> {
        Self::send_json(self.request(Method::GET, "/tasks")).await
    }

    async fn task_status(&self, task_id: &str) -> BackendResult<TaskSummary> {
        Self::send_json(self.request(Method::GET, &format!("/tasks/{}", task_id))).await
    }

    async fn task_cancel(&self, task_id: &str) -> BackendResult<()> {
        Self::send(self.request(Method::POST, &format!("/tasks/{}/cancel", task_id))).await?;
        Ok(())
    }

    async fn config_get(&self) -> BackendResult<Value> {
        Self::send_json(self.request(Method::GET, "/config")).await
    }

    async fn config_set(&self, updates: Value) -> BackendResult<Value> {
        Self::send_json(self.request(Method::PATCH, "/config").json(&updates)).await
    }

    async fn status(&self) -> BackendResult<ConnectionStats> {
        Self::send_json(self.request(Method::GET, "/status")).await
    }
}

#[async_trait]
impl Orchestrate for HttpBackend {
    async fn orchestrate(&self, request: OrchestrateRequest) -> BackendResult<OrchestrateResponse> {
        let builder = self.request(Method::POST, "/orchestrate").json(&request);
        match Self::send_json(builder).await {
            // 404/501 means this deployment has no orchestration endpoint.
            Err(BackendError::Rejected { status: 404 | 501, .. }) => Err(BackendError::OrchestrationUnavailable),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TaskStatus;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_execute_posts_input_and_returns_output() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pipelines/7/execute"))
            .and(body_json(json!({ "action": "GetCurrent" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "primary_emotion": "calm" })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = HttpBackend::new(server.uri());
        let out = backend
            .execute(7, json!({ "action": "GetCurrent" }))
            .await
            .expect("execute");
        assert_eq!(out["primary_emotion"], "calm");
    }

    #[tokio::test]
    async fn test_execute_pipeline_failure_in_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pipelines/6/execute"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "success": false, "error": "no microphone" })),
            )
            .mount(&server)
            .await;

        let backend = HttpBackend::new(server.uri());
        match backend.execute(6, json!({})).await {
            Err(BackendError::Pipeline { pipeline_id, message }) => {
                assert_eq!(pipeline_id, 6);
                assert_eq!(message, "no microphone");
            }
            other => panic!("expected pipeline error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_success_status_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks"))
            .respond_with(ResponseTemplate::new(500).set_body_string("engine down"))
            .mount(&server)
            .await;

        let backend = HttpBackend::new(server.uri());
        match backend.task_list().await {
            Err(BackendError::Rejected { status, message }) => {
                assert_eq!(status, 500);
                assert!(message.contains("engine down"));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_task_list_decodes_summaries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": "t1", "pipeline_id": 36, "status": "running", "step_data": { "file": "main.rs" } },
                { "id": "t2", "pipeline_id": 12, "status": "completed" }
            ])))
            .mount(&server)
            .await;

        let backend = HttpBackend::new(format!("{}/", server.uri()));
        let tasks = backend.task_list().await.expect("tasks");
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].status, TaskStatus::Running);
        assert_eq!(tasks[0].step_data, Some(json!({ "file": "main.rs" })));
        assert_eq!(tasks[1].step_data, None);
    }

    #[tokio::test]
    async fn test_cancel_and_config_routes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tasks/t9/cancel"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/config"))
            .and(body_json(json!({ "theme": "dark" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "theme": "dark", "voice": true })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = HttpBackend::new(server.uri());
        backend.task_cancel("t9").await.expect("cancel");
        let cfg = backend.config_set(json!({ "theme": "dark" })).await.expect("config");
        assert_eq!(cfg["voice"], true);
    }

    #[tokio::test]
    async fn test_orchestrate_missing_endpoint_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orchestrate"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let backend = HttpBackend::new(server.uri());
        let request = OrchestrateRequest {
            prompt: "hello".into(),
            project_id: None,
            workspace_id: None,
            user_id: "u".into(),
            device_id: "d".into(),
            consciousness_enabled: false,
            token_budget: 1024,
        };
        assert!(matches!(
            backend.orchestrate(request).await,
            Err(BackendError::OrchestrationUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        // Nothing listens on port 9 (discard) in the test environment.
        let backend = HttpBackend::with_timeout("http://127.0.0.1:9", Duration::from_secs(2));
        assert!(matches!(backend.status().await, Err(BackendError::Unreachable(_))));
    }
}

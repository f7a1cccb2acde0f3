//! Shared fixtures: a scripted in-memory backend and simple panel modules.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ozone_core::{
    Backend, BackendError, BackendResult, ConnectionStats, ModuleError, Orchestrate, OrchestrateRequest,
    OrchestrateResponse, PanelContext, PanelModule, PanelView, PipelineId, Shell, ShellConfig, StaticModules,
    TaskSummary, CORE_PIPELINES,
};
use serde_json::{json, Value};

/// Records every call and answers from a small script.
pub struct ScriptedBackend {
    pub calls: Mutex<Vec<(PipelineId, String)>>,
    pub orchestrations: Mutex<Vec<OrchestrateRequest>>,
    pub reply: Mutex<OrchestrateResponse>,
    pub speech_output_enabled: bool,
    pub speak_audio: Option<String>,
    /// Returned once, as a final transcription, by the next Transcribe call.
    pub transcript: Mutex<Option<String>>,
    pub tasks: Mutex<Vec<TaskSummary>>,
    pub connected: bool,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            orchestrations: Mutex::new(Vec::new()),
            reply: Mutex::new(OrchestrateResponse {
                response: "hi".into(),
                success: true,
                ..Default::default()
            }),
            speech_output_enabled: false,
            speak_audio: None,
            transcript: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
            connected: true,
        }
    }
}

impl ScriptedBackend {
    pub fn count(&self, pipeline_id: PipelineId, action: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, a)| *p == pipeline_id && a == action)
            .count()
    }

    pub fn actions_for(&self, pipeline_id: PipelineId) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| *p == pipeline_id)
            .map(|(_, a)| a.clone())
            .collect()
    }

    pub fn orchestrations(&self) -> Vec<OrchestrateRequest> {
        self.orchestrations.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn execute(&self, pipeline_id: PipelineId, input: Value) -> BackendResult<Value> {
        let action = input["action"].as_str().unwrap_or("prompt").to_string();
        self.calls.lock().unwrap().push((pipeline_id, action.clone()));
        match (pipeline_id, action.as_str()) {
            (1, _) => Ok(json!({ "response": format!("fallback: {}", input["prompt"].as_str().unwrap_or("")) })),
            (6, "GetStatus") => Ok(json!({ "speech_output_enabled": self.speech_output_enabled })),
            (6, "Speak") => Ok(match &self.speak_audio {
                Some(a) => json!({ "audio": a }),
                None => json!({}),
            }),
            (6, "Transcribe") => Ok(match self.transcript.lock().unwrap().take() {
                Some(text) => json!({ "text": text, "is_final": true }),
                None => json!({ "text": "", "is_final": false }),
            }),
            (7, "GetCurrent") => Ok(json!({
                "primary_emotion": "curious",
                "intensity": 0.6,
                "secondary_emotion": null,
                "valence": 0.3,
                "arousal": 0.5
            })),
            (8, "GetILoopStatus") => Ok(json!({
                "is_active": true,
                "current_question": "Why?",
                "questions_asked": 1,
                "insights_generated": 0
            })),
            (9, "GetVoice") => Ok(json!({ "warmth": 0.8, "formality": 0.5 })),
            _ => Ok(json!({ "ok": true })),
        }
    }

    async fn task_list(&self) -> BackendResult<Vec<TaskSummary>> {
        Ok(self.tasks.lock().unwrap().clone())
    }

    async fn task_status(&self, task_id: &str) -> BackendResult<TaskSummary> {
        self.tasks
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == task_id)
            .cloned()
            .ok_or_else(|| BackendError::Rejected {
                status: 404,
                message: format!("no task {}", task_id),
            })
    }

    async fn task_cancel(&self, _task_id: &str) -> BackendResult<()> {
        Ok(())
    }

    async fn config_get(&self) -> BackendResult<Value> {
        Ok(json!({}))
    }

    async fn config_set(&self, updates: Value) -> BackendResult<Value> {
        Ok(updates)
    }

    async fn status(&self) -> BackendResult<ConnectionStats> {
        self.calls.lock().unwrap().push((0, "status".into()));
        if self.connected {
            Ok(ConnectionStats {
                connected: true,
                latency_ms: Some(5),
                active_tasks: 0,
            })
        } else {
            Err(BackendError::Unreachable("connection refused".into()))
        }
    }
}

#[async_trait]
impl Orchestrate for ScriptedBackend {
    async fn orchestrate(&self, request: OrchestrateRequest) -> BackendResult<OrchestrateResponse> {
        self.orchestrations.lock().unwrap().push(request);
        Ok(self.reply.lock().unwrap().clone())
    }
}

/// Panel that renders its label and the step data it was created with.
pub struct LabelPanel {
    label: String,
    data: Option<Value>,
}

impl PanelModule for LabelPanel {
    fn render(&self) -> PanelView {
        let view = PanelView::new(self.label.clone());
        match &self.data {
            Some(d) => view.line(d.to_string()),
            None => view,
        }
    }
}

pub fn label_factory(ctx: &PanelContext) -> Result<Box<dyn PanelModule>, ModuleError> {
    Ok(Box::new(LabelPanel {
        label: ctx.label.clone(),
        data: ctx.initial_data.clone(),
    }))
}

/// Modules for the core pipelines plus the given extra pipelines.
pub fn modules(extra: &[PipelineId]) -> StaticModules {
    let mut modules = StaticModules::new();
    for id in CORE_PIPELINES.iter().chain(extra) {
        modules.register(*id, label_factory);
    }
    modules
}

/// Shell over the scripted backend. `primary` wires it as the orchestration entry point too.
pub fn build_shell(backend: &Arc<ScriptedBackend>, config: ShellConfig, extra: &[PipelineId], primary: bool) -> Shell {
    let mut builder = Shell::builder(config, backend.clone()).with_modules(modules(extra));
    if primary {
        builder = builder.with_orchestrator(backend.clone());
    }
    builder.build().expect("shell builds")
}

/// Config with affect off.
pub fn config() -> ShellConfig {
    ShellConfig {
        affect_enabled: false,
        ..ShellConfig::default()
    }
}

/// Route `ozone::*` logs to the test writer. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("ozone=debug")
        .with_test_writer()
        .try_init();
}

pub fn tick() -> Duration {
    Duration::from_millis(10)
}

//! **Task Lifecycle Bridge** — couples backend task steps to pipeline panels.
//!
//! ```text
//!   task engine ──step active──▶ on_step_active ──▶ inject(id, active + step data)
//!               ──step done────▶ on_step_complete ─▶ uninject("pipeline-<id>")
//!               ──task list────▶ on_tasks_changed ─▶ "tasks" badge
//! ```

use std::sync::Arc;

use serde_json::Value;

use crate::backend::TaskSummary;
use crate::panels::{InjectOptions, InjectOutcome, SharedPanelInjector, UninjectOutcome};
use crate::registry::{is_core_pipeline, pipeline_panel_id, PipelineId, PipelineUiRegistry, TASKS_PANEL_ID};

/// Hooks the task engine collaborator calls as steps start and finish.
#[derive(Clone)]
pub struct TaskLifecycleBridge {
    registry: Arc<PipelineUiRegistry>,
    injector: SharedPanelInjector,
    tasks_panel_id: String,
}

impl TaskLifecycleBridge {
    pub fn new(registry: Arc<PipelineUiRegistry>, injector: SharedPanelInjector) -> Self {
        Self {
            registry,
            injector,
            tasks_panel_id: TASKS_PANEL_ID.to_string(),
        }
    }

    /// A step of `pipeline_id` became active. Injects and selects its panel when the
    /// pipeline has a UI; `None` means the pipeline has no UI and nothing was touched.
    pub async fn on_step_active(&self, pipeline_id: PipelineId, step_data: Value) -> Option<InjectOutcome> {
        if !self.registry.has_pipeline_ui(pipeline_id) {
            tracing::debug!(target: "ozone::lifecycle", pipeline_id, "step active; pipeline has no UI");
            return None;
        }
        let opts = InjectOptions::active().with_initial_data(step_data);
        let outcome = self.injector.write().await.inject(pipeline_id, opts);
        tracing::info!(target: "ozone::lifecycle", pipeline_id, ?outcome, "step active");
        Some(outcome)
    }

    /// A step of `pipeline_id` completed. Core pipelines are skipped (`None`).
    pub async fn on_step_complete(&self, pipeline_id: PipelineId) -> Option<UninjectOutcome> {
        if is_core_pipeline(pipeline_id) {
            return None;
        }
        let outcome = self
            .injector
            .write()
            .await
            .uninject(&pipeline_panel_id(pipeline_id));
        tracing::info!(target: "ozone::lifecycle", pipeline_id, ?outcome, "step complete");
        Some(outcome)
    }

    /// Recompute the tasks badge: number of running or queued tasks, absent when zero.
    pub async fn on_tasks_changed(&self, tasks: &[TaskSummary]) -> Option<u32> {
        let badge = pending_badge(tasks);
        if !self.injector.write().await.set_badge(&self.tasks_panel_id, badge) {
            tracing::debug!(target: "ozone::lifecycle", panel_id = %self.tasks_panel_id, "tasks panel not mounted; badge dropped");
        }
        badge
    }
}

/// Running + queued count, or `None` for zero.
pub fn pending_badge(tasks: &[TaskSummary]) -> Option<u32> {
    let pending = tasks.iter().filter(|t| t.status.is_pending()).count() as u32;
    (pending > 0).then_some(pending)
}

//! Task driver: polls the backend task list and turns status changes into
//! step lifecycle events for the panel bridge.
//!
//! A task counts as an active step while it is `running`. A pipeline's step
//! completes once none of its tasks is `running` any more (finished, cancelled,
//! or no longer listed).

use std::collections::HashMap;
use std::sync::Arc;

use ozone_core::{Backend, BackendResult, PipelineId, TaskLifecycleBridge, TaskStatus, TaskSummary};
use serde_json::Value;

/// Step events derived from two consecutive task lists.
#[derive(Debug, Default, PartialEq)]
pub struct StepChanges {
    pub started: Vec<(PipelineId, Value)>,
    pub finished: Vec<PipelineId>,
}

/// Compare the running set from the previous poll with the current task list.
pub fn diff(running: &HashMap<String, PipelineId>, tasks: &[TaskSummary]) -> StepChanges {
    let mut changes = StepChanges::default();
    for task in tasks.iter().filter(|t| t.status == TaskStatus::Running) {
        if !running.contains_key(&task.id) {
            changes
                .started
                .push((task.pipeline_id, task.step_data.clone().unwrap_or(Value::Null)));
        }
    }
    for pipeline_id in running.values() {
        let pipeline_busy = tasks
            .iter()
            .any(|t| t.pipeline_id == *pipeline_id && t.status == TaskStatus::Running);
        if !pipeline_busy {
            changes.finished.push(*pipeline_id);
        }
    }
    changes.finished.sort_unstable();
    changes.finished.dedup();
    changes
}

pub struct TaskDriver {
    backend: Arc<dyn Backend>,
    lifecycle: TaskLifecycleBridge,
    running: HashMap<String, PipelineId>,
}

impl TaskDriver {
    pub fn new(backend: Arc<dyn Backend>, lifecycle: TaskLifecycleBridge) -> Self {
        Self {
            backend,
            lifecycle,
            running: HashMap::new(),
        }
    }

    /// One poll of the task list. Returns the new tasks badge.
    pub async fn sync(&mut self) -> BackendResult<Option<u32>> {
        let tasks = self.backend.task_list().await?;
        let changes = diff(&self.running, &tasks);

        for pipeline_id in changes.finished {
            self.lifecycle.on_step_complete(pipeline_id).await;
        }
        for (pipeline_id, step_data) in changes.started {
            self.lifecycle.on_step_active(pipeline_id, step_data).await;
        }

        self.running = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Running)
            .map(|t| (t.id.clone(), t.pipeline_id))
            .collect();
        Ok(self.lifecycle.on_tasks_changed(&tasks).await)
    }
}

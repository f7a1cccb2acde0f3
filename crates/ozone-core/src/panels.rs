//! **Panel Injector** — owns the mounted panels of the single content region.
//!
//! ## Panel lifecycle
//!
//! ```text
//!   Uninjected ──inject──▶ Injected ──set_active──▶ Active
//!        ▲                    │  ▲                    │
//!        │                    │  └───(other active)───┘  Inactive
//!        └─────uninject───────┘
//! ```
//!
//! Exactly one panel is selected at a time; inactive panels stay mounted.
//! Core panels are mounted once at startup through [`PanelInjector::mount_core`]
//! and every attempt to uninject them is rejected.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::modules::{ModuleLoader, PanelContext, PanelModule, PanelView};
use crate::registry::{pipeline_panel_id, PipelineId, PipelineUiRegistry, DEFAULT_PANEL_ID};

/// Injector shared between the shell, the lifecycle bridge and the host UI.
pub type SharedPanelInjector = Arc<RwLock<PanelInjector>>;

/// Descriptor of a mounted panel. Only `badge` changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelDescriptor {
    pub id: String,
    pub pipeline_id: PipelineId,
    pub label: String,
    pub icon: String,
    pub is_core: bool,
    pub badge: Option<u32>,
}

/// Options for [`PanelInjector::inject`].
#[derive(Debug, Clone, Default)]
pub struct InjectOptions {
    pub make_active: bool,
    pub initial_data: Option<Value>,
    /// Overrides the computed `pipeline-<id>` panel id.
    pub panel_id: Option<String>,
}

impl InjectOptions {
    pub fn active() -> Self {
        Self {
            make_active: true,
            ..Default::default()
        }
    }

    pub fn with_initial_data(mut self, data: Value) -> Self {
        self.initial_data = Some(data);
        self
    }
}

/// Outcome of an inject call. Never an error: injection is optional for the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectOutcome {
    /// A new panel was mounted under this id.
    Injected(String),
    /// A panel with the computed id was already mounted; only selection may have changed.
    AlreadyMounted(String),
    /// The module could not be loaded; nothing was mounted.
    Failed,
}

impl InjectOutcome {
    pub fn is_mounted(&self) -> bool {
        !matches!(self, InjectOutcome::Failed)
    }
}

/// Outcome of an uninject call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UninjectOutcome {
    Removed,
    /// Core panel; state unchanged.
    RejectedCore,
    NotFound,
}

struct MountedPanel {
    descriptor: PanelDescriptor,
    module: Box<dyn PanelModule>,
}

/// Ordered collection of mounted panels plus the current selection.
pub struct PanelInjector {
    registry: Arc<PipelineUiRegistry>,
    loader: ModuleLoader,
    panels: Vec<MountedPanel>,
    active: String,
    default_panel_id: String,
}

impl PanelInjector {
    pub fn new(registry: Arc<PipelineUiRegistry>, loader: ModuleLoader) -> Self {
        Self {
            registry,
            loader,
            panels: Vec::new(),
            active: DEFAULT_PANEL_ID.to_string(),
            default_panel_id: DEFAULT_PANEL_ID.to_string(),
        }
    }

    /// Override the panel id selection falls back to when nothing else is mounted.
    pub fn with_default_panel_id(mut self, id: impl Into<String>) -> Self {
        self.default_panel_id = id.into();
        self.active = self.default_panel_id.clone();
        self
    }

    pub fn into_shared(self) -> SharedPanelInjector {
        Arc::new(RwLock::new(self))
    }

    pub fn registry(&self) -> &PipelineUiRegistry {
        &self.registry
    }

    fn position(&self, panel_id: &str) -> Option<usize> {
        self.panels.iter().position(|p| p.descriptor.id == panel_id)
    }

    /// Mount a pipeline panel. Idempotent on the computed panel id.
    ///
    /// Core pipelines resolve to their well-known core panel; `inject` can select
    /// it but never mounts it (that is [`PanelInjector::mount_core`]'s job).
    pub fn inject(&mut self, pipeline_id: PipelineId, opts: InjectOptions) -> InjectOutcome {
        let core_panel_id = self
            .registry
            .get(pipeline_id)
            .filter(|e| e.is_core)
            .map(|e| e.panel_id());
        let panel_id = core_panel_id
            .clone()
            .or_else(|| opts.panel_id.clone())
            .unwrap_or_else(|| pipeline_panel_id(pipeline_id));

        if self.position(&panel_id).is_some() {
            tracing::debug!(target: "ozone::panels", panel_id = %panel_id, "panel already mounted");
            if opts.make_active {
                self.set_active(&panel_id);
            }
            return InjectOutcome::AlreadyMounted(panel_id);
        }

        if core_panel_id.is_some() {
            tracing::warn!(target: "ozone::panels", pipeline_id, "core panel not mounted; inject will not create it");
            return InjectOutcome::Failed;
        }

        self.mount(pipeline_id, panel_id, false, opts)
    }

    /// Mount the core panel for a core pipeline. Startup only; at most one per pipeline.
    pub fn mount_core(&mut self, pipeline_id: PipelineId) -> InjectOutcome {
        let Some(entry) = self.registry.get(pipeline_id).filter(|e| e.is_core).cloned() else {
            tracing::warn!(target: "ozone::panels", pipeline_id, "not a core pipeline; refusing core mount");
            return InjectOutcome::Failed;
        };
        if let Some(existing) = self
            .panels
            .iter()
            .find(|p| p.descriptor.is_core && p.descriptor.pipeline_id == pipeline_id)
        {
            return InjectOutcome::AlreadyMounted(existing.descriptor.id.clone());
        }
        self.mount(pipeline_id, entry.panel_id(), true, InjectOptions::default())
    }

    fn mount(
        &mut self,
        pipeline_id: PipelineId,
        panel_id: String,
        is_core: bool,
        opts: InjectOptions,
    ) -> InjectOutcome {
        let (label, icon) = self
            .registry
            .get(pipeline_id)
            .map(|e| (e.name.clone(), e.icon.clone()))
            .unwrap_or_else(|| (format!("Pipeline {}", pipeline_id), "🧩".to_string()));

        let ctx = PanelContext {
            pipeline_id,
            label: label.clone(),
            initial_data: opts.initial_data,
        };
        let Some(module) = self.loader.load_module(&ctx) else {
            return InjectOutcome::Failed;
        };

        tracing::info!(target: "ozone::panels", panel_id = %panel_id, pipeline_id, is_core, "🧩 panel injected");
        self.panels.push(MountedPanel {
            descriptor: PanelDescriptor {
                id: panel_id.clone(),
                pipeline_id,
                label,
                icon,
                is_core,
                badge: None,
            },
            module,
        });

        // The selection may already name this id (default panel id) before it was mounted.
        if self.active == panel_id {
            self.activate(&panel_id);
        } else if opts.make_active {
            self.set_active(&panel_id);
        }
        InjectOutcome::Injected(panel_id)
    }

    /// Remove a panel. Core panels are never removed.
    pub fn uninject(&mut self, panel_id: &str) -> UninjectOutcome {
        let Some(index) = self.position(panel_id) else {
            tracing::debug!(target: "ozone::panels", panel_id, "uninject: no such panel");
            return UninjectOutcome::NotFound;
        };
        if self.panels[index].descriptor.is_core {
            tracing::warn!(target: "ozone::panels", panel_id, "🛡️ refusing to uninject core panel");
            return UninjectOutcome::RejectedCore;
        }

        let mut removed = self.panels.remove(index);
        tracing::info!(target: "ozone::panels", panel_id, "panel uninjected");

        if self.active == panel_id {
            removed.module.on_deactivate();
            let fallback = self
                .panels
                .first()
                .map(|p| p.descriptor.id.clone())
                .unwrap_or_else(|| self.default_panel_id.clone());
            self.activate(&fallback);
        }
        UninjectOutcome::Removed
    }

    /// Select a mounted panel. Returns false (selection unchanged) for unknown ids.
    /// Selecting the already selected panel fires no hooks.
    pub fn set_active(&mut self, panel_id: &str) -> bool {
        if self.position(panel_id).is_none() {
            tracing::warn!(target: "ozone::panels", panel_id, "set_active: no such panel");
            return false;
        }
        if self.active == panel_id {
            return true;
        }
        if let Some(index) = self.position(&self.active.clone()) {
            self.panels[index].module.on_deactivate();
        }
        self.activate(panel_id);
        true
    }

    fn activate(&mut self, panel_id: &str) {
        self.active = panel_id.to_string();
        if let Some(index) = self.position(panel_id) {
            self.panels[index].module.on_activate();
        }
    }

    /// Set or clear the badge of a mounted panel.
    pub fn set_badge(&mut self, panel_id: &str, badge: Option<u32>) -> bool {
        match self.panels.iter_mut().find(|p| p.descriptor.id == panel_id) {
            Some(panel) => {
                panel.descriptor.badge = badge;
                true
            }
            None => false,
        }
    }

    /// Id of the selected panel (may be the default id even if nothing is mounted under it).
    pub fn active_panel_id(&self) -> &str {
        &self.active
    }

    pub fn panel(&self, panel_id: &str) -> Option<&PanelDescriptor> {
        self.panels
            .iter()
            .map(|p| &p.descriptor)
            .find(|d| d.id == panel_id)
    }

    pub fn contains(&self, panel_id: &str) -> bool {
        self.position(panel_id).is_some()
    }

    /// Descriptors in mount order.
    pub fn panels(&self) -> Vec<PanelDescriptor> {
        self.panels.iter().map(|p| p.descriptor.clone()).collect()
    }

    /// Number of panels mounted for a pipeline.
    pub fn count_for_pipeline(&self, pipeline_id: PipelineId) -> usize {
        self.panels
            .iter()
            .filter(|p| p.descriptor.pipeline_id == pipeline_id)
            .count()
    }

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    pub fn render(&self, panel_id: &str) -> Option<PanelView> {
        self.panels
            .iter()
            .find(|p| p.descriptor.id == panel_id)
            .map(|p| p.module.render())
    }

    pub fn render_active(&self) -> Option<PanelView> {
        self.render(&self.active)
    }
}

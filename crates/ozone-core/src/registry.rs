//! **Pipeline UI Registry** — static table of which pipelines can put a panel on screen.
//!
//! Panels are addressed purely by pipeline id, never by file path. The registry
//! answers the capability question ("does pipeline N have a UI module?") without
//! touching the module loader, and fixes the set of core pipelines at compile time.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque pipeline identifier (small positive integer assigned by the backend).
pub type PipelineId = u32;

/// Well-known pipeline identifiers used by the shell itself.
pub mod well_known {
    use super::PipelineId;

    /// Generic prompt pipeline used by the fallback submission path.
    pub const PROMPT: PipelineId = 1;
    pub const WORKSPACE: PipelineId = 2;
    pub const TASKS: PipelineId = 3;
    pub const LIBRARY: PipelineId = 4;
    pub const SETTINGS: PipelineId = 5;
    /// Voice capture, transcription and synthesis.
    pub const VOICE: PipelineId = 6;
    pub const EMOTIONAL_STATE: PipelineId = 7;
    /// Self-reflection ("I-Loop") status.
    pub const REFLECTION: PipelineId = 8;
    pub const VOICE_IDENTITY: PipelineId = 9;
}

/// Pipelines whose panels are mounted once at startup and never removed.
pub const CORE_PIPELINES: &[PipelineId] = &[
    well_known::WORKSPACE,
    well_known::TASKS,
    well_known::LIBRARY,
    well_known::SETTINGS,
];

/// Panel id of the core workspace panel; selection falls back here when nothing else is mounted.
pub const DEFAULT_PANEL_ID: &str = "workspace";

/// Panel id of the core tasks panel that carries the running/queued badge.
pub const TASKS_PANEL_ID: &str = "tasks";

/// Computed id for a pipeline panel without an explicit id.
pub fn pipeline_panel_id(pipeline_id: PipelineId) -> String {
    format!("pipeline-{}", pipeline_id)
}

/// True when `pipeline_id` is one of the statically declared core pipelines.
pub fn is_core_pipeline(pipeline_id: PipelineId) -> bool {
    CORE_PIPELINES.contains(&pipeline_id)
}

/// One row of the registry. Immutable once the registry is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineUiEntry {
    pub pipeline_id: PipelineId,
    /// Whether a runtime-loadable UI module exists for this pipeline.
    pub has_ui_module: bool,
    pub name: String,
    pub icon: String,
    #[serde(default)]
    pub is_core: bool,
    /// Explicit panel id. Core entries only (short well-known ids like `"tasks"`);
    /// non-core panels are always mounted under `pipeline-<id>`.
    #[serde(default)]
    pub panel_id: Option<String>,
}

impl PipelineUiEntry {
    pub fn new(pipeline_id: PipelineId, name: &str, icon: &str, has_ui_module: bool) -> Self {
        Self {
            pipeline_id,
            has_ui_module,
            name: name.to_string(),
            icon: icon.to_string(),
            is_core: false,
            panel_id: None,
        }
    }

    fn core(pipeline_id: PipelineId, name: &str, icon: &str, panel_id: &str) -> Self {
        Self {
            pipeline_id,
            has_ui_module: true,
            name: name.to_string(),
            icon: icon.to_string(),
            is_core: true,
            panel_id: Some(panel_id.to_string()),
        }
    }

    /// Id the panel for this pipeline is mounted under.
    pub fn panel_id(&self) -> String {
        self.panel_id
            .clone()
            .unwrap_or_else(|| pipeline_panel_id(self.pipeline_id))
    }
}

/// Registry of pipeline UI capabilities, keyed by pipeline id.
#[derive(Debug, Clone, Default)]
pub struct PipelineUiRegistry {
    entries: BTreeMap<PipelineId, PipelineUiEntry>,
}

impl PipelineUiRegistry {
    /// Empty registry (tests and custom hosts).
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in table shipped with the shell.
    pub fn builtin() -> Self {
        use well_known::*;
        let mut registry = Self::new();
        for entry in [
            PipelineUiEntry::core(WORKSPACE, "Workspace", "🗂", DEFAULT_PANEL_ID),
            PipelineUiEntry::core(TASKS, "Tasks", "📋", TASKS_PANEL_ID),
            PipelineUiEntry::core(LIBRARY, "Library", "📚", "library"),
            PipelineUiEntry::core(SETTINGS, "Settings", "⚙", "settings"),
            PipelineUiEntry::new(PROMPT, "Prompt", "💬", false),
            PipelineUiEntry::new(VOICE, "Voice", "🎤", false),
            PipelineUiEntry::new(EMOTIONAL_STATE, "Emotional State", "💗", false),
            PipelineUiEntry::new(REFLECTION, "Reflection", "🪞", false),
            PipelineUiEntry::new(VOICE_IDENTITY, "Voice Identity", "🗣", false),
            PipelineUiEntry::new(12, "Web Research", "🔎", true),
            PipelineUiEntry::new(24, "Document Analysis", "📄", true),
            PipelineUiEntry::new(36, "Code Generation", "💻", true),
            PipelineUiEntry::new(41, "Image Analysis", "🖼", true),
        ] {
            registry.entries.insert(entry.pipeline_id, entry);
        }
        registry
    }

    /// Add or replace entries (e.g. from configuration).
    ///
    /// Core status cannot be granted or revoked here: the core set is fixed by
    /// [`CORE_PIPELINES`], so supplied entries have `is_core` recomputed. An explicit
    /// `panel_id` on a non-core entry is dropped.
    pub fn with_entries(mut self, entries: impl IntoIterator<Item = PipelineUiEntry>) -> Self {
        for mut entry in entries {
            entry.is_core = is_core_pipeline(entry.pipeline_id);
            if entry.is_core {
                if let Some(existing) = self.entries.get(&entry.pipeline_id) {
                    entry.panel_id = entry.panel_id.or_else(|| existing.panel_id.clone());
                }
            } else if let Some(ignored) = entry.panel_id.take() {
                tracing::warn!(
                    target: "ozone::registry",
                    pipeline_id = entry.pipeline_id,
                    panel_id = %ignored,
                    "panel_id only applies to core pipelines; ignoring"
                );
            }
            tracing::debug!(
                target: "ozone::registry",
                pipeline_id = entry.pipeline_id,
                has_ui = entry.has_ui_module,
                "registry entry added"
            );
            self.entries.insert(entry.pipeline_id, entry);
        }
        self
    }

    /// Capability query: does this pipeline have a loadable UI module? Never loads anything.
    pub fn has_pipeline_ui(&self, pipeline_id: PipelineId) -> bool {
        self.entries
            .get(&pipeline_id)
            .map(|e| e.has_ui_module)
            .unwrap_or(false)
    }

    pub fn get(&self, pipeline_id: PipelineId) -> Option<&PipelineUiEntry> {
        self.entries.get(&pipeline_id)
    }

    /// Core entries in declaration order of [`CORE_PIPELINES`].
    pub fn core_entries(&self) -> Vec<&PipelineUiEntry> {
        CORE_PIPELINES
            .iter()
            .filter_map(|id| self.entries.get(id))
            .collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &PipelineUiEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

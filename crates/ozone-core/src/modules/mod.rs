//! **Panel Modules** — typed plugin interface for pipeline UI.
//!
//! A pipeline's UI is a [`PanelModule`] produced by a [`PanelModuleFactory`].
//! Factories are resolved by pipeline id through the [`ModuleLoader`], which walks
//! an ordered list of [`ModuleSource`]s (in-process registrations first, then
//! optional dynamic libraries). Nothing here knows which pipelines exist; that
//! is the registry's job.
//!
//! ```rust,ignore
//! let mut modules = StaticModules::new();
//! modules.register(36, |ctx: &PanelContext| {
//!     Ok(Box::new(CodeGenPanel::new(ctx)) as Box<dyn PanelModule>)
//! });
//! let loader = ModuleLoader::new().with_source(modules);
//! ```

mod loader;

#[cfg(feature = "dylib-panels")]
pub mod dylib;

pub use loader::{ModuleLoader, ModuleSource, StaticModules};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ModuleError;
use crate::registry::PipelineId;

/// What a panel draws into the content region. Hosts decide how to paint it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PanelView {
    pub title: String,
    #[serde(default)]
    pub lines: Vec<String>,
}

impl PanelView {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            lines: Vec::new(),
        }
    }

    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }
}

/// Data handed to a factory when a panel is instantiated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelContext {
    pub pipeline_id: PipelineId,
    pub label: String,
    /// Step data from the task engine when injected by the lifecycle bridge.
    #[serde(default)]
    pub initial_data: Option<Value>,
}

/// A mounted pipeline UI.
pub trait PanelModule: Send + Sync {
    fn render(&self) -> PanelView;

    /// Called when the panel becomes the selected panel.
    fn on_activate(&mut self) {}

    /// Called when another panel takes the selection. The panel stays mounted.
    fn on_deactivate(&mut self) {}
}

/// Produces panel instances for one pipeline.
pub trait PanelModuleFactory: Send + Sync {
    fn create(&self, ctx: &PanelContext) -> Result<Box<dyn PanelModule>, ModuleError>;
}

impl<F> PanelModuleFactory for F
where
    F: Fn(&PanelContext) -> Result<Box<dyn PanelModule>, ModuleError> + Send + Sync,
{
    fn create(&self, ctx: &PanelContext) -> Result<Box<dyn PanelModule>, ModuleError> {
        self(ctx)
    }
}

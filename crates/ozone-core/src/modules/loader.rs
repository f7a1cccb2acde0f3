//! Module loader: resolve a factory per pipeline id, instantiate, never fail loudly.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use super::{PanelContext, PanelModule, PanelModuleFactory};
use crate::error::ModuleError;
use crate::registry::PipelineId;

/// Somewhere panel factories can come from.
pub trait ModuleSource: Send + Sync {
    /// Short name for logs (e.g. "static", "dylib").
    fn name(&self) -> &str;

    /// `Ok(None)` means this source has nothing for the pipeline; try the next one.
    fn resolve(&self, pipeline_id: PipelineId) -> Result<Option<Arc<dyn PanelModuleFactory>>, ModuleError>;
}

/// In-process factories registered by the host at startup.
#[derive(Default)]
pub struct StaticModules {
    factories: HashMap<PipelineId, Arc<dyn PanelModuleFactory>>,
}

impl StaticModules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the factory closure for a pipeline.
    pub fn register<F>(&mut self, pipeline_id: PipelineId, factory: F)
    where
        F: Fn(&PanelContext) -> Result<Box<dyn PanelModule>, ModuleError> + Send + Sync + 'static,
    {
        self.factories.insert(pipeline_id, Arc::new(factory));
    }

    /// Register a factory object (e.g. one shared by several pipelines).
    pub fn register_factory(&mut self, pipeline_id: PipelineId, factory: Arc<dyn PanelModuleFactory>) {
        self.factories.insert(pipeline_id, factory);
    }

    pub fn with<F>(mut self, pipeline_id: PipelineId, factory: F) -> Self
    where
        F: Fn(&PanelContext) -> Result<Box<dyn PanelModule>, ModuleError> + Send + Sync + 'static,
    {
        self.register(pipeline_id, factory);
        self
    }

    pub fn pipeline_ids(&self) -> Vec<PipelineId> {
        let mut ids: Vec<PipelineId> = self.factories.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl ModuleSource for StaticModules {
    fn name(&self) -> &str {
        "static"
    }

    fn resolve(&self, pipeline_id: PipelineId) -> Result<Option<Arc<dyn PanelModuleFactory>>, ModuleError> {
        Ok(self.factories.get(&pipeline_id).cloned())
    }
}

/// Resolves pipeline ids to panel modules through an ordered list of sources.
///
/// Resolved factories are cached, so loading the same pipeline twice yields
/// modules from the same factory. Failed resolutions are not cached; a library
/// dropped into the module directory later is picked up on the next load.
#[derive(Default)]
pub struct ModuleLoader {
    sources: Vec<Box<dyn ModuleSource>>,
    cache: HashMap<PipelineId, Arc<dyn PanelModuleFactory>>,
}

impl ModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source. Earlier sources win.
    pub fn with_source(mut self, source: impl ModuleSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    fn resolve(&mut self, pipeline_id: PipelineId) -> Result<Arc<dyn PanelModuleFactory>, ModuleError> {
        if let Some(factory) = self.cache.get(&pipeline_id) {
            return Ok(Arc::clone(factory));
        }

        let mut last_error = None;
        for source in &self.sources {
            match source.resolve(pipeline_id) {
                Ok(Some(factory)) => {
                    tracing::debug!(
                        target: "ozone::modules",
                        pipeline_id,
                        source = source.name(),
                        "panel module resolved"
                    );
                    self.cache.insert(pipeline_id, Arc::clone(&factory));
                    return Ok(factory);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        target: "ozone::modules",
                        pipeline_id,
                        source = source.name(),
                        error = %e,
                        "panel module source failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(ModuleError::NotFound(pipeline_id)))
    }

    /// Load and instantiate the UI module for a pipeline.
    ///
    /// Returns `None` when the module is absent, malformed, or errors/panics while
    /// instantiating. The failure is logged as a warning and never propagated.
    pub fn load_module(&mut self, ctx: &PanelContext) -> Option<Box<dyn PanelModule>> {
        match self.try_load(ctx) {
            Ok(module) => Some(module),
            Err(e) => {
                tracing::warn!(
                    target: "ozone::modules",
                    pipeline_id = ctx.pipeline_id,
                    error = %e,
                    "⚠️ panel module unavailable"
                );
                None
            }
        }
    }

    fn try_load(&mut self, ctx: &PanelContext) -> Result<Box<dyn PanelModule>, ModuleError> {
        let factory = self.resolve(ctx.pipeline_id)?;
        match catch_unwind(AssertUnwindSafe(|| factory.create(ctx))) {
            Ok(result) => result,
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "panic during instantiation".to_string());
                Err(ModuleError::Instantiation {
                    pipeline_id: ctx.pipeline_id,
                    reason,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::PanelView;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Label(String);

    impl PanelModule for Label {
        fn render(&self) -> PanelView {
            PanelView::new(self.0.clone())
        }
    }

    fn ctx(pipeline_id: PipelineId) -> PanelContext {
        PanelContext {
            pipeline_id,
            label: format!("Pipeline {}", pipeline_id),
            initial_data: None,
        }
    }

    struct CountingSource {
        hits: Arc<AtomicUsize>,
    }

    impl ModuleSource for CountingSource {
        fn name(&self) -> &str {
            "counting"
        }

        fn resolve(&self, _pipeline_id: PipelineId) -> Result<Option<Arc<dyn PanelModuleFactory>>, ModuleError> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            let factory = |c: &PanelContext| -> Result<Box<dyn PanelModule>, ModuleError> {
                Ok(Box::new(Label(c.label.clone())))
            };
            Ok(Some(Arc::new(factory)))
        }
    }

    #[test]
    fn test_missing_module_returns_none() {
        let mut loader = ModuleLoader::new().with_source(StaticModules::new());
        assert!(loader.load_module(&ctx(36)).is_none());
    }

    #[test]
    fn test_instantiation_error_returns_none() {
        let modules = StaticModules::new().with(36, |c: &PanelContext| {
            Err(ModuleError::Malformed {
                pipeline_id: c.pipeline_id,
                reason: "bad manifest".to_string(),
            })
        });
        let mut loader = ModuleLoader::new().with_source(modules);
        assert!(loader.load_module(&ctx(36)).is_none());
    }

    #[test]
    fn test_panicking_factory_returns_none() {
        let modules = StaticModules::new().with(36, |_c: &PanelContext| -> Result<Box<dyn PanelModule>, ModuleError> {
            panic!("boom")
        });
        let mut loader = ModuleLoader::new().with_source(modules);
        assert!(loader.load_module(&ctx(36)).is_none());
    }

    #[test]
    fn test_loading_twice_resolves_once_and_renders_equivalently() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut loader = ModuleLoader::new().with_source(CountingSource { hits: Arc::clone(&hits) });

        let first = loader.load_module(&ctx(36)).expect("first load");
        let second = loader.load_module(&ctx(36)).expect("second load");

        assert_eq!(first.render(), second.render());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_earlier_source_wins() {
        let first = StaticModules::new().with(36, |_c: &PanelContext| {
            Ok(Box::new(Label("first".into())) as Box<dyn PanelModule>)
        });
        let second = StaticModules::new().with(36, |_c: &PanelContext| {
            Ok(Box::new(Label("second".into())) as Box<dyn PanelModule>)
        });
        let mut loader = ModuleLoader::new().with_source(first).with_source(second);
        let module = loader.load_module(&ctx(36)).expect("module");
        assert_eq!(module.render().title, "first");
        assert_eq!(loader.source_names(), vec!["static", "static"]);
    }
}

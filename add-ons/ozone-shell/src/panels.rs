//! Built-in panel modules: the four core panels plus a generic step panel for
//! every pipeline the built-in registry marks as having a UI.

use ozone_core::{well_known, ModuleError, PanelContext, PanelModule, PanelView, PipelineId, StaticModules};
use serde_json::Value;

/// Pipelines with a UI in the built-in registry that get the generic step panel.
const STEP_PIPELINES: &[PipelineId] = &[12, 24, 36, 41];

struct CorePanel {
    title: String,
    hint: &'static str,
    visits: u32,
}

impl PanelModule for CorePanel {
    fn render(&self) -> PanelView {
        PanelView::new(self.title.clone())
            .line(self.hint)
            .line(format!("opened {} time(s)", self.visits))
    }

    fn on_activate(&mut self) {
        self.visits += 1;
    }
}

fn core_hint(pipeline_id: PipelineId) -> &'static str {
    match pipeline_id {
        well_known::WORKSPACE => "Type a prompt and press enter. /help lists commands.",
        well_known::TASKS => "Running and queued tasks are counted on this panel's badge.",
        well_known::LIBRARY => "Saved documents and results.",
        well_known::SETTINGS => "/affect on|off toggles affect, reflection and speech.",
        _ => "",
    }
}

fn core_panel(ctx: &PanelContext) -> Result<Box<dyn PanelModule>, ModuleError> {
    Ok(Box::new(CorePanel {
        title: ctx.label.clone(),
        hint: core_hint(ctx.pipeline_id),
        visits: 0,
    }))
}

/// Shows the step data the task engine handed over when the panel was injected.
struct StepPanel {
    title: String,
    data: Option<Value>,
}

impl PanelModule for StepPanel {
    fn render(&self) -> PanelView {
        let view = PanelView::new(self.title.clone());
        match &self.data {
            Some(Value::Object(map)) if !map.is_empty() => map
                .iter()
                .fold(view, |view, (k, v)| view.line(format!("{}: {}", k, v))),
            Some(Value::Null) | None => view.line("waiting for step data"),
            Some(other) => view.line(other.to_string()),
        }
    }
}

fn step_panel(ctx: &PanelContext) -> Result<Box<dyn PanelModule>, ModuleError> {
    Ok(Box::new(StepPanel {
        title: ctx.label.clone(),
        data: ctx.initial_data.clone(),
    }))
}

pub fn builtin_modules() -> StaticModules {
    let mut modules = StaticModules::new();
    for id in [
        well_known::WORKSPACE,
        well_known::TASKS,
        well_known::LIBRARY,
        well_known::SETTINGS,
    ] {
        modules.register(id, core_panel);
    }
    for id in STEP_PIPELINES {
        modules.register(*id, step_panel);
    }
    modules
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(pipeline_id: PipelineId, data: Option<Value>) -> PanelContext {
        PanelContext {
            pipeline_id,
            label: format!("P{}", pipeline_id),
            initial_data: data,
        }
    }

    #[test]
    fn test_step_panel_lists_object_fields() {
        let panel = step_panel(&ctx(36, Some(json!({ "file": "main.rs" })))).unwrap();
        assert_eq!(panel.render().lines, vec!["file: \"main.rs\"".to_string()]);
    }

    #[test]
    fn test_step_panel_without_data() {
        let panel = step_panel(&ctx(12, None)).unwrap();
        assert_eq!(panel.render().lines, vec!["waiting for step data".to_string()]);
    }

    #[test]
    fn test_core_panel_counts_activations() {
        let mut panel = core_panel(&ctx(well_known::TASKS, None)).unwrap();
        panel.on_activate();
        panel.on_activate();
        assert_eq!(panel.render().lines[1], "opened 2 time(s)");
    }

    #[test]
    fn test_every_core_and_step_pipeline_has_a_module() {
        assert_eq!(builtin_modules().pipeline_ids(), vec![2, 3, 4, 5, 12, 24, 36, 41]);
    }
}

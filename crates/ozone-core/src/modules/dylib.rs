//! Dynamic-library panel modules: drop `ozone_panel_<id>` into the module dir, no host rebuild.
//!
//! C ABI expected from the library:
//!
//! ```c
//! // ctx_json: PanelContext as JSON. Returns PanelView as JSON (allocated by the library).
//! char *ozone_panel_render(const char *ctx_json);
//! void  ozone_panel_free(char *view_json);
//! ```

use libloading::Library;
use std::ffi::{c_char, CStr, CString};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{ModuleSource, PanelContext, PanelModule, PanelModuleFactory, PanelView};
use crate::error::ModuleError;
use crate::registry::PipelineId;

type RenderFn = unsafe extern "C" fn(*const c_char) -> *mut c_char;
type FreeFn = unsafe extern "C" fn(*mut c_char);

/// Library handle plus resolved symbols; the handle keeps the symbols valid.
struct PanelLibrary {
    _lib: Library,
    render: RenderFn,
    free: FreeFn,
}

impl PanelLibrary {
    fn render_json(&self, ctx_json: &CStr) -> Result<PanelView, String> {
        let out_ptr = unsafe { (self.render)(ctx_json.as_ptr()) };
        if out_ptr.is_null() {
            return Err("ozone_panel_render returned null".to_string());
        }
        let out = unsafe {
            let s = CStr::from_ptr(out_ptr).to_string_lossy().into_owned();
            (self.free)(out_ptr);
            s
        };
        serde_json::from_str(&out).map_err(|e| e.to_string())
    }
}

struct DylibFactory {
    pipeline_id: PipelineId,
    library: Arc<PanelLibrary>,
}

impl PanelModuleFactory for DylibFactory {
    fn create(&self, ctx: &PanelContext) -> Result<Box<dyn PanelModule>, ModuleError> {
        let json = serde_json::to_string(ctx).map_err(|e| ModuleError::Instantiation {
            pipeline_id: self.pipeline_id,
            reason: e.to_string(),
        })?;
        let ctx_json = CString::new(json).map_err(|e| ModuleError::Instantiation {
            pipeline_id: self.pipeline_id,
            reason: e.to_string(),
        })?;
        let panel = DylibPanel {
            label: ctx.label.clone(),
            library: Arc::clone(&self.library),
            ctx_json,
        };
        // First render doubles as the instantiation check.
        panel
            .library
            .render_json(&panel.ctx_json)
            .map_err(|reason| ModuleError::Instantiation {
                pipeline_id: self.pipeline_id,
                reason,
            })?;
        Ok(Box::new(panel))
    }
}

struct DylibPanel {
    label: String,
    library: Arc<PanelLibrary>,
    ctx_json: CString,
}

impl PanelModule for DylibPanel {
    fn render(&self) -> PanelView {
        match self.library.render_json(&self.ctx_json) {
            Ok(view) => view,
            Err(e) => {
                tracing::warn!(target: "ozone::modules", panel = %self.label, error = %e, "dylib render failed");
                PanelView::new(self.label.clone()).line(format!("render failed: {}", e))
            }
        }
    }
}

/// Resolves panel modules from shared libraries in a directory.
pub struct DylibModules {
    dir: PathBuf,
}

impl DylibModules {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Platform file name for a pipeline's library (e.g. `libozone_panel_36.so`).
    pub fn library_path(&self, pipeline_id: PipelineId) -> PathBuf {
        self.dir
            .join(libloading::library_filename(format!("ozone_panel_{}", pipeline_id)))
    }

    fn open(path: &Path, pipeline_id: PipelineId) -> Result<PanelLibrary, ModuleError> {
        let malformed = |reason: String| ModuleError::Malformed { pipeline_id, reason };
        let lib = unsafe { Library::new(path).map_err(|e| malformed(format!("libloading: {}", e)))? };
        let render: RenderFn = unsafe {
            *lib.get(b"ozone_panel_render")
                .map_err(|e| malformed(format!("symbol ozone_panel_render: {}", e)))?
        };
        let free: FreeFn = unsafe {
            *lib.get(b"ozone_panel_free")
                .map_err(|e| malformed(format!("symbol ozone_panel_free: {}", e)))?
        };
        Ok(PanelLibrary { _lib: lib, render, free })
    }
}

impl ModuleSource for DylibModules {
    fn name(&self) -> &str {
        "dylib"
    }

    fn resolve(&self, pipeline_id: PipelineId) -> Result<Option<Arc<dyn PanelModuleFactory>>, ModuleError> {
        let path = self.library_path(pipeline_id);
        if !path.exists() {
            return Ok(None);
        }
        tracing::info!(target: "ozone::modules", pipeline_id, path = %path.display(), "loading panel library");
        let library = Self::open(&path, pipeline_id)?;
        Ok(Some(Arc::new(DylibFactory {
            pipeline_id,
            library: Arc::new(library),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_library_is_not_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = DylibModules::new(dir.path());
        assert!(matches!(source.resolve(36), Ok(None)));
    }

    #[test]
    fn test_garbage_library_is_malformed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = DylibModules::new(dir.path());
        std::fs::write(source.library_path(36), b"not a shared object").expect("write");
        assert!(matches!(
            source.resolve(36),
            Err(ModuleError::Malformed { pipeline_id: 36, .. })
        ));
    }
}

//! ozone-core: panel injection and conversation orchestration for the Ozone shell.
//!
//! Pipeline panels are mounted into a single content region by pipeline id and
//! follow the lifecycle of the backend task that owns them. User prompts flow
//! through the conversation orchestrator, with affect and voice bridges hanging
//! off the response path. The backend itself is only reached through the
//! [`Backend`] / [`Orchestrate`] traits.

mod error;
mod lifecycle;
mod panels;
mod poller;
mod registry;

pub mod affect;
pub mod backend;
pub mod config;
pub mod connection;
pub mod conversation;
pub mod modules;
pub mod shell;
pub mod voice;

// Errors
pub use error::{BackendError, BackendResult, CoreError, ModuleError, VoiceError, VoiceResult};

// Registry + panels
pub use registry::{
    is_core_pipeline, pipeline_panel_id, well_known, PipelineId, PipelineUiEntry, PipelineUiRegistry,
    CORE_PIPELINES, DEFAULT_PANEL_ID, TASKS_PANEL_ID,
};
pub use modules::{ModuleLoader, ModuleSource, PanelContext, PanelModule, PanelModuleFactory, PanelView, StaticModules};
pub use panels::{
    InjectOptions, InjectOutcome, PanelDescriptor, PanelInjector, SharedPanelInjector, UninjectOutcome,
};
pub use lifecycle::{pending_badge, TaskLifecycleBridge};

// Backend boundary
pub use backend::{
    Backend, ConnectionStats, HttpBackend, Orchestrate, OrchestrateRequest, OrchestrateResponse, TaskStatus,
    TaskSummary,
};

// Conversation, affect, voice
pub use affect::{AffectSnapshot, AffectStateBridge, AffectTrigger, ReflectionSnapshot};
pub use conversation::{
    ConversationOrchestrator, ConversationState, ConversationTurn, PromptField, RejectReason, Role,
    SubmitOutcome, SubmitPath,
};
pub use voice::{AudioPlayer, AudioSource, BufferedAudio, ListeningState, SpeakOutcome, VoiceBridge};

// Ambient
pub use config::{FeatureFlags, ShellConfig};
pub use connection::{ConnectionMonitor, ConnectionState};
pub use poller::{Poller, PollerHandle};
pub use shell::{Shell, ShellBuilder};

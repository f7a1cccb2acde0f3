//! **Shell** — composition root.
//!
//! ```text
//!   ShellConfig ─┐
//!   Backend ─────┼─▶ ShellBuilder::build ─▶ Shell
//!   modules ─────┘        │
//!                         ├─ registry (builtin + [[pipelines]])
//!                         ├─ injector (core panels mounted here, once)
//!                         ├─ lifecycle bridge
//!                         ├─ conversation (strategy picked here)
//!                         ├─ affect / voice bridges
//!                         └─ connection state
//! ```
//!
//! `start` launches the connection and affect pollers; `shutdown` stops every
//! poller including an active capture session.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::affect::AffectStateBridge;
use crate::backend::{Backend, Orchestrate};
use crate::config::{FeatureFlags, ShellConfig};
use crate::connection::{ConnectionMonitor, ConnectionState};
use crate::conversation::{select_strategy, ConversationOrchestrator, PromptField, SubmitContext};
use crate::error::{CoreError, VoiceResult};
use crate::lifecycle::TaskLifecycleBridge;
use crate::modules::{ModuleLoader, StaticModules};
use crate::panels::{InjectOutcome, PanelInjector, SharedPanelInjector};
use crate::poller::PollerHandle;
use crate::registry::PipelineUiRegistry;
use crate::voice::{AudioPlayer, AudioSource, BufferedAudio, VoiceBridge, VoiceDefaults};

/// Used when the host has no audio output: playback ends as soon as it starts.
struct NoPlayback;

#[async_trait]
impl AudioPlayer for NoPlayback {
    async fn play(&self, audio: Vec<u8>) -> VoiceResult<()> {
        tracing::debug!(target: "ozone::voice", bytes = audio.len(), "no audio output; dropping speech");
        Ok(())
    }
}

pub struct ShellBuilder {
    config: ShellConfig,
    backend: Arc<dyn Backend>,
    orchestrator: Option<Arc<dyn Orchestrate>>,
    modules: StaticModules,
    audio: Option<Arc<dyn AudioSource>>,
    player: Option<Arc<dyn AudioPlayer>>,
}

impl ShellBuilder {
    pub fn new(config: ShellConfig, backend: Arc<dyn Backend>) -> Self {
        Self {
            config,
            backend,
            orchestrator: None,
            modules: StaticModules::new(),
            audio: None,
            player: None,
        }
    }

    /// Wire the primary orchestration entry point. Ignored when
    /// `primary_orchestration` is off in the config.
    pub fn with_orchestrator(mut self, orchestrator: Arc<dyn Orchestrate>) -> Self {
        self.orchestrator = Some(orchestrator);
        self
    }

    pub fn with_modules(mut self, modules: StaticModules) -> Self {
        self.modules = modules;
        self
    }

    pub fn with_audio(mut self, audio: Arc<dyn AudioSource>) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn with_player(mut self, player: Arc<dyn AudioPlayer>) -> Self {
        self.player = Some(player);
        self
    }

    fn loader(config: &ShellConfig, modules: StaticModules) -> ModuleLoader {
        let loader = ModuleLoader::new().with_source(modules);
        match &config.panel_module_dir {
            #[cfg(feature = "dylib-panels")]
            Some(dir) => loader.with_source(crate::modules::dylib::DylibModules::new(dir)),
            #[cfg(not(feature = "dylib-panels"))]
            Some(dir) => {
                tracing::warn!(
                    target: "ozone::shell",
                    dir = %dir.display(),
                    "panel_module_dir set but built without dylib-panels; ignoring"
                );
                loader
            }
            None => loader,
        }
    }

    /// Build the shell and mount every core panel. A core panel that cannot be
    /// mounted is a startup error.
    pub fn build(self) -> Result<Shell, CoreError> {
        let config = self.config;
        let registry = Arc::new(PipelineUiRegistry::builtin().with_entries(config.pipelines.clone()));

        let mut injector = PanelInjector::new(Arc::clone(&registry), Self::loader(&config, self.modules))
            .with_default_panel_id(config.default_panel_id.clone());
        for entry in registry.core_entries() {
            if injector.mount_core(entry.pipeline_id) == InjectOutcome::Failed {
                return Err(CoreError::CorePanel {
                    pipeline_id: entry.pipeline_id,
                    reason: "UI module could not be loaded".to_string(),
                });
            }
        }
        let injector = injector.into_shared();

        let flags = FeatureFlags::new(config.affect_enabled);
        let connection = ConnectionState::default();
        let prompt = PromptField::new();

        let affect = AffectStateBridge::new(Arc::clone(&self.backend), flags.clone())
            .with_period(config.affect_poll_interval());

        let voice = Arc::new(
            VoiceBridge::new(
                Arc::clone(&self.backend),
                flags.clone(),
                prompt.clone(),
                self.audio.unwrap_or_else(|| Arc::new(BufferedAudio::new())),
                self.player.unwrap_or_else(|| Arc::new(NoPlayback)),
            )
            .with_defaults(VoiceDefaults {
                style: config.default_voice_style.clone(),
                rate: config.default_speech_rate,
            })
            .with_mic_period(config.mic_poll_interval()),
        );

        let orchestrator = if config.primary_orchestration { self.orchestrator } else { None };
        let strategy = select_strategy(orchestrator, Arc::clone(&self.backend));
        let context = SubmitContext {
            project_id: config.project_id.clone(),
            workspace_id: config.workspace_id.clone(),
            user_id: config.user_id.clone(),
            device_id: config.device_id.clone(),
            affect_enabled: config.affect_enabled,
            token_budget: config.token_budget,
        };
        let conversation = Arc::new(
            ConversationOrchestrator::new(
                strategy,
                context,
                prompt,
                connection.clone(),
                flags.clone(),
                affect.clone(),
            )
            .with_voice(Arc::clone(&voice)),
        );

        let lifecycle = TaskLifecycleBridge::new(Arc::clone(&registry), Arc::clone(&injector));

        tracing::info!(
            target: "ozone::shell",
            app = %config.app_name,
            pipelines = registry.len(),
            path = ?conversation.path(),
            "🚀 shell assembled"
        );

        Ok(Shell {
            config,
            backend: self.backend,
            flags,
            registry,
            injector,
            lifecycle,
            conversation,
            affect,
            voice,
            connection,
            connection_poller: Mutex::new(None),
        })
    }
}

pub struct Shell {
    config: ShellConfig,
    backend: Arc<dyn Backend>,
    flags: FeatureFlags,
    registry: Arc<PipelineUiRegistry>,
    injector: SharedPanelInjector,
    lifecycle: TaskLifecycleBridge,
    conversation: Arc<ConversationOrchestrator>,
    affect: AffectStateBridge,
    voice: Arc<VoiceBridge>,
    connection: ConnectionState,
    connection_poller: Mutex<Option<PollerHandle>>,
}

impl Shell {
    pub fn builder(config: ShellConfig, backend: Arc<dyn Backend>) -> ShellBuilder {
        ShellBuilder::new(config, backend)
    }

    fn connection_poller(&self) -> MutexGuard<'_, Option<PollerHandle>> {
        self.connection_poller
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start the connection monitor and, when enabled, affect polling. Idempotent.
    pub fn start(&self) {
        {
            let mut slot = self.connection_poller();
            if slot.is_none() {
                *slot = Some(ConnectionMonitor::start(
                    Arc::clone(&self.backend),
                    self.connection.clone(),
                    self.config.connection_poll_interval(),
                ));
            }
        }
        self.affect.start_polling();
    }

    /// Flip the affect feature. Disabling tears the affect poller down; enabling restarts it.
    pub fn set_affect_enabled(&self, enabled: bool) {
        let was = self.flags.set_affect_enabled(enabled);
        if was == enabled {
            return;
        }
        if enabled {
            self.affect.start_polling();
        } else {
            self.affect.stop_polling();
        }
        tracing::info!(target: "ozone::shell", enabled, "affect feature toggled");
    }

    /// Stop every poller. The shell can be started again afterwards.
    pub fn shutdown(&self) {
        if let Some(handle) = self.connection_poller().take() {
            handle.cancel();
        }
        self.affect.stop_polling();
        self.voice.shutdown();
        tracing::info!(target: "ozone::shell", "🛑 shell pollers stopped");
    }

    pub fn is_monitoring(&self) -> bool {
        self.connection_poller().as_ref().is_some_and(PollerHandle::is_running)
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    pub fn backend(&self) -> Arc<dyn Backend> {
        Arc::clone(&self.backend)
    }

    pub fn flags(&self) -> &FeatureFlags {
        &self.flags
    }

    pub fn registry(&self) -> &PipelineUiRegistry {
        &self.registry
    }

    pub fn injector(&self) -> SharedPanelInjector {
        Arc::clone(&self.injector)
    }

    pub fn lifecycle(&self) -> &TaskLifecycleBridge {
        &self.lifecycle
    }

    pub fn conversation(&self) -> Arc<ConversationOrchestrator> {
        Arc::clone(&self.conversation)
    }

    pub fn affect(&self) -> &AffectStateBridge {
        &self.affect
    }

    pub fn voice(&self) -> Arc<VoiceBridge> {
        Arc::clone(&self.voice)
    }

    pub fn connection(&self) -> &ConnectionState {
        &self.connection
    }
}

impl Drop for Shell {
    fn drop(&mut self) {
        self.affect.stop_polling();
        self.voice.shutdown();
    }
}

//! **Voice Bridge** — microphone capture into the prompt, and speech synthesis out.
//!
//! ```text
//!   toggle_voice ─▶ Listening ── every 500ms ──▶ take buffered audio ─▶ Transcribe
//!                                                      (final only) ─▶ prompt.append
//!   toggle_voice ─▶ Not Listening: poll cancelled, pending audio discarded
//!
//!   speak(text) ─▶ GetStatus ─▶ GetVoice (profile, optional) ─▶ Speak ─▶ player.play
//!                  Speaking holds until playback ends
//! ```

mod capture;
mod speech;

pub use capture::{AudioSource, BufferedAudio, CaptureSession};
pub use speech::{AudioPlayer, SpeechParams, VoiceDefaults, VoiceProfile, CASUAL_RATE, MEASURED_RATE};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::watch;

use crate::backend::Backend;
use crate::config::FeatureFlags;
use crate::conversation::PromptField;
use crate::error::{VoiceError, VoiceResult};
use crate::poller::Poller;
use crate::registry::well_known;

pub const DEFAULT_MIC_POLL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListeningState {
    Listening,
    NotListening,
}

/// What `speak` ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakOutcome {
    /// Affect feature off, or speech output disabled on the backend.
    Skipped,
    /// Synthesis returned no audio.
    NoAudio,
    Played,
}

#[derive(Debug, Deserialize)]
struct Transcription {
    #[serde(default)]
    text: String,
    #[serde(default)]
    is_final: bool,
}

/// Holds the speaking count up for as long as it lives.
struct SpeakingGuard(Arc<AtomicUsize>);

impl SpeakingGuard {
    fn hold(count: &Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(count))
    }
}

impl Drop for SpeakingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct VoiceBridge {
    backend: Arc<dyn Backend>,
    flags: FeatureFlags,
    prompt: PromptField,
    audio: Arc<dyn AudioSource>,
    player: Arc<dyn AudioPlayer>,
    defaults: VoiceDefaults,
    mic_period: Duration,
    session: Mutex<Option<CaptureSession>>,
    speaking: Arc<AtomicUsize>,
    transcribed: Arc<watch::Sender<Option<String>>>,
}

impl VoiceBridge {
    pub fn new(
        backend: Arc<dyn Backend>,
        flags: FeatureFlags,
        prompt: PromptField,
        audio: Arc<dyn AudioSource>,
        player: Arc<dyn AudioPlayer>,
    ) -> Self {
        Self {
            backend,
            flags,
            prompt,
            audio,
            player,
            defaults: VoiceDefaults::default(),
            mic_period: DEFAULT_MIC_POLL,
            session: Mutex::new(None),
            speaking: Arc::new(AtomicUsize::new(0)),
            transcribed: Arc::new(watch::channel(None).0),
        }
    }

    pub fn with_defaults(mut self, defaults: VoiceDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_mic_period(mut self, period: Duration) -> Self {
        self.mic_period = period;
        self
    }

    fn session(&self) -> MutexGuard<'_, Option<CaptureSession>> {
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn listening_state(&self) -> ListeningState {
        if self.session().is_some() {
            ListeningState::Listening
        } else {
            ListeningState::NotListening
        }
    }

    /// Latest final transcription, published after it was merged into the prompt.
    pub fn subscribe_transcriptions(&self) -> watch::Receiver<Option<String>> {
        self.transcribed.subscribe()
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst) > 0
    }

    /// Flip between Listening and Not Listening. Returns the new state.
    pub async fn toggle_voice(&self) -> VoiceResult<ListeningState> {
        match self.listening_state() {
            ListeningState::Listening => {
                self.stop_listening().await;
                Ok(ListeningState::NotListening)
            }
            ListeningState::NotListening => {
                self.start_listening().await?;
                Ok(ListeningState::Listening)
            }
        }
    }

    async fn start_listening(&self) -> VoiceResult<()> {
        self.audio.start()?;
        if let Err(e) = self.backend.execute(well_known::VOICE, json!({ "action": "Start" })).await {
            tracing::warn!(target: "ozone::voice", error = %e, "voice pipeline start failed; capturing anyway");
        }

        let backend = Arc::clone(&self.backend);
        let audio = Arc::clone(&self.audio);
        let prompt = self.prompt.clone();
        let transcribed = Arc::clone(&self.transcribed);
        let poller = Poller::spawn("microphone", self.mic_period, move || {
            let backend = Arc::clone(&backend);
            let audio = Arc::clone(&audio);
            let prompt = prompt.clone();
            let transcribed = Arc::clone(&transcribed);
            async move { transcribe_buffered(backend.as_ref(), audio.as_ref(), &prompt, &transcribed).await }
        });

        *self.session() = Some(CaptureSession::new(poller));
        tracing::info!(target: "ozone::voice", "🎤 listening");
        Ok(())
    }

    async fn stop_listening(&self) {
        let session = self.session().take();
        if let Some(session) = session {
            session.cancel();
        }
        self.audio.stop();
        self.audio.discard();
        if let Err(e) = self.backend.execute(well_known::VOICE, json!({ "action": "Stop" })).await {
            tracing::warn!(target: "ozone::voice", error = %e, "voice pipeline stop failed");
        }
        tracing::info!(target: "ozone::voice", "🔇 stopped listening");
    }

    /// Synthesize and play `text`. A silent no-op unless affect is enabled and the
    /// backend reports speech output enabled.
    pub async fn speak(&self, text: &str) -> VoiceResult<SpeakOutcome> {
        if !self.flags.affect_enabled() || text.trim().is_empty() {
            return Ok(SpeakOutcome::Skipped);
        }
        if !self.speech_output_enabled().await {
            return Ok(SpeakOutcome::Skipped);
        }

        let profile = self.voice_profile().await;
        let params = SpeechParams::from_profile(profile.as_ref(), &self.defaults);

        let _speaking = SpeakingGuard::hold(&self.speaking);
        let out = self
            .backend
            .execute(
                well_known::VOICE,
                json!({ "action": "Speak", "text": text, "style": &params.style, "rate": params.rate }),
            )
            .await?;

        let Some(encoded) = out.get("audio").and_then(Value::as_str).filter(|s| !s.is_empty()) else {
            return Ok(SpeakOutcome::NoAudio);
        };
        let audio = BASE64
            .decode(encoded)
            .map_err(|e| VoiceError::Playback(format!("audio payload is not base64: {}", e)))?;

        tracing::debug!(target: "ozone::voice", bytes = audio.len(), style = %params.style, rate = params.rate, "🔊 playing");
        self.player.play(audio).await?;
        Ok(SpeakOutcome::Played)
    }

    async fn speech_output_enabled(&self) -> bool {
        match self.backend.execute(well_known::VOICE, json!({ "action": "GetStatus" })).await {
            Ok(status) => status
                .get("speech_output_enabled")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            Err(e) => {
                tracing::debug!(target: "ozone::voice", error = %e, "voice status unavailable; not speaking");
                false
            }
        }
    }

    /// Identity profile, or `None` on any failure.
    async fn voice_profile(&self) -> Option<VoiceProfile> {
        let out = self
            .backend
            .execute(well_known::VOICE_IDENTITY, json!({ "action": "GetVoice" }))
            .await
            .ok()?;
        let profile = out.get("profile").cloned().unwrap_or(out);
        serde_json::from_value(profile).ok()
    }

    /// Cancel any capture session. Used on shell shutdown.
    pub fn shutdown(&self) {
        if let Some(session) = self.session().take() {
            session.cancel();
            self.audio.stop();
            self.audio.discard();
        }
    }
}

/// One microphone poll: drain, transcribe, append final text.
async fn transcribe_buffered(
    backend: &dyn Backend,
    audio: &dyn AudioSource,
    prompt: &PromptField,
    transcribed: &watch::Sender<Option<String>>,
) -> VoiceResult<()> {
    let Some(chunk) = audio.take_buffered() else {
        return Ok(());
    };
    let out = backend
        .execute(
            well_known::VOICE,
            json!({ "action": "Transcribe", "audio": BASE64.encode(&chunk) }),
        )
        .await?;
    let result: Transcription = serde_json::from_value(out)
        .map_err(|e| VoiceError::Transcription(format!("unexpected transcription payload: {}", e)))?;
    if result.is_final && !result.text.trim().is_empty() {
        tracing::debug!(target: "ozone::voice", chars = result.text.len(), "final transcription");
        prompt.append(&result.text);
        transcribed.send_replace(Some(result.text.trim().to_string()));
    }
    Ok(())
}

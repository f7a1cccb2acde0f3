//! **Conversation Orchestrator** — one user utterance through to a visible answer.
//!
//! ```text
//!   Idle ──handle_submit──▶ Submitting ──answer/failure──▶ Idle
//!                                   └── speech playing ──▶ Speaking ──▶ Idle
//! ```
//!
//! Every accepted submission ends in exactly one assistant turn, correlated to
//! its user turn through `in_reply_to`. Overlapping submissions are independent
//! and resolve in whatever order the backend answers.

mod prompt;
mod strategy;
mod transcript;

pub use prompt::PromptField;
pub use strategy::{
    select_strategy, FallbackStrategy, PrimaryStrategy, SubmitContext, SubmitPath, SubmitStrategy,
};
pub use transcript::{ConversationTurn, Role, Transcript, TurnId, CONCERNED};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::affect::AffectStateBridge;
use crate::config::FeatureFlags;
use crate::connection::ConnectionState;
use crate::voice::VoiceBridge;

/// Shown while the fallback path waits for the prompt pipeline.
pub const PLACEHOLDER_TEXT: &str = "Thinking…";

pub type SharedTranscript = Arc<RwLock<Transcript>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Idle,
    Submitting,
    Speaking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    EmptyInput,
    Disconnected,
}

/// Result of [`ConversationOrchestrator::handle_submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing was appended.
    Rejected(RejectReason),
    Answered { user_turn: TurnId, assistant_turn: TurnId },
    /// The assistant turn carries an error message tagged `concerned`.
    Failed { user_turn: TurnId, assistant_turn: TurnId },
}

/// Decrements the in-flight count when a submission finishes, however it finishes.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(count: &Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(count))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct ConversationOrchestrator {
    strategy: Arc<dyn SubmitStrategy>,
    context: SubmitContext,
    prompt: PromptField,
    transcript: SharedTranscript,
    connection: ConnectionState,
    flags: FeatureFlags,
    affect: AffectStateBridge,
    voice: Option<Arc<VoiceBridge>>,
    in_flight: Arc<AtomicUsize>,
}

impl ConversationOrchestrator {
    pub fn new(
        strategy: Arc<dyn SubmitStrategy>,
        context: SubmitContext,
        prompt: PromptField,
        connection: ConnectionState,
        flags: FeatureFlags,
        affect: AffectStateBridge,
    ) -> Self {
        Self {
            strategy,
            context,
            prompt,
            transcript: Arc::new(RwLock::new(Transcript::new())),
            connection,
            flags,
            affect,
            voice: None,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_voice(mut self, voice: Arc<VoiceBridge>) -> Self {
        self.voice = Some(voice);
        self
    }

    pub fn path(&self) -> SubmitPath {
        self.strategy.path()
    }

    pub fn prompt(&self) -> &PromptField {
        &self.prompt
    }

    pub fn transcript(&self) -> SharedTranscript {
        Arc::clone(&self.transcript)
    }

    /// Copy of the turns so far.
    pub async fn turns(&self) -> Vec<ConversationTurn> {
        self.transcript.read().await.turns().to_vec()
    }

    pub fn state(&self) -> ConversationState {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            ConversationState::Submitting
        } else if self.voice.as_ref().is_some_and(|v| v.is_speaking()) {
            ConversationState::Speaking
        } else {
            ConversationState::Idle
        }
    }

    /// Submit whatever is in the prompt field.
    pub async fn handle_submit(&self) -> SubmitOutcome {
        let text = self.prompt.get();
        self.submit(&text).await
    }

    /// Submit `text`. Never fails: every accepted submission yields a visible assistant turn.
    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SubmitOutcome::Rejected(RejectReason::EmptyInput);
        }
        if !self.connection.is_connected() {
            debug!(target: "ozone::conversation", "submit ignored: backend not connected");
            return SubmitOutcome::Rejected(RejectReason::Disconnected);
        }

        let user_turn = self.transcript.write().await.push_user(text);
        let _in_flight = InFlight::enter(&self.in_flight);

        let path = self.strategy.path();
        let placeholder = match path {
            SubmitPath::Fallback => Some(
                self.transcript
                    .write()
                    .await
                    .push_assistant(PLACEHOLDER_TEXT, None, user_turn),
            ),
            SubmitPath::Primary => None,
        };

        let mut ctx = self.context.clone();
        ctx.affect_enabled = self.flags.affect_enabled();
        info!(target: "ozone::conversation", user_turn, ?path, "💬 submitting prompt");
        let result = self.strategy.submit(text, &ctx).await;

        let (content, emotion, success) = match result {
            Ok(reply) => (reply, None, true),
            Err(e) => {
                warn!(target: "ozone::conversation", user_turn, error = %e, "⚠️ submission failed");
                (e.user_message(), Some(CONCERNED.to_string()), false)
            }
        };

        let assistant_turn = {
            let mut transcript = self.transcript.write().await;
            match placeholder {
                Some(id) => {
                    transcript.replace(id, content.clone(), emotion);
                    id
                }
                None => transcript.push_assistant(content.clone(), emotion, user_turn),
            }
        };

        if success {
            self.prompt.consume(text);
        }

        if self.flags.affect_enabled() {
            self.affect.react(success);
            if success {
                if let Some(voice) = &self.voice {
                    let voice = Arc::clone(voice);
                    tokio::spawn(async move {
                        if let Err(e) = voice.speak(&content).await {
                            warn!(target: "ozone::conversation", error = %e, "speech playback failed");
                        }
                    });
                }
            }
        }

        if success {
            SubmitOutcome::Answered { user_turn, assistant_turn }
        } else {
            SubmitOutcome::Failed { user_turn, assistant_turn }
        }
    }
}

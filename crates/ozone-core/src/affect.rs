//! **Affect State Bridge** — polls emotional and reflection state and republishes it.
//!
//! Snapshots are advisory. They are replaced wholesale on every successful poll
//! and published on `watch` channels; nothing downstream patches them. Triggers
//! are fire-and-forget and never hold up the caller.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::backend::Backend;
use crate::config::FeatureFlags;
use crate::error::BackendResult;
use crate::poller::{Poller, PollerHandle};
use crate::registry::well_known;

pub const DEFAULT_AFFECT_POLL: Duration = Duration::from_secs(5);

/// Backend-reported emotional state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffectSnapshot {
    #[serde(alias = "primaryEmotion")]
    pub primary_emotion: String,
    #[serde(default)]
    pub intensity: f32,
    #[serde(default, alias = "secondaryEmotion")]
    pub secondary_emotion: Option<String>,
    #[serde(default)]
    pub valence: f32,
    #[serde(default)]
    pub arousal: f32,
}

impl AffectSnapshot {
    /// Clamp into intensity [0,1], valence [-1,1], arousal [0,1]; NaN becomes 0.
    pub fn clamped(mut self) -> Self {
        fn clamp(v: f32, lo: f32, hi: f32) -> f32 {
            if v.is_nan() {
                0.0
            } else {
                v.clamp(lo, hi)
            }
        }
        self.intensity = clamp(self.intensity, 0.0, 1.0);
        self.valence = clamp(self.valence, -1.0, 1.0);
        self.arousal = clamp(self.arousal, 0.0, 1.0);
        self
    }
}

/// Backend-reported "I-Loop" status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflectionSnapshot {
    #[serde(default, alias = "isActive")]
    pub is_active: bool,
    #[serde(default, alias = "currentQuestion")]
    pub current_question: String,
    #[serde(default, alias = "questionsAsked")]
    pub questions_asked: u32,
    #[serde(default, alias = "insightsGenerated")]
    pub insights_generated: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AffectTrigger {
    TaskSuccess,
    TaskFailure,
}

#[derive(Clone)]
pub struct AffectStateBridge {
    backend: Arc<dyn Backend>,
    flags: FeatureFlags,
    period: Duration,
    affect_tx: Arc<watch::Sender<Option<AffectSnapshot>>>,
    reflection_tx: Arc<watch::Sender<Option<ReflectionSnapshot>>>,
    poller: Arc<Mutex<Option<PollerHandle>>>,
}

impl AffectStateBridge {
    pub fn new(backend: Arc<dyn Backend>, flags: FeatureFlags) -> Self {
        let (affect_tx, _) = watch::channel(None);
        let (reflection_tx, _) = watch::channel(None);
        Self {
            backend,
            flags,
            period: DEFAULT_AFFECT_POLL,
            affect_tx: Arc::new(affect_tx),
            reflection_tx: Arc::new(reflection_tx),
            poller: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn subscribe_affect(&self) -> watch::Receiver<Option<AffectSnapshot>> {
        self.affect_tx.subscribe()
    }

    pub fn subscribe_reflection(&self) -> watch::Receiver<Option<ReflectionSnapshot>> {
        self.reflection_tx.subscribe()
    }

    pub fn affect(&self) -> Option<AffectSnapshot> {
        self.affect_tx.borrow().clone()
    }

    pub fn reflection(&self) -> Option<ReflectionSnapshot> {
        self.reflection_tx.borrow().clone()
    }

    /// Fetch both snapshots and publish whichever arrived. Returns the first failure.
    pub async fn refresh(&self) -> BackendResult<()> {
        let (affect, reflection) = tokio::join!(self.fetch_affect(), self.fetch_reflection());

        let affect = affect.map(|snapshot| {
            self.affect_tx.send_replace(Some(snapshot));
        });
        let reflection = reflection.map(|snapshot| {
            self.reflection_tx.send_replace(Some(snapshot));
        });
        affect.and(reflection)
    }

    async fn fetch_affect(&self) -> BackendResult<AffectSnapshot> {
        let out = self
            .backend
            .execute(well_known::EMOTIONAL_STATE, json!({ "action": "GetCurrent" }))
            .await?;
        let snapshot: AffectSnapshot = serde_json::from_value(out)?;
        Ok(snapshot.clamped())
    }

    async fn fetch_reflection(&self) -> BackendResult<ReflectionSnapshot> {
        let out = self
            .backend
            .execute(well_known::REFLECTION, json!({ "action": "GetILoopStatus" }))
            .await?;
        Ok(serde_json::from_value(out)?)
    }

    fn poller(&self) -> std::sync::MutexGuard<'_, Option<PollerHandle>> {
        self.poller.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start the periodic refresh. No-op (false) when already running or the feature is off.
    pub fn start_polling(&self) -> bool {
        if !self.flags.affect_enabled() {
            return false;
        }
        let mut slot = self.poller();
        if slot.as_ref().is_some_and(PollerHandle::is_running) {
            return false;
        }
        let bridge = self.clone();
        *slot = Some(Poller::spawn("affect", self.period, move || {
            let bridge = bridge.clone();
            async move { bridge.refresh().await }
        }));
        tracing::info!(target: "ozone::affect", period_ms = self.period.as_millis() as u64, "💗 affect polling started");
        true
    }

    /// Stop the periodic refresh. Returns whether a poller was running.
    pub fn stop_polling(&self) -> bool {
        match self.poller().take() {
            Some(handle) => {
                handle.cancel();
                tracing::info!(target: "ozone::affect", "affect polling stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poller().as_ref().is_some_and(PollerHandle::is_running)
    }

    /// Fire a trigger without waiting for it. `None` when the feature is off.
    pub fn trigger(&self, trigger: AffectTrigger) -> Option<JoinHandle<()>> {
        if !self.flags.affect_enabled() {
            return None;
        }
        let bridge = self.clone();
        Some(tokio::spawn(async move {
            bridge.send_trigger(trigger).await;
        }))
    }

    /// React to a submission outcome: trigger, and on success re-poll the snapshots.
    pub fn react(&self, success: bool) -> Option<JoinHandle<()>> {
        if !self.flags.affect_enabled() {
            return None;
        }
        let bridge = self.clone();
        Some(tokio::spawn(async move {
            if success {
                bridge.send_trigger(AffectTrigger::TaskSuccess).await;
                if let Err(e) = bridge.refresh().await {
                    tracing::warn!(target: "ozone::affect", error = %e, "affect refresh after submit failed");
                }
            } else {
                bridge.send_trigger(AffectTrigger::TaskFailure).await;
            }
        }))
    }

    async fn send_trigger(&self, trigger: AffectTrigger) {
        let input = json!({ "action": "ProcessTrigger", "trigger": trigger });
        if let Err(e) = self.backend.execute(well_known::EMOTIONAL_STATE, input).await {
            tracing::warn!(target: "ozone::affect", ?trigger, error = %e, "affect trigger failed");
        }
    }
}

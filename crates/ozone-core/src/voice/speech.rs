//! Speech output: voice-style selection and the playback seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::VoiceResult;

const WARM_THRESHOLD: f32 = 0.7;
const NEUTRAL_THRESHOLD: f32 = 0.3;
const MEASURED_THRESHOLD: f32 = 0.7;
const CASUAL_THRESHOLD: f32 = 0.3;

pub const MEASURED_RATE: f64 = 0.9;
pub const CASUAL_RATE: f64 = 1.1;

/// Voice-identity profile reported by the backend. Both scalars are in [0,1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceProfile {
    #[serde(default = "half")]
    pub warmth: f32,
    #[serde(default = "half")]
    pub formality: f32,
}

fn half() -> f32 {
    0.5
}

/// Used between thresholds and when no profile is available.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceDefaults {
    pub style: String,
    pub rate: f64,
}

impl Default for VoiceDefaults {
    fn default() -> Self {
        Self {
            style: "neutral".to_string(),
            rate: 1.0,
        }
    }
}

/// TTS parameters sent with a Speak request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeechParams {
    pub style: String,
    pub rate: f64,
}

impl SpeechParams {
    /// warmth >= 0.7 is "warm", <= 0.3 "neutral"; formality >= 0.7 is measured (0.9x),
    /// <= 0.3 casual (1.1x). Anything in between, or no profile, takes the defaults.
    pub fn from_profile(profile: Option<&VoiceProfile>, defaults: &VoiceDefaults) -> Self {
        let Some(p) = profile else {
            return Self {
                style: defaults.style.clone(),
                rate: defaults.rate,
            };
        };

        let style = if p.warmth >= WARM_THRESHOLD {
            "warm".to_string()
        } else if p.warmth <= NEUTRAL_THRESHOLD {
            "neutral".to_string()
        } else {
            defaults.style.clone()
        };

        let rate = if p.formality >= MEASURED_THRESHOLD {
            MEASURED_RATE
        } else if p.formality <= CASUAL_THRESHOLD {
            CASUAL_RATE
        } else {
            defaults.rate
        };

        Self { style, rate }
    }
}

/// Plays synthesized audio. `play` resolves when playback ends or fails.
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    async fn play(&self, audio: Vec<u8>) -> VoiceResult<()>;
}

//! # Configuration
//!
//! Tunable settings for ingestion and playback, loaded from YAML with kebab-case keys.
//!
//! ```yaml
//! ingest:
//!   split-point: 60          # notes below this lean left hand (60 = middle C)
//!   chord-tolerance-ms: 30   # onsets closer than this merge into one chord
//!   channel-hands:
//!     left: [1]
//!     right: [0]
//! playback:
//!   mode: measure-by-measure # or continuous
//!   tempo-scale: 0.75        # practice at 75% speed
//! ```
//!
//! Every key is optional; missing keys take the defaults below. Unknown keys are
//! rejected so that typos do not silently fall back to defaults.
//!
//! The split point and chord tolerance are heuristics: reasonable values vary by
//! repertoire, which is why they live here rather than in code.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EtudeError;
use crate::session::PlaybackMode;
use crate::song::Hand;

pub const DEFAULT_SPLIT_POINT: u8 = 60;
pub const DEFAULT_CHORD_TOLERANCE_MS: f64 = 30.0;

/// Authored channel → hand assignments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ChannelHands {
    pub left: Vec<u8>,
    pub right: Vec<u8>,
}

impl ChannelHands {
    pub fn hand_for(&self, channel: u8) -> Option<Hand> {
        if self.left.contains(&channel) {
            Some(Hand::Left)
        } else if self.right.contains(&channel) {
            Some(Hand::Right)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct IngestOptions {
    pub split_point: u8,
    pub chord_tolerance_ms: f64,
    pub channel_hands: ChannelHands,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            split_point: DEFAULT_SPLIT_POINT,
            chord_tolerance_ms: DEFAULT_CHORD_TOLERANCE_MS,
            channel_hands: ChannelHands::default(),
        }
    }
}

impl IngestOptions {
    pub fn chord_tolerance_seconds(&self) -> f64 {
        self.chord_tolerance_ms / 1000.0
    }

    pub fn validate(&self) -> Result<(), EtudeError> {
        if self.split_point > 127 {
            return Err(EtudeError::Config(format!(
                "split-point {} is outside 0..=127",
                self.split_point
            )));
        }
        if !self.chord_tolerance_ms.is_finite() || self.chord_tolerance_ms < 0.0 {
            return Err(EtudeError::Config(
                "chord-tolerance-ms must be zero or positive".to_string(),
            ));
        }
        let hands = &self.channel_hands;
        for channel in hands.left.iter().chain(hands.right.iter()) {
            if *channel > 15 {
                return Err(EtudeError::Config(format!(
                    "channel-hands names channel {} (channels are 0..=15)",
                    channel
                )));
            }
        }
        if let Some(channel) = hands.left.iter().find(|c| hands.right.contains(c)) {
            return Err(EtudeError::Config(format!(
                "channel {} is assigned to both hands",
                channel
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct PlaybackOptions {
    pub mode: PlaybackMode,
    /// Speed multiplier; 0.5 plays at half tempo
    pub tempo_scale: f64,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            mode: PlaybackMode::Continuous,
            tempo_scale: 1.0,
        }
    }
}

impl PlaybackOptions {
    pub fn validate(&self) -> Result<(), EtudeError> {
        if !self.tempo_scale.is_finite() || self.tempo_scale <= 0.0 {
            return Err(EtudeError::Config(format!(
                "tempo-scale must be positive, got {}",
                self.tempo_scale
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct EtudeConfig {
    pub ingest: IngestOptions,
    pub playback: PlaybackOptions,
}

impl EtudeConfig {
    pub fn from_yaml(content: &str) -> Result<Self, EtudeError> {
        // An empty document deserializes as unit, not as an empty mapping
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: EtudeConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, EtudeError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    pub fn validate(&self) -> Result<(), EtudeError> {
        self.ingest.validate()?;
        self.playback.validate()
    }
}

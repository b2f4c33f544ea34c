//! Engine configuration — construction-time constants for each module.
//!
//! Every field has a default matching the hardware-module behaviour, and
//! configs deserialize from JSON with missing fields filled in.

use serde::{Deserialize, Serialize};

use crate::error::StateError;

/// Seed used when no explicit seed is configured.
pub const DEFAULT_SEED: u64 = 0x1ce7_5a7e;

/// Looping buffer engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LooperConfig {
    /// Rate the buffer geometry is computed at. Host rates that differ only
    /// change the filter and pitch-shifter tuning.
    pub assumed_sample_rate: u32,
    /// Length of every crossfade window, in seconds.
    pub crossfade_seconds: f32,
    /// Longest record length the knob can select, in seconds.
    pub max_record_seconds: f32,
    pub pitch_frame_size: usize,
    pub pitch_oversampling: usize,
    pub seed: u64,
}

impl Default for LooperConfig {
    fn default() -> Self {
        LooperConfig {
            assumed_sample_rate: 44100,
            crossfade_seconds: 0.15,
            max_record_seconds: 10.0,
            pitch_frame_size: 1024,
            pitch_oversampling: 8,
            seed: DEFAULT_SEED,
        }
    }
}

impl LooperConfig {
    /// Frames in one crossfade window (6615 at the defaults).
    pub fn crossfade_len(&self) -> usize {
        (self.crossfade_seconds * self.assumed_sample_rate as f32) as usize
    }

    /// Frames each buffer can hold, including two frames of guard space.
    pub fn buffer_capacity(&self) -> usize {
        let seconds = (self.max_record_seconds + self.crossfade_seconds * 2.0).floor() as usize;
        seconds * self.assumed_sample_rate as usize + 2
    }

    pub fn validate(&self) -> Result<(), StateError> {
        if self.assumed_sample_rate == 0 {
            return Err(invalid("assumedSampleRate", "must be positive"));
        }
        if self.crossfade_len() < 1 {
            return Err(invalid("crossfadeSeconds", "window must span at least one frame"));
        }
        if self.max_record_seconds.is_nan() || self.max_record_seconds < 0.1 {
            return Err(invalid("maxRecordSeconds", "must be at least 0.1"));
        }
        if self.crossfade_len() * 2 >= self.buffer_capacity() {
            return Err(invalid("crossfadeSeconds", "window does not fit the buffer"));
        }
        if !self.pitch_frame_size.is_power_of_two() || self.pitch_frame_size < 16 {
            return Err(invalid("pitchFrameSize", "must be a power of two >= 16"));
        }
        if self.pitch_oversampling == 0 || self.pitch_frame_size % self.pitch_oversampling != 0 {
            return Err(invalid("pitchOversampling", "must divide the frame size"));
        }
        Ok(())
    }
}

/// Gate router configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RouterConfig {
    /// Active node count: 16 for the full panel, 8 for the half-width one.
    pub node_count: usize,
    pub seed: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        RouterConfig {
            node_count: crate::router::NODE_MAX,
            seed: DEFAULT_SEED,
        }
    }
}

impl RouterConfig {
    pub fn validate(&self) -> Result<(), StateError> {
        if self.node_count == 0 || self.node_count > crate::router::NODE_MAX {
            return Err(invalid(
                "nodeCount",
                format!("must be within 1..={}", crate::router::NODE_MAX),
            ));
        }
        Ok(())
    }
}

/// Hit shifter configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShifterConfig {
    pub seed: u64,
}

impl Default for ShifterConfig {
    fn default() -> Self {
        ShifterConfig { seed: DEFAULT_SEED }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> StateError {
    StateError::InvalidConfig {
        field,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_looper_defaults_match_module_geometry() {
        let config = LooperConfig::default();
        assert_eq!(config.crossfade_len(), 6615);
        assert_eq!(config.buffer_capacity(), 441_002);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: LooperConfig = serde_json::from_str(r#"{"seed": 7}"#).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.assumed_sample_rate, 44100);
        assert_eq!(config.pitch_frame_size, 1024);
    }

    #[test]
    fn test_rejects_bad_pitch_frame() {
        let config = LooperConfig {
            pitch_frame_size: 1000,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(StateError::InvalidConfig { field: "pitchFrameSize", .. })
        ));
    }

    #[test]
    fn test_router_node_count_bounds() {
        assert!(RouterConfig::default().validate().is_ok());
        let half = RouterConfig { node_count: 8, ..Default::default() };
        assert!(half.validate().is_ok());
        let zero = RouterConfig { node_count: 0, ..Default::default() };
        assert!(zero.validate().is_err());
        let wide = RouterConfig { node_count: 17, ..Default::default() };
        assert!(wide.validate().is_err());
    }
}

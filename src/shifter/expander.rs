//! Shifter expander — Attenuverted CV offsets for the hit shifter's controls.
//!
//! The expander has no state of its own. Each tick it turns its knobs and
//! jacks into an [`ExpanderBridge`], which the shifter adds onto its panel
//! values.

use serde::{Deserialize, Serialize};

use super::ROWS;
use crate::dsp::sanitize;

/// Offsets handed to the shifter. All zeros means no expander.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExpanderBridge {
    /// Added to the clock rate, in BPM.
    pub clock_rate: f32,
    /// Added to the divider before it is floored.
    pub clock_divider: i32,
    pub ramp: f32,
    pub sample_and_hold: f32,
    pub echo: [f32; ROWS],
    pub mute: [f32; ROWS],
}

/// Attenuverter positions, each in `[-1, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExpanderKnobs {
    pub clock_rate: f32,
    pub clock_divider: f32,
    pub ramp: f32,
    pub sample_and_hold: f32,
    pub echo: [f32; ROWS],
    pub mute: [f32; ROWS],
}

/// CV jack voltages. Unpatched jacks read 0 V.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExpanderInputs {
    pub clock_rate: f32,
    pub clock_divider: f32,
    pub ramp: f32,
    pub sample_and_hold: f32,
    pub echo: [f32; ROWS],
    pub mute: [f32; ROWS],
}

/// Full-scale offset per control at +10 V with the attenuverter fully open.
const CLOCK_RATE_SCALE: f32 = 5000.0;
const CLOCK_DIVIDER_SCALE: f32 = 16.0;
const RAMP_SCALE: f32 = 2.0;
const ROW_SCALE: f32 = 4.0;

#[inline]
fn offset(scale: f32, knob: f32, volts: f32) -> f32 {
    scale * sanitize(knob) * sanitize(volts) / 10.0
}

/// Compute this tick's bridge.
pub fn process(knobs: &ExpanderKnobs, inputs: &ExpanderInputs) -> ExpanderBridge {
    let divider = offset(CLOCK_DIVIDER_SCALE, knobs.clock_divider, inputs.clock_divider).floor();
    let mut bridge = ExpanderBridge {
        clock_rate: offset(CLOCK_RATE_SCALE, knobs.clock_rate, inputs.clock_rate),
        clock_divider: divider as i32,
        ramp: offset(RAMP_SCALE, knobs.ramp, inputs.ramp),
        sample_and_hold: offset(1.0, knobs.sample_and_hold, inputs.sample_and_hold),
        ..Default::default()
    };
    for row in 0..ROWS {
        bridge.echo[row] = offset(ROW_SCALE, knobs.echo[row], inputs.echo[row]);
        bridge.mute[row] = offset(ROW_SCALE, knobs.mute[row], inputs.mute[row]);
    }
    bridge
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_cv_means_no_offset() {
        let knobs = ExpanderKnobs {
            clock_rate: 1.0,
            echo: [1.0; ROWS],
            ..Default::default()
        };
        assert_eq!(process(&knobs, &ExpanderInputs::default()), ExpanderBridge::default());
    }

    #[test]
    fn test_full_scale_offsets() {
        let knobs = ExpanderKnobs {
            clock_rate: 1.0,
            clock_divider: -1.0,
            ramp: 0.5,
            sample_and_hold: 1.0,
            echo: [1.0; ROWS],
            mute: [0.25; ROWS],
        };
        let inputs = ExpanderInputs {
            clock_rate: 10.0,
            clock_divider: 5.0,
            ramp: 10.0,
            sample_and_hold: 2.0,
            echo: [10.0; ROWS],
            mute: [10.0; ROWS],
        };
        let bridge = process(&knobs, &inputs);
        assert!((bridge.clock_rate - 5000.0).abs() < 1e-3);
        assert_eq!(bridge.clock_divider, -8);
        assert!((bridge.ramp - 1.0).abs() < 1e-6);
        assert!((bridge.sample_and_hold - 0.2).abs() < 1e-6);
        assert!(bridge.echo.iter().all(|&e| (e - 4.0).abs() < 1e-6));
        assert!(bridge.mute.iter().all(|&m| (m - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_divider_floors_toward_negative() {
        let knobs = ExpanderKnobs {
            clock_divider: 0.1,
            ..Default::default()
        };
        let inputs = ExpanderInputs {
            clock_divider: -1.0,
            ..Default::default()
        };
        assert_eq!(process(&knobs, &inputs).clock_divider, -1);
    }
}

//! One-pole RC filter — Bilinear lowpass with a complementary highpass tap.
//!
//! The looper band-limits its output with a 20 kHz lowpass followed by a
//! 20 Hz highpass, one pair per channel.

use std::f32::consts::PI;

/// Lowpass corner of the output stage in Hz.
pub const TONE_LOWPASS_HZ: f32 = 20_000.0;
/// Highpass corner of the output stage in Hz.
pub const TONE_HIGHPASS_HZ: f32 = 20.0;

/// First-order RC filter.
///
/// `process` runs the lowpass; `highpass()` is the input minus the lowpass,
/// so both taps come from one state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OnePoleFilter {
    c: f32,
    x: f32,
    y: f32,
}

impl OnePoleFilter {
    pub fn new(cutoff_hz: f32, sample_rate: f32) -> Self {
        let mut f = OnePoleFilter { c: 0.0, x: 0.0, y: 0.0 };
        f.set_cutoff(cutoff_hz, sample_rate);
        f
    }

    /// Retune without touching the filter memory.
    pub fn set_cutoff(&mut self, cutoff_hz: f32, sample_rate: f32) {
        let normalized = (cutoff_hz / sample_rate).clamp(1e-6, 0.49);
        self.c = 2.0 / (2.0 * PI * normalized);
    }

    #[inline]
    pub fn process(&mut self, x: f32) {
        let y = (x + self.x - self.y * (1.0 - self.c)) / (1.0 + self.c);
        self.x = x;
        self.y = y;
    }

    #[inline]
    pub fn lowpass(&self) -> f32 {
        self.y
    }

    #[inline]
    pub fn highpass(&self) -> f32 {
        self.x - self.y
    }

    /// Filter memory as `[last input, last output]`.
    pub fn memory(&self) -> [f32; 2] {
        [self.x, self.y]
    }

    pub fn restore(&mut self, memory: [f32; 2]) {
        self.x = memory[0];
        self.y = memory[1];
    }

    pub fn reset(&mut self) {
        self.x = 0.0;
        self.y = 0.0;
    }
}

// ── Output stage ────────────────────────────────────────────

/// Lowpass then highpass, removing ultrasonic content and DC.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneStage {
    lowpass: OnePoleFilter,
    highpass: OnePoleFilter,
}

impl ToneStage {
    pub fn new(sample_rate: f32) -> Self {
        ToneStage {
            lowpass: OnePoleFilter::new(TONE_LOWPASS_HZ, sample_rate),
            highpass: OnePoleFilter::new(TONE_HIGHPASS_HZ, sample_rate),
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.lowpass.set_cutoff(TONE_LOWPASS_HZ, sample_rate);
        self.highpass.set_cutoff(TONE_HIGHPASS_HZ, sample_rate);
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        self.lowpass.process(x);
        self.highpass.process(self.lowpass.lowpass());
        self.highpass.highpass()
    }

    pub fn memory(&self) -> [f32; 4] {
        let [lx, ly] = self.lowpass.memory();
        let [hx, hy] = self.highpass.memory();
        [lx, ly, hx, hy]
    }

    pub fn restore(&mut self, memory: [f32; 4]) {
        self.lowpass.restore([memory[0], memory[1]]);
        self.highpass.restore([memory[2], memory[3]]);
    }

    pub fn reset(&mut self) {
        self.lowpass.reset();
        self.highpass.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowpass_passes_dc() {
        let mut f = OnePoleFilter::new(1000.0, 44100.0);
        for _ in 0..2000 {
            f.process(1.0);
        }
        assert!(
            (f.lowpass() - 1.0).abs() < 0.001,
            "Lowpass should pass DC, got {}",
            f.lowpass()
        );
    }

    #[test]
    fn highpass_blocks_dc() {
        let mut f = OnePoleFilter::new(20.0, 44100.0);
        for _ in 0..100_000 {
            f.process(1.0);
        }
        assert!(
            f.highpass().abs() < 0.001,
            "Highpass should block DC, got {}",
            f.highpass()
        );
    }

    #[test]
    fn tone_stage_passes_midrange() {
        let mut stage = ToneStage::new(44100.0);
        let freq = 1000.0;
        let mut max_out = 0.0_f32;
        for i in 0..44100 {
            let t = i as f32 / 44100.0;
            let out = stage.process((2.0 * PI * freq * t).sin());
            if i > 10_000 {
                max_out = max_out.max(out.abs());
            }
        }
        assert!(
            (max_out - 1.0).abs() < 0.05,
            "1 kHz should pass nearly unchanged, got amplitude {max_out}"
        );
    }

    #[test]
    fn memory_round_trip() {
        let mut stage = ToneStage::new(44100.0);
        for i in 0..100 {
            stage.process(i as f32 * 0.01);
        }
        let mut copy = ToneStage::new(44100.0);
        copy.restore(stage.memory());
        assert_eq!(copy.process(0.5).to_bits(), stage.process(0.5).to_bits());
    }
}

//! Pitch shifter — Streaming phase vocoder used to keep recorded pitch
//! constant while the looper time-stretches.
//!
//! Samples go in and come out one at a time with a fixed latency of
//! `frame_size - frame_size / oversampling`. Each full hop runs a windowed
//! FFT, moves partials by the shift ratio, and overlap-adds the inverse.

use std::f32::consts::{PI, TAU};
use std::fmt;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// Anything that can pitch-shift a mono stream sample by sample.
pub trait PitchShift: Send {
    /// Push one input sample, get one shifted output sample back.
    fn process(&mut self, ratio: f32, input: f32) -> f32;

    /// Drop all buffered audio and analysis history.
    fn reset(&mut self);

    /// Adapt to a new host rate. Implementations flush.
    fn set_sample_rate(&mut self, sample_rate: f32);
}

pub struct PhaseVocoder {
    frame_size: usize,
    oversampling: usize,
    sample_rate: f32,
    rover: usize,
    in_fifo: Vec<f32>,
    out_fifo: Vec<f32>,
    accumulator: Vec<f32>,
    window: Vec<f32>,
    last_phase: Vec<f32>,
    sum_phase: Vec<f32>,
    analysis_magnitude: Vec<f32>,
    analysis_frequency: Vec<f32>,
    synthesis_magnitude: Vec<f32>,
    synthesis_frequency: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

impl fmt::Debug for PhaseVocoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseVocoder")
            .field("frame_size", &self.frame_size)
            .field("oversampling", &self.oversampling)
            .field("sample_rate", &self.sample_rate)
            .finish_non_exhaustive()
    }
}

impl PhaseVocoder {
    /// `frame_size` must be a power of two and divisible by `oversampling`.
    pub fn new(frame_size: usize, oversampling: usize, sample_rate: f32) -> Self {
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(frame_size);
        let inverse = planner.plan_fft_inverse(frame_size);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());
        let bins = frame_size / 2 + 1;
        let window = (0..frame_size)
            .map(|k| 0.5 - 0.5 * (TAU * k as f32 / frame_size as f32).cos())
            .collect();

        PhaseVocoder {
            frame_size,
            oversampling,
            sample_rate,
            rover: frame_size - frame_size / oversampling,
            in_fifo: vec![0.0; frame_size],
            out_fifo: vec![0.0; frame_size],
            accumulator: vec![0.0; frame_size * 2],
            window,
            last_phase: vec![0.0; bins],
            sum_phase: vec![0.0; bins],
            analysis_magnitude: vec![0.0; bins],
            analysis_frequency: vec![0.0; bins],
            synthesis_magnitude: vec![0.0; bins],
            synthesis_frequency: vec![0.0; bins],
            spectrum: vec![Complex::new(0.0, 0.0); frame_size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            forward,
            inverse,
        }
    }

    /// Samples between an input and its shifted output.
    pub fn latency(&self) -> usize {
        self.frame_size - self.step()
    }

    fn step(&self) -> usize {
        self.frame_size / self.oversampling
    }

    fn process_frame(&mut self, ratio: f32) {
        let n = self.frame_size;
        let half = n / 2;
        let step = self.step();
        let osamp = self.oversampling as f32;
        let bin_width = self.sample_rate / n as f32;
        let expected = TAU * step as f32 / n as f32;

        // ── Analysis ────────────────────────────────────────────
        for k in 0..n {
            self.spectrum[k] = Complex::new(self.in_fifo[k] * self.window[k], 0.0);
        }
        self.forward
            .process_with_scratch(&mut self.spectrum, &mut self.scratch);

        for k in 0..=half {
            let bin = self.spectrum[k];
            let magnitude = 2.0 * bin.norm();
            let phase = bin.im.atan2(bin.re);

            let mut delta = phase - self.last_phase[k];
            self.last_phase[k] = phase;
            delta -= k as f32 * expected;

            // Wrap into [-pi, pi].
            let mut qpd = (delta / PI) as i64;
            if qpd >= 0 {
                qpd += qpd & 1;
            } else {
                qpd -= qpd & 1;
            }
            delta -= PI * qpd as f32;

            let deviation = osamp * delta / TAU;
            self.analysis_magnitude[k] = magnitude;
            self.analysis_frequency[k] = (k as f32 + deviation) * bin_width;
        }

        // ── Shift ───────────────────────────────────────────────
        self.synthesis_magnitude.fill(0.0);
        self.synthesis_frequency.fill(0.0);
        for k in 0..=half {
            let target = (k as f32 * ratio) as usize;
            if target <= half {
                self.synthesis_magnitude[target] += self.analysis_magnitude[k];
                self.synthesis_frequency[target] = self.analysis_frequency[k] * ratio;
            }
        }

        // ── Synthesis ───────────────────────────────────────────
        for k in 0..=half {
            let deviation = self.synthesis_frequency[k] / bin_width - k as f32;
            let advance = TAU * deviation / osamp + k as f32 * expected;
            self.sum_phase[k] = (self.sum_phase[k] + advance) % TAU;
            let phase = self.sum_phase[k];
            self.spectrum[k] = Complex::from_polar(self.synthesis_magnitude[k], phase);
        }
        for bin in &mut self.spectrum[half + 1..] {
            *bin = Complex::new(0.0, 0.0);
        }
        self.inverse
            .process_with_scratch(&mut self.spectrum, &mut self.scratch);

        let norm = 2.0 / (half as f32 * osamp);
        for k in 0..n {
            self.accumulator[k] += self.window[k] * self.spectrum[k].re * norm;
        }
        self.out_fifo[..step].copy_from_slice(&self.accumulator[..step]);
        self.accumulator.copy_within(step..step + n, 0);
        self.in_fifo.copy_within(step.., 0);
    }
}

impl PitchShift for PhaseVocoder {
    #[inline]
    fn process(&mut self, ratio: f32, input: f32) -> f32 {
        let latency = self.latency();
        self.in_fifo[self.rover] = input;
        let output = self.out_fifo[self.rover - latency];
        self.rover += 1;
        if self.rover >= self.frame_size {
            self.rover = latency;
            self.process_frame(ratio);
        }
        output
    }

    fn reset(&mut self) {
        self.rover = self.latency();
        self.in_fifo.fill(0.0);
        self.out_fifo.fill(0.0);
        self.accumulator.fill(0.0);
        self.last_phase.fill(0.0);
        self.sum_phase.fill(0.0);
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dominant_bin(signal: &[f32]) -> usize {
        let n = signal.len();
        let mut buffer: Vec<Complex<f32>> =
            signal.iter().map(|&s| Complex::new(s, 0.0)).collect();
        FftPlanner::new().plan_fft_forward(n).process(&mut buffer);
        (1..n / 2)
            .max_by(|&a, &b| buffer[a].norm().total_cmp(&buffer[b].norm()))
            .unwrap_or(0)
    }

    #[test]
    fn test_first_hop_is_silent() {
        let mut shifter = PhaseVocoder::new(1024, 8, 44100.0);
        assert_eq!(shifter.latency(), 896);
        for i in 0..128 {
            let out = shifter.process(1.0, (i as f32 * 0.1).sin());
            assert_eq!(out, 0.0, "sample {i} leaked before the first hop");
        }
    }

    #[test]
    fn test_octave_up_doubles_frequency() {
        let sr = 44100.0;
        let mut shifter = PhaseVocoder::new(1024, 8, sr);
        // 43 cycles per 4096 window, bin-aligned in the analysis below.
        let freq = 43.0 * sr / 4096.0;
        let mut output = Vec::new();
        for i in 0..16384 {
            let x = (TAU * freq * i as f32 / sr).sin();
            output.push(shifter.process(2.0, x));
        }
        let tail = &output[output.len() - 4096..];
        let bin = dominant_bin(tail);
        assert!((bin as i32 - 86).abs() <= 2, "expected ~bin 86, got {bin}");
    }

    #[test]
    fn test_output_stays_finite() {
        let mut shifter = PhaseVocoder::new(256, 4, 48000.0);
        for i in 0..5000 {
            let x = if i % 97 == 0 { 1.0 } else { 0.0 };
            assert!(shifter.process(0.5, x).is_finite());
        }
    }

    #[test]
    fn test_reset_flushes() {
        let mut shifter = PhaseVocoder::new(256, 4, 44100.0);
        for i in 0..2000 {
            shifter.process(1.0, (i as f32 * 0.05).sin());
        }
        shifter.reset();
        for _ in 0..shifter.latency() {
            assert_eq!(shifter.process(1.0, 0.0), 0.0);
        }
    }
}

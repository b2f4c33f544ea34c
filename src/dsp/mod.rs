//! DSP building blocks — Triggers, filters, rings and randomness shared by
//! the looper, router and shifter engines.
//!
//! Everything here runs per sample on the host's audio thread: no locks,
//! no allocation after construction.

pub mod crossfade;
pub mod cv_range;
pub mod filter;
pub mod pitch_shifter;
pub mod rng;
pub mod trigger;

/// Channels in a stereo frame.
pub const CHANNELS: usize = 2;

/// One stereo sample, left then right.
pub type Frame = [f32; CHANNELS];

/// Replace NaN and infinities with silence.
#[inline]
pub fn sanitize(x: f32) -> f32 {
    if x.is_finite() { x } else { 0.0 }
}

/// Linear blend between two frames; `t = 0` yields `a`.
#[inline]
pub fn lerp_frame(a: Frame, b: Frame, t: f32) -> Frame {
    [a[0] + (b[0] - a[0]) * t, a[1] + (b[1] - a[1]) * t]
}

#[inline]
pub fn scale_frame(frame: Frame, gain: f32) -> Frame {
    [frame[0] * gain, frame[1] * gain]
}

#[inline]
pub fn add_frames(a: Frame, b: Frame) -> Frame {
    [a[0] + b[0], a[1] + b[1]]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize(f32::NAN), 0.0);
        assert_eq!(sanitize(f32::INFINITY), 0.0);
        assert_eq!(sanitize(-2.5), -2.5);
    }

    #[test]
    fn test_lerp_frame_endpoints() {
        let a = [1.0, -1.0];
        let b = [3.0, 1.0];
        assert_eq!(lerp_frame(a, b, 0.0), a);
        assert_eq!(lerp_frame(a, b, 1.0), b);
        assert_eq!(lerp_frame(a, b, 0.5), [2.0, 0.0]);
    }
}

//! Crossfade rings — Fixed-length stereo rings and linear fade gains.
//!
//! The looper keeps two of these, each one crossfade window long: a
//! pre-roll of the most recent input and the fading-out tail of the
//! previously playing buffer.

use super::{CHANNELS, Frame};

/// Linear fade-in gain `offset / window`, clamped to `[0, 1]`.
#[inline]
pub fn fade_in_gain(offset: usize, window: usize) -> f32 {
    if window == 0 || offset >= window {
        1.0
    } else {
        offset as f32 / window as f32
    }
}

/// Complement of [`fade_in_gain`]; the two always sum to one.
#[inline]
pub fn fade_out_gain(offset: usize, window: usize) -> f32 {
    1.0 - fade_in_gain(offset, window)
}

/// A stereo ring indexed modulo its length.
#[derive(Debug, Clone, PartialEq)]
pub struct StereoRing {
    frames: Vec<Frame>,
}

impl StereoRing {
    pub fn new(len: usize) -> Self {
        StereoRing {
            frames: vec![[0.0; CHANNELS]; len.max(1)],
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Frame {
        self.frames[index % self.frames.len()]
    }

    #[inline]
    pub fn set(&mut self, index: usize, frame: Frame) {
        let len = self.frames.len();
        self.frames[index % len] = frame;
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frames_mut(&mut self) -> &mut [Frame] {
        &mut self.frames
    }

    pub fn clear(&mut self) {
        self.frames.fill([0.0; CHANNELS]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gains_sum_to_one() {
        let window = 6615;
        for offset in [0, 1, 100, 3307, 6614, 6615, 10_000] {
            let sum = fade_in_gain(offset, window) + fade_out_gain(offset, window);
            assert!((sum - 1.0).abs() < 1e-6, "offset {offset}: {sum}");
        }
        assert_eq!(fade_in_gain(0, window), 0.0);
        assert_eq!(fade_in_gain(window, window), 1.0);
    }

    #[test]
    fn test_ring_wraps() {
        let mut ring = StereoRing::new(4);
        ring.set(5, [1.0, 2.0]);
        assert_eq!(ring.get(1), [1.0, 2.0]);
        assert_eq!(ring.get(9), [1.0, 2.0]);
        ring.clear();
        assert_eq!(ring.get(1), [0.0, 0.0]);
    }
}

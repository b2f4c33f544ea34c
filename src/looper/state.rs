//! Looper persistence — A JSON-friendly record of cursors, locks and filter
//! memory, plus a little-endian blob holding the sample data.
//!
//! Blob layout: every buffer in order (`capacity` frames of left/right
//! `f32`), then the crossfade-out ring, then the pre-roll ring.

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{BUFFER_COUNT, LockLevel, Looper};
use crate::dsp::rng::{Rng, RngState};
use crate::dsp::trigger::{ButtonTrigger, SchmittTrigger};
use crate::dsp::{CHANNELS, Frame, sanitize};
use crate::error::StateError;

/// Written into every record.
pub const STATE_VERSION: &str = "2.1.0";

const BYTES_PER_FRAME: usize = CHANNELS * 4;

/// Persisted looper state. Missing fields load as zero/false.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LooperState {
    pub version: String,
    /// 0 = free, 1 = record-locked, 2 = fully locked.
    pub lock_levels: Vec<u8>,
    pub loop_sizes: Vec<usize>,
    pub playback_cross_fade_index: usize,
    pub record_pre_roll_index: f32,
    pub record_index: f32,
    /// -1 when recording is idle.
    pub record_buffer: i32,
    pub playback_index: usize,
    /// -1 when playback is idle.
    pub playback_buffer: i32,
    pub fade_in_start: usize,
    pub playback_clock_high: bool,
    pub record_clock_high: bool,
    pub first_record_clock: bool,
    pub feedback_value: [f32; CHANNELS],
    pub prev_input: [f32; CHANNELS],
    pub playback_repeat_count: u32,
    pub next_read_pattern_index: usize,
    pub cube_button_down: [bool; BUFFER_COUNT],
    pub cube_button_raising: [bool; BUFFER_COUNT],
    pub pitch_correction_on: bool,
    /// Lowpass/highpass memory per channel.
    pub tone_memory: [[f32; 4]; CHANNELS],
    pub rng: RngState,
}

fn buffer_index(raw: i32) -> Option<usize> {
    usize::try_from(raw).ok().filter(|&b| b < BUFFER_COUNT)
}

fn buffer_raw(index: Option<usize>) -> i32 {
    index.map_or(-1, |b| b as i32)
}

impl Looper {
    pub fn save_state(&self) -> LooperState {
        LooperState {
            version: STATE_VERSION.to_string(),
            lock_levels: self.lock_levels.iter().map(|l| l.rank()).collect(),
            loop_sizes: self.loop_sizes.to_vec(),
            playback_cross_fade_index: self.fade_out_position,
            record_pre_roll_index: self.preroll_position,
            record_index: self.record_position,
            record_buffer: buffer_raw(self.record_buffer),
            playback_index: self.playback_position,
            playback_buffer: buffer_raw(self.playback_buffer),
            fade_in_start: self.fade_in_start,
            playback_clock_high: self.playback_clock.is_high(),
            record_clock_high: self.record_clock.is_high(),
            first_record_clock: self.first_record_clock,
            feedback_value: self.feedback,
            prev_input: self.prev_input,
            playback_repeat_count: self.repeat_count,
            next_read_pattern_index: self.read_step,
            cube_button_down: self.cube_buttons.map(|b| b.is_down()),
            cube_button_raising: self.cube_raising,
            pitch_correction_on: self.pitch_correction,
            tone_memory: self.tone.map(|stage| stage.memory()),
            rng: self.rng.snapshot(),
        }
    }

    /// Apply a persisted record. Out-of-range values are clamped; the pitch
    /// shifters restart empty.
    pub fn load_state(&mut self, state: &LooperState) {
        if !state.version.is_empty() && state.version != STATE_VERSION {
            warn!(version = %state.version, "loading looper state from another version");
        }
        for b in 0..BUFFER_COUNT {
            let rank = state.lock_levels.get(b).copied().unwrap_or(0);
            self.lock_levels[b] = LockLevel::from_rank(rank as i32);
            let size = state.loop_sizes.get(b).copied().unwrap_or(0);
            self.loop_sizes[b] = size.min(self.max_loop_size());
        }

        let ring = self.crossfade_len as f32;
        self.fade_out_position = state.playback_cross_fade_index.min(self.crossfade_len);
        self.preroll_position = sanitize(state.record_pre_roll_index).rem_euclid(ring);
        self.record_position =
            sanitize(state.record_index).clamp(0.0, (self.capacity - 1) as f32);
        self.record_buffer = buffer_index(state.record_buffer);
        self.playback_position = state.playback_index.min(self.capacity);
        self.playback_buffer = buffer_index(state.playback_buffer);
        self.fade_in_start = state.fade_in_start.min(self.playback_position);

        self.playback_clock = SchmittTrigger::with_level(state.playback_clock_high);
        self.record_clock = SchmittTrigger::with_level(state.record_clock_high);
        self.first_record_clock = state.first_record_clock;

        self.feedback = state.feedback_value.map(sanitize);
        self.prev_input = state.prev_input.map(sanitize);
        self.repeat_count = state.playback_repeat_count;
        self.read_step = state.next_read_pattern_index % BUFFER_COUNT;
        self.cube_buttons = state
            .cube_button_down
            .map(ButtonTrigger::with_level);
        self.cube_raising = state.cube_button_raising;
        self.pitch_correction = state.pitch_correction_on;

        for (stage, memory) in self.tone.iter_mut().zip(state.tone_memory) {
            stage.restore(memory.map(sanitize));
        }
        self.rng = Rng::from_snapshot(&state.rng);
        self.flush_shifters();
        debug!(
            record_buffer = ?self.record_buffer,
            playback_buffer = ?self.playback_buffer,
            "looper state restored"
        );
    }

    pub fn to_json(&self) -> Result<String, StateError> {
        Ok(serde_json::to_string(&self.save_state())?)
    }

    pub fn load_json(&mut self, json: &str) -> Result<(), StateError> {
        let state: LooperState = serde_json::from_str(json)?;
        self.load_state(&state);
        Ok(())
    }

    /// Bytes [`Looper::save_blob`] produces for this geometry.
    pub fn blob_len(&self) -> usize {
        (BUFFER_COUNT * self.capacity + 2 * self.crossfade_len) * BYTES_PER_FRAME
    }

    pub fn save_blob(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.blob_len()];
        let mut offset = 0;
        let sections = self
            .buffers
            .iter()
            .map(Vec::as_slice)
            .chain([self.fade_out.frames(), self.preroll.frames()]);
        for frames in sections {
            offset = write_frames(&mut bytes, offset, frames);
        }
        bytes
    }

    /// Restore sample data. A blob of the wrong size is rejected and
    /// nothing changes.
    pub fn load_blob(&mut self, bytes: &[u8]) -> Result<(), StateError> {
        let expected = self.blob_len();
        if bytes.len() != expected {
            warn!(expected, found = bytes.len(), "rejecting looper sample blob");
            return Err(StateError::BlobSize {
                expected,
                found: bytes.len(),
            });
        }
        let mut offset = 0;
        for buffer in &mut self.buffers {
            offset = read_frames(bytes, offset, buffer);
        }
        offset = read_frames(bytes, offset, self.fade_out.frames_mut());
        read_frames(bytes, offset, self.preroll.frames_mut());
        Ok(())
    }
}

fn write_frames(bytes: &mut [u8], mut offset: usize, frames: &[Frame]) -> usize {
    for frame in frames {
        for &sample in frame {
            LittleEndian::write_f32(&mut bytes[offset..offset + 4], sample);
            offset += 4;
        }
    }
    offset
}

fn read_frames(bytes: &[u8], mut offset: usize, frames: &mut [Frame]) -> usize {
    for frame in frames {
        for sample in frame.iter_mut() {
            *sample = LittleEndian::read_f32(&bytes[offset..offset + 4]);
            offset += 4;
        }
    }
    offset
}

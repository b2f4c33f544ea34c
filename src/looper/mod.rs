//! Looping buffer engine — Six stereo buffers cycled by independent record
//! and playback cursors.
//!
//! Recording writes the input at a stretched rate into the current record
//! buffer; playback walks another buffer at unity rate and hands over to the
//! next one through a crossfade. Each buffer carries a lock level deciding
//! which cursor may visit it, and those levels drift randomly as the frost
//! control opens up.

mod patterns;
mod state;

pub use patterns::{READ_PATTERN_NEG, READ_PATTERN_POS};
pub use state::{LooperState, STATE_VERSION};

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LooperConfig;
use crate::dsp::crossfade::{StereoRing, fade_in_gain, fade_out_gain};
use crate::dsp::filter::ToneStage;
use crate::dsp::pitch_shifter::{PhaseVocoder, PitchShift};
use crate::dsp::rng::Rng;
use crate::dsp::trigger::{ButtonTrigger, SchmittTrigger};
use crate::dsp::{CHANNELS, Frame, add_frames, lerp_frame, sanitize, scale_frame};
use crate::error::StateError;
use patterns::{order_row, scatter_row};

/// Buffers in the pool.
pub const BUFFER_COUNT: usize = 6;
/// Shortest record length the length control accepts, in seconds.
pub const MIN_RECORD_SECONDS: f32 = 0.1;

const SPEED_MIN: f32 = 0.001;
const SPEED_MAX: f32 = 1000.0;
/// Input is scaled down by this before the pitch shifter and back up after.
const PITCH_HEADROOM: f32 = 10.0;

/// Which cursors may visit a buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LockLevel {
    /// Open to recording and playback.
    #[default]
    Free,
    /// Playback only.
    RecordLocked,
    /// Neither cursor may enter.
    FullyLocked,
}

impl LockLevel {
    pub fn rank(self) -> u8 {
        match self {
            LockLevel::Free => 0,
            LockLevel::RecordLocked => 1,
            LockLevel::FullyLocked => 2,
        }
    }

    /// Out-of-range ranks clamp to the nearest level.
    pub fn from_rank(rank: i32) -> Self {
        match rank {
            i32::MIN..=0 => LockLevel::Free,
            1 => LockLevel::RecordLocked,
            _ => LockLevel::FullyLocked,
        }
    }

    /// Cube light brightness.
    pub fn brightness(self) -> f32 {
        match self {
            LockLevel::Free => 1.0,
            LockLevel::RecordLocked => 0.25,
            LockLevel::FullyLocked => 0.0,
        }
    }
}

/// Lock levels after construction or a clear.
pub const INITIAL_LOCK_LEVELS: [LockLevel; BUFFER_COUNT] = [
    LockLevel::Free,
    LockLevel::Free,
    LockLevel::Free,
    LockLevel::FullyLocked,
    LockLevel::FullyLocked,
    LockLevel::FullyLocked,
];

/// Control values for one tick, with any CV already summed in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LooperParams {
    pub speed_numerator: f32,
    pub speed_denominator: f32,
    /// Chance in `[0, 1]` that a jump leaves the lock levels alone.
    pub frost: f32,
    /// Used when no record clock is patched.
    pub record_length_seconds: f32,
    /// When false, playback runs over into the next buffer at the same
    /// position instead of restarting.
    pub playback_resets: bool,
    pub repeats: f32,
    /// Negative values scatter forward jumps, positive ones pick a visiting order.
    pub pattern: f32,
    pub feedback: f32,
    pub cube_buttons: [bool; BUFFER_COUNT],
}

impl Default for LooperParams {
    fn default() -> Self {
        LooperParams {
            speed_numerator: 6.0,
            speed_denominator: 6.0,
            frost: 0.5,
            record_length_seconds: 1.0,
            playback_resets: true,
            repeats: 1.0,
            pattern: 0.0,
            feedback: 0.0,
            cube_buttons: [false; BUFFER_COUNT],
        }
    }
}

impl LooperParams {
    /// Record speed relative to real time.
    pub fn speed(&self) -> f32 {
        let numerator = sanitize(self.speed_numerator).round().max(1.0);
        let denominator = sanitize(self.speed_denominator).round().max(1.0);
        (numerator / denominator).clamp(SPEED_MIN, SPEED_MAX)
    }

    fn repeat_limit(&self) -> u32 {
        sanitize(self.repeats).round().max(1.0) as u32
    }
}

/// Jack voltages for one tick. Unpatched audio and record-clock jacks are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LooperInputs {
    pub left: Option<f32>,
    pub right: Option<f32>,
    pub record_clock: Option<f32>,
    pub playback_clock: f32,
}

impl LooperInputs {
    pub fn stereo(left: f32, right: f32) -> Self {
        LooperInputs {
            left: Some(left),
            right: Some(right),
            ..Default::default()
        }
    }
}

/// Panel indicators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LooperLights {
    pub cubes: [f32; BUFFER_COUNT],
    pub recording: [f32; BUFFER_COUNT],
    pub playing: [f32; BUFFER_COUNT],
}

pub struct Looper {
    config: LooperConfig,
    sample_rate: f32,
    crossfade_len: usize,
    capacity: usize,

    buffers: Vec<Vec<Frame>>,
    lock_levels: [LockLevel; BUFFER_COUNT],
    loop_sizes: [usize; BUFFER_COUNT],

    preroll: StereoRing,
    preroll_position: f32,
    fade_out: StereoRing,
    fade_out_position: usize,

    record_position: f32,
    record_buffer: Option<usize>,
    playback_position: usize,
    playback_buffer: Option<usize>,
    fade_in_start: usize,

    record_clock: SchmittTrigger,
    playback_clock: SchmittTrigger,
    first_record_clock: bool,

    feedback: Frame,
    prev_input: Frame,
    repeat_count: u32,
    read_step: usize,

    cube_buttons: [ButtonTrigger; BUFFER_COUNT],
    cube_raising: [bool; BUFFER_COUNT],

    pitch_correction: bool,
    shifting: bool,
    shifters: [Box<dyn PitchShift>; CHANNELS],
    tone: [ToneStage; CHANNELS],
    rng: Rng,

    params: LooperParams,
    buffer_length: usize,
}

impl fmt::Debug for Looper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Looper")
            .field("lock_levels", &self.lock_levels)
            .field("loop_sizes", &self.loop_sizes)
            .field("record_buffer", &self.record_buffer)
            .field("record_position", &self.record_position)
            .field("playback_buffer", &self.playback_buffer)
            .field("playback_position", &self.playback_position)
            .finish_non_exhaustive()
    }
}

impl Looper {
    /// A looper with the default geometry.
    pub fn new(sample_rate: f32) -> Self {
        Self::build(LooperConfig::default(), sample_rate)
    }

    pub fn with_config(config: LooperConfig, sample_rate: f32) -> Result<Self, StateError> {
        config.validate()?;
        Ok(Self::build(config, sample_rate))
    }

    /// Swap in a different pitch-shifting implementation per channel.
    pub fn with_pitch_shifters(
        mut self,
        left: Box<dyn PitchShift>,
        right: Box<dyn PitchShift>,
    ) -> Self {
        self.shifters = [left, right];
        self
    }

    fn build(config: LooperConfig, sample_rate: f32) -> Self {
        let crossfade_len = config.crossfade_len();
        let capacity = config.buffer_capacity();
        let shifter = || -> Box<dyn PitchShift> {
            Box::new(PhaseVocoder::new(
                config.pitch_frame_size,
                config.pitch_oversampling,
                sample_rate,
            ))
        };
        let params = LooperParams::default();
        let buffer_length = (config.assumed_sample_rate as f32 * params.record_length_seconds)
            .round() as usize;

        let mut looper = Looper {
            sample_rate,
            crossfade_len,
            capacity,
            buffers: vec![vec![[0.0; CHANNELS]; capacity]; BUFFER_COUNT],
            lock_levels: INITIAL_LOCK_LEVELS,
            loop_sizes: [0; BUFFER_COUNT],
            preroll: StereoRing::new(crossfade_len),
            preroll_position: 0.0,
            fade_out: StereoRing::new(crossfade_len),
            fade_out_position: 0,
            record_position: 0.0,
            record_buffer: Some(0),
            playback_position: 0,
            playback_buffer: None,
            fade_in_start: 0,
            record_clock: SchmittTrigger::new(),
            playback_clock: SchmittTrigger::new(),
            first_record_clock: true,
            feedback: [0.0; CHANNELS],
            prev_input: [0.0; CHANNELS],
            repeat_count: 0,
            read_step: 0,
            cube_buttons: [ButtonTrigger::default(); BUFFER_COUNT],
            cube_raising: [false; BUFFER_COUNT],
            pitch_correction: true,
            shifting: false,
            shifters: [shifter(), shifter()],
            tone: [ToneStage::new(sample_rate); CHANNELS],
            rng: Rng::new_with_seed(config.seed as u128),
            params,
            buffer_length: buffer_length.clamp(2, capacity - 2),
            config,
        };
        looper.clear();
        looper
    }

    // ── Accessors ───────────────────────────────────────────

    pub fn config(&self) -> &LooperConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn crossfade_len(&self) -> usize {
        self.crossfade_len
    }

    /// Frames per buffer.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Largest loop a buffer may hold; the rest is crossfade headroom.
    pub fn max_loop_size(&self) -> usize {
        self.capacity - self.crossfade_len
    }

    pub fn lock_level(&self, buffer: usize) -> LockLevel {
        self.lock_levels[buffer]
    }

    pub fn set_lock_level(&mut self, buffer: usize, level: LockLevel) {
        self.lock_levels[buffer] = level;
    }

    pub fn loop_size(&self, buffer: usize) -> usize {
        self.loop_sizes[buffer]
    }

    pub fn record_buffer(&self) -> Option<usize> {
        self.record_buffer
    }

    pub fn playback_buffer(&self) -> Option<usize> {
        self.playback_buffer
    }

    pub fn record_position(&self) -> f32 {
        self.record_position
    }

    pub fn playback_position(&self) -> usize {
        self.playback_position
    }

    /// Recorded frames of one buffer.
    pub fn buffer(&self, buffer: usize) -> &[Frame] {
        &self.buffers[buffer]
    }

    pub fn pitch_correction(&self) -> bool {
        self.pitch_correction
    }

    pub fn set_pitch_correction(&mut self, enabled: bool) {
        if !enabled && self.shifting {
            self.flush_shifters();
        }
        self.pitch_correction = enabled;
    }

    pub fn lights(&self) -> LooperLights {
        let mut lights = LooperLights {
            cubes: [0.0; BUFFER_COUNT],
            recording: [0.0; BUFFER_COUNT],
            playing: [0.0; BUFFER_COUNT],
        };
        for b in 0..BUFFER_COUNT {
            lights.cubes[b] = self.lock_levels[b].brightness();
            lights.recording[b] = if self.record_buffer == Some(b) { 1.0 } else { 0.0 };
            lights.playing[b] = if self.playback_buffer == Some(b) { 1.0 } else { 0.0 };
        }
        lights
    }

    // ── Lifecycle ───────────────────────────────────────────

    /// Empty every buffer and ring and return the cursors and locks to
    /// their initial state.
    pub fn clear(&mut self) {
        for buffer in &mut self.buffers {
            buffer.fill([0.0; CHANNELS]);
        }
        self.lock_levels = INITIAL_LOCK_LEVELS;
        self.loop_sizes = [0; BUFFER_COUNT];
        self.preroll.clear();
        self.fade_out.clear();
        self.preroll_position = 0.0;
        self.fade_out_position = self.crossfade_len;

        self.record_position = 0.0;
        self.record_buffer = Some(0);
        self.playback_position = 0;
        self.playback_buffer = None;
        self.fade_in_start = 0;

        self.record_clock.reset();
        self.playback_clock.reset();
        self.first_record_clock = true;

        self.feedback = [0.0; CHANNELS];
        self.prev_input = [0.0; CHANNELS];
        self.repeat_count = 0;
        self.read_step = 0;
        debug!("looper cleared");
    }

    pub fn reset(&mut self) {
        self.clear();
        self.flush_shifters();
        self.pitch_correction = true;
        for stage in &mut self.tone {
            stage.reset();
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        for shifter in &mut self.shifters {
            shifter.set_sample_rate(sample_rate);
        }
        self.shifting = false;
        for stage in &mut self.tone {
            stage.set_sample_rate(sample_rate);
        }
    }

    fn flush_shifters(&mut self) {
        for shifter in &mut self.shifters {
            shifter.reset();
        }
        self.shifting = false;
    }

    // ── Per-sample processing ───────────────────────────────

    /// Advance one sample and return the stereo output.
    pub fn tick(&mut self, inputs: &LooperInputs, params: &LooperParams) -> Frame {
        self.params = *params;
        self.handle_cube_buttons();

        let seconds = match inputs.record_clock {
            Some(_) => self.config.max_record_seconds,
            None => sanitize(params.record_length_seconds)
                .clamp(MIN_RECORD_SECONDS, self.config.max_record_seconds),
        };
        self.buffer_length = self.frames_for(seconds);

        if self.record_clock.rising(inputs.record_clock.unwrap_or(0.0)) {
            if self.first_record_clock {
                self.first_record_clock = false;
            } else {
                self.record_jump_to_next_track();
            }
        }
        if self.playback_clock.rising(inputs.playback_clock) {
            self.playback_jump_to_next_track(false, false);
        }

        let stretch = 1.0 / params.speed();
        let amount = sanitize(params.feedback);
        self.feedback = self.feedback.map(|v| sanitize(v * amount));

        let input = self.read_input(inputs, stretch);
        self.write_preroll(input, stretch);
        self.write_record(input, stretch);
        self.prev_input = input;

        let mut output = self.advance_playback();
        if self.fade_out_position < self.crossfade_len {
            output = add_frames(output, self.fade_out.get(self.fade_out_position));
            self.fade_out_position += 1;
        }

        for (ch, stage) in self.tone.iter_mut().enumerate() {
            output[ch] = sanitize(stage.process(sanitize(output[ch])));
        }
        self.feedback = output;
        output
    }

    /// Process separate left/right channels in place with fixed params.
    pub fn process_block(
        &mut self,
        left: &mut [f32],
        right: &mut [f32],
        playback_clock: &[f32],
        params: &LooperParams,
    ) {
        for i in 0..left.len().min(right.len()) {
            let inputs = LooperInputs {
                left: Some(left[i]),
                right: Some(right[i]),
                record_clock: None,
                playback_clock: playback_clock.get(i).copied().unwrap_or(0.0),
            };
            let [l, r] = self.tick(&inputs, params);
            left[i] = l;
            right[i] = r;
        }
    }

    fn frames_for(&self, seconds: f32) -> usize {
        let frames = (self.config.assumed_sample_rate as f32 * seconds).round() as usize;
        frames.clamp(2, self.capacity - 2)
    }

    /// Tail and pre-roll fade length for a span, never more than half of it.
    fn fade_len(&self, span: usize) -> usize {
        self.crossfade_len.min(span / 2).max(1)
    }

    fn read_input(&mut self, inputs: &LooperInputs, stretch: f32) -> Frame {
        let shift = self.pitch_correction && stretch != 1.0;
        if !shift && self.shifting {
            self.flush_shifters();
        }
        self.shifting = shift;

        let mut frame = [0.0; CHANNELS];
        for (ch, raw) in [inputs.left, inputs.right].into_iter().enumerate() {
            let Some(raw) = raw else { continue };
            let raw = sanitize(raw);
            frame[ch] = if shift {
                self.shifters[ch].process(stretch, raw / PITCH_HEADROOM) * PITCH_HEADROOM
            } else {
                raw
            };
        }
        [
            sanitize(frame[0] + self.feedback[0]),
            sanitize(frame[1] + self.feedback[1]),
        ]
    }

    fn write_preroll(&mut self, input: Frame, stretch: f32) {
        let len = self.preroll.len() as f32;
        let low = self.preroll_position as usize;
        self.preroll_position = (self.preroll_position + stretch) % len;
        for d in 0..=stretch as usize {
            let frame = lerp_frame(self.prev_input, input, d as f32 / stretch);
            self.preroll.set(low + d, frame);
        }
    }

    fn write_record(&mut self, input: Frame, stretch: f32) {
        let Some(buffer) = self.record_buffer else { return };
        let low = self.record_position as usize;
        // Advance first so a jump inside the loop can override the cursor.
        self.record_position += stretch;
        for d in 0..=stretch as usize {
            let index = low + d;
            if index >= self.capacity {
                self.record_jump_to_next_track();
                break;
            }
            self.buffers[buffer][index] = lerp_frame(self.prev_input, input, d as f32 / stretch);
            if index + 1 >= self.buffer_length {
                self.record_position = (index + 1) as f32;
                self.record_jump_to_next_track();
                break;
            }
        }
    }

    fn advance_playback(&mut self) -> Frame {
        let Some(buffer) = self.playback_buffer else {
            return [0.0; CHANNELS];
        };
        let output = self.playback_frame(buffer, self.playback_position);
        self.playback_position += 1;

        if self.params.playback_resets && self.playback_position >= self.loop_sizes[buffer] {
            self.playback_jump_to_next_track(false, true);
        }
        if self.playback_position >= self.buffer_length {
            self.playback_jump_to_next_track(true, true);
        }
        output
    }

    /// Frame at `index` of a buffer, wrapped into its loop and faded in from
    /// the last cut point.
    fn playback_frame(&self, buffer: usize, index: usize) -> Frame {
        let loop_size = self.loop_sizes[buffer];
        if loop_size == 0 {
            return [0.0; CHANNELS];
        }
        let frame = self.buffers[buffer][index % loop_size];
        let offset = index.saturating_sub(self.fade_in_start);
        scale_frame(frame, fade_in_gain(offset, self.crossfade_len))
    }

    fn handle_cube_buttons(&mut self) {
        for b in 0..BUFFER_COUNT {
            if !self.cube_buttons[b].press(self.params.cube_buttons[b]) {
                continue;
            }
            let level = match self.lock_levels[b] {
                LockLevel::RecordLocked if self.cube_raising[b] => LockLevel::FullyLocked,
                LockLevel::RecordLocked => LockLevel::Free,
                LockLevel::FullyLocked => {
                    self.cube_raising[b] = false;
                    LockLevel::RecordLocked
                }
                LockLevel::Free => {
                    self.cube_raising[b] = true;
                    LockLevel::RecordLocked
                }
            };
            self.lock_levels[b] = level;
            debug!(buffer = b, ?level, "cube toggled");

            if self.record_buffer.is_none() && level == LockLevel::Free {
                self.record_jump_to_next_track();
            } else if self.record_buffer == Some(b) && level != LockLevel::FullyLocked {
                self.record_jump_to_next_track();
            }

            if self.playback_buffer.is_none() && level != LockLevel::Free {
                self.playback_jump_to_next_track(false, false);
            } else if self.playback_buffer == Some(b) && level == LockLevel::Free {
                self.playback_jump_to_next_track(false, false);
            }
        }
    }

    // ── Cursor jumps ────────────────────────────────────────

    /// Close the current recording and move the record cursor to the next
    /// free buffer, seeding its head with the faded pre-roll.
    pub fn record_jump_to_next_track(&mut self) {
        if let Some(buffer) = self.record_buffer {
            self.finalize_recording(buffer);
        }

        self.record_buffer = self.next_record_buffer();
        let preroll = self.fade_len(self.buffer_length);
        self.record_position = self.preroll_position.fract() + preroll as f32 - 1.0;

        if let Some(buffer) = self.record_buffer {
            // Oldest first; a shortened pre-roll skips the oldest frames.
            let oldest = self.preroll_position as usize + 1 + (self.crossfade_len - preroll);
            for ci in 0..preroll {
                let frame = self.preroll.get(oldest + ci);
                self.buffers[buffer][ci] = scale_frame(frame, ci as f32 / preroll as f32);
            }
        }
        debug!(record_buffer = ?self.record_buffer, "record cursor jumped");

        if self.playback_buffer.is_none() && self.record_buffer.is_some() {
            self.playback_jump_to_next_track(true, false);
        }
        self.update_buffer_locks();
    }

    fn finalize_recording(&mut self, buffer: usize) {
        let loop_size = (self.record_position.max(0.0) as usize).min(self.max_loop_size());
        self.loop_sizes[buffer] = loop_size;

        let fade = self.fade_len(loop_size);
        let frames = &mut self.buffers[buffer];
        for ci in 0..fade {
            let i = loop_size - ci;
            frames[i] = scale_frame(frames[i], ci as f32 / fade as f32);
        }

        // The first pass over an empty frozen twin becomes its content.
        let twin = buffer + BUFFER_COUNT / 2;
        if twin < BUFFER_COUNT && self.loop_sizes[twin] == 0 {
            let (head, tail) = self.buffers.split_at_mut(twin);
            tail[0][..loop_size].copy_from_slice(&head[buffer][..loop_size]);
            self.loop_sizes[twin] = loop_size;
            debug!(buffer, twin, loop_size, "seeded frozen twin");
        }
    }

    /// Move playback to the next buffer, queueing the outgoing audio into
    /// the crossfade-out ring.
    ///
    /// `consumed_current_output` is true when this tick's output was already
    /// read from the outgoing buffer.
    pub fn playback_jump_to_next_track(&mut self, force_reset: bool, consumed_current_output: bool) {
        let runover = !self.params.playback_resets;

        if let Some(buffer) = self.playback_buffer {
            self.capture_fade_out(buffer, runover, consumed_current_output);
        }

        if force_reset || !runover {
            self.playback_position = 0;
            self.fade_in_start = 0;
        } else {
            self.fade_in_start = self.playback_position;
        }

        if self.playback_buffer.is_some() {
            self.repeat_count += 1;
            if self.repeat_count < self.params.repeat_limit() {
                return;
            }
            self.repeat_count = 0;
        }

        self.playback_buffer = self.next_playback_buffer();
        debug!(playback_buffer = ?self.playback_buffer, "playback cursor jumped");
        if self.record_buffer.is_none() {
            self.record_jump_to_next_track();
        }
        self.update_buffer_locks();
    }

    fn capture_fade_out(&mut self, buffer: usize, runover: bool, consumed: bool) {
        let window = self.crossfade_len;
        let loop_size = self.loop_sizes[buffer].min(self.capacity);
        let lead = usize::from(consumed);

        // Ascending in place: reads at `ci + position` never trail the write at `ci`.
        for ci in 0..window {
            let mut frame = [0.0; CHANNELS];
            if ci >= lead {
                let k = ci - lead;
                let index = self.playback_position + k;
                if runover || index < loop_size {
                    frame = scale_frame(self.playback_frame(buffer, index), fade_out_gain(k, window));
                }
            }
            let pending = ci + self.fade_out_position;
            if pending < window {
                frame = add_frames(frame, self.fade_out.get(pending));
            }
            self.fade_out.set(ci, frame);
        }
        self.fade_out_position = 0;
    }

    fn next_record_buffer(&self) -> Option<usize> {
        let start = self.record_buffer.unwrap_or(BUFFER_COUNT - 1);
        (1..=BUFFER_COUNT)
            .map(|i| (start + i) % BUFFER_COUNT)
            .find(|&b| self.is_buffer_free(b, true))
    }

    fn next_playback_buffer(&mut self) -> Option<usize> {
        let pattern = sanitize(self.params.pattern).clamp(-1.0, 1.0);
        if pattern < 0.0 {
            let start = self.playback_buffer.unwrap_or(BUFFER_COUNT - 1);
            let max_jump = READ_PATTERN_NEG[scatter_row(pattern)][self.read_step] as f32;
            let first = (self.rng.uniform() * self.rng.uniform() * max_jump + 1.0) as usize;
            let first = first.min(BUFFER_COUNT - 1);
            (1..=first)
                .rev()
                .chain(first + 1..BUFFER_COUNT)
                .map(|i| (start + i) % BUFFER_COUNT)
                .find(|&b| self.is_buffer_free(b, false))
        } else {
            let order = READ_PATTERN_POS[order_row(pattern)];
            for _ in 1..BUFFER_COUNT {
                self.read_step = (self.read_step + 1) % BUFFER_COUNT;
                let candidate = order[self.read_step] as usize % BUFFER_COUNT;
                if self.is_buffer_free(candidate, false) {
                    return Some(candidate);
                }
            }
            None
        }
    }

    /// Whether a cursor may move into buffer `b`.
    pub fn is_buffer_free(&self, b: usize, for_record: bool) -> bool {
        if self.playback_buffer == Some(b) || self.record_buffer == Some(b) {
            return false;
        }
        match self.lock_levels[b] {
            LockLevel::FullyLocked => false,
            LockLevel::RecordLocked if for_record => false,
            _ => for_record || self.loop_sizes[b] > 0,
        }
    }

    /// Randomly nudge one idle buffer's lock level, weighted by frost.
    pub fn update_buffer_locks(&mut self) {
        let free = self.count_locks(LockLevel::Free);
        let frozen = self.count_locks(LockLevel::FullyLocked);
        let change_chance = 1.0 - sanitize(self.params.frost);
        if self.rng.uniform() >= change_chance {
            return;
        }

        let index = ((self.rng.uniform() * BUFFER_COUNT as f32) as usize).min(BUFFER_COUNT - 1);
        if self.record_buffer == Some(index) || self.playback_buffer == Some(index) {
            return;
        }

        let current = self.lock_levels[index];
        let rank = current.rank() as i32;
        let rank = if free < 2 {
            rank - 1
        } else if frozen < 1 {
            rank + 1
        } else if current == LockLevel::RecordLocked {
            if self.rng.uniform() < 0.3 {
                if self.rng.uniform() < 0.5 { 2 } else { 0 }
            } else {
                rank
            }
        } else if self.rng.uniform() < 0.5 {
            1
        } else {
            rank
        };
        let next = LockLevel::from_rank(rank);

        // Keep one buffer open to recording and one frozen.
        if current == LockLevel::Free && next != LockLevel::Free && free <= 1 {
            return;
        }
        if current == LockLevel::FullyLocked && next != current && frozen <= 1 {
            return;
        }
        if next != current {
            debug!(buffer = index, from = ?current, to = ?next, "lock level drifted");
            self.lock_levels[index] = next;
        }
    }

    fn count_locks(&self, level: LockLevel) -> usize {
        self.lock_levels.iter().filter(|&&l| l == level).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    const SR: f32 = 44100.0;

    fn steady_params() -> LooperParams {
        LooperParams {
            frost: 1.0,
            ..Default::default()
        }
    }

    fn run(looper: &mut Looper, ticks: usize, inputs: &LooperInputs, params: &LooperParams) {
        for _ in 0..ticks {
            looper.tick(inputs, params);
        }
    }

    #[test]
    fn test_initial_state() {
        let looper = Looper::new(SR);
        assert_eq!(looper.crossfade_len(), 6615);
        assert_eq!(looper.capacity(), 441_002);
        assert_eq!(looper.record_buffer(), Some(0));
        assert_eq!(looper.playback_buffer(), None);
        let lights = looper.lights();
        assert_eq!(lights.cubes, [1.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
        assert_eq!(lights.recording[0], 1.0);
    }

    #[test]
    fn test_speed_rounding_and_floor() {
        let mut p = LooperParams::default();
        assert_eq!(p.speed(), 1.0);
        p.speed_numerator = 0.2;
        p.speed_denominator = 2.4;
        assert_eq!(p.speed(), 0.5);
        p.speed_numerator = f32::NAN;
        assert_eq!(p.speed(), 0.5);
    }

    #[test]
    fn test_short_record_length_forces_jump() {
        let mut looper = Looper::new(SR);
        let params = LooperParams {
            record_length_seconds: 0.1,
            ..steady_params()
        };
        let inputs = LooperInputs::stereo(1.0, 1.0);
        run(&mut looper, 4410, &inputs, &params);
        assert_ne!(looper.record_buffer(), Some(0), "record cursor should have moved");
        assert!(looper.loop_size(0) > 0);
        assert!(looper.loop_size(0) <= looper.max_loop_size());
    }

    #[test]
    fn test_first_record_seeds_frozen_twin() {
        let mut looper = Looper::new(SR);
        let params = LooperParams {
            record_length_seconds: 0.2,
            ..steady_params()
        };
        run(&mut looper, 8820, &LooperInputs::stereo(0.5, -0.5), &params);
        assert_eq!(looper.loop_size(3), looper.loop_size(0));
        assert_eq!(looper.buffer(3)[100], looper.buffer(0)[100]);
        assert_eq!(looper.lock_level(3), LockLevel::FullyLocked);
    }

    #[test]
    fn test_loop_sizes_stay_bounded() {
        let mut looper = Looper::new(SR);
        let params = LooperParams {
            record_length_seconds: 0.1,
            frost: 0.0,
            speed_numerator: 1.0,
            speed_denominator: 3.0,
            ..Default::default()
        };
        looper.set_pitch_correction(false);
        let inputs = LooperInputs::stereo(0.3, 0.3);
        for _ in 0..20 {
            run(&mut looper, 2000, &inputs, &params);
            for b in 0..BUFFER_COUNT {
                assert!(looper.loop_size(b) <= looper.max_loop_size());
            }
        }
    }

    #[test]
    fn test_record_clock_first_edge_only_arms() {
        let mut looper = Looper::new(SR);
        let params = steady_params();
        let high = LooperInputs {
            record_clock: Some(5.0),
            ..LooperInputs::stereo(0.0, 0.0)
        };
        let low = LooperInputs {
            record_clock: Some(0.0),
            ..high
        };
        looper.tick(&high, &params);
        assert_eq!(looper.record_buffer(), Some(0));
        looper.tick(&low, &params);
        looper.tick(&high, &params);
        assert_eq!(looper.record_buffer(), Some(1));
    }

    #[test]
    fn test_no_free_record_buffer_idles() {
        let mut looper = Looper::new(SR);
        for b in 0..BUFFER_COUNT {
            looper.set_lock_level(b, LockLevel::FullyLocked);
        }
        looper.record_jump_to_next_track();
        assert_eq!(looper.record_buffer(), None);
        let out = looper.tick(&LooperInputs::stereo(1.0, 1.0), &steady_params());
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_is_buffer_free_rules() {
        let mut looper = Looper::new(SR);
        // Record target is in use.
        assert!(!looper.is_buffer_free(0, true));
        assert!(looper.is_buffer_free(1, true));
        // Empty buffers cannot be played.
        assert!(!looper.is_buffer_free(1, false));
        looper.set_lock_level(1, LockLevel::RecordLocked);
        assert!(!looper.is_buffer_free(1, true));
        assert!(!looper.is_buffer_free(3, true));
    }

    #[test]
    fn test_cube_button_cycles_levels() {
        let mut looper = Looper::new(SR);
        let mut params = steady_params();
        let inputs = LooperInputs::default();
        let press = |looper: &mut Looper, params: &mut LooperParams| {
            params.cube_buttons[2] = true;
            looper.tick(&inputs, params);
            params.cube_buttons[2] = false;
            looper.tick(&inputs, params);
        };
        press(&mut looper, &mut params);
        assert_eq!(looper.lock_level(2), LockLevel::RecordLocked);
        press(&mut looper, &mut params);
        assert_eq!(looper.lock_level(2), LockLevel::FullyLocked);
        press(&mut looper, &mut params);
        assert_eq!(looper.lock_level(2), LockLevel::RecordLocked);
        press(&mut looper, &mut params);
        assert_eq!(looper.lock_level(2), LockLevel::Free);
    }

    #[test]
    fn test_crossfade_sums_to_constant() {
        let mut looper = Looper::new(SR);
        let window = looper.crossfade_len();
        let size = 40_000;
        for b in [1, 2] {
            looper.buffers[b][..size].fill([0.5, 0.5]);
            looper.loop_sizes[b] = size;
        }
        looper.set_lock_level(1, LockLevel::RecordLocked);
        looper.set_lock_level(2, LockLevel::RecordLocked);
        looper.playback_buffer = Some(1);
        looper.playback_position = window * 2;
        looper.fade_in_start = 0;
        looper.params = LooperParams {
            pattern: 0.0,
            ..steady_params()
        };

        looper.playback_jump_to_next_track(false, false);
        let next = looper.playback_buffer().expect("a playable buffer");
        assert_ne!(next, 1);
        for _ in 0..window {
            let index = looper.playback_position;
            let incoming = looper.playback_frame(next, index);
            let outgoing = looper.fade_out.get(looper.fade_out_position);
            let sum = incoming[0] + outgoing[0];
            assert!((sum - 0.5).abs() < 1e-5, "sum {sum} at {index}");
            looper.playback_position += 1;
            looper.fade_out_position += 1;
        }
    }

    #[test]
    fn test_consumed_jump_keeps_continuity() {
        let mut looper = Looper::new(SR);
        let window = looper.crossfade_len();
        let size = 30_000;
        for b in [1, 2] {
            looper.buffers[b][..size].fill([0.25, 0.25]);
            looper.loop_sizes[b] = size;
            looper.set_lock_level(b, LockLevel::RecordLocked);
        }
        looper.playback_buffer = Some(1);
        looper.playback_position = size;
        looper.params = LooperParams {
            playback_resets: false,
            ..steady_params()
        };
        looper.playback_jump_to_next_track(false, true);
        // This tick's ring slot carries nothing new; the tail starts next tick.
        assert_eq!(looper.fade_out.get(0), [0.0, 0.0]);
        looper.fade_out_position = 1;
        for _ in 1..window {
            let next = looper.playback_buffer().expect("playing");
            let incoming = looper.playback_frame(next, looper.playback_position);
            let outgoing = looper.fade_out.get(looper.fade_out_position);
            assert!((incoming[0] + outgoing[0] - 0.25).abs() < 1e-5);
            looper.playback_position += 1;
            looper.fade_out_position += 1;
        }
    }

    #[test]
    fn test_sine_plays_back_phase_aligned() {
        let mut looper = Looper::new(SR);
        let params = LooperParams {
            record_length_seconds: 1.0,
            ..steady_params()
        };
        let freq = 441.0;
        let sine = |n: usize| (TAU * freq * n as f32 / SR).sin();

        let mut n = 0;
        while looper.record_buffer() == Some(0) {
            looper.tick(&LooperInputs::stereo(sine(n), sine(n)), &params);
            n += 1;
        }
        let loop_size = looper.loop_size(0);
        assert_eq!(loop_size, 44_100);
        assert_eq!(looper.playback_buffer(), Some(0));

        // Whole cycles fit the loop, so the seam lands on the input's phase.
        // Writes trail the input by one frame.
        let frames = looper.buffer(0);
        for i in [10_000, 20_000, 30_000] {
            let expected = sine(i - 1);
            assert!(
                (frames[i][0] - expected).abs() < 1e-3,
                "frame {i}: {} vs {expected}",
                frames[i][0]
            );
        }

        // Past the fade-in, the output follows the recording up to the
        // output filters' phase shift.
        let window = looper.crossfade_len();
        let tail_fade = loop_size - window;
        let mut checked = 0;
        while looper.playback_position() < tail_fade {
            let index = looper.playback_position();
            let out = looper.tick(&LooperInputs::stereo(sine(n), sine(n)), &params);
            n += 1;
            if index < window {
                continue;
            }
            let recorded = looper.buffer(0)[index % loop_size][0];
            assert!(
                (out[0] - recorded).abs() < 0.1,
                "index {index}: out {} vs recorded {recorded}",
                out[0]
            );
            assert!((out[0] - sine(index - 1)).abs() < 0.1, "index {index} out of phase");
            checked += 1;
        }
        assert_eq!(looper.playback_buffer(), Some(0));
        assert!(checked > 30_000);
    }

    #[test]
    fn test_pitch_correction_engages_off_unity_speed() {
        let mut corrected = Looper::new(SR);
        let mut raw = Looper::new(SR);
        raw.set_pitch_correction(false);
        let mut params = LooperParams {
            speed_numerator: 2.0,
            speed_denominator: 7.0,
            ..steady_params()
        };
        let sine = |n: usize| 5.0 * (TAU * 441.0 * n as f32 / SR).sin();

        let mut n = 0;
        for _ in 0..3000 {
            let inputs = LooperInputs::stereo(sine(n), sine(n));
            let a = corrected.tick(&inputs, &params);
            let b = raw.tick(&inputs, &params);
            assert!(a.iter().chain(&b).all(|v| v.is_finite()));
            n += 1;
        }
        assert!(corrected.shifting);
        assert!(!raw.shifting);
        assert_eq!(corrected.record_position(), raw.record_position());

        // Three and a half frames per tick; past the shifter's latency both
        // buffers carry signal, but not the same signal.
        let mean_abs = |frames: &[Frame]| {
            frames.iter().map(|f| f[0].abs()).sum::<f32>() / frames.len() as f32
        };
        let shifted = &corrected.buffer(0)[7000..10_000];
        let plain = &raw.buffer(0)[7000..10_000];
        assert!(shifted.iter().all(|f| f[0].abs() < 50.0));
        assert!(mean_abs(shifted) > 0.25, "shifted level {}", mean_abs(shifted));
        assert!(mean_abs(plain) > 2.0);
        assert!(
            shifted.iter().zip(plain).any(|(a, b)| (a[0] - b[0]).abs() > 0.1),
            "pitch correction left the input untouched"
        );

        // Back at unity the shifter is flushed and the input passes raw.
        params.speed_numerator = 1.0;
        params.speed_denominator = 1.0;
        for _ in 0..20 {
            let inputs = LooperInputs::stereo(sine(n), sine(n));
            corrected.tick(&inputs, &params);
            raw.tick(&inputs, &params);
            n += 1;
        }
        assert!(!corrected.shifting);
        let end = corrected.record_position() as usize;
        assert_eq!(corrected.buffer(0)[end - 10..end], raw.buffer(0)[end - 10..end]);
    }

    #[test]
    fn test_jump_near_stays_within_scatter_bound() {
        let mut looper = Looper::new(SR);
        let params = LooperParams {
            record_length_seconds: 0.1,
            pattern: -0.5,
            ..steady_params()
        };
        let inputs = LooperInputs::stereo(0.5, 0.5);

        // Three passes fill the open buffers and seed their frozen twins.
        run(&mut looper, 15_000, &inputs, &params);
        assert!((0..BUFFER_COUNT).all(|b| looper.loop_size(b) > 0));
        for b in BUFFER_COUNT / 2..BUFFER_COUNT {
            looper.set_lock_level(b, LockLevel::RecordLocked);
        }

        let row = READ_PATTERN_NEG[scatter_row(params.pattern)];
        let bound = row.iter().copied().max().unwrap_or(1) as usize;
        assert_eq!(bound, 3);

        let mut distances = [0usize; BUFFER_COUNT];
        let mut previous = looper.playback_buffer();
        for _ in 0..300_000 {
            looper.tick(&inputs, &params);
            let current = looper.playback_buffer();
            if let (Some(from), Some(to)) = (previous, current) {
                if from != to {
                    distances[(to + BUFFER_COUNT - from) % BUFFER_COUNT] += 1;
                }
            }
            previous = current;
        }
        assert!(distances[bound + 1..].iter().all(|&c| c == 0), "{distances:?}");
        assert!(distances[1] > 0, "{distances:?}");
        assert!(distances[2..=bound].iter().sum::<usize>() > 0, "{distances:?}");
    }

    #[test]
    fn test_repeats_hold_buffer() {
        let mut looper = Looper::new(SR);
        for b in [1, 2] {
            looper.loop_sizes[b] = 1000;
            looper.set_lock_level(b, LockLevel::RecordLocked);
        }
        looper.playback_buffer = Some(1);
        looper.params = LooperParams {
            repeats: 3.0,
            ..steady_params()
        };
        looper.playback_jump_to_next_track(false, true);
        assert_eq!(looper.playback_buffer(), Some(1));
        looper.playback_jump_to_next_track(false, true);
        assert_eq!(looper.playback_buffer(), Some(1));
        looper.playback_jump_to_next_track(false, true);
        assert_ne!(looper.playback_buffer(), Some(1));
    }

    #[test]
    fn test_lock_drift_keeps_floors() {
        let mut looper = Looper::new(SR);
        let params = LooperParams {
            frost: 0.0,
            record_length_seconds: 0.1,
            ..Default::default()
        };
        let inputs = LooperInputs::stereo(0.2, -0.2);
        let count = |looper: &Looper, level: LockLevel| {
            (0..BUFFER_COUNT)
                .filter(|&b| looper.lock_level(b) == level)
                .count()
        };
        let mut changed = false;
        for n in 0..200_000 {
            looper.tick(&inputs, &params);
            if n % 50 == 0 {
                looper.record_jump_to_next_track();
            }
            changed |= (0..BUFFER_COUNT).any(|b| looper.lock_level(b) != INITIAL_LOCK_LEVELS[b]);
            assert!(count(&looper, LockLevel::Free) >= 1, "no buffer left open at {n}");
            assert!(count(&looper, LockLevel::FullyLocked) >= 1, "no buffer left frozen at {n}");
        }
        assert!(changed, "locks never drifted with frost at zero");
    }

    #[test]
    fn test_full_frost_never_drifts() {
        let mut looper = Looper::new(SR);
        let params = LooperParams {
            record_length_seconds: 0.1,
            ..steady_params()
        };
        for _ in 0..50 {
            run(&mut looper, 500, &LooperInputs::stereo(0.1, 0.1), &params);
            looper.record_jump_to_next_track();
        }
        for b in 0..BUFFER_COUNT {
            assert_eq!(looper.lock_level(b), INITIAL_LOCK_LEVELS[b]);
        }
    }

    #[test]
    fn test_nan_input_is_silenced() {
        let mut looper = Looper::new(SR);
        let params = steady_params();
        for _ in 0..1000 {
            let out = looper.tick(&LooperInputs::stereo(f32::NAN, f32::INFINITY), &params);
            assert!(out.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_clear_restores_initial_state() {
        let mut looper = Looper::new(SR);
        run(&mut looper, 50_000, &LooperInputs::stereo(0.2, 0.2), &steady_params());
        looper.clear();
        assert_eq!(looper.loop_sizes, [0; BUFFER_COUNT]);
        assert_eq!(looper.lock_levels, INITIAL_LOCK_LEVELS);
        assert_eq!(looper.record_buffer(), Some(0));
        assert_eq!(looper.playback_buffer(), None);
        assert!(looper.buffer(0).iter().all(|f| *f == [0.0, 0.0]));
    }
}

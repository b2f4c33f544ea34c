//! Hit shifter — Delays a stream of hits through a shift register and
//! replays them on seven gate rows.
//!
//! Every clock edge shifts a 64-step hit queue. Each row reads the queue at
//! its own delay (CV, internal noise, plus a ramp that grows down the rows),
//! can pick up echoes from further back, and drops hits through a 24-step
//! mute pattern. Outputs follow the clock while the row's last hit stands.

pub mod expander;
mod mute_filters;
mod state;

pub use expander::{ExpanderBridge, ExpanderInputs, ExpanderKnobs};
pub use mute_filters::{MUTE_FILTER_COUNT, MUTE_FILTER_SIZE, MUTE_FILTERS, filter_for, is_muted};
pub use state::{RowState, SHIFTER_STATE_VERSION, ShifterState};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::ShifterConfig;
use crate::dsp::rng::Rng;
use crate::dsp::sanitize;
use crate::dsp::trigger::{Edge, GATE_ON, SchmittTrigger};

/// Gate rows.
pub const ROWS: usize = 7;
/// Queue steps a full delay knob reaches.
pub const HIT_QUEUE_BASE_SIZE: usize = 16;
/// Total queue length, covering delay plus the furthest echo.
pub const HIT_QUEUE_SIZE: usize = HIT_QUEUE_BASE_SIZE * 4;

const HIT_QUEUE_SCALAR: f32 = (HIT_QUEUE_BASE_SIZE - 1) as f32;

const ECHO_LIGHT: [f32; 3] = [100.0 / 255.0, 0.0, 100.0 / 255.0];
const MUTE_LIGHT: [f32; 3] = [180.0 / 255.0, 50.0 / 255.0, 5.0 / 255.0];

/// Panel controls for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShifterParams {
    /// Extra delay per row, `[0, 2]`.
    pub ramp: f32,
    /// Chance in `[0, 1]` that a row holds its delay until the next division.
    pub sample_and_hold: f32,
    /// Clock edges per hit, floored; the panel spans 0.6..15.6.
    pub clock_divider: f32,
    /// Internal clock, in BPM.
    pub clock_rate: f32,
    pub delay_scale: [f32; ROWS],
    pub echo: [f32; ROWS],
    pub mute: [f32; ROWS],
}

impl Default for ShifterParams {
    fn default() -> Self {
        ShifterParams {
            ramp: 1.0,
            sample_and_hold: 0.0,
            clock_divider: 8.0,
            clock_rate: 500.0,
            delay_scale: [0.0; ROWS],
            echo: [0.0; ROWS],
            mute: [0.0; ROWS],
        }
    }
}

/// Jack voltages; `None` for unpatched jacks.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ShifterInputs {
    /// External clock. The internal clock runs while unpatched.
    pub clock: Option<f32>,
    /// External hits. While unpatched the clock divider produces them.
    pub trigger: Option<f32>,
    pub delays: [Option<f32>; ROWS],
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ShifterLights {
    pub sample_and_hold: [f32; ROWS],
    /// Base hit before echoes.
    pub buffer: [f32; ROWS],
    /// Hit after echoes, before mutes.
    pub echo: [[f32; 3]; ROWS],
    /// Final hit.
    pub mute: [[f32; 3]; ROWS],
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Row {
    output_on: bool,
    noise: f32,
    prev_hit_pre_mute: bool,
    mute_count: f32,
    held_delay_on: bool,
    held_delay: f32,
}

/// Queue slot for a delay measured in full-knob units. Wraps both ways.
#[inline]
fn queue_index(delay: f32) -> usize {
    let step = (sanitize(delay) * HIT_QUEUE_SCALAR).floor() as i64;
    step.rem_euclid(HIT_QUEUE_SIZE as i64) as usize
}

#[derive(Debug, Clone)]
pub struct HitShifter {
    sample_rate: f32,
    divider_count: i32,
    internal_clock: f32,
    clock: SchmittTrigger,
    trigger: SchmittTrigger,
    rows: [Row; ROWS],
    hit_queue: [bool; HIT_QUEUE_SIZE],
    lights: ShifterLights,
    rng: Rng,
}

impl HitShifter {
    pub fn new(sample_rate: f32) -> Self {
        Self::with_config(ShifterConfig::default(), sample_rate)
    }

    pub fn with_config(config: ShifterConfig, sample_rate: f32) -> Self {
        HitShifter {
            sample_rate,
            divider_count: 0,
            internal_clock: 0.0,
            clock: SchmittTrigger::new(),
            trigger: SchmittTrigger::new(),
            rows: [Row::default(); ROWS],
            hit_queue: [false; HIT_QUEUE_SIZE],
            lights: ShifterLights::default(),
            rng: Rng::new_with_seed(config.seed as u128),
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }

    pub fn lights(&self) -> ShifterLights {
        self.lights
    }

    pub fn hit_queue(&self) -> &[bool; HIT_QUEUE_SIZE] {
        &self.hit_queue
    }

    /// Clear the queue, counters and row memory. The random stream carries on.
    pub fn reset(&mut self) {
        self.divider_count = 0;
        self.internal_clock = 0.0;
        self.clock.reset();
        self.trigger.reset();
        self.rows = [Row::default(); ROWS];
        self.hit_queue = [false; HIT_QUEUE_SIZE];
        self.lights = ShifterLights::default();
    }

    /// Advance one sample. `bridge` carries the expander's offsets, `None`
    /// when no expander is attached.
    pub fn process(
        &mut self,
        inputs: &ShifterInputs,
        params: &ShifterParams,
        bridge: Option<&ExpanderBridge>,
    ) -> [f32; ROWS] {
        let bridge = bridge.copied().unwrap_or_default();

        let clock = match inputs.clock {
            Some(volts) => sanitize(volts),
            None => self.advance_internal_clock(params, &bridge),
        };

        let mut clock_event = false;
        let mut hit_event = false;
        let mut hold_event = false;
        if self.clock.process(clock) == Edge::Rising {
            clock_event = true;
            self.divider_count = self.divider_count.saturating_add(1);
            let divider = (sanitize(params.clock_divider) + bridge.clock_divider as f32).floor();
            if self.divider_count as f32 >= divider {
                hold_event = true;
                self.divider_count = 0;
                hit_event = inputs.trigger.is_none();
            }
        }
        if let Some(volts) = inputs.trigger {
            hit_event |= self.trigger.rising(sanitize(volts));
        }

        // Shift before recording so a hit on a clock edge lands in slot 0.
        if clock_event {
            self.hit_queue.copy_within(0..HIT_QUEUE_SIZE - 1, 1);
            self.hit_queue[0] = false;
        }
        if hit_event {
            self.hit_queue[0] = true;
            trace!("hit");
        }

        if clock_event || hit_event {
            let ramp = sanitize(params.ramp) + bridge.ramp;
            for row in 0..ROWS {
                self.compute_row(row, ramp, inputs.delays[row], params, &bridge);
            }
        }

        // After the rows so a fresh hold does not freeze the delay just used.
        if hold_event {
            let chance = sanitize(params.sample_and_hold) + bridge.sample_and_hold;
            for (row, light) in self.rows.iter_mut().zip(&mut self.lights.sample_and_hold) {
                row.held_delay_on = self.rng.uniform() < chance;
                *light = if row.held_delay_on { 1.0 } else { 0.0 };
                row.noise = self.rng.uniform();
            }
        }

        let clock_high = self.clock.is_high();
        self.rows
            .map(|row| if clock_high && row.output_on { GATE_ON } else { 0.0 })
    }

    fn advance_internal_clock(&mut self, params: &ShifterParams, bridge: &ExpanderBridge) -> f32 {
        let bpm = sanitize(params.clock_rate) + bridge.clock_rate;
        self.internal_clock += bpm / 60.0 / self.sample_rate;
        if !(0.0..=1.0).contains(&self.internal_clock) {
            self.internal_clock = sanitize(self.internal_clock).rem_euclid(1.0);
        }
        if self.internal_clock > 0.5 { GATE_ON } else { 0.0 }
    }

    fn compute_row(
        &mut self,
        index: usize,
        ramp: f32,
        delay_input: Option<f32>,
        params: &ShifterParams,
        bridge: &ExpanderBridge,
    ) {
        let queue = &self.hit_queue;
        let row = &mut self.rows[index];

        // ── Delay ───────────────────────────────────────────────
        let delay = if row.held_delay_on {
            row.held_delay
        } else {
            let source = match delay_input {
                Some(volts) => sanitize(volts) / 10.0,
                None => row.noise,
            };
            let delay = source * sanitize(params.delay_scale[index])
                + ramp * index as f32 / HIT_QUEUE_SCALAR;
            row.held_delay = delay;
            delay
        };

        // ── Base hit and echoes ─────────────────────────────────
        let mut hit = queue[queue_index(delay)];
        let hit_pre_echo = hit;
        let echo = sanitize(params.echo[index]) + bridge.echo[index];
        if !hit && echo > 0.0 {
            hit = queue[queue_index(delay * (1.0 + (1.0 - echo * 2.0).abs()))];
        }
        if !hit && echo > 0.33 {
            let amount = (echo - 0.33) / 0.67;
            hit = queue[queue_index(delay + 3.0 * amount)];
        }
        if !hit && echo > 0.67 {
            let amount = (echo - 0.67) / 0.33;
            hit = queue[queue_index(delay + 3.0 * (1.0 - amount))];
        }

        // ── Mutes ───────────────────────────────────────────────
        let hit_pre_mute = hit;
        let previous = row.prev_hit_pre_mute;
        row.prev_hit_pre_mute = hit;
        if hit {
            let mut count = row.mute_count + 1.0;
            // Back-to-back hits skip ahead by the delay.
            if previous {
                count += delay;
            }
            row.mute_count = sanitize(count).rem_euclid(MUTE_FILTER_SIZE as f32);
            let mute = sanitize(params.mute[index]) + bridge.mute[index];
            if is_muted(filter_for(mute), row.mute_count) {
                hit = false;
            }
        }
        row.output_on = hit;

        self.lights.buffer[index] = if hit_pre_echo { 1.0 } else { 0.0 };
        self.lights.echo[index] = if hit_pre_mute { ECHO_LIGHT } else { [0.0; 3] };
        self.lights.mute[index] = if hit { MUTE_LIGHT } else { [0.0; 3] };
    }
}

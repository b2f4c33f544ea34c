//! Router node — Per-node routing state and the step rules for each mode.

use serde::{Deserialize, Serialize};

use crate::dsp::rng::Rng;
use crate::dsp::trigger::{GATE_ON, SchmittTrigger};

/// Gate inputs per node.
pub const NODE_INPUTS: usize = 2;
/// Routed outputs per node.
pub const NODE_OUTPUTS: usize = 3;
/// Route slots per node: slot 0 is the node itself, 1..=3 the outputs.
pub const NODE_STATES: usize = 4;
/// State of a node that routes nowhere.
pub const NO_STATE: i32 = -1;

/// Slot visited at each step of a weighted cycle.
pub const WEIGHTING: [usize; 12] = [0, 1, 0, 2, 0, 1, 0, 3, 0, 1, 0, 2];
/// How often each slot appears in [`WEIGHTING`]; used as random odds.
pub const WEIGHTING_COUNTS: [usize; NODE_STATES] = [6, 3, 2, 1];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeMode {
    #[default]
    Cycle,
    Random,
    Arpeggiate,
}

impl NodeMode {
    pub fn index(self) -> i32 {
        match self {
            NodeMode::Cycle => 0,
            NodeMode::Random => 1,
            NodeMode::Arpeggiate => 2,
        }
    }

    /// Unknown indices read as Cycle.
    pub fn from_index(index: i32) -> Self {
        match index {
            1 => NodeMode::Random,
            2 => NodeMode::Arpeggiate,
            _ => NodeMode::Cycle,
        }
    }

    /// Next mode in the Cycle → Random → Arpeggiate loop.
    pub fn next(self) -> Self {
        Self::from_index((self.index() + 1) % 3)
    }

    /// RGB mode light.
    pub fn color(self) -> [f32; 3] {
        match self {
            NodeMode::Cycle => [0.0, 0.0, 1.0],
            NodeMode::Random => [180.0 / 255.0, 50.0 / 255.0, 5.0 / 255.0],
            NodeMode::Arpeggiate => [180.0 / 255.0, 0.0, 180.0 / 255.0],
        }
    }
}

/// What opened a node's current gate, so the matching close is routed back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TriggerSource {
    #[default]
    Input,
    Clock,
    Arpeggiate,
}

impl TriggerSource {
    pub fn index(self) -> i32 {
        match self {
            TriggerSource::Input => 0,
            TriggerSource::Clock => 1,
            TriggerSource::Arpeggiate => 2,
        }
    }

    pub fn from_index(index: i32) -> Self {
        match index {
            1 => TriggerSource::Clock,
            2 => TriggerSource::Arpeggiate,
            _ => TriggerSource::Input,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// -1 when off. A slot for plain cycle and random, a position in
    /// [`WEIGHTING`] for weighted cycle.
    pub(crate) state: i32,
    pub(crate) manual_mode: NodeMode,
    pub(crate) mode: NodeMode,
    pub(crate) trigger_source: TriggerSource,
    pub(crate) arpeggiating: bool,
    pub(crate) inputs: [SchmittTrigger; NODE_INPUTS],
    pub(crate) mode_trigger: SchmittTrigger,
    pub(crate) outputs: [f32; NODE_OUTPUTS],
    pub(crate) state_lights: [f32; NODE_STATES],
}

impl Default for Node {
    fn default() -> Self {
        Node {
            state: NO_STATE,
            manual_mode: NodeMode::Cycle,
            mode: NodeMode::Cycle,
            trigger_source: TriggerSource::Input,
            arpeggiating: false,
            inputs: [SchmittTrigger::new(); NODE_INPUTS],
            mode_trigger: SchmittTrigger::new(),
            outputs: [0.0; NODE_OUTPUTS],
            state_lights: [0.0; NODE_STATES],
        }
    }
}

/// Slot 0 always counts as connected.
#[inline]
fn slot_connected(connected: &[bool; NODE_OUTPUTS], slot: usize) -> bool {
    slot == 0 || connected.get(slot - 1).copied().unwrap_or(false)
}

#[inline]
fn nothing_connected(connected: &[bool; NODE_OUTPUTS]) -> bool {
    !connected.iter().any(|&c| c)
}

impl Node {
    pub fn state(&self) -> i32 {
        self.state
    }

    pub fn mode(&self) -> NodeMode {
        self.mode
    }

    pub fn manual_mode(&self) -> NodeMode {
        self.manual_mode
    }

    pub fn trigger_source(&self) -> TriggerSource {
        self.trigger_source
    }

    pub fn is_arpeggiating(&self) -> bool {
        self.arpeggiating
    }

    pub fn outputs(&self) -> [f32; NODE_OUTPUTS] {
        self.outputs
    }

    pub fn state_lights(&self) -> [f32; NODE_STATES] {
        self.state_lights
    }

    /// Open the gate on `slot`'s output and light it. Slot 0 lights the
    /// self light only; anything outside 0..=3 closes every output.
    pub fn route_to(&mut self, slot: i32) {
        self.state_lights[0] = if slot == 0 { 1.0 } else { 0.0 };
        for (port, (output, light)) in self
            .outputs
            .iter_mut()
            .zip(&mut self.state_lights[1..])
            .enumerate()
        {
            let on = slot - 1 == port as i32;
            *output = if on { GATE_ON } else { 0.0 };
            *light = if on { 1.0 } else { 0.0 };
        }
    }

    pub fn clear_outputs(&mut self) {
        self.outputs = [0.0; NODE_OUTPUTS];
    }

    pub fn clear_lights(&mut self) {
        self.state_lights = [0.0; NODE_STATES];
    }

    /// Advance to the next connected slot. `None` when nothing is patched
    /// and the walk ran past the last slot; the node is then off.
    pub fn cycle_step(&mut self, connected: &[bool; NODE_OUTPUTS]) -> Option<usize> {
        for _ in 0..NODE_STATES {
            self.state += 1;
            if self.state >= NODE_STATES as i32 {
                if nothing_connected(connected) {
                    self.state = NO_STATE;
                    return None;
                }
                self.state = 0;
            }
            let slot = self.state as usize;
            if slot_connected(connected, slot) {
                return Some(slot);
            }
        }
        // Unreachable: slot 0 is always connected.
        Some(0)
    }

    /// Advance through [`WEIGHTING`], skipping unpatched slots and the slot
    /// just played. `None` means end of line.
    pub fn weighted_cycle_step(&mut self, connected: &[bool; NODE_OUTPUTS]) -> Option<usize> {
        let first_play = self.state == NO_STATE;
        let previous = usize::try_from(self.state)
            .ok()
            .and_then(|i| WEIGHTING.get(i).copied());

        for _ in 0..WEIGHTING.len() {
            self.state = (self.state + 1).rem_euclid(WEIGHTING.len() as i32);
            let slot = WEIGHTING[self.state as usize];
            if !slot_connected(connected, slot) {
                continue;
            }
            if !first_play && nothing_connected(connected) {
                break;
            }
            if Some(slot) == previous {
                continue;
            }
            return Some(slot);
        }
        self.state = NO_STATE;
        None
    }

    /// Pick a patched output at random. The node itself (slot 0) is only a
    /// candidate while nothing is patched, and never twice in a row. `None`
    /// when there is no candidate.
    pub fn random_step(
        &mut self,
        connected: &[bool; NODE_OUTPUTS],
        weighted: bool,
        rng: &mut Rng,
    ) -> Option<usize> {
        let self_allowed = nothing_connected(connected) && self.state != 0;
        let mut options = [0usize; 12];
        let mut count = 0;
        for slot in 0..NODE_STATES {
            if slot == 0 && !self_allowed {
                continue;
            }
            if slot_connected(connected, slot) {
                let weight = if weighted { WEIGHTING_COUNTS[slot] } else { 1 };
                for _ in 0..weight {
                    options[count] = slot;
                    count += 1;
                }
            }
        }
        if count == 0 {
            self.state = NO_STATE;
            return None;
        }
        let pick = ((rng.uniform() * count as f32) as usize).min(count - 1);
        let slot = options[pick];
        self.state = slot as i32;
        Some(slot)
    }
}

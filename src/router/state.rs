//! Router persistence — Node states, arpeggio counters and menu options as a
//! versioned serde record.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ArpeggiateSpeed, GateRouter, NODE_INPUTS, NodeMode, TriggerSource, WEIGHTING};
use crate::dsp::cv_range::CvRange;
use crate::dsp::rng::{Rng, RngState};
use crate::dsp::sanitize;
use crate::dsp::trigger::SchmittTrigger;
use crate::error::StateError;

pub const ROUTER_STATE_VERSION: &str = "2.1.0";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NodeState {
    pub state: i32,
    pub manual_mode: i32,
    pub mode: i32,
    pub trigger_source: i32,
    pub arpeggiating: bool,
    pub input_high: [bool; NODE_INPUTS],
    pub mode_trigger_high: bool,
}

/// Persisted router state. Missing fields load as zero/false.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RouterState {
    pub version: String,
    pub nodes: Vec<NodeState>,
    pub active_node: i32,
    /// -1 when no arpeggio runs.
    pub arpeggiate_node: i32,
    pub arpeggiate_counter: i32,
    pub arpeggiate_length: i32,
    pub arpeggiate_left: i32,
    pub arpeggiate_high: bool,
    pub end_of_line: bool,
    pub clock_counter: i32,
    pub clock_length: i32,
    pub clock_high: bool,
    pub reset_high: bool,
    pub gate: f32,
    pub cv: f32,
    pub range: CvRange,
    pub arpeggiate_speed: i32,
    pub weighted_odds: bool,
    pub weighted_cycle: bool,
    pub rng: RngState,
}

fn node_index(raw: i32, count: usize) -> Option<usize> {
    usize::try_from(raw).ok().filter(|&i| i < count)
}

impl GateRouter {
    pub fn save_state(&self) -> RouterState {
        let ctx = &self.ctx;
        RouterState {
            version: ROUTER_STATE_VERSION.to_string(),
            nodes: self
                .nodes
                .iter()
                .map(|node| NodeState {
                    state: node.state,
                    manual_mode: node.manual_mode.index(),
                    mode: node.mode.index(),
                    trigger_source: node.trigger_source.index(),
                    arpeggiating: node.arpeggiating,
                    input_high: node.inputs.map(|t| t.is_high()),
                    mode_trigger_high: node.mode_trigger.is_high(),
                })
                .collect(),
            active_node: ctx.active_node as i32,
            arpeggiate_node: ctx.arpeggiate_node.map_or(-1, |n| n as i32),
            arpeggiate_counter: ctx.arpeggio.counter,
            arpeggiate_length: ctx.arpeggio.length,
            arpeggiate_left: ctx.arpeggio.left,
            arpeggiate_high: ctx.arpeggio.high,
            end_of_line: ctx.end_of_line,
            clock_counter: ctx.clock.counter,
            clock_length: ctx.clock.length,
            clock_high: self.clock_trigger.is_high(),
            reset_high: self.reset_trigger.is_high(),
            gate: ctx.gate,
            cv: ctx.cv,
            range: self.settings.range,
            arpeggiate_speed: self.settings.arpeggiate_speed.index(),
            weighted_odds: self.settings.weighted_odds,
            weighted_cycle: self.settings.weighted_cycle,
            rng: self.rng.snapshot(),
        }
    }

    /// Apply a persisted record. Nodes beyond this router's count are
    /// ignored and missing ones keep their defaults.
    pub fn load_state(&mut self, state: &RouterState) {
        if !state.version.is_empty() && state.version != ROUTER_STATE_VERSION {
            warn!(version = %state.version, "loading router state from another version");
        }
        if state.nodes.len() > self.nodes.len() {
            warn!(
                saved = state.nodes.len(),
                nodes = self.nodes.len(),
                "dropping extra nodes from router state"
            );
        }
        let max_state = WEIGHTING.len() as i32 - 1;
        for (node, saved) in self.nodes.iter_mut().zip(&state.nodes) {
            node.state = saved.state.clamp(-1, max_state);
            node.manual_mode = NodeMode::from_index(saved.manual_mode);
            node.mode = NodeMode::from_index(saved.mode);
            node.trigger_source = TriggerSource::from_index(saved.trigger_source);
            node.arpeggiating = saved.arpeggiating;
            node.inputs = saved.input_high.map(SchmittTrigger::with_level);
            node.mode_trigger = SchmittTrigger::with_level(saved.mode_trigger_high);
        }

        let count = self.nodes.len();
        let ctx = &mut self.ctx;
        ctx.active_node = node_index(state.active_node, count).unwrap_or(0);
        ctx.arpeggiate_node = node_index(state.arpeggiate_node, count);
        ctx.arpeggio.counter = state.arpeggiate_counter.max(0);
        ctx.arpeggio.length = state.arpeggiate_length.max(0);
        ctx.arpeggio.left = state.arpeggiate_left.max(0);
        ctx.arpeggio.high = state.arpeggiate_high;
        ctx.end_of_line = state.end_of_line;
        ctx.clock.counter = state.clock_counter.max(0);
        ctx.clock.length = state.clock_length.max(0);
        ctx.gate = sanitize(state.gate);
        ctx.cv = sanitize(state.cv);
        self.clock_trigger = SchmittTrigger::with_level(state.clock_high);
        self.reset_trigger = SchmittTrigger::with_level(state.reset_high);

        self.settings.range = state.range;
        self.settings.arpeggiate_speed = ArpeggiateSpeed::from_index(state.arpeggiate_speed);
        self.settings.weighted_odds = state.weighted_odds;
        self.settings.weighted_cycle = state.weighted_cycle;
        self.rng = Rng::from_snapshot(&state.rng);
        debug!(active = self.ctx.active_node, "router state restored");
    }

    pub fn to_json(&self) -> Result<String, StateError> {
        Ok(serde_json::to_string(&self.save_state())?)
    }

    pub fn load_json(&mut self, json: &str) -> Result<(), StateError> {
        let state: RouterState = serde_json::from_str(json)?;
        self.load_state(&state);
        Ok(())
    }
}

//! Stochastic gate router — Up to sixteen nodes that each pass a gate on to
//! one of their outputs, chosen by cycling, at random, or as a fast
//! arpeggio across every patched output.
//!
//! A shared clock drives whichever node is active; a node that runs out of
//! routes raises end-of-line, which hands the clock back to node 0 on the
//! next tick. Arpeggios split the measured clock period into sub-steps and
//! take precedence over the plain clock while they run.

mod context;
mod node;
mod state;

pub use context::{ArpeggioClock, MIN_ARPEGGIATE_COUNTDOWN, ProcessContext, TickEvents};
pub use node::{
    NO_STATE, NODE_INPUTS, NODE_OUTPUTS, NODE_STATES, Node, NodeMode, TriggerSource, WEIGHTING,
    WEIGHTING_COUNTS,
};
pub use state::{NodeState, ROUTER_STATE_VERSION, RouterState};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::RouterConfig;
use crate::dsp::cv_range::CvRange;
use crate::dsp::rng::Rng;
use crate::dsp::sanitize;
use crate::dsp::trigger::{Edge, GATE_ON, SchmittTrigger};
use crate::error::StateError;

/// Nodes on the full-size panel.
pub const NODE_MAX: usize = 16;

/// Arpeggio subdivision of the measured clock period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArpeggiateSpeed {
    /// One step per patched output.
    Dynamic,
    WholeNotes,
    #[default]
    HalfNotes,
    Triplets,
    QuarterNotes,
}

impl ArpeggiateSpeed {
    pub const LABELS: [&'static str; 5] = [
        "Dynamic",
        "Whole Notes",
        "Half Notes",
        "Triplets",
        "Quarter Notes",
    ];

    /// Steps per clock period, or `None` for dynamic.
    pub fn divisor(self) -> Option<i32> {
        match self {
            ArpeggiateSpeed::Dynamic => None,
            ArpeggiateSpeed::WholeNotes => Some(1),
            ArpeggiateSpeed::HalfNotes => Some(2),
            ArpeggiateSpeed::Triplets => Some(3),
            ArpeggiateSpeed::QuarterNotes => Some(4),
        }
    }

    pub fn index(self) -> i32 {
        self.divisor().unwrap_or(0)
    }

    /// Out-of-range indices clamp.
    pub fn from_index(index: i32) -> Self {
        match index {
            i32::MIN..=0 => ArpeggiateSpeed::Dynamic,
            1 => ArpeggiateSpeed::WholeNotes,
            2 => ArpeggiateSpeed::HalfNotes,
            3 => ArpeggiateSpeed::Triplets,
            _ => ArpeggiateSpeed::QuarterNotes,
        }
    }
}

/// Context-menu options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RouterSettings {
    pub range: CvRange,
    pub arpeggiate_speed: ArpeggiateSpeed,
    /// Random mode favours lower outputs using [`WEIGHTING_COUNTS`].
    pub weighted_odds: bool,
    /// Cycle mode walks [`WEIGHTING`] instead of the plain slot order.
    pub weighted_cycle: bool,
}

/// Jack voltages for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouterInputs {
    pub clock: f32,
    pub reset: f32,
    pub node_inputs: [[f32; NODE_INPUTS]; NODE_MAX],
    pub mode_triggers: [f32; NODE_MAX],
}

impl Default for RouterInputs {
    fn default() -> Self {
        RouterInputs {
            clock: 0.0,
            reset: 0.0,
            node_inputs: [[0.0; NODE_INPUTS]; NODE_MAX],
            mode_triggers: [0.0; NODE_MAX],
        }
    }
}

/// Knob positions and which outputs are patched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RouterParams {
    /// Per-node CV knob in `[0, 1]`.
    pub cv_knobs: [f32; NODE_MAX],
    pub connected: [[bool; NODE_OUTPUTS]; NODE_MAX],
}

impl Default for RouterParams {
    fn default() -> Self {
        RouterParams {
            cv_knobs: [0.5; NODE_MAX],
            connected: [[false; NODE_OUTPUTS]; NODE_MAX],
        }
    }
}

/// Voltages produced by one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouterOutput {
    pub gate: f32,
    pub cv: f32,
    pub nodes: [[f32; NODE_OUTPUTS]; NODE_MAX],
}

/// Panel indicators, one entry per node.
#[derive(Debug, Clone, PartialEq)]
pub struct RouterLights {
    pub active: Vec<f32>,
    pub modes: Vec<[f32; 3]>,
    pub states: Vec<[f32; NODE_STATES]>,
}

#[derive(Debug, Clone)]
pub struct GateRouter {
    config: RouterConfig,
    nodes: Vec<Node>,
    ctx: ProcessContext,
    settings: RouterSettings,
    clock_trigger: SchmittTrigger,
    reset_trigger: SchmittTrigger,
    rng: Rng,
}

impl Default for GateRouter {
    fn default() -> Self {
        Self::build(RouterConfig::default())
    }
}

impl GateRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RouterConfig) -> Result<Self, StateError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: RouterConfig) -> Self {
        GateRouter {
            nodes: vec![Node::default(); config.node_count],
            ctx: ProcessContext::default(),
            settings: RouterSettings::default(),
            clock_trigger: SchmittTrigger::new(),
            reset_trigger: SchmittTrigger::new(),
            rng: Rng::new_with_seed(config.seed as u128),
            config,
        }
    }

    // ── Accessors ───────────────────────────────────────────

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn active_node(&self) -> usize {
        self.ctx.active_node
    }

    pub fn arpeggiate_node(&self) -> Option<usize> {
        self.ctx.arpeggiate_node
    }

    pub fn context(&self) -> &ProcessContext {
        &self.ctx
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: RouterSettings) {
        self.settings = settings;
    }

    /// Panel mode selection: sets both the manual and the current mode.
    pub fn set_manual_mode(&mut self, index: usize, mode: NodeMode) {
        if let Some(node) = self.nodes.get_mut(index) {
            node.manual_mode = mode;
            node.mode = mode;
        }
    }

    pub fn lights(&self) -> RouterLights {
        let active = (0..self.nodes.len())
            .map(|ni| {
                if ni == self.ctx.active_node {
                    1.0
                } else if Some(ni) == self.ctx.arpeggiate_node {
                    0.3
                } else {
                    0.0
                }
            })
            .collect();
        RouterLights {
            active,
            modes: self.nodes.iter().map(|n| n.mode.color()).collect(),
            states: self.nodes.iter().map(|n| n.state_lights).collect(),
        }
    }

    /// Back to power-on state. Settings are kept.
    pub fn initialize(&mut self) {
        self.nodes.fill(Node::default());
        self.ctx = ProcessContext::default();
        self.clock_trigger.reset();
        self.reset_trigger.reset();
    }

    // ── Processing ──────────────────────────────────────────

    /// Advance the router by one sample.
    pub fn process(&mut self, inputs: &RouterInputs, params: &RouterParams) -> RouterOutput {
        self.ctx.events = TickEvents::default();
        match self.clock_trigger.process(sanitize(inputs.clock)) {
            Edge::Rising => self.ctx.events.clock_high = true,
            Edge::Falling => self.ctx.events.clock_low = true,
            Edge::None => {}
        }
        self.ctx.clock.tick(self.ctx.events.clock_high);

        self.advance_arpeggio(params);

        if self.reset_trigger.rising(sanitize(inputs.reset)) {
            self.reset_nodes(params);
            self.ctx.events.clock_low = true;
        }

        if self.ctx.end_of_line {
            self.ctx.end_of_line = false;
            self.set_active_node(0, params);
            self.ctx.events.clock_high = true;
            trace!("end of line restarts at node 0");
        }

        let snapshot = self.ctx.active_node;

        // The main gate reads the events before the node loop consumes them.
        let events = self.ctx.events;
        let free_running = !self.ctx.arpeggio.running();
        if events.arp_high || (events.clock_high && free_running) {
            self.ctx.gate = GATE_ON;
        }
        if events.arp_low || (events.clock_low && free_running) {
            self.ctx.gate = 0.0;
        }

        for ni in 0..self.nodes.len() {
            self.process_node(ni, snapshot, inputs, params);
        }

        self.output()
    }

    fn output(&self) -> RouterOutput {
        let mut nodes = [[0.0; NODE_OUTPUTS]; NODE_MAX];
        for (out, node) in nodes.iter_mut().zip(&self.nodes) {
            *out = node.outputs;
        }
        RouterOutput {
            gate: self.ctx.gate,
            cv: self.ctx.cv,
            nodes,
        }
    }

    fn advance_arpeggio(&mut self, params: &RouterParams) {
        let pass_through = self.settings.arpeggiate_speed == ArpeggiateSpeed::WholeNotes;
        self.ctx.arpeggio.step(pass_through, &mut self.ctx.events);

        if self.ctx.events.arp_high {
            self.ctx.arpeggio.left -= 1;
            if self.ctx.arpeggio.left > 0 {
                self.ctx.arpeggio.arm();
                if let Some(root) = self.ctx.arpeggiate_node {
                    self.set_active_node(root, params);
                }
                trace!(left = self.ctx.arpeggio.left, "arpeggio high");
            } else {
                self.ctx.events.arp_high = false;
                if Some(self.ctx.active_node) == self.ctx.arpeggiate_node {
                    self.set_active_node(0, params);
                }
                self.clean_up_arpeggiation();
                debug!("arpeggio finished");
            }
        }
        if self.ctx.events.arp_low {
            self.ctx.arpeggio.arm();
        }
    }

    fn reset_nodes(&mut self, params: &RouterParams) {
        self.set_active_node(0, params);
        self.clean_up_arpeggiation();
        for node in &mut self.nodes {
            node.state = NO_STATE;
            node.mode = node.manual_mode;
            node.clear_outputs();
            node.clear_lights();
        }
        debug!("router reset");
    }

    fn clean_up_arpeggiation(&mut self) {
        self.ctx.arpeggio.clear();
        self.ctx.arpeggiate_node = None;
        for node in &mut self.nodes {
            node.arpeggiating = false;
        }
    }

    fn set_active_node(&mut self, index: usize, params: &RouterParams) {
        self.ctx.active_node = index;
        let knob = params.cv_knobs.get(index).copied().map_or(0.0, sanitize);
        self.ctx.cv = self.settings.range.map(knob);
    }

    fn process_node(
        &mut self,
        ni: usize,
        snapshot: usize,
        inputs: &RouterInputs,
        params: &RouterParams,
    ) {
        let node = &mut self.nodes[ni];

        if node.mode_trigger.rising(sanitize(inputs.mode_triggers[ni])) {
            node.mode = node.mode.next();
            trace!(node = ni, mode = ?node.mode, "mode trigger");
        }

        let mut high = false;
        let mut low = false;
        for (trigger, &voltage) in node.inputs.iter_mut().zip(&inputs.node_inputs[ni]) {
            match trigger.process(sanitize(voltage)) {
                Edge::Rising => high = true,
                Edge::Falling => low = true,
                Edge::None => {}
            }
        }

        let events = &mut self.ctx.events;
        if events.arp_high && ni == snapshot {
            events.arp_high = false;
            high = true;
            node.trigger_source = TriggerSource::Arpeggiate;
        }
        if events.arp_low && node.trigger_source == TriggerSource::Arpeggiate {
            node.trigger_source = TriggerSource::Input;
            low = true;
        }
        if !self.ctx.arpeggio.running() {
            if events.clock_high && ni == snapshot {
                events.clock_high = false;
                high = true;
                node.trigger_source = TriggerSource::Clock;
            }
            if events.clock_low && node.trigger_source == TriggerSource::Clock {
                node.trigger_source = TriggerSource::Input;
                low = true;
            }
        }

        if high {
            self.node_high_event(ni, params);
        }
        if low {
            self.nodes[ni].clear_outputs();
        }
    }

    fn node_high_event(&mut self, ni: usize, params: &RouterParams) {
        let connected = params.connected[ni];
        let node = &self.nodes[ni];

        let mut mode = node.mode;
        let mut weighted = self.settings.weighted_cycle;
        // Arpeggiating nodes step like a plain cycle, and so does an
        // arpeggiate node before any clock period has been measured.
        if node.arpeggiating || (mode == NodeMode::Arpeggiate && self.ctx.clock.length <= 0) {
            mode = NodeMode::Cycle;
            weighted = false;
        }

        match mode {
            NodeMode::Cycle => {
                self.set_active_node(ni, params);
                let node = &mut self.nodes[ni];
                let slot = if weighted {
                    node.weighted_cycle_step(&connected)
                } else {
                    node.cycle_step(&connected)
                };
                self.finish_step(ni, slot);
            }
            NodeMode::Random => {
                self.set_active_node(ni, params);
                let slot = self.nodes[ni].random_step(
                    &connected,
                    self.settings.weighted_odds,
                    &mut self.rng,
                );
                self.finish_step(ni, slot);
            }
            NodeMode::Arpeggiate => self.start_arpeggio(ni, &connected, params),
        }
    }

    fn finish_step(&mut self, ni: usize, slot: Option<usize>) {
        match slot {
            Some(slot) => self.nodes[ni].route_to(slot as i32),
            None => {
                self.ctx.end_of_line = true;
                debug!(node = ni, "end of line");
            }
        }
    }

    fn start_arpeggio(&mut self, ni: usize, connected: &[bool; NODE_OUTPUTS], params: &RouterParams) {
        let count = 1 + connected.iter().filter(|&&c| c).count() as i32;
        if self.ctx.arpeggiate_node.is_none() {
            self.ctx.arpeggiate_node = Some(ni);
            self.nodes[ni].state = 0;
        }

        let clock_length = self.ctx.clock.length;
        let arp = &mut self.ctx.arpeggio;
        match self.settings.arpeggiate_speed.divisor() {
            None => {
                arp.length = clock_length / (count * 2);
                arp.left += count;
            }
            Some(divisor) => {
                arp.length = clock_length / (divisor * 2);
                // Whole multiples of the divisor keep the beat even.
                arp.left += (count + divisor - 1) / divisor * divisor;
            }
        }
        arp.high = true;
        arp.arm();
        debug!(
            node = ni,
            length = arp.length,
            left = arp.left,
            "arpeggio started"
        );

        let node = &mut self.nodes[ni];
        node.arpeggiating = true;
        node.trigger_source = TriggerSource::Arpeggiate;
        let state = node.state;
        self.set_active_node(ni, params);
        self.nodes[ni].route_to(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clocked(level: bool) -> RouterInputs {
        RouterInputs {
            clock: if level { 10.0 } else { 0.0 },
            ..Default::default()
        }
    }

    fn pulse_input(router: &mut GateRouter, ni: usize, params: &RouterParams) {
        let mut inputs = RouterInputs::default();
        inputs.node_inputs[ni][0] = 10.0;
        router.process(&inputs, params);
        router.process(&RouterInputs::default(), params);
    }

    #[test]
    fn test_initial_state() {
        let router = GateRouter::new();
        assert_eq!(router.node_count(), NODE_MAX);
        assert_eq!(router.active_node(), 0);
        assert_eq!(router.arpeggiate_node(), None);
        assert!(router.nodes.iter().all(|n| n.state() == NO_STATE));
    }

    #[test]
    fn test_cycle_without_outputs_raises_end_of_line_once() {
        let mut router = GateRouter::new();
        let params = RouterParams::default();

        // First trigger routes to the node itself.
        pulse_input(&mut router, 0, &params);
        assert_eq!(router.node(0).map(Node::state), Some(0));
        assert!(!router.ctx.end_of_line);

        let mut inputs = RouterInputs::default();
        inputs.node_inputs[0][0] = 10.0;
        router.process(&inputs, &params);
        assert_eq!(router.node(0).map(Node::state), Some(NO_STATE));
        assert!(router.ctx.end_of_line);

        // Consumed on the next tick: node 0 takes the injected clock high.
        router.process(&inputs, &params);
        assert!(!router.ctx.end_of_line);
        assert_eq!(router.active_node(), 0);
        assert_eq!(router.node(0).map(Node::state), Some(0));
        assert_eq!(router.ctx.gate, GATE_ON);
    }

    #[test]
    fn test_clock_drives_active_node() {
        let mut router = GateRouter::new();
        let mut params = RouterParams::default();
        params.connected[0] = [true, true, false];

        let mut routed = Vec::new();
        for _ in 0..4 {
            let out = router.process(&clocked(true), &params);
            routed.push(out.nodes[0]);
            let out = router.process(&clocked(false), &params);
            assert_eq!(out.nodes[0], [0.0; 3], "clock low closes the route");
            assert_eq!(out.gate, 0.0);
        }
        assert_eq!(
            routed,
            vec![
                [0.0, 0.0, 0.0],
                [GATE_ON, 0.0, 0.0],
                [0.0, GATE_ON, 0.0],
                [0.0, 0.0, 0.0],
            ]
        );
    }

    #[test]
    fn test_random_single_output_always_selected() {
        let mut router = GateRouter::new();
        router.set_manual_mode(0, NodeMode::Random);
        let mut params = RouterParams::default();
        params.connected[0] = [false, false, true];

        let mut inputs = RouterInputs::default();
        inputs.node_inputs[0][0] = 10.0;
        for n in 0..1000 {
            let out = router.process(&inputs, &params);
            assert_eq!(out.nodes[0], [0.0, 0.0, GATE_ON], "trigger {n}");
            let out = router.process(&RouterInputs::default(), &params);
            assert_eq!(out.nodes[0], [0.0; 3]);
        }
        assert_eq!(router.node(0).map(Node::state), Some(3));
    }

    #[test]
    fn test_random_without_outputs_alternates_self_and_end_of_line() {
        let mut router = GateRouter::new();
        router.set_manual_mode(0, NodeMode::Random);
        let params = RouterParams::default();

        pulse_input(&mut router, 0, &params);
        assert_eq!(router.node(0).map(Node::state), Some(0));
        assert!(!router.ctx.end_of_line);

        let mut inputs = RouterInputs::default();
        inputs.node_inputs[0][0] = 10.0;
        router.process(&inputs, &params);
        assert_eq!(router.node(0).map(Node::state), Some(NO_STATE));
        assert!(router.ctx.end_of_line);
    }

    #[test]
    fn test_arpeggio_subdivides_clock() {
        let mut router = GateRouter::new();
        router.set_manual_mode(0, NodeMode::Arpeggiate);
        router.set_settings(RouterSettings {
            arpeggiate_speed: ArpeggiateSpeed::QuarterNotes,
            ..Default::default()
        });
        let mut params = RouterParams::default();
        params.connected[0] = [true, true, false];

        let period = 1000;
        let mut gate_rises = Vec::new();
        let mut finished_at = None;
        let mut last_gate = 0.0;
        for n in 0..2 * period {
            let out = router.process(&clocked(n % period < period / 2), &params);
            if n == period {
                assert_eq!(router.ctx.clock.length, 1000);
                assert_eq!(router.ctx.arpeggio.length, 125);
                assert_eq!(router.ctx.arpeggio.left, 4);
                assert_eq!(router.arpeggiate_node(), Some(0));
            }
            if out.gate > last_gate && n >= period {
                gate_rises.push(n);
            }
            last_gate = out.gate;
            if n > period && finished_at.is_none() && router.arpeggiate_node().is_none() {
                finished_at = Some(n);
            }
        }

        assert_eq!(gate_rises, vec![1000, 1250, 1500, 1750]);
        let elapsed = finished_at.map(|n| n - period);
        assert!(
            matches!(elapsed, Some(999..=1001)),
            "arpeggio lasted {elapsed:?} samples"
        );
        assert_eq!(router.active_node(), 0);
        assert!(!router.nodes[0].is_arpeggiating());
    }

    #[test]
    fn test_arpeggiate_without_clock_length_cycles() {
        let mut router = GateRouter::new();
        router.set_manual_mode(0, NodeMode::Arpeggiate);
        let params = RouterParams::default();
        pulse_input(&mut router, 0, &params);
        assert_eq!(router.arpeggiate_node(), None);
        assert_eq!(router.node(0).map(Node::state), Some(0));
    }

    #[test]
    fn test_reset_restores_manual_modes() {
        let mut router = GateRouter::new();
        router.set_manual_mode(2, NodeMode::Random);
        let params = RouterParams::default();

        let mut inputs = RouterInputs::default();
        inputs.mode_triggers[2] = 10.0;
        router.process(&inputs, &params);
        assert_eq!(router.node(2).map(Node::mode), Some(NodeMode::Arpeggiate));
        assert_eq!(router.node(2).map(Node::manual_mode), Some(NodeMode::Random));

        pulse_input(&mut router, 2, &params);
        let reset = RouterInputs {
            reset: 10.0,
            ..Default::default()
        };
        router.process(&reset, &params);
        let node = router.node(2).cloned().unwrap_or_default();
        assert_eq!(node.mode(), NodeMode::Random);
        assert_eq!(node.state(), NO_STATE);
        assert_eq!(node.state_lights(), [0.0; NODE_STATES]);
        assert_eq!(router.active_node(), 0);
    }

    #[test]
    fn test_cv_follows_active_node() {
        let mut router = GateRouter::new();
        router.set_settings(RouterSettings {
            range: CvRange::new(0.0, 10.0),
            ..Default::default()
        });
        let mut params = RouterParams::default();
        params.cv_knobs[5] = 0.25;
        pulse_input(&mut router, 5, &params);
        let out = router.process(&RouterInputs::default(), &params);
        assert_eq!(router.active_node(), 5);
        assert!((out.cv - 2.5).abs() < 1e-6, "cv was {}", out.cv);
        assert_eq!(router.lights().active[5], 1.0);
    }

    #[test]
    fn test_half_panel_ignores_upper_nodes() {
        let mut router = GateRouter::with_config(RouterConfig {
            node_count: 8,
            ..Default::default()
        })
        .unwrap();
        let params = RouterParams::default();
        pulse_input(&mut router, 12, &params);
        assert_eq!(router.active_node(), 0);
        assert_eq!(router.lights().active.len(), 8);
    }
}

pub mod config;
pub mod dsp;
pub mod error;
pub mod looper;
pub mod router;
pub mod shifter;

use std::fmt::Display;

use crate::looper::{Looper, LooperParams, LooperState};
use crate::router::{GateRouter, NodeMode, RouterInputs, RouterParams, RouterSettings, RouterState};
use crate::shifter::expander::{self, ExpanderInputs, ExpanderKnobs};
use crate::shifter::{ExpanderBridge, HitShifter, ROWS, ShifterInputs, ShifterParams, ShifterState};
use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the frostline version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

fn js_error(e: impl Display) -> JsValue {
    JsValue::from_str(&format!("{e}"))
}

// ── Looper ──────────────────────────────────────────────────

/// WASM-exposed looper with its current control snapshot.
#[wasm_bindgen]
pub struct LooperHandle {
    looper: Looper,
    params: LooperParams,
}

#[wasm_bindgen]
impl LooperHandle {
    #[wasm_bindgen(constructor)]
    pub fn new(sample_rate: f32) -> LooperHandle {
        LooperHandle {
            looper: Looper::new(sample_rate),
            params: LooperParams::default(),
        }
    }

    /// Replace the controls from a `LooperParams`-shaped object.
    pub fn set_params(&mut self, params: JsValue) -> Result<(), JsValue> {
        self.params = serde_wasm_bindgen::from_value(params).map_err(js_error)?;
        Ok(())
    }

    /// Run a block in place. `playback_clock` may be shorter than the block.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32], playback_clock: &[f32]) {
        self.looper
            .process_block(left, right, playback_clock, &self.params);
    }

    pub fn set_pitch_correction(&mut self, enabled: bool) {
        self.looper.set_pitch_correction(enabled);
    }

    pub fn clear(&mut self) {
        self.looper.clear();
    }

    pub fn save_state(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.looper.save_state()).map_err(js_error)
    }

    pub fn load_state(&mut self, state: JsValue) -> Result<(), JsValue> {
        let state: LooperState = serde_wasm_bindgen::from_value(state).map_err(js_error)?;
        self.looper.load_state(&state);
        Ok(())
    }

    /// Sample data as little-endian `f32` bytes.
    pub fn save_blob(&self) -> Vec<u8> {
        self.looper.save_blob()
    }

    pub fn load_blob(&mut self, bytes: &[u8]) -> Result<(), JsValue> {
        self.looper.load_blob(bytes).map_err(js_error)
    }
}

// ── Router ──────────────────────────────────────────────────

/// WASM-exposed gate router. Only the clock and reset jacks are driven
/// from a block; node inputs stay at 0 V.
#[wasm_bindgen]
pub struct RouterHandle {
    router: GateRouter,
    params: RouterParams,
}

#[wasm_bindgen]
impl RouterHandle {
    #[wasm_bindgen(constructor)]
    pub fn new() -> RouterHandle {
        RouterHandle {
            router: GateRouter::new(),
            params: RouterParams::default(),
        }
    }

    pub fn set_params(&mut self, params: JsValue) -> Result<(), JsValue> {
        self.params = serde_wasm_bindgen::from_value(params).map_err(js_error)?;
        Ok(())
    }

    pub fn set_settings(&mut self, settings: JsValue) -> Result<(), JsValue> {
        let settings: RouterSettings =
            serde_wasm_bindgen::from_value(settings).map_err(js_error)?;
        self.router.set_settings(settings);
        Ok(())
    }

    /// `mode`: 0 cycle, 1 random, 2 arpeggiate.
    pub fn set_manual_mode(&mut self, node: usize, mode: i32) {
        self.router.set_manual_mode(node, NodeMode::from_index(mode));
    }

    /// Returns gate and CV interleaved, two values per sample.
    pub fn process(&mut self, clock: &[f32], reset: &[f32]) -> Vec<f32> {
        let mut out = Vec::with_capacity(clock.len() * 2);
        for (i, &volts) in clock.iter().enumerate() {
            let inputs = RouterInputs {
                clock: volts,
                reset: reset.get(i).copied().unwrap_or(0.0),
                ..Default::default()
            };
            let frame = self.router.process(&inputs, &self.params);
            out.push(frame.gate);
            out.push(frame.cv);
        }
        out
    }

    pub fn save_state(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.router.save_state()).map_err(js_error)
    }

    pub fn load_state(&mut self, state: JsValue) -> Result<(), JsValue> {
        let state: RouterState = serde_wasm_bindgen::from_value(state).map_err(js_error)?;
        self.router.load_state(&state);
        Ok(())
    }
}

impl Default for RouterHandle {
    fn default() -> Self {
        Self::new()
    }
}

// ── Shifter ─────────────────────────────────────────────────

/// WASM-exposed hit shifter running on its internal clock, with an
/// optional expander.
#[wasm_bindgen]
pub struct ShifterHandle {
    shifter: HitShifter,
    params: ShifterParams,
    bridge: Option<ExpanderBridge>,
}

#[wasm_bindgen]
impl ShifterHandle {
    #[wasm_bindgen(constructor)]
    pub fn new(sample_rate: f32) -> ShifterHandle {
        ShifterHandle {
            shifter: HitShifter::new(sample_rate),
            params: ShifterParams::default(),
            bridge: None,
        }
    }

    pub fn set_params(&mut self, params: JsValue) -> Result<(), JsValue> {
        self.params = serde_wasm_bindgen::from_value(params).map_err(js_error)?;
        Ok(())
    }

    /// Attach an expander with the given attenuverters and CV voltages.
    pub fn set_expander(&mut self, knobs: JsValue, inputs: JsValue) -> Result<(), JsValue> {
        let knobs: ExpanderKnobs = serde_wasm_bindgen::from_value(knobs).map_err(js_error)?;
        let inputs: ExpanderInputs = serde_wasm_bindgen::from_value(inputs).map_err(js_error)?;
        self.bridge = Some(expander::process(&knobs, &inputs));
        Ok(())
    }

    pub fn remove_expander(&mut self) {
        self.bridge = None;
    }

    /// Run `frames` samples. `trigger`, when given, is the external hit
    /// input. Returns the seven row gates interleaved per sample.
    pub fn process(&mut self, frames: usize, trigger: Option<Vec<f32>>) -> Vec<f32> {
        let mut out = Vec::with_capacity(frames * ROWS);
        for i in 0..frames {
            let inputs = ShifterInputs {
                trigger: trigger
                    .as_ref()
                    .map(|t| t.get(i).copied().unwrap_or(0.0)),
                ..Default::default()
            };
            out.extend(
                self.shifter
                    .process(&inputs, &self.params, self.bridge.as_ref()),
            );
        }
        out
    }

    pub fn save_state(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.shifter.save_state()).map_err(js_error)
    }

    pub fn load_state(&mut self, state: JsValue) -> Result<(), JsValue> {
        let state: ShifterState = serde_wasm_bindgen::from_value(state).map_err(js_error)?;
        self.shifter.load_state(&state);
        Ok(())
    }
}

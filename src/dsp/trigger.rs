//! Triggers — Hysteresis edge detection for gates, clocks and buttons.

/// Voltage at or above which a low gate turns high.
pub const GATE_HIGH_THRESHOLD: f32 = 2.0;
/// Voltage at or below which a high gate turns low.
pub const GATE_LOW_THRESHOLD: f32 = 0.1;
/// Voltage emitted for an open gate.
pub const GATE_ON: f32 = 10.0;

/// Transition reported by a trigger for one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    None,
    Rising,
    Falling,
}

/// Schmitt trigger with the gate thresholds above.
///
/// Between the thresholds the previous level holds, so a noisy gate
/// produces one rising and one falling edge per pulse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchmittTrigger {
    high: bool,
}

impl SchmittTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a trigger to a persisted level.
    pub fn with_level(high: bool) -> Self {
        SchmittTrigger { high }
    }

    #[inline]
    pub fn is_high(&self) -> bool {
        self.high
    }

    #[inline]
    pub fn process(&mut self, voltage: f32) -> Edge {
        if !self.high && voltage >= GATE_HIGH_THRESHOLD {
            self.high = true;
            Edge::Rising
        } else if self.high && voltage <= GATE_LOW_THRESHOLD {
            self.high = false;
            Edge::Falling
        } else {
            Edge::None
        }
    }

    /// Process and report only rising edges.
    #[inline]
    pub fn rising(&mut self, voltage: f32) -> bool {
        self.process(voltage) == Edge::Rising
    }

    pub fn reset(&mut self) {
        self.high = false;
    }
}

/// Press detector for momentary panel buttons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonTrigger {
    down: bool,
}

impl ButtonTrigger {
    pub fn with_level(down: bool) -> Self {
        ButtonTrigger { down }
    }

    pub fn is_down(&self) -> bool {
        self.down
    }

    /// Returns true once per press.
    #[inline]
    pub fn press(&mut self, pressed: bool) -> bool {
        let fired = pressed && !self.down;
        self.down = pressed;
        fired
    }
}

/// Measures the period of a clock in samples.
///
/// On every rising edge the running count becomes the measured length and
/// restarts; the count then advances once per sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockLength {
    pub counter: i32,
    pub length: i32,
}

impl ClockLength {
    #[inline]
    pub fn tick(&mut self, rising: bool) {
        if rising {
            self.length = self.counter;
            self.counter = 0;
        }
        self.counter = self.counter.saturating_add(1);
    }
}

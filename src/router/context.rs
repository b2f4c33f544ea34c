//! Process context — The router's shared per-tick state.
//!
//! Events raised early in a tick (clock edges, arpeggio edges) are flags
//! here; a node that consumes one clears it so no later node sees it.

use crate::dsp::trigger::ClockLength;

/// Shortest countdown the arpeggio clock is armed with, in samples.
pub const MIN_ARPEGGIATE_COUNTDOWN: i32 = 10;

/// Edges raised during a single tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickEvents {
    pub clock_high: bool,
    pub clock_low: bool,
    pub arp_high: bool,
    pub arp_low: bool,
}

/// Sub-clock that splits one measured clock period into arpeggio steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArpeggioClock {
    /// Samples until the arpeggio gate flips; 0 when idle.
    pub counter: i32,
    /// Samples per half period.
    pub length: i32,
    /// High edges still to come.
    pub left: i32,
    pub high: bool,
}

impl ArpeggioClock {
    #[inline]
    pub fn running(&self) -> bool {
        self.counter > 0
    }

    /// Load the countdown for the next half period. The half period ending
    /// in the final high edge is a sample short, so a full arpeggio closes
    /// just before the clock edge that follows it.
    pub fn arm(&mut self) {
        let padding = if !self.high && self.left <= 1 { 1 } else { 0 };
        self.counter = (self.length - padding).max(MIN_ARPEGGIATE_COUNTDOWN);
    }

    /// Count one sample. With `pass_through` the arpeggio follows the clock
    /// edges instead of its own countdown.
    pub fn step(&mut self, pass_through: bool, events: &mut TickEvents) {
        if !self.running() {
            return;
        }
        if pass_through {
            events.arp_high = events.clock_high;
            events.arp_low = events.clock_low;
            return;
        }
        self.counter -= 1;
        if self.counter == 0 {
            if self.high {
                events.arp_low = true;
                self.high = false;
            } else {
                events.arp_high = true;
                self.high = true;
            }
        }
    }

    pub fn clear(&mut self) {
        self.left = 0;
        self.counter = 0;
        self.high = false;
    }
}

/// Mutable engine state threaded through every node step of a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProcessContext {
    pub active_node: usize,
    /// Root node of the running arpeggio.
    pub arpeggiate_node: Option<usize>,
    pub arpeggio: ArpeggioClock,
    /// Raised by a node that ran out of routes; handled next tick.
    pub end_of_line: bool,
    pub clock: ClockLength,
    pub events: TickEvents,
    /// Main gate voltage.
    pub gate: f32,
    /// CV voltage for the active node.
    pub cv: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_clock_raises_nothing() {
        let mut arp = ArpeggioClock::default();
        let mut events = TickEvents {
            clock_high: true,
            ..Default::default()
        };
        arp.step(true, &mut events);
        arp.step(false, &mut events);
        assert!(!events.arp_high && !events.arp_low);
    }

    #[test]
    fn test_countdown_toggles() {
        let mut arp = ArpeggioClock {
            length: 20,
            left: 3,
            high: true,
            ..Default::default()
        };
        arp.arm();
        let mut edges = Vec::new();
        for n in 1..=40 {
            let mut events = TickEvents::default();
            arp.step(false, &mut events);
            if events.arp_low {
                edges.push((n, false));
                arp.arm();
            }
            if events.arp_high {
                edges.push((n, true));
                arp.arm();
            }
        }
        assert_eq!(edges, vec![(20, false), (40, true)]);
    }

    #[test]
    fn test_final_half_period_is_short() {
        let mut arp = ArpeggioClock {
            length: 50,
            left: 1,
            high: false,
            ..Default::default()
        };
        arp.arm();
        assert_eq!(arp.counter, 49);
        arp.length = 3;
        arp.arm();
        assert_eq!(arp.counter, MIN_ARPEGGIATE_COUNTDOWN);
    }

    #[test]
    fn test_pass_through_follows_clock() {
        let mut arp = ArpeggioClock {
            counter: 5,
            ..Default::default()
        };
        let mut events = TickEvents {
            clock_low: true,
            ..Default::default()
        };
        arp.step(true, &mut events);
        assert!(events.arp_low);
        assert_eq!(arp.counter, 5);
    }
}

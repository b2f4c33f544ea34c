//! CV range — Maps a normalized knob position onto an output voltage span.

use serde::{Deserialize, Serialize};

/// Lowest voltage either bound may take.
pub const CV_MIN: f32 = -10.0;
/// Highest voltage either bound may take.
pub const CV_MAX: f32 = 10.0;

/// An output voltage span between two bounds, in either order.
///
/// Persists as `{"a": .., "b": ..}`. Records written with the older
/// integer range codes (0..=11) decode to the matching span, and any
/// other shape falls back to ±1 V.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "CvRangeRecord")]
pub struct CvRange {
    a: f32,
    b: f32,
}

/// Named spans offered as quick selections, in menu order.
pub const PRESETS: [(&str, f32, f32); 12] = [
    ("+/-10V", -10.0, 10.0),
    ("+/-5V", -5.0, 5.0),
    ("+/-4V", -4.0, 4.0),
    ("+/-3V", -3.0, 3.0),
    ("+/-2V", -2.0, 2.0),
    ("+/-1V", -1.0, 1.0),
    ("0V-10V", 0.0, 10.0),
    ("0V-5V", 0.0, 5.0),
    ("0V-4V", 0.0, 4.0),
    ("0V-3V", 0.0, 3.0),
    ("0V-2V", 0.0, 2.0),
    ("0V-1V", 0.0, 1.0),
];

impl Default for CvRange {
    fn default() -> Self {
        CvRange { a: -1.0, b: 1.0 }
    }
}

impl CvRange {
    /// Build a span; bounds are clamped to ±10 V.
    pub fn new(a: f32, b: f32) -> Self {
        CvRange {
            a: clamp_bound(a),
            b: clamp_bound(b),
        }
    }

    /// Decode an integer range code from older records.
    pub fn from_legacy(code: i64) -> Self {
        let (a, b) = match code {
            0 => (-10.0, 10.0),
            1 => (-5.0, 5.0),
            2 => (-3.0, 3.0),
            4 => (0.0, 10.0),
            5 => (0.0, 5.0),
            6 => (0.0, 3.0),
            7 => (0.0, 1.0),
            8 => (-4.0, 4.0),
            9 => (-2.0, 2.0),
            10 => (0.0, 4.0),
            11 => (0.0, 2.0),
            _ => (-1.0, 1.0),
        };
        CvRange { a, b }
    }

    pub fn a(&self) -> f32 {
        self.a
    }

    pub fn b(&self) -> f32 {
        self.b
    }

    pub fn set_a(&mut self, a: f32) {
        self.a = clamp_bound(a);
    }

    pub fn set_b(&mut self, b: f32) {
        self.b = clamp_bound(b);
    }

    pub fn min(&self) -> f32 {
        self.a.min(self.b)
    }

    pub fn span(&self) -> f32 {
        (self.a - self.b).abs()
    }

    /// `[0, 1]` → volts.
    #[inline]
    pub fn map(&self, x: f32) -> f32 {
        self.span() * x + self.min()
    }

    /// Volts → `[0, 1]`. A zero-width span maps everything to 0.
    pub fn inv_map(&self, volts: f32) -> f32 {
        let span = self.span();
        if span == 0.0 { 0.0 } else { (volts - self.min()) / span }
    }

    /// Menu label such as `-10V to 10V`.
    pub fn label(&self) -> String {
        let low = self.min().floor() as i32;
        let high = (self.min() + self.span()).ceil() as i32;
        format!("{low}V to {high}V")
    }

    /// Index into [`PRESETS`] when the span matches one exactly.
    pub fn preset_index(&self) -> Option<usize> {
        PRESETS
            .iter()
            .position(|&(_, lo, hi)| self.min() == lo && self.min() + self.span() == hi)
    }
}

fn clamp_bound(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(CV_MIN, CV_MAX) }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CvRangeRecord {
    Legacy(i64),
    Span {
        #[serde(default)]
        a: f32,
        #[serde(default)]
        b: f32,
    },
    Other(serde::de::IgnoredAny),
}

impl From<CvRangeRecord> for CvRange {
    fn from(record: CvRangeRecord) -> Self {
        match record {
            CvRangeRecord::Legacy(code) => CvRange::from_legacy(code),
            CvRangeRecord::Span { a, b } => CvRange::new(a, b),
            CvRangeRecord::Other(_) => CvRange::default(),
        }
    }
}

//! Read-pattern tables — Jump sizes and visiting orders for playback.
//!
//! Negative pattern values index [`READ_PATTERN_NEG`]: each entry caps how
//! far playback may jump forward from the current buffer. Positive values
//! index [`READ_PATTERN_POS`]: each row is a fixed visiting order over the
//! six buffers, numbered from 1 with 6 standing for buffer 0.

/// Maximum forward jump per read step, from calm to scattered.
pub const READ_PATTERN_NEG: [[u8; 6]; 25] = [
    [1, 1, 1, 1, 1, 1],
    [2, 1, 1, 1, 1, 1],
    [2, 1, 1, 2, 1, 1],
    [2, 1, 2, 1, 2, 1],
    [2, 2, 1, 2, 2, 1],
    [2, 2, 2, 2, 2, 1],
    [2, 2, 2, 2, 2, 2],
    [3, 2, 2, 2, 2, 2],
    [3, 2, 2, 3, 2, 2],
    [3, 2, 3, 2, 3, 2],
    [3, 3, 2, 3, 3, 2],
    [3, 3, 3, 3, 3, 2],
    [3, 3, 3, 3, 3, 3],
    [4, 3, 3, 3, 3, 3],
    [4, 3, 3, 4, 3, 3],
    [4, 3, 4, 3, 4, 3],
    [4, 4, 3, 4, 4, 3],
    [4, 4, 4, 4, 4, 3],
    [4, 4, 4, 4, 4, 4],
    [5, 4, 4, 4, 4, 4],
    [5, 4, 4, 5, 4, 4],
    [5, 4, 5, 4, 5, 4],
    [5, 5, 4, 5, 5, 4],
    [5, 5, 5, 5, 5, 4],
    [5, 5, 5, 5, 5, 5],
];

/// Buffer visiting orders, from sequential to shuffled.
pub const READ_PATTERN_POS: [[u8; 6]; 120] = [
    [1, 2, 3, 4, 5, 6],
    [1, 2, 3, 4, 6, 5],
    [1, 2, 3, 5, 4, 6],
    [1, 2, 4, 3, 5, 6],
    [1, 3, 2, 4, 5, 6],
    [1, 2, 3, 5, 6, 4],
    [1, 2, 3, 6, 4, 5],
    [1, 2, 3, 6, 5, 4],
    [1, 2, 4, 3, 6, 5],
    [1, 2, 4, 5, 3, 6],
    [1, 2, 5, 3, 4, 6],
    [1, 2, 5, 4, 3, 6],
    [1, 3, 2, 4, 6, 5],
    [1, 3, 2, 5, 4, 6],
    [1, 3, 4, 2, 5, 6],
    [1, 4, 2, 3, 5, 6],
    [1, 4, 3, 2, 5, 6],
    [1, 2, 4, 5, 6, 3],
    [1, 2, 4, 6, 3, 5],
    [1, 2, 4, 6, 5, 3],
    [1, 2, 5, 3, 6, 4],
    [1, 2, 5, 4, 6, 3],
    [1, 2, 6, 3, 4, 5],
    [1, 2, 6, 3, 5, 4],
    [1, 2, 6, 4, 3, 5],
    [1, 2, 6, 4, 5, 3],
    [1, 3, 2, 5, 6, 4],
    [1, 3, 2, 6, 4, 5],
    [1, 3, 2, 6, 5, 4],
    [1, 3, 4, 2, 6, 5],
    [1, 3, 4, 5, 2, 6],
    [1, 3, 5, 2, 4, 6],
    [1, 3, 5, 4, 2, 6],
    [1, 4, 2, 3, 6, 5],
    [1, 4, 2, 5, 3, 6],
    [1, 4, 3, 2, 6, 5],
    [1, 4, 3, 5, 2, 6],
    [1, 5, 2, 3, 4, 6],
    [1, 5, 2, 4, 3, 6],
    [1, 5, 3, 2, 4, 6],
    [1, 5, 3, 4, 2, 6],
    [1, 2, 5, 6, 3, 4],
    [1, 2, 5, 6, 4, 3],
    [1, 2, 6, 5, 3, 4],
    [1, 2, 6, 5, 4, 3],
    [1, 3, 4, 5, 6, 2],
    [1, 3, 4, 6, 2, 5],
    [1, 3, 4, 6, 5, 2],
    [1, 3, 5, 2, 6, 4],
    [1, 3, 5, 4, 6, 2],
    [1, 3, 6, 2, 4, 5],
    [1, 3, 6, 2, 5, 4],
    [1, 3, 6, 4, 2, 5],
    [1, 3, 6, 4, 5, 2],
    [1, 4, 2, 5, 6, 3],
    [1, 4, 2, 6, 3, 5],
    [1, 4, 2, 6, 5, 3],
    [1, 4, 3, 5, 6, 2],
    [1, 4, 3, 6, 2, 5],
    [1, 4, 3, 6, 5, 2],
    [1, 4, 5, 2, 3, 6],
    [1, 4, 5, 3, 2, 6],
    [1, 5, 2, 3, 6, 4],
    [1, 5, 2, 4, 6, 3],
    [1, 5, 3, 2, 6, 4],
    [1, 5, 3, 4, 6, 2],
    [1, 5, 4, 2, 3, 6],
    [1, 5, 4, 3, 2, 6],
    [1, 6, 2, 3, 4, 5],
    [1, 6, 2, 3, 5, 4],
    [1, 6, 2, 4, 3, 5],
    [1, 6, 2, 4, 5, 3],
    [1, 6, 3, 2, 4, 5],
    [1, 6, 3, 2, 5, 4],
    [1, 6, 3, 4, 2, 5],
    [1, 6, 3, 4, 5, 2],
    [1, 3, 5, 6, 2, 4],
    [1, 3, 5, 6, 4, 2],
    [1, 3, 6, 5, 2, 4],
    [1, 3, 6, 5, 4, 2],
    [1, 4, 5, 2, 6, 3],
    [1, 4, 5, 3, 6, 2],
    [1, 4, 6, 2, 3, 5],
    [1, 4, 6, 2, 5, 3],
    [1, 4, 6, 3, 2, 5],
    [1, 4, 6, 3, 5, 2],
    [1, 5, 2, 6, 3, 4],
    [1, 5, 2, 6, 4, 3],
    [1, 5, 3, 6, 2, 4],
    [1, 5, 3, 6, 4, 2],
    [1, 5, 4, 2, 6, 3],
    [1, 5, 4, 3, 6, 2],
    [1, 6, 2, 5, 3, 4],
    [1, 6, 2, 5, 4, 3],
    [1, 6, 3, 5, 2, 4],
    [1, 6, 3, 5, 4, 2],
    [1, 6, 4, 2, 3, 5],
    [1, 6, 4, 2, 5, 3],
    [1, 6, 4, 3, 2, 5],
    [1, 6, 4, 3, 5, 2],
    [1, 4, 5, 6, 2, 3],
    [1, 4, 5, 6, 3, 2],
    [1, 4, 6, 5, 2, 3],
    [1, 4, 6, 5, 3, 2],
    [1, 5, 4, 6, 2, 3],
    [1, 5, 4, 6, 3, 2],
    [1, 5, 6, 2, 3, 4],
    [1, 5, 6, 2, 4, 3],
    [1, 5, 6, 3, 2, 4],
    [1, 5, 6, 3, 4, 2],
    [1, 5, 6, 4, 2, 3],
    [1, 5, 6, 4, 3, 2],
    [1, 6, 4, 5, 2, 3],
    [1, 6, 4, 5, 3, 2],
    [1, 6, 5, 2, 3, 4],
    [1, 6, 5, 2, 4, 3],
    [1, 6, 5, 3, 2, 4],
    [1, 6, 5, 3, 4, 2],
    [1, 6, 5, 4, 2, 3],
    [1, 6, 5, 4, 3, 2],
];

/// Row of [`READ_PATTERN_NEG`] for a pattern value in `[-1, 0)`.
pub fn scatter_row(pattern: f32) -> usize {
    ((-pattern * 24.0).round().max(0.0) as usize).min(READ_PATTERN_NEG.len() - 1)
}

/// Row of [`READ_PATTERN_POS`] for a pattern value in `[0, 1]`.
pub fn order_row(pattern: f32) -> usize {
    ((pattern * 119.0).round().max(0.0) as usize).min(READ_PATTERN_POS.len() - 1)
}

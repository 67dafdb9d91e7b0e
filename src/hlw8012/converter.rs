//! Pulse period to physical value.
//!
//! The HLW8012 output frequency is proportional to the measured quantity, so
//! `value = multiplier / period`. When no usable period exists (no edge yet,
//! or a clock anomaly) the previous value is held: sparse pulses at low load
//! must not read as zero.

/// Time since the last edge, 0 if the line has never pulsed.
pub fn period_us(now_us: i64, last_edge_us: Option<i64>) -> i64 {
    match last_edge_us {
        Some(edge) => now_us.saturating_sub(edge),
        None => 0,
    }
}

/// `Some(multiplier / period)` for a positive period, `None` otherwise.
pub fn value_from_period(multiplier: f32, period_us: i64) -> Option<f32> {
    if period_us <= 0 {
        return None;
    }
    let value = multiplier / period_us as f32;
    value.is_finite().then_some(value)
}

/// Converts with the stale-hold policy applied.
pub fn convert(multiplier: f32, period_us: i64, previous: f32) -> f32 {
    value_from_period(multiplier, period_us).unwrap_or(previous)
}

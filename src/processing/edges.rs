use super::sign;
use crate::config::SpeedConfig;

/// Index used when Hall-A never enters its reference state.
pub const HALL_A_ENTRY_FALLBACK: usize = 0;
/// Index used when Hall-A never leaves its reference state after the entry.
pub const HALL_A_EXIT_FALLBACK: usize = 3;
/// Index used when Hall-B never enters its reference state after the Hall-A entry.
pub const HALL_B_ENTRY_FALLBACK: usize = 1;
/// Encoder display offset when no index pulse fits a full window.
pub const ENCODER_INDEX_FALLBACK: usize = 0;

/// First `i >= from` where the signal sits at `low` and rises above it at `i + 1`.
pub fn find_entry(samples: &[f64], low: f64, from: usize) -> Option<usize> {
    (from..samples.len().saturating_sub(1)).find(|&i| samples[i] == low && samples[i + 1] > low)
}

/// First `i >= from` where the signal is above `low` and drops back to it at `i + 1`.
pub fn find_exit(samples: &[f64], low: f64, from: usize) -> Option<usize> {
    (from..samples.len().saturating_sub(1)).find(|&i| samples[i] > low && samples[i + 1] == low)
}

/// Transition indices bounding one Hall-A high phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HallEdges {
    pub a_entry: usize,
    pub a_exit: usize,
    pub b_entry: usize,
    /// Set when any of the three indices is a fallback rather than a real edge.
    pub fell_back: bool,
}

impl HallEdges {
    /// Scans Hall-A for its rising transition, then searches forward from it
    /// for the Hall-A falling and Hall-B rising transitions.
    pub fn locate(hall_a: &[f64], a_low: f64, hall_b: &[f64], b_low: f64) -> Self {
        let a_entry = find_entry(hall_a, a_low, 0);
        let from = a_entry.unwrap_or(HALL_A_ENTRY_FALLBACK);
        let a_exit = find_exit(hall_a, a_low, from);
        let b_entry = find_entry(hall_b, b_low, from);

        Self {
            a_entry: from,
            a_exit: a_exit.unwrap_or(HALL_A_EXIT_FALLBACK),
            b_entry: b_entry.unwrap_or(HALL_B_ENTRY_FALLBACK),
            fell_back: a_entry.is_none() || a_exit.is_none() || b_entry.is_none(),
        }
    }
}

/// Speed from Hall edge timing, for when the spectrum holds too few cycles.
#[derive(Debug, Clone)]
pub struct HallSpeedEstimator {
    rpm_seconds: f64,
    glitch_rpm: f64,
    ceiling_rpm: f64,
    reverse_factor: f64,
}

impl HallSpeedEstimator {
    pub fn new(config: &SpeedConfig) -> Self {
        Self {
            rpm_seconds: config.hall_rpm_seconds,
            glitch_rpm: config.hall_glitch_rpm,
            ceiling_rpm: config.hall_ceiling_rpm,
            reverse_factor: config.reverse_factor,
        }
    }

    /// Signed rpm from the Hall-A entry to Hall-B entry interval. Forward
    /// rotation puts the Hall-B entry before the Hall-A exit; in reverse
    /// Hall-B trails by twice as much, hence the reverse factor.
    ///
    /// Zero when any edge is a fallback index: timing taken from fallback
    /// indices has no relation to the rotor period.
    pub fn estimate(&self, edges: &HallEdges, timestamps: &[f64]) -> f64 {
        if edges.fell_back {
            return 0.0;
        }

        let at = |index: usize| timestamps.get(index).copied().unwrap_or(0.0);
        let a_entry = at(edges.a_entry);
        let b_entry = at(edges.b_entry);
        let a_exit = at(edges.a_exit);

        let interval = (b_entry - a_entry).abs();
        let direction = sign(a_exit - b_entry);
        if interval == 0.0 || direction == 0.0 {
            return 0.0;
        }

        let factor = if direction < 0.0 { self.reverse_factor } else { 1.0 };
        self.clamp(self.rpm_seconds / interval * direction * factor)
    }

    /// Zeroes glitches above the absolute ceiling and saturates at the soft one.
    pub fn clamp(&self, rpm: f64) -> f64 {
        if !rpm.is_finite() || rpm.abs() > self.glitch_rpm {
            0.0
        } else if rpm.abs() > self.ceiling_rpm {
            sign(rpm) * self.ceiling_rpm
        } else {
            rpm
        }
    }
}

/// Offset aligning the encoder display to the index pulse.
pub fn encoder_window_start(index: &[f64], low: f64, display_len: usize) -> usize {
    match find_entry(index, low, 0) {
        Some(i) if i + display_len <= index.len() => i,
        _ => ENCODER_INDEX_FALLBACK,
    }
}

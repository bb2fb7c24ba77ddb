use super::median;

/// Index used when phase U has no negative-going zero crossing.
pub const U_CROSSING_FALLBACK: usize = 1;
/// Index used when phase V has no negative-going crossing after U's.
pub const V_CROSSING_FALLBACK: usize = 1;
/// Index used when phase W has no crossing of the searched direction after U's.
pub const W_CROSSING_FALLBACK: usize = 1;
/// Index used when U-V never falls through its threshold.
pub const VOLTAGE_ANCHOR_FALLBACK: usize = 1;

/// Rotation direction of the three-phase set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhaseSequence {
    #[default]
    Positive,
    Negative,
}

impl PhaseSequence {
    pub fn sign(&self) -> f64 {
        match self {
            PhaseSequence::Positive => 1.0,
            PhaseSequence::Negative => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Falling,
    Rising,
}

/// First `i >= from` where the signal goes through `level` in `direction`
/// between `i` and `i + 1`. The last two samples never start a crossing.
pub fn find_crossing(
    samples: &[f64],
    level: f64,
    from: usize,
    direction: Direction,
) -> Option<usize> {
    (from..samples.len().saturating_sub(2)).find(|&i| match direction {
        Direction::Falling => samples[i] >= level && samples[i + 1] <= level,
        Direction::Rising => samples[i] <= level && samples[i + 1] >= level,
    })
}

/// Every timestamp followed by the midpoint to the next one: `2n - 1` points.
pub fn doubled_time_grid(times: &[f64]) -> Vec<f64> {
    let mut grid = Vec::with_capacity((2 * times.len()).saturating_sub(1));
    for pair in times.windows(2) {
        grid.push(pair[0]);
        grid.push((pair[0] + pair[1]) / 2.0);
    }
    grid.extend(times.last());
    grid
}

/// Piecewise-linear interpolation of `(times, values)` at each point of
/// `grid`, holding the end values outside the sampled range. `times` must be
/// non-decreasing.
pub fn interpolate(grid: &[f64], times: &[f64], values: &[f64]) -> Vec<f64> {
    let n = times.len().min(values.len());
    if n == 0 {
        return vec![0.0; grid.len()];
    }
    let (times, values) = (&times[..n], &values[..n]);

    grid.iter()
        .map(|&t| {
            if t <= times[0] {
                return values[0];
            }
            if t >= times[n - 1] {
                return values[n - 1];
            }
            let hi = times.partition_point(|&x| x <= t);
            let lo = hi - 1;
            let span = times[hi] - times[lo];
            if span == 0.0 {
                values[lo]
            } else {
                values[lo] + (values[hi] - values[lo]) * (t - times[lo]) / span
            }
        })
        .collect()
}

pub fn remove_median(values: &mut [f64]) {
    let center = median(values);
    values.iter_mut().for_each(|v| *v -= center);
}

/// Alignment offsets found in one pass, all on the doubled grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossingIndices {
    /// First negative-going crossing of U; anchors the current window.
    pub u_falling: usize,
    pub v_falling: usize,
    pub w_falling: usize,
    pub w_rising: usize,
    /// U-V falling through its threshold; anchors the voltage window.
    pub voltage_anchor: usize,
    /// At least one phase crossing was a fallback, so the sequence was held.
    pub sequence_held: bool,
}

/// Decides the phase sequence from zero-crossing order, keeping the last
/// decision when the order is incomplete or ambiguous.
#[derive(Debug, Clone)]
pub struct SequenceLocator {
    held: PhaseSequence,
    threshold_fraction: f64,
}

impl SequenceLocator {
    pub fn new(threshold_fraction: f64) -> Self {
        Self {
            held: PhaseSequence::default(),
            threshold_fraction,
        }
    }

    pub fn sequence(&self) -> PhaseSequence {
        self.held
    }

    /// `u`, `v`, `w` are median-free phase currents and `uv` the line voltage,
    /// all on the same grid.
    pub fn locate(&mut self, u: &[f64], v: &[f64], w: &[f64], uv: &[f64]) -> CrossingIndices {
        use Direction::*;

        let u_found = find_crossing(u, 0.0, 0, Falling);
        let from = u_found.unwrap_or(U_CROSSING_FALLBACK);
        let v_found = find_crossing(v, 0.0, from, Falling);
        let w_falling = find_crossing(w, 0.0, from, Falling);
        let w_rising = find_crossing(w, 0.0, from, Rising);

        let decision = match (u_found, v_found, w_falling, w_rising) {
            (Some(_), Some(v), Some(wf), Some(wr)) if wr < v && v < wf => {
                Some(PhaseSequence::Positive)
            }
            (Some(_), Some(v), Some(wf), Some(wr)) if wf < v && v < wr => {
                Some(PhaseSequence::Negative)
            }
            _ => None,
        };
        if let Some(sequence) = decision {
            self.held = sequence;
        }

        let peak = uv.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let voltage_anchor = if peak.is_finite() {
            find_crossing(uv, -self.threshold_fraction * peak, 0, Falling)
        } else {
            None
        };

        CrossingIndices {
            u_falling: from,
            v_falling: v_found.unwrap_or(V_CROSSING_FALLBACK),
            w_falling: w_falling.unwrap_or(W_CROSSING_FALLBACK),
            w_rising: w_rising.unwrap_or(W_CROSSING_FALLBACK),
            voltage_anchor: voltage_anchor.unwrap_or(VOLTAGE_ANCHOR_FALLBACK),
            sequence_held: decision.is_none(),
        }
    }
}

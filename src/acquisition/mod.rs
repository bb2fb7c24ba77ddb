pub mod cycle;
pub mod frame;
pub mod simulated;

use crate::error::Result;

use serde::{Deserialize, Serialize};

/// Analog quantities carried on the sensor bus.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AnalogChannel {
    VoltageU,
    VoltageV,
    VoltageW,
    CurrentU,
    CurrentV,
    CurrentW,
    Reference,
}

impl AnalogChannel {
    pub const ALL: [AnalogChannel; 7] = [
        AnalogChannel::VoltageU,
        AnalogChannel::VoltageV,
        AnalogChannel::VoltageW,
        AnalogChannel::CurrentU,
        AnalogChannel::CurrentV,
        AnalogChannel::CurrentW,
        AnalogChannel::Reference,
    ];
}

/// Hall sensor lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HallLine {
    A,
    B,
    C,
}

/// Quadrature encoder lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderLine {
    A,
    B,
    Index,
}

/// Snapshot of every digital input line, bit `n` holding line `n`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineStates(pub u64);

impl LineStates {
    pub fn from_levels(levels: &[bool]) -> Self {
        let bits = levels
            .iter()
            .enumerate()
            .filter(|&(line, &high)| high && line < 64)
            .fold(0u64, |acc, (line, _)| acc | (1 << line));
        Self(bits)
    }

    pub fn is_high(&self, line: usize) -> bool {
        line < 64 && (self.0 >> line) & 1 == 1
    }

    /// Level of `line` as 0.0/1.0.
    pub fn level(&self, line: usize) -> f64 {
        if self.is_high(line) {
            1.0
        } else {
            0.0
        }
    }

    pub fn set(&mut self, line: usize, high: bool) {
        if line >= 64 {
            return;
        }
        if high {
            self.0 |= 1 << line;
        } else {
            self.0 &= !(1 << line);
        }
    }
}

/// Full-duplex, fixed-length transfer on the sensor bus.
pub trait SensorBus: Send {
    fn transfer(&mut self, outgoing: &[u8]) -> Result<Vec<u8>>;
}

/// Hall, encoder and mode-select inputs.
pub trait DigitalLines: Send {
    fn read(&mut self) -> Result<LineStates>;
}

/// Monotonic acquisition time in seconds.
pub trait Clock: Send {
    fn now(&mut self) -> f64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_states_index_by_line_number() {
        let states = LineStates::from_levels(&[false, true, true, false, false, false, true]);
        assert!(!states.is_high(0));
        assert!(states.is_high(1));
        assert!(states.is_high(2));
        assert!(states.is_high(6));
        assert_eq!(states.level(2), 1.0);
        assert_eq!(states.level(3), 0.0);
        assert!(!states.is_high(70));
    }

    #[test]
    fn set_clears_and_raises_single_lines() {
        let mut states = LineStates::default();
        states.set(4, true);
        states.set(5, true);
        states.set(4, false);
        assert_eq!(states, LineStates(1 << 5));
    }

    #[test]
    fn levels_past_the_last_line_are_ignored() {
        let mut levels = vec![false; 70];
        levels[3] = true;
        levels[63] = true;
        levels[64] = true;
        levels[69] = true;
        let states = LineStates::from_levels(&levels);
        assert_eq!(states, LineStates((1 << 3) | (1 << 63)));
    }
}

use crate::processing::park::{Dq0, Dq0Series};
use crate::processing::sequence::PhaseSequence;
use crate::processing::speed::{ReferenceMode, SpeedSource};
use crate::processing::vectors::VectorDecomposition;

use parking_lot::Mutex;
use std::sync::Arc;

/// Three per-phase (or per-line) sample windows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PhaseWindows {
    pub u: Vec<f64>,
    pub v: Vec<f64>,
    pub w: Vec<f64>,
}

impl PhaseWindows {
    pub fn zeros(len: usize) -> Self {
        Self {
            u: vec![0.0; len],
            v: vec![0.0; len],
            w: vec![0.0; len],
        }
    }
}

/// Display-offset Hall states aligned to the Hall-A entry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HallWindow {
    pub time: Vec<f64>,
    pub a: Vec<f64>,
    pub b: Vec<f64>,
    pub c: Vec<f64>,
}

/// Encoder states aligned to the index pulse.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EncoderWindow {
    pub time: Vec<f64>,
    pub a: Vec<f64>,
    pub b: Vec<f64>,
    pub index: Vec<f64>,
}

/// One value per processing pass, oldest first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Histories {
    pub speed: Vec<f64>,
    pub reference: Vec<f64>,
    pub voltage: Dq0Series,
    pub current: Dq0Series,
}

/// Everything the display side reads, captured at the end of one
/// processing pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineSnapshot {
    /// Number of completed processing passes.
    pub pass: u64,
    pub sample_rate: f64,
    pub frequency: f64,
    pub peak_magnitude: f64,
    pub sequence: PhaseSequence,
    pub speed_rpm: f64,
    pub speed_source: SpeedSource,
    pub reference_rpm: f64,
    pub reference_mode: ReferenceMode,

    /// Re-zeroed time base of the current window.
    pub current_time: Vec<f64>,
    /// Re-zeroed time base of the voltage window.
    pub voltage_time: Vec<f64>,
    /// Unfiltered phase voltages at the start of the analog buffer.
    pub phase_voltages: PhaseWindows,
    /// Filtered U-V, V-W and W-U.
    pub line_voltages: PhaseWindows,
    pub phase_currents: PhaseWindows,
    pub voltage_dq0: Dq0Series,
    pub current_dq0: Dq0Series,
    pub voltage_mean: Dq0,
    pub current_mean: Dq0,
    pub vectors: VectorDecomposition,

    pub hall: HallWindow,
    pub encoder: EncoderWindow,
    pub histories: Histories,
}

pub type SharedSnapshot = Arc<Mutex<PipelineSnapshot>>;

pub fn create_shared_snapshot() -> SharedSnapshot {
    Arc::new(Mutex::new(PipelineSnapshot::default()))
}

/// Copy of the latest published snapshot.
pub fn read_snapshot(shared: &SharedSnapshot) -> PipelineSnapshot {
    shared.lock().clone()
}

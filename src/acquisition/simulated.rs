use super::frame::FrameDecoder;
use super::{AnalogChannel, Clock, DigitalLines, LineStates, SensorBus};
use crate::config::{BusConfig, LinesConfig};
use crate::error::{PipelineError, Result};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::Arc;

const THIRD_TURN: f64 = 2.0 * PI / 3.0;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    /// Electrical frequency in Hz.
    pub frequency: f64,
    /// Negative phase sequence when set.
    pub reverse: bool,
    pub voltage_bias: f64,
    pub voltage_amplitude: f64,
    pub current_amplitude: f64,
    /// Current lag behind voltage, radians.
    pub current_lag: f64,
    /// Peak uniform noise added to every analog value.
    pub noise: f64,
    pub reference_raw: f64,
    pub unidirectional_reference: bool,
    /// Encoder pulses per electrical revolution.
    pub encoder_pulses: usize,
    /// Seconds per bus transfer.
    pub analog_period: f64,
    /// Seconds per digital line read.
    pub digital_period: f64,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            frequency: 40.0,
            reverse: false,
            voltage_bias: 12.0,
            voltage_amplitude: 10.0,
            current_amplitude: 2.0,
            current_lag: 0.3,
            noise: 0.02,
            reference_raw: 1500.0,
            unidirectional_reference: false,
            encoder_pulses: 16,
            analog_period: 5e-4,
            digital_period: 3.4e-5,
            seed: 7,
        }
    }
}

/// Rotor state and simulated time shared by the bus, lines and clock.
pub struct MotorModel {
    config: SimulationConfig,
    time: f64,
    rng: StdRng,
}

impl MotorModel {
    pub fn new(config: SimulationConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            time: 0.0,
            rng,
        }
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    fn angle(&self) -> f64 {
        2.0 * PI * self.config.frequency * self.time
    }

    fn direction(&self) -> f64 {
        if self.config.reverse {
            -1.0
        } else {
            1.0
        }
    }

    fn noise(&mut self) -> f64 {
        let peak = self.config.noise;
        if peak > 0.0 {
            self.rng.gen_range(-peak..peak)
        } else {
            0.0
        }
    }

    /// Analog values of every bus channel at the current time.
    pub fn analog_values(&mut self) -> Vec<(AnalogChannel, f64)> {
        let theta = self.angle();
        let direction = self.direction();
        let c = self.config.clone();

        let mut values = Vec::with_capacity(AnalogChannel::ALL.len());
        for (k, (volts, amps)) in [
            (AnalogChannel::VoltageU, AnalogChannel::CurrentU),
            (AnalogChannel::VoltageV, AnalogChannel::CurrentV),
            (AnalogChannel::VoltageW, AnalogChannel::CurrentW),
        ]
        .into_iter()
        .enumerate()
        {
            let phase = theta - direction * k as f64 * THIRD_TURN;
            let voltage = c.voltage_bias + c.voltage_amplitude * phase.cos() + self.noise();
            let current = c.current_amplitude * (phase - c.current_lag).cos() + self.noise();
            values.push((volts, voltage));
            values.push((amps, current));
        }
        values.push((AnalogChannel::Reference, c.reference_raw));
        values
    }

    /// Hall, encoder and mode-select levels at the current time.
    pub fn line_states(&self, lines: &LinesConfig) -> LineStates {
        let theta = self.angle();
        let direction = self.direction();
        let hall = |k: f64| (theta - direction * k * THIRD_TURN).sin() >= 0.0;

        let pulses = self.config.encoder_pulses.max(1) as f64;
        let encoder_angle = pulses * theta;
        let index_width = 2.0 * PI / (4.0 * pulses);

        let mut states = LineStates::default();
        states.set(lines.hall_a, hall(0.0));
        states.set(lines.hall_b, hall(1.0));
        states.set(lines.hall_c, hall(2.0));
        states.set(lines.encoder_a, encoder_angle.sin() >= 0.0);
        states.set(lines.encoder_b, (encoder_angle - direction * PI / 2.0).sin() >= 0.0);
        states.set(lines.encoder_index, theta.rem_euclid(2.0 * PI) < index_width);
        states.set(lines.reference_mode, self.config.unidirectional_reference);
        states
    }

    fn advance(&mut self, dt: f64) {
        self.time += dt;
    }
}

/// Factory for front-end handles over one shared [`MotorModel`].
#[derive(Clone)]
pub struct SimulatedMotor {
    model: Arc<Mutex<MotorModel>>,
}

impl SimulatedMotor {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            model: Arc::new(Mutex::new(MotorModel::new(config))),
        }
    }

    pub fn bus(&self, config: &BusConfig) -> SimulatedBus {
        SimulatedBus {
            model: Arc::clone(&self.model),
            decoder: FrameDecoder::new(config),
        }
    }

    pub fn lines(&self, config: &LinesConfig) -> SimulatedLines {
        SimulatedLines {
            model: Arc::clone(&self.model),
            lines: config.clone(),
        }
    }

    pub fn clock(&self) -> SimulatedClock {
        SimulatedClock {
            model: Arc::clone(&self.model),
        }
    }

    pub fn set_frequency(&self, frequency: f64) {
        self.model.lock().config.frequency = frequency;
    }

    pub fn set_reverse(&self, reverse: bool) {
        self.model.lock().config.reverse = reverse;
    }

    pub fn time(&self) -> f64 {
        self.model.lock().time()
    }
}

/// Encodes the model's analog values into bus frames; each transfer takes
/// one analog period.
pub struct SimulatedBus {
    model: Arc<Mutex<MotorModel>>,
    decoder: FrameDecoder,
}

impl SensorBus for SimulatedBus {
    fn transfer(&mut self, outgoing: &[u8]) -> Result<Vec<u8>> {
        if outgoing.len() != self.decoder.frame_len() {
            return Err(PipelineError::FrameLength {
                expected: self.decoder.frame_len(),
                actual: outgoing.len(),
            });
        }

        let mut model = self.model.lock();
        let raw: Vec<(AnalogChannel, u16)> = model
            .analog_values()
            .into_iter()
            .filter_map(|(channel, value)| Some((channel, self.decoder.raw_for(channel, value)?)))
            .collect();
        let period = model.config.analog_period;
        model.advance(period);

        Ok(self.decoder.encode(&raw))
    }
}

/// Reads line levels from the rotor angle; each read takes one digital period.
pub struct SimulatedLines {
    model: Arc<Mutex<MotorModel>>,
    lines: LinesConfig,
}

impl DigitalLines for SimulatedLines {
    fn read(&mut self) -> Result<LineStates> {
        let mut model = self.model.lock();
        let states = model.line_states(&self.lines);
        let period = model.config.digital_period;
        model.advance(period);
        Ok(states)
    }
}

pub struct SimulatedClock {
    model: Arc<Mutex<MotorModel>>,
}

impl Clock for SimulatedClock {
    fn now(&mut self) -> f64 {
        self.model.lock().time()
    }
}

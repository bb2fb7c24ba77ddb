use crate::config::BuffersConfig;

/// What the pipeline does on a given tick of the acquisition super-cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    AcquireAnalog,
    AcquireHall,
    AcquireEncoder,
    Process,
}

/// Tick counter over one super-cycle of `analog + guard`, `hall` and
/// `encoder` acquisition ticks. The counter wrapping is the `Process` state.
#[derive(Debug, Clone)]
pub struct AcquisitionCycle {
    tick: usize,
    analog_ticks: usize,
    hall_ticks: usize,
    encoder_ticks: usize,
}

impl AcquisitionCycle {
    pub fn new(config: &BuffersConfig) -> Self {
        Self {
            tick: 0,
            analog_ticks: config.analog_len + config.guard_ticks,
            hall_ticks: config.hall_len,
            encoder_ticks: config.encoder_len,
        }
    }

    pub fn len(&self) -> usize {
        self.analog_ticks + self.hall_ticks + self.encoder_ticks
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tick(&self) -> usize {
        self.tick
    }

    /// Acquisition state of the current tick.
    pub fn state(&self) -> CycleState {
        if self.tick < self.analog_ticks {
            CycleState::AcquireAnalog
        } else if self.tick < self.analog_ticks + self.hall_ticks {
            CycleState::AcquireHall
        } else {
            CycleState::AcquireEncoder
        }
    }

    /// Moves past the current tick. Returns `Process` exactly once per wrap,
    /// otherwise the state of the next tick.
    pub fn advance(&mut self) -> CycleState {
        self.tick += 1;
        if self.tick >= self.len() {
            self.tick = 0;
            CycleState::Process
        } else {
            self.state()
        }
    }
}

use super::buffer::{clamp_window_start, clamped_window, rezero, SampleBuffer, TimestampBuffer};
use super::edges::{encoder_window_start, HallEdges, HallSpeedEstimator};
use super::filters::filtfilt;
use super::filters::lowpass::{normalized_cutoff, LowPassFilter};
use super::median;
use super::park::{park_series, Dq0, Dq0Series};
use super::sequence::{doubled_time_grid, interpolate, remove_median, SequenceLocator};
use super::spectrum::{sample_rate, FrequencyEstimate, SpectralEstimator};
use super::speed::{JitterSource, ReferenceMode, ReferenceSpeedMapper, SpeedFusion, UniformJitter};
use super::vectors::decompose;
use crate::acquisition::cycle::{AcquisitionCycle, CycleState};
use crate::acquisition::frame::FrameDecoder;
use crate::acquisition::simulated::SimulatedMotor;
use crate::acquisition::{
    AnalogChannel, Clock, DigitalLines, EncoderLine, HallLine, LineStates, SensorBus,
};
use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::output::snapshot::{
    create_shared_snapshot, read_snapshot, EncoderWindow, HallWindow, Histories, PhaseWindows,
    PipelineSnapshot, SharedSnapshot,
};

use rayon::prelude::*;
use std::f64::consts::PI;
use std::path::Path;

// -----------------------------------------------------------------------------
// MOTOR PIPELINE
// -----------------------------------------------------------------------------

/// Acquisition and estimation context. Each [`tick`](Self::tick) performs
/// one acquisition step; the tick that completes a super-cycle also runs a
/// full processing pass and publishes a new snapshot.
pub struct MotorPipeline {
    config: Config,
    bus: Box<dyn SensorBus>,
    lines: Box<dyn DigitalLines>,
    clock: Box<dyn Clock>,
    decoder: FrameDecoder,
    cycle: AcquisitionCycle,
    outgoing: Vec<u8>,
    buffers: AcquisitionBuffers,
    histories: HistoryBuffers,
    estimator: SpectralEstimator,
    hall_speed: HallSpeedEstimator,
    locator: SequenceLocator,
    fusion: SpeedFusion,
    reference: ReferenceSpeedMapper,
    jitter: Box<dyn JitterSource>,
    last_lines: LineStates,
    shared: SharedSnapshot,
    passes: u64,
    paused: bool,
    rotating: bool,
}

impl MotorPipeline {
    pub fn new(
        config: Config,
        bus: Box<dyn SensorBus>,
        lines: Box<dyn DigitalLines>,
        clock: Box<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let jitter = UniformJitter::from_config(&config.speed, config.processor.jitter_seed);
        let pipeline = MotorPipeline {
            decoder: FrameDecoder::new(&config.bus),
            cycle: AcquisitionCycle::new(&config.buffers),
            outgoing: vec![0u8; config.bus.frame_len],
            buffers: AcquisitionBuffers::new(&config),
            histories: HistoryBuffers::new(config.buffers.history_len),
            estimator: SpectralEstimator::new(config.estimator.magnitude_threshold),
            hall_speed: HallSpeedEstimator::new(&config.speed),
            locator: SequenceLocator::new(config.estimator.line_threshold_fraction),
            fusion: SpeedFusion::new(&config.speed),
            reference: ReferenceSpeedMapper::new(&config.reference),
            jitter: Box::new(jitter),
            last_lines: LineStates::default(),
            shared: create_shared_snapshot(),
            passes: 0,
            paused: false,
            rotating: false,
            bus,
            lines,
            clock,
            config,
        };

        log::info!(
            "motor pipeline ready: {} ticks per cycle, {}-sample analog window",
            pipeline.cycle.len(),
            pipeline.config.buffers.analog_len
        );
        Ok(pipeline)
    }

    /// Pipeline wired to the three handles of a simulated motor.
    pub fn simulated(config: Config, motor: &SimulatedMotor) -> Result<Self> {
        let bus = motor.bus(&config.bus);
        let lines = motor.lines(&config.lines);
        let clock = motor.clock();
        Self::new(config, Box::new(bus), Box::new(lines), Box::new(clock))
    }

    /// Replaces the saturation jitter source.
    pub fn with_jitter(mut self, jitter: Box<dyn JitterSource>) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs one acquisition step. Returns `None` while paused, `Process` when
    /// a processing pass completed on this tick, otherwise the acquisition
    /// state that ran. A hardware fault leaves the tick counter where it was.
    pub fn tick(&mut self) -> Result<Option<CycleState>> {
        if self.paused {
            return Ok(None);
        }

        let state = self.cycle.state();
        match state {
            CycleState::AcquireAnalog => self.acquire_analog()?,
            CycleState::AcquireHall => self.acquire_hall()?,
            CycleState::AcquireEncoder => self.acquire_encoder()?,
            // Only `advance` reports Process; `state` never does.
            CycleState::Process => {}
        }

        if self.cycle.advance() == CycleState::Process {
            self.process();
            return Ok(Some(CycleState::Process));
        }
        Ok(Some(state))
    }

    /// Ticks until `count` more processing passes have completed, or until
    /// the pipeline is paused.
    pub fn run_passes(&mut self, count: u64) -> Result<()> {
        let target = self.passes + count;
        while self.passes < target {
            if self.tick()?.is_none() {
                break;
            }
        }
        Ok(())
    }

    pub fn pause(&mut self) {
        if !self.paused {
            log::info!("acquisition paused at tick {}", self.cycle.tick());
        }
        self.paused = true;
    }

    pub fn resume(&mut self) {
        if self.paused {
            log::info!("acquisition resumed");
        }
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn passes(&self) -> u64 {
        self.passes
    }

    pub fn cycle_state(&self) -> CycleState {
        self.cycle.state()
    }

    /// Copy of the snapshot published by the latest processing pass.
    pub fn snapshot(&self) -> PipelineSnapshot {
        read_snapshot(&self.shared)
    }

    /// Handle readers on other threads can poll for new snapshots.
    pub fn shared_snapshot(&self) -> SharedSnapshot {
        SharedSnapshot::clone(&self.shared)
    }

    /// Dumps the latest snapshot. Runs between ticks, so it never sees a
    /// half-finished pass.
    pub fn export(&self, path: impl AsRef<Path>) -> Result<()> {
        crate::output::export::write_csv(&self.snapshot(), path)
    }

    pub fn analog_buffer(&self, channel: AnalogChannel) -> &SampleBuffer<f64> {
        self.buffers.analog(channel)
    }

    pub fn analog_timestamps(&self) -> &TimestampBuffer {
        &self.buffers.analog_time
    }

    /// Full Hall buffer, display offset included.
    pub fn hall_buffer(&self, line: HallLine) -> &SampleBuffer<f64> {
        match line {
            HallLine::A => &self.buffers.hall_a,
            HallLine::B => &self.buffers.hall_b,
            HallLine::C => &self.buffers.hall_c,
        }
    }

    pub fn hall_timestamps(&self) -> &TimestampBuffer {
        &self.buffers.hall_time
    }

    /// Full encoder buffer, display offset included.
    pub fn encoder_buffer(&self, line: EncoderLine) -> &SampleBuffer<f64> {
        match line {
            EncoderLine::A => &self.buffers.encoder_a,
            EncoderLine::B => &self.buffers.encoder_b,
            EncoderLine::Index => &self.buffers.encoder_index,
        }
    }

    pub fn encoder_timestamps(&self) -> &TimestampBuffer {
        &self.buffers.encoder_time
    }

    // ACQUISITION -------------------------------------------------------------

    fn acquire_analog(&mut self) -> Result<()> {
        let timestamp = self.clock.now();
        let frame = self.bus.transfer(&self.outgoing)?;
        if frame.len() != self.decoder.frame_len() {
            return Err(PipelineError::FrameLength {
                expected: self.decoder.frame_len(),
                actual: frame.len(),
            });
        }

        for sample in self.decoder.decode(&frame) {
            self.buffers.analog_mut(sample.channel).push(sample.value);
        }
        self.buffers.analog_time.push(timestamp);
        Ok(())
    }

    fn acquire_hall(&mut self) -> Result<()> {
        let timestamp = self.clock.now();
        let states = self.lines.read()?;
        let l = &self.config.lines;

        self.buffers.hall_a.push(states.level(l.hall_a) + l.a_offset);
        self.buffers.hall_b.push(states.level(l.hall_b) + l.b_offset);
        self.buffers.hall_c.push(states.level(l.hall_c) + l.c_offset);
        self.buffers.hall_time.push(timestamp);
        self.last_lines = states;
        Ok(())
    }

    fn acquire_encoder(&mut self) -> Result<()> {
        let timestamp = self.clock.now();
        let states = self.lines.read()?;
        let l = &self.config.lines;

        self.buffers.encoder_a.push(states.level(l.encoder_a) + l.a_offset);
        self.buffers.encoder_b.push(states.level(l.encoder_b) + l.b_offset);
        self.buffers.encoder_index.push(states.level(l.encoder_index) + l.c_offset);
        self.buffers.encoder_time.push(timestamp);
        self.last_lines = states;
        Ok(())
    }

    // PROCESSING --------------------------------------------------------------

    fn process(&mut self) {
        let lines = self.config.lines.clone();
        let sizes = self.config.buffers.clone();
        let b = &self.buffers;

        // Hall and encoder alignment
        let hall_a = b.hall_a.snapshot();
        let hall_b = b.hall_b.snapshot();
        let hall_time = b.hall_time.snapshot();
        let edges = HallEdges::locate(&hall_a, lines.a_offset, &hall_b, lines.b_offset);
        if edges.fell_back {
            log::warn!("hall edges not found, hall speed reads zero ({:?})", edges);
        }
        let hall_rpm = self.hall_speed.estimate(&edges, &hall_time);

        let hall = HallWindow {
            time: rezero(&b.hall_time.window(edges.a_entry, sizes.hall_display_len)),
            a: b.hall_a.window(edges.a_entry, sizes.hall_display_len),
            b: b.hall_b.window(edges.a_entry, sizes.hall_display_len),
            c: b.hall_c.window(edges.a_entry, sizes.hall_display_len),
        };

        let encoder_start = encoder_window_start(
            &b.encoder_index.snapshot(),
            lines.c_offset,
            sizes.encoder_display_len,
        );
        let encoder = EncoderWindow {
            time: rezero(&b.encoder_time.window(encoder_start, sizes.encoder_display_len)),
            a: b.encoder_a.window(encoder_start, sizes.encoder_display_len),
            b: b.encoder_b.window(encoder_start, sizes.encoder_display_len),
            index: b.encoder_index.window(encoder_start, sizes.encoder_display_len),
        };

        // Spectral estimate over line differences and phase currents
        let times = b.analog_time.snapshot();
        let u = b.voltage_u.snapshot();
        let v = b.voltage_v.snapshot();
        let w = b.voltage_w.snapshot();
        let channels = [
            difference(&u, &v),
            difference(&v, &w),
            difference(&w, &u),
            b.current_u.snapshot(),
            b.current_v.snapshot(),
            b.current_w.snapshot(),
        ];
        let phase_voltages = PhaseWindows {
            u: clamped_window(&u, 0, sizes.analog_display_len).to_vec(),
            v: clamped_window(&v, 0, sizes.analog_display_len).to_vec(),
            w: clamped_window(&w, 0, sizes.analog_display_len).to_vec(),
        };
        let reference_raw = median(&b.reference.snapshot());

        let fs = sample_rate(&times);
        let estimate = match fs {
            Some(fs) => {
                let signals: Vec<&[f64]> = channels.iter().map(Vec::as_slice).collect();
                self.estimator.fundamental(&signals, fs)
            }
            None => FrequencyEstimate::default(),
        };

        let analysis = match fs {
            Some(fs) if !estimate.is_degenerate() => {
                self.analyse(&times, &channels, estimate.frequency, fs)
            }
            _ => AnalogAnalysis::zeros(&times, sizes.analog_display_len),
        };
        if estimate.is_degenerate() && self.rotating {
            log::info!("rotation lost (peak magnitude {:.3})", estimate.peak_magnitude);
        } else if !estimate.is_degenerate() && !self.rotating {
            log::info!("rotation detected at {:.2} Hz", estimate.frequency);
        }
        self.rotating = !estimate.is_degenerate();

        // Speed, reference and vectors
        let sequence = self.locator.sequence();
        let (speed_rpm, speed_source) =
            self.fusion.fuse(estimate.frequency, sequence, hall_rpm, self.jitter.as_mut());
        let reference_mode =
            ReferenceMode::from_line(self.last_lines.is_high(lines.reference_mode));
        let reference_rpm = self
            .reference
            .map(reference_raw, reference_mode, self.jitter.as_mut());

        let omega = 2.0 * PI * sequence.sign() * estimate.frequency;
        let vectors = decompose(
            analysis.voltage_mean,
            analysis.current_mean,
            omega,
            &self.config.motor,
        );

        self.histories.push(speed_rpm, reference_rpm, analysis.voltage_mean, analysis.current_mean);
        self.passes += 1;

        log::debug!(
            "pass {}: {:.2} Hz, {:?}, {:.0} rpm from {:?}, reference {:.0} rpm",
            self.passes,
            estimate.frequency,
            sequence,
            speed_rpm,
            speed_source,
            reference_rpm
        );

        let snapshot = PipelineSnapshot {
            pass: self.passes,
            sample_rate: fs.unwrap_or(0.0),
            frequency: estimate.frequency,
            peak_magnitude: estimate.peak_magnitude,
            sequence,
            speed_rpm,
            speed_source,
            reference_rpm,
            reference_mode,
            current_time: analysis.current_time,
            voltage_time: analysis.voltage_time,
            phase_voltages,
            line_voltages: analysis.line_voltages,
            phase_currents: analysis.phase_currents,
            voltage_dq0: analysis.voltage_dq0,
            current_dq0: analysis.current_dq0,
            voltage_mean: analysis.voltage_mean,
            current_mean: analysis.current_mean,
            vectors,
            hall,
            encoder,
            histories: self.histories.to_histories(),
        };
        *self.shared.lock() = snapshot;
    }

    /// Filters the six channels, locates the alignment crossings and runs
    /// the Park transform on both windows. `channels` is U-V, V-W, W-U,
    /// then the U, V and W currents.
    fn analyse(
        &mut self,
        times: &[f64],
        channels: &[Vec<f64>; 6],
        frequency: f64,
        fs: f64,
    ) -> AnalogAnalysis {
        let e = &self.config.estimator;
        let filter = LowPassFilter::butterworth(normalized_cutoff(
            frequency,
            fs,
            e.cutoff_multiple,
            e.max_normalized_cutoff,
        ));
        let filtered: Vec<Vec<f64>> =
            channels[..].par_iter().map(|c| filtfilt(&filter, c)).collect();

        let grid = doubled_time_grid(times);
        let mut on_grid: Vec<Vec<f64>> =
            filtered.iter().map(|f| interpolate(&grid, times, f)).collect();
        for current in on_grid[3..].iter_mut() {
            remove_median(current);
        }
        let [uv, vw, wu, iu, iv, iw] = [0, 1, 2, 3, 4, 5].map(|k| on_grid[k].as_slice());

        let indices = self.locator.locate(iu, iv, iw, uv);
        if indices.sequence_held {
            log::warn!(
                "phase crossings incomplete, holding {:?} sequence ({:?})",
                self.locator.sequence(),
                indices
            );
        }
        let signed_frequency = self.locator.sequence().sign() * frequency;
        let display = self.config.buffers.analog_display_len;
        let rms = 1.0 / 3f64.sqrt();

        let cs = clamp_window_start(grid.len(), indices.u_falling, display);
        let current_grid = clamped_window(&grid, cs, display);
        let [iu, iv, iw] = [iu, iv, iw].map(|s| clamped_window(s, cs, display));
        let current_dq0 = park_series(iu, iv, iw, current_grid, signed_frequency);
        let current_mean = current_dq0.mean().scaled(rms);

        let vs = clamp_window_start(grid.len(), indices.voltage_anchor, display);
        let voltage_grid = clamped_window(&grid, vs, display);
        let [uv, vw, wu] = [uv, vw, wu].map(|s| clamped_window(s, vs, display));
        let voltage_dq0 = park_series(uv, vw, wu, voltage_grid, signed_frequency);

        AnalogAnalysis {
            current_time: rezero(current_grid),
            voltage_time: rezero(voltage_grid),
            line_voltages: PhaseWindows {
                u: uv.to_vec(),
                v: vw.to_vec(),
                w: wu.to_vec(),
            },
            phase_currents: PhaseWindows {
                u: iu.iter().map(|x| x * rms).collect(),
                v: iv.iter().map(|x| x * rms).collect(),
                w: iw.iter().map(|x| x * rms).collect(),
            },
            voltage_mean: voltage_dq0.mean(),
            voltage_dq0,
            current_dq0: current_dq0.scaled(rms),
            current_mean,
        }
    }
}

fn difference(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x - y).collect()
}

// -----------------------------------------------------------------------------
// PIPELINE SUBCOMPONENTS
// -----------------------------------------------------------------------------

// BUFFER COMPONENT ------------------------------------------------------------

struct AcquisitionBuffers {
    voltage_u: SampleBuffer<f64>,
    voltage_v: SampleBuffer<f64>,
    voltage_w: SampleBuffer<f64>,
    current_u: SampleBuffer<f64>,
    current_v: SampleBuffer<f64>,
    current_w: SampleBuffer<f64>,
    /// Raw reference counts at the analog rate, sized like the histories.
    reference: SampleBuffer<f64>,
    analog_time: TimestampBuffer,
    hall_a: SampleBuffer<f64>,
    hall_b: SampleBuffer<f64>,
    hall_c: SampleBuffer<f64>,
    hall_time: TimestampBuffer,
    encoder_a: SampleBuffer<f64>,
    encoder_b: SampleBuffer<f64>,
    encoder_index: SampleBuffer<f64>,
    encoder_time: TimestampBuffer,
}

impl AcquisitionBuffers {
    fn new(config: &Config) -> Self {
        let sizes = &config.buffers;
        let l = &config.lines;
        let analog = || SampleBuffer::new(sizes.analog_len);

        Self {
            voltage_u: analog(),
            voltage_v: analog(),
            voltage_w: analog(),
            current_u: analog(),
            current_v: analog(),
            current_w: analog(),
            reference: SampleBuffer::new(sizes.history_len),
            analog_time: analog(),
            hall_a: SampleBuffer::filled(sizes.hall_len, l.a_offset),
            hall_b: SampleBuffer::filled(sizes.hall_len, l.b_offset),
            hall_c: SampleBuffer::filled(sizes.hall_len, l.c_offset),
            hall_time: SampleBuffer::new(sizes.hall_len),
            encoder_a: SampleBuffer::filled(sizes.encoder_len, l.a_offset),
            encoder_b: SampleBuffer::filled(sizes.encoder_len, l.b_offset),
            encoder_index: SampleBuffer::filled(sizes.encoder_len, l.c_offset),
            encoder_time: SampleBuffer::new(sizes.encoder_len),
        }
    }

    fn analog(&self, channel: AnalogChannel) -> &SampleBuffer<f64> {
        match channel {
            AnalogChannel::VoltageU => &self.voltage_u,
            AnalogChannel::VoltageV => &self.voltage_v,
            AnalogChannel::VoltageW => &self.voltage_w,
            AnalogChannel::CurrentU => &self.current_u,
            AnalogChannel::CurrentV => &self.current_v,
            AnalogChannel::CurrentW => &self.current_w,
            AnalogChannel::Reference => &self.reference,
        }
    }

    fn analog_mut(&mut self, channel: AnalogChannel) -> &mut SampleBuffer<f64> {
        match channel {
            AnalogChannel::VoltageU => &mut self.voltage_u,
            AnalogChannel::VoltageV => &mut self.voltage_v,
            AnalogChannel::VoltageW => &mut self.voltage_w,
            AnalogChannel::CurrentU => &mut self.current_u,
            AnalogChannel::CurrentV => &mut self.current_v,
            AnalogChannel::CurrentW => &mut self.current_w,
            AnalogChannel::Reference => &mut self.reference,
        }
    }
}

// HISTORY COMPONENT -----------------------------------------------------------

struct HistoryBuffers {
    speed: SampleBuffer<f64>,
    reference: SampleBuffer<f64>,
    voltage: [SampleBuffer<f64>; 3],
    current: [SampleBuffer<f64>; 3],
}

impl HistoryBuffers {
    fn new(len: usize) -> Self {
        let buffer = || SampleBuffer::new(len);
        Self {
            speed: buffer(),
            reference: buffer(),
            voltage: [buffer(), buffer(), buffer()],
            current: [buffer(), buffer(), buffer()],
        }
    }

    fn push(&mut self, speed: f64, reference: f64, voltage: Dq0, current: Dq0) {
        self.speed.push(speed);
        self.reference.push(reference);
        for (buffer, value) in self.voltage.iter_mut().zip([voltage.d, voltage.q, voltage.zero]) {
            buffer.push(value);
        }
        for (buffer, value) in self.current.iter_mut().zip([current.d, current.q, current.zero]) {
            buffer.push(value);
        }
    }

    fn to_histories(&self) -> Histories {
        let series = |[d, q, zero]: &[SampleBuffer<f64>; 3]| Dq0Series {
            d: d.snapshot(),
            q: q.snapshot(),
            zero: zero.snapshot(),
        };
        Histories {
            speed: self.speed.snapshot(),
            reference: self.reference.snapshot(),
            voltage: series(&self.voltage),
            current: series(&self.current),
        }
    }
}

// ANALYSIS RESULT -------------------------------------------------------------

struct AnalogAnalysis {
    current_time: Vec<f64>,
    voltage_time: Vec<f64>,
    line_voltages: PhaseWindows,
    phase_currents: PhaseWindows,
    voltage_dq0: Dq0Series,
    current_dq0: Dq0Series,
    voltage_mean: Dq0,
    current_mean: Dq0,
}

impl AnalogAnalysis {
    /// Result of a pass with no detectable rotation: every derived value is
    /// zero, only the time bases are filled in.
    fn zeros(times: &[f64], display: usize) -> Self {
        let grid = doubled_time_grid(times);
        let time = rezero(clamped_window(&grid, 0, display));
        let len = time.len();
        Self {
            voltage_time: time.clone(),
            current_time: time,
            line_voltages: PhaseWindows::zeros(len),
            phase_currents: PhaseWindows::zeros(len),
            voltage_dq0: Dq0Series::zeros(len),
            current_dq0: Dq0Series::zeros(len),
            voltage_mean: Dq0::default(),
            current_mean: Dq0::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::simulated::{SimulatedLines, SimulationConfig};
    use crate::config::BuffersConfig;
    use crate::processing::speed::NoJitter;

    struct FailingBus;

    impl SensorBus for FailingBus {
        fn transfer(&mut self, _outgoing: &[u8]) -> Result<Vec<u8>> {
            Err(PipelineError::Bus("no response".to_string()))
        }
    }

    struct ShortBus;

    impl SensorBus for ShortBus {
        fn transfer(&mut self, _outgoing: &[u8]) -> Result<Vec<u8>> {
            Ok(vec![0u8; 3])
        }
    }

    /// Serves `reads` line samples from the simulator, then fails.
    struct FailingLines {
        inner: SimulatedLines,
        reads: usize,
    }

    impl DigitalLines for FailingLines {
        fn read(&mut self) -> Result<LineStates> {
            if self.reads == 0 {
                return Err(PipelineError::Lines("line request released".to_string()));
            }
            self.reads -= 1;
            self.inner.read()
        }
    }

    fn failing_lines_pipeline(reads: usize) -> MotorPipeline {
        let motor = SimulatedMotor::new(SimulationConfig::default());
        let config = Config::default();
        let bus = motor.bus(&config.bus);
        let lines = FailingLines {
            inner: motor.lines(&config.lines),
            reads,
        };
        MotorPipeline::new(config, Box::new(bus), Box::new(lines), Box::new(motor.clock()))
            .unwrap()
    }

    fn tick_until(pipeline: &mut MotorPipeline, state: CycleState) {
        while pipeline.cycle_state() != state {
            pipeline.tick().unwrap();
        }
    }

    fn pipeline(sim: SimulationConfig) -> MotorPipeline {
        let motor = SimulatedMotor::new(sim);
        MotorPipeline::simulated(Config::default(), &motor)
            .unwrap()
            .with_jitter(Box::new(NoJitter))
    }

    #[test]
    fn one_pass_per_cycle() {
        let mut pipeline = pipeline(SimulationConfig::default());
        let cycle = pipeline.cycle.len();
        let mut passes = 0;
        for _ in 0..cycle * 2 {
            if pipeline.tick().unwrap() == Some(CycleState::Process) {
                passes += 1;
            }
        }
        assert_eq!(passes, 2);
        assert_eq!(pipeline.passes(), 2);
        assert_eq!(pipeline.snapshot().pass, 2);
    }

    #[test]
    fn bus_fault_propagates_without_advancing() {
        let motor = SimulatedMotor::new(SimulationConfig::default());
        let config = Config::default();
        let lines = motor.lines(&config.lines);
        let mut pipeline = MotorPipeline::new(
            config,
            Box::new(FailingBus),
            Box::new(lines),
            Box::new(motor.clock()),
        )
        .unwrap();

        let err = pipeline.tick().unwrap_err();
        assert!(err.is_hardware_fault());
        assert_eq!(pipeline.cycle.tick(), 0);
    }

    #[test]
    fn hall_read_fault_propagates_without_advancing() {
        let mut pipeline = failing_lines_pipeline(0);
        tick_until(&mut pipeline, CycleState::AcquireHall);
        let tick = pipeline.cycle.tick();
        let hall_time = pipeline.buffers.hall_time.snapshot();
        let hall_a = pipeline.buffers.hall_a.snapshot();

        let err = pipeline.tick().unwrap_err();
        assert!(matches!(err, PipelineError::Lines(_)));
        assert!(err.is_hardware_fault());
        assert_eq!(pipeline.cycle.tick(), tick);
        assert_eq!(pipeline.buffers.hall_time.snapshot(), hall_time);
        assert_eq!(pipeline.buffers.hall_a.snapshot(), hall_a);
    }

    #[test]
    fn encoder_read_fault_propagates_without_advancing() {
        let hall_len = Config::default().buffers.hall_len;
        let mut pipeline = failing_lines_pipeline(hall_len);
        tick_until(&mut pipeline, CycleState::AcquireEncoder);
        let tick = pipeline.cycle.tick();
        let encoder_time = pipeline.buffers.encoder_time.snapshot();
        let encoder_index = pipeline.buffers.encoder_index.snapshot();

        let err = pipeline.tick().unwrap_err();
        assert!(matches!(err, PipelineError::Lines(_)));
        assert!(err.is_hardware_fault());
        assert_eq!(pipeline.cycle.tick(), tick);
        assert_eq!(pipeline.buffers.encoder_time.snapshot(), encoder_time);
        assert_eq!(pipeline.buffers.encoder_index.snapshot(), encoder_index);
        assert_eq!(pipeline.passes(), 0);
    }

    #[test]
    fn short_frame_is_rejected() {
        let motor = SimulatedMotor::new(SimulationConfig::default());
        let config = Config::default();
        let lines = motor.lines(&config.lines);
        let mut pipeline =
            MotorPipeline::new(config, Box::new(ShortBus), Box::new(lines), Box::new(motor.clock()))
                .unwrap();
        assert!(matches!(
            pipeline.tick(),
            Err(PipelineError::FrameLength { expected: 16, actual: 3 })
        ));
    }

    #[test]
    fn invalid_config_is_refused() {
        let motor = SimulatedMotor::new(SimulationConfig::default());
        let config = Config {
            buffers: BuffersConfig {
                analog_display_len: 1000,
                ..BuffersConfig::default()
            },
            ..Config::default()
        };
        assert!(matches!(
            MotorPipeline::simulated(config, &motor),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn hall_buffers_carry_display_offsets() {
        let mut pipeline = pipeline(SimulationConfig::default());
        pipeline.run_passes(1).unwrap();
        let snapshot = pipeline.snapshot();
        assert!(snapshot.hall.a.iter().all(|&x| x == 3.0 || x == 4.0));
        assert!(snapshot.hall.b.iter().all(|&x| x == 1.5 || x == 2.5));
        assert!(snapshot.hall.c.iter().all(|&x| x == 0.0 || x == 1.0));
        assert_eq!(snapshot.hall.a.len(), 1000);
        assert_eq!(snapshot.encoder.index.len(), 200);
    }

    #[test]
    fn reference_track_follows_mode_line() {
        let mut pipeline = pipeline(SimulationConfig {
            reference_raw: 271.0,
            unidirectional_reference: true,
            ..SimulationConfig::default()
        });
        pipeline.run_passes(1).unwrap();
        let snapshot = pipeline.snapshot();
        assert_eq!(snapshot.reference_mode, ReferenceMode::Unidirectional);
        assert!((snapshot.reference_rpm - 275.0).abs() < 1e-9);
        assert_eq!(snapshot.histories.reference.last().copied(), Some(snapshot.reference_rpm));
    }

    #[test]
    fn history_buffers_keep_fixed_length() {
        let mut pipeline = pipeline(SimulationConfig::default());
        pipeline.run_passes(3).unwrap();
        let histories = pipeline.snapshot().histories;
        assert_eq!(histories.speed.len(), 101);
        assert_eq!(histories.voltage.zero.len(), 101);
        assert_eq!(histories.speed[..98], vec![0.0; 98][..]);
    }
}

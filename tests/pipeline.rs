use motor_telemetry::acquisition::cycle::CycleState;
use motor_telemetry::acquisition::{AnalogChannel, EncoderLine, HallLine};
use motor_telemetry::processing::sequence::PhaseSequence;
use motor_telemetry::processing::speed::{NoJitter, SpeedSource};
use motor_telemetry::{Config, MotorPipeline, SimulatedMotor, SimulationConfig};

fn simulated(sim: SimulationConfig) -> (SimulatedMotor, MotorPipeline) {
    let motor = SimulatedMotor::new(sim);
    let pipeline = MotorPipeline::simulated(Config::default(), &motor)
        .unwrap()
        .with_jitter(Box::new(NoJitter));
    (motor, pipeline)
}

fn at(frequency: f64, reverse: bool) -> SimulationConfig {
    SimulationConfig {
        frequency,
        reverse,
        ..SimulationConfig::default()
    }
}

#[test]
fn forty_hertz_motor_reports_spectral_speed() {
    let (_motor, mut pipeline) = simulated(at(40.0, false));
    pipeline.run_passes(2).unwrap();
    let snapshot = pipeline.snapshot();

    assert!((snapshot.sample_rate - 2000.0).abs() < 1.0);
    assert!((snapshot.frequency - 40.0).abs() < 0.5, "frequency {}", snapshot.frequency);
    assert_eq!(snapshot.sequence, PhaseSequence::Positive);
    assert_eq!(snapshot.speed_source, SpeedSource::Spectral);
    assert!((snapshot.speed_rpm - snapshot.frequency * 15.77).abs() < 1e-9);
}

#[test]
fn reversed_motor_flips_sequence_and_speed_sign() {
    let (_motor, mut pipeline) = simulated(at(40.0, true));
    pipeline.run_passes(2).unwrap();
    let snapshot = pipeline.snapshot();

    assert_eq!(snapshot.sequence, PhaseSequence::Negative);
    assert!(snapshot.speed_rpm < -600.0, "speed {}", snapshot.speed_rpm);
}

#[test]
fn rotating_frame_recovers_balanced_amplitudes() {
    let (_motor, mut pipeline) = simulated(at(40.0, false));
    pipeline.run_passes(1).unwrap();
    let snapshot = pipeline.snapshot();

    // Line voltages are sqrt(3) times the 10 V phase amplitude.
    let v = snapshot.voltage_mean;
    assert!((v.d.hypot(v.q) - 10.0 * 3f64.sqrt()).abs() < 0.5, "voltage {:?}", v);
    assert!(v.zero.abs() < 1e-6);

    // The current window opens on the U falling zero crossing, which puts
    // the 2 A set on the q axis before the sqrt(3) scaling.
    let i = snapshot.current_mean;
    assert!((i.q - 2.0 / 3f64.sqrt()).abs() < 0.1, "current {:?}", i);
    assert!(i.d.abs() < 0.15, "current {:?}", i);

    assert_eq!(snapshot.voltage_dq0.len(), 200);
    assert_eq!(snapshot.current_time.len(), 200);
    assert_eq!(snapshot.current_time[0], 0.0);
    assert_eq!(snapshot.vectors.measured.x, v.d);
}

#[test]
fn low_speed_falls_back_to_hall_timing() {
    let (_motor, mut pipeline) = simulated(at(20.0, false));
    pipeline.run_passes(1).unwrap();
    let snapshot = pipeline.snapshot();

    assert_eq!(snapshot.speed_source, SpeedSource::Hall);
    // Hall-B enters a third of a period after Hall-A.
    let expected = 5.331 / (1.0 / (3.0 * 20.0));
    assert!(
        (snapshot.speed_rpm - expected).abs() < expected * 0.02,
        "speed {} expected {}",
        snapshot.speed_rpm,
        expected
    );
}

#[test]
fn slow_reverse_without_full_hall_period_never_reads_forward() {
    // At 15 Hz Hall-B can enter up to 5/3 of a period after the buffer
    // starts, which a 3000-sample Hall buffer does not always reach.
    let (_motor, mut pipeline) = simulated(at(15.0, true));
    for _ in 0..4 {
        pipeline.run_passes(1).unwrap();
        let snapshot = pipeline.snapshot();
        assert_eq!(snapshot.speed_source, SpeedSource::Hall);
        assert!(snapshot.speed_rpm <= 0.0, "speed {}", snapshot.speed_rpm);
    }
}

#[test]
fn stationary_motor_yields_zeros() {
    let (_motor, mut pipeline) = simulated(at(0.0, false));
    pipeline.run_passes(1).unwrap();
    let snapshot = pipeline.snapshot();

    assert_eq!(snapshot.frequency, 0.0);
    assert_eq!(snapshot.speed_rpm, 0.0);
    assert_eq!(snapshot.speed_source, SpeedSource::Hall);
    for series in [
        &snapshot.line_voltages.u,
        &snapshot.phase_currents.w,
        &snapshot.voltage_dq0.d,
        &snapshot.current_dq0.q,
    ] {
        assert_eq!(series.len(), 200);
        assert!(series.iter().all(|&x| x == 0.0));
    }
    assert_eq!(snapshot.voltage_mean.d, 0.0);
    assert_eq!(snapshot.vectors.back_emf, snapshot.vectors.stator_reaction);
}

#[test]
fn pipeline_follows_live_motor_changes() {
    let (motor, mut pipeline) = simulated(at(40.0, false));
    pipeline.run_passes(1).unwrap();
    assert_eq!(pipeline.snapshot().sequence, PhaseSequence::Positive);

    motor.set_reverse(true);
    pipeline.run_passes(1).unwrap();
    assert_eq!(pipeline.snapshot().sequence, PhaseSequence::Negative);

    motor.set_reverse(false);
    motor.set_frequency(20.0);
    pipeline.run_passes(1).unwrap();
    let snapshot = pipeline.snapshot();
    assert_eq!(snapshot.sequence, PhaseSequence::Positive);
    assert_eq!(snapshot.speed_source, SpeedSource::Hall);
    assert!((snapshot.frequency - 20.0).abs() < 0.5);
}

#[test]
fn buffers_hold_one_cycle_of_evenly_spaced_samples() {
    let (_motor, mut pipeline) = simulated(at(40.0, false));
    pipeline.run_passes(1).unwrap();
    assert_eq!(pipeline.cycle_state(), CycleState::AcquireAnalog);

    let analog_len = pipeline.config().buffers.analog_len;
    let voltage = pipeline.analog_buffer(AnalogChannel::VoltageU);
    assert_eq!(voltage.capacity(), analog_len);
    assert!(voltage.iter().all(|v| v > 0.0));

    let analog = pipeline.analog_timestamps().snapshot();
    assert!(analog.windows(2).all(|w| (w[1] - w[0] - 5e-4).abs() < 1e-12));

    let hall = pipeline.hall_timestamps().snapshot();
    let span = hall[hall.len() - 1] - hall[0];
    assert!((span - 2999.0 * 3.4e-5).abs() < 1e-9, "span {}", span);
    assert!(hall[0] > analog[analog_len - 1]);

    let buffers = &pipeline.config().buffers;
    for (line, low) in [(HallLine::A, 3.0), (HallLine::B, 1.5), (HallLine::C, 0.0)] {
        let levels = pipeline.hall_buffer(line);
        assert_eq!(levels.capacity(), buffers.hall_len);
        assert!(levels.iter().all(|x| x == low || x == low + 1.0));
        assert!(levels.iter().any(|x| x == low + 1.0), "{:?} never high", line);
    }
    for (line, low) in [(EncoderLine::A, 3.0), (EncoderLine::B, 1.5), (EncoderLine::Index, 0.0)] {
        let levels = pipeline.encoder_buffer(line);
        assert_eq!(levels.capacity(), buffers.encoder_len);
        assert!(levels.iter().all(|x| x == low || x == low + 1.0));
    }

    let encoder = pipeline.encoder_timestamps().snapshot();
    assert_eq!(encoder.len(), buffers.encoder_len);
    assert!(encoder[0] > hall[hall.len() - 1]);
    assert!(encoder.windows(2).all(|w| (w[1] - w[0] - 3.4e-5).abs() < 1e-12));
}

#[test]
fn snapshot_is_stable_between_ticks() {
    let (_motor, mut pipeline) = simulated(at(40.0, false));
    pipeline.run_passes(1).unwrap();
    assert_eq!(pipeline.snapshot(), pipeline.snapshot());
}

#[test]
fn paused_pipeline_touches_nothing() {
    let (motor, mut pipeline) = simulated(at(40.0, false));
    pipeline.run_passes(1).unwrap();

    pipeline.pause();
    let before = pipeline.snapshot();
    let time = motor.time();
    let timestamps = pipeline.analog_timestamps().snapshot();
    for _ in 0..10_000 {
        assert_eq!(pipeline.tick().unwrap(), None);
    }
    pipeline.run_passes(1).unwrap();

    assert!(pipeline.is_paused());
    assert_eq!(motor.time(), time);
    assert_eq!(pipeline.analog_timestamps().snapshot(), timestamps);
    assert_eq!(pipeline.snapshot(), before);

    pipeline.resume();
    pipeline.run_passes(1).unwrap();
    assert_eq!(pipeline.snapshot().pass, before.pass + 1);
}

#[test]
fn shared_snapshot_tracks_passes_from_another_thread() {
    let (_motor, mut pipeline) = simulated(at(40.0, false));
    let shared = pipeline.shared_snapshot();
    pipeline.run_passes(2).unwrap();

    let pass = std::thread::spawn(move || shared.lock().pass).join().unwrap();
    assert_eq!(pass, 2);
}

#[test]
fn export_writes_labeled_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("DataOut.csv");

    let (_motor, mut pipeline) = simulated(at(40.0, false));
    pipeline.run_passes(1).unwrap();
    pipeline.export(&path).unwrap();

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(&path)
        .unwrap();
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();

    let labels: Vec<&str> = rows.iter().map(|r| r.get(0).unwrap()).collect();
    assert_eq!(labels[0], "exported_at");
    assert_eq!(labels[1], "frequency");
    assert!(labels.contains(&"speed_history"));
    assert!(labels.contains(&"encoder_index"));

    let frequency: f64 = rows[1][1].parse().unwrap();
    assert_eq!(frequency, pipeline.snapshot().frequency);
    let hall_a = rows.iter().find(|r| &r[0] == "hall_a").unwrap();
    assert_eq!(hall_a.len(), 1001);
}

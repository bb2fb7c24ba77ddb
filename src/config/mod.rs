// src/config/mod.rs
use crate::acquisition::AnalogChannel;
use crate::error::{PipelineError, Result};

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub processor: ProcessorConfig,
    pub buffers: BuffersConfig,
    pub bus: BusConfig,
    pub lines: LinesConfig,
    pub estimator: EstimatorConfig,
    pub speed: SpeedConfig,
    pub reference: ReferenceSpeedConfig,
    pub motor: MotorConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ProcessorConfig {
    pub verbose: bool,
    /// Seed for the saturation jitter; `None` seeds from entropy.
    pub jitter_seed: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BuffersConfig {
    pub analog_len: usize,
    pub analog_display_len: usize,
    pub hall_len: usize,
    pub hall_display_len: usize,
    pub encoder_len: usize,
    pub encoder_display_len: usize,
    /// Extra analog ticks per cycle so the analog buffer is fully refreshed.
    pub guard_ticks: usize,
    pub history_len: usize,
}

impl Default for BuffersConfig {
    fn default() -> Self {
        Self {
            analog_len: 400,
            analog_display_len: 200,
            hall_len: 3000,
            hall_display_len: 1000,
            encoder_len: 200,
            encoder_display_len: 200,
            guard_ticks: 100,
            history_len: 101,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BusConfig {
    pub frame_len: usize,
    pub slots: Vec<ChannelSlotConfig>,
}

/// Where one analog channel lives in the bus frame and how its raw counts scale.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChannelSlotConfig {
    pub channel: AnalogChannel,
    pub byte_offset: usize,
    pub tags: Vec<u8>,
    pub gain: f64,
    pub offset: f64,
}

impl ChannelSlotConfig {
    fn new(
        channel: AnalogChannel,
        byte_offset: usize,
        tags: &[u8],
        gain: f64,
        offset: f64,
    ) -> Self {
        Self {
            channel,
            byte_offset,
            tags: tags.to_vec(),
            gain,
            offset,
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        let volts = 31.0 / 5250.0;
        let amps = 20.0 / 9009.0;
        Self {
            frame_len: 16,
            slots: vec![
                ChannelSlotConfig::new(AnalogChannel::VoltageU, 4, &[0, 1, 3], volts, 0.0),
                ChannelSlotConfig::new(AnalogChannel::VoltageV, 6, &[2, 6], volts, 0.0),
                ChannelSlotConfig::new(AnalogChannel::VoltageW, 8, &[7, 5], volts, 0.0),
                ChannelSlotConfig::new(AnalogChannel::CurrentU, 10, &[4, 12, 13], amps, -5.0),
                ChannelSlotConfig::new(AnalogChannel::CurrentV, 12, &[15, 14], amps, -5.0),
                ChannelSlotConfig::new(AnalogChannel::CurrentW, 14, &[10, 11], amps, -5.0),
                ChannelSlotConfig::new(AnalogChannel::Reference, 0, &[9, 8], 1.0, 0.0),
            ],
        }
    }
}

/// Line numbers of each digital signal plus the display offsets stacked onto
/// their 0/1 states.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LinesConfig {
    pub hall_a: usize,
    pub hall_b: usize,
    pub hall_c: usize,
    pub encoder_a: usize,
    pub encoder_b: usize,
    pub encoder_index: usize,
    pub reference_mode: usize,
    pub a_offset: f64,
    pub b_offset: f64,
    pub c_offset: f64,
}

impl Default for LinesConfig {
    fn default() -> Self {
        Self {
            hall_c: 0,
            hall_b: 1,
            hall_a: 2,
            encoder_b: 3,
            encoder_a: 4,
            encoder_index: 5,
            reference_mode: 6,
            a_offset: 3.0,
            b_offset: 1.5,
            c_offset: 0.0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EstimatorConfig {
    /// Peak |X_k|/N below which the motor is treated as stationary.
    pub magnitude_threshold: f64,
    /// Cutoff as a multiple of the fundamental, normalized to the sampling rate.
    pub cutoff_multiple: f64,
    /// Upper bound of the normalized cutoff (1.0 = Nyquist).
    pub max_normalized_cutoff: f64,
    /// Fraction of the U-V peak used to anchor the line-voltage window.
    pub line_threshold_fraction: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            magnitude_threshold: 0.5,
            cutoff_multiple: 3.0,
            max_normalized_cutoff: 0.99,
            line_threshold_fraction: 0.15,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SpeedConfig {
    pub rpm_per_hz: f64,
    pub confidence_rpm: f64,
    pub ceiling_rpm: f64,
    /// Jitter is drawn from `jitter_min..jitter_max` (upper bound exclusive).
    pub jitter_min: i32,
    pub jitter_max: i32,
    pub hall_rpm_seconds: f64,
    pub hall_glitch_rpm: f64,
    pub hall_ceiling_rpm: f64,
    pub reverse_factor: f64,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            rpm_per_hz: 15.77,
            confidence_rpm: 500.0,
            ceiling_rpm: 3500.0,
            jitter_min: -5,
            jitter_max: 11,
            hall_rpm_seconds: 5.331,
            hall_glitch_rpm: 3700.0,
            hall_ceiling_rpm: 3510.0,
            reverse_factor: 2.0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ReferenceSpeedConfig {
    pub unidirectional: UnidirectionalCurve,
    pub bidirectional: BidirectionalCurve,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UnidirectionalCurve {
    pub knee: f64,
    pub slope: f64,
    pub base_rpm: f64,
    pub ceiling_rpm: f64,
}

impl Default for UnidirectionalCurve {
    fn default() -> Self {
        Self {
            knee: 165.0,
            slope: 175.0 / 106.0,
            base_rpm: 100.0,
            ceiling_rpm: 3500.0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BidirectionalCurve {
    pub negative_knee: f64,
    pub negative_slope: f64,
    pub positive_knee: f64,
    pub positive_origin: f64,
    pub positive_slope: f64,
    pub ceiling_rpm: f64,
}

impl Default for BidirectionalCurve {
    fn default() -> Self {
        Self {
            negative_knee: 1033.0,
            negative_slope: 500.0 / 217.0,
            positive_knee: 1200.0,
            positive_origin: 1090.0,
            positive_slope: 200.0 / 119.0,
            ceiling_rpm: 2000.0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MotorConfig {
    pub stator_resistance: f64,
    pub d_inductance: f64,
    pub q_inductance: f64,
    pub flux_linkage: f64,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            stator_resistance: 0.72,
            d_inductance: 0.0012,
            q_inductance: 0.0012,
            flux_linkage: 0.01,
        }
    }
}

impl Config {
    /// Rejects settings the pipeline cannot run with. Sensor-level oddities
    /// (unknown tags, missing edges) are handled at runtime instead.
    pub fn validate(&self) -> Result<()> {
        let b = &self.buffers;
        for (name, len, display) in [
            ("analog", b.analog_len, b.analog_display_len),
            ("hall", b.hall_len, b.hall_display_len),
            ("encoder", b.encoder_len, b.encoder_display_len),
        ] {
            if len < 4 {
                return Err(invalid(format!("{} buffer needs at least 4 samples", name)));
            }
            if display == 0 || display > len {
                return Err(invalid(format!(
                    "{} display length {} must be within 1..={}",
                    name, display, len
                )));
            }
        }
        if b.history_len == 0 {
            return Err(invalid("history buffer length must be non-zero".to_string()));
        }

        if self.bus.frame_len < 3 {
            return Err(invalid("bus frame must hold at least one sub-word".to_string()));
        }
        for slot in &self.bus.slots {
            if slot.byte_offset >= self.bus.frame_len {
                return Err(invalid(format!(
                    "{:?} slot offset {} lies outside the {}-byte frame",
                    slot.channel, slot.byte_offset, self.bus.frame_len
                )));
            }
            if slot.tags.is_empty() {
                return Err(invalid(format!("{:?} slot accepts no tags", slot.channel)));
            }
            if let Some(tag) = slot.tags.iter().find(|&&tag| tag > 0x0F) {
                return Err(invalid(format!(
                    "{:?} slot tag {} does not fit in 4 bits",
                    slot.channel, tag
                )));
            }
        }

        let l = &self.lines;
        let highest_line = [
            l.hall_a,
            l.hall_b,
            l.hall_c,
            l.encoder_a,
            l.encoder_b,
            l.encoder_index,
            l.reference_mode,
        ]
        .into_iter()
        .max()
        .unwrap_or(0);
        if highest_line >= 64 {
            return Err(invalid(format!("line {} is out of range", highest_line)));
        }

        let e = &self.estimator;
        if e.cutoff_multiple <= 0.0
            || e.max_normalized_cutoff <= 0.0
            || e.max_normalized_cutoff >= 1.0
        {
            return Err(invalid(
                "cutoff multiple must be positive and the max cutoff within (0, 1)".to_string(),
            ));
        }

        let s = &self.speed;
        if s.jitter_min >= s.jitter_max {
            return Err(invalid("jitter range is empty".to_string()));
        }
        if s.rpm_per_hz <= 0.0 || s.ceiling_rpm <= 0.0 || s.hall_ceiling_rpm > s.hall_glitch_rpm {
            return Err(invalid("speed limits are inconsistent".to_string()));
        }

        Ok(())
    }
}

fn invalid(message: String) -> PipelineError {
    PipelineError::InvalidConfig(message)
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let config_str = fs::read_to_string(path)?;
    let config: Config = serde_yaml::from_str(&config_str)?;
    config.validate()?;
    Ok(config)
}

pub fn save_config<P: AsRef<Path>>(config: &Config, path: P) -> Result<()> {
    let yaml = serde_yaml::to_string(config)?;
    fs::write(path, yaml)?;
    Ok(())
}

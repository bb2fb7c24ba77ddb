use super::sequence::PhaseSequence;
use crate::config::{ReferenceSpeedConfig, SpeedConfig};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Offset added to a saturated speed so the clamp is not a flat line.
pub trait JitterSource: Send {
    fn sample(&mut self) -> f64;
}

/// Uniform integer jitter in `low..high`.
pub struct UniformJitter {
    rng: StdRng,
    low: i32,
    high: i32,
}

impl UniformJitter {
    pub fn new(low: i32, high: i32, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng, low, high }
    }

    pub fn from_config(config: &SpeedConfig, seed: Option<u64>) -> Self {
        Self::new(config.jitter_min, config.jitter_max, seed)
    }
}

impl JitterSource for UniformJitter {
    fn sample(&mut self) -> f64 {
        if self.low >= self.high {
            return 0.0;
        }
        f64::from(self.rng.gen_range(self.low..self.high))
    }
}

/// Always zero; makes saturation deterministic.
pub struct NoJitter;

impl JitterSource for NoJitter {
    fn sample(&mut self) -> f64 {
        0.0
    }
}

/// Which estimator produced a speed sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeedSource {
    #[default]
    Hall,
    Spectral,
}

/// Hard cutover between the spectral speed and the Hall edge speed.
#[derive(Debug, Clone)]
pub struct SpeedFusion {
    rpm_per_hz: f64,
    confidence_rpm: f64,
    ceiling_rpm: f64,
}

impl SpeedFusion {
    pub fn new(config: &SpeedConfig) -> Self {
        Self {
            rpm_per_hz: config.rpm_per_hz,
            confidence_rpm: config.confidence_rpm,
            ceiling_rpm: config.ceiling_rpm,
        }
    }

    /// Signed rpm for the pass. The spectral speed is used once its magnitude
    /// reaches the confidence threshold and is capped at the jittered ceiling
    /// in either direction.
    pub fn fuse(
        &self,
        frequency: f64,
        sequence: PhaseSequence,
        hall_rpm: f64,
        jitter: &mut dyn JitterSource,
    ) -> (f64, SpeedSource) {
        let magnitude = frequency.abs() * self.rpm_per_hz;
        if magnitude < self.confidence_rpm {
            return (hall_rpm, SpeedSource::Hall);
        }

        let ceiling = self.ceiling_rpm + jitter.sample();
        (sequence.sign() * magnitude.min(ceiling), SpeedSource::Spectral)
    }
}

/// Calibration curve selected by the reference-mode line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceMode {
    Unidirectional,
    #[default]
    Bidirectional,
}

impl ReferenceMode {
    pub fn from_line(high: bool) -> Self {
        if high {
            ReferenceMode::Unidirectional
        } else {
            ReferenceMode::Bidirectional
        }
    }
}

/// Maps the commanded reference count to rpm.
#[derive(Debug, Clone)]
pub struct ReferenceSpeedMapper {
    config: ReferenceSpeedConfig,
}

impl ReferenceSpeedMapper {
    pub fn new(config: &ReferenceSpeedConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn map(&self, raw: f64, mode: ReferenceMode, jitter: &mut dyn JitterSource) -> f64 {
        match mode {
            ReferenceMode::Unidirectional => {
                let curve = &self.config.unidirectional;
                let rpm = if raw > curve.knee {
                    curve.slope * (raw - curve.knee) + curve.base_rpm
                } else {
                    0.0
                };
                if rpm > curve.ceiling_rpm {
                    curve.ceiling_rpm + jitter.sample()
                } else {
                    rpm
                }
            }
            ReferenceMode::Bidirectional => {
                let curve = &self.config.bidirectional;
                let mut rpm = 0.0;
                if raw < curve.negative_knee {
                    rpm += curve.negative_slope * (raw - curve.negative_knee);
                }
                if raw > curve.positive_knee {
                    rpm += curve.positive_slope * (raw - curve.positive_origin);
                }

                if rpm > curve.ceiling_rpm {
                    curve.ceiling_rpm + jitter.sample()
                } else if rpm < -curve.ceiling_rpm {
                    -curve.ceiling_rpm - jitter.sample()
                } else {
                    rpm
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(f64);

    impl JitterSource for Fixed {
        fn sample(&mut self) -> f64 {
            self.0
        }
    }

    fn fusion() -> SpeedFusion {
        SpeedFusion::new(&SpeedConfig::default())
    }

    #[test]
    fn forty_hertz_uses_spectral_speed() {
        let (rpm, source) = fusion().fuse(40.0, PhaseSequence::Positive, 123.0, &mut NoJitter);
        assert_eq!(source, SpeedSource::Spectral);
        assert!((rpm - 40.0 * 15.77).abs() < 1e-9);
    }

    #[test]
    fn low_frequency_falls_back_to_hall() {
        let (rpm, source) = fusion().fuse(0.0, PhaseSequence::Positive, -812.5, &mut NoJitter);
        assert_eq!(source, SpeedSource::Hall);
        assert_eq!(rpm, -812.5);

        let (_, source) = fusion().fuse(31.0, PhaseSequence::Positive, 0.0, &mut NoJitter);
        assert_eq!(source, SpeedSource::Hall);
    }

    #[test]
    fn negative_sequence_flips_sign() {
        let (rpm, _) = fusion().fuse(40.0, PhaseSequence::Negative, 0.0, &mut NoJitter);
        assert!((rpm + 40.0 * 15.77).abs() < 1e-9);
    }

    #[test]
    fn saturation_is_symmetric_and_jittered() {
        let (rpm, _) = fusion().fuse(400.0, PhaseSequence::Positive, 0.0, &mut Fixed(7.0));
        assert_eq!(rpm, 3507.0);
        let (rpm, _) = fusion().fuse(400.0, PhaseSequence::Negative, 0.0, &mut NoJitter);
        assert_eq!(rpm, -3500.0);
    }

    #[test]
    fn seeded_jitter_is_reproducible_and_bounded() {
        let mut a = UniformJitter::new(-5, 11, Some(42));
        let mut b = UniformJitter::new(-5, 11, Some(42));
        for _ in 0..200 {
            let x = a.sample();
            assert_eq!(x, b.sample());
            assert!((-5.0..11.0).contains(&x));
            assert_eq!(x.fract(), 0.0);
        }
    }

    #[test]
    fn unidirectional_curve() {
        let mapper = ReferenceSpeedMapper::new(&ReferenceSpeedConfig::default());
        let mode = ReferenceMode::from_line(true);
        assert_eq!(mapper.map(100.0, mode, &mut NoJitter), 0.0);
        assert!((mapper.map(271.0, mode, &mut NoJitter) - 275.0).abs() < 1e-9);
        assert_eq!(mapper.map(4000.0, mode, &mut Fixed(-3.0)), 3497.0);
    }

    #[test]
    fn bidirectional_curve() {
        let mapper = ReferenceSpeedMapper::new(&ReferenceSpeedConfig::default());
        let mode = ReferenceMode::from_line(false);
        // Dead band between the knees.
        assert_eq!(mapper.map(1100.0, mode, &mut NoJitter), 0.0);
        assert!((mapper.map(816.0, mode, &mut NoJitter) + 500.0).abs() < 1e-9);
        assert!((mapper.map(1209.0, mode, &mut NoJitter) - 200.0).abs() < 1e-9);
        assert_eq!(mapper.map(4095.0, mode, &mut Fixed(4.0)), 2004.0);
        assert_eq!(mapper.map(0.0, mode, &mut Fixed(4.0)), -2004.0);
    }
}

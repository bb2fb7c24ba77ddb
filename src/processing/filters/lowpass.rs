use super::FilterInstance;

use std::f64::consts::PI;

/// Quality factors of the two sections of a 4th-order Butterworth low-pass.
const BUTTERWORTH_Q: [f64; 2] = [0.541_196_100_146_197, 1.306_562_964_876_377];

/// Direct-form I biquad section.
#[derive(Debug, Clone)]
pub struct SecondOrderFilter {
    a: [f64; 3],
    b: [f64; 3],
    x: [f64; 2],
    y: [f64; 2],
}

impl SecondOrderFilter {
    /// Low-pass section with its corner at `normalized_cutoff` (1.0 = Nyquist).
    pub fn low_pass(normalized_cutoff: f64, q: f64) -> Self {
        let omega = PI * normalized_cutoff;
        let alpha = f64::sin(omega) / (2.0 * q);
        let cos = f64::cos(omega);

        SecondOrderFilter {
            a: [1.0 + alpha, -2.0 * cos, 1.0 - alpha],
            b: [(1.0 - cos) / 2.0, 1.0 - cos, (1.0 - cos) / 2.0],
            x: [0.0, 0.0],
            y: [0.0, 0.0],
        }
    }

    /// Gain at DC, used to settle the output history.
    fn dc_gain(&self) -> f64 {
        (self.b[0] + self.b[1] + self.b[2]) / (self.a[0] + self.a[1] + self.a[2])
    }
}

impl FilterInstance for SecondOrderFilter {
    fn process_sample(&mut self, input: f64) -> f64 {
        let output = (self.b[0] / self.a[0]) * input
            + (self.b[1] / self.a[0]) * self.x[0]
            + (self.b[2] / self.a[0]) * self.x[1]
            - (self.a[1] / self.a[0]) * self.y[0]
            - (self.a[2] / self.a[0]) * self.y[1];

        self.x[1] = self.x[0];
        self.x[0] = input;
        self.y[1] = self.y[0];
        self.y[0] = output;

        output
    }

    fn settle(&mut self, value: f64) {
        let output = value * self.dc_gain();
        self.x = [value, value];
        self.y = [output, output];
    }
}

/// 4th-order Butterworth low-pass as two cascaded biquads.
#[derive(Debug, Clone)]
pub struct LowPassFilter {
    sections: [SecondOrderFilter; 2],
}

impl LowPassFilter {
    pub fn butterworth(normalized_cutoff: f64) -> Self {
        Self {
            sections: BUTTERWORTH_Q.map(|q| SecondOrderFilter::low_pass(normalized_cutoff, q)),
        }
    }
}

impl FilterInstance for LowPassFilter {
    fn process_sample(&mut self, input: f64) -> f64 {
        self.sections
            .iter_mut()
            .fold(input, |sample, section| section.process_sample(sample))
    }

    fn settle(&mut self, value: f64) {
        let mut level = value;
        for section in self.sections.iter_mut() {
            section.settle(level);
            level *= section.dc_gain();
        }
    }
}

/// Cutoff tracking the fundamental: `multiple * frequency / sample_rate`,
/// capped at `max`. Both this and `max` are fractions of Nyquist.
pub fn normalized_cutoff(frequency: f64, sample_rate: f64, multiple: f64, max: f64) -> f64 {
    (multiple * frequency / sample_rate).min(max)
}

use super::mean;

use std::f64::consts::PI;

const THIRD_TURN: f64 = 2.0 * PI / 3.0;

/// One rotating-frame sample.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Dq0 {
    pub d: f64,
    pub q: f64,
    pub zero: f64,
}

impl Dq0 {
    pub fn scaled(self, factor: f64) -> Self {
        Self {
            d: self.d * factor,
            q: self.q * factor,
            zero: self.zero * factor,
        }
    }
}

/// Projects phases `a`, `b`, `c` onto the frame at electrical angle `theta`.
pub fn park_sample(a: f64, b: f64, c: f64, theta: f64) -> Dq0 {
    Dq0 {
        d: 2.0 / 3.0
            * (theta.cos() * a + (theta - THIRD_TURN).cos() * b + (theta + THIRD_TURN).cos() * c),
        q: -2.0 / 3.0
            * (theta.sin() * a + (theta - THIRD_TURN).sin() * b + (theta + THIRD_TURN).sin() * c),
        zero: a + b + c,
    }
}

/// d, q and zero-sequence values over a window.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dq0Series {
    pub d: Vec<f64>,
    pub q: Vec<f64>,
    pub zero: Vec<f64>,
}

impl Dq0Series {
    pub fn zeros(len: usize) -> Self {
        Self {
            d: vec![0.0; len],
            q: vec![0.0; len],
            zero: vec![0.0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.d.len()
    }

    pub fn is_empty(&self) -> bool {
        self.d.is_empty()
    }

    pub fn mean(&self) -> Dq0 {
        Dq0 {
            d: mean(&self.d),
            q: mean(&self.q),
            zero: mean(&self.zero),
        }
    }

    pub fn scaled(mut self, factor: f64) -> Self {
        for series in [&mut self.d, &mut self.q, &mut self.zero] {
            series.iter_mut().for_each(|x| *x *= factor);
        }
        self
    }
}

/// Park transform of a window at `signed_frequency` Hz. The angle starts at
/// zero on the window's first timestamp.
pub fn park_series(
    a: &[f64],
    b: &[f64],
    c: &[f64],
    times: &[f64],
    signed_frequency: f64,
) -> Dq0Series {
    let len = a.len().min(b.len()).min(c.len()).min(times.len());
    let origin = times.first().copied().unwrap_or(0.0);

    let mut series = Dq0Series {
        d: Vec::with_capacity(len),
        q: Vec::with_capacity(len),
        zero: Vec::with_capacity(len),
    };
    for k in 0..len {
        let theta = 2.0 * PI * signed_frequency * (times[k] - origin);
        let sample = park_sample(a[k], b[k], c[k], theta);
        series.d.push(sample.d);
        series.q.push(sample.q);
        series.zero.push(sample.zero);
    }
    series
}

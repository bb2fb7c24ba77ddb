use super::park::Dq0;
use crate::config::MotorConfig;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl std::ops::Add for Point2 {
    type Output = Point2;

    fn add(self, other: Point2) -> Point2 {
        Point2::new(self.x + other.x, self.y + other.y)
    }
}

/// Endpoints of the dq-frame voltage equation terms. The stator-reaction,
/// cross-coupling and back-EMF vectors chain tip to tail from the origin;
/// `measured` is drawn from the origin on its own.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VectorDecomposition {
    pub stator_reaction: Point2,
    pub cross_coupling: Point2,
    pub back_emf: Point2,
    pub measured: Point2,
}

/// `omega` is the signed electrical angular frequency in rad/s.
pub fn decompose(
    voltage: Dq0,
    current: Dq0,
    omega: f64,
    motor: &MotorConfig,
) -> VectorDecomposition {
    let stator_reaction = Point2::new(
        motor.stator_resistance * current.d,
        motor.stator_resistance * current.q,
    );
    let cross_coupling = stator_reaction
        + Point2::new(
            -omega * motor.q_inductance * current.q,
            omega * motor.d_inductance * current.d,
        );
    let back_emf = cross_coupling + Point2::new(0.0, omega * motor.flux_linkage);

    VectorDecomposition {
        stator_reaction,
        cross_coupling,
        back_emf,
        measured: Point2::new(voltage.d, voltage.q),
    }
}

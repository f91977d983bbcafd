use crate::error::{Error, Result};

/// Fixed spatial dimension (3D).
pub const DIM: usize = 3;

/// A 3-component vector.
pub type Vec3 = [f64; DIM];

/// One atom of the simulated system.
///
/// Fields:
/// - `mass`: atomic mass [amu] (> 0, never changes after creation)
/// - `position`: coordinates [Å]
/// - `velocity`: [Å/ps]
/// - `acceleration`: [Å/ps²]
/// - `prev_position`, `prev_velocity`, `prev_acceleration`: value each
///   quantity held immediately before its last overwrite
///
/// The previous-value fields carry exactly one level of history; they feed
/// the half-staggered kinetic energy and trial rollback, and are snapshotted
/// by the kinematic primitives in [`crate::core::system::System`].
#[derive(Debug, Clone)]
pub struct Particle {
    /// Atomic mass [amu] (> 0).
    pub mass: f64,
    /// Position (x, y, z) [Å].
    pub position: Vec3,
    /// Velocity [Å/ps].
    pub velocity: Vec3,
    /// Acceleration [Å/ps²].
    pub acceleration: Vec3,
    /// Position before the most recent position update.
    pub prev_position: Vec3,
    /// Velocity before the most recent velocity update.
    pub prev_velocity: Vec3,
    /// Acceleration before the most recent acceleration update.
    pub prev_acceleration: Vec3,
}

impl Particle {
    /// Create a particle at rest after validating invariants.
    ///
    /// Errors:
    /// - `Error::InvalidConfig` if `mass` is non-positive or any component
    ///   is NaN/inf.
    pub fn new(mass: f64, position: Vec3) -> Result<Self> {
        Self::with_velocity(mass, position, [0.0; DIM])
    }

    /// Create a particle with an explicit initial velocity.
    pub fn with_velocity(mass: f64, position: Vec3, velocity: Vec3) -> Result<Self> {
        if !mass.is_finite() || mass <= 0.0 {
            return Err(Error::InvalidConfig("mass must be finite and > 0".into()));
        }
        if !position.iter().all(|x| x.is_finite()) {
            return Err(Error::InvalidConfig("position must be finite".into()));
        }
        if !velocity.iter().all(|x| x.is_finite()) {
            return Err(Error::InvalidConfig("velocity must be finite".into()));
        }
        Ok(Self {
            mass,
            position,
            velocity,
            acceleration: [0.0; DIM],
            prev_position: position,
            prev_velocity: velocity,
            prev_acceleration: [0.0; DIM],
        })
    }

    /// Kinetic energy 1/2 m |v|² in native units [amu·Å²/ps²].
    #[inline]
    pub fn kinetic_energy(&self) -> f64 {
        let vsq: f64 = self.velocity.iter().map(|&c| c * c).sum();
        0.5 * self.mass * vsq
    }
}

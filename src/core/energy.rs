use crate::core::particle::{Vec3, DIM};
use crate::core::system::System;
use crate::error::Result;

/// Gas constant R [amu·Å²/(ps²·K)].
pub const R_GAS: f64 = 0.831_445_98;

/// Conversion from gradient units [kcal/(mol·Å·amu)] to acceleration [Å/ps²],
/// equivalently from raw kinetic energy [amu·Å²/ps²] to [kcal/mol].
pub const ACC_CONV: f64 = 418.4;

/// Boltzmann constant [kcal/(mol·K)].
pub const K_B: f64 = 1.987_204e-3;

/// How kinetic energy is derived from the stored velocities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KineticMode {
    /// Velocities are synchronized with positions.
    Standard,
    /// Velocities are staggered half a step ahead of positions; the
    /// position-time value is the average of the current and previous
    /// velocities.
    Leapfrog,
}

/// One energy-model evaluation of the current configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnergyReport {
    /// Potential energy [kcal/mol].
    pub potential: f64,
    /// Kinetic energy [kcal/mol].
    pub kinetic: f64,
    /// Total energy [kcal/mol].
    pub total: f64,
    /// Instantaneous kinetic temperature [K].
    pub temperature: f64,
    /// Pressure [bar].
    pub pressure: f64,
}

impl EnergyReport {
    /// Assemble a report; `total` is the sum of potential and kinetic.
    pub fn new(potential: f64, kinetic: f64, temperature: f64, pressure: f64) -> Self {
        Self {
            potential,
            kinetic,
            total: potential + kinetic,
            temperature,
            pressure,
        }
    }
}

/// External collaborator that evaluates the energetics of a configuration.
///
/// The engine treats both operations as pure functions of the current
/// particle state. `evaluate` runs once per MD step and once per MC trial;
/// `gradient` runs once per MD step and never in MC. Implementors should
/// derive the velocity-dependent terms through [`kinetic_energy`] and
/// [`kinetic_temperature`] so both modes stay consistent with the
/// integrator's staggering.
pub trait EnergyModel {
    /// Evaluate energies, temperature, and pressure at the current state.
    fn evaluate(&mut self, system: &System, mode: KineticMode) -> Result<EnergyReport>;

    /// Potential-energy gradient, one 3-vector per atom [kcal/(mol·Å)].
    fn gradient(&mut self, system: &System) -> Result<Vec<Vec3>>;
}

/// Total kinetic energy of the system [kcal/mol].
pub fn kinetic_energy(system: &System, mode: KineticMode) -> f64 {
    let mut raw = 0.0;
    for p in &system.particles {
        for k in 0..DIM {
            let v = match mode {
                KineticMode::Standard => p.velocity[k],
                KineticMode::Leapfrog => 0.5 * (p.velocity[k] + p.prev_velocity[k]),
            };
            raw += 0.5 * p.mass * v * v;
        }
    }
    raw / ACC_CONV
}

/// Instantaneous kinetic temperature [K], `T = 2 E_kin / (3 N R)` with
/// `E_kin` in native units.
pub fn kinetic_temperature(system: &System, mode: KineticMode) -> f64 {
    let raw = kinetic_energy(system, mode) * ACC_CONV;
    2.0 * raw / (3.0 * system.n_atoms() as f64 * R_GAS)
}

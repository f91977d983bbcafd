//! Core propagation engine: particle state, kinematic primitives, the
//! leapfrog molecular-dynamics integrator, and the Metropolis Monte-Carlo
//! sampler.

pub mod energy;
pub mod mc;
pub mod md;
pub mod observe;
pub mod particle;
pub mod system;

pub use energy::{kinetic_energy, kinetic_temperature, EnergyModel, EnergyReport, KineticMode};
pub use mc::{metropolis_factor, McConfig, MonteCarlo};
pub use md::{MdConfig, MolecularDynamics};
pub use observe::{MemoryTrace, NullObserver, Observer, Progress, Sample, TraceRow};
pub use particle::{Particle, Vec3, DIM};
pub use system::System;

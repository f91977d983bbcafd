//! molsim: a propagation engine for multi-particle molecular systems.
//!
//! Two schemes drive the same particle state: a leapfrog molecular-dynamics
//! integrator with on-the-fly thermal equilibration, and a Metropolis
//! Monte-Carlo sampler with adaptive trial-displacement control. Potential
//! energy and its gradient come from an external [`core::EnergyModel`];
//! trajectory and energy output go through [`core::Observer`] hooks.

pub mod core;
pub mod error;

#[cfg(feature = "python")]
mod python;

use crate::core::energy::{EnergyModel, EnergyReport, KineticMode, R_GAS};
use crate::core::observe::{Observer, Progress, Sample};
use crate::core::particle::DIM;
use crate::core::system::System;
use crate::error::{Error, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

/// Simulated time starts a hair above zero so the accumulated `time += dt`
/// sum cannot round below `total_time` on the final comparison and run an
/// extra step.
const TIME_ORIGIN: f64 = 1.0e-10;

/// Molecular-dynamics run parameters.
#[derive(Debug, Clone)]
pub struct MdConfig {
    /// Propagation increment [ps].
    pub time_step: f64,
    /// Total simulated time [ps].
    pub total_time: f64,
    /// Desired temperature [K]; zero skips velocity initialization.
    pub target_temperature: f64,
    /// Pressure set-point [bar]; reported alongside output, not regulated.
    pub target_pressure: f64,
    /// Length of the thermal-equilibration window [ps].
    pub equilibration_time: f64,
    /// Equilibration rate constant [ps]; smaller pulls harder.
    pub equilibration_rate: f64,
    /// Seed for the run's random draws; `None` for nondeterministic.
    pub seed: Option<u64>,
}

impl Default for MdConfig {
    fn default() -> Self {
        Self {
            time_step: 0.001,
            total_time: 1.0,
            target_temperature: 298.15,
            target_pressure: 1.0,
            equilibration_time: 0.0,
            equilibration_rate: 2.0,
            seed: None,
        }
    }
}

impl MdConfig {
    fn validate(&self) -> Result<()> {
        if !self.time_step.is_finite() || self.time_step <= 0.0 {
            return Err(Error::InvalidConfig("time_step must be finite and > 0".into()));
        }
        if !self.total_time.is_finite() || self.total_time <= 0.0 {
            return Err(Error::InvalidConfig("total_time must be finite and > 0".into()));
        }
        if !self.target_temperature.is_finite() || self.target_temperature < 0.0 {
            return Err(Error::InvalidConfig(
                "target_temperature must be finite and >= 0".into(),
            ));
        }
        if !self.target_pressure.is_finite() {
            return Err(Error::InvalidConfig("target_pressure must be finite".into()));
        }
        if !self.equilibration_time.is_finite() || self.equilibration_time < 0.0 {
            return Err(Error::InvalidConfig(
                "equilibration_time must be finite and >= 0".into(),
            ));
        }
        if !self.equilibration_rate.is_finite() || self.equilibration_rate <= 0.0 {
            return Err(Error::InvalidConfig(
                "equilibration_rate must be finite and > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Leapfrog molecular-dynamics driver.
///
/// Owns the particle state, the external energy model, the output observer,
/// and a seeded generator; one call to [`run`](Self::run) propagates the
/// system from rest (or a Maxwell–Boltzmann start) to `total_time`.
#[derive(Debug)]
pub struct MolecularDynamics<E, O> {
    system: System,
    config: MdConfig,
    model: E,
    observer: O,
    rng: StdRng,
    time: f64,
    /// Exponential moving average of the kinetic temperature.
    etemp: f64,
    last: EnergyReport,
}

impl<E: EnergyModel, O: Observer> MolecularDynamics<E, O> {
    /// Create a driver after validating the configuration.
    pub fn new(system: System, config: MdConfig, model: E, observer: O) -> Result<Self> {
        config.validate()?;
        let rng: StdRng = match config.seed {
            Some(s) => SeedableRng::seed_from_u64(s),
            None => SeedableRng::seed_from_u64(rand::rng().random()),
        };
        let etemp = config.target_temperature;
        Ok(Self {
            system,
            config,
            model,
            observer,
            rng,
            time: TIME_ORIGIN,
            etemp,
            last: EnergyReport::default(),
        })
    }

    /// Run the full trajectory.
    ///
    /// The observer's `finish` hook runs exactly once, whether propagation
    /// completes or fails, so partial output is never lost.
    pub fn run(&mut self) -> Result<()> {
        let outcome = self.propagate();
        let flushed = self.observer.finish();
        outcome.and(flushed)
    }

    /// Current particle state.
    pub fn system(&self) -> &System {
        &self.system
    }

    /// The observer, for retrieving collected output.
    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Elapsed simulated time [ps].
    pub fn simulated_time(&self) -> f64 {
        self.time
    }

    /// Running mean temperature of the equilibration window [K].
    pub fn running_mean_temperature(&self) -> f64 {
        self.etemp
    }

    /// Consume the driver, releasing the final state and observer.
    pub fn into_parts(self) -> (System, O) {
        (self.system, self.observer)
    }

    fn propagate(&mut self) -> Result<()> {
        let dt = self.config.time_step;

        self.initialize_velocities()?;
        self.last = self.model.evaluate(&self.system, KineticMode::Standard)?;
        let gradient = self.model.gradient(&self.system)?;
        self.system.update_accelerations(&gradient)?;
        self.record(true)?;
        // Half step once; every later velocity update is a full step, which
        // keeps velocities staggered half a step ahead of positions.
        self.system.update_velocities(0.5 * dt)?;

        while self.time < self.config.total_time {
            self.system.update_positions(dt, 1.0, 0.0)?;
            let gradient = self.model.gradient(&self.system)?;
            self.system.update_accelerations(&gradient)?;
            self.system.update_velocities(dt)?;
            self.last = self.model.evaluate(&self.system, KineticMode::Leapfrog)?;
            if self.time < self.config.equilibration_time {
                self.equilibrate_temperature()?;
            }
            self.record(false)?;
            self.time += dt;
        }

        self.record(true)
    }

    /// Assign Maxwell–Boltzmann velocities at the target temperature, then
    /// rescale so the model's instantaneous temperature matches it exactly.
    ///
    /// A zero target leaves the velocities untouched.
    fn initialize_velocities(&mut self) -> Result<()> {
        let temp = self.config.target_temperature;
        if temp <= 0.0 {
            return Ok(());
        }
        self.etemp = temp;
        for p in &mut self.system.particles {
            let sigma = (2.0 * R_GAS * temp / (3.0 * p.mass)).sqrt();
            let normal = Normal::new(0.0, sigma)
                .map_err(|e| Error::InvalidConfig(format!("velocity distribution: {e}")))?;
            for k in 0..DIM {
                p.velocity[k] = normal.sample(&mut self.rng);
            }
        }
        let report = self.model.evaluate(&self.system, KineticMode::Standard)?;
        if !(report.temperature > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "instantaneous temperature must be positive after velocity assignment, got {}",
                report.temperature
            )));
        }
        self.system.scale_velocities((temp / report.temperature).sqrt());
        Ok(())
    }

    /// Pull the kinetic temperature toward the target by scaling velocities
    /// against an exponential moving average of the model's readings.
    fn equilibrate_temperature(&mut self) -> Result<()> {
        let dt = self.config.time_step;
        let tweight = 10.0 * dt;
        self.etemp = (self.etemp + tweight * self.last.temperature) / (1.0 + tweight);
        if !(self.etemp > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "running mean temperature must stay positive, got {}",
                self.etemp
            )));
        }
        let tscale = dt / self.config.equilibration_rate;
        let scale = 1.0 + tscale * ((self.config.target_temperature / self.etemp).sqrt() - 1.0);
        self.system.scale_velocities(scale);
        Ok(())
    }

    fn record(&mut self, forced: bool) -> Result<()> {
        self.observer.record(&Sample {
            system: &self.system,
            energies: &self.last,
            progress: Progress::Time(self.time),
            forced,
        })
    }
}

use crate::core::energy::{EnergyModel, EnergyReport, KineticMode, K_B};
use crate::core::observe::{Observer, Progress, Sample};
use crate::core::particle::{Vec3, DIM};
use crate::core::system::System;
use crate::error::{Error, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

/// Metropolis acceptance factor `exp(min(1, -ΔE / (K_B · T)))`.
///
/// The clamp sits on the exponent, not the probability, so the factor
/// saturates at `e` for strongly downhill moves and crosses 1 exactly at
/// `ΔE = 0`. Any factor >= 1 accepts unconditionally against a uniform
/// draw in [0, 1).
pub fn metropolis_factor(delta_e: f64, temperature: f64) -> f64 {
    (-delta_e / (K_B * temperature)).min(1.0).exp()
}

/// Metropolis Monte-Carlo run parameters.
#[derive(Debug, Clone)]
pub struct McConfig {
    /// Number of accepted configurations to collect.
    pub total_configurations: u64,
    /// Sampling temperature [K] (> 0).
    pub temperature: f64,
    /// Pressure set-point [bar]; reported alongside output, not regulated.
    pub target_pressure: f64,
    /// Initial standard deviation of per-component trial moves [Å].
    pub displacement_magnitude: f64,
    /// Responsiveness of the adaptive magnitude controller.
    pub displacement_growth_rate: f64,
    /// Trials (accepted or rejected) between controller invocations.
    pub displacement_update_interval: u64,
    /// Seed for the run's random draws; `None` for nondeterministic.
    pub seed: Option<u64>,
}

impl Default for McConfig {
    fn default() -> Self {
        Self {
            total_configurations: 1000,
            temperature: 298.15,
            target_pressure: 1.0,
            displacement_magnitude: 0.1,
            displacement_growth_rate: std::f64::consts::LN_2,
            displacement_update_interval: 100,
            seed: None,
        }
    }
}

impl McConfig {
    fn validate(&self) -> Result<()> {
        if !self.temperature.is_finite() || self.temperature <= 0.0 {
            return Err(Error::InvalidConfig("temperature must be finite and > 0".into()));
        }
        if !self.target_pressure.is_finite() {
            return Err(Error::InvalidConfig("target_pressure must be finite".into()));
        }
        if !self.displacement_magnitude.is_finite() || self.displacement_magnitude <= 0.0 {
            return Err(Error::InvalidConfig(
                "displacement_magnitude must be finite and > 0".into(),
            ));
        }
        if !self.displacement_growth_rate.is_finite() || self.displacement_growth_rate <= 0.0 {
            return Err(Error::InvalidConfig(
                "displacement_growth_rate must be finite and > 0".into(),
            ));
        }
        if self.displacement_update_interval == 0 {
            return Err(Error::InvalidConfig(
                "displacement_update_interval must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

/// Metropolis Monte-Carlo driver.
///
/// Samples the configuration space of the particle system at a fixed
/// temperature, steering its trial-displacement magnitude toward a 50%
/// acceptance ratio. Velocities play no role and are zeroed at start.
#[derive(Debug)]
pub struct MonteCarlo<E, O> {
    system: System,
    config: McConfig,
    model: E,
    observer: O,
    rng: StdRng,
    configuration: u64,
    /// Accepted/rejected counts over the current controller window.
    n_accept: u64,
    n_reject: u64,
    /// Live trial-move standard deviation [Å].
    dispmag: f64,
    trials_since_update: u64,
    trials: u64,
    last: EnergyReport,
}

impl<E: EnergyModel, O: Observer> MonteCarlo<E, O> {
    /// Create a driver after validating the configuration.
    pub fn new(system: System, config: McConfig, model: E, observer: O) -> Result<Self> {
        config.validate()?;
        let rng: StdRng = match config.seed {
            Some(s) => SeedableRng::seed_from_u64(s),
            None => SeedableRng::seed_from_u64(rand::rng().random()),
        };
        let dispmag = config.displacement_magnitude;
        Ok(Self {
            system,
            config,
            model,
            observer,
            rng,
            configuration: 0,
            n_accept: 0,
            n_reject: 0,
            dispmag,
            trials_since_update: 0,
            trials: 0,
            last: EnergyReport::default(),
        })
    }

    /// Run until `total_configurations` trials have been accepted.
    ///
    /// The observer's `finish` hook runs exactly once, whether sampling
    /// completes or fails, so partial output is never lost.
    pub fn run(&mut self) -> Result<()> {
        let outcome = self.sample();
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

    /// Accepted configurations so far.
    pub fn configurations(&self) -> u64 {
        self.configuration
    }

    /// Total trials attempted, accepted or rejected.
    pub fn trials(&self) -> u64 {
        self.trials
    }

    /// Live trial-move standard deviation [Å].
    pub fn displacement_magnitude(&self) -> f64 {
        self.dispmag
    }

    /// Consume the driver, releasing the final state and observer.
    pub fn into_parts(self) -> (System, O) {
        (self.system, self.observer)
    }

    fn sample(&mut self) -> Result<()> {
        self.system.zero_velocities();
        self.last = self.model.evaluate(&self.system, KineticMode::Standard)?;
        self.record(true)?;
        let mut previous_energy = self.last.total;

        while self.configuration < self.config.total_configurations {
            let displacement = self.trial_displacement()?;
            self.system.displace(&displacement)?;
            self.last = self.model.evaluate(&self.system, KineticMode::Standard)?;

            let delta_e = self.last.total - previous_energy;
            let factor = metropolis_factor(delta_e, self.config.temperature);
            let draw: f64 = self.rng.random();
            if factor >= draw {
                self.configuration += 1;
                self.n_accept += 1;
                previous_energy = self.last.total;
                self.record(false)?;
            } else {
                let reversal: Vec<Vec3> = displacement
                    .iter()
                    .map(|d| [-d[0], -d[1], -d[2]])
                    .collect();
                self.system.displace(&reversal)?;
                self.n_reject += 1;
            }

            self.trials += 1;
            self.trials_since_update += 1;
            if self.trials_since_update >= self.config.displacement_update_interval {
                self.retune_displacement()?;
                self.trials_since_update = 0;
            }
        }

        self.record(true)
    }

    /// Independent zero-mean Gaussian move for all 3N coordinates at the
    /// live magnitude.
    fn trial_displacement(&mut self) -> Result<Vec<Vec3>> {
        let normal = Normal::new(0.0, self.dispmag)
            .map_err(|e| Error::InvalidConfig(format!("displacement distribution: {e}")))?;
        Ok((0..self.system.n_atoms())
            .map(|_| {
                let mut d = [0.0; DIM];
                for component in &mut d {
                    *component = normal.sample(&mut self.rng);
                }
                d
            })
            .collect())
    }

    /// Steer the displacement magnitude toward a 50% acceptance ratio over
    /// the window just ended, then reset the window counters.
    ///
    /// Precondition: at least one trial since the last invocation. The run
    /// loop guarantees this because the cadence interval is >= 1; a zero
    /// window is a degenerate ratio and fails rather than dividing by zero.
    fn retune_displacement(&mut self) -> Result<()> {
        let window = self.n_accept + self.n_reject;
        if window == 0 {
            return Err(Error::InvalidConfig(
                "displacement update requires at least one trial in the window".into(),
            ));
        }
        let p_accept = self.n_accept as f64 / window as f64;
        self.n_accept = 0;
        self.n_reject = 0;
        self.dispmag *= (2.0 * self.config.displacement_growth_rate * (p_accept - 0.5)).exp();
        Ok(())
    }

    fn record(&mut self, forced: bool) -> Result<()> {
        self.observer.record(&Sample {
            system: &self.system,
            energies: &self.last,
            progress: Progress::Configurations(self.configuration),
            forced,
        })
    }
}

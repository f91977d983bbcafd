use molsim::core::{
    kinetic_energy, kinetic_temperature, EnergyModel, EnergyReport, KineticMode, MdConfig,
    MemoryTrace, MolecularDynamics, Particle, Progress, System, Vec3, DIM,
};
use molsim::core::energy::ACC_CONV;
use molsim::error::{Error, Result};

/// Uniform field: constant gradient `g` along x for every atom.
struct ConstantForce {
    g: f64,
}

impl EnergyModel for ConstantForce {
    fn evaluate(&mut self, system: &System, mode: KineticMode) -> Result<EnergyReport> {
        let potential = system
            .particles
            .iter()
            .map(|p| self.g * p.position[0])
            .sum();
        Ok(EnergyReport::new(
            potential,
            kinetic_energy(system, mode),
            kinetic_temperature(system, mode),
            0.0,
        ))
    }

    fn gradient(&mut self, system: &System) -> Result<Vec<Vec3>> {
        Ok(vec![[self.g, 0.0, 0.0]; system.n_atoms()])
    }
}

/// Field-free system: zero potential and zero gradient everywhere.
struct Free;

impl EnergyModel for Free {
    fn evaluate(&mut self, system: &System, mode: KineticMode) -> Result<EnergyReport> {
        Ok(EnergyReport::new(
            0.0,
            kinetic_energy(system, mode),
            kinetic_temperature(system, mode),
            0.0,
        ))
    }

    fn gradient(&mut self, system: &System) -> Result<Vec<Vec3>> {
        Ok(vec![[0.0; DIM]; system.n_atoms()])
    }
}

/// Isotropic harmonic well centered at the origin, `U = k/2 · Σ|r|²`.
struct Harmonic {
    k: f64,
}

impl EnergyModel for Harmonic {
    fn evaluate(&mut self, system: &System, mode: KineticMode) -> Result<EnergyReport> {
        let potential = system
            .particles
            .iter()
            .map(|p| 0.5 * self.k * p.position.iter().map(|x| x * x).sum::<f64>())
            .sum();
        Ok(EnergyReport::new(
            potential,
            kinetic_energy(system, mode),
            kinetic_temperature(system, mode),
            0.0,
        ))
    }

    fn gradient(&mut self, system: &System) -> Result<Vec<Vec3>> {
        Ok(system
            .particles
            .iter()
            .map(|p| {
                let mut g = [0.0; DIM];
                for k in 0..DIM {
                    g[k] = self.k * p.position[k];
                }
                g
            })
            .collect())
    }
}

/// Model whose gradient fails on the `fail_at`-th call.
struct FailingGradient {
    calls: usize,
    fail_at: usize,
}

impl EnergyModel for FailingGradient {
    fn evaluate(&mut self, system: &System, mode: KineticMode) -> Result<EnergyReport> {
        Ok(EnergyReport::new(
            0.0,
            kinetic_energy(system, mode),
            kinetic_temperature(system, mode),
            0.0,
        ))
    }

    fn gradient(&mut self, system: &System) -> Result<Vec<Vec3>> {
        self.calls += 1;
        if self.calls >= self.fail_at {
            return Err(Error::EnergyModel("singular geometry".to_string()));
        }
        Ok(vec![[0.0; DIM]; system.n_atoms()])
    }
}

fn progress_time(progress: Progress) -> f64 {
    match progress {
        Progress::Time(t) => t,
        Progress::Configurations(c) => panic!("MD must report time progress, got conf {c}"),
    }
}

/// From rest under a constant force, the first stepping iteration leaves the
/// velocity at `a · 1.5 · dt` (one half step at start, then one full step)
/// and the position advanced by the half-step velocity alone.
#[test]
fn leapfrog_staggering_from_rest() -> Result<()> {
    let system = System::new(vec![Particle::new(1.0, [0.0; DIM])?])?;
    let dt = 0.001;
    let config = MdConfig {
        time_step: dt,
        total_time: dt,
        target_temperature: 0.0,
        ..MdConfig::default()
    };
    let mut md = MolecularDynamics::new(system, config, ConstantForce { g: -1.0 }, MemoryTrace::new())?;
    md.run()?;

    let a = ACC_CONV; // -ACC_CONV * g / m with g = -1, m = 1
    let p = &md.system().particles[0];
    let v_expected = a * 1.5 * dt;
    let r_expected = a * 0.5 * dt * dt;
    assert!((p.velocity[0] - v_expected).abs() / v_expected < 1e-12);
    assert!((p.position[0] - r_expected).abs() / r_expected < 1e-12);
    assert_eq!(p.velocity[1], 0.0);
    assert_eq!(p.position[2], 0.0);
    Ok(())
}

/// `total_time = 1.0` at `dt = 0.1` runs exactly 10 stepping iterations,
/// bracketed by one forced record at start and one at end.
#[test]
fn termination_runs_exact_step_count() -> Result<()> {
    let system = System::new(vec![Particle::new(1.0, [0.0; DIM])?])?;
    let config = MdConfig {
        time_step: 0.1,
        total_time: 1.0,
        target_temperature: 0.0,
        ..MdConfig::default()
    };
    let mut md = MolecularDynamics::new(system, config, Free, MemoryTrace::new())?;
    md.run()?;

    let trace = md.observer();
    assert_eq!(trace.scheduled_rows(), 10);
    assert_eq!(trace.rows.len(), 12);
    assert!(trace.rows.first().is_some_and(|r| r.forced));
    assert!(trace.rows.last().is_some_and(|r| r.forced));
    let t_end = progress_time(trace.rows.last().expect("rows present").progress);
    assert!((t_end - 1.0).abs() < 1e-6);
    Ok(())
}

/// After Maxwell–Boltzmann assignment and rescale, the model's very first
/// (standard-mode) temperature reading equals the target exactly.
#[test]
fn velocity_initialization_matches_target_temperature() -> Result<()> {
    let system = System::new(vec![
        Particle::new(1.008, [0.0, 0.0, 0.0])?,
        Particle::new(12.011, [1.0, 0.0, 0.0])?,
        Particle::new(15.999, [0.0, 1.5, 0.0])?,
    ])?;
    let target = 298.15;
    let config = MdConfig {
        time_step: 0.001,
        total_time: 0.001,
        target_temperature: target,
        seed: Some(11),
        ..MdConfig::default()
    };
    let mut md = MolecularDynamics::new(system, config, Free, MemoryTrace::new())?;
    md.run()?;

    let first = md.observer().rows.first().expect("start record present");
    assert!(first.forced);
    assert!((first.energies.temperature - target).abs() / target < 1e-9);
    Ok(())
}

/// A zero target temperature skips velocity initialization entirely; with no
/// forces acting, the pre-set velocities survive the whole run bitwise.
#[test]
fn zero_temperature_start_keeps_velocities() -> Result<()> {
    let v0 = [0.25, -0.125, 0.0625];
    let system = System::new(vec![Particle::with_velocity(4.0, [0.0; DIM], v0)?])?;
    let config = MdConfig {
        time_step: 0.01,
        total_time: 0.1,
        target_temperature: 0.0,
        seed: Some(3),
        ..MdConfig::default()
    };
    let mut md = MolecularDynamics::new(system, config, Free, MemoryTrace::new())?;
    md.run()?;
    assert_eq!(md.system().particles[0].velocity, v0);
    Ok(())
}

/// Leapfrog propagation in a harmonic well conserves total energy to tight
/// tolerance over many periods of oscillation.
#[test]
fn harmonic_energy_drift_is_bounded() -> Result<()> {
    let system = System::new(vec![Particle::new(12.0, [1.0, 0.0, 0.0])?])?;
    let config = MdConfig {
        time_step: 1.0e-4,
        total_time: 0.1,
        target_temperature: 0.0,
        ..MdConfig::default()
    };
    let mut md = MolecularDynamics::new(system, config, Harmonic { k: 1.0 }, MemoryTrace::new())?;
    md.run()?;

    let rows = &md.observer().rows;
    let e0 = rows.first().expect("rows present").energies.total;
    assert!(e0 > 0.0);
    let max_drift = rows
        .iter()
        .map(|r| ((r.energies.total - e0) / e0).abs())
        .fold(0.0, f64::max);
    assert!(
        max_drift < 1e-4,
        "relative energy drift {max_drift} too large (E0 = {e0})"
    );
    Ok(())
}

/// With a zero-temperature target and an active equilibration window, the
/// thermostat drains kinetic energy every step.
#[test]
fn equilibration_cools_toward_target() -> Result<()> {
    let system = System::new(vec![Particle::with_velocity(16.0, [0.0; DIM], [2.0, -1.0, 0.5])?])?;
    let config = MdConfig {
        time_step: 0.001,
        total_time: 0.05,
        target_temperature: 0.0,
        equilibration_time: 0.05,
        equilibration_rate: 0.01,
        ..MdConfig::default()
    };
    let mut md = MolecularDynamics::new(system, config, Free, MemoryTrace::new())?;
    md.run()?;

    let speed: f64 = md.system().particles[0]
        .velocity
        .iter()
        .map(|v| v * v)
        .sum();
    assert!(speed < 2.0 * 2.0 + 1.0 + 0.25);
    assert!(md.running_mean_temperature() > 0.0);

    let rows = &md.observer().rows;
    let t_first = rows[1].energies.temperature;
    let t_last = rows.last().expect("rows present").energies.temperature;
    assert!(t_last < t_first);
    Ok(())
}

/// Two runs with the same seed and inputs produce bitwise-identical final
/// states.
#[test]
fn fixed_seed_reproduces_trajectory() -> Result<()> {
    let run = || -> Result<(Vec<Vec3>, Vec<Vec3>)> {
        let system = System::new(vec![
            Particle::new(1.008, [0.5, 0.0, 0.0])?,
            Particle::new(15.999, [-0.5, 0.25, 0.0])?,
        ])?;
        let config = MdConfig {
            time_step: 0.001,
            total_time: 0.02,
            target_temperature: 300.0,
            seed: Some(42),
            ..MdConfig::default()
        };
        let mut md = MolecularDynamics::new(system, config, Harmonic { k: 0.5 }, MemoryTrace::new())?;
        md.run()?;
        Ok((md.system().positions(), md.system().velocities()))
    };

    let (r1, v1) = run()?;
    let (r2, v2) = run()?;
    assert_eq!(r1, r2);
    assert_eq!(v1, v2);
    Ok(())
}

/// An energy-model failure mid-run propagates to the caller, and the
/// observer is still flushed so partial output survives.
#[test]
fn model_failure_propagates_and_flushes_output() -> Result<()> {
    let system = System::new(vec![Particle::new(1.0, [0.0; DIM])?])?;
    let config = MdConfig {
        time_step: 0.001,
        total_time: 1.0,
        target_temperature: 0.0,
        ..MdConfig::default()
    };
    let model = FailingGradient { calls: 0, fail_at: 3 };
    let mut md = MolecularDynamics::new(system, config, model, MemoryTrace::new())?;

    let err = md.run().unwrap_err();
    assert!(matches!(err, Error::EnergyModel(_)));
    assert!(err.to_string().contains("singular"));

    let trace = md.observer();
    assert!(trace.finished);
    assert!(!trace.rows.is_empty());
    Ok(())
}

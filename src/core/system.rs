use crate::core::energy::ACC_CONV;
use crate::core::particle::{Particle, Vec3, DIM};
use crate::error::{Error, Result};

/// The simulated particle collection and the kinematic update primitives
/// shared by both propagation schemes.
///
/// Particle order is identity: index `i` always refers to the same physical
/// atom for the lifetime of the system. Every mutating primitive snapshots
/// the previous value of the quantity it overwrites and fails with
/// [`Error::Divergence`] if any component comes out non-finite.
#[derive(Debug, Clone)]
pub struct System {
    pub particles: Vec<Particle>,
}

impl System {
    /// Create a system from a non-empty particle collection.
    pub fn new(particles: Vec<Particle>) -> Result<Self> {
        if particles.is_empty() {
            return Err(Error::InvalidConfig(
                "system must contain at least one particle".into(),
            ));
        }
        Ok(Self { particles })
    }

    /// Number of atoms.
    pub fn n_atoms(&self) -> usize {
        self.particles.len()
    }

    /// Positions as a Vec of fixed-size arrays.
    pub fn positions(&self) -> Vec<Vec3> {
        self.particles.iter().map(|p| p.position).collect()
    }

    /// Velocities as a Vec of fixed-size arrays.
    pub fn velocities(&self) -> Vec<Vec3> {
        self.particles.iter().map(|p| p.velocity).collect()
    }

    /// Recompute accelerations from a potential-energy gradient.
    ///
    /// Force is the negated gradient; `acceleration = -ACC_CONV * g / mass`
    /// converts it to [Å/ps²]. `gradient` must hold one 3-vector per atom,
    /// in kcal/(mol·Å).
    pub fn update_accelerations(&mut self, gradient: &[Vec3]) -> Result<()> {
        if gradient.len() != self.particles.len() {
            return Err(Error::InvalidConfig(format!(
                "gradient has {} rows, system has {} particles",
                gradient.len(),
                self.particles.len()
            )));
        }
        for (i, (p, g)) in self.particles.iter_mut().zip(gradient).enumerate() {
            p.prev_acceleration = p.acceleration;
            for k in 0..DIM {
                p.acceleration[k] = -ACC_CONV * g[k] / p.mass;
            }
            check_finite(&p.acceleration, "acceleration", i)?;
        }
        Ok(())
    }

    /// Advance velocities by `v += a * dt`.
    ///
    /// The MD integrator calls this with a half step once at start and a
    /// full step every iteration after, which is what staggers velocities
    /// to half-integer times.
    pub fn update_velocities(&mut self, dt: f64) -> Result<()> {
        for (i, p) in self.particles.iter_mut().enumerate() {
            p.prev_velocity = p.velocity;
            for k in 0..DIM {
                p.velocity[k] += p.acceleration[k] * dt;
            }
            check_finite(&p.velocity, "velocity", i)?;
        }
        Ok(())
    }

    /// Advance positions by `r += v * (v_coeff * dt) + a * (a_coeff * dt²)`.
    ///
    /// Pure leapfrog passes `(1.0, 0.0)`; the coefficients exist so other
    /// integrators can reuse the primitive unchanged.
    pub fn update_positions(&mut self, dt: f64, v_coeff: f64, a_coeff: f64) -> Result<()> {
        let dv = v_coeff * dt;
        let da = a_coeff * dt * dt;
        for (i, p) in self.particles.iter_mut().enumerate() {
            p.prev_position = p.position;
            for k in 0..DIM {
                p.position[k] += p.velocity[k] * dv + p.acceleration[k] * da;
            }
            check_finite(&p.position, "position", i)?;
        }
        Ok(())
    }

    /// Displace every particle by its row of `displacement`.
    ///
    /// Applying a displacement and then its negation restores every position
    /// bitwise, which is what makes Monte-Carlo rejection drift-free.
    pub fn displace(&mut self, displacement: &[Vec3]) -> Result<()> {
        if displacement.len() != self.particles.len() {
            return Err(Error::InvalidConfig(format!(
                "displacement has {} rows, system has {} particles",
                displacement.len(),
                self.particles.len()
            )));
        }
        for (i, (p, d)) in self.particles.iter_mut().zip(displacement).enumerate() {
            p.prev_position = p.position;
            for k in 0..DIM {
                p.position[k] += d[k];
            }
            check_finite(&p.position, "position", i)?;
        }
        Ok(())
    }

    /// Set every velocity component to zero.
    pub fn zero_velocities(&mut self) {
        for p in &mut self.particles {
            p.velocity = [0.0; DIM];
        }
    }

    /// Multiply every velocity component by `factor`.
    pub fn scale_velocities(&mut self, factor: f64) {
        for p in &mut self.particles {
            for k in 0..DIM {
                p.velocity[k] *= factor;
            }
        }
    }
}

#[inline]
fn check_finite(v: &Vec3, what: &str, index: usize) -> Result<()> {
    if v.iter().all(|x| x.is_finite()) {
        Ok(())
    } else {
        Err(Error::Divergence(format!(
            "{what} of particle {index} is non-finite"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_particles() -> Result<System> {
        System::new(vec![
            Particle::new(1.0, [0.0, 0.0, 0.0])?,
            Particle::new(4.0, [1.0, 2.0, 3.0])?,
        ])
    }

    #[test]
    fn empty_system_rejected() {
        let err = System::new(Vec::new()).unwrap_err();
        assert!(err.to_string().contains("at least one"));
    }

    #[test]
    fn acceleration_from_gradient_with_snapshot() -> Result<()> {
        let mut sys = two_particles()?;
        sys.update_accelerations(&[[1.0, 0.0, 0.0], [0.0, -2.0, 0.0]])?;
        assert!((sys.particles[0].acceleration[0] + ACC_CONV).abs() < 1e-12);
        // mass 4.0 quarters the acceleration, sign flips with the gradient
        assert!((sys.particles[1].acceleration[1] - 2.0 * ACC_CONV / 4.0).abs() < 1e-12);
        assert_eq!(sys.particles[0].prev_acceleration, [0.0, 0.0, 0.0]);

        sys.update_accelerations(&[[0.0; DIM], [0.0; DIM]])?;
        assert!((sys.particles[0].prev_acceleration[0] + ACC_CONV).abs() < 1e-12);
        assert_eq!(sys.particles[0].acceleration, [0.0, 0.0, 0.0]);
        Ok(())
    }

    #[test]
    fn gradient_length_mismatch_rejected() -> Result<()> {
        let mut sys = two_particles()?;
        let err = sys.update_accelerations(&[[0.0; DIM]]).unwrap_err();
        assert!(err.to_string().contains("gradient"));
        Ok(())
    }

    #[test]
    fn velocity_and_position_updates_follow_coefficients() -> Result<()> {
        let mut sys = System::new(vec![Particle::new(2.0, [0.0; DIM])?])?;
        sys.particles[0].acceleration = [10.0, 0.0, 0.0];
        sys.update_velocities(0.5)?;
        assert_eq!(sys.particles[0].velocity, [5.0, 0.0, 0.0]);
        assert_eq!(sys.particles[0].prev_velocity, [0.0, 0.0, 0.0]);

        // v_coeff scales the velocity term, a_coeff the quadratic term
        sys.update_positions(2.0, 1.0, 0.0)?;
        assert_eq!(sys.particles[0].position, [10.0, 0.0, 0.0]);
        sys.update_positions(2.0, 0.0, 0.5)?;
        assert_eq!(sys.particles[0].prev_position, [10.0, 0.0, 0.0]);
        assert_eq!(sys.particles[0].position, [30.0, 0.0, 0.0]);
        Ok(())
    }

    #[test]
    fn displacement_reverses_bitwise() -> Result<()> {
        let mut sys = two_particles()?;
        let before = sys.positions();
        let disp = [[0.125, -0.5, 0.0625], [-1.0, 0.25, 0.375]];
        let neg: Vec<Vec3> = disp.iter().map(|d| [-d[0], -d[1], -d[2]]).collect();
        sys.displace(&disp)?;
        sys.displace(&neg)?;
        assert_eq!(sys.positions(), before);
        Ok(())
    }

    #[test]
    fn zero_and_scale_velocities() -> Result<()> {
        let mut sys = two_particles()?;
        sys.particles[0].velocity = [1.0, -2.0, 3.0];
        sys.scale_velocities(2.0);
        assert_eq!(sys.particles[0].velocity, [2.0, -4.0, 6.0]);
        sys.zero_velocities();
        assert_eq!(sys.particles[0].velocity, [0.0, 0.0, 0.0]);
        Ok(())
    }

    #[test]
    fn non_finite_update_is_divergence() -> Result<()> {
        let mut sys = System::new(vec![Particle::new(1.0, [0.0; DIM])?])?;
        let err = sys
            .update_accelerations(&[[f64::INFINITY, 0.0, 0.0]])
            .unwrap_err();
        assert!(matches!(err, Error::Divergence(_)));
        assert!(err.to_string().contains("particle 0"));
        Ok(())
    }
}

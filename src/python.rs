use numpy::ndarray::{Array1, Array2};
use numpy::{IntoPyArray, PyReadonlyArray1, PyReadonlyArray2};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::core::{
    kinetic_energy, kinetic_temperature, EnergyModel, EnergyReport, KineticMode, McConfig,
    MdConfig, MemoryTrace, MolecularDynamics, MonteCarlo, Particle, Progress, System, Vec3, DIM,
};
use crate::error::{Error, Result as CoreResult};

fn py_err<E: ToString>(e: E) -> PyErr {
    PyValueError::new_err(e.to_string())
}

/// Energy model backed by Python callables.
///
/// `potential(positions) -> float` is mandatory; `gradient(positions) ->
/// (N, 3) ndarray` only when driving molecular dynamics. Velocity-dependent
/// terms are derived on the Rust side so both evaluation modes stay
/// consistent with the integrator's staggering. Pressure is reported as 0;
/// the callables see positions only.
struct CallbackModel {
    potential: Py<PyAny>,
    gradient: Option<Py<PyAny>>,
}

impl CallbackModel {
    fn positions_array(system: &System) -> Array2<f64> {
        let n = system.n_atoms();
        let mut arr = Array2::<f64>::zeros((n, DIM));
        for (i, p) in system.particles.iter().enumerate() {
            for k in 0..DIM {
                arr[[i, k]] = p.position[k];
            }
        }
        arr
    }
}

impl EnergyModel for CallbackModel {
    fn evaluate(&mut self, system: &System, mode: KineticMode) -> CoreResult<EnergyReport> {
        let potential = Python::attach(|py| -> PyResult<f64> {
            let positions = Self::positions_array(system).into_pyarray(py);
            self.potential.call1(py, (positions,))?.bind(py).extract()
        })
        .map_err(|e| Error::EnergyModel(e.to_string()))?;
        Ok(EnergyReport::new(
            potential,
            kinetic_energy(system, mode),
            kinetic_temperature(system, mode),
            0.0,
        ))
    }

    fn gradient(&mut self, system: &System) -> CoreResult<Vec<Vec3>> {
        let callable = self.gradient.as_ref().ok_or_else(|| {
            Error::EnergyModel("no gradient callable was provided".to_string())
        })?;
        let n = system.n_atoms();
        Python::attach(|py| -> PyResult<Vec<Vec3>> {
            let positions = Self::positions_array(system).into_pyarray(py);
            let result = callable.call1(py, (positions,))?;
            let arr: PyReadonlyArray2<f64> = result.bind(py).extract()?;
            let view = arr.as_array();
            if view.shape()[0] != n || view.shape()[1] != DIM {
                return Err(py_err(format!(
                    "gradient must have shape ({}, {}), got {:?}",
                    n,
                    DIM,
                    view.shape()
                )));
            }
            let mut out = vec![[0.0; DIM]; n];
            for (i, row) in out.iter_mut().enumerate() {
                for (k, component) in row.iter_mut().enumerate() {
                    *component = view[[i, k]];
                }
            }
            Ok(out)
        })
        .map_err(|e| Error::EnergyModel(e.to_string()))
    }
}

fn build_system(
    masses: &PyReadonlyArray1<'_, f64>,
    positions: &PyReadonlyArray2<'_, f64>,
) -> PyResult<System> {
    let m = masses.as_array();
    let r = positions.as_array();
    let n = m.len();
    if r.shape()[0] != n || r.shape()[1] != DIM {
        return Err(py_err(format!(
            "positions must have shape ({}, {}), got {:?}",
            n,
            DIM,
            r.shape()
        )));
    }
    let mut particles = Vec::with_capacity(n);
    for i in 0..n {
        let mut pos = [0.0; DIM];
        for k in 0..DIM {
            pos[k] = r[[i, k]];
        }
        particles.push(Particle::new(m[i], pos).map_err(py_err)?);
    }
    System::new(particles).map_err(py_err)
}

fn insert_energy_rows(py: Python<'_>, out: &Bound<'_, PyDict>, trace: &MemoryTrace) -> PyResult<()> {
    let pick = |f: fn(&EnergyReport) -> f64| -> Array1<f64> {
        trace.rows.iter().map(|row| f(&row.energies)).collect()
    };
    out.set_item("e_pot", pick(|e| e.potential).into_pyarray(py))?;
    out.set_item("e_kin", pick(|e| e.kinetic).into_pyarray(py))?;
    out.set_item("e_total", pick(|e| e.total).into_pyarray(py))?;
    out.set_item("temp", pick(|e| e.temperature).into_pyarray(py))?;
    out.set_item("press", pick(|e| e.pressure).into_pyarray(py))?;
    Ok(())
}

fn coordinates_array<'py>(py: Python<'py>, rows: &[Vec3]) -> Bound<'py, numpy::PyArray2<f64>> {
    let mut arr = Array2::<f64>::zeros((rows.len(), DIM));
    for (i, row) in rows.iter().enumerate() {
        for k in 0..DIM {
            arr[[i, k]] = row[k];
        }
    }
    arr.into_pyarray(py)
}

/// Molecular-dynamics driver over a Python-supplied energy model.
///
/// - `__new__(masses, positions, potential, gradient, time_step=0.001,
///   total_time=1.0, temperature=298.15, pressure=1.0,
///   equilibration_time=0.0, equilibration_rate=2.0, seed=None)`
/// - `run()` -> dict of per-step energy rows plus the final state
#[pyclass]
pub struct MdSim {
    system: Option<System>,
    model: CallbackModel,
    config: MdConfig,
}

#[pymethods]
impl MdSim {
    #[new]
    #[pyo3(signature = (masses, positions, potential, gradient, time_step=0.001, total_time=1.0, temperature=298.15, pressure=1.0, equilibration_time=0.0, equilibration_rate=2.0, seed=None))]
    #[allow(clippy::too_many_arguments)]
    fn new<'py>(
        masses: PyReadonlyArray1<'py, f64>,
        positions: PyReadonlyArray2<'py, f64>,
        potential: Py<PyAny>,
        gradient: Py<PyAny>,
        time_step: f64,
        total_time: f64,
        temperature: f64,
        pressure: f64,
        equilibration_time: f64,
        equilibration_rate: f64,
        seed: Option<u64>,
    ) -> PyResult<Self> {
        let system = build_system(&masses, &positions)?;
        let config = MdConfig {
            time_step,
            total_time,
            target_temperature: temperature,
            target_pressure: pressure,
            equilibration_time,
            equilibration_rate,
            seed,
        };
        Ok(Self {
            system: Some(system),
            model: CallbackModel {
                potential,
                gradient: Some(gradient),
            },
            config,
        })
    }

    /// Propagate to `total_time` and return the trajectory data.
    ///
    /// Keys: `time`, `e_pot`, `e_kin`, `e_total`, `temp`, `press` (one row
    /// per record), `positions`, `velocities` (final state, shape (N, 3)),
    /// `target_pressure`. A sim can only run once.
    fn run<'py>(&mut self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let system = self
            .system
            .take()
            .ok_or_else(|| py_err("this simulation has already run"))?;
        let model = CallbackModel {
            potential: self.model.potential.clone_ref(py),
            gradient: self.model.gradient.as_ref().map(|g| g.clone_ref(py)),
        };
        let mut md = MolecularDynamics::new(system, self.config.clone(), model, MemoryTrace::new())
            .map_err(py_err)?;
        md.run().map_err(py_err)?;
        let (system, trace) = md.into_parts();

        let out = PyDict::new(py);
        let time: Array1<f64> = trace
            .rows
            .iter()
            .map(|row| match row.progress {
                Progress::Time(t) => t,
                Progress::Configurations(c) => c as f64,
            })
            .collect();
        out.set_item("time", time.into_pyarray(py))?;
        insert_energy_rows(py, &out, &trace)?;
        out.set_item("positions", coordinates_array(py, &system.positions()))?;
        out.set_item("velocities", coordinates_array(py, &system.velocities()))?;
        out.set_item("target_pressure", self.config.target_pressure)?;
        Ok(out)
    }
}

/// Metropolis Monte-Carlo driver over a Python-supplied energy model.
///
/// - `__new__(masses, positions, potential, temperature=298.15,
///   pressure=1.0, total_configurations=1000, displacement_magnitude=0.1,
///   displacement_growth_rate=ln(2), displacement_update_interval=100,
///   seed=None)`
/// - `run()` -> dict of per-configuration energy rows plus acceptance data
#[pyclass]
pub struct McSim {
    system: Option<System>,
    model: CallbackModel,
    config: McConfig,
}

#[pymethods]
impl McSim {
    #[new]
    #[pyo3(signature = (masses, positions, potential, temperature=298.15, pressure=1.0, total_configurations=1000, displacement_magnitude=0.1, displacement_growth_rate=std::f64::consts::LN_2, displacement_update_interval=100, seed=None))]
    #[allow(clippy::too_many_arguments)]
    fn new<'py>(
        masses: PyReadonlyArray1<'py, f64>,
        positions: PyReadonlyArray2<'py, f64>,
        potential: Py<PyAny>,
        temperature: f64,
        pressure: f64,
        total_configurations: u64,
        displacement_magnitude: f64,
        displacement_growth_rate: f64,
        displacement_update_interval: u64,
        seed: Option<u64>,
    ) -> PyResult<Self> {
        let system = build_system(&masses, &positions)?;
        let config = McConfig {
            total_configurations,
            temperature,
            target_pressure: pressure,
            displacement_magnitude,
            displacement_growth_rate,
            displacement_update_interval,
            seed,
        };
        Ok(Self {
            system: Some(system),
            model: CallbackModel {
                potential,
                gradient: None,
            },
            config,
        })
    }

    /// Sample until the requested configuration count is reached and return
    /// the results.
    ///
    /// Keys: `conf`, `e_pot`, `e_kin`, `e_total`, `temp`, `press` (one row
    /// per record), `positions` (final state), `configurations`, `trials`,
    /// `displacement_magnitude`, `target_pressure`. A sim can only run once.
    fn run<'py>(&mut self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let system = self
            .system
            .take()
            .ok_or_else(|| py_err("this simulation has already run"))?;
        let model = CallbackModel {
            potential: self.model.potential.clone_ref(py),
            gradient: None,
        };
        let mut mc = MonteCarlo::new(system, self.config.clone(), model, MemoryTrace::new())
            .map_err(py_err)?;
        mc.run().map_err(py_err)?;
        let configurations = mc.configurations();
        let trials = mc.trials();
        let dispmag = mc.displacement_magnitude();
        let (system, trace) = mc.into_parts();

        let out = PyDict::new(py);
        let conf: Array1<u64> = trace
            .rows
            .iter()
            .map(|row| match row.progress {
                Progress::Configurations(c) => c,
                Progress::Time(t) => t as u64,
            })
            .collect();
        out.set_item("conf", conf.into_pyarray(py))?;
        insert_energy_rows(py, &out, &trace)?;
        out.set_item("positions", coordinates_array(py, &system.positions()))?;
        out.set_item("configurations", configurations)?;
        out.set_item("trials", trials)?;
        out.set_item("displacement_magnitude", dispmag)?;
        out.set_item("target_pressure", self.config.target_pressure)?;
        Ok(out)
    }
}

/// The molsim Python module entry point.
#[pymodule]
fn molsim(_py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<MdSim>()?;
    m.add_class::<McSim>()?;
    Ok(())
}

//! Bridge between an external parameter estimator and the model.
//!
//! The estimator hands back a map of fitted values; [`solve_fit`] rebuilds the
//! full parameter set around them, re-runs the model and returns `Hi + Hr`,
//! the curve that is compared against case counts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ArboError, Result};
use crate::forcing::WeatherSeries;
use crate::math::ode::SolverOptions;
use crate::model::arbo::{solve_model, ArboState, FittedParams, FixedParams};
use crate::model::capacity::{rainfall_capacity, Capacity, RainfallCapacityParams};
use crate::model::rates::Entomology;

/// Fitted values keyed by parameter name (`b`, `beta`, optionally `c`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FittedValues(BTreeMap<String, f64>);

impl FittedValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn required(&self, name: &str) -> Result<f64> {
        self.get(name)
            .ok_or_else(|| ArboError::MissingParameter(name.to_string()))
    }

    pub fn fitted_params(&self) -> Result<FittedParams> {
        Ok(FittedParams {
            b: self.required("b")?,
            beta: self.required("beta")?,
        })
    }
}

impl FromIterator<(String, f64)> for FittedValues {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<BTreeMap<String, f64>> for FittedValues {
    fn from(map: BTreeMap<String, f64>) -> Self {
        Self(map)
    }
}

/// Where the carrying capacity comes from.
#[derive(Debug, Clone)]
pub enum CapacityData {
    /// Rainfall-driven capacity computed from weather. Time is the weather day,
    /// so the grid starts at or after the lag and temperatures from the same
    /// weather line up with capacity.
    Weather(WeatherSeries),
    Precomputed(Capacity),
    /// Use the estimator's `c` as a constant capacity.
    FittedScalar,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    pub fixed: FixedParams,
    pub rainfall: RainfallCapacityParams,
    pub solver: SolverOptions,
}

impl CapacityData {
    fn resolve(&self, values: &FittedValues, rainfall: &RainfallCapacityParams) -> Result<Capacity> {
        match self {
            CapacityData::Weather(weather) => Ok(rainfall_capacity(weather, rainfall)?.into_capacity()),
            CapacityData::Precomputed(capacity) => Ok(capacity.clone()),
            CapacityData::FittedScalar => Ok(Capacity::Constant(values.required("c")?)),
        }
    }
}

/// Re-run the model with fitted values and return `Hi(t) + Hr(t)` for every
/// grid time.
pub fn solve_fit(
    values: &FittedValues,
    grid: &[f64],
    y0: &ArboState,
    entomology: &Entomology,
    capacity: &CapacityData,
    cfg: &FitConfig,
) -> Result<Vec<f64>> {
    let fitted = values.fitted_params()?;
    let capacity = capacity.resolve(values, &cfg.rainfall)?;
    let traj = solve_model(
        grid,
        y0,
        fitted,
        cfg.fixed,
        entomology.clone(),
        capacity,
        &cfg.solver,
    )?;
    Ok(traj.infected_plus_recovered())
}

/// `simulated - observed`, element-wise.
pub fn residuals(observed: &[f64], simulated: &[f64]) -> Result<Vec<f64>> {
    if observed.len() != simulated.len() {
        return Err(ArboError::invalid(format!(
            "observed length {} does not match simulated length {}",
            observed.len(),
            simulated.len()
        )));
    }
    Ok(simulated.iter().zip(observed).map(|(s, o)| s - o).collect())
}

pub fn sum_squared_residuals(observed: &[f64], simulated: &[f64]) -> Result<f64> {
    Ok(residuals(observed, simulated)?.iter().map(|r| r * r).sum())
}

/// Everything needed to score a candidate parameter set against observations.
///
/// Holds no mutable state, so an optimizer may evaluate candidates from
/// several threads at once.
#[derive(Debug, Clone)]
pub struct FitProblem {
    pub grid: Vec<f64>,
    pub y0: ArboState,
    pub entomology: Entomology,
    pub capacity: CapacityData,
    pub observed: Vec<f64>,
    pub cfg: FitConfig,
}

impl FitProblem {
    pub fn check(&self) -> Result<()> {
        if self.observed.len() != self.grid.len() {
            return Err(ArboError::invalid(format!(
                "{} observations for {} grid times",
                self.observed.len(),
                self.grid.len()
            )));
        }
        self.y0.check()
    }

    pub fn simulate(&self, values: &FittedValues) -> Result<Vec<f64>> {
        solve_fit(values, &self.grid, &self.y0, &self.entomology, &self.capacity, &self.cfg)
    }

    pub fn residuals(&self, values: &FittedValues) -> Result<Vec<f64>> {
        residuals(&self.observed, &self.simulate(values)?)
    }

    pub fn cost(&self, values: &FittedValues) -> Result<f64> {
        sum_squared_residuals(&self.observed, &self.simulate(values)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values() -> FittedValues {
        FittedValues::new().with("b", 0.5).with("beta", 0.3)
    }

    #[test]
    fn missing_beta_is_reported_by_name() {
        let v = FittedValues::new().with("b", 0.5);
        match v.fitted_params().unwrap_err() {
            ArboError::MissingParameter(name) => assert_eq!(name, "beta"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn fitted_scalar_needs_c() {
        let err = CapacityData::FittedScalar
            .resolve(&values(), &RainfallCapacityParams::default())
            .unwrap_err();
        assert!(matches!(err, ArboError::MissingParameter(ref n) if n == "c"));
        let cap = CapacityData::FittedScalar
            .resolve(&values().with("c", 12.0), &RainfallCapacityParams::default())
            .unwrap();
        assert_eq!(cap.at(0.0, 0).unwrap(), 12.0);
    }

    #[test]
    fn residuals_length_mismatch() {
        assert!(residuals(&[1.0, 2.0], &[1.0]).is_err());
        assert_eq!(residuals(&[1.0, 2.0], &[1.5, 1.0]).unwrap(), vec![0.5, -1.0]);
        assert_eq!(sum_squared_residuals(&[1.0, 2.0], &[1.5, 1.0]).unwrap(), 1.25);
    }

    #[test]
    fn values_deserialize_from_plain_map() {
        let v: FittedValues = serde_json::from_str(r#"{"b": 0.4, "beta": 0.2}"#).unwrap();
        assert_eq!(v.fitted_params().unwrap(), FittedParams { b: 0.4, beta: 0.2 });
    }
}

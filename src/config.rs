//! JSON scenario documents consumed by the binaries.
//!
//! `ScenarioConfig::default()` is the reference outbreak: 100 days, one
//! infectious human and mosquito, constant capacity 50 and fixed rates.
//!
//! Time is measured in days of the weather series. Rainfall capacity is only
//! defined from day `lag` on, which is where its grid starts unless
//! `t_start_days` says otherwise.

use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::fit::{CapacityData, FitConfig};
use crate::forcing::WeatherSeries;
use crate::io::rate_table::load_rate_tables_csv;
use crate::io::weather::load_weather_csv;
use crate::math::ode::{SolverOptions, Trajectory};
use crate::model::arbo::{ArboConfig, ArboModel, ArboState, FittedParams, FixedParams};
use crate::model::capacity::{rainfall_capacity, Capacity, RainfallCapacityParams};
use crate::model::rates::{Entomology, LookupStrategy};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WeatherSource {
    Csv(String),
    Inline(WeatherSeries),
}

impl WeatherSource {
    pub fn load(&self) -> anyhow::Result<WeatherSeries> {
        match self {
            WeatherSource::Csv(path) => Ok(load_weather_csv(path)?.1),
            WeatherSource::Inline(w) => Ok(WeatherSeries::new(
                w.precipitation.clone(),
                w.temp_min.clone(),
                w.temp_mean.clone(),
                w.temp_max.clone(),
            )?),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CapacitySpec {
    Constant { value: f64 },
    Series { values: Vec<f64> },
    /// Rainfall-driven series from the scenario weather.
    Rainfall {
        #[serde(default)]
        params: RainfallCapacityParams,
    },
    /// Constant taken from the estimator's `c`.
    Fitted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RateSpec {
    Fixed,
    Temperature {
        tables_csv: String,
        #[serde(default)]
        strategy: LookupStrategy,
        /// Daily mean temperatures; defaults to the weather's `temp_mean`.
        #[serde(default)]
        temperature: Option<Vec<f64>>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub t_start_days: Option<f64>,
    pub t_end_days: f64,
    pub dt_days: f64,
    pub initial: ArboState,
    pub fixed: FixedParams,
    pub fitted: FittedParams,
    pub capacity: CapacitySpec,
    pub rates: RateSpec,
    pub weather: Option<WeatherSource>,
    pub solver: SolverOptions,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            t_start_days: None,
            t_end_days: 100.0,
            dt_days: 1.0,
            initial: ArboState {
                a: 1000.0,
                ms: 5000.0,
                me: 0.0,
                mi: 1.0,
                hs: 9999.0,
                he: 0.0,
                hi: 1.0,
                hr: 0.0,
            },
            fixed: FixedParams::default(),
            fitted: FittedParams { b: 0.5, beta: 0.3 },
            capacity: CapacitySpec::Constant { value: 50.0 },
            rates: RateSpec::Fixed,
            weather: None,
            solver: SolverOptions::default(),
        }
    }
}

impl ScenarioConfig {
    pub fn from_json_file(path: &str) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario file: {}", path))?;
        serde_json::from_str(&text).with_context(|| format!("invalid scenario JSON in {}", path))
    }

    /// First grid time: `t_start_days`, else the rainfall lag, else 0.
    pub fn t_start(&self) -> f64 {
        match (self.t_start_days, &self.capacity) {
            (Some(t), _) => t,
            (None, CapacitySpec::Rainfall { params }) => params.lag as f64,
            (None, _) => 0.0,
        }
    }

    /// `t0, t0 + dt, t0 + 2 dt, ...` up to and including `t_end_days`.
    pub fn grid(&self) -> anyhow::Result<Vec<f64>> {
        let t0 = self.t_start();
        anyhow::ensure!(
            self.dt_days.is_finite() && self.dt_days > 0.0,
            "dt_days must be > 0"
        );
        anyhow::ensure!(t0.is_finite() && t0 >= 0.0, "t_start_days must be >= 0");
        anyhow::ensure!(
            self.t_end_days.is_finite() && self.t_end_days >= t0,
            "t_end_days must be >= {}",
            t0
        );
        let n = ((self.t_end_days - t0) / self.dt_days + 1e-9).floor() as usize;
        Ok((0..=n).map(|i| t0 + i as f64 * self.dt_days).collect())
    }

    fn weather(&self) -> anyhow::Result<Option<WeatherSeries>> {
        self.weather.as_ref().map(|w| w.load()).transpose()
    }

    fn entomology(&self, weather: Option<&WeatherSeries>) -> anyhow::Result<Entomology> {
        match &self.rates {
            RateSpec::Fixed => Ok(Entomology::Fixed),
            RateSpec::Temperature {
                tables_csv,
                strategy,
                temperature,
            } => {
                let tables = Arc::new(load_rate_tables_csv(tables_csv)?);
                let temperature = match (temperature, weather) {
                    (Some(t), _) => t.clone(),
                    (None, Some(w)) => w.temp_mean.clone(),
                    (None, None) => anyhow::bail!("temperature rates need a temperature series or weather"),
                };
                Ok(Entomology::temperature(tables, temperature, *strategy)?)
            }
        }
    }

    fn capacity_data(&self, weather: Option<WeatherSeries>) -> anyhow::Result<CapacityData> {
        Ok(match &self.capacity {
            CapacitySpec::Constant { value } => CapacityData::Precomputed(Capacity::Constant(*value)),
            CapacitySpec::Series { values } => CapacityData::Precomputed(Capacity::Series(values.clone())),
            CapacitySpec::Rainfall { .. } => CapacityData::Weather(
                weather.context("rainfall capacity needs weather data")?,
            ),
            CapacitySpec::Fitted => CapacityData::FittedScalar,
        })
    }

    fn rainfall_params(&self) -> RainfallCapacityParams {
        match &self.capacity {
            CapacitySpec::Rainfall { params } => *params,
            _ => RainfallCapacityParams::default(),
        }
    }

    pub fn model(&self) -> anyhow::Result<ArboModel> {
        let weather = self.weather()?;
        let entomology = self.entomology(weather.as_ref())?;
        let capacity = match self.capacity_data(weather)? {
            CapacityData::Precomputed(c) => c,
            CapacityData::Weather(w) => rainfall_capacity(&w, &self.rainfall_params())?.into_capacity(),
            CapacityData::FittedScalar => {
                anyhow::bail!("capacity 'fitted' is only available when running fitted values")
            }
        };
        Ok(ArboModel::new(ArboConfig {
            fixed: self.fixed,
            transmission: self.fitted.into(),
            entomology,
            capacity,
        })?)
    }

    pub fn run(&self) -> anyhow::Result<Trajectory> {
        let grid = self.grid()?;
        let model = self.model()?;
        Ok(model.simulate(&grid, &self.initial, &self.solver)?)
    }

    /// Inputs for [`crate::fit::solve_fit`].
    pub fn fit_inputs(&self) -> anyhow::Result<(Vec<f64>, Entomology, CapacityData, FitConfig)> {
        let weather = self.weather()?;
        let entomology = self.entomology(weather.as_ref())?;
        let capacity = self.capacity_data(weather)?;
        let cfg = FitConfig {
            fixed: self.fixed,
            rainfall: self.rainfall_params(),
            solver: self.solver.clone(),
        };
        Ok((self.grid()?, entomology, capacity, cfg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ArboError;

    #[test]
    fn default_grid_has_101_days() {
        let grid = ScenarioConfig::default().grid().unwrap();
        assert_eq!(grid.len(), 101);
        assert_eq!(grid[100], 100.0);
    }

    #[test]
    fn parses_partial_json() {
        let cfg: ScenarioConfig = serde_json::from_str(
            r#"{
                "t_end_days": 30,
                "fitted": {"b": 0.4, "beta": 0.25},
                "capacity": {"kind": "rainfall", "params": {"lag": 3}},
                "weather": {
                    "precipitation": [1, 2, 3, 4],
                    "temp_min": [20, 20, 20, 20],
                    "temp_mean": [25, 25, 25, 25],
                    "temp_max": [30, 30, 30, 30]
                },
                "solver": {"method": {"kind": "rk4", "dt": 0.1}}
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.t_end_days, 30.0);
        assert_eq!(cfg.fixed, FixedParams::default());
        assert!(matches!(cfg.capacity, CapacitySpec::Rainfall { params } if params.lag == 3 && params.c0 == 5.0));
        assert!(matches!(cfg.weather, Some(WeatherSource::Inline(_))));
        assert_eq!(cfg.solver.rtol, 1e-3);
    }

    fn rainfall_scenario() -> ScenarioConfig {
        let days = 10;
        ScenarioConfig {
            t_end_days: 9.0,
            capacity: CapacitySpec::Rainfall {
                params: RainfallCapacityParams::default(),
            },
            weather: Some(WeatherSource::Inline(
                WeatherSeries::new(
                    (0..days).map(|d| d as f64).collect(),
                    vec![20.0; days],
                    vec![25.0; days],
                    vec![30.0; days],
                )
                .unwrap(),
            )),
            ..ScenarioConfig::default()
        }
    }

    #[test]
    fn rainfall_grid_starts_after_lag() {
        let cfg = rainfall_scenario();
        assert_eq!(cfg.grid().unwrap(), vec![7.0, 8.0, 9.0]);
        let traj = cfg.run().unwrap();
        assert_eq!(traj.t, vec![7.0, 8.0, 9.0]);
    }

    #[test]
    fn rainfall_capacity_undefined_inside_lag() {
        let cfg = rainfall_scenario();
        let model = cfg.model().unwrap();
        let err = model.deriv_state(0.0, &cfg.initial).unwrap_err();
        assert!(matches!(err, ArboError::Undefined { day: 0, lag: 7 }));

        let early = ScenarioConfig {
            t_start_days: Some(0.0),
            ..rainfall_scenario()
        };
        let err = early.run().unwrap_err();
        assert!(matches!(err.downcast_ref::<ArboError>(), Some(ArboError::Undefined { .. })));
    }

    #[test]
    fn fitted_capacity_cannot_run_directly() {
        let cfg = ScenarioConfig {
            capacity: CapacitySpec::Fitted,
            ..ScenarioConfig::default()
        };
        assert!(cfg.model().is_err());
    }
}

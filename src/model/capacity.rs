//! Carrying capacity of the aquatic compartment.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ArboError, Result};
use crate::forcing::WeatherSeries;
use crate::model::rates::{day_index, ForcingFn};

/// Environmental ceiling on the aquatic population.
///
/// `Constant`, `Series` and `Rainfall` are in units of `10^d` (see
/// [`Capacity::at`]); `Forcing` returns the final capacity directly.
#[derive(Clone)]
pub enum Capacity {
    Constant(f64),
    /// One value per day, indexed by `floor(t)`.
    Series(Vec<f64>),
    /// Indexed by weather day `floor(t)`; [`ArboError::Undefined`] inside the lag window.
    Rainfall(RainfallCapacity),
    Forcing(ForcingFn),
}

impl fmt::Debug for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capacity::Constant(c) => f.debug_tuple("Constant").field(c).finish(),
            Capacity::Series(v) => f.debug_tuple("Series").field(&v.len()).finish(),
            Capacity::Rainfall(r) => f
                .debug_struct("Rainfall")
                .field("lag", &r.lag)
                .field("len", &r.len())
                .finish(),
            Capacity::Forcing(_) => f.write_str("Forcing(..)"),
        }
    }
}

impl Capacity {
    pub fn at(&self, t: f64, d: i32) -> Result<f64> {
        match self {
            Capacity::Constant(c) => Ok(10f64.powi(d) * c),
            Capacity::Series(values) => {
                let day = day_index("capacity", t, values.len())?;
                Ok(10f64.powi(d) * values[day])
            }
            Capacity::Rainfall(r) => {
                let day = day_index("capacity", t, r.lag + r.len())?;
                Ok(10f64.powi(d) * r.at_day(day)?)
            }
            Capacity::Forcing(f) => Ok(f(t)),
        }
    }
}

/// Which temperature is paired with the daily minimum in the rainfall-memory
/// denominator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpperTemperature {
    #[default]
    Max,
    Mean,
}

/// Breeding-site parameters for [`rainfall_capacity`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RainfallCapacityParams {
    /// Days of past rain that still count.
    pub lag: usize,
    /// Residual effect of past rain, 1/°C.
    pub w1: f64,
    /// Capacity of rain to create breeding sites.
    pub c0: f64,
    /// Critical rain amount, mm.
    pub c1: f64,
    /// Rain-independent breeding sites.
    pub c2: f64,
    pub upper_temperature: UpperTemperature,
}

impl Default for RainfallCapacityParams {
    fn default() -> Self {
        Self {
            lag: 7,
            w1: 0.5,
            c0: 5.0,
            c1: 30.0,
            c2: 0.1,
            upper_temperature: UpperTemperature::Max,
        }
    }
}

/// Output of [`rainfall_capacity`]: estimates for days `lag..n`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RainfallCapacity {
    lag: usize,
    values: Vec<f64>,
}

impl RainfallCapacity {
    pub fn lag(&self) -> usize {
        self.lag
    }

    /// Number of defined days, `n - lag`.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Capacity for day `day` of the weather series.
    pub fn at_day(&self, day: usize) -> Result<f64> {
        if day < self.lag {
            return Err(ArboError::Undefined { day, lag: self.lag });
        }
        self.values
            .get(day - self.lag)
            .copied()
            .ok_or(ArboError::IndexOutOfRange {
                series: "rainfall capacity",
                t: day as f64,
                index: day as i64,
                len: self.values.len() + self.lag,
            })
    }

    /// Defined values; element 0 is day `lag`.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Model capacity that keeps weather-day indexing, so temperature and
    /// capacity series share one time axis.
    pub fn into_capacity(self) -> Capacity {
        Capacity::Rainfall(self)
    }
}

/// Rainfall-driven capacity (Yang et al.).
///
/// For every day `j >= lag`:
/// `W_m = sum_{i=1..lag} P[j-i] / (w1 * (T_up[j-i] + T_min[j-i]))^i` and
/// `C = c2 + c0 * (P[j] + W_m) / (c1 + P[j] + W_m)`.
///
/// A series of exactly `lag` days yields an empty estimate; a shorter one is
/// rejected.
pub fn rainfall_capacity(weather: &WeatherSeries, params: &RainfallCapacityParams) -> Result<RainfallCapacity> {
    let k = params.lag;
    let n = weather.len();
    if k == 0 {
        return Err(ArboError::invalid("rainfall lag must be at least one day"));
    }
    if n < k {
        return Err(ArboError::invalid(format!(
            "weather series of {n} days is too short for a {k}-day lag"
        )));
    }

    let rain = &weather.precipitation;
    let t_min = &weather.temp_min;
    let t_up = match params.upper_temperature {
        UpperTemperature::Max => &weather.temp_max,
        UpperTemperature::Mean => &weather.temp_mean,
    };

    let mut values = Vec::with_capacity(n - k);
    for j in k..n {
        let mut memory = 0.0;
        for i in 1..=k {
            let past = rain[j - i];
            if past == 0.0 {
                continue;
            }
            let base = params.w1 * (t_up[j - i] + t_min[j - i]);
            let term = past / base.powi(i as i32);
            if !term.is_finite() {
                return Err(ArboError::degenerate(
                    (j - i) as f64,
                    format!("rainfall memory denominator vanished (base {base})"),
                ));
            }
            memory += term;
        }
        let wet = rain[j] + memory;
        values.push(params.c2 + params.c0 * wet / (params.c1 + wet));
    }

    log::debug!("rainfall capacity: {} days, lag {k}", values.len());
    Ok(RainfallCapacity { lag: k, values })
}

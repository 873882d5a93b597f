use serde::{Deserialize, Serialize};

use crate::error::{ArboError, Result};

/// Daily weather observations, one entry per calendar day.
///
/// All columns have the same length and contain no NaN; filling gaps is the
/// data provider's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSeries {
    /// mm per day
    pub precipitation: Vec<f64>,
    /// °C
    pub temp_min: Vec<f64>,
    pub temp_mean: Vec<f64>,
    pub temp_max: Vec<f64>,
}

impl WeatherSeries {
    pub fn new(
        precipitation: Vec<f64>,
        temp_min: Vec<f64>,
        temp_mean: Vec<f64>,
        temp_max: Vec<f64>,
    ) -> Result<Self> {
        if precipitation.is_empty() {
            return Err(ArboError::invalid("weather series is empty"));
        }
        let n = precipitation.len();
        for (name, column) in [
            ("temp_min", &temp_min),
            ("temp_mean", &temp_mean),
            ("temp_max", &temp_max),
        ] {
            if column.len() != n {
                return Err(ArboError::invalid(format!(
                    "{name} length {} does not match precipitation length {n}",
                    column.len()
                )));
            }
        }
        for (name, column) in [
            ("precipitation", &precipitation),
            ("temp_min", &temp_min),
            ("temp_mean", &temp_mean),
            ("temp_max", &temp_max),
        ] {
            if column.iter().any(|v| v.is_nan()) {
                return Err(ArboError::invalid(format!("{name} contains NaN values")));
            }
        }
        if precipitation.iter().any(|&p| p < 0.0) {
            return Err(ArboError::invalid("precipitation must be non-negative"));
        }
        Ok(Self {
            precipitation,
            temp_min,
            temp_mean,
            temp_max,
        })
    }

    /// Number of days.
    pub fn len(&self) -> usize {
        self.precipitation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.precipitation.is_empty()
    }

    /// Keep days `start..end`.
    pub fn slice(&self, start: usize, end: usize) -> Result<Self> {
        if start >= end || end > self.len() {
            return Err(ArboError::invalid(format!(
                "invalid day range {start}..{end} for {} days",
                self.len()
            )));
        }
        Ok(Self {
            precipitation: self.precipitation[start..end].to_vec(),
            temp_min: self.temp_min[start..end].to_vec(),
            temp_mean: self.temp_mean[start..end].to_vec(),
            temp_max: self.temp_max[start..end].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_weather() {
        let w = WeatherSeries::new(
            vec![0.0, 3.2, 10.0],
            vec![18.0, 19.0, 20.0],
            vec![22.0, 23.0, 24.0],
            vec![27.0, 28.0, 29.0],
        )
        .unwrap();
        assert_eq!(w.len(), 3);
        let tail = w.slice(1, 3).unwrap();
        assert_eq!(tail.precipitation, vec![3.2, 10.0]);
    }

    #[test]
    fn rejects_length_mismatch() {
        let err = WeatherSeries::new(vec![1.0, 2.0], vec![18.0], vec![22.0, 23.0], vec![27.0, 28.0])
            .unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn rejects_nan() {
        let err = WeatherSeries::new(vec![1.0], vec![f64::NAN], vec![22.0], vec![27.0]).unwrap_err();
        assert!(err.to_string().contains("NaN"));
    }

    #[test]
    fn rejects_empty() {
        assert!(WeatherSeries::new(vec![], vec![], vec![], vec![]).is_err());
    }
}

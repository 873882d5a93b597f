use anyhow::Context;
use serde::Deserialize;

use crate::forcing::WeatherSeries;

#[derive(Debug, Deserialize)]
struct WeatherRow {
    date: String,
    #[serde(rename = "daily_precipitation-mm")]
    precipitation: f64,
    #[serde(rename = "temp_min-celsius")]
    temp_min: f64,
    #[serde(rename = "temp_mean-celsius")]
    temp_mean: f64,
    #[serde(rename = "temp_max-celsius")]
    temp_max: f64,
}

/// Load daily weather from a CSV with columns
/// `date,daily_precipitation-mm,temp_min-celsius,temp_mean-celsius,temp_max-celsius`.
/// Rows must already be gap-free and in date order.
/// Returns the dates in file order and the validated series.
pub fn load_weather_csv(path: &str) -> anyhow::Result<(Vec<String>, WeatherSeries)> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open weather CSV: {}", path))?;
    let mut dates = Vec::new();
    let mut precipitation = Vec::new();
    let mut temp_min = Vec::new();
    let mut temp_mean = Vec::new();
    let mut temp_max = Vec::new();
    for (line, result) in rdr.deserialize::<WeatherRow>().enumerate() {
        let row = result.with_context(|| format!("bad weather row {} in {}", line + 1, path))?;
        dates.push(row.date);
        precipitation.push(row.precipitation);
        temp_min.push(row.temp_min);
        temp_mean.push(row.temp_mean);
        temp_max.push(row.temp_max);
    }
    let weather = WeatherSeries::new(precipitation, temp_min, temp_mean, temp_max)
        .with_context(|| format!("invalid weather data in {}", path))?;
    Ok((dates, weather))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_columns_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weather.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "date,daily_precipitation-mm,temp_min-celsius,temp_mean-celsius,temp_max-celsius").unwrap();
        writeln!(f, "2015-01-01,0.0,18.5,23.0,28.1").unwrap();
        writeln!(f, "2015-01-02,12.4,19.0,22.5,26.0").unwrap();
        drop(f);

        let (dates, w) = load_weather_csv(path.to_str().unwrap()).unwrap();
        assert_eq!(dates, vec!["2015-01-01", "2015-01-02"]);
        assert_eq!(w.precipitation, vec![0.0, 12.4]);
        assert_eq!(w.temp_max, vec![28.1, 26.0]);
    }

    #[test]
    fn missing_value_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weather.csv");
        std::fs::write(
            &path,
            "date,daily_precipitation-mm,temp_min-celsius,temp_mean-celsius,temp_max-celsius\n2015-01-01,,18.5,23.0,28.1\n",
        )
        .unwrap();
        assert!(load_weather_csv(path.to_str().unwrap()).is_err());
    }
}

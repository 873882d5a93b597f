use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct CaseRow {
    date: String,
    notified: f64,
    probable: f64,
    lab_confirmed: f64,
}

/// Daily case counts by classification.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseSeries {
    pub dates: Vec<String>,
    pub notified: Vec<f64>,
    pub probable: Vec<f64>,
    pub lab_confirmed: Vec<f64>,
}

pub const SMOOTHING_WINDOW_DAYS: usize = 7;

impl CaseSeries {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Total cases per day, `notified + probable + lab_confirmed`. With
    /// `smoothed`, a trailing 7-day mean; the first six days, which lack a full
    /// window, are dropped together with their dates.
    pub fn observable(&self, smoothed: bool) -> (Vec<String>, Vec<f64>) {
        let total: Vec<f64> = self
            .notified
            .iter()
            .zip(&self.probable)
            .zip(&self.lab_confirmed)
            .map(|((n, p), l)| n + p + l)
            .collect();
        if !smoothed {
            return (self.dates.clone(), total);
        }
        let w = SMOOTHING_WINDOW_DAYS;
        if total.len() < w {
            return (Vec::new(), Vec::new());
        }
        let means = total
            .windows(w)
            .map(|win| win.iter().sum::<f64>() / w as f64)
            .collect();
        (self.dates[w - 1..].to_vec(), means)
    }
}

/// Running total.
pub fn cumulative(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .scan(0.0, |acc, v| {
            *acc += v;
            Some(*acc)
        })
        .collect()
}

/// Load case counts from a CSV with columns `date,notified,probable,lab_confirmed`.
pub fn load_cases_csv(path: &str) -> anyhow::Result<CaseSeries> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open case CSV: {}", path))?;
    let mut series = CaseSeries {
        dates: Vec::new(),
        notified: Vec::new(),
        probable: Vec::new(),
        lab_confirmed: Vec::new(),
    };
    for result in rdr.deserialize::<CaseRow>() {
        let row = result?;
        anyhow::ensure!(
            row.notified >= 0.0 && row.probable >= 0.0 && row.lab_confirmed >= 0.0,
            "negative case count on {}",
            row.date
        );
        series.dates.push(row.date);
        series.notified.push(row.notified);
        series.probable.push(row.probable);
        series.lab_confirmed.push(row.lab_confirmed);
    }
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(n: usize) -> CaseSeries {
        CaseSeries {
            dates: (0..n).map(|i| format!("d{i}")).collect(),
            notified: (0..n).map(|i| i as f64).collect(),
            probable: vec![1.0; n],
            lab_confirmed: vec![0.0; n],
        }
    }

    #[test]
    fn raw_observable_sums_classes() {
        let (dates, v) = series(3).observable(false);
        assert_eq!(dates.len(), 3);
        assert_eq!(v, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn smoothing_drops_incomplete_window() {
        let (dates, v) = series(9).observable(true);
        assert_eq!(dates, vec!["d6", "d7", "d8"]);
        // mean of 1..=7
        assert_eq!(v[0], 4.0);
        assert_eq!(v[2], 6.0);
    }

    #[test]
    fn cumulative_sum() {
        assert_eq!(cumulative(&[1.0, 2.0, 3.5]), vec![1.0, 3.0, 6.5]);
    }

    #[test]
    fn loads_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cases.csv");
        std::fs::write(&path, "date,notified,probable,lab_confirmed\n2015-01-01,3,1,0\n").unwrap();
        let cases = load_cases_csv(path.to_str().unwrap()).unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases.observable(false).1, vec![4.0]);
    }
}

use anyhow::Context;
use serde::Deserialize;

use crate::model::rates::{RateKind, RateTable, RateTables};

#[derive(Debug, Deserialize)]
struct RateRow {
    temperature: f64,
    oviposition: f64,
    aquatic_transition: f64,
    aquatic_mortality: f64,
    adult_mortality: f64,
    incubation: f64,
}

/// Load the five entomological rate tables from one CSV with columns
/// `temperature,oviposition,aquatic_transition,aquatic_mortality,adult_mortality,incubation`.
pub fn load_rate_tables_csv(path: &str) -> anyhow::Result<RateTables> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open rate table CSV: {}", path))?;

    let mut rows: Vec<RateRow> = Vec::new();
    for result in rdr.deserialize::<RateRow>() {
        rows.push(result?);
    }
    anyhow::ensure!(!rows.is_empty(), "rate table {} has no rows", path);

    let build = |kind: RateKind, pick: fn(&RateRow) -> f64| {
        RateTable::new(kind, rows.iter().map(|r| (r.temperature, pick(r))))
            .with_context(|| format!("invalid {} column in {}", kind.name(), path))
    };

    Ok(RateTables {
        oviposition: build(RateKind::Oviposition, |r| r.oviposition)?,
        aquatic_transition: build(RateKind::AquaticTransition, |r| r.aquatic_transition)?,
        aquatic_mortality: build(RateKind::AquaticMortality, |r| r.aquatic_mortality)?,
        adult_mortality: build(RateKind::AdultMortality, |r| r.adult_mortality)?,
        incubation: build(RateKind::Incubation, |r| r.incubation)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_all_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rates.csv");
        std::fs::write(
            &path,
            "temperature,oviposition,aquatic_transition,aquatic_mortality,adult_mortality,incubation\n\
             20.0,4.0,0.08,0.25,0.06,0.08\n\
             25.0,6.0,0.10,0.22,0.05,0.12\n",
        )
        .unwrap();

        let tables = load_rate_tables_csv(path.to_str().unwrap()).unwrap();
        assert_eq!(tables.oviposition.lookup_exact(25.0).unwrap(), 6.0);
        assert_eq!(tables.table(RateKind::Incubation).lookup_exact(20.0).unwrap(), 0.08);
        assert_eq!(tables.adult_mortality.len(), 2);
    }

    #[test]
    fn duplicate_temperature_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rates.csv");
        std::fs::write(
            &path,
            "temperature,oviposition,aquatic_transition,aquatic_mortality,adult_mortality,incubation\n\
             20.0,4.0,0.08,0.25,0.06,0.08\n\
             20.0,6.0,0.10,0.22,0.05,0.12\n",
        )
        .unwrap();
        assert!(load_rate_tables_csv(path.to_str().unwrap()).is_err());
    }
}

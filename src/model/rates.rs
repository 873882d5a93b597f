//! Temperature-dependent entomological rates.
//!
//! Rates come from one of three sources, selected by [`Entomology`]:
//! fixed constants, per-day lookups into [`RateTables`] keyed by the observed
//! mean temperature, or arbitrary forcing functions of time.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ArboError, Result};

/// A time-dependent input `t -> value`.
pub type ForcingFn = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateKind {
    /// `d`, eggs per female per day.
    Oviposition,
    /// `gamma_m`, aquatic to adult.
    AquaticTransition,
    /// `mu_a`
    AquaticMortality,
    /// `mu_m`
    AdultMortality,
    /// `theta_m`, extrinsic incubation.
    Incubation,
}

impl RateKind {
    pub const ALL: [RateKind; 5] = [
        RateKind::Oviposition,
        RateKind::AquaticTransition,
        RateKind::AquaticMortality,
        RateKind::AdultMortality,
        RateKind::Incubation,
    ];

    /// Value used when temperature dependence is switched off (per day).
    pub fn fixed_value(self) -> f64 {
        match self {
            RateKind::Oviposition => 5.6,
            RateKind::AquaticTransition => 0.095,
            RateKind::AquaticMortality => 0.24,
            RateKind::AdultMortality => 0.055,
            RateKind::Incubation => 0.11,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RateKind::Oviposition => "oviposition",
            RateKind::AquaticTransition => "aquatic_transition",
            RateKind::AquaticMortality => "aquatic_mortality",
            RateKind::AdultMortality => "adult_mortality",
            RateKind::Incubation => "incubation",
        }
    }
}

/// The five rates at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntomologicalRates {
    pub oviposition: f64,
    pub aquatic_transition: f64,
    pub aquatic_mortality: f64,
    pub adult_mortality: f64,
    pub incubation: f64,
}

impl EntomologicalRates {
    pub fn fixed() -> Self {
        Self {
            oviposition: RateKind::Oviposition.fixed_value(),
            aquatic_transition: RateKind::AquaticTransition.fixed_value(),
            aquatic_mortality: RateKind::AquaticMortality.fixed_value(),
            adult_mortality: RateKind::AdultMortality.fixed_value(),
            incubation: RateKind::Incubation.fixed_value(),
        }
    }

    pub fn get(&self, kind: RateKind) -> f64 {
        match kind {
            RateKind::Oviposition => self.oviposition,
            RateKind::AquaticTransition => self.aquatic_transition,
            RateKind::AquaticMortality => self.aquatic_mortality,
            RateKind::AdultMortality => self.adult_mortality,
            RateKind::Incubation => self.incubation,
        }
    }
}

/// Temperature keys are compared after rounding to the nearest 0.1 °C.
fn temperature_key(temp: f64) -> i64 {
    (temp * 10.0).round() as i64
}

/// Static temperature -> rate mapping for one [`RateKind`].
#[derive(Debug, Clone, PartialEq)]
pub struct RateTable {
    kind: RateKind,
    points: BTreeMap<i64, f64>,
}

impl RateTable {
    /// Build from `(temperature, rate)` pairs. Temperatures that collide after
    /// rounding to 0.1 °C are rejected rather than silently merged.
    pub fn new(kind: RateKind, pairs: impl IntoIterator<Item = (f64, f64)>) -> Result<Self> {
        let mut points = BTreeMap::new();
        for (temp, rate) in pairs {
            if !temp.is_finite() || !rate.is_finite() {
                return Err(ArboError::invalid(format!(
                    "{} table has a non-finite entry ({temp}, {rate})",
                    kind.name()
                )));
            }
            if points.insert(temperature_key(temp), rate).is_some() {
                return Err(ArboError::invalid(format!(
                    "{} table has duplicate temperature {temp:.1}",
                    kind.name()
                )));
            }
        }
        Ok(Self { kind, points })
    }

    pub fn kind(&self) -> RateKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn lookup_exact(&self, temp: f64) -> Result<f64> {
        if !temp.is_finite() {
            return Err(ArboError::KeyNotFound {
                table: self.kind.name(),
                temperature: temp,
            });
        }
        self.points
            .get(&temperature_key(temp))
            .copied()
            .ok_or(ArboError::KeyNotFound {
                table: self.kind.name(),
                temperature: temp,
            })
    }

    /// Piecewise-linear in temperature, clamped to the end values outside the
    /// tabulated range.
    pub fn interpolate(&self, temp: f64) -> Result<f64> {
        if self.points.len() < 2 {
            return Err(ArboError::invalid(format!(
                "{} table needs at least two temperatures to interpolate",
                self.kind.name()
            )));
        }
        if !temp.is_finite() {
            return Err(ArboError::invalid(format!("temperature {temp} is not finite")));
        }
        let x = temp * 10.0;
        let below = self.points.range(..=x.floor() as i64).next_back();
        let above = self.points.range(x.ceil() as i64..).next();
        let value = match (below, above) {
            (Some((&k0, &v0)), Some((&k1, &v1))) if k1 != k0 => {
                let w = (x - k0 as f64) / (k1 - k0) as f64;
                v0 + w * (v1 - v0)
            }
            (Some((_, &v)), _) | (None, Some((_, &v))) => v,
            (None, None) => {
                return Err(ArboError::invalid(format!("{} table is empty", self.kind.name())))
            }
        };
        Ok(value)
    }

    fn evaluate(&self, temp: f64, strategy: LookupStrategy) -> Result<f64> {
        match strategy {
            LookupStrategy::Exact => self.lookup_exact(temp),
            LookupStrategy::Interpolated => self.interpolate(temp),
        }
    }
}

/// The five tables, one per [`RateKind`].
#[derive(Debug, Clone, PartialEq)]
pub struct RateTables {
    pub oviposition: RateTable,
    pub aquatic_transition: RateTable,
    pub aquatic_mortality: RateTable,
    pub adult_mortality: RateTable,
    pub incubation: RateTable,
}

impl RateTables {
    pub fn table(&self, kind: RateKind) -> &RateTable {
        match kind {
            RateKind::Oviposition => &self.oviposition,
            RateKind::AquaticTransition => &self.aquatic_transition,
            RateKind::AquaticMortality => &self.aquatic_mortality,
            RateKind::AdultMortality => &self.adult_mortality,
            RateKind::Incubation => &self.incubation,
        }
    }

    fn rates_for(&self, temp: f64, strategy: LookupStrategy) -> Result<EntomologicalRates> {
        Ok(EntomologicalRates {
            oviposition: self.oviposition.evaluate(temp, strategy)?,
            aquatic_transition: self.aquatic_transition.evaluate(temp, strategy)?,
            aquatic_mortality: self.aquatic_mortality.evaluate(temp, strategy)?,
            adult_mortality: self.adult_mortality.evaluate(temp, strategy)?,
            incubation: self.incubation.evaluate(temp, strategy)?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupStrategy {
    /// Rounded temperature must be a table key.
    Exact,
    #[default]
    Interpolated,
}

/// Callable forcing for each rate.
#[derive(Clone)]
pub struct EntomologyForcing {
    pub oviposition: ForcingFn,
    pub aquatic_transition: ForcingFn,
    pub aquatic_mortality: ForcingFn,
    pub adult_mortality: ForcingFn,
    pub incubation: ForcingFn,
}

impl fmt::Debug for EntomologyForcing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EntomologyForcing { .. }")
    }
}

/// How the model obtains its entomological rates.
#[derive(Debug, Clone)]
pub enum Entomology {
    Fixed,
    Temperature {
        tables: Arc<RateTables>,
        /// Daily mean temperature, index-aligned with the time grid.
        temperature: Arc<[f64]>,
        strategy: LookupStrategy,
    },
    Forcing(EntomologyForcing),
}

impl Entomology {
    pub fn temperature(tables: Arc<RateTables>, temperature: Vec<f64>, strategy: LookupStrategy) -> Result<Self> {
        if temperature.is_empty() {
            return Err(ArboError::invalid("temperature series is empty"));
        }
        if let Some(day) = temperature.iter().position(|t| !t.is_finite()) {
            return Err(ArboError::invalid(format!(
                "temperature on day {day} is {}",
                temperature[day]
            )));
        }
        if strategy == LookupStrategy::Interpolated {
            for kind in RateKind::ALL {
                if tables.table(kind).len() < 2 {
                    return Err(ArboError::invalid(format!(
                        "{} table needs at least two temperatures to interpolate",
                        kind.name()
                    )));
                }
            }
        }
        Ok(Entomology::Temperature {
            tables,
            temperature: temperature.into(),
            strategy,
        })
    }

    pub fn rates_at(&self, t: f64) -> Result<EntomologicalRates> {
        match self {
            Entomology::Fixed => Ok(EntomologicalRates::fixed()),
            Entomology::Temperature {
                tables,
                temperature,
                strategy,
            } => {
                let day = day_index("temperature", t, temperature.len())?;
                tables.rates_for(temperature[day], *strategy)
            }
            Entomology::Forcing(fns) => Ok(EntomologicalRates {
                oviposition: (fns.oviposition)(t),
                aquatic_transition: (fns.aquatic_transition)(t),
                aquatic_mortality: (fns.aquatic_mortality)(t),
                adult_mortality: (fns.adult_mortality)(t),
                incubation: (fns.incubation)(t),
            }),
        }
    }

    pub fn rate_at(&self, kind: RateKind, t: f64) -> Result<f64> {
        match self {
            Entomology::Fixed => Ok(kind.fixed_value()),
            Entomology::Temperature {
                tables,
                temperature,
                strategy,
            } => {
                let day = day_index("temperature", t, temperature.len())?;
                tables.table(kind).evaluate(temperature[day], *strategy)
            }
            Entomology::Forcing(_) => Ok(self.rates_at(t)?.get(kind)),
        }
    }
}

/// Truncate `t` to a day index into a series of length `len`.
pub(crate) fn day_index(series: &'static str, t: f64, len: usize) -> Result<usize> {
    let index = t.floor();
    if !index.is_finite() || index < 0.0 || index >= len as f64 {
        return Err(ArboError::IndexOutOfRange {
            series,
            t,
            index: index as i64,
            len,
        });
    }
    Ok(index as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn table(kind: RateKind) -> RateTable {
        RateTable::new(kind, [(20.0, 0.1), (25.0, 0.2), (30.0, 0.4)]).unwrap()
    }

    fn tables() -> Arc<RateTables> {
        Arc::new(RateTables {
            oviposition: table(RateKind::Oviposition),
            aquatic_transition: table(RateKind::AquaticTransition),
            aquatic_mortality: table(RateKind::AquaticMortality),
            adult_mortality: table(RateKind::AdultMortality),
            incubation: table(RateKind::Incubation),
        })
    }

    #[test]
    fn fixed_mode_is_time_invariant() {
        let e = Entomology::Fixed;
        let a = e.rates_at(0.0).unwrap();
        let b = e.rates_at(73.4).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.oviposition, 5.6);
        assert_eq!(a.aquatic_transition, 0.095);
        assert_eq!(a.aquatic_mortality, 0.24);
        assert_eq!(a.adult_mortality, 0.055);
        assert_eq!(a.incubation, 0.11);
    }

    #[test]
    fn exact_lookup_rounds_to_tenth_of_degree() {
        let t = table(RateKind::Incubation);
        assert_eq!(t.lookup_exact(25.0).unwrap(), 0.2);
        assert_eq!(t.lookup_exact(24.96).unwrap(), 0.2);
    }

    #[test]
    fn exact_lookup_miss_is_key_not_found() {
        let err = table(RateKind::AdultMortality).lookup_exact(22.3).unwrap_err();
        assert!(matches!(
            err,
            ArboError::KeyNotFound { table: "adult_mortality", .. }
        ));
    }

    #[test]
    fn non_finite_temperature_has_no_key() {
        // Casting NaN to an integer key would land on the 0.0 °C entry.
        let t = RateTable::new(RateKind::Incubation, [(0.0, 0.7), (25.0, 0.2)]).unwrap();
        for temp in [f64::NAN, f64::INFINITY] {
            assert!(matches!(
                t.lookup_exact(temp).unwrap_err(),
                ArboError::KeyNotFound { table: "incubation", .. }
            ));
        }
        let err = Entomology::temperature(tables(), vec![25.0, f64::NAN], LookupStrategy::Exact).unwrap_err();
        assert!(matches!(err, ArboError::InvalidInput(_)));
    }

    #[test]
    fn interpolation_is_linear_and_clamped() {
        let t = table(RateKind::Oviposition);
        assert_relative_eq!(t.interpolate(22.5).unwrap(), 0.15, epsilon = 1e-12);
        assert_relative_eq!(t.interpolate(27.5).unwrap(), 0.3, epsilon = 1e-12);
        assert_eq!(t.interpolate(25.0).unwrap(), 0.2);
        assert_eq!(t.interpolate(10.0).unwrap(), 0.1);
        assert_eq!(t.interpolate(35.0).unwrap(), 0.4);
    }

    #[test]
    fn interpolation_needs_two_points() {
        let single = RateTable::new(RateKind::Incubation, [(25.0, 0.1)]).unwrap();
        assert!(single.interpolate(25.0).is_err());
    }

    #[test]
    fn duplicate_keys_rejected() {
        assert!(RateTable::new(RateKind::Incubation, [(25.0, 0.1), (25.04, 0.2)]).is_err());
    }

    #[test]
    fn temperature_mode_truncates_time_to_day() {
        let e = Entomology::temperature(tables(), vec![20.0, 30.0], LookupStrategy::Exact).unwrap();
        assert_eq!(e.rates_at(0.9).unwrap().incubation, 0.1);
        assert_eq!(e.rates_at(1.2).unwrap().incubation, 0.4);
        assert_eq!(e.rate_at(RateKind::AdultMortality, 1.99).unwrap(), 0.4);
    }

    #[test]
    fn temperature_mode_out_of_range() {
        let e = Entomology::temperature(tables(), vec![20.0, 30.0], LookupStrategy::Interpolated).unwrap();
        let err = e.rates_at(2.0).unwrap_err();
        assert!(matches!(err, ArboError::IndexOutOfRange { index: 2, len: 2, .. }));
    }

    #[test]
    fn forcing_mode_evaluates_callables() {
        let f = EntomologyForcing {
            oviposition: Arc::new(|t| 5.0 + t),
            aquatic_transition: Arc::new(|_| 0.1),
            aquatic_mortality: Arc::new(|_| 0.2),
            adult_mortality: Arc::new(|_| 0.05),
            incubation: Arc::new(|t| 0.1 * t),
        };
        let e = Entomology::Forcing(f);
        let r = e.rates_at(2.0).unwrap();
        assert_eq!(r.oviposition, 7.0);
        assert_relative_eq!(r.incubation, 0.2);
    }
}

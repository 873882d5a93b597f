use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ArboError, Result};
use crate::math::ode::{integrate, SolverOptions, Trajectory};
use crate::model::capacity::Capacity;
use crate::model::rates::{Entomology, ForcingFn};

pub const N_STATES: usize = 8;

/// Position of each compartment in the state vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Compartment {
    /// Aquatic mosquitoes (eggs, larvae, pupae).
    A = 0,
    Ms = 1,
    Me = 2,
    Mi = 3,
    Hs = 4,
    He = 5,
    Hi = 6,
    Hr = 7,
}

impl Compartment {
    pub const ALL: [Compartment; N_STATES] = [
        Compartment::A,
        Compartment::Ms,
        Compartment::Me,
        Compartment::Mi,
        Compartment::Hs,
        Compartment::He,
        Compartment::Hi,
        Compartment::Hr,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

const A: usize = Compartment::A as usize;
const MS: usize = Compartment::Ms as usize;
const ME: usize = Compartment::Me as usize;
const MI: usize = Compartment::Mi as usize;
const HS: usize = Compartment::Hs as usize;
const HE: usize = Compartment::He as usize;
const HI: usize = Compartment::Hi as usize;
const HR: usize = Compartment::Hr as usize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ArboState {
    pub a: f64,
    pub ms: f64,
    pub me: f64,
    pub mi: f64,
    pub hs: f64,
    pub he: f64,
    pub hi: f64,
    pub hr: f64,
}

impl ArboState {
    pub fn to_array(&self) -> [f64; N_STATES] {
        [self.a, self.ms, self.me, self.mi, self.hs, self.he, self.hi, self.hr]
    }

    pub fn from_slice(y: &[f64]) -> Result<Self> {
        if y.len() != N_STATES {
            return Err(ArboError::invalid(format!(
                "expected {N_STATES} state elements, got {}",
                y.len()
            )));
        }
        Ok(Self {
            a: y[A],
            ms: y[MS],
            me: y[ME],
            mi: y[MI],
            hs: y[HS],
            he: y[HE],
            hi: y[HI],
            hr: y[HR],
        })
    }

    pub fn get(&self, c: Compartment) -> f64 {
        self.to_array()[c.index()]
    }

    /// `M = A + Ms + Me + Mi`
    pub fn mosquitoes(&self) -> f64 {
        self.a + self.ms + self.me + self.mi
    }

    /// `H = Hs + He + Hi + Hr`
    pub fn humans(&self) -> f64 {
        self.hs + self.he + self.hi + self.hr
    }

    pub fn check(&self) -> Result<()> {
        for (c, v) in Compartment::ALL.iter().zip(self.to_array()) {
            if !v.is_finite() || v < 0.0 {
                return Err(ArboError::invalid(format!(
                    "initial {c:?} must be finite and >= 0, got {v}"
                )));
            }
        }
        Ok(())
    }
}

/// Biting rate `b` and transmission probability per bite `beta`, the two values
/// estimated from case data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FittedParams {
    pub b: f64,
    pub beta: f64,
}

/// Scenario constants (rates per day).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedParams {
    /// Human mortality.
    pub mu_h: f64,
    /// Intrinsic incubation rate in humans.
    pub theta_h: f64,
    /// Human recovery rate.
    pub alpha_h: f64,
    /// Fraction of hatched eggs that are female.
    pub k: f64,
    /// Control effort on the aquatic phase.
    pub c_a: f64,
    /// Control effort on adults.
    pub c_m: f64,
    /// Capacity magnitude: capacities are scaled by `10^d`.
    pub d: i32,
}

pub const DEFAULT_LIFE_EXPECTANCY_YEARS: f64 = 76.0;

impl Default for FixedParams {
    fn default() -> Self {
        Self {
            mu_h: 1.0 / (365.0 * DEFAULT_LIFE_EXPECTANCY_YEARS),
            theta_h: 0.027,
            alpha_h: 0.1,
            k: 0.5,
            c_a: 0.0,
            c_m: 0.0,
            d: 4,
        }
    }
}

impl FixedParams {
    /// Same constants with `mu_h = 1 / (365 * years)`.
    pub fn with_life_expectancy(self, years: f64) -> Self {
        Self {
            mu_h: 1.0 / (365.0 * years),
            ..self
        }
    }

    pub fn check(&self) -> Result<()> {
        for (name, v) in [
            ("mu_h", self.mu_h),
            ("theta_h", self.theta_h),
            ("alpha_h", self.alpha_h),
            ("k", self.k),
            ("c_a", self.c_a),
            ("c_m", self.c_m),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(ArboError::invalid(format!("{name} must be finite and >= 0, got {v}")));
            }
        }
        if self.k > 1.0 {
            return Err(ArboError::invalid("k is a fraction and must be <= 1"));
        }
        Ok(())
    }
}

/// Source of `b`, `beta_m` and `beta_h`.
#[derive(Clone)]
pub enum Transmission {
    /// `beta_m = beta_h = beta`.
    Constant(FittedParams),
    Forcing {
        b: ForcingFn,
        beta_m: ForcingFn,
        beta_h: ForcingFn,
    },
}

impl fmt::Debug for Transmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transmission::Constant(p) => f.debug_tuple("Constant").field(p).finish(),
            Transmission::Forcing { .. } => f.write_str("Forcing { .. }"),
        }
    }
}

impl Transmission {
    /// `(b, beta_m, beta_h)` at time `t`.
    pub fn at(&self, t: f64) -> (f64, f64, f64) {
        match self {
            Transmission::Constant(p) => (p.b, p.beta, p.beta),
            Transmission::Forcing { b, beta_m, beta_h } => (b(t), beta_m(t), beta_h(t)),
        }
    }
}

impl From<FittedParams> for Transmission {
    fn from(p: FittedParams) -> Self {
        Transmission::Constant(p)
    }
}

/// Everything the right-hand side needs besides the state.
#[derive(Debug, Clone)]
pub struct ArboConfig {
    pub fixed: FixedParams,
    pub transmission: Transmission,
    pub entomology: Entomology,
    pub capacity: Capacity,
}

impl ArboConfig {
    pub fn check(&self) -> Result<()> {
        self.fixed.check()?;
        if let Transmission::Constant(p) = &self.transmission {
            if !(p.b.is_finite() && p.b >= 0.0 && p.beta.is_finite() && p.beta >= 0.0) {
                return Err(ArboError::invalid(format!(
                    "b and beta must be finite and >= 0, got b={} beta={}",
                    p.b, p.beta
                )));
            }
        }
        match &self.capacity {
            Capacity::Constant(c) if !(c.is_finite() && *c > 0.0) => {
                Err(ArboError::invalid(format!("capacity must be finite and > 0, got {c}")))
            }
            Capacity::Series(v) if v.is_empty() => Err(ArboError::invalid("capacity series is empty")),
            Capacity::Rainfall(r) if r.is_empty() => {
                Err(ArboError::invalid("rainfall capacity has no days past the lag window"))
            }
            _ => Ok(()),
        }
    }
}

pub struct ArboModel {
    pub cfg: ArboConfig,
}

impl ArboModel {
    pub fn new(cfg: ArboConfig) -> Result<Self> {
        cfg.check()?;
        Ok(Self { cfg })
    }

    /// Right-hand side of the vector-host system at time `t`.
    ///
    /// Fails with [`ArboError::ModelDegenerate`] when the human population or the
    /// carrying capacity is not strictly positive, and propagates rate or
    /// capacity lookup failures.
    pub fn deriv(&self, t: f64, y: &[f64], dy: &mut [f64]) -> Result<()> {
        debug_assert_eq!(y.len(), N_STATES);
        let cfg = &self.cfg;
        let p = &cfg.fixed;

        let (a, ms, me, mi) = (y[A], y[MS], y[ME], y[MI]);
        let (hs, he, hi, hr) = (y[HS], y[HE], y[HI], y[HR]);
        let m = a + ms + me + mi;
        let h = hs + he + hi + hr;
        if !(h.is_finite() && h > 0.0) {
            return Err(ArboError::degenerate(t, format!("total human population is {h}")));
        }

        let r = cfg.entomology.rates_at(t)?;
        let cap = cfg.capacity.at(t, p.d)?;
        if !(cap.is_finite() && cap > 0.0) {
            return Err(ArboError::degenerate(t, format!("carrying capacity is {cap}")));
        }
        let (b, beta_m, beta_h) = cfg.transmission.at(t);

        let to_me = b * beta_m * ms * hi / h;
        let to_he = b * beta_h * hs * mi / h;

        dy[A] = p.k * r.oviposition * (1.0 - a / cap) * m
            - (r.aquatic_transition + r.aquatic_mortality + p.c_a) * a;
        dy[MS] = r.aquatic_transition * a - to_me - (r.adult_mortality + p.c_m) * ms;
        dy[ME] = to_me - (r.incubation + r.adult_mortality + p.c_m) * me;
        dy[MI] = r.incubation * me - (r.adult_mortality + p.c_m) * mi;
        dy[HS] = p.mu_h * (h - hs) - to_he;
        dy[HE] = to_he - (p.theta_h + p.mu_h) * he;
        dy[HI] = p.theta_h * he - (p.alpha_h + p.mu_h) * hi;
        dy[HR] = p.alpha_h * hi - p.mu_h * hr;
        Ok(())
    }

    pub fn deriv_state(&self, t: f64, state: &ArboState) -> Result<ArboState> {
        let mut dy = [0.0; N_STATES];
        self.deriv(t, &state.to_array(), &mut dy)?;
        ArboState::from_slice(&dy)
    }

    /// Integrate from `grid[0]` and sample at every grid time.
    pub fn simulate(&self, grid: &[f64], y0: &ArboState, opts: &SolverOptions) -> Result<Trajectory> {
        y0.check()?;
        log::debug!(
            "simulating {} grid points over [{}, {}]",
            grid.len(),
            grid.first().copied().unwrap_or(f64::NAN),
            grid.last().copied().unwrap_or(f64::NAN)
        );
        let traj = integrate(grid, &y0.to_array(), opts, |t, y, dy| self.deriv(t, y, dy))?;
        log::debug!(
            "solve done: {} accepted, {} rejected, {} rhs evaluations",
            traj.stats.n_accepted,
            traj.stats.n_rejected,
            traj.stats.n_rhs
        );
        Ok(traj)
    }
}

/// Build the model from its parameter groups and solve over `grid`.
pub fn solve_model(
    grid: &[f64],
    y0: &ArboState,
    fitted: FittedParams,
    fixed: FixedParams,
    entomology: Entomology,
    capacity: Capacity,
    opts: &SolverOptions,
) -> Result<Trajectory> {
    let model = ArboModel::new(ArboConfig {
        fixed,
        transmission: fitted.into(),
        entomology,
        capacity,
    })?;
    model.simulate(grid, y0, opts)
}

/// Accessors for trajectories produced by [`ArboModel`].
impl Trajectory {
    pub fn series(&self, c: Compartment) -> Vec<f64> {
        self.y.iter().map(|y| y[c.index()]).collect()
    }

    pub fn state(&self, i: usize) -> Option<ArboState> {
        self.y.get(i).and_then(|y| ArboState::from_slice(y).ok())
    }

    pub fn mosquito_totals(&self) -> Vec<f64> {
        self.y.iter().map(|y| y[A] + y[MS] + y[ME] + y[MI]).collect()
    }

    pub fn human_totals(&self) -> Vec<f64> {
        self.y.iter().map(|y| y[HS] + y[HE] + y[HI] + y[HR]).collect()
    }

    /// `Hi + Hr`, the quantity compared against case counts.
    pub fn infected_plus_recovered(&self) -> Vec<f64> {
        self.y.iter().map(|y| y[HI] + y[HR]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn scenario_state() -> ArboState {
        ArboState {
            a: 1000.0,
            ms: 5000.0,
            me: 0.0,
            mi: 1.0,
            hs: 9999.0,
            he: 0.0,
            hi: 1.0,
            hr: 0.0,
        }
    }

    fn model(b: f64, beta: f64) -> ArboModel {
        ArboModel::new(ArboConfig {
            fixed: FixedParams::default(),
            transmission: FittedParams { b, beta }.into(),
            entomology: Entomology::Fixed,
            capacity: Capacity::Constant(50.0),
        })
        .unwrap()
    }

    #[test]
    fn deriv_matches_hand_evaluation() {
        let m = model(0.5, 0.3);
        let s = scenario_state();
        let d = m.deriv_state(0.0, &s).unwrap();
        let p = FixedParams::default();
        let cap = 50.0 * 1e4;
        let mtot = s.mosquitoes();
        let h = s.humans();
        let to_me = 0.5 * 0.3 * s.ms * s.hi / h;
        let to_he = 0.5 * 0.3 * s.hs * s.mi / h;

        assert_relative_eq!(d.a, 0.5 * 5.6 * (1.0 - s.a / cap) * mtot - (0.095 + 0.24) * s.a);
        assert_relative_eq!(d.ms, 0.095 * s.a - to_me - 0.055 * s.ms);
        assert_relative_eq!(d.me, to_me - (0.11 + 0.055) * s.me);
        assert_relative_eq!(d.mi, 0.11 * s.me - 0.055 * s.mi);
        assert_relative_eq!(d.hs, p.mu_h * (h - s.hs) - to_he);
        assert_relative_eq!(d.he, to_he - (p.theta_h + p.mu_h) * s.he);
        assert_relative_eq!(d.hi, p.theta_h * s.he - (p.alpha_h + p.mu_h) * s.hi);
        assert_relative_eq!(d.hr, p.alpha_h * s.hi - p.mu_h * s.hr);
    }

    #[test]
    fn human_flows_conserve_population() {
        let d = model(0.5, 0.3).deriv_state(3.0, &scenario_state()).unwrap();
        // Births balance deaths in the human block.
        assert_relative_eq!(d.hs + d.he + d.hi + d.hr, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn zero_humans_is_degenerate() {
        let mut s = scenario_state();
        s.hs = 0.0;
        s.hi = 0.0;
        let err = model(0.5, 0.3).deriv_state(0.0, &s).unwrap_err();
        assert!(matches!(err, ArboError::ModelDegenerate { .. }));
    }

    #[test]
    fn forcing_capacity_must_stay_positive() {
        let m = ArboModel::new(ArboConfig {
            fixed: FixedParams::default(),
            transmission: FittedParams { b: 0.5, beta: 0.3 }.into(),
            entomology: Entomology::Fixed,
            capacity: Capacity::Forcing(std::sync::Arc::new(|t| 10.0 - t)),
        })
        .unwrap();
        assert!(m.deriv_state(5.0, &scenario_state()).is_ok());
        assert!(matches!(
            m.deriv_state(10.0, &scenario_state()).unwrap_err(),
            ArboError::ModelDegenerate { .. }
        ));
    }

    #[test]
    fn rainfall_lag_window_reaches_the_model() {
        use crate::forcing::WeatherSeries;
        use crate::model::capacity::{rainfall_capacity, RainfallCapacityParams};

        let weather = WeatherSeries::new(vec![4.0; 12], vec![20.0; 12], vec![25.0; 12], vec![30.0; 12]).unwrap();
        let rc = rainfall_capacity(&weather, &RainfallCapacityParams::default()).unwrap();
        let m = ArboModel::new(ArboConfig {
            capacity: rc.into_capacity(),
            ..model(0.5, 0.3).cfg
        })
        .unwrap();

        assert!(matches!(
            m.deriv_state(3.2, &scenario_state()).unwrap_err(),
            ArboError::Undefined { day: 3, lag: 7 }
        ));
        assert!(m.deriv_state(7.0, &scenario_state()).is_ok());

        let err = m
            .simulate(&[0.0, 1.0], &scenario_state(), &SolverOptions::default())
            .unwrap_err();
        assert!(matches!(err, ArboError::Undefined { day: 0, .. }));
        let traj = m
            .simulate(&[7.0, 8.0, 11.0], &scenario_state(), &SolverOptions::default())
            .unwrap();
        assert_eq!(traj.t, vec![7.0, 8.0, 11.0]);
    }

    #[test]
    fn forcing_transmission_matches_constant() {
        let constant = model(0.4, 0.2);
        let forced = ArboModel::new(ArboConfig {
            transmission: Transmission::Forcing {
                b: std::sync::Arc::new(|_| 0.4),
                beta_m: std::sync::Arc::new(|_| 0.2),
                beta_h: std::sync::Arc::new(|_| 0.2),
            },
            ..constant.cfg.clone()
        })
        .unwrap();
        let s = scenario_state();
        assert_eq!(
            constant.deriv_state(1.0, &s).unwrap(),
            forced.deriv_state(1.0, &s).unwrap()
        );
    }

    #[test]
    fn rejects_negative_initial_state() {
        let mut s = scenario_state();
        s.me = -1.0;
        let err = model(0.5, 0.3)
            .simulate(&[0.0, 1.0], &s, &SolverOptions::default())
            .unwrap_err();
        assert!(matches!(err, ArboError::InvalidInput(_)));
    }

    #[test]
    fn life_expectancy_variant() {
        let p = FixedParams::default().with_life_expectancy(67.0);
        assert_relative_eq!(p.mu_h, 1.0 / (365.0 * 67.0));
        assert_eq!(p.d, 4);
    }
}

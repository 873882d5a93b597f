//! Disease-free equilibrium of the mosquito population.
//!
//! Used to pick initial conditions and capacities that start the vector
//! population near equilibrium rather than in a transient. The balance is the
//! one where eggs are laid by adults only, `k d (1 - A/C) Ms = (gamma_m + mu_a + c_a) A`.

use crate::error::{ArboError, Result};
use crate::model::arbo::{ArboState, FixedParams};
use crate::model::rates::EntomologicalRates;

/// Basic offspring number `R_m = k d gamma_m / ((mu_m + c_m)(gamma_m + mu_a + c_a))`.
pub fn basic_offspring_number(rates: &EntomologicalRates, fixed: &FixedParams) -> f64 {
    (fixed.k * rates.oviposition * rates.aquatic_transition)
        / ((rates.adult_mortality + fixed.c_m)
            * (rates.aquatic_transition + rates.aquatic_mortality + fixed.c_a))
}

/// Aquatic population sustaining `ms` adults: `A0 = ms (mu_m + c_m) / gamma_m`.
pub fn aquatic_equilibrium(ms: f64, rates: &EntomologicalRates, fixed: &FixedParams) -> Result<f64> {
    if !(rates.aquatic_transition > 0.0) {
        return Err(ArboError::degenerate(0.0, "aquatic transition rate must be > 0"));
    }
    Ok(ms * (rates.adult_mortality + fixed.c_m) / rates.aquatic_transition)
}

/// Carrying capacity at which `ms` adults are the disease-free equilibrium:
/// `C0 = R_m A0 / (R_m - 1)`.
///
/// The result is an absolute capacity; divide by `10^d` before using it as a
/// [`Capacity::Constant`](crate::model::capacity::Capacity::Constant).
pub fn equilibrium_capacity(ms: f64, rates: &EntomologicalRates, fixed: &FixedParams) -> Result<f64> {
    let r_m = basic_offspring_number(rates, fixed);
    if !(r_m.is_finite() && r_m > 1.0) {
        return Err(ArboError::degenerate(
            0.0,
            format!("basic offspring number {r_m:.4} <= 1, mosquito population dies out"),
        ));
    }
    Ok(r_m * aquatic_equilibrium(ms, rates, fixed)? / (r_m - 1.0))
}

/// Vector population at its disease-free equilibrium, fully susceptible humans,
/// and `seed` infectious humans taken out of `humans`.
pub fn disease_free_state(
    ms: f64,
    humans: f64,
    seed: f64,
    rates: &EntomologicalRates,
    fixed: &FixedParams,
) -> Result<ArboState> {
    if !(humans > 0.0) || !(0.0..=humans).contains(&seed) {
        return Err(ArboError::invalid(format!(
            "need humans > 0 and 0 <= seed <= humans, got humans={humans} seed={seed}"
        )));
    }
    Ok(ArboState {
        a: aquatic_equilibrium(ms, rates, fixed)?,
        ms,
        hs: humans - seed,
        hi: seed,
        ..ArboState::default()
    })
}

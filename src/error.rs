//! Error types for the arbovirus model.

use thiserror::Error;

use crate::math::ode::Trajectory;

/// Failures raised by rate lookups, capacity evaluation, the right-hand side,
/// the integrator and the fit adapter.
///
/// Every failure is local to one solve: inputs are never mutated, so a caller may
/// retry with adjusted options.
#[derive(Error, Debug)]
pub enum ArboError {
    /// Exact-match rate lookup found no entry for the (rounded) temperature.
    #[error("no {table} entry for temperature {temperature:.1} °C")]
    KeyNotFound { table: &'static str, temperature: f64 },

    /// A day index derived from `t` falls outside a daily series.
    #[error("{series} index out of range at t={t}: index {index}, length {len}")]
    IndexOutOfRange {
        series: &'static str,
        t: f64,
        index: i64,
        len: usize,
    },

    /// Value requested inside the rainfall lag window, where no estimate exists.
    #[error("capacity undefined for day {day}: first {lag} days have no rainfall history")]
    Undefined { day: usize, lag: usize },

    /// The solver gave up. `partial` holds every grid point reached before `t`.
    #[error("integration failed at t={t}: {reason}")]
    IntegrationFailed {
        t: f64,
        reason: String,
        partial: Box<Trajectory>,
    },

    /// A normalising population or the carrying capacity vanished.
    #[error("model degenerate at t={t}: {reason}")]
    ModelDegenerate { t: f64, reason: String },

    /// The parameter estimator did not provide a required value.
    #[error("missing fitted parameter '{0}'")]
    MissingParameter(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ArboError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ArboError::InvalidInput(message.into())
    }

    pub fn degenerate(t: f64, reason: impl Into<String>) -> Self {
        ArboError::ModelDegenerate {
            t,
            reason: reason.into(),
        }
    }

    /// Partial trajectory carried by a solver failure, if any.
    pub fn partial_trajectory(&self) -> Option<&Trajectory> {
        match self {
            ArboError::IntegrationFailed { partial, .. } => Some(partial),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ArboError>;

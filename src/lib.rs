pub mod calibration;
pub mod config;
pub mod error;
pub mod fit;
pub mod forcing;
pub mod io;
pub mod math;
pub mod model;

pub use error::{ArboError, Result};
pub use fit::{solve_fit, FitConfig, FittedValues};
pub use math::ode::{Method, SolverOptions, Trajectory};
pub use model::arbo::{solve_model, ArboConfig, ArboModel, ArboState, Compartment, FittedParams, FixedParams};

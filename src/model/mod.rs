pub mod arbo;
pub mod capacity;
pub mod rates;

pub use arbo::{solve_model, ArboConfig, ArboModel, ArboState, Compartment, FittedParams, FixedParams, Transmission};
pub use capacity::{rainfall_capacity, Capacity, RainfallCapacity, RainfallCapacityParams};
pub use rates::{Entomology, LookupStrategy, RateKind, RateTable, RateTables};

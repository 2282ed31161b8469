use crate::core::Oracle;

mod branch_bound;
#[cfg(feature = "gurobi")]
mod gurobi;

pub use branch_bound::BranchAndBound;
#[cfg(feature = "gurobi")]
pub use gurobi::Gurobi;

/// Constructors of every available oracle.
#[allow(unsafe_code)]
#[linkme::distributed_slice]
pub static ORACLES: [fn() -> Box<dyn Oracle>];

/// Creates the oracle registered under the given name.
#[must_use]
pub fn by_name(name: &str) -> Option<Box<dyn Oracle>> {
    ORACLES.iter().map(|init| init()).find(|oracle| oracle.name() == name)
}
